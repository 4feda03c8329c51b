//! OCR engine implementations
//!
//! This module contains implementations of the OcrEngine trait for different
//! OCR backends. Engines are conditionally compiled based on feature flags.

#[cfg(feature = "engine-ocrs")]
pub mod ocrs;

#[cfg(feature = "engine-leptess")]
pub mod leptess;

use crate::config::Config;
use crate::engine::OcrEngine;
use crate::error::OcrError;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Information about an available engine
#[derive(Debug, Clone, Serialize)]
pub struct EngineInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub supported_formats: Vec<String>,
    pub supported_languages: Vec<String>,
}

/// Registry of available OCR engines.
///
/// An empty registry is valid: the recognition pipeline then runs on its
/// engine-free tiers only.
pub struct EngineRegistry {
    engines: Vec<Arc<dyn OcrEngine>>,
}

impl EngineRegistry {
    /// Initialize every compiled-in engine. Engines that fail to initialize
    /// are logged and left out.
    pub fn new(config: &Config) -> Self {
        let mut engines: Vec<Arc<dyn OcrEngine>> = Vec::new();

        if config.disable_engines {
            tracing::warn!("OCR engines disabled by configuration");
            return Self { engines };
        }

        #[cfg(feature = "engine-ocrs")]
        {
            tracing::info!("Initializing ocrs engine...");
            match ocrs::OcrsEngine::new(config) {
                Ok(engine) => engines.push(Arc::new(engine)),
                Err(e) => tracing::warn!("ocrs engine unavailable: {}", e),
            }
        }

        #[cfg(feature = "engine-leptess")]
        {
            tracing::info!("Initializing leptess engine...");
            match leptess::LeptessEngine::new(config) {
                Ok(engine) => engines.push(Arc::new(engine)),
                Err(e) => tracing::warn!("leptess engine unavailable: {}", e),
            }
        }

        if engines.is_empty() {
            tracing::warn!("No OCR engines available; only heuristic fallback will run");
        }

        Self { engines }
    }

    /// Build a registry from already constructed engines, first one is the default
    pub fn from_engines(engines: Vec<Arc<dyn OcrEngine>>) -> Self {
        Self { engines }
    }

    pub fn empty() -> Self {
        Self {
            engines: Vec::new(),
        }
    }

    /// Get the default engine
    pub fn default_engine(&self) -> Option<Arc<dyn OcrEngine>> {
        self.engines.first().cloned()
    }

    /// List all available engine names
    pub fn list(&self) -> Vec<&'static str> {
        self.engines.iter().map(|e| e.name()).collect()
    }

    pub fn all(&self) -> &[Arc<dyn OcrEngine>] {
        &self.engines
    }

    /// Get info about all available engines
    pub fn info(&self) -> Vec<EngineInfo> {
        self.engines
            .iter()
            .map(|e| EngineInfo {
                name: e.name(),
                description: e.description(),
                supported_formats: e.supported_formats(),
                supported_languages: e.supported_languages(),
            })
            .collect()
    }
}

/// Cache directory shared by all engines' downloaded assets
pub(crate) fn cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("docdigitize-ocr")
}

/// Ensure `url` is downloaded to `<cache>/<relative>` and return that path
pub(crate) fn ensure_cached(url: &str, relative: &str) -> Result<PathBuf, OcrError> {
    let path = cache_dir().join(relative);

    if path.exists() {
        tracing::info!("Using cached {:?}", path);
        return Ok(path);
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            OcrError::InitializationError(format!("Failed to create cache directory: {}", e))
        })?;
    }

    tracing::info!("Downloading {} (this may take a moment)...", relative);
    download_file(url, &path)?;
    tracing::info!("Downloaded {} to {:?}", relative, path);
    Ok(path)
}

fn download_file(url: &str, path: &Path) -> Result<(), OcrError> {
    let response = ureq::get(url)
        .call()
        .map_err(|e| OcrError::InitializationError(format!("Failed to download {}: {}", url, e)))?;

    let buffer = response.into_body().read_to_vec().map_err(|e| {
        OcrError::InitializationError(format!("Failed to read response body: {}", e))
    })?;

    // An interrupted download must never look cached
    let partial = path.with_extension("partial");
    let mut file = std::fs::File::create(&partial).map_err(|e| {
        OcrError::InitializationError(format!("Failed to create {:?}: {}", partial, e))
    })?;
    file.write_all(&buffer)
        .map_err(|e| OcrError::InitializationError(format!("Failed to write {:?}: {}", partial, e)))?;
    std::fs::rename(&partial, path)
        .map_err(|e| OcrError::InitializationError(format!("Failed to move {:?}: {}", partial, e)))?;

    Ok(())
}
