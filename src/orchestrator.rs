//! Tiered recognition orchestrator.
//!
//! `process_image` always returns a well-formed [`RecognitionResult`]: each
//! strategy runs in isolation on the blocking pool under a deadline, and any
//! error, panic or timeout just moves on to the next tier. When every tier
//! fails the caller gets a labelled placeholder.

use crate::batch::{self, PageSource};
use crate::config::Config;
use crate::engine::DocumentImage;
use crate::engines::EngineRegistry;
use crate::error::OcrError;
use crate::progress::ProgressFn;
use crate::result::{Method, PageResult, RecognitionResult};
use crate::strategy::{self, Strategy};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Liveness report; produced even when the probe itself fails
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub ready: bool,
    pub method: String,
    pub version: String,
    pub engines: Vec<&'static str>,
    pub last_method: Option<Method>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct Orchestrator {
    registry: Arc<EngineRegistry>,
    strategies: Vec<Arc<dyn Strategy>>,
    attempt_timeout: Duration,
    last_method: Mutex<Option<Method>>,
}

impl Orchestrator {
    /// Standard tiers over the registry's default engine
    pub fn new(registry: Arc<EngineRegistry>, config: &Config) -> Self {
        let strategies =
            strategy::default_strategies(registry.default_engine(), &config.default_language);
        Self::with_strategies(registry, strategies, config.strategy_timeout)
    }

    pub fn with_strategies(
        registry: Arc<EngineRegistry>,
        strategies: Vec<Arc<dyn Strategy>>,
        attempt_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            strategies,
            attempt_timeout,
            last_method: Mutex::new(None),
        }
    }

    pub fn registry(&self) -> &EngineRegistry {
        &self.registry
    }

    /// Strategy that produced the most recent result
    pub fn last_method(&self) -> Option<Method> {
        self.last_method.lock().ok().and_then(|m| *m)
    }

    pub fn reset(&self) {
        self.set_last_method(None);
    }

    fn set_last_method(&self, method: Option<Method>) {
        if let Ok(mut last) = self.last_method.lock() {
            *last = method;
        }
    }

    /// Recognize one document, falling through the tiers until one yields text
    pub async fn process_image(
        &self,
        image: &DocumentImage,
        progress: Option<ProgressFn>,
    ) -> RecognitionResult {
        let start = Instant::now();
        let image = Arc::new(image.clone());
        let mut failures = Vec::new();

        for strategy in &self.strategies {
            let method = strategy.method();
            match self.run_attempt(strategy, &image, progress.clone()).await {
                Ok(mut result) => {
                    tracing::info!(
                        method = %method,
                        confidence = result.confidence,
                        chars = result.text.len(),
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "Recognition succeeded"
                    );
                    self.set_last_method(Some(method));
                    failures.append(&mut result.warnings);
                    result.warnings = failures;
                    return result;
                }
                Err(e) => {
                    tracing::warn!(method = %method, "Recognition strategy failed: {}", e);
                    failures.push(format!("{} failed: {}", method, e));
                }
            }
        }

        tracing::warn!(
            file = image.name.as_deref().unwrap_or("unnamed"),
            "All recognition strategies failed, returning placeholder"
        );
        self.set_last_method(Some(Method::Placeholder));
        let mut result = strategy::placeholder(&image);
        result.warnings = failures;
        result
    }

    async fn run_attempt(
        &self,
        strategy: &Arc<dyn Strategy>,
        image: &Arc<DocumentImage>,
        progress: Option<ProgressFn>,
    ) -> Result<RecognitionResult, OcrError> {
        let method = strategy.method();
        let task_strategy = Arc::clone(strategy);
        let task_image = Arc::clone(image);

        let handle = tokio::task::spawn_blocking(move || {
            task_strategy.attempt(&task_image, progress.as_deref())
        });

        let result = match tokio::time::timeout(self.attempt_timeout, handle).await {
            Ok(Ok(result)) => result?,
            Ok(Err(join_error)) => {
                return Err(OcrError::Internal(format!(
                    "{} strategy aborted: {}",
                    method, join_error
                )))
            }
            // The blocking attempt keeps running detached; its output is dropped
            Err(_) => {
                return Err(OcrError::Timeout {
                    strategy: method.as_str(),
                    seconds: self.attempt_timeout.as_secs(),
                })
            }
        };

        if result.text.is_empty() {
            return Err(OcrError::EmptyText(method.as_str()));
        }
        Ok(result)
    }

    /// Recognize several documents in order, one [`PageResult`] per input
    pub async fn process_multiple_pages(
        &self,
        pages: Vec<PageSource>,
        progress: Option<ProgressFn>,
    ) -> Vec<PageResult> {
        batch::process_multiple_pages(self, pages, progress).await
    }

    /// Probe the raster path and every engine. Never fails.
    pub async fn health_check(&self) -> HealthStatus {
        let registry = Arc::clone(&self.registry);
        let probe = tokio::task::spawn_blocking(move || -> Result<(), OcrError> {
            let canvas = image::RgbImage::from_pixel(10, 10, image::Rgb([255, 255, 255]));
            let mut encoded = Vec::new();
            canvas
                .write_to(&mut std::io::Cursor::new(&mut encoded), image::ImageFormat::Png)
                .map_err(|e| OcrError::Internal(format!("Canvas probe failed: {}", e)))?;
            let raster = strategy::decode_raster(&encoded)?;
            strategy::detect_text_bands(&raster);

            for engine in registry.all() {
                engine.health()?;
            }
            Ok(())
        })
        .await;

        let error = match probe {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(join_error) => Some(format!("Health probe aborted: {}", join_error)),
        };

        if let Some(e) = &error {
            tracing::warn!("Health check failed: {}", e);
        }

        HealthStatus {
            status: if error.is_none() { "ready" } else { "error" }.to_string(),
            ready: error.is_none(),
            method: "tiered".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            engines: self.registry.list(),
            last_method: self.last_method(),
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::OcrEngine;
    use crate::strategy::tests::{white_page, FakeEngine};
    use crate::strategy::NO_TEXT_MARKER;
    use std::sync::atomic::Ordering;

    fn orchestrator_with(engine: FakeEngine) -> (Orchestrator, Arc<dyn OcrEngine>) {
        let engine: Arc<dyn OcrEngine> = Arc::new(engine);
        let registry = Arc::new(EngineRegistry::from_engines(vec![Arc::clone(&engine)]));
        let config = Config {
            strategy_timeout: Duration::from_millis(500),
            ..Config::default()
        };
        (Orchestrator::new(registry, &config), engine)
    }

    #[tokio::test]
    async fn test_direct_result_wins() {
        let (orchestrator, _) = orchestrator_with(FakeEngine {
            direct_text: Some("Name: Ram Singh".into()),
            worker_text: Some("worker text".into()),
            ..Default::default()
        });

        let result = orchestrator.process_image(&white_page(50, 50), None).await;

        assert!(result.success);
        assert_eq!(result.method, Method::Direct);
        assert_eq!(result.text, "Name: Ram Singh");
        assert!(result.warnings.is_empty());
        assert_eq!(orchestrator.last_method(), Some(Method::Direct));
    }

    #[tokio::test]
    async fn test_falls_back_to_worker_when_direct_fails() {
        let (orchestrator, _) = orchestrator_with(FakeEngine {
            direct_text: None,
            worker_text: Some("Village: Jagdalpur".into()),
            ..Default::default()
        });

        let result = orchestrator.process_image(&white_page(50, 50), None).await;

        assert_eq!(result.method, Method::Worker);
        assert_eq!(result.text, "Village: Jagdalpur");
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].starts_with("direct failed"));
    }

    #[tokio::test]
    async fn test_engine_panic_is_absorbed() {
        let (orchestrator, _) = orchestrator_with(FakeEngine {
            panic_on_direct: true,
            worker_text: Some("recovered".into()),
            ..Default::default()
        });

        let result = orchestrator.process_image(&white_page(50, 50), None).await;

        assert!(result.success);
        assert_eq!(result.method, Method::Worker);
    }

    #[tokio::test]
    async fn test_hung_engine_times_out_and_falls_through() {
        let (orchestrator, _) = orchestrator_with(FakeEngine {
            direct_text: Some("too late".into()),
            sleep_on_direct: Some(Duration::from_secs(3)),
            worker_text: None,
            ..Default::default()
        });

        let started = Instant::now();
        let result = orchestrator.process_image(&white_page(50, 50), None).await;

        assert!(started.elapsed() < Duration::from_secs(3));
        assert_eq!(result.method, Method::Heuristic);
        assert!(result.warnings.iter().any(|w| w.contains("timed out")));
    }

    #[tokio::test]
    async fn test_heuristic_runs_when_engines_yield_nothing() {
        let (orchestrator, _) = orchestrator_with(FakeEngine::default());

        let result = orchestrator.process_image(&white_page(100, 100), None).await;

        assert!(result.success);
        assert_eq!(result.method, Method::Heuristic);
        assert_eq!(result.text, NO_TEXT_MARKER);
        assert_eq!(result.confidence, 50.0);
        assert_eq!(result.warnings.len(), 2);
    }

    #[tokio::test]
    async fn test_undecodable_input_gets_placeholder() {
        let orchestrator = Orchestrator::new(Arc::new(EngineRegistry::empty()), &Config::default());
        let image = DocumentImage::new(Some("scan.bin".into()), "application/octet-stream", vec![1, 2, 3]);

        let result = orchestrator.process_image(&image, None).await;

        assert!(result.success);
        assert!(result.is_placeholder());
        assert!(result.needs_manual_verification());
        assert!((0.0..=100.0).contains(&result.confidence));
        assert!(result.text.contains("scan.bin"));
        assert_eq!(result.warnings.len(), 3);
        assert_eq!(orchestrator.last_method(), Some(Method::Placeholder));

        orchestrator.reset();
        assert_eq!(orchestrator.last_method(), None);
    }

    #[tokio::test]
    async fn test_progress_is_forwarded_from_direct() {
        let (orchestrator, _) = orchestrator_with(FakeEngine {
            direct_text: Some("text".into()),
            ..Default::default()
        });
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        let progress: ProgressFn = Arc::new(move |p| sink_seen.lock().unwrap().push(p));

        orchestrator
            .process_image(&white_page(20, 20), Some(progress))
            .await;

        assert_eq!(*seen.lock().unwrap(), vec![0, 50, 100]);
    }

    #[tokio::test]
    async fn test_health_check_ready() {
        let (orchestrator, _) = orchestrator_with(FakeEngine::default());
        let health = orchestrator.health_check().await;

        assert!(health.ready);
        assert_eq!(health.status, "ready");
        assert_eq!(health.engines, vec!["fake"]);
        assert!(health.error.is_none());
    }

    #[tokio::test]
    async fn test_health_check_reports_engine_fault() {
        let (orchestrator, _) = orchestrator_with(FakeEngine {
            unhealthy: true,
            ..Default::default()
        });
        let health = orchestrator.health_check().await;

        assert!(!health.ready);
        assert_eq!(health.status, "error");
        assert!(health.error.unwrap().contains("models missing"));
    }

    #[tokio::test]
    async fn test_direct_called_once_per_image() {
        let fake = FakeEngine {
            direct_text: Some("once".into()),
            ..Default::default()
        };
        let engine = Arc::new(fake);
        let registry = Arc::new(EngineRegistry::from_engines(vec![
            Arc::clone(&engine) as Arc<dyn OcrEngine>
        ]));
        let orchestrator = Orchestrator::new(registry, &Config::default());

        orchestrator.process_image(&white_page(10, 10), None).await;
        assert_eq!(engine.direct_calls.load(Ordering::SeqCst), 1);
    }
}
