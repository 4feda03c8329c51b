use crate::error::OcrError;
use serde::Serialize;
use std::sync::Arc;

/// An uploaded document payload. The bytes are shared so the payload can be
/// handed to blocking recognition attempts without copying.
#[derive(Debug, Clone)]
pub struct DocumentImage {
    pub name: Option<String>,
    pub mime_type: String,
    pub data: Arc<[u8]>,
}

impl DocumentImage {
    pub fn new(name: Option<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name,
            mime_type: mime_type.into(),
            data: Arc::from(data),
        }
    }

    /// Payload size in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }
}

/// Axis-aligned box in image pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Word {
    pub text: String,
    pub bbox: Option<BoundingBox>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Line {
    pub text: String,
    pub bbox: Option<BoundingBox>,
    pub words: Vec<Word>,
}

/// Raw output of one engine call
#[derive(Debug, Clone, Default)]
pub struct EngineOutput {
    pub text: String,
    /// Engine confidence on a 0-100 scale, when the engine reports one
    pub confidence: Option<f32>,
    pub words: Vec<Word>,
    pub lines: Vec<Line>,
    pub warnings: Vec<String>,
}

/// Phase an engine is in when it reports progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnginePhase {
    Loading,
    Detecting,
    Recognizing,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineProgress {
    pub phase: EnginePhase,
    /// Fraction of the current phase completed, 0.0-1.0
    pub fraction: f32,
}

/// Sink for engine progress events
pub type EngineProgressFn<'a> = &'a (dyn Fn(EngineProgress) + Send + Sync);

/// Trait that all OCR engines must implement
pub trait OcrEngine: Send + Sync {
    /// Returns the engine identifier (e.g., "ocrs", "leptess")
    fn name(&self) -> &'static str;

    /// Returns a human-readable description of the engine
    fn description(&self) -> &'static str;

    /// Recognize text in a single call
    fn recognize(
        &self,
        image: &DocumentImage,
        language: &str,
        progress: EngineProgressFn<'_>,
    ) -> Result<EngineOutput, OcrError>;

    /// Acquire a dedicated worker for the load/initialize/recognize/terminate lifecycle
    fn create_worker(&self) -> Result<Box<dyn EngineWorker>, OcrError>;

    /// Liveness probe for the engine's own resources
    fn health(&self) -> Result<(), OcrError> {
        Ok(())
    }

    /// Get supported MIME types
    fn supported_formats(&self) -> Vec<String>;

    /// Get supported languages
    fn supported_languages(&self) -> Vec<String>;
}

/// A longer-lived recognition worker.
///
/// Callers drive it through `load`, `load_language`, `initialize`, `recognize`
/// and must call `terminate` once done, whether recognition succeeded or not.
pub trait EngineWorker: Send {
    fn load(&mut self) -> Result<(), OcrError>;

    fn load_language(&mut self, language: &str) -> Result<(), OcrError>;

    fn initialize(&mut self, language: &str) -> Result<(), OcrError>;

    fn recognize(&mut self, image: &DocumentImage) -> Result<EngineOutput, OcrError>;

    fn terminate(self: Box<Self>) -> Result<(), OcrError>;
}

/// Image MIME types every bundled engine accepts
pub(crate) fn common_formats() -> Vec<String> {
    [
        "image/png",
        "image/jpeg",
        "image/gif",
        "image/bmp",
        "image/webp",
        "image/tiff",
        "application/pdf",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Split recognized text into pass-through line records
pub(crate) fn lines_from_text(text: &str) -> Vec<Line> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| Line {
            text: line.to_string(),
            bbox: None,
            words: line
                .split_whitespace()
                .map(|w| Word {
                    text: w.to_string(),
                    bbox: None,
                })
                .collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_from_text_skips_blank_lines() {
        let lines = lines_from_text("Name: Ram Singh\n\n  \nVillage: Jagdalpur\n");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "Name: Ram Singh");
        assert_eq!(lines[0].words.len(), 3);
        assert_eq!(lines[1].words[1].text, "Jagdalpur");
    }

    #[test]
    fn test_document_image_size() {
        let image = DocumentImage::new(Some("a.png".into()), "image/png", vec![0u8; 2048]);
        assert_eq!(image.size(), 2048);
        assert_eq!(image.bytes().len(), 2048);
    }
}
