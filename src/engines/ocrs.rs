//! OCRS engine adapter
//!
//! Pure Rust OCR engine using the ocrs library. No system dependencies required.
//! Neural network models are downloaded into the user cache on first use.

use super::ensure_cached;
use crate::config::Config;
use crate::engine::{
    common_formats, DocumentImage, EngineOutput, EnginePhase, EngineProgress, EngineProgressFn,
    EngineWorker, Line, OcrEngine, Word,
};
use crate::error::OcrError;
use crate::pdf;
use image::DynamicImage;
use ocrs::{DecodeMethod, ImageSource, OcrEngine as OcrsOcrEngine, OcrEngineParams};
use rten::Model;
use std::sync::Arc;

const DETECTION_MODEL_URL: &str =
    "https://ocrs-models.s3-accelerate.amazonaws.com/text-detection.rten";
const RECOGNITION_MODEL_URL: &str =
    "https://ocrs-models.s3-accelerate.amazonaws.com/text-recognition.rten";

/// Lines recognised per batch; progress is reported between batches
const LINES_PER_CHUNK: usize = 8;

/// ocrs only ships a Latin-alphabet recognition model
const SUPPORTED_LANGUAGE: &str = "eng";

pub struct OcrsEngine {
    engine: Arc<OcrsOcrEngine>,
}

impl OcrsEngine {
    pub fn new(_config: &Config) -> Result<Self, OcrError> {
        let detection_model_path = ensure_cached(DETECTION_MODEL_URL, "text-detection.rten")?;
        let recognition_model_path =
            ensure_cached(RECOGNITION_MODEL_URL, "text-recognition.rten")?;

        let detection_model = Model::load_file(&detection_model_path).map_err(|e| {
            OcrError::InitializationError(format!("Failed to load detection model: {}", e))
        })?;
        let recognition_model = Model::load_file(&recognition_model_path).map_err(|e| {
            OcrError::InitializationError(format!("Failed to load recognition model: {}", e))
        })?;

        let engine = OcrsOcrEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            decode_method: DecodeMethod::Greedy,
            ..Default::default()
        })
        .map_err(|e| {
            OcrError::InitializationError(format!("Failed to create OCR engine: {}", e))
        })?;

        tracing::info!("ocrs engine initialized successfully");

        Ok(Self {
            engine: Arc::new(engine),
        })
    }
}

impl OcrEngine for OcrsEngine {
    fn name(&self) -> &'static str {
        "ocrs"
    }

    fn description(&self) -> &'static str {
        "Pure Rust OCR engine - fast, no system dependencies required"
    }

    fn recognize(
        &self,
        image: &DocumentImage,
        language: &str,
        progress: EngineProgressFn<'_>,
    ) -> Result<EngineOutput, OcrError> {
        if language != SUPPORTED_LANGUAGE {
            tracing::debug!("ocrs has no '{}' model, recognizing as eng", language);
        }
        recognize_document(&self.engine, image, progress)
    }

    fn create_worker(&self) -> Result<Box<dyn EngineWorker>, OcrError> {
        Ok(Box::new(OcrsWorker {
            engine: Arc::clone(&self.engine),
            loaded: false,
            language: None,
        }))
    }

    fn supported_formats(&self) -> Vec<String> {
        common_formats()
    }

    fn supported_languages(&self) -> Vec<String> {
        vec![SUPPORTED_LANGUAGE.to_string()]
    }
}

/// Worker sharing the loaded models. The language must be initialized before
/// recognition, matching the Tesseract worker contract.
struct OcrsWorker {
    engine: Arc<OcrsOcrEngine>,
    loaded: bool,
    language: Option<String>,
}

impl EngineWorker for OcrsWorker {
    fn load(&mut self) -> Result<(), OcrError> {
        self.loaded = true;
        Ok(())
    }

    fn load_language(&mut self, language: &str) -> Result<(), OcrError> {
        if !self.loaded {
            return Err(OcrError::worker("load_language", "worker not loaded"));
        }
        if language != SUPPORTED_LANGUAGE {
            return Err(OcrError::worker(
                "load_language",
                format!("language '{}' is not available for ocrs", language),
            ));
        }
        Ok(())
    }

    fn initialize(&mut self, language: &str) -> Result<(), OcrError> {
        self.language = Some(language.to_string());
        Ok(())
    }

    fn recognize(&mut self, image: &DocumentImage) -> Result<EngineOutput, OcrError> {
        if self.language.is_none() {
            return Err(OcrError::worker("recognize", "worker not initialized"));
        }
        recognize_document(&self.engine, image, &|_| {})
    }

    fn terminate(self: Box<Self>) -> Result<(), OcrError> {
        tracing::debug!("ocrs worker terminated");
        Ok(())
    }
}

fn recognize_document(
    engine: &OcrsOcrEngine,
    image: &DocumentImage,
    progress: EngineProgressFn<'_>,
) -> Result<EngineOutput, OcrError> {
    progress(EngineProgress {
        phase: EnginePhase::Loading,
        fraction: 0.0,
    });

    if pdf::is_pdf(image.bytes()) {
        return recognize_pdf(engine, image, progress);
    }

    let img = image::load_from_memory(image.bytes())
        .map_err(|e| OcrError::DecodeError(format!("Failed to load image: {}", e)))?;
    recognize_image(engine, &img, progress)
}

fn recognize_pdf(
    engine: &OcrsOcrEngine,
    image: &DocumentImage,
    progress: EngineProgressFn<'_>,
) -> Result<EngineOutput, OcrError> {
    if let Some(text) = pdf::embedded_text(image.bytes())? {
        return Ok(EngineOutput {
            lines: crate::engine::lines_from_text(&text),
            text,
            confidence: Some(pdf::EMBEDDED_TEXT_CONFIDENCE),
            ..Default::default()
        });
    }

    let mut warnings =
        vec!["PDF appears to be scanned/image-based, extracting images for OCR".to_string()];
    let images = pdf::page_images(image.bytes())?;

    let mut output = EngineOutput::default();
    for (i, img) in images.iter().enumerate() {
        tracing::info!("Processing image {} of {} from PDF", i + 1, images.len());
        match recognize_image(engine, img, progress) {
            Ok(page) if !page.text.is_empty() => {
                if !output.text.is_empty() {
                    output.text.push_str("\n\n");
                }
                output.text.push_str(&page.text);
                output.words.extend(page.words);
                output.lines.extend(page.lines);
            }
            Ok(_) => {}
            Err(e) => warnings.push(format!("Failed to OCR image {}: {}", i + 1, e)),
        }
    }

    output.confidence = Some(text_quality(&output.text));
    output.warnings = warnings;
    Ok(output)
}

fn recognize_image(
    engine: &OcrsOcrEngine,
    img: &DynamicImage,
    progress: EngineProgressFn<'_>,
) -> Result<EngineOutput, OcrError> {
    // ImageSource::from_bytes expects HWC RGB
    let rgb = img.to_rgb8();
    let dimensions = rgb.dimensions();
    let source = ImageSource::from_bytes(rgb.as_raw(), dimensions).map_err(|e| {
        OcrError::ProcessingError(format!("Failed to create image source: {}", e))
    })?;

    let input = engine
        .prepare_input(source)
        .map_err(|e| OcrError::ProcessingError(format!("Failed to prepare input: {}", e)))?;

    progress(EngineProgress {
        phase: EnginePhase::Detecting,
        fraction: 0.0,
    });
    let word_rects = engine
        .detect_words(&input)
        .map_err(|e| OcrError::ProcessingError(format!("Failed to detect words: {}", e)))?;
    let line_rects = engine.find_text_lines(&input, &word_rects);

    let chunks = line_rects.len().div_ceil(LINES_PER_CHUNK).max(1);
    let mut lines = Vec::new();
    progress(EngineProgress {
        phase: EnginePhase::Recognizing,
        fraction: 0.0,
    });
    for (i, chunk) in line_rects.chunks(LINES_PER_CHUNK).enumerate() {
        let recognized = engine
            .recognize_text(&input, chunk)
            .map_err(|e| OcrError::ProcessingError(format!("Failed to recognize text: {}", e)))?;

        for line in recognized.iter().flatten() {
            let words: Vec<Word> = line
                .words()
                .map(|word| Word {
                    text: word.to_string(),
                    bbox: None,
                })
                .collect();
            let text = words
                .iter()
                .map(|w| w.text.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            lines.push(Line {
                text,
                bbox: None,
                words,
            });
        }

        progress(EngineProgress {
            phase: EnginePhase::Recognizing,
            fraction: (i + 1) as f32 / chunks as f32,
        });
    }
    if line_rects.is_empty() {
        progress(EngineProgress {
            phase: EnginePhase::Recognizing,
            fraction: 1.0,
        });
    }

    let text = lines
        .iter()
        .map(|l| l.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    let words = lines.iter().flat_map(|l| l.words.iter().cloned()).collect();

    Ok(EngineOutput {
        confidence: Some(text_quality(&text)),
        text,
        words,
        lines,
        warnings: Vec::new(),
    })
}

// ============================================================================
// Confidence scoring heuristics
// ============================================================================

/// Text-quality score on a 0-100 scale.
///
/// ocrs has no per-character confidence, so the recognized text is scored for
/// patterns that indicate garbled output.
fn text_quality(text: &str) -> f32 {
    if text.is_empty() {
        return 0.0;
    }
    if text.len() < 5 {
        return 50.0;
    }

    let score = 0.40 * char_mix_score(text)
        + 0.30 * word_length_score(text)
        + 0.15 * whitespace_score(text)
        + 0.15 * repetition_score(text);

    (score * 100.0).clamp(0.0, 100.0)
}

/// Penalizes symbol-heavy or letter-poor text
fn char_mix_score(text: &str) -> f32 {
    let (mut total, mut letters, mut symbols) = (0usize, 0usize, 0usize);
    for c in text.chars() {
        total += 1;
        if c.is_alphabetic() {
            letters += 1;
        } else if !c.is_alphanumeric() && !c.is_whitespace() && !c.is_ascii_punctuation() {
            symbols += 1;
        }
    }
    if total == 0 {
        return 0.0;
    }

    let symbol_penalty = 1.0 - (symbols as f32 / total as f32 * 10.0).min(1.0);
    let letter_score = (letters as f32 / total as f32 * 1.5).min(1.0);
    symbol_penalty * 0.6 + letter_score * 0.4
}

/// Garbled output tends towards one-letter "words" or very long runs
fn word_length_score(text: &str) -> f32 {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return 0.5;
    }

    let avg = words.iter().map(|w| w.len()).sum::<usize>() / words.len();
    let avg_score = match avg {
        0..=1 => 0.3,
        2..=3 => 0.7,
        4..=8 => 1.0,
        9..=12 => 0.8,
        _ => 0.4,
    };

    let singles = words.iter().filter(|w| w.len() == 1).count() as f32 / words.len() as f32;
    avg_score * (1.0 - (singles * 1.5).min(0.5))
}

/// Normal prose is roughly 10-25% whitespace
fn whitespace_score(text: &str) -> f32 {
    let total = text.chars().count();
    if total == 0 {
        return 0.0;
    }
    let percent = text.chars().filter(|c| c.is_whitespace()).count() * 100 / total;
    match percent {
        0..=5 => 0.5,
        6..=10 => 0.8,
        11..=25 => 1.0,
        26..=40 => 0.7,
        _ => 0.3,
    }
}

/// Long runs of one character ("aaaa", "####") indicate recognizer confusion
fn repetition_score(text: &str) -> f32 {
    let mut longest = 1;
    let mut run = 1;
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match chars.peek() {
            Some(&next) if next == c && !c.is_whitespace() => {
                run += 1;
                longest = longest.max(run);
            }
            _ => run = 1,
        }
    }

    match longest {
        1..=3 => 1.0,
        4..=5 => 0.8,
        6..=10 => 0.5,
        _ => 0.2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_scores_zero() {
        assert_eq!(text_quality(""), 0.0);
    }

    #[test]
    fn test_short_text_scores_half() {
        assert_eq!(text_quality("Hi"), 50.0);
    }

    #[test]
    fn test_clean_form_text_scores_high() {
        let score = text_quality("Name of Claimant: Ram Singh\nVillage: Jagdalpur");
        assert!(score > 70.0, "Expected > 70, got {}", score);
    }

    #[test]
    fn test_garbled_text_scores_low() {
        let score = text_quality("§±®©¥€£¢¤");
        assert!(score < 50.0, "Expected < 50, got {}", score);
    }

    #[test]
    fn test_single_char_words_score_lower() {
        let score = text_quality("a b c d e f g h i j k l m n o p");
        assert!(score < 70.0, "Expected < 70, got {}", score);
    }

    #[test]
    fn test_repetition_detection() {
        assert_eq!(repetition_score("Hello World"), 1.0);
        assert!(repetition_score("Villageeeeeeee") < 1.0);
    }
}
