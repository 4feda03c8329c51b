//! Leptess/Tesseract engine adapter
//!
//! Tesseract-based OCR engine. Better for noisy/messy images like phone photos.
//! Uses tesseract-static crate for static linking (no system dependencies).
//! Downloads tessdata (training data) automatically on first use.

use super::ensure_cached;
use crate::config::Config;
use crate::engine::{
    common_formats, lines_from_text, DocumentImage, EngineOutput, EnginePhase, EngineProgress,
    EngineProgressFn, EngineWorker, OcrEngine,
};
use crate::error::OcrError;
use crate::pdf;
use image::DynamicImage;
use std::path::{Path, PathBuf};
use tesseract_static::tesseract::Tesseract;

pub struct LeptessEngine {
    tessdata_path: String,
    default_language: String,
}

impl LeptessEngine {
    pub fn new(config: &Config) -> Result<Self, OcrError> {
        let default_language = config.default_language.clone();

        let tessdata_path = match &config.tessdata_path {
            Some(path) => path.clone(),
            None => ensure_tessdata(&default_language)?,
        };

        // Fail at startup rather than on the first request
        Tesseract::new(Some(&tessdata_path), Some(&default_language)).map_err(|e| {
            OcrError::InitializationError(format!("Failed to initialize Tesseract: {}", e))
        })?;

        tracing::info!(
            "Leptess engine initialized (tessdata: {}, language: {})",
            tessdata_path,
            default_language
        );

        Ok(Self {
            tessdata_path,
            default_language,
        })
    }

    fn language_or_default<'a>(&'a self, language: &'a str) -> &'a str {
        if language.is_empty() {
            &self.default_language
        } else {
            language
        }
    }
}

impl OcrEngine for LeptessEngine {
    fn name(&self) -> &'static str {
        "leptess"
    }

    fn description(&self) -> &'static str {
        "Tesseract OCR engine - better for noisy/messy images like phone photos"
    }

    fn recognize(
        &self,
        image: &DocumentImage,
        language: &str,
        progress: EngineProgressFn<'_>,
    ) -> Result<EngineOutput, OcrError> {
        let language = self.language_or_default(language);
        let tessdata = self.tessdata_path.clone();
        recognize_document(image, progress, |img| {
            let tess = Tesseract::new(Some(&tessdata), Some(language)).map_err(|e| {
                OcrError::ProcessingError(format!("Failed to create Tesseract: {}", e))
            })?;
            run_tesseract(tess, img)
        })
    }

    fn create_worker(&self) -> Result<Box<dyn EngineWorker>, OcrError> {
        Ok(Box::new(TesseractWorker {
            tessdata_path: self.tessdata_path.clone(),
            loaded: false,
            language: None,
            initialized: false,
        }))
    }

    fn health(&self) -> Result<(), OcrError> {
        let dir = Path::new(&self.tessdata_path);
        let traineddata = dir.join(format!("{}.traineddata", self.default_language));
        if traineddata.exists() {
            Ok(())
        } else {
            Err(OcrError::InitializationError(format!(
                "Missing tessdata {:?}",
                traineddata
            )))
        }
    }

    fn supported_formats(&self) -> Vec<String> {
        common_formats()
    }

    fn supported_languages(&self) -> Vec<String> {
        ["eng", "hin", "ben", "mar", "tel", "tam", "guj", "kan", "ori", "pan"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }
}

/// Worker bound to one tessdata directory and language
struct TesseractWorker {
    tessdata_path: String,
    loaded: bool,
    language: Option<String>,
    initialized: bool,
}

impl EngineWorker for TesseractWorker {
    fn load(&mut self) -> Result<(), OcrError> {
        if !Path::new(&self.tessdata_path).is_dir() {
            return Err(OcrError::worker(
                "load",
                format!("tessdata directory {} not found", self.tessdata_path),
            ));
        }
        self.loaded = true;
        Ok(())
    }

    fn load_language(&mut self, language: &str) -> Result<(), OcrError> {
        if !self.loaded {
            return Err(OcrError::worker("load_language", "worker not loaded"));
        }
        let local = Path::new(&self.tessdata_path).join(format!("{}.traineddata", language));
        if !local.exists() {
            self.tessdata_path =
                ensure_tessdata(language).map_err(|e| OcrError::worker("load_language", e))?;
        }
        self.language = Some(language.to_string());
        Ok(())
    }

    fn initialize(&mut self, language: &str) -> Result<(), OcrError> {
        if self.language.as_deref() != Some(language) {
            return Err(OcrError::worker(
                "initialize",
                format!("language '{}' was not loaded", language),
            ));
        }
        Tesseract::new(Some(&self.tessdata_path), Some(language))
            .map_err(|e| OcrError::worker("initialize", e))?;
        self.initialized = true;
        Ok(())
    }

    fn recognize(&mut self, image: &DocumentImage) -> Result<EngineOutput, OcrError> {
        let language = match (&self.language, self.initialized) {
            (Some(language), true) => language.clone(),
            _ => return Err(OcrError::worker("recognize", "worker not initialized")),
        };
        let tessdata = self.tessdata_path.clone();

        recognize_document(image, &|_| {}, |img| {
            let tess = Tesseract::new(Some(&tessdata), Some(&language))
                .map_err(|e| OcrError::worker("recognize", e))?;
            run_tesseract(tess, img)
        })
    }

    fn terminate(self: Box<Self>) -> Result<(), OcrError> {
        tracing::debug!("Tesseract worker terminated");
        Ok(())
    }
}

fn recognize_document<F>(
    image: &DocumentImage,
    progress: EngineProgressFn<'_>,
    mut recognize_one: F,
) -> Result<EngineOutput, OcrError>
where
    F: FnMut(&DynamicImage) -> Result<EngineOutput, OcrError>,
{
    progress(EngineProgress {
        phase: EnginePhase::Loading,
        fraction: 0.0,
    });

    if !pdf::is_pdf(image.bytes()) {
        let img = image::load_from_memory(image.bytes())
            .map_err(|e| OcrError::DecodeError(format!("Failed to load image: {}", e)))?;
        progress(EngineProgress {
            phase: EnginePhase::Recognizing,
            fraction: 0.0,
        });
        let output = recognize_one(&img)?;
        progress(EngineProgress {
            phase: EnginePhase::Recognizing,
            fraction: 1.0,
        });
        return Ok(output);
    }

    if let Some(text) = pdf::embedded_text(image.bytes())? {
        return Ok(EngineOutput {
            lines: lines_from_text(&text),
            text,
            confidence: Some(pdf::EMBEDDED_TEXT_CONFIDENCE),
            ..Default::default()
        });
    }

    let images = pdf::page_images(image.bytes())?;
    let mut warnings =
        vec!["PDF appears to be scanned/image-based, extracting images for OCR".to_string()];
    let mut texts = Vec::new();
    let mut confidences = Vec::new();

    for (i, img) in images.iter().enumerate() {
        tracing::info!("Processing image {} of {} from PDF", i + 1, images.len());
        match recognize_one(img) {
            Ok(output) if !output.text.is_empty() => {
                texts.push(output.text);
                confidences.extend(output.confidence);
            }
            Ok(_) => {}
            Err(e) => warnings.push(format!("Failed to OCR image {}: {}", i + 1, e)),
        }
        progress(EngineProgress {
            phase: EnginePhase::Recognizing,
            fraction: (i + 1) as f32 / images.len() as f32,
        });
    }

    let text = texts.join("\n\n");
    let confidence = if confidences.is_empty() {
        None
    } else {
        Some(confidences.iter().sum::<f32>() / confidences.len() as f32)
    };

    Ok(EngineOutput {
        lines: lines_from_text(&text),
        text,
        confidence,
        words: Vec::new(),
        warnings,
    })
}

/// Run one recognition pass on a fresh Tesseract instance
fn run_tesseract(tess: Tesseract, img: &DynamicImage) -> Result<EngineOutput, OcrError> {
    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();

    // BMP is always supported by leptonica
    let mut bmp = Vec::new();
    rgb.write_to(&mut std::io::Cursor::new(&mut bmp), image::ImageFormat::Bmp)
        .map_err(|e| OcrError::ProcessingError(format!("Failed to convert to BMP: {}", e)))?;

    tracing::debug!("Tesseract input {}x{}, {} bytes", width, height, bmp.len());

    let mut tess = tess
        .set_image_from_mem(&bmp)
        .map_err(|e| OcrError::ProcessingError(format!("Failed to set image: {}", e)))?
        .recognize()
        .map_err(|e| OcrError::ProcessingError(format!("Failed to recognize text: {}", e)))?;

    let text = tess
        .get_text()
        .map_err(|e| OcrError::ProcessingError(format!("Failed to get text: {}", e)))?;
    let text = text.trim().to_string();
    let confidence = tess.mean_text_conf() as f32;

    Ok(EngineOutput {
        lines: lines_from_text(&text),
        text,
        confidence: Some(confidence),
        words: Vec::new(),
        warnings: Vec::new(),
    })
}

/// Ensure `<language>.traineddata` is cached and return the tessdata directory
fn ensure_tessdata(language: &str) -> Result<String, OcrError> {
    let url = format!(
        "https://github.com/tesseract-ocr/tessdata_fast/raw/main/{}.traineddata",
        language
    );
    let file: PathBuf = ensure_cached(&url, &format!("tessdata/{}.traineddata", language))?;

    file.parent()
        .and_then(|dir| dir.to_str())
        .map(|s| s.to_string())
        .ok_or_else(|| OcrError::InitializationError("Invalid tessdata path".to_string()))
}
