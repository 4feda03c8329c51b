//! Recognition strategies, from highest to lowest fidelity.
//!
//! Each strategy is one self-contained attempt at turning a document into
//! text. The orchestrator walks the table in order and keeps the first result
//! with usable text; the placeholder at the end cannot fail.

use crate::engine::{
    DocumentImage, EngineOutput, EnginePhase, EngineProgress, EngineWorker, OcrEngine,
};
use crate::error::OcrError;
use crate::result::{Method, RecognitionResult};
use image::RgbImage;
use std::sync::Arc;

/// Rows per scanned band in the heuristic fallback
pub const BAND_HEIGHT: u32 = 20;
/// Columns between samples within a band
pub const SAMPLE_STRIDE: u32 = 10;
/// Mean channel value below which a sample is dark
pub const DARK_THRESHOLD: f32 = 128.0;
/// A band qualifies when its dark markers span more than this many samples
pub const MIN_MARKER_SPAN: usize = 5;

/// Heuristic output when no band looks like text
pub const NO_TEXT_MARKER: &str = "[Document processed - manual verification needed]";

/// Progress sink handed to a strategy, percent 0-100
pub type AttemptProgress<'a> = Option<&'a (dyn Fn(u8) + Send + Sync)>;

pub trait Strategy: Send + Sync {
    fn method(&self) -> Method;

    fn attempt(
        &self,
        image: &DocumentImage,
        progress: AttemptProgress<'_>,
    ) -> Result<RecognitionResult, OcrError>;
}

fn require_text(output: EngineOutput, method: Method) -> Result<RecognitionResult, OcrError> {
    if output.text.trim().is_empty() {
        return Err(OcrError::EmptyText(method.as_str()));
    }
    Ok(RecognitionResult::from_output(output, method, true))
}

/// One call on the engine. Only recognizing-phase progress is forwarded.
pub struct Direct {
    engine: Option<Arc<dyn OcrEngine>>,
    language: String,
}

impl Direct {
    pub fn new(engine: Option<Arc<dyn OcrEngine>>, language: impl Into<String>) -> Self {
        Self {
            engine,
            language: language.into(),
        }
    }
}

impl Strategy for Direct {
    fn method(&self) -> Method {
        Method::Direct
    }

    fn attempt(
        &self,
        image: &DocumentImage,
        progress: AttemptProgress<'_>,
    ) -> Result<RecognitionResult, OcrError> {
        let engine = self.engine.as_ref().ok_or(OcrError::EngineUnavailable)?;

        let forward = |event: EngineProgress| {
            if event.phase != EnginePhase::Recognizing {
                return;
            }
            if let Some(report) = progress {
                report((event.fraction * 100.0).round().clamp(0.0, 100.0) as u8);
            }
        };

        let output = engine.recognize(image, &self.language, &forward)?;
        require_text(output, Method::Direct)
    }
}

/// The engine driven through a dedicated worker lifecycle
pub struct Worker {
    engine: Option<Arc<dyn OcrEngine>>,
    language: String,
}

impl Worker {
    pub fn new(engine: Option<Arc<dyn OcrEngine>>, language: impl Into<String>) -> Self {
        Self {
            engine,
            language: language.into(),
        }
    }
}

fn drive_worker(
    worker: &mut dyn EngineWorker,
    image: &DocumentImage,
    language: &str,
) -> Result<EngineOutput, OcrError> {
    worker.load()?;
    worker.load_language(language)?;
    worker.initialize(language)?;
    worker.recognize(image)
}

impl Strategy for Worker {
    fn method(&self) -> Method {
        Method::Worker
    }

    fn attempt(
        &self,
        image: &DocumentImage,
        _progress: AttemptProgress<'_>,
    ) -> Result<RecognitionResult, OcrError> {
        let engine = self.engine.as_ref().ok_or(OcrError::EngineUnavailable)?;
        let mut worker = engine.create_worker()?;

        let outcome = drive_worker(worker.as_mut(), image, &self.language);

        // Released on every path
        if let Err(e) = worker.terminate() {
            tracing::warn!("Failed to terminate {} worker: {}", engine.name(), e);
        }

        require_text(outcome?, Method::Worker)
    }
}

/// Brightness-threshold band scan. Structural only: it reports which bands
/// look text-bearing, it does not read characters.
pub struct Heuristic;

impl Strategy for Heuristic {
    fn method(&self) -> Method {
        Method::Heuristic
    }

    fn attempt(
        &self,
        image: &DocumentImage,
        _progress: AttemptProgress<'_>,
    ) -> Result<RecognitionResult, OcrError> {
        let raster = decode_raster(image.bytes())?;
        let text = detect_text_bands(&raster);
        Ok(RecognitionResult::from_text(text, Method::Heuristic))
    }
}

pub(crate) fn decode_raster(data: &[u8]) -> Result<RgbImage, OcrError> {
    image::load_from_memory(data)
        .map(|img| img.to_rgb8())
        .map_err(|e| OcrError::DecodeError(format!("Canvas processing failed: {}", e)))
}

/// One line per text-bearing band, or [`NO_TEXT_MARKER`] when none qualifies
pub fn detect_text_bands(raster: &RgbImage) -> String {
    let (width, height) = raster.dimensions();
    let mut lines = Vec::new();

    for y in (0..height).step_by(BAND_HEIGHT as usize) {
        let markers: String = (0..width)
            .step_by(SAMPLE_STRIDE as usize)
            .map(|x| {
                let [r, g, b] = raster.get_pixel(x, y).0;
                let brightness = (r as f32 + g as f32 + b as f32) / 3.0;
                if brightness < DARK_THRESHOLD {
                    'X'
                } else {
                    ' '
                }
            })
            .collect();

        if markers.trim().len() > MIN_MARKER_SPAN {
            lines.push(format!("[Text detected on line {}]", y / BAND_HEIGHT + 1));
        }
    }

    if lines.is_empty() {
        NO_TEXT_MARKER.to_string()
    } else {
        lines.join("\n")
    }
}

/// Deterministic stand-in used when every strategy failed
pub fn placeholder(image: &DocumentImage) -> RecognitionResult {
    let name = image.name.as_deref().unwrap_or("unnamed document");
    let mime = if image.mime_type.is_empty() {
        "unknown"
    } else {
        image.mime_type.as_str()
    };
    let slot = "[Please fill manually]";

    let text = format!(
        "Document: {name}\n\
         Size: {size:.1} KB\n\
         Type: {mime}\n\
         \n\
         [OCR unavailable - manual verification needed]\n\
         \n\
         Name: {slot}\n\
         Father's Name: {slot}\n\
         Village: {slot}\n\
         District: {slot}\n\
         Date: {slot}\n\
         \n\
         Note: OCR processing encountered issues. Please verify and fill the form manually.",
        size = image.size() as f64 / 1024.0,
    );

    RecognitionResult::from_text(text, Method::Placeholder)
}

/// The fixed strategy order for a given engine
pub fn default_strategies(
    engine: Option<Arc<dyn OcrEngine>>,
    language: &str,
) -> Vec<Arc<dyn Strategy>> {
    vec![
        Arc::new(Direct::new(engine.clone(), language)),
        Arc::new(Worker::new(engine, language)),
        Arc::new(Heuristic),
    ]
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::engine::{EngineProgressFn, Line, Word};
    use crate::result::FALLBACK_CONFIDENCE;
    use image::{ImageFormat, Rgb};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    pub(crate) fn png_bytes(raster: &RgbImage) -> Vec<u8> {
        let mut out = Vec::new();
        raster
            .write_to(&mut std::io::Cursor::new(&mut out), ImageFormat::Png)
            .unwrap();
        out
    }

    pub(crate) fn white_page(width: u32, height: u32) -> DocumentImage {
        let raster = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
        DocumentImage::new(Some("blank.png".into()), "image/png", png_bytes(&raster))
    }

    /// Scriptable engine for strategy and orchestrator tests
    #[derive(Default)]
    pub(crate) struct FakeEngine {
        pub direct_text: Option<String>,
        pub worker_text: Option<String>,
        pub fail_worker_at: Option<&'static str>,
        pub terminated: Arc<AtomicBool>,
        pub direct_calls: AtomicUsize,
        pub panic_on_direct: bool,
        pub sleep_on_direct: Option<std::time::Duration>,
        pub unhealthy: bool,
    }

    impl OcrEngine for FakeEngine {
        fn name(&self) -> &'static str {
            "fake"
        }

        fn description(&self) -> &'static str {
            "scripted test engine"
        }

        fn recognize(
            &self,
            _image: &DocumentImage,
            _language: &str,
            progress: EngineProgressFn<'_>,
        ) -> Result<EngineOutput, OcrError> {
            self.direct_calls.fetch_add(1, Ordering::SeqCst);
            if self.panic_on_direct {
                panic!("engine crashed");
            }
            if let Some(delay) = self.sleep_on_direct {
                std::thread::sleep(delay);
            }
            progress(EngineProgress {
                phase: EnginePhase::Loading,
                fraction: 0.9,
            });
            for fraction in [0.0, 0.5, 1.0] {
                progress(EngineProgress {
                    phase: EnginePhase::Recognizing,
                    fraction,
                });
            }
            match &self.direct_text {
                Some(text) => Ok(EngineOutput {
                    text: text.clone(),
                    confidence: Some(91.0),
                    words: vec![Word {
                        text: "word".into(),
                        bbox: None,
                    }],
                    lines: vec![Line {
                        text: text.clone(),
                        bbox: None,
                        words: Vec::new(),
                    }],
                    warnings: Vec::new(),
                }),
                None => Err(OcrError::ProcessingError("direct failed".into())),
            }
        }

        fn create_worker(&self) -> Result<Box<dyn EngineWorker>, OcrError> {
            Ok(Box::new(FakeWorker {
                text: self.worker_text.clone(),
                fail_at: self.fail_worker_at,
                terminated: Arc::clone(&self.terminated),
            }))
        }

        fn health(&self) -> Result<(), OcrError> {
            if self.unhealthy {
                Err(OcrError::InitializationError("models missing".into()))
            } else {
                Ok(())
            }
        }

        fn supported_formats(&self) -> Vec<String> {
            vec!["image/png".into()]
        }

        fn supported_languages(&self) -> Vec<String> {
            vec!["eng".into()]
        }
    }

    struct FakeWorker {
        text: Option<String>,
        fail_at: Option<&'static str>,
        terminated: Arc<AtomicBool>,
    }

    impl FakeWorker {
        fn step(&self, stage: &'static str) -> Result<(), OcrError> {
            if self.fail_at == Some(stage) {
                Err(OcrError::worker(stage, "scripted failure"))
            } else {
                Ok(())
            }
        }
    }

    impl EngineWorker for FakeWorker {
        fn load(&mut self) -> Result<(), OcrError> {
            self.step("load")
        }

        fn load_language(&mut self, _language: &str) -> Result<(), OcrError> {
            self.step("load_language")
        }

        fn initialize(&mut self, _language: &str) -> Result<(), OcrError> {
            self.step("initialize")
        }

        fn recognize(&mut self, _image: &DocumentImage) -> Result<EngineOutput, OcrError> {
            self.step("recognize")?;
            Ok(EngineOutput {
                text: self.text.clone().unwrap_or_default(),
                ..Default::default()
            })
        }

        fn terminate(self: Box<Self>) -> Result<(), OcrError> {
            self.terminated.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_direct_forwards_only_recognizing_progress() {
        let engine: Arc<dyn OcrEngine> = Arc::new(FakeEngine {
            direct_text: Some("Name: Ram Singh".into()),
            ..Default::default()
        });
        let seen = Mutex::new(Vec::new());
        let report = |p: u8| seen.lock().unwrap().push(p);

        let result = Direct::new(Some(engine), "eng")
            .attempt(&white_page(10, 10), Some(&report))
            .unwrap();

        assert_eq!(result.method, Method::Direct);
        assert_eq!(result.confidence, 91.0);
        assert_eq!(result.words.len(), 1);
        assert_eq!(*seen.lock().unwrap(), vec![0, 50, 100]);
    }

    #[test]
    fn test_direct_without_engine_fails() {
        let err = Direct::new(None, "eng")
            .attempt(&white_page(10, 10), None)
            .unwrap_err();
        assert!(matches!(err, OcrError::EngineUnavailable));
    }

    #[test]
    fn test_direct_rejects_blank_text() {
        let engine: Arc<dyn OcrEngine> = Arc::new(FakeEngine {
            direct_text: Some("   \n ".into()),
            ..Default::default()
        });
        let err = Direct::new(Some(engine), "eng")
            .attempt(&white_page(10, 10), None)
            .unwrap_err();
        assert!(matches!(err, OcrError::EmptyText("direct")));
    }

    #[test]
    fn test_worker_success_uses_fallback_confidence() {
        let fake = FakeEngine {
            worker_text: Some("Village: Jagdalpur".into()),
            ..Default::default()
        };
        let terminated = Arc::clone(&fake.terminated);
        let engine: Arc<dyn OcrEngine> = Arc::new(fake);

        let result = Worker::new(Some(engine), "eng")
            .attempt(&white_page(10, 10), None)
            .unwrap();

        assert_eq!(result.method, Method::Worker);
        assert_eq!(result.text, "Village: Jagdalpur");
        assert_eq!(result.confidence, FALLBACK_CONFIDENCE);
        assert!(terminated.load(Ordering::SeqCst));
    }

    #[test]
    fn test_worker_is_terminated_when_lifecycle_fails() {
        let fake = FakeEngine {
            worker_text: Some("unused".into()),
            fail_worker_at: Some("initialize"),
            ..Default::default()
        };
        let terminated = Arc::clone(&fake.terminated);
        let engine: Arc<dyn OcrEngine> = Arc::new(fake);

        let err = Worker::new(Some(engine), "eng")
            .attempt(&white_page(10, 10), None)
            .unwrap_err();

        assert!(matches!(err, OcrError::WorkerError { stage: "initialize", .. }));
        assert!(terminated.load(Ordering::SeqCst));
    }

    #[test]
    fn test_heuristic_blank_page_needs_manual_verification() {
        let result = Heuristic.attempt(&white_page(200, 100), None).unwrap();
        assert_eq!(result.method, Method::Heuristic);
        assert!(result.success);
        assert_eq!(result.confidence, FALLBACK_CONFIDENCE);
        assert!(result.text.contains("manual verification needed"));
    }

    #[test]
    fn test_heuristic_marks_dark_bands() {
        let mut raster = RgbImage::from_pixel(200, 100, Rgb([250, 250, 250]));
        // Dark stroke across band 3 (rows 40..60), sampled at y = 40
        for x in 20..160 {
            raster.put_pixel(x, 40, Rgb([10, 10, 10]));
        }
        let text = detect_text_bands(&raster);
        assert_eq!(text, "[Text detected on line 3]");
    }

    #[test]
    fn test_heuristic_ignores_short_marks() {
        let mut raster = RgbImage::from_pixel(200, 40, Rgb([255, 255, 255]));
        // Three dark samples (x = 0, 10, 20) span only three markers
        for x in 0..25 {
            raster.put_pixel(x, 0, Rgb([0, 0, 0]));
        }
        assert_eq!(detect_text_bands(&raster), NO_TEXT_MARKER);
    }

    #[test]
    fn test_heuristic_brightness_is_unweighted_mean() {
        let mut raster = RgbImage::from_pixel(100, 20, Rgb([255, 255, 255]));
        // Mean of (255, 0, 0) is 85: dark, although luma-weighted red is not
        for x in 0..100 {
            raster.put_pixel(x, 0, Rgb([255, 0, 0]));
        }
        assert_eq!(detect_text_bands(&raster), "[Text detected on line 1]");
    }

    #[test]
    fn test_heuristic_rejects_undecodable_input() {
        let image = DocumentImage::new(Some("x.png".into()), "image/png", b"garbage".to_vec());
        let err = Heuristic.attempt(&image, None).unwrap_err();
        assert!(matches!(err, OcrError::DecodeError(_)));
    }

    #[test]
    fn test_placeholder_is_deterministic_and_labelled() {
        let image = DocumentImage::new(Some("claim.jpg".into()), "image/jpeg", vec![0u8; 2048]);
        let first = placeholder(&image);
        let second = placeholder(&image);

        assert_eq!(first.text, second.text);
        assert!(first.is_placeholder());
        assert!(first.success);
        assert_eq!(first.confidence, FALLBACK_CONFIDENCE);
        assert!(first.text.contains("Document: claim.jpg"));
        assert!(first.text.contains("Size: 2.0 KB"));
        assert!(first.text.contains("Type: image/jpeg"));
        assert!(first.text.contains("Village: [Please fill manually]"));
    }
}
