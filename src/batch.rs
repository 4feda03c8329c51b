//! Sequential multi-page processing.

use crate::engine::DocumentImage;
use crate::orchestrator::Orchestrator;
use crate::progress::{ProgressAggregator, ProgressFn};
use crate::result::{PageResult, RecognitionResult};
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};

/// One batch input
#[derive(Debug, Clone)]
pub enum PageSource {
    Image(DocumentImage),
    /// Read from disk when the page's turn comes
    File(PathBuf),
}

impl PageSource {
    pub fn file_name(&self) -> Option<String> {
        match self {
            Self::Image(image) => image.name.clone(),
            Self::File(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned()),
        }
    }

    pub async fn load(self) -> Result<DocumentImage, String> {
        match self {
            Self::Image(image) => Ok(image),
            Self::File(path) => {
                let data = tokio::fs::read(&path)
                    .await
                    .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
                let name = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned());
                Ok(DocumentImage::new(name, mime_from_path(&path), data))
            }
        }
    }
}

fn mime_from_path(path: &Path) -> &'static str {
    let is_pdf = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    if is_pdf {
        return "application/pdf";
    }
    image::ImageFormat::from_path(path)
        .map(|format| format.to_mime_type())
        .unwrap_or("application/octet-stream")
}

/// Run every page through the orchestrator in input order.
///
/// Always returns exactly one [`PageResult`] per input. A page that cannot be
/// read, or whose processing panics, becomes a failed result and the batch
/// carries on with the next page.
pub async fn process_multiple_pages(
    orchestrator: &Orchestrator,
    pages: Vec<PageSource>,
    progress: Option<ProgressFn>,
) -> Vec<PageResult> {
    let total = pages.len();
    let aggregator = ProgressAggregator::new(total, progress);
    let mut results = Vec::with_capacity(total);

    tracing::info!(pages = total, "Starting batch");

    for (index, source) in pages.into_iter().enumerate() {
        let page_number = index + 1;
        let file_name = source
            .file_name()
            .unwrap_or_else(|| format!("page_{}", page_number));

        let page_progress = aggregator.page(index);
        let result = guard_page(page_number, async move {
            let image = source.load().await?;
            Ok::<_, String>(orchestrator.process_image(&image, page_progress).await)
        })
        .await;

        aggregator.complete_page(index);
        results.push(PageResult {
            page_number,
            file_name,
            result,
        });
    }

    results
}

/// Turn a page's error or panic into a failed result.
///
/// Panics inside a strategy are already absorbed by the orchestrator, so this
/// catches the ones raised while loading the page or outside the blocking pool.
async fn guard_page<F>(page_number: usize, page: F) -> RecognitionResult
where
    F: Future<Output = Result<RecognitionResult, String>>,
{
    match AssertUnwindSafe(page).catch_unwind().await {
        Ok(Ok(result)) => result,
        Ok(Err(message)) => {
            tracing::warn!(page = page_number, "Page failed: {}", message);
            RecognitionResult::failed(message)
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            tracing::warn!(page = page_number, "Page processing panicked: {}", message);
            RecognitionResult::failed(message)
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "Page processing panicked".to_string()
    }
}

/// Text of every successful page, separated by blank lines
pub fn combine_successful_text(pages: &[PageResult]) -> String {
    pages
        .iter()
        .filter(|page| page.result.success && !page.result.text.is_empty())
        .map(|page| page.result.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::engine::OcrEngine;
    use crate::engines::EngineRegistry;
    use crate::result::Method;
    use crate::strategy::tests::{png_bytes, white_page, FakeEngine};
    use image::{Rgb, RgbImage};
    use std::sync::{Arc, Mutex};

    fn orchestrator(engine: FakeEngine) -> Orchestrator {
        let engine: Arc<dyn OcrEngine> = Arc::new(engine);
        Orchestrator::new(
            Arc::new(EngineRegistry::from_engines(vec![engine])),
            &Config::default(),
        )
    }

    #[tokio::test]
    async fn test_results_match_inputs_in_order() {
        let orchestrator = orchestrator(FakeEngine {
            direct_text: Some("Name: Ram Singh".into()),
            ..Default::default()
        });
        let mut unnamed = white_page(20, 20);
        unnamed.name = None;

        let pages = vec![
            PageSource::Image(white_page(20, 20)),
            PageSource::Image(unnamed),
            PageSource::File(PathBuf::from("/nonexistent/scan_3.png")),
        ];
        let results = orchestrator.process_multiple_pages(pages, None).await;

        assert_eq!(results.len(), 3);
        assert_eq!(
            results.iter().map(|p| p.page_number).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(results[0].file_name, "blank.png");
        assert_eq!(results[1].file_name, "page_2");
        assert_eq!(results[2].file_name, "scan_3.png");

        assert!(results[0].result.success);
        assert_eq!(results[0].result.method, Method::Direct);

        let failed = &results[2].result;
        assert!(!failed.success);
        assert_eq!(failed.confidence, 0.0);
        assert_eq!(failed.method, Method::Unknown);
        assert!(failed.error.as_deref().unwrap().contains("Failed to read"));
    }

    #[tokio::test]
    async fn test_files_are_read_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("claim.png");
        std::fs::write(
            &path,
            png_bytes(&RgbImage::from_pixel(40, 40, Rgb([255, 255, 255]))),
        )
        .unwrap();

        let orchestrator = orchestrator(FakeEngine::default());
        let results = orchestrator
            .process_multiple_pages(vec![PageSource::File(path)], None)
            .await;

        assert_eq!(results[0].file_name, "claim.png");
        assert_eq!(results[0].result.method, Method::Heuristic);
        assert!(results[0].result.success);
    }

    #[tokio::test]
    async fn test_batch_progress_ends_at_hundred() {
        let orchestrator = orchestrator(FakeEngine {
            direct_text: Some("text".into()),
            ..Default::default()
        });
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        let progress: ProgressFn = Arc::new(move |p| sink_seen.lock().unwrap().push(p));

        let pages = (0..4)
            .map(|_| PageSource::Image(white_page(10, 10)))
            .collect();
        orchestrator
            .process_multiple_pages(pages, Some(progress))
            .await;

        let values = seen.lock().unwrap().clone();
        assert!(values.windows(2).all(|w| w[0] < w[1]), "{:?}", values);
        assert_eq!(values.last(), Some(&100));
        assert_eq!(values.iter().filter(|v| **v == 100).count(), 1);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let orchestrator = orchestrator(FakeEngine::default());
        assert!(orchestrator
            .process_multiple_pages(Vec::new(), None)
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn test_panicking_page_becomes_failed_result() {
        let result = guard_page(2, async {
            if true {
                panic!("decoder exploded");
            }
            Ok::<_, String>(RecognitionResult::from_text("unreachable", Method::Direct))
        })
        .await;

        assert!(!result.success);
        assert_eq!(result.method, Method::Unknown);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.error.as_deref(), Some("decoder exploded"));

        let formatted = guard_page(3, async {
            if true {
                panic!("page {} unreadable", 3);
            }
            Ok::<_, String>(RecognitionResult::failed("unreachable"))
        })
        .await;
        assert_eq!(formatted.error.as_deref(), Some("page 3 unreadable"));
    }

    #[test]
    fn test_mime_from_path() {
        assert_eq!(mime_from_path(Path::new("a/b.PDF")), "application/pdf");
        assert_eq!(mime_from_path(Path::new("scan.jpg")), "image/jpeg");
        assert_eq!(
            mime_from_path(Path::new("notes.xyz")),
            "application/octet-stream"
        );
    }

    #[test]
    fn test_combine_skips_failed_pages() {
        let page = |n: usize, result: RecognitionResult| PageResult {
            page_number: n,
            file_name: format!("page_{}", n),
            result,
        };
        let pages = vec![
            page(1, RecognitionResult::from_text("Name: Ram Singh", Method::Direct)),
            page(2, RecognitionResult::failed("unreadable")),
            page(3, RecognitionResult::from_text("Village: Jagdalpur", Method::Worker)),
        ];
        assert_eq!(
            combine_successful_text(&pages),
            "Name: Ram Singh\n\nVillage: Jagdalpur"
        );
    }
}
