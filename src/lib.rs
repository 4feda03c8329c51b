//! Document text extraction with tiered OCR fallback.
//!
//! [`Orchestrator`] turns an uploaded image into a [`RecognitionResult`],
//! degrading from engine recognition to a brightness heuristic and finally a
//! labelled placeholder. [`fields`] and [`forms`] turn recognized text into
//! claim fields.

pub mod batch;
pub mod config;
pub mod engine;
pub mod engines;
pub mod error;
pub mod fields;
pub mod forms;
pub mod orchestrator;
pub mod pdf;
pub mod progress;
pub mod result;
pub mod server;
pub mod strategy;

pub use batch::{process_multiple_pages, PageSource};
pub use engine::DocumentImage;
pub use error::OcrError;
pub use fields::{extract_structured_data, StructuredData};
pub use orchestrator::{HealthStatus, Orchestrator};
pub use progress::ProgressFn;
pub use result::{Method, PageResult, RecognitionResult};
