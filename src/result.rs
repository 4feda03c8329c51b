use crate::engine::{EngineOutput, Line, Word};
use serde::Serialize;
use std::fmt;

/// Confidence given to a successful result when no engine confidence exists
pub const FALLBACK_CONFIDENCE: f32 = 50.0;

/// Which strategy produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Direct,
    Worker,
    Heuristic,
    Placeholder,
    Unknown,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Worker => "worker",
            Self::Heuristic => "heuristic",
            Self::Placeholder => "placeholder",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of recognizing one image
#[derive(Debug, Clone, Serialize)]
pub struct RecognitionResult {
    pub text: String,
    /// 0-100
    pub confidence: f32,
    pub words: Vec<Word>,
    pub lines: Vec<Line>,
    pub success: bool,
    pub error: Option<String>,
    pub method: Method,
    /// Failures of the strategies tried before this one
    pub warnings: Vec<String>,
}

impl RecognitionResult {
    /// Build a result from engine output. Missing confidence falls back to
    /// 50 on success and 0 on failure.
    pub fn from_output(output: EngineOutput, method: Method, success: bool) -> Self {
        let confidence = match output.confidence {
            Some(c) if c > 0.0 => c,
            _ if success => FALLBACK_CONFIDENCE,
            _ => 0.0,
        };

        Self {
            text: output.text.trim().to_string(),
            confidence: confidence.clamp(0.0, 100.0),
            words: output.words,
            lines: output.lines,
            success,
            error: None,
            method,
            warnings: output.warnings,
        }
    }

    /// A successful result carrying text only
    pub fn from_text(text: impl Into<String>, method: Method) -> Self {
        Self::from_output(
            EngineOutput {
                text: text.into(),
                ..Default::default()
            },
            method,
            true,
        )
    }

    /// A failed result with no text
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            text: String::new(),
            confidence: 0.0,
            words: Vec::new(),
            lines: Vec::new(),
            success: false,
            error: Some(error.into()),
            method: Method::Unknown,
            warnings: Vec::new(),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.method == Method::Placeholder
    }

    /// Heuristic and placeholder output carries no recognized characters
    pub fn needs_manual_verification(&self) -> bool {
        matches!(self.method, Method::Heuristic | Method::Placeholder) || !self.success
    }
}

/// One page of a batch
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResult {
    /// 1-based position in the batch
    pub page_number: usize,
    pub file_name: String,
    #[serde(flatten)]
    pub result: RecognitionResult,
}
