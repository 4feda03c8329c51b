use clap::Parser;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "docdigitize-ocr-server")]
#[command(about = "Document text extraction server with tiered OCR fallback")]
#[command(version)]
pub struct Args {
    /// Host address to bind to
    #[arg(long, env = "OCR_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "OCR_PORT", default_value = "9292")]
    pub port: u16,

    /// Default language for OCR (e.g., "eng", "hin")
    #[arg(long, env = "OCR_DEFAULT_LANGUAGE", default_value = "eng")]
    pub default_language: String,

    /// Maximum file size in bytes (default: 50MB)
    #[arg(long, env = "OCR_MAX_FILE_SIZE", default_value = "52428800")]
    pub max_file_size: usize,

    /// Maximum number of pages accepted in one batch request
    #[arg(long, env = "OCR_MAX_BATCH_PAGES", default_value = "50")]
    pub max_batch_pages: usize,

    /// Deadline for a single recognition strategy attempt, in seconds
    #[arg(long, env = "OCR_STRATEGY_TIMEOUT_SECS", default_value = "60")]
    pub strategy_timeout_secs: u64,

    /// Skip engine initialization and run on the heuristic/placeholder tiers only
    #[arg(long, env = "OCR_DISABLE_ENGINES")]
    pub disable_engines: bool,

    /// Path to tessdata directory (uses TESSDATA_PREFIX env var if not set)
    #[arg(long, env = "TESSDATA_PREFIX")]
    pub tessdata_path: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

/// Server and pipeline configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub default_language: String,
    pub max_file_size: usize,
    pub max_batch_pages: usize,
    pub strategy_timeout: Duration,
    pub disable_engines: bool,
    pub tessdata_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9292,
            default_language: "eng".to_string(),
            max_file_size: 52_428_800,
            max_batch_pages: 50,
            strategy_timeout: Duration::from_secs(60),
            disable_engines: false,
            tessdata_path: None,
        }
    }
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Self {
            host: args.host,
            port: args.port,
            default_language: args.default_language,
            max_file_size: args.max_file_size,
            max_batch_pages: args.max_batch_pages,
            strategy_timeout: Duration::from_secs(args.strategy_timeout_secs.max(1)),
            disable_engines: args.disable_engines,
            tessdata_path: args.tessdata_path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults_match_config_defaults() {
        let args = Args::parse_from(["docdigitize-ocr-server"]);
        let config = Config::from(args);
        let defaults = Config::default();

        assert_eq!(config.port, defaults.port);
        assert_eq!(config.default_language, defaults.default_language);
        assert_eq!(config.max_batch_pages, defaults.max_batch_pages);
        assert_eq!(config.strategy_timeout, defaults.strategy_timeout);
    }

    #[test]
    fn test_zero_timeout_is_raised_to_one_second() {
        let args = Args::parse_from([
            "docdigitize-ocr-server",
            "--strategy-timeout-secs",
            "0",
            "--disable-engines",
        ]);
        let config = Config::from(args);
        assert_eq!(config.strategy_timeout, Duration::from_secs(1));
        assert!(config.disable_engines);
    }
}
