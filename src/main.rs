use clap::Parser;
use docdigitize_ocr::config::{Args, Config};
use docdigitize_ocr::server;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from(args);

    tracing::info!(
        "Starting docdigitize-ocr-server v{}",
        env!("CARGO_PKG_VERSION")
    );
    tracing::info!(
        "Binding to {}:{} (strategy timeout {}s, max batch {} pages)",
        config.host,
        config.port,
        config.strategy_timeout.as_secs(),
        config.max_batch_pages
    );

    server::run(config).await
}
