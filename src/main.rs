//! Referral Link Bot - Entry Point

use reflink_bot::Config;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    let log_level = std::env::var("RUST_LOG")
        .map(|s| match s.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        })
        .unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_ansi(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Referral Link Bot v{}", env!("CARGO_PKG_VERSION"));

    // Missing token is the one unrecoverable boot condition
    let config = Config::from_env()?;

    // Keep-alive probe endpoint for the hosting platform
    reflink_bot::health::spawn(config.health_port);

    reflink_bot::telegram::run_bot(config).await
}
