mod config;
mod headway;
mod providers;
mod report;
mod scheduler;

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::Config;
use scheduler::ReportBot;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // Load config
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.yaml".into());
    let config = Config::load(&config_path).expect("Failed to load config");
    tracing::info!(
        config = %config_path,
        timezone = %config.schedule.timezone,
        "Loaded configuration"
    );

    let bot = Arc::new(ReportBot::new(config).expect("Failed to initialize report bot"));
    bot.start().await;
}
