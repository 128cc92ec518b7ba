use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vidgrab_lib::config::AppConfig;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // Colored output for dev, JSON when LOG_FORMAT=json
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("vidgrab=info,vidgrab_lib=info,tower_http=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true).with_target(true))
            .with(env_filter)
            .init();
    }

    let config = AppConfig::from_env();
    info!(
        "Starting vidgrab {} on {}",
        env!("CARGO_PKG_VERSION"),
        config.bind_addr()
    );

    if let Err(e) = vidgrab_lib::run(config, shutdown_signal()).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }

    info!("Server shutdown complete");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
