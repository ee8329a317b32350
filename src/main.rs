use std::process::ExitCode;
use std::time::Duration;

use log::{error, info};
use tokio_util::sync::CancellationToken;

use statuswatch::config::Config;
use statuswatch::fetch::HttpFetcher;
use statuswatch::{notify, worker};

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let channels = match notify::channels_from_config(&config) {
        Ok(channels) => channels,
        Err(e) => {
            error!("Failed to set up notification channels: {e}");
            return ExitCode::FAILURE;
        }
    };

    let fetcher = match HttpFetcher::new(Duration::from_secs(config.monitor.fetch_timeout_secs)) {
        Ok(fetcher) => fetcher,
        Err(e) => {
            error!("Failed to create the fetch client: {e}");
            return ExitCode::FAILURE;
        }
    };

    let token = CancellationToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, shutting down");
                signal_token.cancel();
            }
            Err(e) => error!("Failed to listen for the interrupt signal: {e}"),
        }
    });

    worker::run(&config, fetcher, &channels, token).await;
    ExitCode::SUCCESS
}
