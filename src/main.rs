mod bluetooth;
mod buffer;
mod config;
mod database;
mod error;
mod models;
mod scheduler;
mod sink;
mod utils;

use log::{error, info};
use std::sync::Arc;
use tokio::time::Instant;
use time::OffsetDateTime;

use bluetooth::{AdvertisementHandler, BluezScanner};
use buffer::ReadingBuffer;
use config::ServiceConfig;
use database::PostgresSink;
use error::ScanError;
use scheduler::FlushScheduler;
use utils::format_datetime;

/// Scan and flush until the advertisement source fails
async fn run_service(config: ServiceConfig, scanner: &mut BluezScanner) -> ScanError {
    info!(
        "Starting RuuviTag relay for '{}' at {}",
        config.sensor_name,
        format_datetime(&OffsetDateTime::now_utc())
    );

    let buffer = Arc::new(ReadingBuffer::new());
    let sink = Arc::new(PostgresSink::new(
        config.database_url.clone(),
        config.latest_device_name.clone(),
    ));

    let handler = AdvertisementHandler::new(config.sensor_name.clone(), Arc::clone(&buffer));
    scanner.subscribe(handler.into_callback());
    if let Err(e) = scanner.start().await {
        return e;
    }

    let scheduler = FlushScheduler::new(buffer, sink, config.flush_policy, Instant::now());

    // The scheduler never returns; only the scanner can end the service
    tokio::select! {
        _ = scheduler.run(config.scheduler_tick) => ScanError::StreamEnded,
        e = scanner.closed() => e,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format_timestamp_secs()
        .init();

    // Load configuration
    let config = match ServiceConfig::new() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Handle Ctrl+C gracefully
    let (tx, mut rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        let _ = tx.send(());
    });

    let mut scanner = BluezScanner::new();

    // Run until the scanner fails or a shutdown signal arrives
    let outcome = tokio::select! {
        e = run_service(config, &mut scanner) => Err(e),
        Ok(()) = &mut rx => Ok(()),
    };
    scanner.stop();

    match outcome {
        Ok(()) => {
            info!("Program terminated by user. Exiting gracefully.");
            Ok(())
        }
        Err(e) => {
            error!("Fatal error: {}", e);
            Err(e.into())
        }
    }
}
