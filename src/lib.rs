pub mod commands;
pub mod config;
pub mod fan;
pub mod ir;
pub mod serial;

use std::sync::Arc;

use anyhow::Context;

use config::AppConfig;
use fan::{FanAccessory, JsonFileStateSink, UpdateCoalescer};
use ir::WaveformCatalog;
use serial::{IrTransmitter, LinkManager, TokioSerialConnector};

/// Wire up one fan accessory and serve the console on stdin until it ends
pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let port = config
        .port
        .clone()
        .context("No serial port configured (use --port or the config file)")?;

    let catalog = WaveformCatalog::load(&config.ir_file)
        .with_context(|| format!("Failed to load IR signals from {}", config.ir_file.display()))?;

    let link = LinkManager::spawn(Arc::new(TokioSerialConnector), config.reconnect_interval());
    if let Err(e) = link.open(&port, config.baud_rate).await {
        log::warn!("{}; retrying every {:?}", e, config.reconnect_interval());
    }

    let sink = Arc::new(JsonFileStateSink::new(&config.state_file));
    let initial = sink.load().await.unwrap_or_default();

    let transmitter = IrTransmitter::new(link.clone(), config.protocol_settings());
    let coalescer = UpdateCoalescer::spawn(
        initial,
        Arc::new(catalog),
        transmitter,
        sink,
        config.coalescer_settings(),
    );
    let accessory = FanAccessory::new(link.clone(), coalescer);

    log::info!("IR fan ready on {}", port);

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    tokio::select! {
        result = commands::run_console(&accessory, stdin, tokio::io::stdout()) => {
            result.context("Console failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            log::info!("Exiting");
        }
    }

    accessory.shutdown().await;
    link.close().await?;
    Ok(())
}
