//! Voice Relay Client
//!
//! Dials a relay server and holds a call until Ctrl-C.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ws_voice_relay::{
    config::RelayConfig,
    net::{client::VoiceClient, DeviceSelection},
    relay::VoiceRelay,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "WebSocket voice relay client", long_about = None)]
struct Args {
    /// Server URL, e.g. ws://192.168.1.10:8080/ws
    #[arg(short, long)]
    url: Option<String>,

    /// Config file (defaults to the per-user config path)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Playback device name ("default" for the host default)
    #[arg(long)]
    playback_device: Option<String>,

    /// Capture device name ("default" for the host default)
    #[arg(long)]
    capture_device: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let mut config = RelayConfig::load_or_default(args.config.as_deref()).context("loading config")?;
    if let Some(url) = args.url {
        config.network.server_url = url;
    }
    if let Some(device) = args.playback_device {
        config.audio.playback_device = device;
    }
    if let Some(device) = args.capture_device {
        config.audio.capture_device = device;
    }
    config.validate().context("invalid config")?;

    let url = config.network.server_url.clone();
    let devices = DeviceSelection::from_config(&config.audio);
    let relay = Arc::new(VoiceRelay::with_cpal(config));
    let client = VoiceClient::new(relay.clone(), devices);

    tracing::info!("Calling {}", url);
    let hangup = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
        }
        tracing::info!("Hanging up...");
    };
    client.run(&url, hangup).await.context("call failed")?;

    tokio::task::spawn_blocking(move || relay.shutdown_all())
        .await
        .context("shutdown task failed")?;
    Ok(())
}
