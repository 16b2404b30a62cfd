//! Voice Relay Server
//!
//! Accepts WebSocket calls and plays the caller through the local devices.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ws_voice_relay::{
    audio::{device::list_devices, Direction},
    config::RelayConfig,
    net::{server::WebServer, DeviceSelection},
    relay::VoiceRelay,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "WebSocket voice relay server", long_about = None)]
struct Args {
    /// Config file (defaults to the per-user config path)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(short, long)]
    bind: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Playback device name ("default" for the host default)
    #[arg(long)]
    playback_device: Option<String>,

    /// Capture device name ("default" for the host default)
    #[arg(long)]
    capture_device: Option<String>,

    /// List available audio devices and exit
    #[arg(long)]
    list_devices: bool,
}

fn print_devices() {
    for direction in [Direction::Capture, Direction::Playback] {
        println!("\n=== {} devices ===", direction);
        for device in list_devices(direction) {
            let marker = if device.is_default { " [DEFAULT]" } else { "" };
            println!("  {}{}", device.name, marker);
        }
    }
    println!();
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
    if args.list_devices {
        print_devices();
        return Ok(());
    }

    let mut config = RelayConfig::load_or_default(args.config.as_deref()).context("loading config")?;
    if let Some(bind) = args.bind {
        config.server.bind_address = bind;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(device) = args.playback_device {
        config.audio.playback_device = device;
    }
    if let Some(device) = args.capture_device {
        config.audio.capture_device = device;
    }
    config.validate().context("invalid config")?;

    tracing::info!("Starting voice relay server");
    let devices = DeviceSelection::from_config(&config.audio);
    let relay = Arc::new(VoiceRelay::with_cpal(config));
    let server = WebServer::new(relay.clone(), devices);

    tokio::select! {
        result = server.run() => result.context("server stopped")?,
        _ = tokio::signal::ctrl_c() => tracing::info!("Shutting down..."),
    }

    let closed = tokio::task::spawn_blocking(move || relay.shutdown_all())
        .await
        .context("shutdown task failed")?;
    tracing::info!("Closed {} session(s)", closed);
    Ok(())
}
