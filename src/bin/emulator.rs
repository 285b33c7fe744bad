//! multiboot-emulator - expose an emulated multiboot device on a Unix socket.
//!
//! Every connection gets a fresh device, so the host can be pointed at the
//! socket with `multiboot --socket <PATH> <IMAGE>`.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};

use multiboot_protocol::config::LoggingConfig;
use multiboot_protocol::transport::emulated::DeviceSettings;
use multiboot_protocol::utils::logging::init_logging;

/// Emulated multiboot device
#[derive(Parser, Debug)]
#[command(name = "multiboot-emulator")]
#[command(version)]
#[command(about = "Serve an emulated multiboot device over a Unix socket")]
struct Args {
    /// Socket path to listen on
    #[arg(short, long, default_value = "/tmp/multiboot.sock")]
    socket: PathBuf,

    /// Key byte handed out during the key exchange
    #[arg(long, default_value_t = 0xA5)]
    key_byte: u8,

    /// Byte returned with the length response
    #[arg(long, default_value_t = 0xCC)]
    finalizer_byte: u8,

    /// Discovery polls to ignore before answering
    #[arg(long, default_value_t = 3)]
    discovery_delay: u32,

    /// Checksum polls answered as busy
    #[arg(long, default_value_t = 2)]
    crc_delay: u32,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[cfg(unix)]
#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let logging = LoggingConfig {
        app_name: String::from("multiboot-emulator"),
        log_level: if args.verbose { Level::DEBUG } else { Level::INFO },
        ..LoggingConfig::default()
    };
    init_logging(&logging)?;

    let settings = DeviceSettings {
        key_byte: args.key_byte,
        finalizer_byte: args.finalizer_byte,
        discovery_delay: args.discovery_delay,
        crc_delay: args.crc_delay,
    };
    info!(?settings, socket = %args.socket.display(), "Starting emulator");

    multiboot_protocol::transport::local::start_server(&args.socket, settings)
        .await
        .with_context(|| format!("Emulator failed on {}", args.socket.display()))
}

#[cfg(not(unix))]
fn main() -> Result<()> {
    let _ = Args::parse();
    anyhow::bail!(multiboot_protocol::error::constants::ERR_LINK_KIND_UNSUPPORTED)
}
