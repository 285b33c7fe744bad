//! multiboot - push a program image to a device over a 32-bit word link.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn, Level};

use multiboot_protocol::config::{LinkConfig, LinkKind, MultibootConfig};
use multiboot_protocol::error::constants::ERR_SESSION_TASK;
use multiboot_protocol::transport::emulated::EmulatedDevice;
use multiboot_protocol::transport::stream::open_device;
use multiboot_protocol::utils::logging::init_logging;
use multiboot_protocol::utils::metrics::global_metrics;
use multiboot_protocol::{
    CancelToken, Image, Multiboot, MultibootReport, PollPolicy, Transport, WordExchanger,
};

/// Send a multiboot image and verify the transfer checksum
#[derive(Parser, Debug)]
#[command(name = "multiboot")]
#[command(version)]
#[command(about = "Transfer a program image using the multiboot handshake")]
struct Cli {
    /// Image file to send (at most 256 KiB)
    image: PathBuf,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Character device or serial bridge to use as the link
    #[arg(long, conflicts_with_all = ["socket", "emulate"])]
    device: Option<String>,

    /// Unix socket bridge to use as the link
    #[arg(long, conflicts_with = "emulate")]
    socket: Option<String>,

    /// Run against an in-process emulated device
    #[arg(long)]
    emulate: bool,

    /// Give up waiting for the peer after this many milliseconds (0 waits forever)
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Log every exchanged word
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    init_logging(&config.logging)?;

    let problems = config.validate();
    for warning in problems.iter().filter(|p| p.starts_with("WARNING")) {
        warn!("{warning}");
    }
    let errors: Vec<_> = problems
        .iter()
        .filter(|p| !p.starts_with("WARNING"))
        .collect();
    if !errors.is_empty() {
        return Err(anyhow!(
            "Invalid configuration:\n  - {}",
            errors
                .iter()
                .map(|e| e.as_str())
                .collect::<Vec<_>>()
                .join("\n  - ")
        ));
    }

    let image = Image::from_file(&cli.image)
        .with_context(|| format!("Cannot load image {}", cli.image.display()))?;
    info!(
        path = %cli.image.display(),
        bytes = image.len(),
        transfer_size = image.transfer_size(),
        "Image loaded"
    );

    let cancel = CancelToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if let Ok(()) = tokio::signal::ctrl_c().await {
            info!("Received CTRL+C signal, cancelling session");
            ctrl_c_token.cancel();
        }
    });

    let link = config.link.clone();
    let policy = config.poll.policy();
    let verbose = config.logging.log_exchanges;
    let report = tokio::task::spawn_blocking(move || {
        run_session(&link, policy, cancel, verbose, &image)
    })
    .await
    .context(ERR_SESSION_TASK)??;

    print_report(&report);
    global_metrics().log_metrics();
    Ok(())
}

fn load_config(cli: &Cli) -> Result<MultibootConfig> {
    let mut config = match &cli.config {
        Some(path) => MultibootConfig::from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => MultibootConfig::default(),
    };
    config.apply_env()?;

    if let Some(device) = &cli.device {
        config.link.kind = LinkKind::Device;
        config.link.path = device.clone();
    }
    if let Some(socket) = &cli.socket {
        config.link.kind = LinkKind::Socket;
        config.link.path = socket.clone();
    }
    if cli.emulate {
        config.link.kind = LinkKind::Emulated;
    }
    if let Some(timeout) = cli.timeout_ms {
        config.poll.timeout = Duration::from_millis(timeout);
    }
    if cli.verbose {
        config.logging.log_exchanges = true;
        // More verbose levels compare greater.
        if config.logging.log_level < Level::DEBUG {
            config.logging.log_level = Level::DEBUG;
        }
    }
    Ok(config)
}

fn open_link(link: &LinkConfig) -> Result<Box<dyn Transport + Send>> {
    let transport: Box<dyn Transport + Send> = match link.kind {
        LinkKind::Device => Box::new(open_device(&link.path)?),
        #[cfg(unix)]
        LinkKind::Socket => Box::new(multiboot_protocol::transport::local::connect(&link.path)?),
        #[cfg(not(unix))]
        LinkKind::Socket => {
            return Err(anyhow!(
                multiboot_protocol::error::constants::ERR_LINK_KIND_UNSUPPORTED
            ))
        }
        LinkKind::Emulated => Box::new(EmulatedDevice::default()),
    };
    Ok(transport)
}

fn run_session(
    link: &LinkConfig,
    policy: PollPolicy,
    cancel: CancelToken,
    verbose: bool,
    image: &Image,
) -> Result<MultibootReport> {
    let transport = open_link(link)?;
    let exchanger = WordExchanger::new(transport)
        .with_policy(policy)
        .with_cancel_token(cancel)
        .announce_exchanges(verbose);
    let mut session = Multiboot::with_exchanger(exchanger);
    let report = session.run(image)?;
    Ok(report)
}

fn print_report(report: &MultibootReport) {
    println!("Multiboot complete");
    println!("  transfer size:  {} bytes", report.transfer_size);
    println!("  length word:    {:#010x}", report.length_word);
    println!("  handshake word: {:#06x}", report.handshake_word);
    println!("  payload words:  {}", report.payload_words);
    println!("  checksum:       {:#06x}", report.checksum);
    if report.checksum_matches() {
        println!("  peer checksum:  {:#06x} (match)", report.peer_checksum);
    } else {
        println!("  peer checksum:  {:#06x} (MISMATCH)", report.peer_checksum);
    }
    println!("  exchanges:      {}", report.exchanges);
}
