//! Unix-socket link.
//!
//! The client side is blocking and plugs straight into the session engine.
//! The server side is async and exposes an [`EmulatedDevice`] per connection,
//! speaking the same framing: 4 bytes in, 4 bytes out, big-endian. This lets a
//! host be exercised end to end without hardware.

use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, instrument, warn};

use crate::error::{ProtocolError, Result};
use crate::transport::emulated::{DeviceSettings, EmulatedDevice};
use crate::transport::stream::StreamTransport;

/// Connect to a Unix-socket link bridge.
#[instrument(skip(path), fields(socket_path = %path.as_ref().display()))]
pub fn connect<P: AsRef<Path>>(path: P) -> Result<StreamTransport<StdUnixStream>> {
    let stream = StdUnixStream::connect(path.as_ref()).map_err(|e| {
        ProtocolError::TransportError(format!(
            "Failed to connect to {}: {e}",
            path.as_ref().display()
        ))
    })?;
    info!("Connected to link socket");
    Ok(StreamTransport::new(stream))
}

/// Serve emulated devices until Ctrl-C.
#[instrument(skip(path), fields(socket_path = %path.as_ref().display()))]
pub async fn start_server<P: AsRef<Path>>(path: P, settings: DeviceSettings) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);

    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        if let Ok(()) = tokio::signal::ctrl_c().await {
            info!("Received CTRL+C signal, shutting down");
            let _ = shutdown_tx_clone.send(()).await;
        }
    });

    start_server_with_shutdown(path, settings, shutdown_rx).await
}

/// Serve emulated devices until `shutdown_rx` fires.
///
/// Each connection gets a fresh device, so one connection is one session.
#[instrument(skip(path, shutdown_rx), fields(socket_path = %path.as_ref().display()))]
pub async fn start_server_with_shutdown<P: AsRef<Path>>(
    path: P,
    settings: DeviceSettings,
    mut shutdown_rx: mpsc::Receiver<()>,
) -> Result<()> {
    if path.as_ref().exists() {
        tokio::fs::remove_file(&path).await.ok();
    }

    let path_string = path.as_ref().to_string_lossy().to_string();

    let listener = UnixListener::bind(&path)?;
    info!(path = %path_string, "Emulated device listening on unix socket");

    let active_connections = Arc::new(Mutex::new(0u32));

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("Shutting down emulator. Waiting for sessions to close...");

                let timeout = tokio::time::sleep(Duration::from_secs(10));
                tokio::pin!(timeout);

                loop {
                    tokio::select! {
                        _ = &mut timeout => {
                            warn!("Shutdown timeout reached, forcing exit");
                            break;
                        }
                        _ = tokio::time::sleep(Duration::from_millis(100)) => {
                            let connections = *active_connections.lock().await;
                            if connections == 0 {
                                info!("All sessions closed, shutting down");
                                break;
                            }
                        }
                    }
                }

                if Path::new(&path_string).exists() {
                    if let Err(e) = tokio::fs::remove_file(&path_string).await {
                        error!(error = %e, path = %path_string, "Failed to remove socket file");
                    }
                }

                return Ok(());
            }

            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, _)) => {
                        let active_connections = active_connections.clone();
                        {
                            let mut count = active_connections.lock().await;
                            *count += 1;
                        }

                        tokio::spawn(async move {
                            let device = serve_device(stream, EmulatedDevice::new(settings)).await;
                            info!(
                                verdict = ?device.verdict(),
                                exchanges = device.exchanges(),
                                "Emulated session ended"
                            );

                            let mut count = active_connections.lock().await;
                            *count -= 1;
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "Error accepting connection");
                    }
                }
            }
        }
    }
}

/// Answer words on `stream` until the client disconnects.
pub async fn serve_device(mut stream: UnixStream, mut device: EmulatedDevice) -> EmulatedDevice {
    loop {
        let word = match stream.read_u32().await {
            Ok(word) => word,
            Err(e) => {
                debug!(error = %e, "Client closed link");
                break;
            }
        };
        let response = device.respond(word);
        if let Err(e) = stream.write_u32(response).await {
            warn!(error = %e, "Failed to write response");
            break;
        }
    }
    device
}
