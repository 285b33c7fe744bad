//! End-to-end sessions over the Unix-socket link against the emulator server.

#![cfg(unix)]
#![allow(clippy::unwrap_used, clippy::expect_used)]

use multiboot_protocol::core::image::Image;
use multiboot_protocol::transport::emulated::DeviceSettings;
use multiboot_protocol::transport::local::{connect, start_server_with_shutdown};
use multiboot_protocol::{ErrorKind, Multiboot, MultibootReport, PollPolicy, WordExchanger};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

async fn wait_for_socket(path: &Path) {
    for _ in 0..200 {
        if path.exists() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("server socket never appeared at {}", path.display());
}

fn run_blocking(path: PathBuf, image: Image) -> multiboot_protocol::Result<MultibootReport> {
    let transport = connect(&path)?;
    let policy = PollPolicy {
        interval: Duration::from_millis(1),
        timeout: Some(Duration::from_secs(5)),
        max_attempts: None,
    };
    let mut session = Multiboot::with_exchanger(WordExchanger::new(transport).with_policy(policy));
    session.run(&image)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn session_over_unix_socket() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mb.sock");
    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

    let server_path = path.clone();
    let server = tokio::spawn(async move {
        start_server_with_shutdown(server_path, DeviceSettings::default(), shutdown_rx).await
    });
    wait_for_socket(&path).await;

    let image = Image::from_bytes((0..3000u32).map(|i| (i % 251) as u8).collect::<Vec<u8>>())
        .unwrap();
    let client_path = path.clone();
    let report = tokio::task::spawn_blocking(move || run_blocking(client_path, image))
        .await
        .unwrap()
        .expect("session over socket");

    assert!(report.checksum_matches());
    assert_eq!(report.handshake_word, 0x64B4);

    shutdown_tx.send(()).await.unwrap();
    server.await.unwrap().unwrap();
    assert!(!path.exists(), "socket file should be removed on shutdown");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sessions_get_independent_devices() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mb-concurrent.sock");
    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

    let settings = DeviceSettings {
        key_byte: 0x11,
        ..DeviceSettings::default()
    };
    let server_path = path.clone();
    let server =
        tokio::spawn(async move { start_server_with_shutdown(server_path, settings, shutdown_rx).await });
    wait_for_socket(&path).await;

    let mut tasks = JoinSet::new();
    for n in 0..4usize {
        let client_path = path.clone();
        tasks.spawn_blocking(move || {
            let image = Image::from_bytes(vec![n as u8; 200 + n * 300]).unwrap();
            run_blocking(client_path, image)
        });
    }

    while let Some(res) = tasks.join_next().await {
        let report = res.unwrap().expect("concurrent session");
        assert!(report.checksum_matches());
        assert_eq!(report.key_byte, 0x11);
    }

    shutdown_tx.send(()).await.unwrap();
    server.await.unwrap().unwrap();
}

#[test]
fn connect_to_missing_socket_fails() {
    let dir = tempfile::tempdir().unwrap();
    let err = connect(dir.path().join("nobody-home.sock"))
        .err()
        .expect("connect should fail without a server");
    assert_eq!(err.kind(), ErrorKind::TransportFailure);
}
