//! Cancelling a scan with real connects still pending must close every socket
//!
//! Kept in its own test binary so no concurrently running test opens
//! descriptors while they are being counted.

#![cfg(target_os = "linux")]

use portprobe::{CancellationToken, PortRange, ProbeConfig, ScanEngine, ScanError};
use std::net::{IpAddr, Ipv4Addr};
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpSocket, TcpStream};

const LISTENERS: usize = 3;

fn open_fds() -> usize {
    std::fs::read_dir("/proc/self/fd")
        .map(|dir| dir.count())
        .unwrap_or(0)
}

/// Listener with a backlog of one whose accept queue is already full
///
/// Linux drops further SYNs for it, so new connects stay pending until
/// their timeout.
async fn saturated_listener() -> (TcpListener, Vec<TcpStream>) {
    let socket = TcpSocket::new_v4().unwrap();
    socket.bind("127.0.0.1:0".parse().unwrap()).unwrap();
    let listener = socket.listen(1).unwrap();
    let addr = listener.local_addr().unwrap();

    let mut queued = Vec::new();
    for _ in 0..4 {
        if let Ok(Ok(stream)) =
            tokio::time::timeout(Duration::from_millis(200), TcpStream::connect(addr)).await
        {
            queued.push(stream);
        }
    }

    (listener, queued)
}

#[tokio::test]
async fn test_cancel_with_pending_connects_closes_sockets() {
    let mut listeners = Vec::new();
    let mut queued = Vec::new();
    for _ in 0..LISTENERS {
        let (listener, streams) = saturated_listener().await;
        listeners.push(listener);
        queued.extend(streams);
    }

    let mut ports: Vec<u16> = listeners
        .iter()
        .map(|l| l.local_addr().unwrap().port())
        .collect();
    ports.sort_unstable();
    let range = PortRange::new(ports[0], ports[LISTENERS - 1]).unwrap();

    let baseline = open_fds();

    let engine = ScanEngine::new(ProbeConfig::new(30_000, LISTENERS)).unwrap();
    let cancel = CancellationToken::new();
    let scan = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            engine
                .scan_until_cancelled(IpAddr::V4(Ipv4Addr::LOCALHOST), range, cancel)
                .await
        }
    });

    // Wait until the pool holds its sockets, or give up and cancel anyway.
    let deadline = Instant::now() + Duration::from_secs(5);
    while open_fds() < baseline + LISTENERS && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(!scan.is_finished(), "connects to saturated listeners completed");

    let started = Instant::now();
    cancel.cancel();
    let result = scan.await.unwrap();

    assert!(matches!(result, Err(ScanError::Cancelled)));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(
        open_fds() <= baseline,
        "descriptors leaked after cancellation: {} > {}",
        open_fds(),
        baseline
    );

    drop(queued);
    drop(listeners);
}
