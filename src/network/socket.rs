//! TCP connect probing

use super::{CloseReason, ProbeFailure, ProbeOutcome};
use async_trait::async_trait;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::net::TcpStream;

/// Strategy for deciding whether a single port accepts connections
///
/// The scan engine only talks to this trait, so tests can swap the real
/// socket prober for a simulated or instrumented one.
#[async_trait]
pub trait PortProber: Send + Sync {
    async fn probe(&self, target: IpAddr, port: u16) -> ProbeOutcome;
}

/// TCP connect prober with a fixed per-attempt timeout
#[derive(Debug, Clone)]
pub struct TcpConnectProber {
    timeout: Duration,
}

impl TcpConnectProber {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl PortProber for TcpConnectProber {
    /// Perform a TCP connect on a single port
    ///
    /// The stream, or the pending connect future on timeout, is dropped
    /// before returning, which closes the socket on every path.
    async fn probe(&self, target: IpAddr, port: u16) -> ProbeOutcome {
        let addr = SocketAddr::new(target, port);

        match tokio::time::timeout(self.timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => {
                drop(stream);
                ProbeOutcome::Open(port)
            }
            Ok(Err(e)) => classify_connect_error(port, &e),
            Err(_) => ProbeOutcome::Closed(port, CloseReason::TimedOut),
        }
    }
}

/// Map a failed connect to a probe outcome
pub fn classify_connect_error(port: u16, err: &io::Error) -> ProbeOutcome {
    match err.kind() {
        // Some stacks surface the RST answering a SYN as a reset.
        io::ErrorKind::ConnectionRefused | io::ErrorKind::ConnectionReset => {
            ProbeOutcome::Closed(port, CloseReason::Refused)
        }
        io::ErrorKind::TimedOut => ProbeOutcome::Closed(port, CloseReason::TimedOut),
        _ => ProbeOutcome::Error(port, ProbeFailure::from(err)),
    }
}
