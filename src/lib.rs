//! portprobe - concurrent TCP connect prober
//!
//! Probes an inclusive port range on one resolved address with a bounded
//! pool of concurrent TCP connect attempts and reports the open ports in
//! ascending order.

pub mod config;
pub mod error;
pub mod network;
pub mod output;
pub mod scanner;
pub mod utils;

// Re-export commonly used types
pub use config::{FileConfig, ProbeConfig};
pub use error::ScanError;
pub use network::{CloseReason, PortProber, PortRange, ProbeFailure, ProbeOutcome, TcpConnectProber};
pub use scanner::{scan, ScanEngine, ScanObserver, ScanReport, ScanStats};
pub use tokio_util::sync::CancellationToken;

pub type Result<T> = std::result::Result<T, ScanError>;
