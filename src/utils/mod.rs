//! Logging, name resolution and process limit helpers used by the CLI

use std::fs::OpenOptions;
use std::io::Write;
use std::net::{IpAddr, ToSocketAddrs};
use std::path::Path;
use std::sync::Mutex;

/// Default log file, appended to on every run
pub const DEFAULT_LOG_FILE: &str = "scan_results.log";

/// Logging utilities
pub struct Logger;

impl Logger {
    /// Initialize the process-wide logger
    ///
    /// Records at `level` or above go to stderr. When `log_file` is given,
    /// records are also appended there with an info floor, so open ports are
    /// recorded even on a quiet terminal. `RUST_LOG` still adds per-module
    /// filters.
    pub fn init(level: log::LevelFilter, log_file: Option<&Path>) -> crate::Result<()> {
        let file = match log_file {
            Some(path) => Some(Mutex::new(
                OpenOptions::new().create(true).append(true).open(path)?,
            )),
            None => None,
        };
        let max_level = Self::file_level(level, file.is_some());

        env_logger::Builder::from_default_env()
            .filter_level(max_level)
            .format(move |buf, record| {
                let line = format!(
                    "[{} {} {}] {}",
                    buf.timestamp_seconds(),
                    record.level(),
                    record.target(),
                    record.args()
                );
                if let Some(file) = &file {
                    if let Ok(mut file) = file.lock() {
                        writeln!(file, "{}", line)?;
                    }
                }
                if record.level() <= level {
                    writeln!(buf, "{}", line)
                } else {
                    Ok(())
                }
            })
            .try_init()
            .map_err(|e| crate::ScanError::InvalidConfig(format!("Logger already initialized: {}", e)))
    }

    /// Map `-v` occurrences to the stderr level filter
    pub fn level_from_verbosity(verbosity: u8) -> log::LevelFilter {
        match verbosity {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }

    /// Most verbose level any sink wants
    pub fn file_level(stderr_level: log::LevelFilter, has_file: bool) -> log::LevelFilter {
        if has_file {
            stderr_level.max(log::LevelFilter::Info)
        } else {
            stderr_level
        }
    }
}

/// Resolve a hostname or literal address to a single IP address
///
/// This is a blocking lookup, performed once before a scan starts.
pub fn resolve_target(host: &str) -> crate::Result<IpAddr> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ip);
    }

    let mut addrs = (host, 0)
        .to_socket_addrs()
        .map_err(|e| crate::ScanError::ResolveError(format!("{}: {}", host, e)))?;

    addrs
        .next()
        .map(|addr| addr.ip())
        .ok_or_else(|| crate::ScanError::ResolveError(format!("No IP addresses found for {}", host)))
}

/// Raise the open file limit so `concurrency` sockets fit, returning the soft limit
#[cfg(unix)]
pub fn adjust_ulimit_size(ulimit: Option<u64>) -> Option<u64> {
    use rlimit::Resource;

    if let Some(limit) = ulimit {
        match Resource::NOFILE.set(limit, limit) {
            Ok(()) => log::info!("Raised open file limit to {}", limit),
            Err(e) => log::warn!("Failed to set open file limit to {}: {}", limit, e),
        }
    }

    match Resource::NOFILE.get() {
        Ok((soft, _)) => Some(soft),
        Err(e) => {
            log::warn!("Could not read open file limit: {}", e);
            None
        }
    }
}

#[cfg(not(unix))]
pub fn adjust_ulimit_size(_ulimit: Option<u64>) -> Option<u64> {
    None
}
