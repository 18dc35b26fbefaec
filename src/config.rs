//! Configuration module for the portprobe scanner

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Default per-probe timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 500;

/// Default number of simultaneously active probes
pub const DEFAULT_CONCURRENCY: usize = 100;

/// Name of the per-user configuration file looked up in the home directory
pub const DEFAULT_CONFIG_FILE: &str = ".portprobe.toml";

/// Probe configuration shared by every probe of one scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Timeout for each connection attempt in milliseconds
    pub timeout: u64,

    /// Upper bound on simultaneously in-flight probes
    pub concurrency: usize,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT_MS,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl ProbeConfig {
    pub fn new(timeout: u64, concurrency: usize) -> Self {
        Self { timeout, concurrency }
    }

    /// Set the timeout in milliseconds
    pub fn with_timeout(mut self, timeout: u64) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the concurrency limit
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Get timeout as Duration
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.timeout == 0 {
            return Err(crate::ScanError::InvalidConfig(
                "Timeout must be greater than 0".to_string(),
            ));
        }

        if self.concurrency == 0 {
            return Err(crate::ScanError::InvalidConfig(
                "Concurrency must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// On-disk configuration file format
///
/// Every key is optional; missing keys fall back to the built-in defaults,
/// and command line flags take precedence over anything set here.
///
/// ```toml
/// timeout = 500
/// concurrency = 100
/// start = 1
/// end = 1024
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub timeout: Option<u64>,
    pub concurrency: Option<usize>,
    pub start: Option<u16>,
    pub end: Option<u16>,
}

impl FileConfig {
    /// Parse configuration from a TOML string
    pub fn from_toml_str(content: &str) -> crate::Result<Self> {
        toml::from_str(content)
            .map_err(|e| crate::ScanError::InvalidConfig(format!("Failed to parse TOML: {}", e)))
    }

    /// Load configuration from TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            crate::ScanError::InvalidConfig(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        Self::from_toml_str(&content)
    }

    /// Load configuration from `~/.portprobe.toml`, or defaults if absent
    pub fn load_default_config() -> crate::Result<Self> {
        let Some(home_dir) = dirs::home_dir() else {
            return Ok(Self::default());
        };

        let path = home_dir.join(DEFAULT_CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }

        let config = Self::from_toml_file(&path)?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Probe configuration with the file's values applied over the defaults
    pub fn probe_config(&self) -> ProbeConfig {
        let defaults = ProbeConfig::default();
        ProbeConfig {
            timeout: self.timeout.unwrap_or(defaults.timeout),
            concurrency: self.concurrency.unwrap_or(defaults.concurrency),
        }
    }
}
