//! Network module: port ranges, probe outcomes and the TCP connect prober

pub mod socket;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::fmt;
use std::io;
use std::ops::RangeInclusive;
use std::str::FromStr;

pub use socket::{classify_connect_error, PortProber, TcpConnectProber};

/// Lowest port that can be probed
pub const MIN_PORT: u16 = 1;

/// Highest port that can be probed
pub const MAX_PORT: u16 = 65535;

/// Inclusive port range `[start, end]` with `1 <= start <= end <= 65535`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PortRange {
    start: u16,
    end: u16,
}

impl PortRange {
    /// Create a validated port range
    pub fn new(start: u16, end: u16) -> crate::Result<Self> {
        let range = Self { start, end };
        range.validate()?;
        Ok(range)
    }

    /// Range containing a single port
    pub fn single(port: u16) -> crate::Result<Self> {
        Self::new(port, port)
    }

    /// Re-check the range invariants
    pub fn validate(&self) -> crate::Result<()> {
        if self.start < MIN_PORT {
            return Err(crate::ScanError::InvalidRange(format!(
                "start port {} is outside {}-{}",
                self.start, MIN_PORT, MAX_PORT
            )));
        }

        if self.start > self.end {
            return Err(crate::ScanError::InvalidRange(format!(
                "start port {} is greater than end port {}",
                self.start, self.end
            )));
        }

        Ok(())
    }

    pub fn start(&self) -> u16 {
        self.start
    }

    pub fn end(&self) -> u16 {
        self.end
    }

    /// Number of ports in the range
    pub fn len(&self) -> usize {
        (self.end - self.start) as usize + 1
    }

    /// A validated range always holds at least one port
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, port: u16) -> bool {
        (self.start..=self.end).contains(&port)
    }

    /// Iterate over every port in ascending order
    pub fn ports(&self) -> RangeInclusive<u16> {
        self.start..=self.end
    }
}

impl IntoIterator for PortRange {
    type Item = u16;
    type IntoIter = RangeInclusive<u16>;

    fn into_iter(self) -> Self::IntoIter {
        self.ports()
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

impl FromStr for PortRange {
    type Err = crate::ScanError;

    /// Parse `"80"` or `"1-1024"`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse_port = |value: &str| {
            value.trim().parse::<u16>().map_err(|_| {
                crate::ScanError::InvalidRange(format!(
                    "'{}' is not a port between {} and {}",
                    value.trim(),
                    MIN_PORT,
                    MAX_PORT
                ))
            })
        };

        match s.split_once('-') {
            Some((start, end)) => Self::new(parse_port(start)?, parse_port(end)?),
            None => Self::single(parse_port(s)?),
        }
    }
}

/// Why a probe counts as closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CloseReason {
    /// The remote end actively refused the connection
    Refused,
    /// No answer within the probe timeout
    TimedOut,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::Refused => write!(f, "refused"),
            CloseReason::TimedOut => write!(f, "timed out"),
        }
    }
}

/// Transport failure other than refusal or timeout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeFailure {
    pub kind: io::ErrorKind,
    pub message: String,
}

impl ProbeFailure {
    pub fn new(kind: io::ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<&io::Error> for ProbeFailure {
    fn from(err: &io::Error) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

impl fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?})", self.message, self.kind)
    }
}

// io::ErrorKind has no serde support, so the kind goes out as its debug name.
impl Serialize for ProbeFailure {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ProbeFailure", 2)?;
        state.serialize_field("kind", &format!("{:?}", self.kind))?;
        state.serialize_field("message", &self.message)?;
        state.end()
    }
}

/// Result of probing a single port
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Open(u16),
    Closed(u16, CloseReason),
    Error(u16, ProbeFailure),
}

impl ProbeOutcome {
    pub fn port(&self) -> u16 {
        match self {
            ProbeOutcome::Open(port)
            | ProbeOutcome::Closed(port, _)
            | ProbeOutcome::Error(port, _) => *port,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, ProbeOutcome::Open(_))
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeOutcome::Open(port) => write!(f, "{}/tcp open", port),
            ProbeOutcome::Closed(port, reason) => write!(f, "{}/tcp closed ({})", port, reason),
            ProbeOutcome::Error(port, failure) => write!(f, "{}/tcp error: {}", port, failure),
        }
    }
}
