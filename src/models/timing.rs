//! Phase timing model for a single HTTP exchange

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Phase durations and start-relative timestamps of one exchange, in whole
/// milliseconds.
///
/// `dns`, `tcp`, `tls`, `server` and `transfer` are the lengths of the
/// individual phases. `lookup`, `connect`, `pre_transfer`, `start_transfer`
/// and `total` are measured from connection acquisition and never decrease
/// in that order. Phases that did not happen stay at zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timing {
    #[serde(rename = "DNS")]
    pub dns: u64,
    #[serde(rename = "TCP")]
    pub tcp: u64,
    #[serde(rename = "TLS")]
    pub tls: u64,
    #[serde(rename = "Server")]
    pub server: u64,
    #[serde(rename = "Transfer")]
    pub transfer: u64,

    #[serde(rename = "Lookup")]
    pub lookup: u64,
    #[serde(rename = "Connect")]
    pub connect: u64,
    #[serde(rename = "PreTransfer")]
    pub pre_transfer: u64,
    #[serde(rename = "StartTransfer")]
    pub start_transfer: u64,
    #[serde(rename = "Total")]
    pub total: u64,
}

impl Timing {
    /// Read a field through the static name table
    pub fn value(&self, field: TimingField) -> u64 {
        match field {
            TimingField::Dns => self.dns,
            TimingField::Tcp => self.tcp,
            TimingField::Tls => self.tls,
            TimingField::Server => self.server,
            TimingField::Transfer => self.transfer,
            TimingField::Lookup => self.lookup,
            TimingField::Connect => self.connect,
            TimingField::PreTransfer => self.pre_transfer,
            TimingField::StartTransfer => self.start_transfer,
            TimingField::Total => self.total,
        }
    }

    /// Cumulative timestamps in phase order
    pub fn cumulative(&self) -> [u64; 5] {
        [self.lookup, self.connect, self.pre_transfer, self.start_transfer, self.total]
    }

    /// `lookup <= connect <= pre_transfer <= start_transfer <= total`
    pub fn is_monotonic(&self) -> bool {
        self.cumulative().windows(2).all(|pair| pair[0] <= pair[1])
    }
}

/// Names a [`Timing`] field the way the diagram templates spell it.
///
/// Replaces field lookup by reflection: template placeholders resolve
/// against [`TimingField::from_name`] and nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimingField {
    Dns,
    Tcp,
    Tls,
    Server,
    Transfer,
    Lookup,
    Connect,
    PreTransfer,
    StartTransfer,
    Total,
}

impl TimingField {
    pub const ALL: [TimingField; 10] = [
        TimingField::Dns,
        TimingField::Tcp,
        TimingField::Tls,
        TimingField::Server,
        TimingField::Transfer,
        TimingField::Lookup,
        TimingField::Connect,
        TimingField::PreTransfer,
        TimingField::StartTransfer,
        TimingField::Total,
    ];

    /// Template spelling of the field
    pub fn name(&self) -> &'static str {
        match self {
            TimingField::Dns => "DNS",
            TimingField::Tcp => "TCP",
            TimingField::Tls => "TLS",
            TimingField::Server => "Server",
            TimingField::Transfer => "Transfer",
            TimingField::Lookup => "Lookup",
            TimingField::Connect => "Connect",
            TimingField::PreTransfer => "PreTransfer",
            TimingField::StartTransfer => "StartTransfer",
            TimingField::Total => "Total",
        }
    }

    /// Exact, case-sensitive lookup by template name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|field| field.name() == name)
    }
}

/// Whole milliseconds elapsed from `since` to `now`, truncated
pub fn millis_between(since: Instant, now: Instant) -> u64 {
    duration_millis(now.saturating_duration_since(since))
}

/// Whole milliseconds in a duration, truncated
pub fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
