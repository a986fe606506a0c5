//! Type definitions and aliases

use serde::{Deserialize, Serialize};
use std::net::IpAddr;

// Re-export commonly used types
pub use crate::error::{AppError, Result};

/// Address family the dialer is restricted to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AddressFamily {
    /// Use whatever the resolver returns
    #[default]
    Auto,
    /// Resolve and connect over IPv4 only (`-4`)
    V4Only,
    /// Resolve and connect over IPv6 only (`-6`)
    V6Only,
}

impl AddressFamily {
    /// Build the preference from the two mutually exclusive flags
    pub fn from_flags(four_only: bool, six_only: bool) -> Result<Self> {
        match (four_only, six_only) {
            (true, true) => Err(AppError::config("Only one of -4 and -6 may be specified")),
            (true, false) => Ok(Self::V4Only),
            (false, true) => Ok(Self::V6Only),
            (false, false) => Ok(Self::Auto),
        }
    }

    /// Whether an address is usable under this preference
    pub fn permits(&self, ip: &IpAddr) -> bool {
        match self {
            Self::Auto => true,
            Self::V4Only => ip.is_ipv4(),
            Self::V6Only => ip.is_ipv6(),
        }
    }

    /// Name used in logs and error messages
    pub fn name(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::V4Only => "tcp4",
            Self::V6Only => "tcp6",
        }
    }
}

/// URL scheme of one exchange, which selects the diagram template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    /// Map a URL scheme string; anything other than `https` is plaintext
    pub fn from_url(url: &url::Url) -> Self {
        if url.scheme().eq_ignore_ascii_case("https") {
            Self::Https
        } else {
            Self::Http
        }
    }

    pub fn is_encrypted(&self) -> bool {
        matches!(self, Self::Https)
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Self::Http => 80,
            Self::Https => 443,
        }
    }
}

/// How reports are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Colored header listing plus the ASCII timing diagram
    #[default]
    Diagram,
    /// One JSON object per exchange (`-J`)
    Json,
}
