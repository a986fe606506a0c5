//! httpstat
//!
//! An HTTP diagnostic client that issues a request and reports how long
//! each phase took: DNS lookup, TCP connect, TLS handshake, server
//! processing and content transfer.

pub mod app;
pub mod cli;
pub mod client;
pub mod config;
pub mod dns;
pub mod error;
pub mod logging;
pub mod models;
pub mod output;
pub mod trace;
pub mod types;

// Re-export commonly used types
pub use app::{App, RedirectBudget, RunSummary};
pub use error::{AppError, Result};
pub use models::{Config, Report, Timing, TimingField};
pub use output::{DiagramRenderer, JsonRenderer, Renderer, RendererFactory};
pub use trace::{TraceCollector, TraceHooks};

/// Application version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    pub const DEFAULT_NUM_REQUESTS: u32 = 1;
    pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_secs(3);
    /// Redirects followed within one top-level request
    pub const MAX_REDIRECTS: u32 = 10;
    pub const DEFAULT_ENABLE_COLOR: bool = true;

    /// `User-Agent` sent unless the user supplies one
    pub fn user_agent() -> String {
        format!("{}/{}", super::PKG_NAME, super::VERSION)
    }
}
