//! Data models and structures for httpstat

pub mod config;
pub mod report;
pub mod timing;

// Re-export main model types
pub use config::{BodySource, Config, ProxySettings, SaveMode};
pub use report::Report;
pub use timing::{Timing, TimingField};
