//! Configuration management module

pub mod env;
pub mod parser;

pub use env::EnvManager;
pub use parser::{load_config, parse_header_arg, parse_target, ConfigParser};

pub use crate::models::Config;
