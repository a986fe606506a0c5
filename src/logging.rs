//! Structured logging for httpstat
//!
//! Diagnostics go to stderr so that stdout carries nothing but reports:
//! - Leveled, structured entries with free-form fields
//! - Console, JSON and compact renderings
//! - Per-exchange correlation ids for the network events of one request

use crate::error::{AppError, Result};
use crate::models::{Config, Timing};
use chrono::{DateTime, Utc};
use colored::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{self, Write};
use uuid::Uuid;

/// Log level enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    /// Debug level - per-phase transport events and aborted exchanges
    Debug = 0,
    /// Info level - one line per exchange
    Info = 1,
    /// Warning level - degraded but continuing (e.g. unusable CA bundle)
    Warn = 2,
}

impl LogLevel {
    /// Get log level name as string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
        }
    }

    /// Console color of the level tag
    pub fn color(&self) -> Color {
        match self {
            LogLevel::Debug => Color::Cyan,
            LogLevel::Info => Color::Green,
            LogLevel::Warn => Color::Yellow,
        }
    }

    /// Minimum level implied by the verbosity flags
    pub fn from_flags(verbose: bool, debug: bool) -> Self {
        if debug {
            LogLevel::Debug
        } else if verbose {
            LogLevel::Info
        } else {
            LogLevel::Warn
        }
    }
}

/// Log output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable console format
    #[default]
    Console,
    /// One JSON object per line
    Json,
    /// Compact single-line format
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "console" | "" => Ok(LogFormat::Console),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            _ => Err(AppError::config(format!(
                "Invalid log format '{}': expected console, json or compact",
                s
            ))),
        }
    }
}

/// Log entry structure for structured logging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    /// Logger name/component
    pub logger: String,
    /// Correlation ID tying together the events of one exchange
    pub correlation_id: Option<String>,
    pub fields: BTreeMap<String, serde_json::Value>,
    pub location: Option<LogLocation>,
}

/// Source code location information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogLocation {
    pub file: String,
    pub line: u32,
    pub module: Option<String>,
}

/// Logger writing structured entries to stderr
#[derive(Clone)]
pub struct Logger {
    min_level: LogLevel,
    use_color: bool,
    include_location: bool,
    format: LogFormat,
    name: String,
}

impl Logger {
    /// Create a new logger
    pub fn new(name: &str) -> Self {
        Self {
            min_level: LogLevel::Warn,
            use_color: false,
            include_location: false,
            format: LogFormat::Console,
            name: name.to_string(),
        }
    }

    /// Create a logger following the run configuration
    pub fn with_config(name: &str, config: &Config) -> Self {
        Self {
            min_level: LogLevel::from_flags(config.verbose, config.debug),
            use_color: config.enable_color,
            include_location: config.debug,
            format: config.log_format,
            name: name.to_string(),
        }
    }

    pub fn set_level(&mut self, level: LogLevel) {
        self.min_level = level;
    }

    pub fn set_format(&mut self, format: LogFormat) {
        self.format = format;
    }

    /// Create a log entry builder
    pub fn log(&self, level: LogLevel, message: &str) -> LogEntryBuilder<'_> {
        LogEntryBuilder::new(self, level, message.to_string())
    }

    pub fn debug(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Debug, message)
    }

    pub fn info(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Info, message)
    }

    pub fn warn(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Warn, message)
    }

    /// Check if a log level would be output
    pub fn would_log(&self, level: LogLevel) -> bool {
        level >= self.min_level
    }

    fn write_entry(&self, entry: LogEntry) {
        if let Some(output) = self.render(entry) {
            let _ = writeln!(io::stderr(), "{}", output);
        }
    }

    /// Decorate and format an entry, `None` when filtered out
    fn render(&self, entry: LogEntry) -> Option<String> {
        if !self.would_log(entry.level) {
            return None;
        }

        Some(match self.format {
            LogFormat::Console => self.format_console(&entry),
            LogFormat::Json => self.format_json(&entry),
            LogFormat::Compact => self.format_compact(&entry),
        })
    }

    fn format_console(&self, entry: &LogEntry) -> String {
        let timestamp = entry.timestamp.format("%Y-%m-%d %H:%M:%S%.3f");
        let padded = format!("{:>5}", entry.level.as_str());

        let formatted_level = if self.use_color {
            padded.color(entry.level.color()).to_string()
        } else {
            padded
        };

        let mut output = format!("{} {} [{}] {}", timestamp, formatted_level, entry.logger, entry.message);

        if let Some(correlation_id) = &entry.correlation_id {
            let short = correlation_id.get(..8).unwrap_or(correlation_id);
            output.push_str(&format!(" [{}]", short));
        }

        if !entry.fields.is_empty() {
            let fields_str: Vec<String> = entry
                .fields
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            output.push_str(&format!(" {{{}}}", fields_str.join(", ")));
        }

        if self.include_location {
            if let Some(location) = &entry.location {
                output.push_str(&format!(" @ {}:{}", location.file, location.line));
            }
        }

        output
    }

    fn format_json(&self, entry: &LogEntry) -> String {
        match serde_json::to_string(entry) {
            Ok(json) => json,
            Err(_) => format!(
                "{{\"error\": \"Failed to serialize log entry\", \"message\": {:?}}}",
                entry.message
            ),
        }
    }

    fn format_compact(&self, entry: &LogEntry) -> String {
        let timestamp = entry.timestamp.format("%H:%M:%S");
        format!(
            "{} {} {}: {}",
            timestamp,
            entry.level.as_str().chars().next().unwrap_or('?'),
            entry.logger,
            entry.message
        )
    }
}

/// Builder pattern for creating log entries
pub struct LogEntryBuilder<'a> {
    logger: &'a Logger,
    entry: LogEntry,
}

impl<'a> LogEntryBuilder<'a> {
    fn new(logger: &'a Logger, level: LogLevel, message: String) -> Self {
        Self {
            logger,
            entry: LogEntry {
                timestamp: Utc::now(),
                level,
                message,
                logger: logger.name.clone(),
                correlation_id: None,
                fields: BTreeMap::new(),
                location: None,
            },
        }
    }

    pub fn correlation_id(mut self, id: &str) -> Self {
        self.entry.correlation_id = Some(id.to_string());
        self
    }

    /// Add a structured field
    pub fn field<T: Serialize>(mut self, key: &str, value: T) -> Self {
        if let Ok(json_value) = serde_json::to_value(value) {
            self.entry.fields.insert(key.to_string(), json_value);
        }
        self
    }

    pub fn location(mut self, file: &str, line: u32, module: Option<&str>) -> Self {
        self.entry.location = Some(LogLocation {
            file: file.to_string(),
            line,
            module: module.map(String::from),
        });
        self
    }

    /// Attach the phase breakdown of an exchange
    pub fn timing(self, timing: &Timing) -> Self {
        self.field("dns_ms", timing.dns)
            .field("tcp_ms", timing.tcp)
            .field("tls_ms", timing.tls)
            .field("server_ms", timing.server)
            .field("transfer_ms", timing.transfer)
            .field("total_ms", timing.total)
    }

    pub fn error_info(self, error: &AppError) -> Self {
        self.field("error_category", error.category())
            .field("error_exit_code", error.exit_code())
    }

    /// Finalize and write the log entry
    pub fn log(self) {
        self.logger.write_entry(self.entry);
    }
}

/// Logger for the transport events of one exchange
#[derive(Clone)]
pub struct NetworkLogger {
    logger: Logger,
    correlation_id: String,
}

impl NetworkLogger {
    pub fn new(logger: &Logger) -> Self {
        let mut logger = logger.clone();
        logger.name = "NET".to_string();
        Self {
            logger,
            correlation_id: Uuid::new_v4().to_string(),
        }
    }

    /// Fresh correlation id for the next exchange
    pub fn next_exchange(&self) -> Self {
        Self {
            logger: self.logger.clone(),
            correlation_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub fn log_dns_resolution(&self, host: &str, strategy: &str, addresses: &[std::net::IpAddr], duration_ms: u64) {
        let addresses: Vec<String> = addresses.iter().map(ToString::to_string).collect();
        self.logger
            .debug(&format!("Resolved {} to {} address(es)", host, addresses.len()))
            .correlation_id(&self.correlation_id)
            .field("host", host)
            .field("strategy", strategy)
            .field("addresses", addresses)
            .field("duration_ms", duration_ms)
            .log();
    }

    pub fn log_connection(&self, target: &str, via_proxy: Option<&str>, success: bool, error: Option<&str>) {
        let level = if success { LogLevel::Debug } else { LogLevel::Warn };
        let message = if success {
            format!("Connected to {}", target)
        } else {
            format!("Failed to connect to {}: {}", target, error.unwrap_or("unknown error"))
        };

        let mut builder = self
            .logger
            .log(level, &message)
            .correlation_id(&self.correlation_id)
            .field("target", target)
            .field("success", success);

        if let Some(proxy) = via_proxy {
            builder = builder.field("proxy", proxy);
        }
        if let Some(err) = error {
            builder = builder.field("error", err);
        }

        builder.log();
    }

    pub fn log_tls_handshake(&self, server_name: &str, alpn: Option<&str>, duration_ms: u64) {
        self.logger
            .debug(&format!("TLS handshake with {} complete", server_name))
            .correlation_id(&self.correlation_id)
            .field("server_name", server_name)
            .field("alpn", alpn)
            .field("duration_ms", duration_ms)
            .log();
    }

    pub fn log_http_request(&self, method: &str, url: &str, status: u16, timing: &Timing) {
        self.logger
            .info(&format!("{} {} -> {} in {}ms", method, url, status, timing.total))
            .correlation_id(&self.correlation_id)
            .field("method", method)
            .field("url", url)
            .field("status_code", status)
            .timing(timing)
            .log();
    }

    /// Record why an exchange produced no report
    pub fn log_exchange_failure(&self, method: &str, url: &str, error: &AppError) {
        self.logger
            .debug(&format!("{} {} aborted: {}", method, url, error))
            .correlation_id(&self.correlation_id)
            .field("method", method)
            .field("url", url)
            .error_info(error)
            .log();
    }

    pub fn log_redirect(&self, from: &str, to: &str, depth: u32) {
        self.logger
            .info(&format!("Following redirect {} -> {}", from, to))
            .correlation_id(&self.correlation_id)
            .field("from", from)
            .field("to", to)
            .field("depth", depth)
            .log();
    }
}

/// Convenience macros for logging with location information
#[macro_export]
macro_rules! log_debug {
    ($logger:expr, $($arg:tt)*) => {
        $logger.debug(&format!($($arg)*))
            .location(file!(), line!(), Some(module_path!()))
            .log()
    };
}

#[macro_export]
macro_rules! log_warn {
    ($logger:expr, $($arg:tt)*) => {
        $logger.warn(&format!($($arg)*))
            .location(file!(), line!(), Some(module_path!()))
            .log()
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn entry(logger: &Logger, level: LogLevel, message: &str) -> LogEntry {
        logger.log(level, message).entry
    }

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warn);
    }

    #[test]
    fn test_log_level_colors() {
        assert_eq!(LogLevel::Debug.color(), Color::Cyan);
        assert_eq!(LogLevel::Info.color(), Color::Green);
        assert_eq!(LogLevel::Warn.color(), Color::Yellow);
    }

    #[test]
    fn test_level_from_flags() {
        assert_eq!(LogLevel::from_flags(false, false), LogLevel::Warn);
        assert_eq!(LogLevel::from_flags(true, false), LogLevel::Info);
        assert_eq!(LogLevel::from_flags(true, true), LogLevel::Debug);
    }

    #[test]
    fn test_log_format_parsing() {
        assert_eq!(LogFormat::from_str("json").unwrap(), LogFormat::Json);
        assert_eq!(LogFormat::from_str(" Compact ").unwrap(), LogFormat::Compact);
        assert_eq!(LogFormat::from_str("").unwrap(), LogFormat::Console);
        assert!(LogFormat::from_str("xml").is_err());
    }

    #[test]
    fn test_would_log() {
        let mut logger = Logger::new("TEST");
        assert!(!logger.would_log(LogLevel::Info));
        assert!(logger.would_log(LogLevel::Warn));

        logger.set_level(LogLevel::Debug);
        assert!(logger.would_log(LogLevel::Debug));
    }

    #[test]
    fn test_filtered_entries_render_nothing() {
        let logger = Logger::new("TEST");
        assert!(logger.render(entry(&logger, LogLevel::Debug, "hidden")).is_none());
        assert!(logger.render(entry(&logger, LogLevel::Warn, "shown")).is_some());
    }

    #[test]
    fn test_console_format_includes_fields_and_correlation() {
        let logger = Logger::new("NET");
        let built = logger
            .warn("CA bundle unusable")
            .correlation_id("0123456789abcdef")
            .field("path", "ca.pem")
            .entry;

        let line = logger.render(built).unwrap();
        assert!(line.contains(" WARN [NET] CA bundle unusable"));
        assert!(line.contains("[01234567]"));
        assert!(line.contains("path=\"ca.pem\""));
    }

    #[test]
    fn test_json_format_is_parseable() {
        let mut logger = Logger::new("APP");
        logger.set_format(LogFormat::Json);

        let built = logger.warn("boom").field("attempt", 2).entry;
        let line = logger.render(built).unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["message"], "boom");
        assert_eq!(value["level"], "Warn");
        assert_eq!(value["fields"]["attempt"], 2);
    }

    #[test]
    fn test_compact_format() {
        let mut logger = Logger::new("APP");
        logger.set_format(LogFormat::Compact);
        let line = logger.render(entry(&logger, LogLevel::Warn, "bye")).unwrap();
        assert!(line.ends_with(" W APP: bye"));
    }

    #[test]
    fn test_console_level_colors_follow_config() {
        let plain = Logger::new("APP");
        let line = plain.render(entry(&plain, LogLevel::Warn, "x")).unwrap();
        assert!(!line.contains('\x1b'));
        assert!(line.contains(" WARN [APP] x"));
    }

    #[test]
    fn test_error_info_fields() {
        let logger = Logger::new("NET");
        let error = AppError::timeout("maximum time for the transfer exceeded");
        let built = logger.debug("aborted").error_info(&error).entry;
        assert_eq!(built.fields["error_category"], error.category());
        assert_eq!(built.fields["error_exit_code"], 6);
    }

    #[test]
    fn test_timing_fields() {
        let logger = Logger::new("NET");
        let timing = Timing { dns: 3, total: 40, ..Default::default() };
        let built = logger.info("done").timing(&timing).entry;
        assert_eq!(built.fields["dns_ms"], 3);
        assert_eq!(built.fields["total_ms"], 40);
        assert_eq!(built.fields["tls_ms"], 0);
    }

    #[test]
    fn test_network_logger_correlation_ids() {
        let base = Logger::new("APP");
        let first = NetworkLogger::new(&base);
        let second = first.next_exchange();
        assert_ne!(first.correlation_id(), second.correlation_id());
        assert_eq!(first.correlation_id().len(), 36);
        assert_eq!(first.logger().name, "NET");
    }
}
