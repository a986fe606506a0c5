//! Error handling for httpstat
//!
//! Every failure is fatal for the run: errors travel up to `main`, which
//! prints them through [`ErrorReporter`] and exits with [`AppError::exit_code`].

use thiserror::Error;

/// Custom error types for httpstat
#[derive(Error, Debug)]
pub enum AppError {
    /// Wrong number of positional arguments
    #[error("{0}")]
    Usage(String),

    /// Conflicting or missing options detected before any network activity
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Parsing errors (URLs, durations, headers)
    #[error("Parsing error: {0}")]
    Parse(String),

    /// Unreadable or malformed client certificate material
    #[error("Credential error: {0}")]
    Credential(String),

    /// Network connectivity errors
    #[error("Network error: {0}")]
    Network(String),

    /// DNS resolution errors
    #[error("DNS resolution error: {0}")]
    DnsResolution(String),

    /// TLS handshake errors
    #[error("TLS error: {0}")]
    Tls(String),

    /// HTTP request errors
    #[error("HTTP request error: {0}")]
    HttpRequest(String),

    /// Timeout errors
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// Redirect chain errors
    #[error("Redirect error: {0}")]
    Redirect(String),

    /// I/O errors (file operations, etc.)
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Create a new usage error
    pub fn usage<S: Into<String>>(message: S) -> Self {
        Self::Usage(message.into())
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation(message.into())
    }

    /// Create a new parsing error
    pub fn parse<S: Into<String>>(message: S) -> Self {
        Self::Parse(message.into())
    }

    /// Create a new credential error
    pub fn credential<S: Into<String>>(message: S) -> Self {
        Self::Credential(message.into())
    }

    /// Create a new network error
    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::Network(message.into())
    }

    /// Create a new DNS resolution error
    pub fn dns_resolution<S: Into<String>>(message: S) -> Self {
        Self::DnsResolution(message.into())
    }

    /// Create a new TLS error
    pub fn tls<S: Into<String>>(message: S) -> Self {
        Self::Tls(message.into())
    }

    /// Create a new HTTP request error
    pub fn http_request<S: Into<String>>(message: S) -> Self {
        Self::HttpRequest(message.into())
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        Self::Timeout(message.into())
    }

    /// Create a new redirect error
    pub fn redirect<S: Into<String>>(message: S) -> Self {
        Self::Redirect(message.into())
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io(message.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    /// Get error category for logging and reporting
    pub fn category(&self) -> &'static str {
        match self {
            Self::Usage(_) => "USAGE",
            Self::Config(_) => "CONFIG",
            Self::Validation(_) => "VALIDATION",
            Self::Parse(_) => "PARSE",
            Self::Credential(_) => "CREDENTIAL",
            Self::Network(_) => "NETWORK",
            Self::DnsResolution(_) => "DNS",
            Self::Tls(_) => "TLS",
            Self::HttpRequest(_) => "HTTP",
            Self::Timeout(_) => "TIMEOUT",
            Self::Redirect(_) => "REDIRECT",
            Self::Io(_) => "IO",
            Self::Internal(_) => "INTERNAL",
        }
    }

    /// True for failures detected before any network activity
    pub fn is_preflight(&self) -> bool {
        matches!(
            self,
            Self::Usage(_) | Self::Config(_) | Self::Validation(_) | Self::Parse(_) | Self::Credential(_)
        )
    }

    /// Get exit code for this error type
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Usage(_) => 2,
            Self::Config(_) | Self::Validation(_) | Self::Parse(_) => 1,
            Self::Credential(_) => 4,
            Self::Network(_) | Self::DnsResolution(_) | Self::Tls(_) | Self::HttpRequest(_) => 5,
            Self::Timeout(_) => 6,
            Self::Redirect(_) => 7,
            Self::Io(_) => 8,
            Self::Internal(_) => 99,
        }
    }

    /// Format error for console display with color coding
    pub fn format_for_console(&self, use_color: bool) -> String {
        let category = self.category();
        let message = self.to_string();

        if use_color {
            use colored::Colorize;
            match self {
                Self::Usage(_) | Self::Config(_) | Self::Validation(_) | Self::Parse(_) => {
                    format!("[{}] {}", category.red().bold(), message.red())
                }
                Self::Network(_) | Self::DnsResolution(_) | Self::Tls(_) | Self::HttpRequest(_) => {
                    format!("[{}] {}", category.yellow().bold(), message.yellow())
                }
                Self::Timeout(_) | Self::Redirect(_) => {
                    format!("[{}] {}", category.blue().bold(), message.blue())
                }
                Self::Credential(_) => {
                    format!("[{}] {}", category.magenta().bold(), message.magenta())
                }
                Self::Io(_) => {
                    format!("[{}] {}", category.cyan().bold(), message.cyan())
                }
                Self::Internal(_) => {
                    format!("[{}] {}", category.bright_red().bold(), message.bright_red())
                }
            }
        } else {
            format!("[{}] {}", category, message)
        }
    }
}

// Standard library error conversions
impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        if error.kind() == std::io::ErrorKind::TimedOut {
            Self::timeout(error.to_string())
        } else {
            Self::io(error.to_string())
        }
    }
}

impl From<url::ParseError> for AppError {
    fn from(error: url::ParseError) -> Self {
        Self::parse(format!("URL parse error: {}", error))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::internal(format!("unable to marshal json report: {}", error))
    }
}

impl From<hyper::Error> for AppError {
    fn from(error: hyper::Error) -> Self {
        if error.is_timeout() {
            Self::timeout(error.to_string())
        } else {
            Self::http_request(error.to_string())
        }
    }
}

impl From<http::Error> for AppError {
    fn from(error: http::Error) -> Self {
        Self::http_request(format!("unable to create request: {}", error))
    }
}

impl From<rustls::Error> for AppError {
    fn from(error: rustls::Error) -> Self {
        Self::tls(error.to_string())
    }
}

impl From<trust_dns_resolver::error::ResolveError> for AppError {
    fn from(error: trust_dns_resolver::error::ResolveError) -> Self {
        Self::dns_resolution(error.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for AppError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        Self::timeout("maximum time for the transfer exceeded")
    }
}

/// Custom Result type for the application
pub type Result<T> = std::result::Result<T, AppError>;

/// Error reporter used by `main` for the final fatal message
pub struct ErrorReporter {
    pub use_color: bool,
    pub verbose: bool,
}

impl ErrorReporter {
    /// Create a new error reporter
    pub fn new(use_color: bool, verbose: bool) -> Self {
        Self { use_color, verbose }
    }

    /// Report an error to the user
    pub fn report_error(&self, error: &AppError) {
        eprintln!("{}", self.format_error(error));
    }

    /// Render the report line(s) for an error
    pub fn format_error(&self, error: &AppError) -> String {
        // Usage text is printed verbatim, it already explains itself.
        if let AppError::Usage(text) = error {
            return text.clone();
        }

        let mut output = error.format_for_console(self.use_color);
        if self.verbose && !error.is_preflight() {
            output.push_str(&format!(
                "\n\nThe run was aborted after a {} failure; no partial report was produced.",
                error.category().to_lowercase()
            ));
        }
        output
    }
}
