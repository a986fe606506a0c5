//! Run configuration data model and validation

use crate::logging::LogFormat;
use crate::types::{AddressFamily, AppError, OutputMode, Result};
use http::Method;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Where the request body comes from
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BodySource {
    /// No body
    #[default]
    Empty,
    /// Literal text given to `-d`
    Literal(String),
    /// `-d @path`: file contents, reopened for every exchange
    File(PathBuf),
}

impl BodySource {
    /// Interpret a `-d` argument; a leading `@` names a file
    pub fn from_arg(arg: Option<&str>) -> Self {
        match arg {
            None | Some("") => Self::Empty,
            Some(data) => match data.strip_prefix('@') {
                Some(path) => Self::File(PathBuf::from(path)),
                None => Self::Literal(data.to_string()),
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

/// What happens to the response body
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SaveMode {
    /// Read and throw away
    #[default]
    Discard,
    /// `-O`: name taken from Content-Disposition or the URL path
    RemoteName,
    /// `-o FILE`
    File(PathBuf),
}

impl SaveMode {
    /// `-O` wins over `-o` when both are present
    pub fn from_flags(remote_name: bool, output_file: Option<&str>) -> Self {
        if remote_name {
            return Self::RemoteName;
        }
        match output_file {
            Some(path) if !path.is_empty() => Self::File(PathBuf::from(path)),
            _ => Self::Discard,
        }
    }

    pub fn saves(&self) -> bool {
        !matches!(self, Self::Discard)
    }
}

/// Proxy endpoints taken from the environment
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProxySettings {
    /// Proxy for plaintext targets
    pub http: Option<Url>,
    /// Proxy for TLS targets
    pub https: Option<Url>,
    /// Raw `NO_PROXY` entries
    pub no_proxy: Vec<String>,
}

impl ProxySettings {
    pub fn is_empty(&self) -> bool {
        self.http.is_none() && self.https.is_none()
    }
}

/// Main run configuration, assembled once from the command line and environment
#[derive(Debug, Clone)]
pub struct Config {
    /// Normalised target URL
    pub target: Url,
    pub method: Method,
    pub body: BodySource,
    /// Extra request headers in command-line order, `Host` excluded
    pub headers: Vec<(String, String)>,
    /// Value of a `-H "Host: ..."` override
    pub host_override: Option<String>,
    /// Follow 30x responses (`-L`)
    pub follow_redirects: bool,
    pub save: SaveMode,
    /// Skip certificate verification (`-k`)
    pub insecure: bool,
    /// PEM file with client certificate and key (`-E`)
    pub client_cert: Option<PathBuf>,
    /// Extra PEM roots (`--cacert`)
    pub ca_cert: Option<PathBuf>,
    pub address_family: AddressFamily,
    /// Whole-exchange deadline (`-m`)
    pub max_time: Option<Duration>,
    pub output: OutputMode,
    /// Top-level iterations (`-n`)
    pub num_requests: u32,
    /// Pause between iterations (`-w`)
    pub request_delay: Duration,
    pub proxy: ProxySettings,

    /// Enable colored terminal output
    pub enable_color: bool,
    /// Enable verbose output
    pub verbose: bool,
    /// Enable debug output
    pub debug: bool,
    /// Rendering of diagnostic log lines
    pub log_format: LogFormat,
}

impl Config {
    /// Configuration for `target` with every option at its default
    pub fn new(target: Url) -> Self {
        Self {
            target,
            method: Method::GET,
            body: BodySource::Empty,
            headers: Vec::new(),
            host_override: None,
            follow_redirects: false,
            save: SaveMode::Discard,
            insecure: false,
            client_cert: None,
            ca_cert: None,
            address_family: AddressFamily::Auto,
            max_time: None,
            output: OutputMode::Diagram,
            num_requests: crate::defaults::DEFAULT_NUM_REQUESTS,
            request_delay: crate::defaults::DEFAULT_REQUEST_DELAY,
            proxy: ProxySettings::default(),
            enable_color: crate::defaults::DEFAULT_ENABLE_COLOR,
            verbose: false,
            debug: false,
            log_format: LogFormat::Console,
        }
    }

    /// Validate the assembled configuration
    pub fn validate(&self) -> Result<()> {
        if self.target.host_str().map_or(true, str::is_empty) {
            return Err(AppError::config(format!("URL has no host: {}", self.target)));
        }

        if !matches!(self.target.scheme(), "http" | "https") {
            return Err(AppError::config(format!(
                "unsupported protocol scheme \"{}\"",
                self.target.scheme()
            )));
        }

        if self.num_requests == 0 {
            return Err(AppError::config("Number of requests must be greater than 0"));
        }

        if let Some(max_time) = self.max_time {
            if max_time.is_zero() {
                return Err(AppError::config("Maximum time must be greater than 0"));
            }
        }

        if (self.method == Method::POST || self.method == Method::PUT) && self.body.is_empty() {
            return Err(AppError::config(format!(
                "must supply post body using -d when {} is used",
                self.method
            )));
        }

        Ok(())
    }

    /// Short one-line summary for debug logging
    pub fn summary(&self) -> String {
        format!(
            "{} {} follow={} family={} n={} delay={:?} timeout={:?}",
            self.method,
            self.target,
            self.follow_redirects,
            self.address_family.name(),
            self.num_requests,
            self.request_delay,
            self.max_time
        )
    }
}
