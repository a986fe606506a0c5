//! Command-line interface

use clap::{ArgAction, CommandFactory, Parser};
use std::time::Duration;

const ENVIRONMENT_HELP: &str = "\
ENVIRONMENT:
  HTTP_PROXY    proxy for HTTP requests; complete URL or HOST[:PORT]
                used for HTTPS requests if HTTPS_PROXY undefined
  HTTPS_PROXY   proxy for HTTPS requests; complete URL or HOST[:PORT]
  NO_PROXY      comma-separated list of hosts to exclude from proxy";

/// Visualise the timing of one HTTP exchange
#[derive(Parser, Debug, Clone)]
#[command(name = "httpstat")]
#[command(override_usage = "httpstat [OPTIONS] URL")]
#[command(after_help = ENVIRONMENT_HELP)]
#[command(disable_version_flag = true)]
pub struct Cli {
    /// Target URL; the scheme defaults to https unless the port is 80
    #[arg(value_name = "URL")]
    pub urls: Vec<String>,

    /// HTTP method to use
    #[arg(short = 'X', value_name = "METHOD", default_value = "GET")]
    pub method: String,

    /// the body of a POST or PUT request; from file use @filename
    #[arg(short = 'd', value_name = "DATA")]
    pub data: Option<String>,

    /// follow 30x redirects
    #[arg(short = 'L')]
    pub follow_redirects: bool,

    /// don't read body of request
    #[arg(short = 'I')]
    pub only_header: bool,

    /// allow insecure SSL connections
    #[arg(short = 'k')]
    pub insecure: bool,

    /// set HTTP header; repeatable: -H 'Accept: ...' -H 'Range: ...'
    #[arg(short = 'H', value_name = "HEADER", action = ArgAction::Append)]
    pub headers: Vec<String>,

    /// save body as remote filename
    #[arg(short = 'O')]
    pub save_remote_name: bool,

    /// output file for body
    #[arg(short = 'o', value_name = "FILE")]
    pub output_file: Option<String>,

    /// print version number
    #[arg(short = 'v')]
    pub show_version: bool,

    /// client cert file for tls config
    #[arg(short = 'E', value_name = "FILE")]
    pub client_cert: Option<String>,

    /// resolve IPv4 addresses only
    #[arg(short = '4')]
    pub four_only: bool,

    /// resolve IPv6 addresses only
    #[arg(short = '6')]
    pub six_only: bool,

    /// maximum time allowed for the transfer
    #[arg(short = 'm', value_name = "DURATION", value_parser = parse_duration)]
    pub max_time: Option<Duration>,

    /// CA certificate to verify peer against (SSL)
    #[arg(long = "cacert", value_name = "FILE")]
    pub cacert: Option<String>,

    /// use JSON to output results
    #[arg(short = 'J')]
    pub json: bool,

    /// number of requests
    #[arg(short = 'n', value_name = "COUNT", default_value_t = crate::defaults::DEFAULT_NUM_REQUESTS)]
    pub num_requests: u32,

    /// delay between requests
    #[arg(
        short = 'w',
        value_name = "DURATION",
        value_parser = parse_duration,
        default_value = "3s"
    )]
    pub request_delay: Duration,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Log exchange details to stderr
    #[arg(long)]
    pub verbose: bool,

    /// Log everything, including DNS and TLS details, to stderr
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Whether the report should be colored
    pub fn use_colors(&self) -> bool {
        !self.no_color && crate::output::style::supports_color()
    }

    /// The single positional URL, or a usage error
    pub fn target(&self) -> crate::Result<&str> {
        match self.urls.as_slice() {
            [url] => Ok(url.as_str()),
            _ => Err(crate::AppError::usage(usage_text())),
        }
    }
}

/// Full usage text with options and environment, as printed on a usage error
pub fn usage_text() -> String {
    Cli::command().render_help().to_string()
}

/// Version line for `-v`
pub fn version_text() -> String {
    format!(
        "httpstat {} ({}, {})",
        crate::VERSION,
        env!("RUSTC_VERSION"),
        env!("TARGET_TRIPLE")
    )
}

/// Parse a compound duration such as `300ms`, `1.5s` or `1h30m`
///
/// Units are `ns`, `us` (or `µs`), `ms`, `s`, `m` and `h`. A bare `0` is
/// accepted; any other number needs a unit. Negative durations are rejected.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let invalid = || format!("invalid duration \"{}\"", input);

    let text = input.strip_prefix('+').unwrap_or(input);
    if text == "0" {
        return Ok(Duration::ZERO);
    }
    if text.is_empty() || text.starts_with('-') {
        return Err(invalid());
    }

    let mut rest = text;
    let mut total_nanos: u128 = 0;

    while !rest.is_empty() {
        let int_len = rest.bytes().take_while(u8::is_ascii_digit).count();
        let int_part = &rest[..int_len];
        rest = &rest[int_len..];

        let mut frac_part = "";
        if let Some(after_dot) = rest.strip_prefix('.') {
            let frac_len = after_dot.bytes().take_while(u8::is_ascii_digit).count();
            frac_part = &after_dot[..frac_len];
            rest = &after_dot[frac_len..];
        }
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }

        let unit_len = rest
            .char_indices()
            .find(|(_, c)| c.is_ascii_digit() || *c == '.')
            .map_or(rest.len(), |(i, _)| i);
        let unit = unit_nanos(&rest[..unit_len]).ok_or_else(|| match &rest[..unit_len] {
            "" => format!("missing unit in duration \"{}\"", input),
            other => format!("unknown unit \"{}\" in duration \"{}\"", other, input),
        })?;
        rest = &rest[unit_len..];

        let whole: u128 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().map_err(|_| invalid())?
        };
        // Digits beyond nanosecond precision of the largest unit do not matter.
        let frac_part = &frac_part[..frac_part.len().min(18)];
        let fraction = if frac_part.is_empty() {
            0
        } else {
            let numerator: u128 = frac_part.parse().map_err(|_| invalid())?;
            numerator * unit / 10u128.pow(frac_part.len() as u32)
        };

        total_nanos = whole
            .checked_mul(unit)
            .and_then(|n| n.checked_add(fraction))
            .and_then(|n| n.checked_add(total_nanos))
            .ok_or_else(invalid)?;
    }

    let secs = u64::try_from(total_nanos / 1_000_000_000).map_err(|_| invalid())?;
    Ok(Duration::new(secs, (total_nanos % 1_000_000_000) as u32))
}

fn unit_nanos(unit: &str) -> Option<u128> {
    Some(match unit {
        "ns" => 1,
        "us" | "µs" | "μs" => 1_000,
        "ms" => 1_000_000,
        "s" => 1_000_000_000,
        "m" => 60 * 1_000_000_000,
        "h" => 3_600 * 1_000_000_000,
        _ => return None,
    })
}
