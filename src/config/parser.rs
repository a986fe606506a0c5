//! Configuration parsing from CLI arguments and environment variables

use crate::{
    cli::Cli,
    config::env::EnvManager,
    error::{AppError, Result},
    models::{BodySource, Config, SaveMode},
    types::{AddressFamily, OutputMode},
};
use http::Method;
use std::path::PathBuf;
use url::Url;

/// Combines CLI arguments with environment variables into a [`Config`]
pub struct ConfigParser {
    cli: Cli,
}

impl ConfigParser {
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Build and validate the run configuration
    ///
    /// Checks run in a fixed order so that the first problem reported is
    /// the same one the user would hit with any other invocation: address
    /// family conflict, positional count, missing body, header syntax,
    /// then the URL itself.
    pub fn parse(&self) -> Result<Config> {
        let cli = &self.cli;

        let address_family = AddressFamily::from_flags(cli.four_only, cli.six_only)?;
        let raw_target = cli.target()?;

        let mut method = Method::from_bytes(cli.method.as_bytes())
            .map_err(|_| AppError::config(format!("invalid method {:?}", cli.method)))?;
        let body = BodySource::from_arg(cli.data.as_deref());
        require_body(&method, &body)?;
        if cli.only_header {
            method = Method::HEAD;
        }

        let mut headers = Vec::with_capacity(cli.headers.len());
        let mut host_override = None;
        for raw in &cli.headers {
            let (name, value) = parse_header_arg(raw)?;
            if name.eq_ignore_ascii_case("host") {
                host_override = Some(value);
            } else {
                headers.push((name, value));
            }
        }

        let target = parse_target(raw_target)?;

        let mut config = Config::new(target);
        config.method = method;
        config.body = body;
        config.headers = headers;
        config.host_override = host_override;
        config.follow_redirects = cli.follow_redirects;
        config.save = SaveMode::from_flags(cli.save_remote_name, cli.output_file.as_deref());
        config.insecure = cli.insecure;
        config.client_cert = non_empty_path(cli.client_cert.as_deref());
        config.ca_cert = non_empty_path(cli.cacert.as_deref());
        config.address_family = address_family;
        // Zero means no deadline.
        config.max_time = cli.max_time.filter(|limit| !limit.is_zero());
        config.output = if cli.json { OutputMode::Json } else { OutputMode::Diagram };
        config.num_requests = cli.num_requests;
        config.request_delay = cli.request_delay;
        config.proxy = EnvManager::proxy_settings()?;
        config.enable_color = cli.use_colors();
        config.verbose = cli.verbose;
        config.debug = cli.debug;
        if let Some(format) = EnvManager::log_format()? {
            config.log_format = format;
        }

        config.validate()?;
        Ok(config)
    }
}

/// Convenience function to load complete configuration from CLI arguments
pub fn load_config(cli: Cli) -> Result<Config> {
    ConfigParser::new(cli).parse()
}

fn require_body(method: &Method, body: &BodySource) -> Result<()> {
    if (*method == Method::POST || *method == Method::PUT) && body.is_empty() {
        return Err(AppError::config(format!(
            "must supply post body using -d when {} is used",
            method
        )));
    }
    Ok(())
}

fn non_empty_path(value: Option<&str>) -> Option<PathBuf> {
    value.filter(|v| !v.is_empty()).map(PathBuf::from)
}

/// Normalise a target that may lack a scheme
///
/// `example.com` becomes `https://example.com/`; an authority ending in
/// `:80` gets `http` instead.
pub fn parse_target(raw: &str) -> Result<Url> {
    if raw.contains("://") {
        return Url::parse(raw).map_err(|e| AppError::config(format!("could not parse url {:?}: {}", raw, e)));
    }

    let rest = raw.strip_prefix("//").unwrap_or(raw);
    let authority_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let scheme = if rest[..authority_end].ends_with(":80") { "http" } else { "https" };

    let candidate = format!("{}://{}", scheme, rest);
    Url::parse(&candidate).map_err(|e| AppError::config(format!("could not parse url {:?}: {}", raw, e)))
}

/// Split `Name: value` at the first colon
pub fn parse_header_arg(raw: &str) -> Result<(String, String)> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| AppError::config(format!("Header '{}' has invalid format, missing ':'", raw)))?;

    let name = name.trim_end_matches(' ');
    if name.is_empty() {
        return Err(AppError::config(format!("Header '{}' has an empty name", raw)));
    }
    let value = value.trim_start_matches([' ', ':']);
    Ok((name.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse(args: &[&str]) -> Result<Config> {
        let mut argv = vec!["httpstat"];
        argv.extend_from_slice(args);
        load_config(Cli::parse_from(argv))
    }

    #[test]
    fn test_scheme_defaults() {
        assert_eq!(parse_target("example.com").unwrap().scheme(), "https");
        assert_eq!(parse_target("example.com:80").unwrap().scheme(), "http");
        assert_eq!(parse_target("example.com:80/path").unwrap().as_str(), "http://example.com/path");
        assert_eq!(parse_target("example.com:8080").unwrap().scheme(), "https");
        assert_eq!(parse_target("//example.com/x").unwrap().as_str(), "https://example.com/x");
        assert_eq!(parse_target("http://example.com").unwrap().scheme(), "http");
    }

    #[test]
    fn test_unparseable_target() {
        assert!(matches!(parse_target("http://exa mple.com"), Err(AppError::Config(_))));
        assert!(parse_target("example.com:99999").is_err());
    }

    #[test]
    fn test_header_splitting() {
        assert_eq!(
            parse_header_arg("Accept:   text/html").unwrap(),
            ("Accept".to_string(), "text/html".to_string())
        );
        assert_eq!(
            parse_header_arg("X-Time  : 12:30").unwrap(),
            ("X-Time".to_string(), "12:30".to_string())
        );
        assert_eq!(
            parse_header_arg("X-Empty:").unwrap(),
            ("X-Empty".to_string(), String::new())
        );
        assert!(matches!(parse_header_arg("NoColon"), Err(AppError::Config(_))));
    }

    #[test]
    fn test_defaults() {
        let config = parse(&["example.com"]).unwrap();
        assert_eq!(config.target.as_str(), "https://example.com/");
        assert_eq!(config.method, Method::GET);
        assert_eq!(config.num_requests, 1);
        assert_eq!(config.max_time, None);
        assert_eq!(config.output, OutputMode::Diagram);
        assert_eq!(config.save, SaveMode::Discard);
    }

    #[test]
    fn test_host_header_becomes_override() {
        let config = parse(&["-H", "host: internal.example", "-H", "Accept: */*", "10.0.0.1"]).unwrap();
        assert_eq!(config.host_override.as_deref(), Some("internal.example"));
        assert_eq!(config.headers, vec![("Accept".to_string(), "*/*".to_string())]);
    }

    #[test]
    fn test_post_without_body_is_rejected() {
        let error = parse(&["-X", "POST", "example.com"]).unwrap_err();
        assert!(error.to_string().contains("must supply post body using -d when POST is used"));
        assert!(error.is_preflight());

        assert!(parse(&["-X", "PUT", "-d", "x", "example.com"]).is_ok());
    }

    #[test]
    fn test_check_order() {
        // Family conflict comes before the positional count.
        let error = parse(&["-4", "-6"]).unwrap_err();
        assert!(error.to_string().contains("-4 and -6"));

        // Missing body comes before malformed headers and URLs.
        let error = parse(&["-X", "POST", "-H", "bad", "http://[bad"]).unwrap_err();
        assert!(error.to_string().contains("post body"));

        // Malformed headers come before malformed URLs.
        let error = parse(&["-H", "bad", "http://[bad"]).unwrap_err();
        assert!(error.to_string().contains("missing ':'"));

        let error = parse(&[]).unwrap_err();
        assert!(matches!(error, AppError::Usage(_)));
    }

    #[test]
    fn test_head_only_overrides_method_after_body_check() {
        let config = parse(&["-I", "-X", "PUT", "-d", "x", "example.com"]).unwrap();
        assert_eq!(config.method, Method::HEAD);
        assert!(parse(&["-I", "-X", "POST", "example.com"]).is_err());
    }

    #[test]
    fn test_output_and_save_options() {
        let config = parse(&["-J", "-O", "-o", "file.bin", "-m", "0", "-n", "2", "-w", "10ms", "example.com"]).unwrap();
        assert_eq!(config.output, OutputMode::Json);
        assert_eq!(config.save, SaveMode::RemoteName);
        assert_eq!(config.max_time, None);
        assert_eq!(config.num_requests, 2);
        assert_eq!(config.request_delay, std::time::Duration::from_millis(10));

        let config = parse(&["-o", "file.bin", "-6", "-d", "@payload.json", "example.com"]).unwrap();
        assert_eq!(config.save, SaveMode::File(PathBuf::from("file.bin")));
        assert_eq!(config.address_family, AddressFamily::V6Only);
        assert_eq!(config.body, BodySource::File(PathBuf::from("payload.json")));
    }

    #[test]
    fn test_zero_requests_is_rejected() {
        assert!(parse(&["-n", "0", "example.com"]).is_err());
    }
}
