//! Environment variable handling

use crate::{
    error::{AppError, Result},
    logging::LogFormat,
    models::ProxySettings,
};
use url::Url;

/// Variable selecting the diagnostic log format
pub const LOG_FORMAT_VAR: &str = "HTTPSTAT_LOG_FORMAT";

/// Reads the proxy and logging variables
pub struct EnvManager;

impl EnvManager {
    /// Proxy settings from the process environment
    pub fn proxy_settings() -> Result<ProxySettings> {
        Self::proxy_settings_from(|name| std::env::var(name).ok())
    }

    /// Proxy settings from an arbitrary variable lookup
    ///
    /// Upper-case names win over lower-case ones. `HTTPS_PROXY` falls back
    /// to `HTTP_PROXY` when unset.
    pub fn proxy_settings_from<F>(lookup: F) -> Result<ProxySettings>
    where
        F: Fn(&str) -> Option<String>,
    {
        let http = first_set(&lookup, &["HTTP_PROXY", "http_proxy"]);
        let https = first_set(&lookup, &["HTTPS_PROXY", "https_proxy"]).or_else(|| http.clone());
        let no_proxy = first_set(&lookup, &["NO_PROXY", "no_proxy"])
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|entry| !entry.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(ProxySettings {
            http: http.as_deref().map(Self::parse_proxy_url).transpose()?,
            https: https.as_deref().map(Self::parse_proxy_url).transpose()?,
            no_proxy,
        })
    }

    /// A proxy given as a full URL or as `HOST[:PORT]`
    pub fn parse_proxy_url(value: &str) -> Result<Url> {
        let parsed = match Url::parse(value) {
            Ok(url) if url.has_host() => Ok(url),
            _ => Url::parse(&format!("http://{}", value)),
        };
        let url = parsed.map_err(|e| AppError::config(format!("invalid proxy address {:?}: {}", value, e)))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(AppError::config(format!(
                "unsupported proxy scheme \"{}\" in {:?}",
                url.scheme(),
                value
            )));
        }
        Ok(url)
    }

    /// Log format requested through the environment, if any
    pub fn log_format() -> Result<Option<LogFormat>> {
        Self::log_format_from(|name| std::env::var(name).ok())
    }

    pub fn log_format_from<F>(lookup: F) -> Result<Option<LogFormat>>
    where
        F: Fn(&str) -> Option<String>,
    {
        first_set(&lookup, &[LOG_FORMAT_VAR])
            .map(|value| value.parse::<LogFormat>())
            .transpose()
    }
}

/// First variable among `names` holding a non-empty value
fn first_set<F>(lookup: &F, names: &[&str]) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    names
        .iter()
        .filter_map(|name| lookup(name))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}
