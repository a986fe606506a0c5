//! Environment proxy selection and CONNECT tunnelling

use crate::{
    dns::literal_address,
    error::{AppError, Result},
    models::ProxySettings,
    types::Scheme,
};
use bytes::Bytes;
use http::{header, Method, Request};
use http_body_util::Empty;
use hyper::client::conn::http1;
use hyper::upgrade::Upgraded;
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncWrite};
use url::Url;

/// Proxy that should carry a request to `target`, if any
pub fn select_proxy<'a>(settings: &'a ProxySettings, target: &Url) -> Option<&'a Url> {
    let host = target.host_str()?;
    let port = target.port_or_known_default()?;

    if is_loopback(host) || bypasses(&settings.no_proxy, host, port) {
        return None;
    }

    match Scheme::from_url(target) {
        Scheme::Https => settings.https.as_ref(),
        Scheme::Http => settings.http.as_ref(),
    }
}

fn is_loopback(host: &str) -> bool {
    if host.eq_ignore_ascii_case("localhost") {
        return true;
    }
    literal_address(host).is_some_and(|ip| ip.is_loopback())
}

/// Whether a `NO_PROXY` entry covers `host:port`
///
/// Entries are `*`, a host or IP, or a domain; a leading dot restricts the
/// match to subdomains. Any entry may carry `:port`.
pub fn bypasses(entries: &[String], host: &str, port: u16) -> bool {
    let host = host.to_ascii_lowercase();
    let host = host.trim_start_matches('[').trim_end_matches(']');

    entries.iter().any(|entry| {
        let entry = entry.trim().to_ascii_lowercase();
        if entry.is_empty() {
            return false;
        }
        if entry == "*" {
            return true;
        }

        let (pattern, entry_port) = split_entry(&entry);
        if let Some(entry_port) = entry_port {
            if entry_port != port {
                return false;
            }
        }

        if let Some(suffix) = pattern.strip_prefix('.') {
            return host.ends_with(&format!(".{}", suffix));
        }
        host == pattern || host.ends_with(&format!(".{}", pattern))
    })
}

fn split_entry(entry: &str) -> (&str, Option<u16>) {
    if let Some(rest) = entry.strip_prefix('[') {
        return match rest.split_once(']') {
            Some((ip, tail)) => (ip, tail.strip_prefix(':').and_then(|p| p.parse().ok())),
            None => (entry, None),
        };
    }
    match entry.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') => match port.parse() {
            Ok(port) => (host, Some(port)),
            Err(_) => (entry, None),
        },
        _ => (entry, None),
    }
}

/// `host:port` the proxy itself listens on
pub fn proxy_authority(proxy: &Url) -> Result<(String, u16)> {
    let host = proxy
        .host_str()
        .ok_or_else(|| AppError::config(format!("proxy URL has no host: {}", proxy)))?;
    let port = proxy.port_or_known_default().unwrap_or(80);
    Ok((host.to_string(), port))
}

/// Ask the proxy on `stream` to open a tunnel to `authority`
///
/// The CONNECT exchange runs over a one-shot HTTP/1.1 connection; a 2xx
/// answer hands the raw stream back as the upgraded tunnel.
pub async fn connect_tunnel<S>(stream: S, authority: &str) -> Result<TokioIo<Upgraded>>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut sender, conn) = http1::handshake::<_, Empty<Bytes>>(TokioIo::new(stream))
        .await
        .map_err(|e| AppError::network(format!("proxyconnect tcp: {}", e)))?;
    tokio::spawn(async move {
        let _ = conn.with_upgrades().await;
    });

    let request = Request::builder()
        .method(Method::CONNECT)
        .uri(authority)
        .header(header::HOST, authority)
        .header(header::USER_AGENT, crate::defaults::user_agent())
        .body(Empty::<Bytes>::new())?;

    let response = sender
        .send_request(request)
        .await
        .map_err(|e| AppError::network(format!("proxyconnect tcp: {}", e)))?;
    if !response.status().is_success() {
        return Err(AppError::network(format!(
            "proxy refused CONNECT: {}",
            response.status()
        )));
    }

    let upgraded = hyper::upgrade::on(response)
        .await
        .map_err(|e| AppError::network(format!("proxy tunnel upgrade failed: {}", e)))?;
    Ok(TokioIo::new(upgraded))
}
