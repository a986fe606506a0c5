//! Per-exchange report model

use super::timing::Timing;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Everything known about one exchange once its body has been consumed.
///
/// Serialises to the structured report shape: `Address`, `Header`, `Proto`,
/// `Status`, `Timing`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Report {
    /// Remote socket address the connection was made to
    pub address: String,
    /// Response headers by canonical name, values in arrival order
    pub header: BTreeMap<String, Vec<String>>,
    /// Protocol identifier such as `HTTP/1.1` or `HTTP/2.0`
    pub proto: String,
    /// Status code followed by the reason phrase, e.g. `200 OK`
    pub status: String,
    pub timing: Timing,
}

impl Report {
    /// Collect response headers, folding repeated names in order
    pub fn set_headers(&mut self, headers: &http::HeaderMap) {
        self.header.clear();
        for (name, value) in headers {
            let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
            self.header
                .entry(canonical_header_name(name.as_str()))
                .or_default()
                .push(value);
        }
    }

    /// First value of a header, by case-insensitive name
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.header
            .get(&canonical_header_name(name))
            .and_then(|values| values.first())
            .map(String::as_str)
    }
}

/// Canonical MIME header form: `content-type` becomes `Content-Type`
pub fn canonical_header_name(name: &str) -> String {
    let mut canonical = String::with_capacity(name.len());
    let mut upper = true;
    for ch in name.chars() {
        if upper {
            canonical.push(ch.to_ascii_uppercase());
        } else {
            canonical.push(ch.to_ascii_lowercase());
        }
        upper = ch == '-';
    }
    canonical
}

/// Protocol string for a response version
pub fn proto_string(version: http::Version) -> String {
    match version {
        http::Version::HTTP_09 => "HTTP/0.9",
        http::Version::HTTP_10 => "HTTP/1.0",
        http::Version::HTTP_11 => "HTTP/1.1",
        http::Version::HTTP_2 => "HTTP/2.0",
        http::Version::HTTP_3 => "HTTP/3.0",
        _ => "HTTP/1.1",
    }
    .to_string()
}

/// Status line text, e.g. `301 Moved Permanently`
///
/// The server's own reason phrase wins; the canonical one fills in when the
/// server sent none or it was not recorded.
pub fn status_string(status: http::StatusCode, reason: Option<&str>) -> String {
    match reason.or_else(|| status.canonical_reason()) {
        Some(reason) => format!("{} {}", status.as_str(), reason),
        None => status.as_str().to_string(),
    }
}
