//! Response body disposition

use super::ResponseBody;
use crate::{
    error::{AppError, Result},
    models::SaveMode,
};
use http::{HeaderMap, Method, StatusCode};
use http_body_util::BodyExt;
use regex::Regex;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use url::Url;

/// What became of a response body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyDisposition {
    /// Never read (HEAD request or redirect response)
    Skipped,
    /// Read to the end and thrown away
    Discarded { bytes: u64 },
    /// Written to a file
    Saved { path: PathBuf, bytes: u64 },
}

impl BodyDisposition {
    /// Line shown under the headers, if any
    pub fn message(&self) -> Option<&'static str> {
        match self {
            Self::Skipped => None,
            Self::Discarded { .. } => Some("Body discarded"),
            Self::Saved { .. } => Some("Body read"),
        }
    }

    pub fn bytes(&self) -> u64 {
        match self {
            Self::Skipped => 0,
            Self::Discarded { bytes } | Self::Saved { bytes, .. } => *bytes,
        }
    }
}

/// Bodies of HEAD requests and redirect responses are left unread
pub fn should_read(method: &Method, status: StatusCode) -> bool {
    *method != Method::HEAD && !status.is_redirection()
}

/// `filename` parameter of an `attachment` Content-Disposition
pub fn filename_from_headers(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(http::header::CONTENT_DISPOSITION)?.to_str().ok()?;
    let attachment = Regex::new(r#"(?i)^\s*attachment\s*(?:;|$)"#).ok()?;
    if !attachment.is_match(value) {
        return None;
    }

    let filename = Regex::new(r#"(?i);\s*filename\s*=\s*(?:"((?:[^"\\]|\\.)*)"|([^;\s"]+))"#).ok()?;
    let captures = filename.captures(value)?;
    let raw = captures.get(1).or_else(|| captures.get(2))?.as_str();
    let unescaped = raw.replace("\\\"", "\"").replace("\\\\", "\\");

    // Only the final component; a header must not pick the directory.
    Path::new(&unescaped)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
}

/// Last non-empty segment of the request path
pub fn filename_from_url(url: &Url) -> Option<String> {
    url.path()
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
}

/// Destination for the body under the save mode, `None` when discarding
pub fn output_path(save: &SaveMode, headers: &HeaderMap, url: &Url) -> Result<Option<PathBuf>> {
    match save {
        SaveMode::Discard => Ok(None),
        SaveMode::File(path) => Ok(Some(path.clone())),
        SaveMode::RemoteName => filename_from_headers(headers)
            .or_else(|| filename_from_url(url))
            .map(|name| Some(PathBuf::from(name)))
            .ok_or_else(|| {
                AppError::config("No remote filename; specify output filename with -o to save response body")
            }),
    }
}

/// Read `body` to the end, writing it to `sink` when given
pub async fn consume(mut body: ResponseBody, sink: Option<PathBuf>) -> Result<BodyDisposition> {
    let mut bytes = 0u64;

    let Some(path) = sink else {
        while let Some(frame) = body.frame().await {
            if let Ok(data) = frame?.into_data() {
                bytes += data.len() as u64;
            }
        }
        return Ok(BodyDisposition::Discarded { bytes });
    };

    let mut file = tokio::fs::File::create(&path)
        .await
        .map_err(|e| AppError::io(format!("unable to create file {}: {}", path.display(), e)))?;

    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(|e| AppError::io(format!("failed to read response body: {}", e)))?;
        if let Ok(data) = frame.into_data() {
            file.write_all(&data)
                .await
                .map_err(|e| AppError::io(format!("failed to write {}: {}", path.display(), e)))?;
            bytes += data.len() as u64;
        }
    }
    file.flush()
        .await
        .map_err(|e| AppError::io(format!("failed to write {}: {}", path.display(), e)))?;

    Ok(BodyDisposition::Saved { path, bytes })
}
