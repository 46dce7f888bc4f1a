//! Source list loading and channel URL parsing.
//!
//! A source list is a CSV file with a `url` column; every other column is
//! carried along as free-form metadata and stored with the resolved
//! channel. URLs are parsed into one of the three channel reference forms
//! the provider can resolve directly.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use tracing::debug;

/// One entry from a source list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    /// The channel URL as given
    pub url: String,
    /// Remaining CSV columns, keyed by header name
    pub metadata: BTreeMap<String, String>,
}

/// A channel reference extracted from a URL, in a form the provider can
/// resolve with a single lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRef {
    /// A raw channel id (`UC...`), from `/channel/<id>` URLs
    ChannelId(String),
    /// A handle, from `/@handle` or `/c/<name>` URLs
    Handle(String),
    /// A legacy username, from `/user/<name>` URLs
    Username(String),
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceRef::ChannelId(id) => write!(f, "channel:{id}"),
            SourceRef::Handle(handle) => write!(f, "handle:{handle}"),
            SourceRef::Username(name) => write!(f, "user:{name}"),
        }
    }
}

/// Errors raised while loading or parsing sources
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The source file could not be read
    #[error("failed to read source list: {0}")]
    Io(#[from] std::io::Error),

    /// The CSV was malformed
    #[error("failed to parse source list: {0}")]
    Csv(#[from] csv::Error),

    /// The CSV has no `url` column
    #[error("source list is missing the required 'url' column")]
    MissingUrlColumn,

    /// A URL did not contain a recognizable channel reference
    #[error("unrecognized channel URL: {0}")]
    UnrecognizedUrl(String),
}

/// Load sources from a CSV file with a required `url` column.
///
/// Rows with an empty URL are skipped. All other columns become metadata.
pub fn load_sources(path: &Path) -> Result<Vec<Source>, SourceError> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let url_index = headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case("url"))
        .ok_or(SourceError::MissingUrlColumn)?;

    let mut sources = Vec::new();
    for record in reader.records() {
        let record = record?;
        let url = record.get(url_index).unwrap_or("").trim().to_string();
        if url.is_empty() {
            continue;
        }
        let mut metadata = BTreeMap::new();
        for (index, header) in headers.iter().enumerate() {
            if index == url_index {
                continue;
            }
            if let Some(value) = record.get(index) {
                let value = value.trim();
                if !value.is_empty() {
                    metadata.insert(header.to_string(), value.to_string());
                }
            }
        }
        sources.push(Source { url, metadata });
    }
    debug!(count = sources.len(), path = %path.display(), "Loaded source list");
    Ok(sources)
}

/// Extract a resolvable channel reference from a channel URL.
///
/// Recognized forms:
/// - `https://www.youtube.com/channel/UCxxxx` (channel id)
/// - `https://www.youtube.com/@handle` (handle)
/// - `https://www.youtube.com/c/Name` (custom URL, resolved as a handle)
/// - `https://www.youtube.com/user/name` (legacy username)
///
/// A bare `@handle` or `UC...` id without URL scaffolding is also accepted.
pub fn extract_channel_ref(url: &str) -> Result<SourceRef, SourceError> {
    let trimmed = url.trim().trim_end_matches('/');

    // Bare forms first
    if let Some(handle) = trimmed.strip_prefix('@') {
        if !handle.is_empty() && !handle.contains('/') {
            return Ok(SourceRef::Handle(handle.to_string()));
        }
    }
    if trimmed.starts_with("UC") && trimmed.len() >= 10 && !trimmed.contains('/') {
        return Ok(SourceRef::ChannelId(trimmed.to_string()));
    }

    let path = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed);
    let path = path
        .strip_prefix("www.youtube.com/")
        .or_else(|| path.strip_prefix("youtube.com/"))
        .or_else(|| path.strip_prefix("m.youtube.com/"))
        .ok_or_else(|| SourceError::UnrecognizedUrl(url.to_string()))?;

    // Drop query strings before splitting path segments
    let path = path.split('?').next().unwrap_or(path);
    let mut segments = path.split('/').filter(|s| !s.is_empty());

    let first = segments
        .next()
        .ok_or_else(|| SourceError::UnrecognizedUrl(url.to_string()))?;

    let reference = match first {
        "channel" => segments.next().map(|id| SourceRef::ChannelId(id.to_string())),
        "c" => segments.next().map(|name| SourceRef::Handle(name.to_string())),
        "user" => segments.next().map(|name| SourceRef::Username(name.to_string())),
        handle if handle.starts_with('@') => {
            let handle = &handle[1..];
            if handle.is_empty() {
                None
            } else {
                Some(SourceRef::Handle(handle.to_string()))
            }
        }
        _ => None,
    };

    reference.ok_or_else(|| SourceError::UnrecognizedUrl(url.to_string()))
}
