//! HTTP cache control module
//!
//! Provides validator generation (`ETag`, `Last-Modified`), conditional
//! request evaluation and the `Cache-Control` policies applied per path.

use hyper::header::{self, HeaderMap, HeaderValue};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Tolerance added to `If-Modified-Since`, which carries whole seconds only
const MODIFIED_SINCE_TOLERANCE: Duration = Duration::from_secs(1);

/// Validator pair derived from a resource's modification time and size
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validators {
    pub etag: String,
    pub last_modified: String,
    modified: SystemTime,
}

impl Validators {
    pub fn new(modified: SystemTime, size: u64) -> Self {
        Self {
            etag: generate_etag(modified, size),
            last_modified: format_http_date(modified),
            modified,
        }
    }

    /// Decide whether a conditional request can be answered with 304.
    ///
    /// `If-None-Match` must equal the `ETag` byte for byte. When it is absent
    /// or different, `If-Modified-Since` is consulted; an unparseable date
    /// counts as absent.
    pub fn is_not_modified(
        &self,
        if_none_match: Option<&str>,
        if_modified_since: Option<&str>,
    ) -> bool {
        if if_none_match.is_some_and(|client_etag| client_etag == self.etag) {
            return true;
        }

        if_modified_since
            .and_then(|value| httpdate::parse_http_date(value).ok())
            .is_some_and(|since| self.modified < since + MODIFIED_SINCE_TOLERANCE)
    }

    /// Write `ETag` and `Last-Modified` into a header map
    pub fn apply(&self, headers: &mut HeaderMap) {
        if let Ok(value) = HeaderValue::from_str(&self.etag) {
            headers.insert(header::ETAG, value);
        }
        if let Ok(value) = HeaderValue::from_str(&self.last_modified) {
            headers.insert(header::LAST_MODIFIED, value);
        }
    }
}

/// Generate a quoted `ETag` of the form `"<hex mtime secs>-<hex size>"`
///
/// Modification times before the Unix epoch render as a negative hex number.
pub fn generate_etag(modified: SystemTime, size: u64) -> String {
    match modified.duration_since(UNIX_EPOCH) {
        Ok(since) => format!("\"{:x}-{size:x}\"", since.as_secs()),
        Err(before) => format!("\"-{:x}-{size:x}\"", before.duration().as_secs()),
    }
}

/// IMF-fixdate, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`
pub fn format_http_date(time: SystemTime) -> String {
    httpdate::fmt_http_date(time.max(UNIX_EPOCH))
}

/// Cache-Control treatment for a request path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Content-addressed build output, cached for a year
    Immutable,
    /// The SPA shell, always revalidated
    NoCache,
    /// Any other existing file
    ShortCache,
}

impl CachePolicy {
    /// Cache-Control header value
    pub const fn to_header_value(self) -> &'static str {
        match self {
            Self::Immutable => "public, max-age=31536000, immutable",
            Self::NoCache => "no-cache, no-store, must-revalidate",
            Self::ShortCache => "public, max-age=3600",
        }
    }

    /// Write the policy's headers into a header map
    pub fn apply(self, headers: &mut HeaderMap) {
        headers.insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static(self.to_header_value()),
        );
        if self == Self::NoCache {
            headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
            headers.insert(header::EXPIRES, HeaderValue::from_static("0"));
        }
    }
}
