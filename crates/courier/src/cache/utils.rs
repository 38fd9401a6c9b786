//! # Cache Utilities
//!
//! Common utility functions for cache operations.

use reqwest::header::{ETAG, HeaderMap};

/// Extract the validator (ETag) from response headers.
///
/// Blank or non-visible-ASCII values are ignored, since they could not be
/// echoed back in `If-None-Match`.
pub fn extract_validator(headers: &HeaderMap) -> Option<String> {
    headers
        .get(ETAG)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}
