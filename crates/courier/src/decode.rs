//! # Response Decoding
//!
//! Pure functions turning raw response bytes into typed values or classified
//! errors. Nothing here holds state, so any number of callers can decode the
//! same shared bytes into whatever shapes they need.

use std::sync::Arc;

use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::RequestError;

/// Decode a JSON body into `T`.
///
/// An empty body is read as `null`, so `()` and `Option<_>` targets accept
/// bodiless responses such as 204.
pub fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, RequestError> {
    let body = if body.iter().all(u8::is_ascii_whitespace) {
        b"null".as_slice()
    } else {
        body
    };

    serde_json::from_slice(body).map_err(|e| RequestError::Decode {
        target: std::any::type_name::<T>(),
        source: Arc::new(e),
    })
}

/// Error payload servers send along with 4xx/5xx responses
#[derive(Debug, Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    msg: Option<String>,
}

/// Extract `(code, message)` from an error body.
///
/// Structured payloads provide `message` (or `error`/`msg`) and an optional
/// `code`; anything else falls back to the raw body text.
pub fn decode_error_message(status: StatusCode, body: &[u8]) -> (Option<String>, String) {
    if let Ok(payload) = serde_json::from_slice::<ErrorPayload>(body) {
        let code = payload.code.and_then(|code| match code {
            serde_json::Value::String(s) => Some(s),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        });

        if let Some(message) = payload.message.or(payload.error).or(payload.msg) {
            return (code, message);
        }
        if let Some(code) = code {
            return (Some(code), raw_text(status, body));
        }
    }

    (None, raw_text(status, body))
}

/// Classify an HTTP failure response
pub fn protocol_error(status: StatusCode, body: &[u8]) -> RequestError {
    let (code, message) = decode_error_message(status, body);
    RequestError::Protocol {
        status,
        code,
        message,
    }
}

fn raw_text(status: StatusCode, body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        status
            .canonical_reason()
            .map(str::to_string)
            .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
    } else {
        text.to_string()
    }
}
