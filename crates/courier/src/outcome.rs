//! # Outcomes
//!
//! `RawOutcome` is what a leader produces and every follower receives. It is
//! deliberately undecoded: each caller turns it into its own typed response.

use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;

use crate::decode::{decode, protocol_error};
use crate::error::{RequestError, TransportError};

/// Classified result of one transport exchange, shared by all waiters
#[derive(Debug, Clone)]
pub enum RawOutcome {
    /// 2xx (or other non-error) response with its body
    Success {
        status: StatusCode,
        headers: HeaderMap,
        body: Bytes,
    },
    /// 304 answered from the cached body
    NotModified {
        status: StatusCode,
        headers: HeaderMap,
        body: Bytes,
    },
    /// No response was obtained
    TransportFailure(TransportError),
    /// Server answered with status >= 400
    ProtocolFailure {
        status: StatusCode,
        headers: HeaderMap,
        body: Bytes,
    },
    /// 304 received while nothing was cached for the resource
    NoCachedData { url: String },
}

impl RawOutcome {
    pub fn is_transport_failure(&self) -> bool {
        matches!(self, RawOutcome::TransportFailure(_))
    }

    /// HTTP status, when the server answered at all
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            RawOutcome::Success { status, .. }
            | RawOutcome::NotModified { status, .. }
            | RawOutcome::ProtocolFailure { status, .. } => Some(*status),
            RawOutcome::NoCachedData { .. } => Some(StatusCode::NOT_MODIFIED),
            RawOutcome::TransportFailure(_) => None,
        }
    }

    /// Short label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            RawOutcome::Success { .. } => "success",
            RawOutcome::NotModified { .. } => "not_modified",
            RawOutcome::TransportFailure(_) => "transport_failure",
            RawOutcome::ProtocolFailure { .. } => "protocol_failure",
            RawOutcome::NoCachedData { .. } => "no_cached_data",
        }
    }

    /// Convert into bytes for the caller, classifying every failure
    pub fn into_raw_response(self) -> Result<RawResponse, RequestError> {
        match self {
            RawOutcome::Success {
                status,
                headers,
                body,
            } => Ok(RawResponse {
                status,
                headers,
                body,
                source: ResponseSource::Network,
            }),
            RawOutcome::NotModified {
                status,
                headers,
                body,
            } => Ok(RawResponse {
                status,
                headers,
                body,
                source: ResponseSource::Revalidated,
            }),
            RawOutcome::TransportFailure(err) => Err(RequestError::Transport(err)),
            RawOutcome::ProtocolFailure { status, body, .. } => Err(protocol_error(status, &body)),
            RawOutcome::NoCachedData { url } => Err(RequestError::NoCachedData { url }),
        }
    }

    /// Convert into a typed response for the caller
    pub fn into_response<T: DeserializeOwned>(self) -> Result<ApiResponse<T>, RequestError> {
        self.into_raw_response()?.decode()
    }
}

/// Where the body handed to the caller came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    /// Body was downloaded by this exchange
    Network,
    /// Server answered 304 and the body came from the conditional cache
    Revalidated,
}

/// Undecoded successful response
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub source: ResponseSource,
}

impl RawResponse {
    /// Decode the body into `T`, keeping status and headers
    pub fn decode<T: DeserializeOwned>(self) -> Result<ApiResponse<T>, RequestError> {
        let value = decode(&self.body)?;
        Ok(ApiResponse {
            status: self.status,
            headers: self.headers,
            value,
            source: self.source,
        })
    }
}

/// Decoded successful response
#[derive(Debug, Clone)]
pub struct ApiResponse<T> {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub value: T,
    pub source: ResponseSource,
}

impl<T> ApiResponse<T> {
    pub fn into_value(self) -> T {
        self.value
    }

    pub fn is_revalidated(&self) -> bool {
        self.source == ResponseSource::Revalidated
    }
}
