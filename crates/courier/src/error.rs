use reqwest::StatusCode;
use std::error::Error as StdError;
use std::sync::Arc;

/// Failure below the HTTP layer: no response was obtained.
///
/// Sources are reference counted so a single failure can be handed to every
/// caller waiting on the same request.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("network error: {source}")]
    Network {
        #[source]
        source: Arc<reqwest::Error>,
    },

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("request aborted before a response was received")]
    Aborted,

    #[error("transport error: {0}")]
    Other(Arc<dyn StdError + Send + Sync>),
}

impl TransportError {
    /// Whether the failure was a timeout, whatever layer raised it.
    pub fn is_timeout(&self) -> bool {
        match self {
            TransportError::Network { source } => source.is_timeout(),
            TransportError::Timeout(_) => true,
            _ => false,
        }
    }
}

// Manual implementation because of the Arc wrapping.
impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError::Network {
            source: Arc::new(err),
        }
    }
}

/// Everything `ApiClient` can hand back instead of a decoded value.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RequestError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Transport failure: {0}")]
    Transport(#[from] TransportError),

    #[error("Server returned 304 for {url} but nothing is cached for it")]
    NoCachedData { url: String },

    #[error("Server returned status code {status}: {message}")]
    Protocol {
        status: StatusCode,
        code: Option<String>,
        message: String,
    },

    #[error("Failed to decode response as {target}: {source}")]
    Decode {
        target: &'static str,
        #[source]
        source: Arc<serde_json::Error>,
    },

    #[error("Failed to encode request body: {source}")]
    Encode {
        #[source]
        source: Arc<serde_json::Error>,
    },

    #[error("Invalid client configuration: {0}")]
    Config(String),

    #[error("Invalid proxy configuration: {0}")]
    Proxy(String),
}

impl RequestError {
    /// True when the server was never reached, i.e. the device is likely offline.
    pub fn is_offline(&self) -> bool {
        matches!(self, RequestError::Transport(_))
    }

    /// HTTP status attached to the failure, if the server answered.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            RequestError::Protocol { status, .. } => Some(*status),
            RequestError::NoCachedData { .. } => Some(StatusCode::NOT_MODIFIED),
            _ => None,
        }
    }
}
