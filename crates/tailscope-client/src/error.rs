use hyper::StatusCode;
use thiserror::Error;

use tailscope_types::ErrorBody;

/// Errors returned by any monitor endpoint
#[derive(Debug, Error)]
pub enum ApiError {
    /// The configured server address cannot be used
    #[error("invalid server address: {0}")]
    InvalidUrl(String),

    /// TCP connection to the server failed
    #[error("failed to connect to server: {0}")]
    Connect(#[from] std::io::Error),

    /// HTTP protocol failure while talking to the server
    #[error("http error: {0}")]
    Http(#[from] hyper::Error),

    /// The request could not be built
    #[error("invalid request: {0}")]
    Request(#[from] hyper::http::Error),

    /// Response body was not the expected JSON
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Non-2xx response carrying `{message, traceback}`
    #[error("{message}")]
    Server {
        status: StatusCode,
        message: String,
        traceback: Option<String>,
    },
}

impl ApiError {
    /// Build a server error from a non-2xx status and its raw body
    pub fn from_response(status: StatusCode, body: &[u8]) -> Self {
        match serde_json::from_slice::<ErrorBody>(body) {
            Ok(parsed) if !parsed.message.is_empty() => Self::Server {
                status,
                message: parsed.message,
                traceback: parsed.traceback.filter(|t| !t.is_empty()),
            },
            _ => {
                let text = String::from_utf8_lossy(body).trim().to_string();
                let message = if text.is_empty() {
                    format!("server responded with {}", status)
                } else {
                    text
                };
                Self::Server {
                    status,
                    message,
                    traceback: None,
                }
            }
        }
    }

    /// Message shown to the operator
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Server-side traceback, when one was sent
    pub fn traceback(&self) -> Option<&str> {
        match self {
            Self::Server { traceback, .. } => traceback.as_deref(),
            _ => None,
        }
    }
}
