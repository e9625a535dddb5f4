//! Error types shared by the view layer and the API client.

use thiserror::Error;

/// Errors surfaced at the `TabularView` boundary.
///
/// All variants are recoverable: the view keeps its last good state and
/// hands the error back to the host for display.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewError {
    /// Network/transport failure, non-2xx status or a `success: false` reply.
    #[error("fetch failed: {message}")]
    Fetch { message: String },

    /// The payload could not be decoded into rows.
    #[error("malformed response: {message}")]
    Parse { message: String },

    /// The caller asked for something the view cannot represent.
    #[error("invalid request: {message}")]
    Validation { message: String },
}

impl ViewError {
    pub fn fetch(message: impl Into<String>) -> Self {
        Self::Fetch {
            message: message.into(),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

/// Errors produced by the HTTP client.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("could not decode response: {0}")]
    Parse(String),

    #[error("server rejected request: {0}")]
    Rejected(String),

    #[error("you cannot log in as {requested} with these credentials")]
    RoleMismatch { requested: String },

    #[error("{0}")]
    InvalidInput(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ApiError> for ViewError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Parse(message) => ViewError::Parse { message },
            ApiError::InvalidInput(message) => ViewError::Validation { message },
            other => ViewError::Fetch {
                message: other.to_string(),
            },
        }
    }
}
