use reqwest::StatusCode;
use thiserror::Error;

/// Message shown for every failure the server did not explain itself.
pub const GENERIC_FAILURE: &str = "An error occurred. Please try again.";

/// Failure of a single API call.
///
/// Callers that only need something to show use [`ApiError::user_message`];
/// transport and business failures collapse into the same shape there.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Network unreachable, timeout, or a body that was not JSON.
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-2xx status or `"success": false`.
    #[error("{endpoint} rejected the request ({status}): {message}")]
    Rejected {
        endpoint: String,
        status: StatusCode,
        message: String,
    },

    /// Input rejected before any request was sent.
    #[error("{0}")]
    Invalid(String),

    /// A success body that lacks a required field.
    #[error("unexpected response from {endpoint}: {reason}")]
    Decode { endpoint: String, reason: String },
}

impl ApiError {
    pub fn user_message(&self) -> &str {
        match self {
            ApiError::Rejected { message, .. } => message,
            ApiError::Invalid(message) => message,
            ApiError::Transport { .. } | ApiError::Decode { .. } => GENERIC_FAILURE,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Rejected { status, .. } => Some(*status),
            ApiError::Transport { source, .. } => source.status(),
            ApiError::Invalid(_) | ApiError::Decode { .. } => None,
        }
    }
}
