//! Generation client error types.

use thiserror::Error;

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Generation API is not configured")]
    NotConfigured,

    #[error("{message}")]
    RequestFailed { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl ClientError {
    /// HTTP status returned by the provider, if the call got that far.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::RequestFailed { status, .. } => Some(*status),
            ClientError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Message suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::RequestFailed { message, .. } => message.clone(),
            ClientError::Network(e) if e.is_timeout() => {
                "The generation service did not respond in time.".to_string()
            }
            ClientError::Network(_) => "Could not reach the generation service.".to_string(),
            ClientError::NotConfigured => "Video generation is not configured.".to_string(),
            ClientError::InvalidResponse(_) => {
                "The generation service returned an unexpected response.".to_string()
            }
        }
    }
}
