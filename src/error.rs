//! Error types for SafeNav client operations.

use reqwest::StatusCode;

/// Failure of a single round trip to the SafeNav service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The service answered with a non-success status.
    ///
    /// `message` is the diagnostic the service put in the body, or a generic
    /// per-operation message when the body could not be read.
    #[error("{message}")]
    Status { status: StatusCode, message: String },

    /// The request never completed, or the response body was not the
    /// expected shape.
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Rejected locally before any request was sent.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The local session store could not be read or written.
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl ApiError {
    /// The text to show the user.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Status { message, .. } => message.clone(),
            ApiError::Transport(e) if e.is_decode() => {
                "Unexpected response from the SafeNav service".to_string()
            }
            ApiError::Transport(_) => "Unable to reach the SafeNav service".to_string(),
            ApiError::Validation(e) => e.to_string(),
            ApiError::Storage(e) => format!("Local storage error: {}", e),
        }
    }

    /// HTTP status, if the service responded at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Transport(e) => e.status(),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }
}

/// Form validation failures, caught before any remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Email and password are required")]
    MissingCredentials,

    #[error("All fields are required")]
    MissingAccountFields,

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Name is required")]
    MissingName,

    #[error("All password fields are required")]
    MissingPasswordFields,

    #[error("New passwords do not match")]
    NewPasswordMismatch,

    #[error("Name and phone number are required")]
    MissingContactFields,

    #[error("Start and destination are required")]
    MissingRouteEndpoints,
}
