//! Error types shared by the session components.

use crate::context::SessionState;

/// A failure reported by the external avatar backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("Backend request failed: {0}")]
    Request(String),
    #[error("Stream disconnected")]
    Disconnected,
}

/// A failure while obtaining a short-lived access token.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("Failed to reach the credential endpoint: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Credential endpoint returned {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("Credential endpoint returned an empty token")]
    EmptyToken,
}

/// Errors surfaced by the session lifecycle, voice chat and reconnection paths.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("There is already an active session (state: {0})")]
    InvalidState(SessionState),
    #[error("Token is required")]
    MissingToken,
    #[error("Avatar is not initialized")]
    NotInitialized,
    #[error("Access code has not been verified")]
    AccessDenied,
    #[error("Session was stopped before it finished starting")]
    Superseded,
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Credential(#[from] CredentialError),
}

impl SessionError {
    /// Precondition errors are caller mistakes; they are reported but never
    /// fed into automatic reconnection.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::InvalidState(_)
                | Self::MissingToken
                | Self::NotInitialized
                | Self::AccessDenied
                | Self::Superseded
        )
    }
}

pub type SessionResult<T> = Result<T, SessionError>;
