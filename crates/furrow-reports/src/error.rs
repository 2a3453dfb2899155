//! Report access error types.

use furrow_auth::AuthError;
use thiserror::Error;

/// Error type for report operations. A missing report on read is `Ok(None)`,
/// not an error.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No active session
    #[error("Not signed in")]
    Unauthenticated,

    /// Operation targets another user's data
    #[error("Permission denied: {0}")]
    Forbidden(String),

    /// Rejected before reaching the store
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Update target does not exist
    #[error("Report not found: {0}")]
    NotFound(String),

    /// Store unreachable or temporarily failing
    #[error("Network error: {0}")]
    Network(String),

    /// Store failure that fits no other category
    #[error("Store error: {0}")]
    Unknown(String),

    /// Could not obtain credentials for the store
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::Unauthenticated => "unauthenticated",
            StoreError::Forbidden(_) => "permission-denied",
            StoreError::InvalidInput(_) => "invalid-argument",
            StoreError::NotFound(_) => "not-found",
            StoreError::Network(_) | StoreError::Http(_) => "network",
            StoreError::Auth(AuthError::NotLoggedIn) => "unauthenticated",
            StoreError::Auth(e) => e.code(),
            StoreError::Unknown(_) | StoreError::Json(_) => "unknown",
        }
    }

    /// Returns true if the operation can be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Network(_) => true,
            StoreError::Auth(e) => e.is_transient(),
            StoreError::Http(e) => {
                if e.is_connect() || e.is_timeout() {
                    return true;
                }
                e.status().is_some_and(|status| status.is_server_error())
            }
            _ => false,
        }
    }
}

/// Result type alias using StoreError.
pub type StoreResult<T> = Result<T, StoreError>;
