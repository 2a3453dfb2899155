//! Authentication error types.

use thiserror::Error;

/// Authentication error type.
///
/// Provider-facing variants carry the message shown to the user; their
/// `Display` is that message verbatim.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Wrong email or password
    #[error("{0}")]
    InvalidCredentials(String),

    /// Sign-up with an email that already has an account
    #[error("{0}")]
    EmailInUse(String),

    /// Password rejected by the provider's strength rules
    #[error("{0}")]
    WeakPassword(String),

    /// Malformed email address
    #[error("{0}")]
    InvalidEmail(String),

    /// Federated sign-in was abandoned or denied by the user
    #[error("Sign-in window was closed before completing")]
    PopupClosed,

    /// Federated sign-in could not be started
    #[error("Sign-in window could not be opened: {0}")]
    PopupBlocked(String),

    /// Backend unreachable
    #[error("Network error: {0}")]
    Network(String),

    /// Provider failure that fits no other category
    #[error("{0}")]
    Unknown(String),

    /// Operation needs a signed-in user
    #[error("Not logged in")]
    NotLoggedIn,

    /// A provider notification replaced the session while the call ran
    #[error("Session changed while signing in")]
    Superseded,

    /// Token refresh error
    #[error("Token refresh failed: {0}")]
    TokenRefresh(String),

    /// Refresh retries exhausted
    #[error("Token refresh failed after {0} attempts")]
    RefreshExhausted(u32),

    /// Invalid state transition in the session FSM
    #[error("Invalid session state transition: {0}")]
    InvalidStateTransition(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] furrow_storage::StorageError),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parse error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Timeout error
    #[error("Operation timed out")]
    Timeout,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AuthError {
    /// Stable kebab-case code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials(_) => "invalid-credentials",
            AuthError::EmailInUse(_) => "email-in-use",
            AuthError::WeakPassword(_) => "weak-password",
            AuthError::InvalidEmail(_) => "invalid-email",
            AuthError::PopupClosed => "popup-closed",
            AuthError::PopupBlocked(_) => "popup-blocked",
            AuthError::Network(_) | AuthError::Http(_) | AuthError::Timeout => "network",
            AuthError::Unknown(_) => "unknown",
            AuthError::NotLoggedIn => "not-logged-in",
            AuthError::Superseded => "superseded",
            AuthError::TokenRefresh(_) | AuthError::RefreshExhausted(_) => "token-refresh",
            AuthError::InvalidStateTransition(_) => "invalid-state-transition",
            AuthError::Storage(_) => "storage",
            AuthError::Io(_) => "io",
            AuthError::Json(_) => "invalid-response",
            AuthError::InvalidUrl(_) | AuthError::Config(_) => "config",
        }
    }

    /// Returns true if this error is transient and the operation can be retried.
    ///
    /// Transient errors include:
    /// - Network failures
    /// - HTTP errors with 5xx status codes
    /// - Connection timeouts
    pub fn is_transient(&self) -> bool {
        match self {
            AuthError::Network(_) => true,
            AuthError::Timeout => true,
            AuthError::Http(e) => {
                if e.is_connect() || e.is_timeout() {
                    return true;
                }
                if let Some(status) = e.status() {
                    return status.is_server_error();
                }
                false
            }
            _ => false,
        }
    }
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;
