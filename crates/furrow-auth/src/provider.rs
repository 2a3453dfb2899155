//! Identity provider contract.

use crate::AuthResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// User object as returned by the identity provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Free-form profile metadata (`full_name`, `name`, avatar, ...).
    #[serde(default)]
    pub user_metadata: serde_json::Value,
}

/// Stream of session changes. Dropping the receiver unsubscribes.
pub type SessionChanges = broadcast::Receiver<Option<ProviderUser>>;

/// Remote service that authenticates users and reports session changes.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<ProviderUser>;

    async fn sign_up(&self, email: &str, password: &str) -> AuthResult<ProviderUser>;

    /// Interactive federated sign-in.
    async fn sign_in_with_google(&self) -> AuthResult<ProviderUser>;

    async fn sign_out(&self) -> AuthResult<()>;

    /// Subscribe to session changes. `None` means nobody is signed in.
    fn on_session_changed(&self) -> SessionChanges;

    /// Replay whatever session the provider persisted from an earlier run.
    async fn restore_session(&self) -> AuthResult<Option<ProviderUser>>;
}

/// Source of bearer tokens for authenticated backend calls.
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    /// A currently valid access token, refreshed if needed.
    async fn access_token(&self) -> AuthResult<String>;
}
