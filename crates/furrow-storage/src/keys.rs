//! Storage key constants.

/// Storage keys used by Furrow clients
pub struct StorageKeys;

impl StorageKeys {
    /// Persisted session snapshot (`{"user": ...}`)
    pub const AUTH_STORAGE: &'static str = "auth-storage";

    /// Identity provider access token
    pub const PROVIDER_ACCESS_TOKEN: &'static str = "provider.access_token";

    /// Identity provider refresh token
    pub const PROVIDER_REFRESH_TOKEN: &'static str = "provider.refresh_token";

    /// Identity provider session metadata (JSON)
    pub const PROVIDER_SESSION_META: &'static str = "provider.session_meta";
}
