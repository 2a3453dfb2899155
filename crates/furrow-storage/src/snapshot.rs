//! Persisted session snapshot and identity provider tokens.

use crate::{LocalStorage, StorageKeys, StorageResult};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Seconds of remaining lifetime below which a token counts as expired.
const EXPIRY_SKEW_SECS: i64 = 60;

/// Identity provider session metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSessionMeta {
    /// User ID assigned by the identity provider
    pub user_id: String,
    /// User email, if the provider returned one
    #[serde(default)]
    pub email: Option<String>,
    /// Display name from provider metadata
    #[serde(default)]
    pub display_name: Option<String>,
    /// When the access token expires
    pub expires_at: DateTime<Utc>,
}

impl ProviderSessionMeta {
    /// True when the access token is expired or about to expire.
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .signed_duration_since(Utc::now())
            .num_seconds()
            < EXPIRY_SKEW_SECS
    }
}

/// On-disk shape of the session snapshot: the user and nothing else.
#[derive(Serialize, Deserialize)]
struct SnapshotDocument<U> {
    user: Option<U>,
}

/// High-level API over a [`LocalStorage`] backend for session state
pub struct SnapshotManager {
    storage: Box<dyn LocalStorage>,
}

impl SnapshotManager {
    pub fn new(storage: Box<dyn LocalStorage>) -> Self {
        Self { storage }
    }

    // ==========================================
    // Session snapshot
    // ==========================================

    /// Persist `{"user": user}` under the `auth-storage` key.
    pub fn save_snapshot<U: Serialize>(&self, user: Option<&U>) -> StorageResult<()> {
        let json = serde_json::to_string(&SnapshotDocument { user })?;
        self.storage.set(StorageKeys::AUTH_STORAGE, &json)
    }

    /// Load the persisted user, if any.
    pub fn load_snapshot<U: DeserializeOwned>(&self) -> StorageResult<Option<U>> {
        match self.storage.get(StorageKeys::AUTH_STORAGE)? {
            Some(json) => {
                let doc: SnapshotDocument<U> = serde_json::from_str(&json)?;
                Ok(doc.user)
            }
            None => Ok(None),
        }
    }

    pub fn clear_snapshot(&self) -> StorageResult<()> {
        self.storage.delete(StorageKeys::AUTH_STORAGE)?;
        Ok(())
    }

    // ==========================================
    // Identity provider session
    // ==========================================

    pub fn set_access_token(&self, token: &str) -> StorageResult<()> {
        self.storage.set(StorageKeys::PROVIDER_ACCESS_TOKEN, token)
    }

    pub fn get_access_token(&self) -> StorageResult<Option<String>> {
        self.storage.get(StorageKeys::PROVIDER_ACCESS_TOKEN)
    }

    pub fn set_refresh_token(&self, token: &str) -> StorageResult<()> {
        self.storage.set(StorageKeys::PROVIDER_REFRESH_TOKEN, token)
    }

    pub fn get_refresh_token(&self) -> StorageResult<Option<String>> {
        self.storage.get(StorageKeys::PROVIDER_REFRESH_TOKEN)
    }

    pub fn set_session_meta(&self, meta: &ProviderSessionMeta) -> StorageResult<()> {
        let json = serde_json::to_string(meta)?;
        self.storage.set(StorageKeys::PROVIDER_SESSION_META, &json)
    }

    pub fn get_session_meta(&self) -> StorageResult<Option<ProviderSessionMeta>> {
        match self.storage.get(StorageKeys::PROVIDER_SESSION_META)? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Check if a provider session (token and metadata) is stored
    pub fn has_provider_session(&self) -> StorageResult<bool> {
        let has_token = self.storage.has(StorageKeys::PROVIDER_ACCESS_TOKEN)?;
        let has_meta = self.storage.has(StorageKeys::PROVIDER_SESSION_META)?;
        Ok(has_token && has_meta)
    }

    /// Missing metadata counts as expired.
    pub fn is_session_expired(&self) -> StorageResult<bool> {
        Ok(self
            .get_session_meta()?
            .map(|meta| meta.is_expired())
            .unwrap_or(true))
    }

    /// Store tokens and metadata together
    pub fn set_provider_session(
        &self,
        access_token: &str,
        refresh_token: &str,
        meta: &ProviderSessionMeta,
    ) -> StorageResult<()> {
        self.set_access_token(access_token)?;
        self.set_refresh_token(refresh_token)?;
        self.set_session_meta(meta)
    }

    /// Remove every provider key. Missing keys are not an error.
    pub fn clear_provider_session(&self) -> StorageResult<()> {
        self.storage.delete(StorageKeys::PROVIDER_ACCESS_TOKEN)?;
        self.storage.delete(StorageKeys::PROVIDER_REFRESH_TOKEN)?;
        self.storage.delete(StorageKeys::PROVIDER_SESSION_META)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FileStorage, MemoryStorage};
    use chrono::Duration;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct User {
        user_id: String,
        email: String,
    }

    fn manager() -> SnapshotManager {
        SnapshotManager::new(Box::new(MemoryStorage::new()))
    }

    fn meta(expires_in: Duration) -> ProviderSessionMeta {
        ProviderSessionMeta {
            user_id: "user-1".to_string(),
            email: Some("a@b.com".to_string()),
            display_name: None,
            expires_at: Utc::now() + expires_in,
        }
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let manager = manager();
        assert_eq!(manager.load_snapshot::<User>().unwrap(), None);

        let user = User {
            user_id: "user-1".to_string(),
            email: "a@b.com".to_string(),
        };
        manager.save_snapshot(Some(&user)).unwrap();
        assert_eq!(manager.load_snapshot::<User>().unwrap(), Some(user));

        manager.save_snapshot::<User>(None).unwrap();
        assert_eq!(manager.load_snapshot::<User>().unwrap(), None);
    }

    #[test]
    fn test_snapshot_document_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        let manager = SnapshotManager::new(Box::new(FileStorage::open(&path).unwrap()));
        manager.save_snapshot::<User>(None).unwrap();

        let file: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let raw = file[StorageKeys::AUTH_STORAGE].as_str().unwrap();
        let value: serde_json::Value = serde_json::from_str(raw).unwrap();
        assert_eq!(value, serde_json::json!({ "user": null }));
    }

    #[test]
    fn test_provider_session_lifecycle() {
        let manager = manager();
        assert!(!manager.has_provider_session().unwrap());
        assert!(manager.is_session_expired().unwrap());

        manager
            .set_provider_session("access", "refresh", &meta(Duration::hours(1)))
            .unwrap();
        assert!(manager.has_provider_session().unwrap());
        assert!(!manager.is_session_expired().unwrap());
        assert_eq!(manager.get_access_token().unwrap(), Some("access".to_string()));
        assert_eq!(manager.get_refresh_token().unwrap(), Some("refresh".to_string()));
        assert_eq!(manager.get_session_meta().unwrap().unwrap().user_id, "user-1");

        manager.clear_provider_session().unwrap();
        assert!(!manager.has_provider_session().unwrap());
        assert_eq!(manager.get_refresh_token().unwrap(), None);
    }

    #[test]
    fn test_expiry_uses_skew() {
        assert!(meta(Duration::seconds(30)).is_expired());
        assert!(meta(Duration::hours(-1)).is_expired());
        assert!(!meta(Duration::minutes(10)).is_expired());
    }

    #[test]
    fn test_clear_provider_session_keeps_snapshot() {
        let manager = manager();
        let user = User {
            user_id: "user-1".to_string(),
            email: "a@b.com".to_string(),
        };
        manager.save_snapshot(Some(&user)).unwrap();
        manager
            .set_provider_session("access", "refresh", &meta(Duration::hours(1)))
            .unwrap();

        manager.clear_provider_session().unwrap();
        assert_eq!(manager.load_snapshot::<User>().unwrap(), Some(user));
    }
}
