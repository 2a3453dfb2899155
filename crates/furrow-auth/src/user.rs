//! Session user value.

use crate::ProviderUser;
use serde::{Deserialize, Serialize};

/// The signed-in user as the rest of the application sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub user_id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl SessionUser {
    /// Map a provider user. Never fails: missing email becomes `""` and the
    /// display name comes from `full_name`, then `name`.
    pub fn from_provider(user: &ProviderUser) -> Self {
        let display_name = ["full_name", "name"]
            .iter()
            .filter_map(|key| user.user_metadata.get(*key))
            .filter_map(|value| value.as_str())
            .map(str::trim)
            .find(|name| !name.is_empty())
            .map(String::from);

        Self {
            user_id: user.id.clone(),
            email: user.email.clone().unwrap_or_default(),
            display_name,
        }
    }
}

impl From<&ProviderUser> for SessionUser {
    fn from(user: &ProviderUser) -> Self {
        Self::from_provider(user)
    }
}
