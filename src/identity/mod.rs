//! Identity, session and profile collaborators.

pub mod http;

pub use http::HttpIdentityService;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::IdentityError;

/// A server-side session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(rename = "$id")]
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub current: bool,
    #[serde(default)]
    pub expire: Option<String>,
}

/// The authenticated account behind a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    #[serde(rename = "$id")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Display profile resolved once identity is confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(rename = "$id")]
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Network boundary to the identity, session and profile services.
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Confirm that a live session exists for this client.
    async fn get_current_session(&self) -> Result<Session, IdentityError>;

    /// Fetch the account behind the current session.
    async fn get_current_account(&self) -> Result<Account, IdentityError>;

    /// List every session visible to this client.
    async fn list_sessions(&self) -> Result<Vec<Session>, IdentityError>;

    /// Resolve a display profile. `Ok(None)` means no profile exists (yet).
    async fn get_profile_by_user_id(&self, user_id: &str) -> Result<Option<Profile>, IdentityError>;
}
