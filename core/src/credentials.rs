//! Credential store: the persisted bearer token and user profile.
//!
//! # Design
//! The token and profile are written as one combined record under a single
//! storage key, so a session always has both or neither. An `RwLock` lets
//! any number of requests read concurrently while login and logout take the
//! write side.
//!
//! The plain accessors treat every storage failure as "not logged in" and
//! log it. The `try_*` variants surface `StorageError` for callers that need
//! to tell a missing session from a broken store.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::StorageError;
use crate::storage::Storage;

/// Storage key holding the combined session record.
pub const SESSION_KEY: &str = "auth_session";

/// Opaque user profile returned by the backend at login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserProfile(pub Value);

impl UserProfile {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// The integer `userId` field. Numeric strings are accepted.
    pub fn user_id(&self) -> Option<i64> {
        match self.0.get("userId")? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

/// A stored session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub token: String,
    pub user: UserProfile,
}

impl Credential {
    pub fn user_id(&self) -> Option<i64> {
        self.user.user_id()
    }
}

/// Reads and writes the session through a `Storage` backend.
#[derive(Debug)]
pub struct CredentialStore<S> {
    storage: S,
    lock: RwLock<()>,
}

impl<S: Storage> CredentialStore<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            lock: RwLock::new(()),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub async fn try_credential(&self) -> Result<Option<Credential>, StorageError> {
        let _guard = self.lock.read().await;
        let Some(raw) = self.storage.get(SESSION_KEY).await? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| StorageError::Corrupt(e.to_string()))
    }

    /// The stored session, or `None` if absent or unreadable.
    pub async fn credential(&self) -> Option<Credential> {
        match self.try_credential().await {
            Ok(credential) => credential,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read stored session; treating as logged out");
                None
            }
        }
    }

    pub async fn try_get_token(&self) -> Result<Option<String>, StorageError> {
        Ok(self.try_credential().await?.map(|c| c.token))
    }

    pub async fn get_token(&self) -> Option<String> {
        self.credential().await.map(|c| c.token)
    }

    pub async fn try_get_user(&self) -> Result<Option<UserProfile>, StorageError> {
        Ok(self.try_credential().await?.map(|c| c.user))
    }

    pub async fn get_user(&self) -> Option<UserProfile> {
        self.credential().await.map(|c| c.user)
    }

    pub async fn try_store_credentials(
        &self,
        token: impl Into<String>,
        user: UserProfile,
    ) -> Result<(), StorageError> {
        let record = Credential {
            token: token.into(),
            user,
        };
        let raw = serde_json::to_string(&record).map_err(|e| StorageError::Backend(e.to_string()))?;
        let _guard = self.lock.write().await;
        self.storage.set(SESSION_KEY, raw).await
    }

    /// Persist a session. Failures are logged, not returned.
    pub async fn store_credentials(&self, token: impl Into<String>, user: UserProfile) {
        if let Err(e) = self.try_store_credentials(token, user).await {
            tracing::error!(error = %e, "failed to save the session to storage");
        }
    }

    pub async fn try_clear_credentials(&self) -> Result<(), StorageError> {
        let _guard = self.lock.write().await;
        self.storage.remove(SESSION_KEY).await
    }

    /// Erase the session. Safe to call when none exists.
    pub async fn clear_credentials(&self) {
        if let Err(e) = self.try_clear_credentials().await {
            tracing::error!(error = %e, "failed to clear the session from storage");
        }
    }
}
