//! Login, session restore and logout.
//!
//! # Design
//! Logging in is an ordinary JSON request through the dispatcher. The
//! credential store is only written once the server has returned a token for
//! an active account; an inactive account leaves any previous state untouched.

use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use crate::credentials::{CredentialStore, UserProfile};
use crate::dispatcher::{Dispatcher, RequestOptions};
use crate::endpoints::Endpoints;
use crate::error::{ApiError, StorageError};
use crate::storage::Storage;
use crate::transport::Transport;
use crate::types::{AuthenticatedUser, LoginData, LoginRequest, UserDto};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Your account is not active")]
    AccountInactive,

    #[error("failed to persist session: {0}")]
    Storage(#[from] StorageError),
}

pub struct SessionService<T, S> {
    dispatcher: Arc<Dispatcher<T, S>>,
    endpoints: Endpoints,
}

impl<T: Transport, S: Storage> SessionService<T, S> {
    pub fn new(dispatcher: Arc<Dispatcher<T, S>>, endpoints: Endpoints) -> Self {
        Self {
            dispatcher,
            endpoints,
        }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher<T, S>> {
        &self.dispatcher
    }

    fn credentials(&self) -> &CredentialStore<S> {
        self.dispatcher.credentials()
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<AuthenticatedUser, SessionError> {
        let body = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let response = self
            .dispatcher
            .request_json(&self.endpoints.login()?, RequestOptions::post_json(&body)?)
            .await?;
        let status = response.status();
        let data: LoginData = response.into_data()?;
        let dto = UserDto::deserialize(&data.user_dto).map_err(|e| ApiError::MalformedResponse {
            status,
            reason: format!("userDto: {e}"),
        })?;

        if !dto.is_active {
            tracing::warn!(user_id = dto.user_id, "login rejected: account inactive");
            return Err(SessionError::AccountInactive);
        }

        self.credentials()
            .try_store_credentials(data.token, UserProfile::new(data.user_dto))
            .await?;
        tracing::info!(user_id = dto.user_id, "logged in");
        Ok(dto.into())
    }

    /// The user of the stored session. `None` when there is no session, the
    /// stored profile is unreadable, or the account is inactive.
    pub async fn restore(&self) -> Option<AuthenticatedUser> {
        let credential = self.credentials().credential().await?;
        let dto = match UserDto::deserialize(credential.user.as_value()) {
            Ok(dto) => dto,
            Err(e) => {
                tracing::warn!(error = %e, "stored profile is unusable; treating as logged out");
                return None;
            }
        };
        if !dto.is_active {
            tracing::warn!(user_id = dto.user_id, "stored account is inactive; treating as logged out");
            return None;
        }
        Some(dto.into())
    }

    pub async fn logout(&self) {
        self.credentials().clear_credentials().await;
        tracing::info!("logged out");
    }
}
