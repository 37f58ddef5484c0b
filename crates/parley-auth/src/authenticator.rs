//! Verification seam between transports and the credential backend.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use parley_core::config::AuthConfig;
use parley_core::error::AppError;
use parley_core::result::AppResult;
use parley_entity::Identity;
use parley_store::Store;

use crate::jwt::JwtDecoder;

/// Turns a bearer credential into an [`Identity`].
#[async_trait]
pub trait Authenticator: Send + Sync + std::fmt::Debug + 'static {
    /// Verify the credential. Any failure is an authentication error.
    async fn verify(&self, token: &str) -> AppResult<Identity>;
}

/// JWT verification backed by the user store.
///
/// A valid signature is not enough: the subject must still exist.
#[derive(Debug, Clone)]
pub struct JwtAuthenticator {
    decoder: JwtDecoder,
    store: Arc<dyn Store>,
}

impl JwtAuthenticator {
    /// Creates a new authenticator.
    pub fn new(config: &AuthConfig, store: Arc<dyn Store>) -> Self {
        Self {
            decoder: JwtDecoder::new(config),
            store,
        }
    }
}

#[async_trait]
impl Authenticator for JwtAuthenticator {
    async fn verify(&self, token: &str) -> AppResult<Identity> {
        let claims = self.decoder.decode(token)?;

        let user = self
            .store
            .get_user(claims.user_id())
            .await
            .map_err(|e| AppError::authentication(format!("User lookup failed: {}", e.message)))?
            .ok_or_else(|| AppError::authentication("Unknown user"))?;

        debug!(user_id = %user.id, "Credential verified");
        Ok(user.identity())
    }
}
