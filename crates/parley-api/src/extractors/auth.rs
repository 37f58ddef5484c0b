//! Bearer credential extractors.

use axum::extract::{FromRequestParts, Query};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use serde::Deserialize;

use parley_auth::extract_token;
use parley_core::error::AppError;
use parley_entity::Identity;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// The raw bearer credential, unverified.
///
/// Read from the `Authorization` header, else the `token` query parameter.
#[derive(Debug, Clone)]
pub struct Credential(pub Option<String>);

impl<S: Send + Sync> FromRequestParts<S> for Credential {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok());

        let query = Query::<TokenQuery>::try_from_uri(&parts.uri)
            .map(|Query(q)| q)
            .unwrap_or_default();

        Ok(Credential(extract_token(header, query.token.as_deref())))
    }
}

/// A verified caller.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Identity);

impl std::ops::Deref for AuthUser {
    type Target = Identity;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Credential(token) = Credential::from_request_parts(parts, state).await?;
        let token = token.ok_or_else(|| AppError::authentication("Missing bearer credential"))?;
        let identity = state.authenticator.verify(&token).await?;
        Ok(AuthUser(identity))
    }
}
