use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;

use crate::auth::repo_types::{User, UserRole};
use crate::auth::services::{JwtKeys, TokenKind};
use crate::cache::SESSION_TTL_SECONDS;
use crate::error::ApiError;
use crate::state::AppState;

/// Authenticated principal resolved from the bearer token. The session
/// cache is consulted first; on a miss the user table is canonical and
/// the result is written back with the default TTL.
#[derive(Debug)]
pub struct CurrentUser(pub User);

/// Authenticated principal that must hold the admin role.
#[derive(Debug)]
pub struct CurrentAdmin(pub User);

fn credentials_error() -> ApiError {
    ApiError::Unauthorized("Could not validate credentials".to_string())
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(credentials_error)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .or_else(|| auth_header.strip_prefix("bearer "))
            .ok_or_else(credentials_error)?;

        let keys = JwtKeys::from_ref(state);
        let claims = match keys.verify(token) {
            Ok(c) => c,
            Err(_) => {
                warn!("invalid or expired token");
                return Err(credentials_error());
            }
        };
        if claims.kind != TokenKind::Access {
            return Err(credentials_error());
        }
        let username = claims.sub;

        if let Ok(Some(user)) = state.cache.get(&username).await {
            return Ok(CurrentUser(user));
        }

        let user = User::find_by_username(&state.db, &username)
            .await
            .map_err(ApiError::Internal)?
            .ok_or_else(credentials_error)?;

        if let Err(e) = state.cache.put(&username, &user, SESSION_TTL_SECONDS).await {
            warn!(error = %e, username = %username, "session cache write failed");
        }
        Ok(CurrentUser(user))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if user.role != UserRole::Admin {
            return Err(ApiError::Forbidden("Insufficient access rights".to_string()));
        }
        Ok(CurrentAdmin(user))
    }
}
