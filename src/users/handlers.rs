use axum::{
    extract::{Multipart, State},
    routing::{get, patch},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::auth::extractors::{CurrentAdmin, CurrentUser};
use crate::auth::repo_types::User;
use crate::auth::{MessageResponse, PublicUser};
use crate::error::ApiError;
use crate::state::AppState;

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users/me", get(me))
        .route("/users/avatar", patch(update_avatar))
        .route("/users/admin", get(admin))
}

#[instrument(skip(user))]
pub async fn me(CurrentUser(user): CurrentUser) -> Json<PublicUser> {
    Json(user.into())
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

/// Avatar upload, admin only. The image lands in the object store under a
/// per-user key and the resulting public URL is persisted on the user row.
#[instrument(skip(state, user, mp))]
pub async fn update_avatar(
    State(state): State<AppState>,
    CurrentAdmin(user): CurrentAdmin,
    mut mp: Multipart,
) -> Result<Json<PublicUser>, ApiError> {
    let mut file: Option<(bytes::Bytes, String)> = None;
    while let Ok(Some(field)) = mp.next_field().await {
        if field.name() == Some("file") {
            let content_type = field
                .content_type()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "application/octet-stream".into());
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(e.to_string()))?;
            file = Some((data, content_type));
        }
    }
    let Some((body, content_type)) = file else {
        return Err(ApiError::BadRequest("file field is required".into()));
    };

    let ext = ext_from_mime(&content_type)
        .ok_or_else(|| ApiError::BadRequest("Unsupported image type".into()))?;
    let key = format!("avatars/{}.{}", user.username, ext);
    state
        .storage
        .put_object(&key, body, &content_type)
        .await
        .map_err(ApiError::Internal)?;
    let url = state.storage.public_url(&key);

    let updated = User::update_avatar(&state.db, &user.email, &url).await?;
    if let Err(e) = state.cache.invalidate(&updated.username).await {
        warn!(error = %e, username = %updated.username, "session cache invalidation failed");
    }
    info!(user_id = %updated.id, url = %url, "avatar updated");
    Ok(Json(updated.into()))
}

#[instrument(skip(user))]
pub async fn admin(CurrentAdmin(user): CurrentAdmin) -> Json<MessageResponse> {
    Json(MessageResponse::new(format!(
        "Welcome, {}! This is the admin route",
        user.username
    )))
}
