use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::instrument;

use crate::auth::extractors::CurrentUser;
use crate::contacts::dto::{ContactPayload, ContactUpdate, Pagination};
use crate::contacts::repo_types::Contact;
use crate::error::ApiError;
use crate::state::AppState;

pub fn contact_routes() -> Router<AppState> {
    Router::new()
        .route("/contacts", get(list_contacts).post(create_contact))
        .route("/contacts/birthdays", get(upcoming_birthdays))
        .route(
            "/contacts/:id",
            get(get_contact).put(update_contact).delete(delete_contact),
        )
}

#[instrument(skip(state, user))]
pub async fn list_contacts(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(p): Query<Pagination>,
) -> Result<Json<Vec<Contact>>, ApiError> {
    let (skip, limit) = p.clamped();
    let contacts = Contact::list(&state.db, user.id, skip, limit, p.query.as_deref()).await?;
    Ok(Json(contacts))
}

#[instrument(skip(state, user))]
pub async fn upcoming_birthdays(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<Contact>>, ApiError> {
    let contacts = Contact::upcoming_birthdays(&state.db, user.id).await?;
    Ok(Json(contacts))
}

#[instrument(skip(state, user))]
pub async fn get_contact(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<Contact>, ApiError> {
    let contact = Contact::find_by_id(&state.db, user.id, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Contact not found".into()))?;
    Ok(Json(contact))
}

#[instrument(skip(state, user, body))]
pub async fn create_contact(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<ContactPayload>,
) -> Result<(StatusCode, Json<Contact>), ApiError> {
    let contact = Contact::create(&state.db, user.id, &body).await?;
    Ok((StatusCode::CREATED, Json(contact)))
}

#[instrument(skip(state, user, body))]
pub async fn update_contact(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    Json(body): Json<ContactUpdate>,
) -> Result<Json<Contact>, ApiError> {
    let contact = Contact::update(&state.db, user.id, id, body)
        .await?
        .ok_or_else(|| ApiError::NotFound("Contact not found".into()))?;
    Ok(Json(contact))
}

#[instrument(skip(state, user))]
pub async fn delete_contact(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<Contact>, ApiError> {
    let contact = Contact::delete(&state.db, user.id, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Contact not found".into()))?;
    Ok(Json(contact))
}
