use axum::{
    extract::{FromRef, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Form, Json, Router,
};
use tracing::{info, instrument, warn};

use crate::auth::dto::{
    LoginRequest, MessageResponse, PublicUser, RegisterRequest, RequestEmail, ResetPasswordQuery,
    TokenResponse,
};
use crate::auth::repo_types::{User, UserRole};
use crate::auth::services::{
    hash_password, is_valid_email, normalize_email, verify_password, JwtKeys, TokenKind,
};
use crate::cache::SESSION_TTL_SECONDS;
use crate::error::ApiError;
use crate::mailer::EmailKind;
use crate::state::AppState;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/confirmed_email/:token", get(confirmed_email))
        .route("/auth/request_email", post(request_email))
        .route("/auth/request_password_reset", post(request_password_reset))
        .route(
            "/auth/reset-password-confirm/:token",
            post(reset_password_confirm),
        )
}

/// Mint an email-action token and hand the message off to the mail
/// transport on a detached task. Delivery failure is logged and never
/// fails the operation that triggered it.
fn send_email_in_background(state: &AppState, kind: EmailKind, user: &User) {
    let token_kind = match kind {
        EmailKind::VerifyEmail => TokenKind::Verify,
        EmailKind::ResetPassword => TokenKind::Reset,
    };
    let keys = JwtKeys::from_ref(state);
    let token = match keys.sign_email(&user.email, token_kind) {
        Ok(t) => t,
        Err(e) => {
            warn!(error = %e, email = %user.email, "failed to sign email token");
            return;
        }
    };
    let mailer = state.mailer.clone();
    let base_url = state.config.base_url.clone();
    let email = user.email.clone();
    let username = user.username.clone();
    tokio::spawn(async move {
        if let Err(e) = mailer
            .send(kind, &email, &username, &base_url, &token)
            .await
        {
            warn!(error = %e, email = %email, kind = ?kind, "email delivery failed");
        }
    });
}

/// Conflict precedence at registration: an email collision is reported
/// before a username collision, and either collision stops the request
/// before any password hashing happens.
fn registration_conflict(email_taken: bool, username_taken: bool) -> Option<&'static str> {
    if email_taken {
        Some("A user with this email already exists")
    } else if username_taken {
        Some("A user with this username already exists")
    } else {
        None
    }
}

/// Confirmation is idempotent: a second valid token for the same address
/// gets the already-confirmed message and causes no further write.
fn already_confirmed_message(user: &User) -> Option<&'static str> {
    user.confirmed.then_some("Your email is already confirmed")
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<PublicUser>), ApiError> {
    payload.email = normalize_email(&payload.email);

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::BadRequest("Invalid email".into()));
    }
    if payload.password.len() < 8 {
        warn!("password too short");
        return Err(ApiError::BadRequest("Password too short".into()));
    }

    let email_taken = User::find_by_email(&state.db, &payload.email).await?.is_some();
    let username_taken = User::find_by_username(&state.db, &payload.username)
        .await?
        .is_some();
    if let Some(detail) = registration_conflict(email_taken, username_taken) {
        warn!(email = %payload.email, username = %payload.username, "registration conflict");
        return Err(ApiError::Conflict(detail.into()));
    }

    let hash = hash_password(&payload.password)?;
    let role = payload.role.unwrap_or(UserRole::User);
    let user = User::create(&state.db, &payload.username, &payload.email, &hash, role).await?;

    send_email_in_background(&state, EmailKind::VerifyEmail, &user);

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[instrument(skip(state, form))]
pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let user = User::find_by_username(&state.db, &form.username).await?;

    // Identical message for unknown user and bad password so usernames
    // cannot be enumerated through the login endpoint.
    let user = match user {
        Some(u) if verify_password(&form.password, &u.hashed_password) => u,
        _ => {
            warn!(username = %form.username, "login with invalid credentials");
            return Err(ApiError::Unauthorized("Invalid username or password".into()));
        }
    };

    if !user.confirmed {
        warn!(username = %user.username, "login before email confirmation");
        return Err(ApiError::Unauthorized("Email address not confirmed".into()));
    }

    if let Err(e) = state
        .cache
        .put(&user.username, &user, SESSION_TTL_SECONDS)
        .await
    {
        warn!(error = %e, username = %user.username, "session cache write failed");
    }

    let access_token = JwtKeys::from_ref(&state).sign_access(&user.username)?;
    info!(user_id = %user.id, username = %user.username, "user logged in");
    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".into(),
    }))
}

#[instrument(skip(state, token))]
pub async fn confirmed_email(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let keys = JwtKeys::from_ref(&state);
    let email = keys
        .email_from_token(&token, TokenKind::Verify)
        .map_err(|_| ApiError::InvalidToken("Invalid email verification token".into()))?;

    let user = User::find_by_email(&state.db, &email)
        .await?
        .ok_or_else(|| ApiError::BadRequest("Verification error".into()))?;

    if let Some(msg) = already_confirmed_message(&user) {
        return Ok(Json(MessageResponse::new(msg)));
    }

    User::confirm_email(&state.db, &email).await?;
    if let Err(e) = state.cache.invalidate(&user.username).await {
        warn!(error = %e, username = %user.username, "session cache invalidation failed");
    }
    info!(email = %email, "email confirmed");
    Ok(Json(MessageResponse::new("Email confirmed")))
}

#[instrument(skip(state, body))]
pub async fn request_email(
    State(state): State<AppState>,
    Json(body): Json<RequestEmail>,
) -> Result<Json<MessageResponse>, ApiError> {
    let email = normalize_email(&body.email);
    let user = User::find_by_email(&state.db, &email)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    if let Some(msg) = already_confirmed_message(&user) {
        return Ok(Json(MessageResponse::new(msg)));
    }

    send_email_in_background(&state, EmailKind::VerifyEmail, &user);
    Ok(Json(MessageResponse::new(
        "Check your email for confirmation",
    )))
}

#[instrument(skip(state, body))]
pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(body): Json<RequestEmail>,
) -> Result<Json<MessageResponse>, ApiError> {
    let email = normalize_email(&body.email);
    let user = User::find_by_email(&state.db, &email)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    send_email_in_background(&state, EmailKind::ResetPassword, &user);
    Ok(Json(MessageResponse::new(
        "A password reset email has been sent to your address",
    )))
}

#[instrument(skip(state, token, query))]
pub async fn reset_password_confirm(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Query(query): Query<ResetPasswordQuery>,
) -> Result<Json<MessageResponse>, ApiError> {
    // Same minimum as registration, checked before any token work.
    if query.new_password.len() < 8 {
        warn!("password too short");
        return Err(ApiError::BadRequest("Password too short".into()));
    }

    let keys = JwtKeys::from_ref(&state);
    let email = keys
        .email_from_token(&token, TokenKind::Reset)
        .map_err(|_| ApiError::BadRequest("Token invalid or expired".into()))?;

    let user = User::find_by_email(&state.db, &email)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    let hash = hash_password(&query.new_password)?;
    User::update_password(&state.db, &email, &hash).await?;
    if let Err(e) = state.cache.invalidate(&user.username).await {
        warn!(error = %e, username = %user.username, "session cache invalidation failed");
    }
    info!(email = %email, "password reset completed");
    Ok(Json(MessageResponse::new("Password updated successfully")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::sample_user;

    #[test]
    fn email_conflict_wins_over_username_conflict() {
        let detail = registration_conflict(true, true).expect("conflict");
        assert!(detail.contains("email"));
    }

    #[test]
    fn username_conflict_fires_when_email_is_free() {
        let detail = registration_conflict(false, true).expect("conflict");
        assert!(detail.contains("username"));
    }

    #[test]
    fn no_conflict_lets_registration_proceed_to_hashing() {
        assert_eq!(registration_conflict(false, false), None);
        assert!(registration_conflict(true, false)
            .expect("conflict")
            .contains("email"));
    }

    #[test]
    fn repeat_confirmation_is_idempotent() {
        let mut user = sample_user("alice", "alice@x.com");
        user.confirmed = false;
        // First confirmation proceeds to the write.
        assert_eq!(already_confirmed_message(&user), None);
        user.confirmed = true;
        // Second one short-circuits with the already-confirmed message.
        assert_eq!(
            already_confirmed_message(&user),
            Some("Your email is already confirmed")
        );
    }

    #[tokio::test]
    async fn reset_confirm_rejects_short_password_before_any_lookup() {
        // The fake state's pool never connects, so getting BadRequest
        // back proves the check runs before token or directory work.
        let state = AppState::fake();
        let err = reset_password_confirm(
            State(state),
            Path("irrelevant-token".into()),
            Query(ResetPasswordQuery {
                new_password: "short".into(),
            }),
        )
        .await
        .unwrap_err();
        match err {
            ApiError::BadRequest(m) => assert!(m.contains("Password")),
            other => panic!("expected BadRequest, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn reset_confirm_rejects_a_confirmation_token() {
        let state = AppState::fake();
        let token = JwtKeys::from_ref(&state)
            .sign_email("alice@x.com", TokenKind::Verify)
            .unwrap();
        let err = reset_password_confirm(
            State(state),
            Path(token),
            Query(ResetPasswordQuery {
                new_password: "long-enough-password".into(),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[tokio::test]
    async fn confirm_email_rejects_garbage_token() {
        let state = AppState::fake();
        let err = confirmed_email(State(state), Path("not-a-jwt".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidToken(_)));
    }
}
