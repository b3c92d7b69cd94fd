use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use tracing::info;

use courier_auth::Credential;
use courier_db::models::{PersonalRow, UserRow};
use courier_types::api::{ChangePasswordRequest, UpdateProfileRequest, UserView};

use crate::auth::AppState;
use crate::{parse_timestamp, valid_email, valid_phone};

/// Assemble the API view of a user. Private contact data is stripped
/// unless the profile belongs to the requester.
pub(crate) fn user_view(
    user: UserRow,
    personal: Option<PersonalRow>,
    include_private: bool,
) -> UserView {
    let modified_at = personal
        .as_ref()
        .and_then(|p| p.modified_at.as_deref())
        .map(parse_timestamp);
    let (phone, email) = match (&personal, include_private) {
        (Some(p), true) => (Some(p.phone.clone()), Some(p.email.clone())),
        _ => (None, None),
    };
    UserView {
        id: user.id,
        username: user.username,
        created_at: parse_timestamp(&user.created_at),
        modified_at,
        is_active: user.is_active,
        is_superuser: user.is_superuser,
        phone,
        email,
    }
}

pub async fn me(
    State(state): State<AppState>,
    Extension(credential): Extension<Credential>,
) -> Result<Json<UserView>, StatusCode> {
    let subject_id = credential.user_id().map_err(|e| e.status())?;
    load_view(&state, subject_id, true).await
}

pub async fn profile(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Extension(credential): Extension<Credential>,
) -> Result<Json<UserView>, StatusCode> {
    let requester = credential.user_id().map_err(|e| e.status())?;
    load_view(&state, user_id, requester == user_id).await
}

async fn load_view(
    state: &AppState,
    user_id: i64,
    include_private: bool,
) -> Result<Json<UserView>, StatusCode> {
    let user = state
        .db
        .get_user_by_id(user_id)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;
    let personal = state
        .db
        .get_personal(user_id)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(user_view(user, personal, include_private)))
}

pub async fn change_profile(
    State(state): State<AppState>,
    Extension(credential): Extension<Credential>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<UserView>, StatusCode> {
    if req.phone.as_deref().is_some_and(|p| !valid_phone(p)) {
        return Err(StatusCode::BAD_REQUEST);
    }
    if req.email.as_deref().is_some_and(|e| !valid_email(e)) {
        return Err(StatusCode::BAD_REQUEST);
    }

    let subject_id = credential.user_id().map_err(|e| e.status())?;
    let personal = state
        .db
        .update_personal(subject_id, req.phone.as_deref(), req.email.as_deref())
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;
    let user = state
        .db
        .get_user_by_id(subject_id)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(user_view(user, Some(personal), true)))
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(credential): Extension<Credential>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let subject_id = credential.user_id().map_err(|e| e.status())?;

    let user = state
        .db
        .get_user_by_username(&req.username)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let parsed_hash =
        PasswordHash::new(&user.password).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    // The token must belong to the account being changed.
    if subject_id != user.id {
        return Err(StatusCode::BAD_REQUEST);
    }
    if req.new_password.len() < 8 {
        return Err(StatusCode::BAD_REQUEST);
    }

    let salt = SaltString::generate(&mut OsRng);
    let new_hash = Argon2::default()
        .hash_password(req.new_password.as_bytes(), &salt)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .to_string();
    state
        .db
        .update_password(user.id, &new_hash)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    info!("user {} changed their password", user.id);
    Ok(Json(json!({ "detail": "password updated" })))
}
