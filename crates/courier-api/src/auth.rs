use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};

use courier_auth::{AuthError, TokenCodec};
use courier_db::Database;
use courier_gateway::dispatcher::MessageDispatcher;
use courier_gateway::registry::ConnectionRegistry;
use courier_types::api::{LoginRequest, RefreshRequest, RegisterRequest, Role};

use crate::profile::user_view;
use crate::{valid_email, valid_phone};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub codec: TokenCodec,
    pub registry: ConnectionRegistry,
    pub dispatcher: MessageDispatcher,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    // Validate input
    if req.username.len() < 3 || req.username.len() > 20 {
        return Err(StatusCode::BAD_REQUEST);
    }
    if req.password.len() < 8 {
        return Err(StatusCode::BAD_REQUEST);
    }
    if !valid_phone(&req.phone) || !valid_email(&req.email) {
        return Err(StatusCode::BAD_REQUEST);
    }

    // Check if username is taken
    if state
        .db
        .get_user_by_username(&req.username)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .is_some()
    {
        return Err(StatusCode::CONFLICT);
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .to_string();

    let user_id = state
        .db
        .create_user(&req.username, &password_hash, req.role.as_str(), false)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    state
        .db
        .create_personal(user_id, &req.phone, &req.email)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let user = state
        .db
        .get_user_by_id(user_id)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;
    let personal = state
        .db
        .get_personal(user_id)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok((StatusCode::CREATED, Json(user_view(user, personal, true))))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let user = state
        .db
        .get_user_by_username(&req.username)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::UNAUTHORIZED)?;

    // Verify password
    let parsed_hash =
        PasswordHash::new(&user.password).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    let email = state
        .db
        .get_personal(user.id)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .map(|p| p.email);

    let role = user.role.parse::<Role>().unwrap_or_default();
    let pair = state
        .codec
        .issue_pair(&user.id.to_string(), role, user.is_superuser, email.as_deref())
        .map_err(|e| e.status())?;

    Ok((StatusCode::CREATED, Json(pair)))
}

/// Refresh protocol: the submitted refresh token must decode and carry
/// `id`, `role` and `is_superuser`, otherwise no tokens are issued.
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let pair = state.codec.refresh(&req.token)?;
    Ok((StatusCode::CREATED, Json(pair)))
}
