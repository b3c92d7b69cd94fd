use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Authentication and authorization failures, resolved at the request
/// boundary before any session state is created.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("invalid or expired token")]
    InvalidToken,

    #[error("token must have key {0}")]
    MissingClaim(&'static str),

    #[error("permission denied")]
    Forbidden,

    #[error("request must have an Authorization header")]
    MissingAuthorization,

    #[error("provided token is not a Bearer token")]
    NotBearer,

    #[error("invalid authorization header, credentials string should not contain spaces")]
    MalformedHeader,

    #[error("unexpected decryption result")]
    IncompleteRefreshClaims,

    #[error("failed to sign token")]
    Signing,
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::InvalidToken
            | AuthError::MissingAuthorization
            | AuthError::NotBearer
            | AuthError::MalformedHeader => StatusCode::UNAUTHORIZED,
            AuthError::MissingClaim(_) | AuthError::IncompleteRefreshClaims => {
                StatusCode::BAD_REQUEST
            }
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::Signing => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "detail": self.to_string() }))).into_response()
    }
}
