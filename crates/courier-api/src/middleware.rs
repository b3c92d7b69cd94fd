use axum::{extract::Request, extract::State, middleware::Next, response::Response};

use courier_auth::{AuthError, bearer_token, permission};
use courier_types::api::Role;

use crate::auth::AppState;

/// Extract and validate the bearer credential on every protected route.
/// Failures resolve here, before any handler state is touched; the decoded
/// credential rides along as a request extension.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = bearer_token(req.headers())?;
    let credential = state.codec.decode(token)?;
    permission::check(&credential, &[Role::User, Role::Administrator], false)?;

    req.extensions_mut().insert(credential);
    Ok(next.run(req).await)
}
