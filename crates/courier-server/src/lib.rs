use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State, WebSocketUpgrade},
    http::HeaderMap,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use jsonwebtoken::Algorithm;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use courier_api::auth::{self, AppState, AppStateInner};
use courier_api::messages;
use courier_api::middleware::require_auth;
use courier_api::profile;
use courier_auth::{AuthError, TokenCodec, bearer_token, permission};
use courier_gateway::connection;
use courier_gateway::dispatcher::MessageDispatcher;
use courier_gateway::registry::ConnectionRegistry;
use courier_types::api::Role;

pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: String,
    pub jwt_secret: String,
    pub jwt_algorithm: Algorithm,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            host: std::env::var("COURIER_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: std::env::var("COURIER_PORT")
                .unwrap_or_else(|_| "8000".into())
                .parse()?,
            db_path: std::env::var("COURIER_DB_PATH").unwrap_or_else(|_| "courier.db".into()),
            jwt_secret: std::env::var("COURIER_JWT_SECRET")
                .unwrap_or_else(|_| "dev-secret-change-me".into()),
            jwt_algorithm: std::env::var("COURIER_JWT_ALGORITHM")
                .unwrap_or_else(|_| "HS256".into())
                .parse::<Algorithm>()?,
        })
    }
}

/// Construct the shared state: one database handle, one registry, one
/// dispatcher, one codec — owned by the process root and injected
/// everywhere else.
pub fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let db = Arc::new(courier_db::Database::open(std::path::Path::new(
        &config.db_path,
    ))?);
    let registry = ConnectionRegistry::new();
    let dispatcher = MessageDispatcher::new(db.clone(), registry.clone());
    let codec = TokenCodec::new(&config.jwt_secret, config.jwt_algorithm);

    Ok(Arc::new(AppStateInner {
        db,
        codec,
        registry,
        dispatcher,
    }))
}

pub fn app(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/user/registration", post(auth::register))
        .route("/user/login", post(auth::login))
        .route("/user/refresh-token", post(auth::refresh))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/user/me", get(profile::me))
        .route("/user/profile/{user_id}", get(profile::profile))
        .route("/user/change/profile", put(profile::change_profile))
        .route("/user/change/password", put(profile::change_password))
        .route("/user/chat/{peer_id}", get(messages::get_chat))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state.clone());

    let ws_route = Router::new()
        .route("/ws/{receiver}", get(ws_upgrade))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Authenticate the upgrade request, then hand the socket to the gateway.
/// Rejection happens before the handshake completes, so a failed
/// credential never creates any session state.
async fn ws_upgrade(
    State(state): State<AppState>,
    Path(receiver): Path<i64>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Result<Response, AuthError> {
    let token = bearer_token(&headers)?;
    let credential = state.codec.decode(token)?;
    permission::check(&credential, &[Role::User, Role::Administrator], false)?;
    let subject_id = credential.user_id()?;

    let registry = state.registry.clone();
    let dispatcher = state.dispatcher.clone();
    Ok(ws
        .on_upgrade(move |socket| {
            connection::handle_connection(socket, registry, dispatcher, subject_id, receiver)
        })
        .into_response())
}
