use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::error;

use courier_auth::Credential;
use courier_types::api::MessageResponse;

use crate::auth::AppState;
use crate::parse_timestamp;

/// Conversation history with `peer_id`, newest first. Live delivery is the
/// gateway's job; this is the durable record.
pub async fn get_chat(
    State(state): State<AppState>,
    Path(peer_id): Path<i64>,
    Extension(credential): Extension<Credential>,
) -> Result<Json<Vec<MessageResponse>>, StatusCode> {
    let subject_id = credential.user_id().map_err(|e| e.status())?;

    // Run the blocking DB query off the async runtime
    let db = state.db.clone();
    let rows = tokio::task::spawn_blocking(move || db.list_messages(subject_id, peer_id))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let messages = rows
        .into_iter()
        .map(|row| MessageResponse {
            id: row.id,
            text: row.text,
            photo: row.photo,
            sender_id: row.sender,
            receiver_id: row.receiver,
            created_at: parse_timestamp(&row.created_at),
        })
        .collect();

    Ok(Json(messages))
}
