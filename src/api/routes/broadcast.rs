//! Broadcast Routes
//!
//! - POST /api/send - Fan a message out to every connected client

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::api::dto::{SendRequest, SendResponse};
use crate::api::error::ApiResult;
use crate::api::state::AppState;

/// POST /api/send
///
/// Broadcast `{ "message": ... }` to every live WebSocket connection.
/// `clientCount` is the size of the live set when the broadcast started.
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SendRequest>,
) -> ApiResult<Json<SendResponse>> {
    let client_count = state.hub.trigger(req.message).await?;

    tracing::info!(clients = client_count, "Broadcast triggered via API");

    Ok(Json(SendResponse {
        success: true,
        client_count,
    }))
}
