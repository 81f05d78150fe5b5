//! Status Routes
//!
//! - GET /api/status - Connection statistics

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::api::dto::StatusResponse;
use crate::api::state::AppState;

/// GET /api/status
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        clients_count: state.ws_connection_count().await,
    })
}
