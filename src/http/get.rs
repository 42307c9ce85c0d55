use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use tracing::*;

use crate::axumstate::AxumState;
use crate::reading::Reading;
use crate::session::ActiveConfig;

/// GET the latest reading taken by the poll task
pub async fn get_reading(State(state): State<AxumState>) -> Result<Json<Reading>, StatusCode> {
    let Ok(reading) = state.reading.lock() else {
        error!("unable to lock latest reading in get_reading, mutex poisoned - Returning INTERNAL_SERVER_ERROR");
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    };

    // No poll has succeeded yet
    reading.clone().map(Json).ok_or(StatusCode::NOT_FOUND)
}

/// GET the asset name and connection table currently in force
pub async fn get_connections(State(state): State<AxumState>) -> Json<ActiveConfig> {
    Json(state.session.snapshot().as_ref().clone())
}
