use axum::extract::State;
use axum::http::StatusCode;
use tokio::task;
use tracing::*;

use crate::axumstate::AxumState;
use crate::config::ConfigCategory;
use crate::session::ReconfigurationRejected;

/// POST a configuration category update to the device session.
/// The body is decoded here rather than by a `Json` extractor so channel names
/// given twice are still visible and get rejected.
#[axum::debug_handler]
pub async fn post_reconfigure(
    State(state): State<AxumState>,
    body: String,
) -> Result<StatusCode, (StatusCode, String)> {
    info!("POST reconfigure: {body}");

    let update = ConfigCategory::from_json(&body).map_err(|err| {
        warn!("reconfiguration rejected: {err}");
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            ReconfigurationRejected(err).to_string(),
        )
    })?;

    // Reconfiguring waits on the hardware port when a poll is in flight
    let session = state.session.clone();
    let result = task::spawn_blocking(move || session.reconfigure_category(update))
        .await
        .map_err(|err| {
            error!("reconfigure task failed: {err}");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        })?;

    match result {
        Ok(()) => Ok(StatusCode::OK),
        Err(rejected) => Err((StatusCode::UNPROCESSABLE_ENTITY, rejected.to_string())),
    }
}
