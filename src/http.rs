use axum::Router;
use axum::routing::{get, post};

use crate::axumstate::AxumState;

mod get;
mod post;

pub use get::{get_connections, get_reading};
pub use post::post_reconfigure;

/// Routes the host exposes for a device session
pub fn router(state: AxumState) -> Router {
    Router::new()
        // GET endpoints
        .route("/reading", get(get_reading))
        .route("/connections", get(get_connections))
        // POST endpoints
        .route("/reconfigure", post(post_reconfigure))
        .with_state(state)
}
