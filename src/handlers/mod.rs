//! HTTP request handlers for the seisplot API.
//!
//! This module contains all the endpoint handlers for the web server.

pub mod heartbeat;
pub mod index;
pub mod plot;

use axum::{routing::get, Router};
use std::sync::Arc;

use crate::state::AppState;

pub use heartbeat::heartbeat_handler;
pub use index::index_handler;
pub use plot::plot_handler;

/// Routes served by seisplot, without middleware layers
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/plot", get(plot_handler))
        .route("/heartbeat", get(heartbeat_handler))
        .with_state(state)
}
