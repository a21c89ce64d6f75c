//! Plot endpoint handler.
//!
//! Returns a PNG rendering of one channel over a time window.

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::error::SeisplotError;
use crate::logging::{generate_request_id, log_request_error};
use crate::state::AppState;

/// HTTP status for a failed plot request
pub fn status_for(error: &SeisplotError) -> StatusCode {
    match error {
        SeisplotError::MissingParameter { .. } | SeisplotError::InvalidParameter { .. } => {
            StatusCode::BAD_REQUEST
        }
        SeisplotError::NoDataFound => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Handle GET /plot requests
pub async fn plot_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let request_id = generate_request_id();
    let start_time = Instant::now();

    debug!(
        endpoint = "/plot",
        request_id = %request_id,
        params = ?params,
        "Processing plot request"
    );

    match state.plotter.plot_from_query(&params).await {
        Ok(png) => {
            info!(
                endpoint = "/plot",
                request_id = %request_id,
                bytes = png.len(),
                duration_ms = start_time.elapsed().as_millis() as u64,
                "Plot generation successful"
            );
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "image/png")],
                Bytes::from(png),
            )
                .into_response()
        }
        Err(error) => {
            let summary = format!(
                "{}.{}.{}.{}",
                params.get("net").map(String::as_str).unwrap_or("?"),
                params.get("sta").map(String::as_str).unwrap_or("?"),
                params.get("loc").map(String::as_str).unwrap_or("?"),
                params.get("cha").map(String::as_str).unwrap_or("?"),
            );
            log_request_error(&error, "/plot", &request_id, Some(&summary));

            (
                status_for(&error),
                Json(serde_json::json!({
                    "error": error.to_string(),
                    "request_id": request_id
                })),
            )
                .into_response()
        }
    }
}
