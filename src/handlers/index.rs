//! Query form served at the root path.

use axum::response::Html;

const INDEX_HTML: &str = include_str!("../../templates/index.html");

/// Handle GET / requests
pub async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}
