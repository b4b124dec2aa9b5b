mod dataset;
mod views;

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;

use cgmview_core::{AccessGate, Pipeline, SegmentedDataset};
use cgmview_logging::Logger;

/// Header carrying the access key when the gate is enabled.
pub const ACCESS_KEY_HEADER: &str = "x-access-key";

const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub gate: Arc<AccessGate>,
    /// The loaded export, replaced wholesale on upload.
    pub dataset: Arc<RwLock<Option<SegmentedDataset>>>,
    pub logger: Arc<Logger>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/dataset",
            get(dataset::get_dataset).put(dataset::put_dataset),
        )
        .route("/api/sessions", get(views::list_sessions))
        .route("/api/readings", get(views::get_readings))
        .route("/api/summary", get(views::get_summary))
        .route("/api/chart", get(views::get_chart))
        .route("/api/notes", get(views::get_notes))
        .route("/api/export", get(views::export_csv))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_access_key,
        ))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn require_access_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, (StatusCode, String)> {
    let key = request
        .headers()
        .get(ACCESS_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    state
        .gate
        .check(key)
        .map_err(|e| (StatusCode::UNAUTHORIZED, e.to_string()))?;

    Ok(next.run(request).await)
}

fn no_dataset() -> (StatusCode, String) {
    (
        StatusCode::NOT_FOUND,
        "No dataset loaded. PUT a CSV export to /api/dataset first.".to_string(),
    )
}
