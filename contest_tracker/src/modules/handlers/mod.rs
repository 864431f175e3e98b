pub mod admin;
pub mod bookmark;
pub mod contest;
pub mod user;

use axum::{extract::Extension, http::StatusCode, Json};
use contest_tracker_libs::{
    api::HealthResponse,
    storage::{ContestStore, Storage},
};
use std::sync::Arc;

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: String::from("ok"),
    })
}

pub async fn readiness(Extension(store): Extension<Arc<dyn Storage>>) -> StatusCode {
    match store.count_contests().await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::error!("storage is not available: {:?}", e);
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
