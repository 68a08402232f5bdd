use axum::{extract::State, Json};
use serde_json::{json, Value};
use survey::DatasetInfo;

use crate::state::SharedState;

pub const ENDPOINTS: &[&str] = &[
    "/api/dataset/info",
    "/api/samples/:index",
    "/api/ratings",
    "/api/ratings/bulk",
    "/api/ratings/progress",
    "/api/ratings/download",
];

/// Health probe.
pub async fn get_root(State(st): State<SharedState>) -> Json<Value> {
    Json(json!({
        "message": "Survey API is running",
        "endpoints": ENDPOINTS,
        "formatSupport": st.dataset.info().format_support,
    }))
}

pub async fn get_dataset_info(State(st): State<SharedState>) -> Json<DatasetInfo> {
    Json(st.dataset.info())
}
