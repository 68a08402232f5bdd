use std::any::Any;
use std::path::Path;

use axum::http::{header, Response, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use serde_json::json;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::routes_dataset::{get_dataset_info, get_root};
use crate::routes_ratings::{get_download, get_progress, get_ratings, post_rating, post_ratings_bulk};
use crate::routes_samples::get_sample;
use crate::state::SharedState;

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/", get(get_root))
        .route("/dataset/info", get(get_dataset_info))
        .route("/samples/:index", get(get_sample))
        .route("/ratings", get(get_ratings).post(post_rating))
        .route("/ratings/bulk", post(post_ratings_bulk))
        .route("/ratings/progress", get(get_progress))
        .route("/ratings/download", get(get_download))
}

/// Full application: the API under `/api`, plus the frontend when one is
/// configured.
pub fn build_router(state: SharedState) -> Router {
    let frontend = state.config.frontend_dir.clone();

    let mut app = Router::new().nest("/api", api_router());

    if let Some(dir) = frontend {
        app = app.fallback_service(frontend_service(&dir));
    }

    app.layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Static files, with `index.html` for any path that is not a file.
fn frontend_service(dir: &Path) -> ServeDir<ServeFile> {
    ServeDir::new(dir).fallback(ServeFile::new(dir.join("index.html")))
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response<String> {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = detail, "request handler panicked");

    let body = json!({ "error": "Internal server error" }).to_string();
    let mut resp = Response::new(body);
    *resp.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    resp.headers_mut()
        .insert(header::CONTENT_TYPE, header::HeaderValue::from_static("application/json"));
    resp
}
