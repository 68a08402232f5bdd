use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Value};
use survey::{Progress, Rating, RatingSubmission};
use tracing::{info, warn};

use crate::error::ApiError;
use crate::identity::ClientIdentity;
use crate::state::SharedState;
use crate::store_exec::with_store_blocking;

pub async fn get_ratings(
    State(st): State<SharedState>,
    client: ClientIdentity,
) -> Result<Json<Vec<Rating>>, ApiError> {
    let ratings = with_store_blocking(st.store.clone(), move |store| {
        survey::list_ratings(store, &client.user)
    })
    .await?;
    Ok(Json(ratings))
}

pub async fn post_rating(
    State(st): State<SharedState>,
    client: ClientIdentity,
    body: Result<Json<RatingSubmission>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(submission) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    // Reject before touching storage
    submission
        .validate()
        .map_err(|e| ApiError::from_survey(e, "Failed to save rating"))?;

    let scope = with_store_blocking(st.store.clone(), move |store| {
        survey::upsert_rating(store, &client.user, &submission)
    })
    .await?
    .map_err(|e| ApiError::from_survey(e, "Failed to save rating"))?;

    if scope.is_fallback() && !st.store.scope().is_fallback() {
        warn!(scope = %scope, "rating stored in fallback scope");
    }
    Ok((StatusCode::CREATED, Json(json!({ "success": true }))))
}

pub async fn post_ratings_bulk(
    State(st): State<SharedState>,
    client: ClientIdentity,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(body) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let Value::Array(items) = body else {
        return Err(ApiError::BadRequest("Expected an array of ratings".to_string()));
    };

    // Elements that do not even have the right shape go through as empty
    // submissions so they are counted as skipped.
    let submissions: Vec<RatingSubmission> = items
        .into_iter()
        .map(|v| serde_json::from_value(v).unwrap_or_default())
        .collect();

    let user = client.user.clone();
    let outcome = with_store_blocking(st.store.clone(), move |store| {
        survey::bulk_upsert(store, &user, &submissions)
    })
    .await?
    .map_err(|e| ApiError::from_survey(e, "Failed to save ratings"))?;

    info!(
        user = %client.user,
        applied = outcome.applied,
        skipped = outcome.skipped,
        scope = %outcome.scope,
        "bulk ratings imported"
    );
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "count": outcome.applied })),
    ))
}

pub async fn get_progress(
    State(st): State<SharedState>,
    client: ClientIdentity,
) -> Result<Json<Progress>, ApiError> {
    let progress = with_store_blocking(st.store.clone(), move |store| {
        survey::progress(store, &client.user)
    })
    .await?;
    Ok(Json(progress))
}

pub async fn get_download(
    State(st): State<SharedState>,
    client: ClientIdentity,
) -> Result<impl IntoResponse, ApiError> {
    let scope = st.store.scope();
    let body = with_store_blocking(st.store.clone(), move |store| {
        survey::export_ratings(store, &client.user)
    })
    .await?
    .map_err(|e| ApiError::from_survey(e, "Failed to download ratings"))?;

    let disposition = format!("attachment; filename=\"ratings-{scope}.json\"");
    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}
