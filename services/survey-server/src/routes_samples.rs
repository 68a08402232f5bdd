use axum::extract::{Path, State};
use axum::Json;
use survey::ServedSample;
use tracing::debug;

use crate::error::ApiError;
use crate::identity::ClientIdentity;
use crate::state::SharedState;
use crate::store_exec::with_store_blocking;

pub async fn get_sample(
    State(st): State<SharedState>,
    client: ClientIdentity,
    Path(raw): Path<String>,
) -> Result<Json<ServedSample>, ApiError> {
    let position = survey::parse_position(&raw);
    let dataset = st.dataset.clone();
    let limit = st.config.session_limit;
    let user = client.user.clone();

    let served = with_store_blocking(st.store.clone(), move |store| {
        let mut rng = rand::thread_rng();
        survey::get_sample(store, &dataset, &user, position, limit, &mut rng)
    })
    .await?
    .map_err(|e| ApiError::from_survey(e, "Failed to retrieve sample"))?;

    debug!(
        user = %client.user,
        position = raw.as_str(),
        content_hash = %served.sample.content_hash,
        last = served.is_last(),
        "sample served"
    );
    Ok(Json(served))
}
