use std::sync::Arc;

use filestore::Storage;

/// Run `f` against the store on the blocking pool. File-backed storage does
/// plain `std::fs` I/O.
pub async fn with_store_blocking<R, F>(
    store: Arc<dyn Storage>,
    f: F,
) -> Result<R, tokio::task::JoinError>
where
    R: Send + 'static,
    F: FnOnce(&dyn Storage) -> R + Send + 'static,
{
    tokio::task::spawn_blocking(move || f(store.as_ref())).await
}
