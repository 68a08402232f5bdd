use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use filestore::{FileStorage, Storage};
use survey::{COLLECTION_RATINGS, COLLECTION_USER_INDICES};
use survey_server::{build_router, loader, AppConfig, AppState};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::from_env()?;

    // --- Dataset ---
    let loaded = loader::load_dataset(&cfg).await;
    let dataset = loaded.dataset;

    // --- Storage ---
    let store = FileStorage::new(&cfg.data_dir, &dataset.name);
    for collection in [COLLECTION_RATINGS, COLLECTION_USER_INDICES] {
        match store.ensure_collection(collection) {
            Ok(scope) => info!(collection, scope = %scope, "storage ready"),
            Err(e) => warn!(collection, error = %e, "storage directory unavailable, writes will fail"),
        }
    }
    let store: Arc<dyn Storage> = Arc::new(store);

    let addr = cfg.bind_addr.clone();
    let state = Arc::new(AppState::new(dataset, store, cfg));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("survey server listening on http://{addr}");
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .context("server error")?;

    Ok(())
}
