//! Startup dataset loading: remote document first, then local files, then
//! an empty dataset. Nothing here is fatal.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use serde_json::Value;
use survey::{parse_document, Dataset, LoadReport};
use tracing::{info, warn};

use crate::config::AppConfig;

#[derive(Clone, Debug, PartialEq)]
pub enum DatasetSource {
    Remote(String),
    Local(PathBuf),
    Empty,
}

pub struct LoadedDataset {
    pub dataset: Dataset,
    pub report: LoadReport,
    pub source: DatasetSource,
}

pub async fn load_dataset(cfg: &AppConfig) -> LoadedDataset {
    let (items, source) = match fetch_items(cfg).await {
        Some(found) => found,
        None => {
            warn!(repo = %cfg.hf_dataset_repo, "no dataset available, serving an empty one");
            (Vec::new(), DatasetSource::Empty)
        }
    };

    let (dataset, report) = Dataset::from_items(cfg.hf_dataset_repo.clone(), items);
    log_report(&report, &source);
    LoadedDataset { dataset, report, source }
}

async fn fetch_items(cfg: &AppConfig) -> Option<(Vec<Value>, DatasetSource)> {
    if cfg.skip_remote_dataset {
        info!("remote dataset disabled");
    } else {
        let url = cfg.dataset_url();
        match fetch_remote(cfg, &url).await {
            Ok((items, body)) => {
                info!(url = %url, items = items.len(), "dataset fetched");
                if cfg.cache_remote_dataset {
                    cache_document(cfg, &body).await;
                }
                return Some((items, DatasetSource::Remote(url)));
            }
            Err(e) => warn!(url = %url, error = %e, "remote dataset unavailable, trying local files"),
        }
    }

    for path in &cfg.dataset_paths {
        match read_local(path).await {
            Ok(Some(items)) => {
                info!(path = %path.display(), items = items.len(), "dataset loaded from disk");
                return Some((items, DatasetSource::Local(path.clone())));
            }
            Ok(None) => continue,
            Err(e) => warn!(path = %path.display(), error = %e, "local dataset unusable"),
        }
    }
    None
}

async fn fetch_remote(cfg: &AppConfig, url: &str) -> Result<(Vec<Value>, Bytes)> {
    let client = reqwest::Client::builder()
        .timeout(cfg.dataset_fetch_timeout)
        .build()
        .context("building HTTP client")?;

    let mut req = client.get(url);
    if let Some(token) = &cfg.hf_api_token {
        req = req.bearer_auth(token);
    }
    let body = req.send().await?.error_for_status()?.bytes().await?;

    let items = parse_document(&body)?;
    if items.is_empty() {
        bail!("remote document contains no items");
    }
    Ok((items, body))
}

async fn read_local(path: &Path) -> Result<Option<Vec<Value>>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(parse_document(&bytes)?))
}

/// Keep a copy of the remote document at the first local candidate.
async fn cache_document(cfg: &AppConfig, body: &[u8]) {
    let Some(path) = cfg.dataset_paths.first() else {
        return;
    };
    let written = async {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::write(path, body).await
    };
    match written.await {
        Ok(()) => info!(path = %path.display(), "dataset cached"),
        Err(e) => warn!(path = %path.display(), error = %e, "failed to cache dataset"),
    }
}

fn log_report(report: &LoadReport, source: &DatasetSource) {
    info!(
        source = ?source,
        items = report.items,
        loaded = report.loaded,
        hashes_filled = report.hashes_filled,
        skipped = report.skipped,
        duplicate_hashes = report.duplicate_hashes,
        roles = ?report.role_counts,
        "dataset ready"
    );
    for w in report.warnings.iter().take(20) {
        warn!("{w}");
    }
    if report.warnings.len() > 20 {
        warn!(more = report.warnings.len() - 20, "further dataset warnings suppressed");
    }
}
