use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Where the client address used for identity comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdentitySource {
    /// Peer address of the TCP connection.
    Socket,
    /// First hop of `X-Forwarded-For`, falling back to the socket address.
    ForwardedFor,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bind_addr: String,

    pub hf_dataset_repo: String,
    pub hf_api_token: Option<String>,
    pub hf_base_url: String,
    pub skip_remote_dataset: bool,
    pub cache_remote_dataset: bool,
    pub dataset_fetch_timeout: Duration,
    pub dataset_paths: Vec<PathBuf>,

    pub data_dir: PathBuf,
    pub session_limit: usize,
    pub frontend_dir: Option<PathBuf>,
    pub identity_source: IdentitySource,
}

pub const DEFAULT_DATASET_REPO: &str = "Steelskull/pjmixers";
pub const DEFAULT_HF_BASE_URL: &str = "https://huggingface.co";

fn default_dataset_paths() -> Vec<PathBuf> {
    vec![
        PathBuf::from("pjmixers_dataset.json"),
        PathBuf::from("data/pjmixers_dataset.json"),
        PathBuf::from("/pjmixers_dataset.json"),
    ]
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3001".to_string(),
            hf_dataset_repo: DEFAULT_DATASET_REPO.to_string(),
            hf_api_token: None,
            hf_base_url: DEFAULT_HF_BASE_URL.to_string(),
            skip_remote_dataset: false,
            cache_remote_dataset: false,
            dataset_fetch_timeout: Duration::from_secs(30),
            dataset_paths: default_dataset_paths(),
            data_dir: PathBuf::from("data"),
            session_limit: survey::DEFAULT_SESSION_LIMIT,
            frontend_dir: None,
            identity_source: IdentitySource::Socket,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let bind_addr = match (opt("SURVEY_BIND_ADDR"), opt("PORT")) {
            (Some(addr), _) => addr,
            (None, Some(port)) => {
                let port: u16 = port.parse().with_context(|| format!("PORT is not a valid port: {port}"))?;
                format!("0.0.0.0:{port}")
            }
            (None, None) => defaults.bind_addr,
        };

        let hf_dataset_repo = opt("HF_DATASET_REPO").unwrap_or(defaults.hf_dataset_repo);
        let hf_api_token = opt("HF_API_TOKEN");
        let hf_base_url = opt("HF_BASE_URL").unwrap_or(defaults.hf_base_url);

        let dataset_fetch_timeout = match opt("DATASET_FETCH_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(
                v.parse()
                    .with_context(|| format!("DATASET_FETCH_TIMEOUT_SECS must be a number of seconds: {v}"))?,
            ),
            None => defaults.dataset_fetch_timeout,
        };

        let dataset_paths = match opt("DATASET_PATHS") {
            Some(v) => v
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(PathBuf::from)
                .collect(),
            None => defaults.dataset_paths,
        };

        let session_limit = match opt("SESSION_LIMIT") {
            Some(v) => v.parse().with_context(|| format!("SESSION_LIMIT must be a number: {v}"))?,
            None => defaults.session_limit,
        };

        let identity_source = if flag("TRUST_FORWARDED_FOR") {
            IdentitySource::ForwardedFor
        } else {
            IdentitySource::Socket
        };

        // Fail fast on values that would only break later
        if !hf_base_url.starts_with("http://") && !hf_base_url.starts_with("https://") {
            bail!("HF_BASE_URL must start with http:// or https://");
        }
        if hf_dataset_repo.trim().is_empty() {
            bail!("HF_DATASET_REPO must not be empty");
        }
        if session_limit == 0 {
            bail!("SESSION_LIMIT must be at least 1");
        }

        Ok(Self {
            bind_addr,
            hf_dataset_repo,
            hf_api_token,
            hf_base_url,
            skip_remote_dataset: flag("SKIP_REMOTE_DATASET"),
            cache_remote_dataset: flag("CACHE_HF_DATASET"),
            dataset_fetch_timeout,
            dataset_paths,
            data_dir: opt("DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
            session_limit,
            frontend_dir: opt("FRONTEND_DIR").map(PathBuf::from),
            identity_source,
        })
    }

    /// Remote document the dataset is fetched from.
    pub fn dataset_url(&self) -> String {
        format!(
            "{}/datasets/{}/resolve/main/",
            self.hf_base_url.trim_end_matches('/'),
            self.hf_dataset_repo
        )
    }
}

/// Set and non-empty.
fn opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn flag(key: &str) -> bool {
    opt(key)
        .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false)
}
