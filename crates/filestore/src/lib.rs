//! Scoped JSON record storage
//!
//! Records live under `<root>/<collection>/<scope>/<key>.json`. The scope is
//! derived from the dataset name when that name is usable as a directory
//! component; otherwise every record goes to the shared fallback scope.

mod scope;
mod storage;

pub use scope::{resolve_scope, StoreScope, FALLBACK_SCOPE};
pub use storage::{FileStorage, InMemoryStorage, Storage};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid record key: {0:?}")]
    InvalidKey(String),

    #[error("Write failed in scope {primary} ({primary_error}) and fallback scope ({fallback_error})")]
    Unavailable {
        primary: String,
        primary_error: String,
        fallback_error: String,
    },
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Keys and collections become path components, so only a conservative
/// character set is accepted.
pub(crate) fn is_safe_component(s: &str) -> bool {
    !s.is_empty()
        && s != "."
        && s != ".."
        && s.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}
