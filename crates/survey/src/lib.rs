pub mod schema;
pub mod identity;
pub mod dataset;
pub mod shuffle;
pub mod ratings;
pub mod samples;
mod records;

pub use schema::*;
pub use identity::*;
pub use dataset::*;
pub use shuffle::*;
pub use ratings::*;
pub use samples::*;

use thiserror::Error;

/// Samples a user is asked to rate in one pass unless configured otherwise.
pub const DEFAULT_SESSION_LIMIT: usize = 50;

/// Storage collection holding per-user rating lists.
pub const COLLECTION_RATINGS: &str = "ratings";
/// Storage collection holding per-user sample permutations.
pub const COLLECTION_USER_INDICES: &str = "user_indices";

#[derive(Debug, Error)]
pub enum SurveyError {
    #[error("Missing required fields (turn_prompt_hash, label)")]
    MissingFields,

    #[error("label must be a boolean")]
    InvalidLabel,

    #[error("No samples available")]
    EmptyDataset,

    #[error("Dataset index {index} out of range (dataset has {len} samples)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Invalid dataset: {0}")]
    InvalidDataset(String),

    #[error("Storage error: {0}")]
    Store(#[from] filestore::StoreError),

    #[error("Serialization error: {0}")]
    Ser(#[from] serde_json::Error),
}

impl SurveyError {
    /// Errors caused by the caller's input rather than by the service.
    pub fn is_client_error(&self) -> bool {
        matches!(self, SurveyError::MissingFields | SurveyError::InvalidLabel)
    }
}

pub type Result<T> = std::result::Result<T, SurveyError>;
