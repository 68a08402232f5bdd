use std::fmt;

/// Well-known scope shared by every user when the dataset name cannot be
/// used as a directory name.
pub const FALLBACK_SCOPE: &str = "local_dataset";

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum StoreScope {
    /// Directory named after the dataset (`owner/repo` -> `owner_repo`).
    Dataset(String),
    Fallback,
}

impl StoreScope {
    pub fn as_str(&self) -> &str {
        match self {
            StoreScope::Dataset(name) => name,
            StoreScope::Fallback => FALLBACK_SCOPE,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, StoreScope::Fallback)
    }
}

impl fmt::Display for StoreScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a dataset name to its storage scope.
pub fn resolve_scope(dataset_name: &str) -> StoreScope {
    let safe = dataset_name.trim().replace('/', "_");
    if safe == FALLBACK_SCOPE || !crate::is_safe_component(&safe) {
        return StoreScope::Fallback;
    }
    StoreScope::Dataset(safe)
}
