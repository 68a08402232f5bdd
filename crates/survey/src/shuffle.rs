//! Per-user sample ordering.
//!
//! Each user gets one random permutation of the dataset, truncated to the
//! session limit and stored on first use. Later requests reuse it.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use filestore::{Storage, StoreScope};
use rand::Rng;
use serde::Deserialize;
use tracing::{info, warn};

use crate::records::{load_record, save_record, Loaded};
use crate::{UserId, UserIndexPermutation, COLLECTION_USER_INDICES};

/// Older records are a bare array of indices.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredPermutation {
    Record(UserIndexPermutation),
    Legacy(Vec<usize>),
}

#[derive(Clone, Debug, PartialEq)]
pub enum PermutationSource {
    Stored,
    Created { scope: StoreScope },
    /// Generated but not persisted; the next request will shuffle again.
    Unpersisted { error: String },
}

#[derive(Clone, Debug)]
pub struct ResolvedPermutation {
    pub permutation: UserIndexPermutation,
    pub source: PermutationSource,
}

/// Fisher-Yates over `0..n`.
pub fn shuffled_indices<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..n).collect();
    for i in (1..n).rev() {
        let j = rng.gen_range(0..=i);
        indices.swap(i, j);
    }
    indices
}

/// A stored permutation is only reused while every index still points into
/// the dataset. Growth keeps the old ordering; shrinkage forces a new one.
fn is_usable(indices: &[usize], dataset_size: usize) -> bool {
    if indices.is_empty() {
        return dataset_size == 0;
    }
    let mut seen = HashSet::with_capacity(indices.len());
    indices.iter().all(|&i| i < dataset_size && seen.insert(i))
}

/// Both record shapes are capped at the current session limit, so lowering
/// the limit shortens existing sessions too.
fn into_permutation(stored: StoredPermutation, user: &UserId, session_limit: usize) -> UserIndexPermutation {
    let mut permutation = match stored {
        StoredPermutation::Record(rec) => rec,
        StoredPermutation::Legacy(indices) => UserIndexPermutation {
            owner: user.clone(),
            indices,
            created_at: DateTime::<Utc>::default(),
        },
    };
    permutation.indices.truncate(session_limit);
    permutation
}

/// The user's stored permutation, if there is a readable one.
pub fn load_permutation<S: Storage + ?Sized>(
    store: &S,
    user: &UserId,
    session_limit: usize,
) -> Option<UserIndexPermutation> {
    load_record::<S, StoredPermutation>(store, COLLECTION_USER_INDICES, user)
        .into_option()
        .map(|stored| into_permutation(stored, user, session_limit))
}

pub fn get_or_create_permutation<S, R>(
    store: &S,
    user: &UserId,
    dataset_size: usize,
    session_limit: usize,
    rng: &mut R,
) -> ResolvedPermutation
where
    S: Storage + ?Sized,
    R: Rng + ?Sized,
{
    if let Loaded::Found(stored) = load_record(store, COLLECTION_USER_INDICES, user) {
        let permutation = into_permutation(stored, user, session_limit);
        if is_usable(&permutation.indices, dataset_size) {
            return ResolvedPermutation { permutation, source: PermutationSource::Stored };
        }
        warn!(
            user = %user,
            stored = permutation.indices.len(),
            dataset_size,
            "stored permutation no longer fits the dataset, regenerating"
        );
        if let Err(e) = store.quarantine(COLLECTION_USER_INDICES, user.as_str()) {
            warn!(user = %user, error = %e, "could not back up stale permutation");
        }
    }

    let mut indices = shuffled_indices(dataset_size, rng);
    indices.truncate(session_limit.min(dataset_size));
    let permutation = UserIndexPermutation {
        owner: user.clone(),
        indices,
        created_at: Utc::now(),
    };

    let source = match save_record(store, COLLECTION_USER_INDICES, user, &permutation, false) {
        Ok(scope) => {
            info!(user = %user, len = permutation.indices.len(), scope = %scope, "permutation created");
            PermutationSource::Created { scope }
        }
        Err(e) => {
            warn!(user = %user, error = %e, "permutation not persisted");
            PermutationSource::Unpersisted { error: e.to_string() }
        }
    };

    ResolvedPermutation { permutation, source }
}
