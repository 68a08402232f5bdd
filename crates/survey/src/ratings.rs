//! Per-user rating log.
//!
//! One JSON array per user, in insertion order, at most one entry per
//! content hash. Re-rating a sample rewrites that entry in place.

use chrono::{DateTime, Utc};
use filestore::{Storage, StoreScope};
use tracing::{debug, warn};

use crate::records::{load_record, save_record, Loaded};
use crate::{Progress, Rating, RatingSubmission, Result, UserId, COLLECTION_RATINGS};

#[derive(Clone, Debug, PartialEq)]
pub struct BulkOutcome {
    pub applied: usize,
    pub skipped: usize,
    pub scope: StoreScope,
}

/// All ratings for `user`. Never fails: missing, unreadable and malformed
/// records all read as an empty list.
pub fn list_ratings<S: Storage + ?Sized>(store: &S, user: &UserId) -> Vec<Rating> {
    load_record(store, COLLECTION_RATINGS, user)
        .into_option()
        .unwrap_or_default()
}

fn apply_rating(ratings: &mut Vec<Rating>, content_hash: &str, label: bool, at: DateTime<Utc>) {
    match ratings.iter_mut().find(|r| r.content_hash == content_hash) {
        Some(existing) => {
            existing.label = label;
            existing.recorded_at = at;
        }
        None => ratings.push(Rating {
            content_hash: content_hash.to_string(),
            label,
            recorded_at: at,
        }),
    }
}

/// Record one rating, timestamped now.
pub fn upsert_rating<S: Storage + ?Sized>(
    store: &S,
    user: &UserId,
    submission: &RatingSubmission,
) -> Result<StoreScope> {
    let (content_hash, label) = submission.validate()?;
    let mut ratings = list_ratings(store, user);
    apply_rating(&mut ratings, content_hash, label, Utc::now());
    let scope = save_record(store, COLLECTION_RATINGS, user, &ratings, true)?;
    debug!(user = %user, content_hash, label, total = ratings.len(), "rating stored");
    Ok(scope)
}

/// Batch import. Each element is applied in order with upsert semantics and
/// keeps its own timestamp when it has a valid one. Unusable elements are
/// skipped rather than failing the batch.
pub fn bulk_upsert<S: Storage + ?Sized>(
    store: &S,
    user: &UserId,
    submissions: &[RatingSubmission],
) -> Result<BulkOutcome> {
    let mut ratings = list_ratings(store, user);
    let mut applied = 0;
    let mut skipped = 0;

    for (i, submission) in submissions.iter().enumerate() {
        match submission.validate() {
            Ok((content_hash, label)) => {
                let at = submission.timestamp().unwrap_or_else(Utc::now);
                apply_rating(&mut ratings, content_hash, label, at);
                applied += 1;
            }
            Err(e) => {
                warn!(user = %user, element = i, error = %e, "bulk rating skipped");
                skipped += 1;
            }
        }
    }

    let scope = save_record(store, COLLECTION_RATINGS, user, &ratings, true)?;
    Ok(BulkOutcome { applied, skipped, scope })
}

/// `timestamp` is that of the last rating in insertion order, i.e. the most
/// recently appended one. Re-rating an older sample does not move it.
pub fn progress<S: Storage + ?Sized>(store: &S, user: &UserId) -> Progress {
    let ratings = list_ratings(store, user);
    Progress {
        completed: ratings.len(),
        timestamp: ratings.last().map(|r| r.recorded_at),
    }
}

/// Pretty-printed rating list for download. Creates the user's record when
/// there is none yet.
pub fn export_ratings<S: Storage + ?Sized>(store: &S, user: &UserId) -> Result<Vec<u8>> {
    let ratings: Vec<Rating> = match load_record(store, COLLECTION_RATINGS, user) {
        Loaded::Found(r) => r,
        Loaded::Missing | Loaded::Corrupt => {
            save_record(store, COLLECTION_RATINGS, user, &Vec::<Rating>::new(), true)?;
            Vec::new()
        }
    };
    Ok(serde_json::to_vec_pretty(&ratings)?)
}
