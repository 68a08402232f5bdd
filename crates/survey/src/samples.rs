//! Mapping a user's position in the survey to a dataset sample.

use filestore::Storage;
use rand::Rng;

use crate::{get_or_create_permutation, Dataset, Result, ServedSample, SurveyError, UserId};

/// Parse a position the way a lenient integer parser would: optional leading
/// whitespace and sign, then as many digits as there are. Trailing junk is
/// ignored; no digits at all gives `None`.
pub fn parse_position(raw: &str) -> Option<i64> {
    let s = raw.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let digits: &str = &digits[..digits.bytes().take_while(u8::is_ascii_digit).count()];
    if digits.is_empty() {
        return None;
    }
    let magnitude = digits
        .bytes()
        .fold(0i64, |acc, d| acc.saturating_mul(10).saturating_add(i64::from(d - b'0')));
    Some(if negative { -magnitude } else { magnitude })
}

/// Resolve `position` against a permutation.
///
/// Missing or negative positions clamp to the first entry; positions past
/// the end clamp to the last one. The final entry is always flagged with
/// `is_last_sample`.
pub fn serve_sample(dataset: &Dataset, indices: &[usize], position: Option<i64>) -> Result<ServedSample> {
    let last = indices.len().checked_sub(1).ok_or(SurveyError::EmptyDataset)?;
    let slot = match position {
        Some(p) if p > 0 => usize::try_from(p).map_or(last, |p| p.min(last)),
        _ => 0,
    };

    let index = indices[slot];
    let sample = dataset.get(index).ok_or(SurveyError::IndexOutOfRange {
        index,
        len: dataset.len(),
    })?;

    Ok(ServedSample {
        sample: sample.clone(),
        total_available: indices.len(),
        is_last_sample: (slot == last).then_some(true),
    })
}

/// Sample at `position` in `user`'s survey, creating their ordering on first
/// use.
pub fn get_sample<S, R>(
    store: &S,
    dataset: &Dataset,
    user: &UserId,
    position: Option<i64>,
    session_limit: usize,
    rng: &mut R,
) -> Result<ServedSample>
where
    S: Storage + ?Sized,
    R: Rng + ?Sized,
{
    if dataset.is_empty() {
        return Err(SurveyError::EmptyDataset);
    }
    let resolved = get_or_create_permutation(store, user, dataset.len(), session_limit, rng);
    serve_sample(dataset, &resolved.permutation.indices, position)
}
