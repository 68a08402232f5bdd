use filestore::{Storage, StoreScope};
use serde::{de::DeserializeOwned, Serialize};
use tracing::warn;

use crate::UserId;

pub(crate) enum Loaded<T> {
    Missing,
    Found(T),
    /// Present but unparseable. A backup has been attempted.
    Corrupt,
}

impl<T> Loaded<T> {
    pub(crate) fn into_option(self) -> Option<T> {
        match self {
            Loaded::Found(v) => Some(v),
            Loaded::Missing | Loaded::Corrupt => None,
        }
    }
}

/// Read a user's record. Unreadable records count as missing; malformed ones
/// are backed up first so the next write cannot destroy them.
pub(crate) fn load_record<S, T>(store: &S, collection: &str, user: &UserId) -> Loaded<T>
where
    S: Storage + ?Sized,
    T: DeserializeOwned,
{
    let bytes = match store.get(collection, user.as_str()) {
        Ok(Some(bytes)) => bytes,
        Ok(None) => return Loaded::Missing,
        Err(e) => {
            warn!(collection, user = %user, error = %e, "record unreadable, treating as absent");
            return Loaded::Missing;
        }
    };

    match serde_json::from_slice(&bytes) {
        Ok(v) => Loaded::Found(v),
        Err(parse_error) => {
            match store.quarantine(collection, user.as_str()) {
                Ok(backup) => warn!(
                    collection,
                    user = %user,
                    error = %parse_error,
                    backup = backup.as_deref().unwrap_or("-"),
                    "malformed record, treating as absent"
                ),
                Err(e) => warn!(
                    collection,
                    user = %user,
                    error = %parse_error,
                    backup_error = %e,
                    "malformed record could not be backed up"
                ),
            }
            Loaded::Corrupt
        }
    }
}

pub(crate) fn save_record<S, T>(
    store: &S,
    collection: &str,
    user: &UserId,
    value: &T,
    pretty: bool,
) -> crate::Result<StoreScope>
where
    S: Storage + ?Sized,
    T: Serialize + ?Sized,
{
    let bytes = if pretty {
        serde_json::to_vec_pretty(value)?
    } else {
        serde_json::to_vec(value)?
    };
    Ok(store.put(collection, user.as_str(), &bytes)?)
}
