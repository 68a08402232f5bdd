//! Storage trait and implementations

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

use crate::{is_safe_component, resolve_scope, Result, StoreError, StoreScope};

/// Keyed record storage, one record per `(collection, key)` pair.
///
/// There is no locking between writers: a `put` replaces the whole record and
/// the last writer wins.
pub trait Storage: Send + Sync {
    /// Scope records are written to when nothing goes wrong.
    fn scope(&self) -> StoreScope;

    fn get(&self, collection: &str, key: &str) -> Result<Option<Vec<u8>>>;

    /// Replace the record and report the scope that actually took the write.
    fn put(&self, collection: &str, key: &str, value: &[u8]) -> Result<StoreScope>;

    /// Move the current record aside so it reads as absent from now on.
    /// Returns the name of the backup, or `None` when there is no record.
    fn quarantine(&self, collection: &str, key: &str) -> Result<Option<String>>;
}

fn check_names(collection: &str, key: &str) -> Result<()> {
    if !is_safe_component(collection) {
        return Err(StoreError::InvalidKey(collection.to_string()));
    }
    if !is_safe_component(key) {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// JSON files on local disk.
#[derive(Clone, Debug)]
pub struct FileStorage {
    root: PathBuf,
    scope: StoreScope,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>, dataset_name: &str) -> Self {
        Self::with_scope(root, resolve_scope(dataset_name))
    }

    pub fn with_scope(root: impl Into<PathBuf>, scope: StoreScope) -> Self {
        Self { root: root.into(), scope }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn record_path(&self, collection: &str, scope: &StoreScope, key: &str) -> PathBuf {
        self.root
            .join(collection)
            .join(scope.as_str())
            .join(format!("{key}.json"))
    }

    /// Create the collection directory up front, dropping to the fallback
    /// scope if the primary one cannot be created.
    pub fn ensure_collection(&self, collection: &str) -> Result<StoreScope> {
        if !is_safe_component(collection) {
            return Err(StoreError::InvalidKey(collection.to_string()));
        }
        let primary = self.root.join(collection).join(self.scope.as_str());
        match fs::create_dir_all(&primary) {
            Ok(()) => Ok(self.scope.clone()),
            Err(e) if self.scope.is_fallback() => Err(e.into()),
            Err(e) => {
                warn!(dir = %primary.display(), error = %e, "cannot create scope directory, using fallback");
                let fallback = self.root.join(collection).join(StoreScope::Fallback.as_str());
                fs::create_dir_all(&fallback)?;
                Ok(StoreScope::Fallback)
            }
        }
    }

    /// Primary location first, then the fallback scope.
    fn candidates(&self, collection: &str, key: &str) -> Vec<PathBuf> {
        let mut out = vec![self.record_path(collection, &self.scope, key)];
        if !self.scope.is_fallback() {
            out.push(self.record_path(collection, &StoreScope::Fallback, key));
        }
        out
    }

    /// The live copy of a record: the most recently written candidate, the
    /// primary one on a tie.
    fn current_path(&self, collection: &str, key: &str) -> io::Result<Option<PathBuf>> {
        let mut current: Option<(SystemTime, PathBuf)> = None;
        let mut failure = None;
        for path in self.candidates(collection, key) {
            let modified = match fs::metadata(&path).and_then(|m| m.modified()) {
                Ok(t) => t,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "record unreadable");
                    failure = Some(e);
                    continue;
                }
            };
            if current.as_ref().map_or(true, |(t, _)| modified > *t) {
                current = Some((modified, path));
            }
        }
        match (current, failure) {
            (Some((_, path)), _) => Ok(Some(path)),
            (None, Some(e)) => Err(e),
            (None, None) => Ok(None),
        }
    }
}

/// Write through a temp file so readers never see a half-written record.
fn write_record(path: &Path, value: &[u8]) -> io::Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, value)?;
    fs::rename(&tmp, path)
}

impl Storage for FileStorage {
    fn scope(&self) -> StoreScope {
        self.scope.clone()
    }

    fn get(&self, collection: &str, key: &str) -> Result<Option<Vec<u8>>> {
        check_names(collection, key)?;
        let Some(path) = self.current_path(collection, key)? else {
            return Ok(None);
        };
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, collection: &str, key: &str, value: &[u8]) -> Result<StoreScope> {
        check_names(collection, key)?;
        let primary = self.record_path(collection, &self.scope, key);
        let primary_error = match write_record(&primary, value) {
            Ok(()) => return Ok(self.scope.clone()),
            Err(e) if self.scope.is_fallback() => return Err(e.into()),
            Err(e) => e,
        };

        warn!(
            path = %primary.display(),
            error = %primary_error,
            "record write failed, retrying in fallback scope"
        );
        let fallback = self.record_path(collection, &StoreScope::Fallback, key);
        match write_record(&fallback, value) {
            Ok(()) => {
                // An older primary copy would otherwise shadow this write.
                match fs::remove_file(&primary) {
                    Ok(()) => debug!(path = %primary.display(), "stale primary record removed"),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => warn!(path = %primary.display(), error = %e, "stale primary record left in place"),
                }
                Ok(StoreScope::Fallback)
            }
            Err(fallback_error) => Err(StoreError::Unavailable {
                primary: self.scope.to_string(),
                primary_error: primary_error.to_string(),
                fallback_error: fallback_error.to_string(),
            }),
        }
    }

    fn quarantine(&self, collection: &str, key: &str) -> Result<Option<String>> {
        check_names(collection, key)?;
        let Some(path) = self.current_path(collection, key)? else {
            return Ok(None);
        };
        let mut backup = path.as_os_str().to_owned();
        backup.push(format!(".corrupt-{}", now_secs()));
        let backup = PathBuf::from(backup);
        fs::rename(&path, &backup)?;
        debug!(from = %path.display(), to = %backup.display(), "record moved aside");
        Ok(Some(backup.display().to_string()))
    }
}

/// In-memory storage (for testing and demos)
#[derive(Clone)]
pub struct InMemoryStorage {
    scope: StoreScope,
    data: Arc<RwLock<HashMap<(String, String), Vec<u8>>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::with_scope(StoreScope::Fallback)
    }

    pub fn with_scope(scope: StoreScope) -> Self {
        Self {
            scope,
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Keys currently held in `collection`, sorted.
    pub fn keys(&self, collection: &str) -> Vec<String> {
        let data = self.data.read().unwrap_or_else(|e| e.into_inner());
        let mut keys: Vec<String> = data
            .keys()
            .filter(|(c, _)| c == collection)
            .map(|(_, k)| k.clone())
            .collect();
        keys.sort();
        keys
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for InMemoryStorage {
    fn scope(&self) -> StoreScope {
        self.scope.clone()
    }

    fn get(&self, collection: &str, key: &str) -> Result<Option<Vec<u8>>> {
        check_names(collection, key)?;
        let data = self.data.read().unwrap_or_else(|e| e.into_inner());
        Ok(data.get(&(collection.to_string(), key.to_string())).cloned())
    }

    fn put(&self, collection: &str, key: &str, value: &[u8]) -> Result<StoreScope> {
        check_names(collection, key)?;
        let mut data = self.data.write().unwrap_or_else(|e| e.into_inner());
        data.insert((collection.to_string(), key.to_string()), value.to_vec());
        Ok(self.scope.clone())
    }

    fn quarantine(&self, collection: &str, key: &str) -> Result<Option<String>> {
        check_names(collection, key)?;
        let mut data = self.data.write().unwrap_or_else(|e| e.into_inner());
        let Some(bytes) = data.remove(&(collection.to_string(), key.to_string())) else {
            return Ok(None);
        };
        let backup = format!("{key}.corrupt-{}", now_secs());
        data.insert((collection.to_string(), backup.clone()), bytes);
        Ok(Some(backup))
    }
}
