//! Persistence of the last successful run.
//!
//! The cache holds exactly two entries: the structured record as JSON under
//! [`RECORD_KEY`] and the rendered LaTeX under [`LATEX_KEY`]. A run that
//! fails writes nothing, so the cache always reflects the last *successful*
//! run.
//!
//! Storage is pluggable at two levels:
//!
//! * [`KeyValueStore`] is raw string storage ([`MemoryStore`], [`FileStore`]).
//! * [`ResumeStore`] is the typed save/load/clear capability the pipeline
//!   depends on; [`ResumeCache`] implements it over any `KeyValueStore`.
//!
//! Entries are not versioned. Anything that fails to read or decode is
//! logged and treated as absent.

use crate::error::ResumeError;
use crate::record::{LatexDocument, ResumeRecord};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Key of the structured record entry.
pub const RECORD_KEY: &str = "ai_resume_data";

/// Key of the rendered LaTeX entry.
pub const LATEX_KEY: &str = "ai_resume_latex";

/// String key/value storage.
pub trait KeyValueStore: Send + Sync {
    /// `Ok(None)` when the key is absent.
    fn get(&self, key: &str) -> io::Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> io::Result<()>;
    /// Removing an absent key succeeds.
    fn remove(&self, key: &str) -> io::Result<()>;
}

/// In-process store. Contents live as long as the value.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> io::Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| io::Error::other("memory store lock poisoned"))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}

/// One file per key under a directory.
///
/// Writes go to a temporary file in the same directory and are renamed into
/// place, so a crash never leaves a half-written entry.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Platform cache directory, e.g. `~/.cache/resume2tex` on Linux.
    pub fn default_dir() -> PathBuf {
        let base = dirs::cache_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join(".cache")))
            .unwrap_or_else(std::env::temp_dir);
        base.join("resume2tex")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(value.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.path_for(key)).map_err(|e| e.error)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        match std::fs::remove_file(self.path_for(key)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

/// Typed persistence of the last successful run.
pub trait ResumeStore: Send + Sync {
    /// Replace both entries.
    fn save(&self, record: &ResumeRecord, latex: &LatexDocument) -> Result<(), ResumeError>;

    /// Both entries, or `None` if either is missing or unreadable.
    fn load(&self) -> Option<(ResumeRecord, LatexDocument)>;

    /// Remove both entries. Succeeds when already empty.
    fn clear(&self) -> Result<(), ResumeError>;
}

/// [`ResumeStore`] over a [`KeyValueStore`].
#[derive(Debug, Default)]
pub struct ResumeCache<S> {
    store: S,
}

impl<S: KeyValueStore> ResumeCache<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn write_entry(&self, key: &str, value: &str) -> Result<(), ResumeError> {
        self.store
            .set(key, value)
            .map_err(|source| ResumeError::CacheWriteFailed {
                key: key.to_string(),
                source,
            })
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value,
            Err(e) => {
                warn!("Cache entry '{}' unreadable, ignoring: {}", key, e);
                None
            }
        }
    }
}

impl ResumeCache<MemoryStore> {
    /// A cache that forgets everything on drop.
    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }
}

impl ResumeCache<FileStore> {
    /// A cache under [`FileStore::default_dir`].
    pub fn on_disk() -> Self {
        Self::new(FileStore::new(FileStore::default_dir()))
    }
}

impl<S: KeyValueStore> ResumeStore for ResumeCache<S> {
    fn save(&self, record: &ResumeRecord, latex: &LatexDocument) -> Result<(), ResumeError> {
        let json = record
            .to_json()
            .map_err(|e| ResumeError::Internal(format!("Failed to serialise record: {e}")))?;

        let written = self
            .write_entry(RECORD_KEY, &json)
            .and_then(|()| self.write_entry(LATEX_KEY, latex.as_str()));
        if let Err(e) = written {
            // Never leave one run's record next to another run's LaTeX.
            if let Err(cleanup) = self.clear() {
                warn!("Could not roll back partial cache write: {}", cleanup);
            }
            return Err(e);
        }

        debug!("Cached record ({} bytes) and LaTeX ({} bytes)", json.len(), latex.as_str().len());
        Ok(())
    }

    fn load(&self) -> Option<(ResumeRecord, LatexDocument)> {
        let json = self.read(RECORD_KEY)?;
        let latex = self.read(LATEX_KEY)?;

        match ResumeRecord::from_json(&json) {
            Ok(record) => Some((record, LatexDocument::from_source(latex))),
            Err(e) => {
                warn!("Cached record is corrupt, ignoring: {}", e);
                None
            }
        }
    }

    fn clear(&self) -> Result<(), ResumeError> {
        for key in [RECORD_KEY, LATEX_KEY] {
            self.store
                .remove(key)
                .map_err(|source| ResumeError::CacheWriteFailed {
                    key: key.to_string(),
                    source,
                })?;
        }
        debug!("Cache cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Skills;

    fn record() -> ResumeRecord {
        ResumeRecord {
            name: "Jane Doe".into(),
            email: "jane@example.com".into(),
            phone: "555".into(),
            skills: Skills {
                languages: Some(vec!["Rust".into()]),
                ..Skills::default()
            },
            ..ResumeRecord::default()
        }
    }

    fn latex() -> LatexDocument {
        LatexDocument::from_source("\\documentclass{article}")
    }

    #[test]
    fn memory_round_trip() {
        let cache = ResumeCache::in_memory();
        assert!(cache.load().is_none());
        cache.save(&record(), &latex()).unwrap();
        let (r, l) = cache.load().expect("cached");
        assert_eq!(r, record());
        assert_eq!(l, latex());
    }

    #[test]
    fn clear_then_load_is_absent() {
        let cache = ResumeCache::in_memory();
        cache.save(&record(), &latex()).unwrap();
        cache.clear().unwrap();
        assert!(cache.load().is_none());
    }

    #[test]
    fn clear_on_empty_store_succeeds() {
        let cache = ResumeCache::in_memory();
        cache.clear().unwrap();
        cache.clear().unwrap();
    }

    #[test]
    fn corrupt_record_reads_as_absent() {
        let cache = ResumeCache::in_memory();
        cache.store().set(RECORD_KEY, "{not json").unwrap();
        cache.store().set(LATEX_KEY, "x").unwrap();
        assert!(cache.load().is_none());
    }

    #[test]
    fn record_without_latex_reads_as_absent() {
        let cache = ResumeCache::in_memory();
        cache.store().set(RECORD_KEY, &record().to_json().unwrap()).unwrap();
        assert!(cache.load().is_none());
    }

    #[test]
    fn uses_fixed_keys() {
        let cache = ResumeCache::in_memory();
        cache.save(&record(), &latex()).unwrap();
        assert!(cache.store().get("ai_resume_data").unwrap().is_some());
        assert_eq!(
            cache.store().get("ai_resume_latex").unwrap().as_deref(),
            Some("\\documentclass{article}")
        );
    }

    /// Memory store whose writes to one key fail.
    struct FailingKey {
        inner: MemoryStore,
        key: &'static str,
        fail: std::sync::atomic::AtomicBool,
    }

    impl KeyValueStore for FailingKey {
        fn get(&self, key: &str) -> io::Result<Option<String>> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> io::Result<()> {
            if key == self.key && self.fail.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(io::Error::other("disk full"));
            }
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> io::Result<()> {
            self.inner.remove(key)
        }
    }

    #[test]
    fn failed_latex_write_leaves_no_mismatched_pair() {
        let cache = ResumeCache::new(FailingKey {
            inner: MemoryStore::new(),
            key: LATEX_KEY,
            fail: std::sync::atomic::AtomicBool::new(false),
        });
        cache.save(&record(), &latex()).unwrap();

        cache
            .store()
            .fail
            .store(true, std::sync::atomic::Ordering::SeqCst);
        let mut updated = record();
        updated.name = "New Name".into();
        let err = cache
            .save(&updated, &LatexDocument::from_source("\\documentclass{new}"))
            .unwrap_err();

        assert!(matches!(err, ResumeError::CacheWriteFailed { ref key, .. } if key == LATEX_KEY));
        assert!(cache.load().is_none());
        assert_eq!(cache.store().get(RECORD_KEY).unwrap(), None);
    }

    #[test]
    fn file_store_round_trip_and_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResumeCache::new(FileStore::new(dir.path().join("nested")));
        cache.save(&record(), &latex()).unwrap();

        let mut updated = record();
        updated.name = "John Roe".into();
        cache.save(&updated, &latex()).unwrap();

        let (r, _) = cache.load().unwrap();
        assert_eq!(r.name, "John Roe");
        assert!(dir.path().join("nested").join(RECORD_KEY).exists());
    }

    #[test]
    fn file_store_remove_missing_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        store.remove("nope").unwrap();
        assert_eq!(store.get("nope").unwrap(), None);
    }

    #[test]
    fn default_dir_ends_with_crate_name() {
        assert!(FileStore::default_dir().ends_with("resume2tex"));
    }
}
