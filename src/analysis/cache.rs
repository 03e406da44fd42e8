//! On-disk cache of extracted events.
//!
//! Large batches are re-analyzed often with different settings while the
//! logs themselves never change, so extracted event streams are stored as
//! zstd-compressed bincode next to the canonical source path and a
//! fingerprint of the source file.

use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use color_eyre::eyre::Result;
use serde::{Deserialize, Serialize};

use super::log_parser::parse_log_file;
use super::types::Event;

const ZSTD_LEVEL: i32 = 3;

/// Cache failures; callers fall back to parsing the log
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Cache encoding error: {0}")]
    Encoding(#[from] bincode::Error),
    #[error("Log file has no file name: {0}")]
    InvalidPath(PathBuf),
}

/// Size and modification time of a log file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct Fingerprint {
    len: u64,
    modified_secs: u64,
    modified_nanos: u32,
}

impl Fingerprint {
    fn of(path: &Path) -> Result<Self, CacheError> {
        let metadata = fs::metadata(path).map_err(|source| CacheError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        // Filesystems without mtime support fingerprint by length only
        let modified = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .unwrap_or_default();

        Ok(Self {
            len: metadata.len(),
            modified_secs: modified.as_secs(),
            modified_nanos: modified.subsec_nanos(),
        })
    }
}

#[derive(Serialize)]
struct CacheEntryRef<'a> {
    source: &'a Path,
    fingerprint: Fingerprint,
    events: &'a [Event],
}

#[derive(Deserialize)]
struct CacheEntry {
    source: PathBuf,
    fingerprint: Fingerprint,
    events: Vec<Event>,
}

fn canonical(log_path: &Path) -> Result<PathBuf, CacheError> {
    fs::canonicalize(log_path).map_err(|source| CacheError::Io {
        path: log_path.to_path_buf(),
        source,
    })
}

/// Directory of cached event streams, one file per log
#[derive(Debug, Clone)]
pub struct EventCache {
    dir: PathBuf,
}

impl EventCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Cache file for `log_path`.
    ///
    /// Named after the log plus a hash of its canonical path, so equally
    /// named logs from different directories never share an entry.
    pub fn entry_path(&self, log_path: &Path) -> Result<PathBuf, CacheError> {
        let source = canonical(log_path)?;
        let name = source
            .file_name()
            .ok_or_else(|| CacheError::InvalidPath(log_path.to_path_buf()))?;

        let mut hasher = DefaultHasher::new();
        source.hash(&mut hasher);

        Ok(self.dir.join(format!(
            "{}.{:016x}.events.zst",
            name.to_string_lossy(),
            hasher.finish()
        )))
    }

    /// Cached events for `log_path`, or `None` if absent or stale
    pub fn load(&self, log_path: &Path) -> Result<Option<Vec<Event>>, CacheError> {
        let entry_path = self.entry_path(log_path)?;
        if !entry_path.exists() {
            return Ok(None);
        }

        let compressed = fs::read(&entry_path).map_err(|source| CacheError::Io {
            path: entry_path.clone(),
            source,
        })?;
        let bytes = zstd::decode_all(compressed.as_slice()).map_err(|source| CacheError::Io {
            path: entry_path.clone(),
            source,
        })?;
        let entry: CacheEntry = bincode::deserialize(&bytes)?;

        if entry.source != canonical(log_path)? {
            log::debug!("Cache entry {} belongs to {}", entry_path.display(), entry.source.display());
            return Ok(None);
        }
        if entry.fingerprint != Fingerprint::of(log_path)? {
            log::debug!("Stale cache entry {}", entry_path.display());
            return Ok(None);
        }

        Ok(Some(entry.events))
    }

    /// Store the events extracted from `log_path`
    pub fn store(&self, log_path: &Path, events: &[Event]) -> Result<(), CacheError> {
        let entry_path = self.entry_path(log_path)?;
        fs::create_dir_all(&self.dir).map_err(|source| CacheError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let source = canonical(log_path)?;
        let entry = CacheEntryRef {
            source: &source,
            fingerprint: Fingerprint::of(log_path)?,
            events,
        };
        let bytes = bincode::serialize(&entry)?;
        let compressed =
            zstd::encode_all(bytes.as_slice(), ZSTD_LEVEL).map_err(|source| CacheError::Io {
                path: entry_path.clone(),
                source,
            })?;

        fs::write(&entry_path, compressed).map_err(|source| CacheError::Io {
            path: entry_path,
            source,
        })
    }

    /// Events for `log_path`, from cache when fresh, otherwise parsed and stored
    pub fn load_or_parse(&self, log_path: &Path) -> Result<Vec<Event>> {
        match self.load(log_path) {
            Ok(Some(events)) => {
                log::debug!("Cache hit for {}", log_path.display());
                return Ok(events);
            }
            Ok(None) => {}
            Err(e) => log::warn!("Ignoring unusable cache entry for {}: {}", log_path.display(), e),
        }

        let events = parse_log_file(log_path)?;
        if let Err(e) = self.store(log_path, &events) {
            log::warn!("Failed to cache events for {}: {}", log_path.display(), e);
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    const LOG: &str = "\
100 3 Sending message: 'Msg 1' to fd00::210:10:10:10
150 3 [INFO: TSCH      ] send packet to 0001.0001.0001.0001
900 16 Data received from fd00::203 on port 1 from port 2 in 2 hops with datalength 5: 'Msg 1'
";

    fn write_log(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_store_and_load() {
        let logs = TempDir::new().unwrap();
        let cache_dir = TempDir::new().unwrap();
        let log = write_log(logs.path(), "TSCH_6_1.testlog", LOG);
        let cache = EventCache::new(cache_dir.path());

        assert!(cache.load(&log).unwrap().is_none());

        let parsed = cache.load_or_parse(&log).unwrap();
        assert_eq!(parsed.len(), 3);
        assert!(cache.entry_path(&log).unwrap().exists());

        let cached = cache.load(&log).unwrap().unwrap();
        assert_eq!(cached, parsed);
    }

    #[test]
    fn test_stale_entry_is_ignored() {
        let logs = TempDir::new().unwrap();
        let cache_dir = TempDir::new().unwrap();
        let log = write_log(logs.path(), "TSCH_6_1.testlog", LOG);
        let cache = EventCache::new(cache_dir.path());
        cache.load_or_parse(&log).unwrap();

        // Appending changes the length, so the fingerprint no longer matches
        write_log(logs.path(), "TSCH_6_1.testlog", &format!("{LOG}1000 3 All messages send\n"));
        assert!(cache.load(&log).unwrap().is_none());
        assert_eq!(cache.load_or_parse(&log).unwrap().len(), 4);
    }

    #[test]
    fn test_corrupt_entry_falls_back_to_parsing() {
        let logs = TempDir::new().unwrap();
        let cache_dir = TempDir::new().unwrap();
        let log = write_log(logs.path(), "TSCH_6_1.testlog", LOG);
        let cache = EventCache::new(cache_dir.path());
        fs::write(cache.entry_path(&log).unwrap(), b"garbage").unwrap();

        assert!(cache.load(&log).is_err());
        assert_eq!(cache.load_or_parse(&log).unwrap().len(), 3);
    }

    #[test]
    fn test_same_name_in_other_directory() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        let cache_dir = TempDir::new().unwrap();

        // Same name and length, different receive tick
        let log_a = write_log(first.path(), "CSMA_6_1.testlog", LOG);
        let log_b = write_log(second.path(), "CSMA_6_1.testlog", &LOG.replace("900 16", "800 16"));
        let modified = fs::metadata(&log_a).unwrap().modified().unwrap();
        fs::File::options()
            .write(true)
            .open(&log_b)
            .unwrap()
            .set_modified(modified)
            .unwrap();
        assert_eq!(Fingerprint::of(&log_a).unwrap(), Fingerprint::of(&log_b).unwrap());

        let cache = EventCache::new(cache_dir.path());
        assert_ne!(cache.entry_path(&log_a).unwrap(), cache.entry_path(&log_b).unwrap());

        let events_a = cache.load_or_parse(&log_a).unwrap();
        assert!(cache.load(&log_b).unwrap().is_none());
        let events_b = cache.load_or_parse(&log_b).unwrap();

        assert_eq!(events_a[2].tick(), 900);
        assert_eq!(events_b[2].tick(), 800);
        assert_eq!(cache.load(&log_a).unwrap().unwrap(), events_a);
    }
}
