//! File Store Module
//!
//! Persistent store keeping one JSON record per key under a storage root:
//!
//! ```text
//! <root>/entries/<sha256(key)>   committed records
//! <root>/tmp/                    in-flight writes
//! ```
//!
//! Writes go to a fresh temp file in `tmp/` and are renamed over the final
//! path once fully written and synced, so readers and crashes only ever see
//! a complete record or no record.

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, error, warn};

use crate::cache::{current_timestamp_ms, CacheEntry, CacheKey, Store};
use crate::error::{CacheError, Result};

/// Temp files older than this are assumed to belong to crashed writers.
const STALE_TEMP_AFTER: Duration = Duration::from_secs(3600);

const ENTRIES_DIR: &str = "entries";
const TMP_DIR: &str = "tmp";

// == Records ==
#[derive(Serialize)]
struct RecordRef<'a> {
    key: &'a str,
    value: &'a Value,
    created_at: u64,
    expires_at: Option<u64>,
    compute_ms: u64,
}

#[derive(Deserialize)]
struct Record {
    key: String,
    value: Value,
    created_at: u64,
    #[serde(default)]
    expires_at: Option<u64>,
    #[serde(default)]
    compute_ms: u64,
}

/// Everything but the decoded value, for existence checks and sweeps.
///
/// Accepts exactly the records [`Record`] accepts.
#[derive(Deserialize)]
#[allow(dead_code)]
struct RecordHeader {
    key: String,
    // Skipped but required, so a record without a value is absent
    value: IgnoredAny,
    created_at: u64,
    #[serde(default)]
    expires_at: Option<u64>,
    #[serde(default)]
    compute_ms: u64,
}

impl RecordHeader {
    fn is_expired_at(&self, now_ms: u64) -> bool {
        self.expires_at.is_some_and(|expires| now_ms >= expires)
    }
}

// == File Store ==
/// Store persisting entries as files under a root directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    entries_dir: PathBuf,
    tmp_dir: PathBuf,
    stale_temp_after: Duration,
}

impl FileStore {
    // == Constructor ==
    /// Opens (and creates if needed) a store rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let entries_dir = root.join(ENTRIES_DIR);
        let tmp_dir = root.join(TMP_DIR);

        fs::create_dir_all(&entries_dir)?;
        fs::create_dir_all(&tmp_dir)?;

        Ok(Self {
            entries_dir,
            tmp_dir,
            stale_temp_after: STALE_TEMP_AFTER,
        })
    }

    /// Overrides how old a temp file must be before a sweep removes it.
    pub fn with_stale_temp_after(mut self, after: Duration) -> Self {
        self.stale_temp_after = after;
        self
    }

    /// Path of the committed record for `key`.
    pub fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.entries_dir.join(key.digest())
    }

    /// Directory holding in-flight writes.
    pub fn tmp_dir(&self) -> &Path {
        &self.tmp_dir
    }

    fn read_bytes(&self, key: &CacheKey) -> Option<Vec<u8>> {
        match fs::read(self.entry_path(key)) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!("Failed to read cache record for '{}': {}", key, e);
                None
            }
        }
    }

    fn persist(&self, key: &CacheKey, entry: &CacheEntry) -> io::Result<()> {
        let record = RecordRef {
            key: key.as_str(),
            value: &entry.value,
            created_at: entry.created_at,
            expires_at: entry.expires_at,
            compute_ms: entry.compute_ms,
        };

        fs::create_dir_all(&self.tmp_dir)?;
        let mut temp_file = NamedTempFile::new_in(&self.tmp_dir)?;
        {
            let mut writer = BufWriter::new(&mut temp_file);
            serde_json::to_writer(&mut writer, &record)?;
            writer.flush()?;
        }
        temp_file.as_file().sync_all()?;

        persist_tempfile(temp_file, &self.entry_path(key))
    }

    fn sweep_entries(&self, now_ms: u64) -> io::Result<usize> {
        let mut removed = 0;

        for dir_entry in fs::read_dir(&self.entries_dir)? {
            let path = dir_entry?.path();
            let reclaim = match fs::read(&path) {
                Ok(bytes) => match serde_json::from_slice::<RecordHeader>(&bytes) {
                    Ok(header) => header.is_expired_at(now_ms),
                    Err(_) => true,
                },
                Err(_) => continue,
            };

            if reclaim && remove_if_present(&path)? {
                debug!("Reclaimed cache record {}", path.display());
                removed += 1;
            }
        }

        Ok(removed)
    }

    fn sweep_temp_files(&self) -> io::Result<usize> {
        let mut removed = 0;

        for dir_entry in fs::read_dir(&self.tmp_dir)? {
            let dir_entry = dir_entry?;
            let age = dir_entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .and_then(|mtime| mtime.elapsed().ok());

            if age.is_some_and(|age| age >= self.stale_temp_after)
                && remove_if_present(&dir_entry.path())?
            {
                removed += 1;
            }
        }

        Ok(removed)
    }
}

impl Store for FileStore {
    fn read(&self, key: &CacheKey) -> Option<CacheEntry> {
        let bytes = self.read_bytes(key)?;

        let record: Record = match serde_json::from_slice(&bytes) {
            Ok(record) => record,
            Err(e) => {
                warn!("Discarding malformed cache record for '{}': {}", key, e);
                return None;
            }
        };
        if record.key != key.as_str() {
            warn!("Cache record for '{}' belongs to '{}'", key, record.key);
            return None;
        }

        let entry = CacheEntry {
            value: record.value,
            created_at: record.created_at,
            expires_at: record.expires_at,
            compute_ms: record.compute_ms,
        };
        if entry.is_expired() {
            debug!("Entry '{}' has expired", key);
            return None;
        }
        Some(entry)
    }

    fn write(&self, key: &CacheKey, entry: &CacheEntry) -> Result<()> {
        self.persist(key, entry)
            .map_err(|source| CacheError::StorageWrite {
                key: key.to_string(),
                source,
            })
    }

    fn delete(&self, key: &CacheKey) -> Result<()> {
        remove_if_present(&self.entry_path(key))
            .map(|_| ())
            .map_err(|source| CacheError::StorageDelete {
                key: key.to_string(),
                source,
            })
    }

    fn exists(&self, key: &CacheKey) -> bool {
        let Some(bytes) = self.read_bytes(key) else {
            return false;
        };
        match serde_json::from_slice::<RecordHeader>(&bytes) {
            Ok(header) => {
                header.key == key.as_str() && !header.is_expired_at(current_timestamp_ms())
            }
            Err(_) => false,
        }
    }

    /// Removes expired and malformed records as well as stale temp files.
    ///
    /// A record rewritten between the scan and the removal can be lost; the
    /// next `get` recomputes it.
    fn prune_expired(&self) -> Result<usize> {
        let records = self.sweep_entries(current_timestamp_ms())?;
        let temps = self.sweep_temp_files()?;
        if temps > 0 {
            debug!("Removed {} abandoned temp files", temps);
        }
        Ok(records)
    }
}

/// Removes a file, treating "already gone" as success.
///
/// Returns whether this call removed it.
fn remove_if_present(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Atomically moves a fully written temp file into place.
fn persist_tempfile(mut temp_file: NamedTempFile, path: &Path) -> io::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "no parent directory to persist entry"))?;

    // A concurrent sweep or operator may remove the directory; retry a few times.
    const MAX_RETRIES: usize = 2;
    let mut retries = 0;
    loop {
        retries += 1;

        if let Err(e) = fs::create_dir_all(parent) {
            error!("Failed to create cache directory {}: {}", parent.display(), e);
            if retries > MAX_RETRIES {
                return Err(e);
            }
            continue;
        }

        match temp_file.persist(path) {
            Ok(_) => return Ok(()),
            Err(e) => {
                temp_file = e.file;
                if retries > MAX_RETRIES {
                    return Err(e.error);
                }
                warn!("Retrying persist of {}: {}", path.display(), e.error);
            }
        }
    }
}
