//! # File Store
//!
//! This module implements a file-based persistent cache provider.
//!
//! Each entry lives in a single file: one line of JSON metadata followed by the
//! raw body. Writes go to a temporary file that is renamed over the target, so
//! readers see the old entry or the new one and never a mix of both.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use bytes::Bytes;
use tokio::fs;
use tokio::io;
use tracing::{debug, warn};

use crate::cache::types::{CacheEntry, CacheResult, EntryMetadata, ResourceKey};

use super::CacheProvider;

const ENTRY_EXTENSION: &str = "entry";
const TEMP_EXTENSION: &str = "tmp";

#[derive(Debug, Clone)]
pub struct FileStore {
    cache_dir: PathBuf,
    initialized: Arc<AtomicBool>,
    temp_counter: Arc<AtomicU64>,
}

impl FileStore {
    /// Create a new file store rooted at the specified directory
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            initialized: Arc::new(AtomicBool::new(false)),
            temp_counter: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Directory holding the entries
    pub fn cache_dir(&self) -> &PathBuf {
        &self.cache_dir
    }

    /// Initialize the cache directory
    pub(crate) async fn ensure_initialized(&self) -> io::Result<()> {
        // Fast path - already initialized
        if self.initialized.load(Ordering::Acquire) {
            return Ok(());
        }

        // create_dir_all tolerates concurrent creation, so racing callers are harmless
        fs::create_dir_all(&self.cache_dir).await?;
        self.initialized.store(true, Ordering::Release);
        Ok(())
    }

    fn entry_path(&self, key: &ResourceKey) -> PathBuf {
        self.cache_dir.join(key.to_filename())
    }

    fn temp_path(&self, key: &ResourceKey) -> PathBuf {
        let n = self.temp_counter.fetch_add(1, Ordering::Relaxed);
        self.cache_dir.join(format!(
            "{}.{}.{n}.{TEMP_EXTENSION}",
            key.as_str(),
            std::process::id()
        ))
    }

    fn encode(entry: &CacheEntry) -> io::Result<Vec<u8>> {
        let header = serde_json::to_vec(&entry.metadata()).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Failed to serialize metadata: {e}"),
            )
        })?;

        let mut buf = Vec::with_capacity(header.len() + 1 + entry.body.len());
        buf.extend_from_slice(&header);
        buf.push(b'\n');
        buf.extend_from_slice(&entry.body);
        Ok(buf)
    }

    fn decode(raw: Vec<u8>) -> Option<CacheEntry> {
        let split = raw.iter().position(|b| *b == b'\n')?;
        let metadata: EntryMetadata = serde_json::from_slice(&raw[..split]).ok()?;

        let body = Bytes::from(raw).slice(split + 1..);
        if body.len() as u64 != metadata.size {
            return None;
        }

        Some(CacheEntry {
            validator: metadata.validator,
            body,
            stored_at: metadata.stored_at,
        })
    }

    fn is_entry_file(path: &std::path::Path) -> bool {
        path.extension().and_then(|e| e.to_str()) == Some(ENTRY_EXTENSION)
    }
}

#[async_trait::async_trait]
impl CacheProvider for FileStore {
    async fn get(&self, key: &ResourceKey) -> CacheResult<Option<CacheEntry>> {
        self.ensure_initialized().await?;

        let path = self.entry_path(key);
        let raw = match fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                warn!(path = ?path, error = %e, "Failed to read cache entry file");
                return Err(e);
            }
        };

        match Self::decode(raw) {
            Some(entry) => Ok(Some(entry)),
            None => {
                warn!(path = ?path, "Corrupt cache entry, discarding");
                // Delete invalid cache entry; a concurrent put may already have replaced it
                let _ = fs::remove_file(&path).await;
                Ok(None)
            }
        }
    }

    async fn put(&self, key: ResourceKey, entry: CacheEntry) -> CacheResult<()> {
        self.ensure_initialized().await?;

        let encoded = Self::encode(&entry)?;
        let path = self.entry_path(&key);
        let temp_path = self.temp_path(&key);

        if let Err(e) = fs::write(&temp_path, &encoded).await {
            warn!(path = ?temp_path, error = %e, "Failed to write cache entry file");
            let _ = fs::remove_file(&temp_path).await;
            return Err(e);
        }

        // Rename is atomic on the same filesystem, which is what makes `put` all-or-nothing
        if let Err(e) = fs::rename(&temp_path, &path).await {
            warn!(
                from = ?temp_path,
                to = ?path,
                error = %e,
                "Failed to rename temporary entry file"
            );
            let _ = fs::remove_file(&temp_path).await;
            return Err(e);
        }

        debug!(key = %key, size = entry.body.len(), "Persisted cache entry");
        Ok(())
    }

    async fn remove(&self, key: &ResourceKey) -> CacheResult<()> {
        self.ensure_initialized().await?;

        let path = self.entry_path(key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                warn!(path = ?path, error = %e, "Failed to remove cache entry file");
                Err(e)
            }
        }
    }

    async fn clear(&self) -> CacheResult<()> {
        self.ensure_initialized().await?;

        let mut entries = match fs::read_dir(&self.cache_dir).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = ?self.cache_dir, error = %e, "Failed to read cache directory");
                return Err(e);
            }
        };

        let mut entry_count = 0;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_temp = path.extension().and_then(|e| e.to_str()) == Some(TEMP_EXTENSION);
            if !Self::is_entry_file(&path) && !is_temp {
                continue;
            }

            if let Err(e) = fs::remove_file(&path).await {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!(path = ?path, error = %e, "Failed to remove cache file");
                }
            } else {
                entry_count += 1;
            }
        }

        debug!(count = entry_count, "Cleared cache entries");
        Ok(())
    }

    async fn len(&self) -> CacheResult<usize> {
        self.ensure_initialized().await?;

        let mut entries = fs::read_dir(&self.cache_dir).await?;
        let mut count = 0;
        while let Some(entry) = entries.next_entry().await? {
            if Self::is_entry_file(&entry.path()) {
                count += 1;
            }
        }
        Ok(count)
    }
}
