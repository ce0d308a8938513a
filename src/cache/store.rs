use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use super::entry::CacheEntry;

// About a century; keeps the chrono duration in range.
const MAX_SKEW_SECS: u64 = 3_153_600_000;

/// Read/write contract for the shared entity cache.
///
/// `get` never touches the network and a miss is not an error. `as_of` is the
/// most authoritative lifecycle timestamp the caller knows for the entity;
/// the backend decides from it whether a stored value can still be trusted.
pub trait Cacher: Send + Sync {
    fn get(&self, key: &str, as_of: DateTime<Utc>) -> Option<CacheEntry>;

    fn set(&self, key: &str, entry: &CacheEntry) -> Result<()>;
}

/// One JSON file per key.
///
/// An entry is trusted only if its file was written at or after `as_of`,
/// less `skew` for clock drift between this host and GitHub. A terminal
/// entity cached after it closed therefore stays a hit forever, while an
/// entry written before the entity's last change is always a miss.
#[derive(Debug, Clone)]
pub struct DiskCache {
    dir: PathBuf,
    skew: Duration,
}

impl DiskCache {
    pub fn new(dir: PathBuf, skew_secs: u64) -> Self {
        Self {
            dir,
            skew: Duration::seconds(skew_secs.min(MAX_SKEW_SECS) as i64),
        }
    }

    fn path_for_key(&self, key: &str) -> PathBuf {
        let safe_key: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{safe_key}.json"))
    }

    pub fn invalidate(&self, key: &str) -> Result<()> {
        let path = self.path_for_key(key);
        if path.exists() {
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to remove cache file: {}", path.display()))?;
            debug!(key = key, "Cache invalidated");
        }
        Ok(())
    }

    pub fn invalidate_all(&self) -> Result<()> {
        if self.dir.exists() {
            for entry in std::fs::read_dir(&self.dir)? {
                let entry = entry?;
                let path = entry.path();
                if path.extension().is_some_and(|ext| ext == "json") {
                    std::fs::remove_file(&path)?;
                }
            }
            debug!("All cache entries invalidated");
        }
        Ok(())
    }
}

impl Cacher for DiskCache {
    fn get(&self, key: &str, as_of: DateTime<Utc>) -> Option<CacheEntry> {
        let path = self.path_for_key(key);
        let content = std::fs::read_to_string(&path).ok()?;

        let entry: CacheEntry = match serde_json::from_str(&content) {
            Ok(e) => e,
            Err(e) => {
                warn!(key = key, error = %e, "Failed to parse cache entry");
                return None;
            }
        };

        let written: DateTime<Utc> = std::fs::metadata(&path)
            .and_then(|m| m.modified())
            .ok()?
            .into();
        if written + self.skew < as_of {
            debug!(key = key, %written, %as_of, "Cache entry predates last change");
            return None;
        }

        debug!(key = key, "Cache hit");
        Some(entry)
    }

    fn set(&self, key: &str, entry: &CacheEntry) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create cache directory: {}", self.dir.display()))?;

        let content = serde_json::to_string(entry).context("Failed to serialize cache entry")?;
        let path = self.path_for_key(key);
        // Write-then-rename so concurrent readers never see a partial file.
        let tmp = path.with_extension(format!("tmp{}", fastrand::u64(..)));
        std::fs::write(&tmp, content)
            .with_context(|| format!("Failed to write cache file: {}", tmp.display()))?;
        if let Err(e) = std::fs::rename(&tmp, &path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e)
                .with_context(|| format!("Failed to write cache file: {}", path.display()));
        }

        debug!(key = key, "Cache set");
        Ok(())
    }
}

/// Process-local cache. Entries are trusted unconditionally.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Cacher for MemoryCache {
    fn get(&self, key: &str, _as_of: DateTime<Utc>) -> Option<CacheEntry> {
        let entries = self.entries.read().ok()?;
        let hit = entries.get(key).cloned();
        if hit.is_some() {
            debug!(key = key, "Cache hit");
        }
        hit
    }

    fn set(&self, key: &str, entry: &CacheEntry) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| anyhow!("memory cache lock poisoned"))?;
        entries.insert(key.to_string(), entry.clone());
        debug!(key = key, "Cache set");
        Ok(())
    }
}
