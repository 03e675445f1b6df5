//! Response cache with stale-while-revalidate support.
//!
//! Entries are JSON files named by the SHA-256 of their key. Each entry
//! records when it was written; on lookup its age decides whether it is
//! fresh, stale (still servable while a refresh runs), or gone.
//!
//! # Cache Location
//!
//! - Linux: `~/.cache/depwatch/`
//! - macOS: `~/Library/Caches/depwatch/`
//! - Windows: `%LOCALAPPDATA%\depwatch\`
//!
//! # Example
//!
//! ```no_run
//! use depwatch::cache::{derive_key, Cache, Lookup};
//! use depwatch::model::PackageQuery;
//! use std::time::Duration;
//!
//! let cache = Cache::new(Duration::from_secs(3600), Duration::from_secs(86400));
//! let key = derive_key(&[PackageQuery::new("lodash", "4.17.21")]);
//!
//! cache.set(&key, &"cached value".to_string()).unwrap();
//! assert!(matches!(cache.lookup::<String>(&key), Lookup::Fresh(_)));
//! ```

use crate::model::PackageQuery;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Namespace and schema tag prefixed to every response key.
const KEY_PREFIX: &str = "osv-vulns:v1:";

/// Key body used when the request names no packages at all.
const EMPTY_SENTINEL: &str = "__empty__";

/// Derives the response cache key for a package list.
///
/// The key ignores input order and exact duplicates but changes with any
/// (name, version) pair. Invalid entries are left out. An empty list gets
/// a sentinel key, distinct from a list whose entries were all invalid.
pub fn derive_key(queries: &[PackageQuery]) -> String {
    if queries.is_empty() {
        return format!("{}{}", KEY_PREFIX, EMPTY_SENTINEL);
    }

    let mut valid: Vec<&PackageQuery> = queries.iter().filter(|q| q.is_valid()).collect();
    valid.sort_by(|a, b| (&a.name, &a.version).cmp(&(&b.name, &b.version)));
    valid.dedup();

    let body: Vec<String> = valid.iter().map(|q| q.spec()).collect();
    format!("{}{}", KEY_PREFIX, body.join(","))
}

/// Result of a cache lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    /// Within the freshness window.
    Fresh(T),
    /// Past freshness but inside the stale window; serve and refresh.
    Stale(T),
    Miss,
}

#[derive(Serialize, Deserialize)]
struct Entry<T> {
    key: String,
    stored_at: DateTime<Utc>,
    value: T,
}

/// A file-based cache with a freshness window and a stale window.
pub struct Cache {
    dir: PathBuf,
    max_age: Duration,
    stale_while_revalidate: Duration,
}

impl Cache {
    /// Creates a cache in the platform cache directory.
    pub fn new(max_age: Duration, stale_while_revalidate: Duration) -> Self {
        Self::with_dir(default_dir(), max_age, stale_while_revalidate)
    }

    pub fn with_dir(
        dir: impl Into<PathBuf>,
        max_age: Duration,
        stale_while_revalidate: Duration,
    ) -> Self {
        Self {
            dir: dir.into(),
            max_age,
            stale_while_revalidate,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn ensure_dir(&self) -> Result<()> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir)?;
        }
        Ok(())
    }

    fn cache_path(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.dir.join(format!("{}.json", hex::encode(digest)))
    }

    /// Looks up `key`, classifying the entry by age.
    ///
    /// Entries past both windows are removed. Unreadable entries, and
    /// entries written for a different key, are misses.
    pub fn lookup<T: DeserializeOwned>(&self, key: &str) -> Lookup<T> {
        let path = self.cache_path(key);
        if !path.exists() {
            return Lookup::Miss;
        }

        let entry: Entry<T> = match read_entry(&path) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(path = %path.display(), "ignoring unreadable cache entry: {}", e);
                return Lookup::Miss;
            }
        };

        if entry.key != key {
            return Lookup::Miss;
        }

        // Clock skew can put stored_at in the future; treat that as fresh.
        let age = (Utc::now() - entry.stored_at).to_std().unwrap_or_default();

        if age <= self.max_age {
            Lookup::Fresh(entry.value)
        } else if age <= self.max_age.saturating_add(self.stale_while_revalidate) {
            Lookup::Stale(entry.value)
        } else {
            let _ = fs::remove_file(&path);
            Lookup::Miss
        }
    }

    /// Stores `value` under `key`, stamped with the current time.
    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.store(key, value, Utc::now())
    }

    fn store<T: Serialize>(&self, key: &str, value: &T, stored_at: DateTime<Utc>) -> Result<()> {
        self.ensure_dir()?;
        let entry = Entry {
            key: key.to_string(),
            stored_at,
            value,
        };
        fs::write(self.cache_path(key), serde_json::to_string(&entry)?)?;
        Ok(())
    }

    /// Removes all cached entries.
    pub fn clear(&self) -> Result<()> {
        if self.dir.exists() {
            for entry in fs::read_dir(&self.dir)?.flatten() {
                let path = entry.path();
                if path.extension().map(|e| e == "json").unwrap_or(false) {
                    let _ = fs::remove_file(path);
                }
            }
        }
        Ok(())
    }
}

fn read_entry<T: DeserializeOwned>(path: &Path) -> Result<Entry<T>> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Platform cache directory for depwatch.
pub fn default_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("depwatch")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn q(name: &str, version: &str) -> PackageQuery {
        PackageQuery::new(name, version)
    }

    fn cache(dir: &TempDir) -> Cache {
        Cache::with_dir(
            dir.path(),
            Duration::from_secs(60),
            Duration::from_secs(600),
        )
    }

    #[test]
    fn test_derive_key_format() {
        assert_eq!(
            derive_key(&[q("react", "18.2.0"), q("lodash", "4.17.21")]),
            "osv-vulns:v1:lodash@4.17.21,react@18.2.0"
        );
    }

    #[test]
    fn test_derive_key_order_independent() {
        let packages = vec![
            q("express", "4.18.2"),
            q("lodash", "4.17.21"),
            q("@babel/core", "7.24.0"),
            q("react", "18.2.0"),
        ];
        let expected = derive_key(&packages);

        let mut reversed = packages.clone();
        reversed.reverse();
        assert_eq!(derive_key(&reversed), expected);

        let mut rotated = packages.clone();
        rotated.rotate_left(2);
        assert_eq!(derive_key(&rotated), expected);
    }

    #[test]
    fn test_derive_key_same_name_different_versions_order_independent() {
        assert_eq!(
            derive_key(&[q("lodash", "4.17.21"), q("lodash", "4.17.20")]),
            derive_key(&[q("lodash", "4.17.20"), q("lodash", "4.17.21")])
        );
    }

    #[test]
    fn test_derive_key_sensitive_to_versions_and_names() {
        let base = derive_key(&[q("lodash", "4.17.21")]);
        assert_ne!(base, derive_key(&[q("lodash", "4.17.20")]));
        assert_ne!(base, derive_key(&[q("lodash-es", "4.17.21")]));
        assert_ne!(base, derive_key(&[q("lodash", "4.17.21"), q("react", "18.2.0")]));
    }

    #[test]
    fn test_derive_key_ignores_invalid_entries_and_duplicates() {
        assert_eq!(
            derive_key(&[q("lodash", "4.17.21"), q("", "1.0.0"), q("lodash", "4.17.21")]),
            derive_key(&[q("lodash", "4.17.21")])
        );
    }

    #[test]
    fn test_derive_key_empty_vs_all_invalid() {
        let empty = derive_key(&[]);
        let all_invalid = derive_key(&[q("", ""), q("react", "")]);

        assert_eq!(empty, "osv-vulns:v1:__empty__");
        assert_eq!(all_invalid, "osv-vulns:v1:");
        assert_ne!(empty, all_invalid);
    }

    #[test]
    fn test_set_then_fresh() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);

        cache.set("k", &vec![1, 2, 3]).unwrap();
        assert_eq!(cache.lookup::<Vec<u32>>("k"), Lookup::Fresh(vec![1, 2, 3]));
    }

    #[test]
    fn test_missing_key_is_miss() {
        let dir = TempDir::new().unwrap();
        assert_eq!(cache(&dir).lookup::<String>("absent"), Lookup::Miss);
    }

    #[test]
    fn test_stale_window() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);

        let stored_at = Utc::now() - chrono::Duration::seconds(120);
        cache.store("k", &"old".to_string(), stored_at).unwrap();

        assert_eq!(cache.lookup::<String>("k"), Lookup::Stale("old".to_string()));
    }

    #[test]
    fn test_expired_entry_is_removed() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);

        let stored_at = Utc::now() - chrono::Duration::seconds(3600);
        cache.store("k", &"ancient".to_string(), stored_at).unwrap();

        assert_eq!(cache.lookup::<String>("k"), Lookup::Miss);
        assert!(!cache.cache_path("k").exists());
    }

    #[test]
    fn test_corrupt_entry_is_miss() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);

        fs::write(cache.cache_path("k"), "not json").unwrap();
        assert_eq!(cache.lookup::<String>("k"), Lookup::Miss);
    }

    #[test]
    fn test_clear() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);

        cache.set("a", &1).unwrap();
        cache.set("b", &2).unwrap();
        cache.clear().unwrap();

        assert_eq!(cache.lookup::<u32>("a"), Lookup::Miss);
        assert_eq!(cache.lookup::<u32>("b"), Lookup::Miss);
    }

    #[test]
    fn test_unbounded_windows_do_not_overflow() {
        let dir = TempDir::new().unwrap();
        let stored_at = Utc::now() - chrono::Duration::seconds(120);

        let never_stale = Cache::with_dir(dir.path(), Duration::MAX, Duration::MAX);
        never_stale.store("k", &1, stored_at).unwrap();
        assert_eq!(never_stale.lookup::<u32>("k"), Lookup::Fresh(1));

        let never_expire = Cache::with_dir(dir.path(), Duration::from_secs(60), Duration::MAX);
        assert_eq!(never_expire.lookup::<u32>("k"), Lookup::Stale(1));
    }
}
