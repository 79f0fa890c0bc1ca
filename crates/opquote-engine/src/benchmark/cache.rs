//! Benchmark profile cache
//!
//! Profiles arrive out-of-band from the benchmarking harness and are read on
//! every quote request. Readers receive an `Arc` snapshot; a concurrent `put`
//! installs a new `Arc` and never mutates a profile in place, so a racing
//! read sees either the old or the new profile in full.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use opquote_common::{BenchmarkProfile, OpQuoteError, Result};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

/// Store of benchmark profiles keyed by workload id
pub trait BenchmarkCache: Send + Sync {
    /// Get the current profile for a workload
    fn get(&self, workload_id: u64) -> Option<Arc<BenchmarkProfile>>;

    /// Install a profile, replacing any previous one for the same workload
    fn put(&self, profile: BenchmarkProfile);

    /// Drop the profile for a workload
    fn remove(&self, workload_id: u64) -> Option<Arc<BenchmarkProfile>>;

    /// Number of cached profiles
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory cache using DashMap
#[derive(Default)]
pub struct InMemoryBenchmarkCache {
    profiles: DashMap<u64, Arc<BenchmarkProfile>>,
}

impl InMemoryBenchmarkCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a cache pre-populated with profiles
    pub fn with_profiles(profiles: impl IntoIterator<Item = BenchmarkProfile>) -> Self {
        let cache = Self::new();
        for profile in profiles {
            cache.put(profile);
        }
        cache
    }

    /// Copy of every cached profile, ordered by workload id
    pub fn snapshot(&self) -> Vec<BenchmarkProfile> {
        let mut profiles: Vec<BenchmarkProfile> = self
            .profiles
            .iter()
            .map(|entry| entry.value().as_ref().clone())
            .collect();
        profiles.sort_by_key(|p| p.workload_id);
        profiles
    }
}

impl BenchmarkCache for InMemoryBenchmarkCache {
    fn get(&self, workload_id: u64) -> Option<Arc<BenchmarkProfile>> {
        self.profiles.get(&workload_id).map(|entry| entry.value().clone())
    }

    fn put(&self, profile: BenchmarkProfile) {
        let workload_id = profile.workload_id;
        let measured_at = profile.measured_at;
        let previous = self.profiles.insert(workload_id, Arc::new(profile));
        debug!(
            workload_id,
            measured_at,
            replaced = previous.is_some(),
            "Benchmark profile cached"
        );
    }

    fn remove(&self, workload_id: u64) -> Option<Arc<BenchmarkProfile>> {
        self.profiles.remove(&workload_id).map(|(_, profile)| profile)
    }

    fn len(&self) -> usize {
        self.profiles.len()
    }
}

/// Cache backed by a JSON snapshot file
///
/// Every mutation rewrites the snapshot through a temp file and a rename, so
/// a crash leaves either the previous or the new file on disk.
pub struct PersistentBenchmarkCache {
    inner: InMemoryBenchmarkCache,
    path: PathBuf,
    /// Serializes snapshot writes
    write_lock: Mutex<()>,
}

impl PersistentBenchmarkCache {
    /// Open the cache, loading any existing snapshot
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let profiles: Vec<BenchmarkProfile> = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                OpQuoteError::Storage(format!(
                    "Failed to parse benchmark snapshot {}: {}",
                    path.display(),
                    e
                ))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        info!(
            path = %path.display(),
            profiles = profiles.len(),
            "Opened benchmark cache"
        );

        Ok(Self {
            inner: InMemoryBenchmarkCache::with_profiles(profiles),
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the current contents to disk
    pub fn flush(&self) -> Result<()> {
        let _guard = self.write_lock.lock();

        let json = serde_json::to_vec_pretty(&self.inner.snapshot())?;
        let tmp = self.temp_path();
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Sibling of the snapshot with `.tmp` appended to the full file name
    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }

    fn flush_logged(&self) {
        if let Err(e) = self.flush() {
            warn!(path = %self.path.display(), error = %e, "Failed to persist benchmark cache");
        }
    }
}

impl BenchmarkCache for PersistentBenchmarkCache {
    fn get(&self, workload_id: u64) -> Option<Arc<BenchmarkProfile>> {
        self.inner.get(workload_id)
    }

    fn put(&self, profile: BenchmarkProfile) {
        self.inner.put(profile);
        self.flush_logged();
    }

    fn remove(&self, workload_id: u64) -> Option<Arc<BenchmarkProfile>> {
        let removed = self.inner.remove(workload_id);
        if removed.is_some() {
            self.flush_logged();
        }
        removed
    }

    fn len(&self) -> usize {
        self.inner.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opquote_common::ResourceKind;

    fn profile(workload_id: u64, cpu: u64) -> BenchmarkProfile {
        BenchmarkProfile::new(workload_id, 1_700_000_000).with_capability(ResourceKind::Cpu, cpu)
    }

    #[test]
    fn test_get_missing() {
        let cache = InMemoryBenchmarkCache::new();
        assert!(cache.get(1).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_put_replaces() {
        let cache = InMemoryBenchmarkCache::new();
        cache.put(profile(1, 4));
        let old = cache.get(1).unwrap();

        cache.put(profile(1, 16));
        let new = cache.get(1).unwrap();

        // Snapshot held by a reader is untouched by the replacement
        assert_eq!(old.capacity_for(ResourceKind::Cpu), Some(4));
        assert_eq!(new.capacity_for(ResourceKind::Cpu), Some(16));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_remove() {
        let cache = InMemoryBenchmarkCache::with_profiles([profile(1, 4), profile(2, 8)]);
        assert!(cache.remove(1).is_some());
        assert!(cache.remove(1).is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_concurrent_readers_see_whole_profiles() {
        let cache = Arc::new(InMemoryBenchmarkCache::new());
        cache.put(
            BenchmarkProfile::new(1, 0)
                .with_capability(ResourceKind::Cpu, 0)
                .with_capability(ResourceKind::Gpu, 0),
        );

        let writer = {
            let cache = cache.clone();
            std::thread::spawn(move || {
                for cpu in 1..=500u64 {
                    cache.put(
                        BenchmarkProfile::new(1, cpu)
                            .with_capability(ResourceKind::Cpu, cpu)
                            .with_capability(ResourceKind::Gpu, cpu),
                    );
                }
            })
        };

        for _ in 0..500 {
            let snapshot = cache.get(1).unwrap();
            // Every field of one profile comes from the same write
            assert_eq!(
                snapshot.capacity_for(ResourceKind::Cpu),
                snapshot.capacity_for(ResourceKind::Gpu)
            );
            assert_eq!(snapshot.capacity_for(ResourceKind::Cpu), Some(snapshot.measured_at));
        }
        writer.join().unwrap();
    }

    #[test]
    fn test_persistent_cache_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("benchmarks.json");

        {
            let cache = PersistentBenchmarkCache::open(&path).unwrap();
            assert!(cache.is_empty());
            cache.put(profile(3, 12));
            cache.put(profile(4, 2));
            cache.remove(4);
        }

        let reopened = PersistentBenchmarkCache::open(&path).unwrap();
        assert_eq!(reopened.len(), 1);
        assert_eq!(
            reopened.get(3).unwrap().capacity_for(ResourceKind::Cpu),
            Some(12)
        );
        assert!(!dir.path().join("benchmarks.json.tmp").exists());
    }

    #[test]
    fn test_flush_leaves_sibling_files_alone() {
        let dir = tempfile::tempdir().unwrap();
        let sibling = dir.path().join("benchmarks.tmp");
        std::fs::write(&sibling, b"unrelated").unwrap();

        let path = dir.path().join("benchmarks.json");
        PersistentBenchmarkCache::open(&path).unwrap().put(profile(3, 12));

        assert_eq!(std::fs::read(&sibling).unwrap(), b"unrelated");
        assert_eq!(PersistentBenchmarkCache::open(&path).unwrap().len(), 1);
    }

    #[test]
    fn test_snapshot_path_with_tmp_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("benchmarks.tmp");

        let cache = PersistentBenchmarkCache::open(&path).unwrap();
        cache.put(profile(3, 12));
        assert_eq!(cache.temp_path(), dir.path().join("benchmarks.tmp.tmp"));
        assert!(!cache.temp_path().exists());

        let reopened = PersistentBenchmarkCache::open(&path).unwrap();
        assert_eq!(reopened.get(3).unwrap().capacity_for(ResourceKind::Cpu), Some(12));
    }

    #[test]
    fn test_persistent_cache_rejects_corrupt_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("benchmarks.json");
        std::fs::write(&path, b"{not json").unwrap();

        assert!(matches!(
            PersistentBenchmarkCache::open(&path),
            Err(OpQuoteError::Storage(_))
        ));
    }
}
