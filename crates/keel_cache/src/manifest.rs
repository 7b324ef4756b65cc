//! Cache manifest indexing the artifacts held on disk.
//!
//! The manifest is stored as `manifest.json` in the cache directory. It maps
//! each stored fingerprint to the unit it was compiled from, the contracts it
//! holds, and when it was last used, which drives age and count eviction.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CacheError;
use crate::fingerprint::Fingerprint;

/// Name of the manifest file within the cache directory.
const MANIFEST_FILE: &str = "manifest.json";

/// Top-level cache manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheManifest {
    /// Keel version that produced this cache. Invalidate on version change.
    pub keel_version: String,

    /// Monotonic use counter, ordering uses within the same second.
    pub tick: u64,

    /// Stored artifacts keyed by fingerprint hex.
    pub entries: BTreeMap<String, ManifestEntry>,
}

/// Index record for one stored artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Source-unit name the artifact was compiled from.
    pub source: String,

    /// Contract names held by the artifact.
    pub contracts: Vec<String>,

    /// Unix time (seconds) of the last read or write.
    pub last_used: u64,

    /// Value of the manifest tick at the last read or write.
    pub last_tick: u64,
}

impl CacheManifest {
    /// Creates a new, empty manifest for the given Keel version.
    pub fn new(keel_version: &str) -> Self {
        Self {
            keel_version: keel_version.to_string(),
            tick: 0,
            entries: BTreeMap::new(),
        }
    }

    /// Loads the manifest from the cache directory, returning `None` if
    /// the file doesn't exist or can't be parsed.
    ///
    /// This is fail-safe: any error results in `None`, and artifacts not
    /// listed in a manifest are still found on disk by fingerprint.
    pub fn load(cache_dir: &Path) -> Option<Self> {
        let path = cache_dir.join(MANIFEST_FILE);
        let content = std::fs::read_to_string(&path).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Saves the manifest to the cache directory.
    ///
    /// Creates the cache directory if it doesn't exist.
    pub fn save(&self, cache_dir: &Path) -> Result<(), CacheError> {
        std::fs::create_dir_all(cache_dir).map_err(|e| CacheError::Io {
            path: cache_dir.to_path_buf(),
            source: e,
        })?;
        let path = cache_dir.join(MANIFEST_FILE);
        let json = serde_json::to_string_pretty(self).map_err(|e| CacheError::Serialization {
            reason: e.to_string(),
        })?;
        std::fs::write(&path, json).map_err(|e| CacheError::Io { path, source: e })
    }

    /// Returns `true` if this manifest was produced by a compatible Keel version.
    pub fn is_compatible(&self, current_version: &str) -> bool {
        self.keel_version == current_version
    }

    /// Records a use of `fp` at `now`, inserting the entry if needed.
    pub fn touch(&mut self, fp: Fingerprint, source: &str, contracts: Vec<String>, now: u64) {
        self.tick += 1;
        let tick = self.tick;
        let entry = self.entries.entry(fp.to_string()).or_insert_with(|| ManifestEntry {
            source: source.to_string(),
            contracts,
            last_used: now,
            last_tick: tick,
        });
        entry.last_used = now;
        entry.last_tick = tick;
    }

    /// Records a use of an already-indexed fingerprint. Returns `false` if
    /// the fingerprint is not indexed.
    pub fn touch_existing(&mut self, fp: &Fingerprint, now: u64) -> bool {
        self.tick += 1;
        let tick = self.tick;
        match self.entries.get_mut(&fp.to_string()) {
            Some(entry) => {
                entry.last_used = now;
                entry.last_tick = tick;
                true
            }
            None => false,
        }
    }

    /// Returns the fingerprints unused for longer than `max_age_secs`.
    pub fn expired(&self, now: u64, max_age_secs: u64) -> Vec<Fingerprint> {
        self.entries
            .iter()
            .filter(|(_, e)| now.saturating_sub(e.last_used) > max_age_secs)
            .filter_map(|(key, _)| Fingerprint::from_hex(key))
            .collect()
    }

    /// Returns the least recently used fingerprints beyond the first
    /// `max_entries` most recently used.
    pub fn over_capacity(&self, max_entries: usize) -> Vec<Fingerprint> {
        if self.entries.len() <= max_entries {
            return Vec::new();
        }
        let mut by_use: Vec<(&String, &ManifestEntry)> = self.entries.iter().collect();
        by_use.sort_by_key(|(_, e)| (e.last_used, e.last_tick));
        let excess = self.entries.len() - max_entries;
        by_use
            .into_iter()
            .take(excess)
            .filter_map(|(key, _)| Fingerprint::from_hex(key))
            .collect()
    }

    /// Returns the index record for a fingerprint.
    pub fn get(&self, fp: &Fingerprint) -> Option<&ManifestEntry> {
        self.entries.get(&fp.to_string())
    }

    /// Drops the index record for a fingerprint.
    pub fn remove(&mut self, fp: &Fingerprint) -> Option<ManifestEntry> {
        self.entries.remove(&fp.to_string())
    }

    /// Returns `true` if the fingerprint is indexed.
    pub fn contains(&self, fp: &Fingerprint) -> bool {
        self.entries.contains_key(&fp.to_string())
    }
}
