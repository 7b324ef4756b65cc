//! The two-tier artifact cache.
//!
//! [`ArtifactCache`] ties together an in-memory LRU tier, the on-disk
//! [`ArtifactStore`], and the [`CacheManifest`]. It is the only mutable
//! structure shared between compile workers. Reads are fail-safe: a damaged
//! stored artifact is reported as a warning, dropped, and treated as a miss.

use std::any::Any;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use keel_diagnostics::{Category, Diagnostic, DiagnosticCode};
use lru::LruCache;

use crate::artifact::Artifact;
use crate::error::CacheError;
use crate::fingerprint::Fingerprint;
use crate::manifest::CacheManifest;
use crate::store::ArtifactStore;

/// Diagnostic code for a damaged stored artifact.
const CACHE_CORRUPTION: DiagnosticCode = DiagnosticCode {
    category: Category::Cache,
    number: 1,
};

/// Diagnostic code for a failed cache write.
const CACHE_WRITE_FAILED: DiagnosticCode = DiagnosticCode {
    category: Category::Cache,
    number: 2,
};

/// Bounds on what the cache keeps. Unbounded by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvictionPolicy {
    /// Maximum number of stored artifacts, enforced least-recently-used on
    /// every insert.
    pub max_entries: Option<usize>,
    /// Maximum time an artifact may go unused, enforced by
    /// [`flush`](ArtifactCache::flush) and [`gc`](ArtifactCache::gc).
    pub max_age: Option<Duration>,
}

/// Where a cached artifact came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// The in-memory tier.
    Memory,
    /// The on-disk store.
    Disk,
    /// Another caller compiled it while this caller waited.
    Coalesced,
    /// This caller compiled it.
    Compiled,
}

impl Origin {
    /// Returns `true` if no compilation ran on behalf of this caller.
    pub fn is_hit(self) -> bool {
        !matches!(self, Origin::Compiled)
    }
}

/// Result of [`ArtifactCache::get_or_compile`].
#[derive(Debug, Clone)]
pub struct CacheOutcome {
    /// The artifact.
    pub artifact: Arc<Artifact>,
    /// Where the artifact came from.
    pub origin: Origin,
    /// Warnings raised along the way (corrupt entries, failed writes).
    pub warnings: Vec<Diagnostic>,
}

/// A compilation error that callers waiting on the same fingerprint can
/// receive in place of compiling again.
pub trait SharedFailure: Clone + Send + Sync + 'static {
    /// Returns `true` if the failure belongs to the leader's run alone, such
    /// as a cancellation. Waiters then elect a new leader instead.
    fn is_transient(&self) -> bool {
        false
    }
}

/// What a finished leader left for its waiters.
#[derive(Clone)]
enum Landing {
    Built(Arc<Artifact>),
    /// A shareable failure, downcast by waiters to their error type.
    Failed(Arc<dyn Any + Send + Sync>),
    /// Cancelled, panicked, or resolved without compiling.
    Abandoned,
}

/// One in-flight compilation that other callers can wait on.
struct Flight {
    done: Mutex<Option<Landing>>,
    ready: Condvar,
}

impl Flight {
    fn new() -> Self {
        Self {
            done: Mutex::new(None),
            ready: Condvar::new(),
        }
    }

    /// Blocks until the leader finishes.
    fn wait(&self) -> Landing {
        let mut done = self.done.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(result) = done.as_ref() {
                return result.clone();
            }
            done = self
                .ready
                .wait(done)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Leader side of a flight. Publishes its result and unregisters the flight
/// when dropped, so waiters are released even if the compile function panics.
struct FlightGuard<'a> {
    cache: &'a ArtifactCache,
    fp: Fingerprint,
    flight: Arc<Flight>,
    result: Landing,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.cache
            .flights()
            .remove(&self.fp);
        let mut done = self
            .flight
            .done
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *done = Some(std::mem::replace(&mut self.result, Landing::Abandoned));
        self.flight.ready.notify_all();
    }
}

struct Tiers {
    memory: LruCache<Fingerprint, Arc<Artifact>>,
    manifest: CacheManifest,
}

/// Fingerprint-keyed artifact cache with an in-memory and an on-disk tier.
///
/// Lifecycle: [`open`](Self::open) at process start, [`flush`](Self::flush)
/// at the end of every run, [`clear`](Self::clear) only on explicit request.
pub struct ArtifactCache {
    dir: PathBuf,
    version: String,
    store: ArtifactStore,
    policy: EvictionPolicy,
    tiers: Mutex<Tiers>,
    in_flight: Mutex<HashMap<Fingerprint, Arc<Flight>>>,
}

impl ArtifactCache {
    /// Opens the cache in `dir`, loading its manifest if it was written by
    /// the same Keel version. Never fails: an unreadable or incompatible
    /// manifest starts the cache empty.
    pub fn open(dir: &Path, version: &str, policy: EvictionPolicy) -> Self {
        let manifest = CacheManifest::load(dir)
            .filter(|m| m.is_compatible(version))
            .unwrap_or_else(|| CacheManifest::new(version));
        tracing::debug!(
            dir = %dir.display(),
            entries = manifest.entries.len(),
            "opened artifact cache"
        );

        let memory = match policy.max_entries.and_then(NonZeroUsize::new) {
            Some(cap) => LruCache::new(cap),
            None => LruCache::unbounded(),
        };

        Self {
            dir: dir.to_path_buf(),
            version: version.to_string(),
            store: ArtifactStore::new(dir, version),
            policy,
            tiers: Mutex::new(Tiers { memory, manifest }),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    fn tiers(&self) -> MutexGuard<'_, Tiers> {
        self.tiers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn flights(&self) -> MutexGuard<'_, HashMap<Fingerprint, Arc<Flight>>> {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the number of indexed artifacts.
    pub fn len(&self) -> usize {
        self.tiers().manifest.entries.len()
    }

    /// Returns `true` if no artifacts are indexed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the artifact stored under `fp`, checking memory then disk.
    ///
    /// A damaged disk entry is removed and reported as a miss.
    pub fn get(&self, fp: &Fingerprint) -> Option<Arc<Artifact>> {
        let mut warnings = Vec::new();
        self.lookup(fp, &mut warnings).map(|(artifact, _)| artifact)
    }

    fn lookup(
        &self,
        fp: &Fingerprint,
        warnings: &mut Vec<Diagnostic>,
    ) -> Option<(Arc<Artifact>, Origin)> {
        let now = unix_now();
        {
            let mut tiers = self.tiers();
            if let Some(artifact) = tiers.memory.get(fp).cloned() {
                tiers.manifest.touch_existing(fp, now);
                tracing::debug!(%fp, source = %artifact.source, "memory cache hit");
                return Some((artifact, Origin::Memory));
            }
        }

        match self.store.read(fp) {
            Ok(Some(artifact)) => {
                let artifact = Arc::new(artifact);
                let mut tiers = self.tiers();
                tiers.memory.put(*fp, Arc::clone(&artifact));
                let names = artifact.contract_names();
                tiers.manifest.touch(*fp, &artifact.source, names, now);
                tracing::debug!(%fp, source = %artifact.source, "disk cache hit");
                Some((artifact, Origin::Disk))
            }
            Ok(None) => {
                tracing::debug!(%fp, "cache miss");
                None
            }
            Err(err) => {
                if err.is_corruption() {
                    tracing::warn!(%fp, error = %err, "corrupt cache entry");
                    warnings.push(
                        Diagnostic::warning(
                            CACHE_CORRUPTION,
                            format!("discarding corrupt cache entry {fp}"),
                        )
                        .with_note(err.to_string()),
                    );
                } else {
                    tracing::debug!(%fp, error = %err, "unusable cache entry");
                }
                self.evict(fp);
                None
            }
        }
    }

    /// Stores an artifact under `fp` in both tiers.
    pub fn put(&self, fp: Fingerprint, artifact: Artifact) -> Result<Arc<Artifact>, CacheError> {
        let artifact = Arc::new(artifact);
        self.insert(fp, Arc::clone(&artifact))?;
        Ok(artifact)
    }

    fn insert(&self, fp: Fingerprint, artifact: Arc<Artifact>) -> Result<(), CacheError> {
        let write = self.store.write(&fp, &artifact);

        let evicted = {
            let mut tiers = self.tiers();
            tiers.memory.put(fp, Arc::clone(&artifact));
            if write.is_ok() {
                let names = artifact.contract_names();
                tiers.manifest.touch(fp, &artifact.source, names, unix_now());
            }
            match self.policy.max_entries {
                Some(max) => {
                    let evicted = tiers.manifest.over_capacity(max);
                    for old in &evicted {
                        tiers.manifest.remove(old);
                        tiers.memory.pop(old);
                    }
                    evicted
                }
                None => Vec::new(),
            }
        };

        for old in &evicted {
            tracing::debug!(fp = %old, "evicted least recently used artifact");
            if let Err(err) = self.store.remove(old) {
                tracing::warn!(fp = %old, error = %err, "failed to remove evicted artifact");
            }
        }

        write
    }

    /// Returns the artifact for `fp`, compiling it with `compile` on a miss.
    ///
    /// At most one compilation per fingerprint is in flight at any time:
    /// the first caller to miss becomes the leader and runs `compile`; other
    /// callers for the same fingerprint block until it finishes and share its
    /// artifact, or its error. Failed compilations are never cached. When the
    /// leader's failure is [transient](SharedFailure::is_transient) or it
    /// panics, one of the waiters becomes the next leader.
    pub fn get_or_compile<E, F>(&self, fp: Fingerprint, compile: F) -> Result<CacheOutcome, E>
    where
        E: SharedFailure,
        F: FnOnce() -> Result<Artifact, E>,
    {
        let mut warnings = Vec::new();
        let mut compile = Some(compile);

        loop {
            if let Some((artifact, origin)) = self.lookup(&fp, &mut warnings) {
                return Ok(CacheOutcome {
                    artifact,
                    origin,
                    warnings,
                });
            }

            let (flight, leader) = {
                let mut flights = self.flights();
                match flights.get(&fp) {
                    Some(flight) => (Arc::clone(flight), false),
                    None => {
                        let flight = Arc::new(Flight::new());
                        flights.insert(fp, Arc::clone(&flight));
                        (flight, true)
                    }
                }
            };

            if !leader {
                tracing::debug!(%fp, "waiting on in-flight compilation");
                match flight.wait() {
                    Landing::Built(artifact) => {
                        return Ok(CacheOutcome {
                            artifact,
                            origin: Origin::Coalesced,
                            warnings,
                        })
                    }
                    Landing::Failed(failure) => {
                        if let Some(err) = failure.downcast_ref::<E>() {
                            tracing::debug!(%fp, "sharing failed compilation");
                            return Err(err.clone());
                        }
                        continue;
                    }
                    Landing::Abandoned => continue,
                }
            }

            let mut guard = FlightGuard {
                cache: self,
                fp,
                flight,
                result: Landing::Abandoned,
            };

            // A previous leader may have finished between the lookup and
            // the registration above.
            if let Some((artifact, origin)) = self.lookup(&fp, &mut warnings) {
                guard.result = Landing::Built(Arc::clone(&artifact));
                return Ok(CacheOutcome {
                    artifact,
                    origin,
                    warnings,
                });
            }

            let Some(compile) = compile.take() else {
                // Only a leader consumes the closure, and a leader always returns.
                unreachable!("compile function consumed twice");
            };
            let artifact = match compile() {
                Ok(artifact) => Arc::new(artifact),
                Err(err) => {
                    if !err.is_transient() {
                        guard.result = Landing::Failed(Arc::new(err.clone()));
                    }
                    return Err(err);
                }
            };

            if let Err(err) = self.insert(fp, Arc::clone(&artifact)) {
                tracing::warn!(%fp, error = %err, "failed to store artifact");
                warnings.push(
                    Diagnostic::warning(
                        CACHE_WRITE_FAILED,
                        format!("could not store artifact for {}", artifact.source),
                    )
                    .with_note(err.to_string()),
                );
            }
            guard.result = Landing::Built(Arc::clone(&artifact));

            return Ok(CacheOutcome {
                artifact,
                origin: Origin::Compiled,
                warnings,
            });
        }
    }

    /// Drops an entry from every tier.
    pub fn evict(&self, fp: &Fingerprint) {
        {
            let mut tiers = self.tiers();
            tiers.memory.pop(fp);
            tiers.manifest.remove(fp);
        }
        if let Err(err) = self.store.remove(fp) {
            tracing::warn!(%fp, error = %err, "failed to remove cache entry");
        }
    }

    fn evict_expired(&self, now: u64) -> usize {
        let Some(max_age) = self.policy.max_age else {
            return 0;
        };
        let expired = self.tiers().manifest.expired(now, max_age.as_secs());
        for fp in &expired {
            tracing::debug!(%fp, "evicted expired artifact");
            self.evict(fp);
        }
        expired.len()
    }

    /// Applies age eviction and persists the manifest. Called at the end of
    /// every run. Returns the number of evicted entries.
    pub fn flush(&self) -> Result<usize, CacheError> {
        let evicted = self.evict_expired(unix_now());
        self.tiers().manifest.save(&self.dir)?;
        Ok(evicted)
    }

    /// Applies age eviction and deletes every stored file the manifest does
    /// not index. Returns the number of files removed.
    pub fn gc(&self) -> Result<usize, CacheError> {
        let expired = self.evict_expired(unix_now());
        let tiers = self.tiers();
        let stray = self.store.gc(|fp| tiers.manifest.contains(fp))?;
        tiers.manifest.save(&self.dir)?;
        Ok(expired + stray)
    }

    /// Empties both tiers and deletes the cache directory.
    pub fn clear(&self) -> Result<(), CacheError> {
        let mut tiers = self.tiers();
        tiers.memory.clear();
        tiers.manifest = CacheManifest::new(&self.version);
        match std::fs::remove_dir_all(&self.dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::Io {
                path: self.dir.clone(),
                source: e,
            }),
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}
