//! Build fingerprints: the cache key of a compiled source unit.

use std::fmt;

use keel_common::{CompilerSettings, ContentHash, ContentHasher};
use keel_source::{SourceTree, SourceUnit};
use serde::{Deserialize, Serialize};

/// Bumped whenever the fingerprint layout changes.
const FINGERPRINT_SCHEME: u64 = 1;

/// Identity of a compilation result.
///
/// Derived from the unit's name and content, the compiler settings, and the
/// fingerprints of everything the unit imports. Two units with equal
/// fingerprints produce observably identical artifacts.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct Fingerprint(ContentHash);

impl Fingerprint {
    /// Wraps a raw content hash.
    pub fn from_hash(hash: ContentHash) -> Self {
        Self(hash)
    }

    /// Returns the underlying hash.
    pub fn as_hash(&self) -> &ContentHash {
        &self.0
    }

    /// Parses the 32-character hex form produced by `Display`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        ContentHash::from_hex(hex).map(Self)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Computes the fingerprint of one unit.
///
/// `deps` are the fingerprints of the unit's imports, in any order.
pub fn fingerprint(
    unit: &SourceUnit,
    settings: &CompilerSettings,
    deps: &[Fingerprint],
) -> Fingerprint {
    let mut deps = deps.to_vec();
    deps.sort();
    deps.dedup();

    let mut h = ContentHasher::new();
    h.tag("keel-fingerprint").u64(FINGERPRINT_SCHEME);
    h.tag("unit").str(&unit.name).hash(&unit.content_hash);
    hash_settings(&mut h, settings);
    h.tag("deps").u64(deps.len() as u64);
    for dep in &deps {
        h.hash(dep.as_hash());
    }
    Fingerprint(h.finish())
}

fn hash_settings(h: &mut ContentHasher, settings: &CompilerSettings) {
    h.tag("settings")
        .str(&settings.version)
        .bool(settings.optimizer_enabled)
        .u64(u64::from(settings.optimizer_runs))
        .opt_str(settings.evm_version.as_deref());
}

/// Computes fingerprints for every unit of a tree, indexed by
/// [`UnitId::index`](keel_source::UnitId::index).
///
/// Components are visited dependencies first. Units in an import cycle cannot
/// depend on each other's fingerprints, so each member of a cycle instead
/// depends on one shared component hash built from the members' names and
/// content hashes plus the fingerprints of everything the cycle imports from
/// outside.
pub fn fingerprint_tree(tree: &SourceTree, settings: &CompilerSettings) -> Vec<Fingerprint> {
    let mut fps: Vec<Option<Fingerprint>> = vec![None; tree.units().len()];

    for component in tree.components() {
        if let [id] = component.as_slice() {
            let deps: Vec<Fingerprint> = tree
                .dependencies(*id)
                .iter()
                .filter_map(|dep| fps[dep.index()])
                .collect();
            fps[id.index()] = Some(fingerprint(tree.unit(*id), settings, &deps));
            continue;
        }

        let mut external: Vec<Fingerprint> = component
            .iter()
            .flat_map(|id| tree.dependencies(*id))
            .filter(|dep| !component.contains(dep))
            .filter_map(|dep| fps[dep.index()])
            .collect();
        external.sort();
        external.dedup();

        let mut h = ContentHasher::new();
        h.tag("cycle").u64(component.len() as u64);
        for id in &component {
            let unit = tree.unit(*id);
            h.str(&unit.name).hash(&unit.content_hash);
        }
        h.tag("external").u64(external.len() as u64);
        for dep in &external {
            h.hash(dep.as_hash());
        }
        let shared = Fingerprint(h.finish());

        for id in &component {
            fps[id.index()] = Some(fingerprint(tree.unit(*id), settings, &[shared]));
        }
    }

    // Every unit belongs to exactly one component, so every slot is filled.
    fps.into_iter().flatten().collect()
}
