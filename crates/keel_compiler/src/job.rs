//! A single compilation request.

use keel_common::CompilerSettings;
use keel_source::{SourceTree, SourceUnit, UnitId};

/// Everything a compiler needs to compile one target unit: the unit itself,
/// every unit it transitively imports, and the settings snapshot.
#[derive(Debug, Clone, Copy)]
pub struct CompileJob<'a> {
    /// The unit being compiled.
    pub target: &'a SourceUnit,
    /// Transitive imports, sorted by source-unit name.
    pub dependencies: &'a [&'a SourceUnit],
    /// Compiler settings for the whole build.
    pub settings: &'a CompilerSettings,
}

impl<'a> CompileJob<'a> {
    /// Returns the target followed by its dependencies.
    pub fn sources(&self) -> impl Iterator<Item = &'a SourceUnit> + 'a {
        std::iter::once(self.target).chain(self.dependencies.iter().copied())
    }
}

/// Collects the transitive imports of `id` for a [`CompileJob`].
pub fn dependency_units(tree: &SourceTree, id: UnitId) -> Vec<&SourceUnit> {
    tree.transitive_dependencies(id)
        .into_iter()
        .map(|dep| tree.unit(dep))
        .collect()
}
