//! The source tree: all units of one build and the import graph between them.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::error::SourceError;
use crate::location::{Location, ResolvedLocation};
use crate::source_unit::SourceUnit;
use crate::unit_id::UnitId;

/// File extension of contract sources.
const SOURCE_EXT: &str = "sol";

/// An import that could not be located in the tree, the project root, or any
/// library directory. Left for the compiler to report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedImport {
    /// The importing unit.
    pub from: UnitId,
    /// The import path as written.
    pub import: String,
    /// The source-unit name the import resolved to, or the import as written
    /// if it leaves the project root.
    pub name: String,
}

/// Raw content of a unit about to be added to the tree.
struct LoadedSource {
    path: PathBuf,
    content: String,
    modified: Option<SystemTime>,
}

/// The set of source units participating in one build.
///
/// Targets are the units under the sources directory; they are what gets
/// compiled. Imported library files are loaded as non-target units so they can
/// be fed to the compiler and contribute to fingerprints. Edges point from the
/// importing unit to the imported one.
#[derive(Debug)]
pub struct SourceTree {
    root: PathBuf,
    units: Vec<SourceUnit>,
    by_name: HashMap<String, UnitId>,
    targets: Vec<UnitId>,
    graph: DiGraph<UnitId, ()>,
    deps: Vec<Vec<UnitId>>,
    unresolved: Vec<UnresolvedImport>,
}

impl SourceTree {
    fn empty(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            units: Vec::new(),
            by_name: HashMap::new(),
            targets: Vec::new(),
            graph: DiGraph::new(),
            deps: Vec::new(),
            unresolved: Vec::new(),
        }
    }

    /// Discovers and loads every source under `root/sources`, then follows
    /// imports into the project root and the given library directories.
    pub fn discover(
        root: &Path,
        sources: &Path,
        library_dirs: &[PathBuf],
    ) -> Result<Self, SourceError> {
        let sources_dir = root.join(sources);
        if !sources_dir.is_dir() {
            return Err(SourceError::MissingSourcesDir(sources_dir));
        }

        let mut files = Vec::new();
        walk_dir(&sources_dir, &mut files)?;
        files.sort();

        let mut tree = Self::empty(root);
        for path in files {
            let name = source_name(root, &path);
            let loaded = read_source(&path)?;
            let id = tree.push_unit(name, loaded);
            tree.targets.push(id);
        }

        let root = root.to_path_buf();
        tree.link(|name| locate(&root, library_dirs, name))?;
        tracing::debug!(
            units = tree.units.len(),
            targets = tree.targets.len(),
            unresolved = tree.unresolved.len(),
            "source tree discovered"
        );
        Ok(tree)
    }

    /// Builds a tree from in-memory `(name, content)` pairs. Every pair is a
    /// target; imports only resolve among the given names.
    pub fn from_sources<I, N, C>(root: &Path, sources: I) -> Self
    where
        I: IntoIterator<Item = (N, C)>,
        N: Into<String>,
        C: Into<String>,
    {
        let mut tree = Self::empty(root);
        for (name, content) in sources {
            let name = name.into();
            let loaded = LoadedSource {
                path: PathBuf::from(&name),
                content: content.into(),
                modified: None,
            };
            let id = tree.push_unit(name, loaded);
            tree.targets.push(id);
        }
        // The in-memory loader never fails.
        let _ = tree.link(|_| Ok(None));
        tree
    }

    fn push_unit(&mut self, name: String, loaded: LoadedSource) -> UnitId {
        let id = UnitId::from_raw(self.units.len() as u32);
        self.by_name.insert(name.clone(), id);
        self.units.push(SourceUnit::new(
            id,
            name,
            loaded.path,
            loaded.content,
            loaded.modified,
        ));
        self.graph.add_node(id);
        self.deps.push(Vec::new());
        id
    }

    /// Resolves the imports of every unit, loading newly discovered units
    /// through `load` until the tree is closed under imports.
    fn link<F>(&mut self, mut load: F) -> Result<(), SourceError>
    where
        F: FnMut(&str) -> Result<Option<LoadedSource>, SourceError>,
    {
        let mut queue: VecDeque<UnitId> = (0..self.units.len() as u32).map(UnitId::from_raw).collect();

        while let Some(from) = queue.pop_front() {
            let importer = self.units[from.index()].name.clone();
            let imports = self.units[from.index()].imports.clone();

            for import in imports {
                let Some(name) = resolve_import_name(&importer, &import) else {
                    tracing::debug!(%importer, %import, "import escapes the project root");
                    self.unresolved.push(UnresolvedImport {
                        from,
                        name: import.clone(),
                        import,
                    });
                    continue;
                };
                let to = match self.by_name.get(&name) {
                    Some(id) => *id,
                    None => match load(&name)? {
                        Some(loaded) => {
                            let id = self.push_unit(name.clone(), loaded);
                            queue.push_back(id);
                            id
                        }
                        None => {
                            tracing::debug!(%importer, %import, "unresolved import");
                            self.unresolved.push(UnresolvedImport {
                                from,
                                import,
                                name,
                            });
                            continue;
                        }
                    },
                };
                if to != from && !self.deps[from.index()].contains(&to) {
                    self.deps[from.index()].push(to);
                    self.graph.add_edge(
                        NodeIndex::new(from.index()),
                        NodeIndex::new(to.index()),
                        (),
                    );
                }
            }
        }
        Ok(())
    }

    /// Returns the project root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns every unit, targets and libraries alike.
    pub fn units(&self) -> &[SourceUnit] {
        &self.units
    }

    /// Returns the unit with the given id.
    ///
    /// # Panics
    ///
    /// Panics if the id does not belong to this tree.
    pub fn unit(&self, id: UnitId) -> &SourceUnit {
        &self.units[id.index()]
    }

    /// Looks up a unit by source-unit name.
    pub fn lookup(&self, name: &str) -> Option<&SourceUnit> {
        self.by_name.get(name).map(|id| self.unit(*id))
    }

    /// Returns the compile targets in discovery order (sorted by path).
    pub fn targets(&self) -> &[UnitId] {
        &self.targets
    }

    /// Returns the direct, resolved imports of a unit.
    pub fn dependencies(&self, id: UnitId) -> &[UnitId] {
        &self.deps[id.index()]
    }

    /// Returns every unit reachable through imports, excluding `id` itself,
    /// sorted by source-unit name.
    pub fn transitive_dependencies(&self, id: UnitId) -> Vec<UnitId> {
        let mut seen = vec![false; self.units.len()];
        seen[id.index()] = true;
        let mut queue: VecDeque<UnitId> = self.deps[id.index()].iter().copied().collect();
        let mut out = Vec::new();

        while let Some(next) = queue.pop_front() {
            if seen[next.index()] {
                continue;
            }
            seen[next.index()] = true;
            out.push(next);
            queue.extend(self.deps[next.index()].iter().copied());
        }

        out.sort_by(|a, b| self.unit(*a).name.cmp(&self.unit(*b).name));
        out
    }

    /// Returns the strongly connected components of the import graph,
    /// dependencies before dependents. Units within a component (an import
    /// cycle) are sorted by id.
    pub fn components(&self) -> Vec<Vec<UnitId>> {
        tarjan_scc(&self.graph)
            .into_iter()
            .map(|scc| {
                let mut ids: Vec<UnitId> = scc.into_iter().map(|n| self.graph[n]).collect();
                ids.sort();
                ids
            })
            .collect()
    }

    /// Returns the imports that could not be located.
    pub fn unresolved_imports(&self) -> &[UnresolvedImport] {
        &self.unresolved
    }

    /// Resolves a compiler location to line/column coordinates, or `None` if
    /// the named unit is not part of this tree.
    pub fn resolve_location(&self, location: &Location) -> Option<ResolvedLocation> {
        let unit = self.lookup(&location.source)?;
        let (start_line, start_col) = unit.line_col(location.start);
        let (end_line, end_col) =
            unit.line_col(location.end.saturating_sub(1).max(location.start));
        Some(ResolvedLocation {
            file_path: unit.path.clone(),
            start_line,
            start_col,
            end_line,
            end_col,
        })
    }
}

/// Resolves an import path against the importing unit's name.
///
/// Relative imports (`./`, `../`) are joined onto the importer's directory;
/// other imports start at the project root. `.` and `..` segments are folded
/// in both cases. Returns `None` for absolute paths and for names that climb
/// above the root.
pub fn resolve_import_name(importer: &str, import: &str) -> Option<String> {
    if Path::new(import).has_root() || Path::new(import).is_absolute() {
        return None;
    }
    let base = if import.starts_with("./") || import.starts_with("../") {
        importer.rsplit_once('/').map_or("", |(dir, _)| dir)
    } else {
        ""
    };
    let mut parts: Vec<&str> = base.split('/').filter(|p| !p.is_empty()).collect();
    for segment in import.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            s => parts.push(s),
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

/// Source-unit name of a file under the project root: its relative path with
/// forward slashes.
fn source_name(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn locate(
    root: &Path,
    library_dirs: &[PathBuf],
    name: &str,
) -> Result<Option<LoadedSource>, SourceError> {
    let candidates =
        std::iter::once(root.join(name)).chain(library_dirs.iter().map(|lib| root.join(lib).join(name)));
    for candidate in candidates {
        if candidate.is_file() {
            return read_source(&candidate).map(Some);
        }
    }
    Ok(None)
}

fn read_source(path: &Path) -> Result<LoadedSource, SourceError> {
    let content = std::fs::read_to_string(path).map_err(|e| SourceError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let modified = std::fs::metadata(path).and_then(|m| m.modified()).ok();
    Ok(LoadedSource {
        path: path.to_path_buf(),
        content,
        modified,
    })
}

fn walk_dir(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), SourceError> {
    let io_err = |e| SourceError::Io {
        path: dir.to_path_buf(),
        source: e,
    };
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_dir() {
            walk_dir(&path, files)?;
        } else if path.extension().and_then(|e| e.to_str()) == Some(SOURCE_EXT) {
            files.push(path);
        }
    }
    Ok(())
}
