//! Fingerprinting and artifact reuse across builds.

use std::path::Path;
use std::time::Duration;

use keel_cache::{fingerprint_tree, ArtifactCache, EvictionPolicy, Origin};
use keel_common::{CancellationToken, CompilerSettings};
use keel_compiler::{dependency_units, CompileFailure, CompileJob, Compiler};
use keel_conformance::{mock_artifact, MockCompiler, Project};
use keel_source::SourceTree;

const TOKEN: &str = "import \"./Math.sol\";\ncontract Token {}\n";
const MATH: &str = "library Math {}\n";
const VAULT: &str = "contract Vault {}\n";

fn token_project(extra: &str) -> Project {
    let project = Project::with_config(extra);
    project
        .write("contracts/Token.sol", TOKEN)
        .write("contracts/Math.sol", MATH)
        .write("contracts/Vault.sol", VAULT);
    project
}

fn tree(sources: &[(&str, &str)]) -> SourceTree {
    SourceTree::from_sources(Path::new("/project"), sources.iter().copied())
}

#[test]
fn fingerprints_are_deterministic() {
    let settings = CompilerSettings::new("0.8.6");
    let sources = [("contracts/Token.sol", TOKEN), ("contracts/Math.sol", MATH)];
    assert_eq!(
        fingerprint_tree(&tree(&sources), &settings),
        fingerprint_tree(&tree(&sources), &settings)
    );
}

#[test]
fn settings_and_imports_change_fingerprints() {
    let sources = [("contracts/Token.sol", TOKEN), ("contracts/Math.sol", MATH)];
    let base = fingerprint_tree(&tree(&sources), &CompilerSettings::new("0.8.6"));

    let optimized = fingerprint_tree(
        &tree(&sources),
        &CompilerSettings::new("0.8.6").with_optimizer(200),
    );
    assert_ne!(base[0], optimized[0]);
    assert_ne!(base[1], optimized[1]);

    // Editing an import changes the importer too.
    let edited = [
        ("contracts/Token.sol", TOKEN),
        ("contracts/Math.sol", "library Math { }\n"),
    ];
    let after = fingerprint_tree(&tree(&edited), &CompilerSettings::new("0.8.6"));
    assert_ne!(base[0], after[0]);
    assert_ne!(base[1], after[1]);
}

#[test]
fn second_unchanged_build_compiles_nothing() {
    let project = token_project("");
    let compiler = MockCompiler::new();

    let first = project.build(&compiler);
    assert!(first.is_success());
    assert_eq!(compiler.calls(), 3);

    compiler.reset();
    let second = project.build(&compiler);
    assert!(second.is_success());
    assert_eq!(compiler.calls(), 0);
    assert_eq!(second.stats.disk_hits, 3);
    assert_eq!(second.contract_names(), first.contract_names());
}

#[test]
fn in_process_rebuild_uses_memory_tier() {
    let project = token_project("");
    let compiler = MockCompiler::new();
    let pipeline = project.pipeline(&compiler);

    pipeline.run(&CancellationToken::new()).unwrap();
    let second = pipeline.run(&CancellationToken::new()).unwrap();
    assert_eq!(compiler.calls(), 3);
    assert_eq!(second.stats.memory_hits, 3);
}

#[test]
fn cached_artifacts_equal_fresh_compilation() {
    let project = token_project("[compiler.optimizer]\nenabled = true\nruns = 500\n");
    let compiler = MockCompiler::new();
    project.build(&compiler);

    let cached = project.build(&compiler);
    assert_eq!(cached.stats.cache_hits(), 3);

    let settings = project.config().compiler_settings();
    let tree = cached.tree.as_ref().unwrap();
    for artifact in &cached.artifacts {
        let unit = tree.lookup(&artifact.source).unwrap();
        let fresh = mock_artifact(unit, &settings).unwrap();
        assert_eq!(**artifact, fresh, "{} differs from a fresh build", artifact.source);
    }
}

#[test]
fn optimizer_runs_change_recompiles_everything() {
    let project = token_project("[compiler.optimizer]\nenabled = true\nruns = 200\n");
    let compiler = MockCompiler::new();
    project.build(&compiler);

    project.set_config("[compiler.optimizer]\nenabled = true\nruns = 1000\n");
    compiler.reset();
    let report = project.build(&compiler);
    assert_eq!(compiler.calls(), 3);
    assert_eq!(report.stats.compiled, 3);
    assert_eq!(report.stats.cache_hits(), 0);

    let bytecode = &report.artifacts[0].contracts[0].bytecode;
    assert!(bytecode.ends_with(&format!("{:08x}", 1000)));
}

#[test]
fn editing_a_dependency_recompiles_its_importers_only() {
    let project = token_project("");
    let compiler = MockCompiler::new();
    project.build(&compiler);

    project.write("contracts/Math.sol", "library Math {}\n// touched\n");
    compiler.reset();
    project.build(&compiler);
    let mut compiled = compiler.compiled();
    compiled.sort();
    assert_eq!(compiled, vec!["contracts/Math.sol", "contracts/Token.sol"]);

    project.write("contracts/Token.sol", "import \"./Math.sol\";\ncontract Token { }\n");
    compiler.reset();
    project.build(&compiler);
    assert_eq!(compiler.compiled(), vec!["contracts/Token.sol"]);
}

#[test]
fn concurrent_requests_share_one_compilation() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ArtifactCache::open(dir.path(), "test", EvictionPolicy::default());
    let settings = CompilerSettings::new("0.8.6");
    let tree = tree(&[("contracts/Vault.sol", VAULT)]);
    let id = tree.targets()[0];
    let fp = fingerprint_tree(&tree, &settings)[id.index()];
    let compiler = MockCompiler::with_delay(Duration::from_millis(50));
    let cancel = CancellationToken::new();

    let outcomes: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                s.spawn(|| {
                    cache.get_or_compile(fp, || {
                        let deps = dependency_units(&tree, id);
                        let job = CompileJob {
                            target: tree.unit(id),
                            dependencies: &deps,
                            settings: &settings,
                        };
                        compiler.compile(&job, &cancel)
                    })
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect()
    });

    assert_eq!(compiler.calls(), 1);
    assert_eq!(
        outcomes.iter().filter(|o| o.origin == Origin::Compiled).count(),
        1
    );
    for outcome in &outcomes {
        assert_eq!(outcome.artifact, outcomes[0].artifact);
    }
}

#[test]
fn concurrent_failures_share_one_compilation() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ArtifactCache::open(dir.path(), "test", EvictionPolicy::default());
    let settings = CompilerSettings::new("0.8.6");
    let tree = tree(&[("contracts/Broken.sol", "contract Broken { // @error\n}\n")]);
    let id = tree.targets()[0];
    let fp = fingerprint_tree(&tree, &settings)[id.index()];
    let compiler = MockCompiler::with_delay(Duration::from_millis(50));
    let cancel = CancellationToken::new();

    let errors: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..6)
            .map(|_| {
                s.spawn(|| {
                    cache.get_or_compile(fp, || {
                        let deps = dependency_units(&tree, id);
                        let job = CompileJob {
                            target: tree.unit(id),
                            dependencies: &deps,
                            settings: &settings,
                        };
                        compiler.compile(&job, &cancel)
                    })
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap_err())
            .collect()
    });

    assert_eq!(compiler.calls(), 1);
    for err in &errors {
        match err {
            CompileFailure::Diagnostics(e) => assert_eq!(e.source_name, "contracts/Broken.sol"),
            other => panic!("unexpected failure: {other}"),
        }
    }
    assert!(cache.get(&fp).is_none());
}

#[test]
fn corrupt_cache_entries_are_recompiled() {
    let project = token_project("");
    let compiler = MockCompiler::new();
    project.build(&compiler);

    let cache_dir = project.path("cache");
    for entry in walk(&cache_dir) {
        if entry.extension().is_some_and(|e| e != "json") {
            std::fs::write(&entry, b"garbage").unwrap();
        }
    }

    compiler.reset();
    let report = project.build(&compiler);
    assert!(report.is_success());
    assert_eq!(compiler.calls(), 3);
    assert!(report.warning_count() >= 1);
}

fn walk(dir: &Path) -> Vec<std::path::PathBuf> {
    let mut out = Vec::new();
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                out.extend(walk(&path));
            } else {
                out.push(path);
            }
        }
    }
    out
}
