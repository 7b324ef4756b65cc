//! Writing compiled contracts to the artifacts directory.
//!
//! Each contract becomes `<artifacts>/<source>/<Contract>.json`, pretty-printed
//! with sorted keys so identical builds produce identical files. Files from
//! earlier builds that the current build did not produce are removed.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use keel_cache::{Artifact, CompiledContract};
use keel_common::CompilerSettings;
use serde_json::{json, Value};

use crate::error::PipelineError;

/// Path of a contract's artifact file under `dir`.
pub fn artifact_path(dir: &Path, source: &str, contract: &str) -> PathBuf {
    dir.join(source).join(format!("{contract}.json"))
}

/// Writes every contract of `artifacts` under `dir` and prunes stale
/// artifact files. Returns the written paths in compile order.
pub fn write_artifacts(
    dir: &Path,
    artifacts: &[Arc<Artifact>],
    settings: &CompilerSettings,
) -> Result<Vec<PathBuf>, PipelineError> {
    let mut written = Vec::new();
    for artifact in artifacts {
        for contract in &artifact.contracts {
            let path = artifact_path(dir, &artifact.source, &contract.name);
            let text = render(contract, settings);
            if std::fs::read_to_string(&path).ok().as_deref() != Some(text.as_str()) {
                write_file(&path, &text)?;
            }
            written.push(path);
        }
    }

    let keep: HashSet<&Path> = written.iter().map(PathBuf::as_path).collect();
    let removed = prune(dir, &keep)?;
    tracing::debug!(
        dir = %dir.display(),
        written = written.len(),
        removed,
        "artifacts written"
    );
    Ok(written)
}

fn render(contract: &CompiledContract, settings: &CompilerSettings) -> String {
    let value = json!({
        "contractName": contract.name,
        "sourceName": contract.source,
        "abi": parse_json(&contract.abi),
        "bytecode": hex(&contract.bytecode),
        "deployedBytecode": hex(&contract.deployed_bytecode),
        "devdoc": parse_json(&contract.devdoc),
        "userdoc": parse_json(&contract.userdoc),
        "compiler": {
            "version": settings.version,
            "optimizer": {
                "enabled": settings.optimizer_enabled,
                "runs": settings.optimizer_runs,
            },
            "evmVersion": settings.evm_version,
        },
    });
    // `Value` serialization cannot fail.
    serde_json::to_string_pretty(&value).unwrap_or_default() + "\n"
}

fn parse_json(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or(Value::Null)
}

fn hex(code: &str) -> String {
    if code.starts_with("0x") {
        code.to_string()
    } else {
        format!("0x{code}")
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> PipelineError + '_ {
    move |source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn write_file(path: &Path, text: &str) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_error(parent))?;
    }
    std::fs::write(path, text).map_err(io_error(path))
}

/// Removes `.json` files under `dir` not in `keep`, then any directories
/// left empty. Returns the number of files removed.
fn prune(dir: &Path, keep: &HashSet<&Path>) -> Result<usize, PipelineError> {
    if !dir.is_dir() {
        return Ok(0);
    }
    let mut removed = 0;
    for entry in std::fs::read_dir(dir).map_err(io_error(dir))? {
        let path = entry.map_err(io_error(dir))?.path();
        if path.is_dir() {
            removed += prune(&path, keep)?;
            let is_empty = std::fs::read_dir(&path)
                .map(|mut d| d.next().is_none())
                .unwrap_or(false);
            if is_empty {
                std::fs::remove_dir(&path).map_err(io_error(&path))?;
            }
        } else if path.extension().is_some_and(|e| e == "json") && !keep.contains(path.as_path())
        {
            std::fs::remove_file(&path).map_err(io_error(&path))?;
            removed += 1;
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(source: &str, names: &[&str]) -> Arc<Artifact> {
        Arc::new(Artifact::new(
            source,
            names
                .iter()
                .map(|n| CompiledContract {
                    name: n.to_string(),
                    source: source.to_string(),
                    abi: r#"[{"type":"function","name":"f"}]"#.to_string(),
                    bytecode: "6080".to_string(),
                    deployed_bytecode: "0x60".to_string(),
                    devdoc: "{}".to_string(),
                    userdoc: "{}".to_string(),
                })
                .collect(),
        ))
    }

    #[test]
    fn writes_one_file_per_contract() {
        let dir = tempfile::tempdir().unwrap();
        let settings = CompilerSettings::new("0.8.6").with_optimizer(200);
        let written = write_artifacts(
            dir.path(),
            &[artifact("contracts/Vault.sol", &["IVault", "Vault"])],
            &settings,
        )
        .unwrap();
        assert_eq!(
            written,
            vec![
                dir.path().join("contracts/Vault.sol/IVault.json"),
                dir.path().join("contracts/Vault.sol/Vault.json"),
            ]
        );

        let text = std::fs::read_to_string(&written[1]).unwrap();
        let json: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["contractName"], "Vault");
        assert_eq!(json["abi"][0]["name"], "f");
        assert_eq!(json["bytecode"], "0x6080");
        assert_eq!(json["deployedBytecode"], "0x60");
        assert_eq!(json["compiler"]["optimizer"]["runs"], 200);
        assert!(json["compiler"]["evmVersion"].is_null());
    }

    #[test]
    fn output_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let settings = CompilerSettings::new("0.8.6");
        let artifacts = [artifact("c/A.sol", &["A"])];
        let path = write_artifacts(dir.path(), &artifacts, &settings).unwrap()[0].clone();
        let first = std::fs::read(&path).unwrap();
        write_artifacts(dir.path(), &artifacts, &settings).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), first);
    }

    #[test]
    fn stale_artifacts_are_pruned() {
        let dir = tempfile::tempdir().unwrap();
        let settings = CompilerSettings::new("0.8.6");
        write_artifacts(
            dir.path(),
            &[artifact("c/A.sol", &["A"]), artifact("c/B.sol", &["B"])],
            &settings,
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "keep me").unwrap();

        write_artifacts(dir.path(), &[artifact("c/A.sol", &["A"])], &settings).unwrap();
        assert!(dir.path().join("c/A.sol/A.json").exists());
        assert!(!dir.path().join("c/B.sol").exists());
        assert!(dir.path().join("notes.txt").exists());
    }
}
