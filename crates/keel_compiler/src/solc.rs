//! Adapter for `solc`-compatible compilers speaking standard JSON.

use std::collections::BTreeMap;
use std::time::Duration;

use keel_cache::{Artifact, CompiledContract};
use keel_common::CancellationToken;
use keel_diagnostics::{Category, Diagnostic, DiagnosticCode, Severity};
use keel_source::Location;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::compiler::Compiler;
use crate::error::{CompileError, CompileFailure, ToolError};
use crate::job::CompileJob;
use crate::tool::{run_tool, ToolInvocation};

/// Outputs requested for every contract of the target unit.
const OUTPUT_SELECTION: [&str; 5] = [
    "abi",
    "evm.bytecode.object",
    "evm.deployedBytecode.object",
    "devdoc",
    "userdoc",
];

/// Drives an external compiler executable in `--standard-json` mode.
#[derive(Debug, Clone)]
pub struct SolcCompiler {
    command: String,
    timeout: Duration,
}

impl SolcCompiler {
    /// Creates an adapter for the given executable.
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            timeout,
        }
    }

    /// Returns the executable this adapter invokes.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Checks that `<command> --version` reports the expected version.
    ///
    /// A build suffix in `expected` (`0.8.6+commit...`) must match exactly;
    /// otherwise only the `MAJOR.MINOR.PATCH` prefix is compared.
    pub fn verify_version(
        &self,
        expected: &str,
        cancel: &CancellationToken,
    ) -> Result<(), ToolError> {
        let invocation = ToolInvocation::new(&self.command, self.timeout).arg("--version");
        let output = run_tool(&invocation, cancel)?.into_success(&self.command)?;
        let found = parse_version(&output.stdout).ok_or_else(|| ToolError::InvalidOutput {
            command: self.command.clone(),
            reason: "no version in `--version` output".to_string(),
        })?;

        let matches = if expected.contains('+') {
            found == expected
        } else {
            found.split('+').next() == Some(expected)
        };
        if matches {
            Ok(())
        } else {
            Err(ToolError::VersionMismatch {
                command: self.command.clone(),
                expected: expected.to_string(),
                found,
            })
        }
    }

    /// Builds the standard-JSON input for a job.
    pub fn standard_input(job: &CompileJob<'_>) -> Value {
        let sources: serde_json::Map<String, Value> = job
            .sources()
            .map(|unit| (unit.name.clone(), json!({ "content": unit.content })))
            .collect();

        let mut selection = serde_json::Map::new();
        selection.insert(
            job.target.name.clone(),
            json!({ "*": OUTPUT_SELECTION.to_vec() }),
        );

        let mut settings = json!({
            "optimizer": {
                "enabled": job.settings.optimizer_enabled,
                "runs": job.settings.optimizer_runs,
            },
            "outputSelection": selection,
        });
        if let Some(evm) = &job.settings.evm_version {
            settings["evmVersion"] = json!(evm);
        }

        json!({
            "language": "Solidity",
            "sources": sources,
            "settings": settings,
        })
    }

    /// Interprets the standard-JSON output for a job.
    ///
    /// Any error-severity message fails the unit with every diagnostic
    /// attached. Otherwise the artifact holds the target unit's contracts in
    /// declaration order, with the warnings that point into the target unit
    /// (or nowhere in particular).
    pub fn parse_output(
        &self,
        job: &CompileJob<'_>,
        stdout: &str,
    ) -> Result<Artifact, CompileFailure> {
        let output: SolcOutput =
            serde_json::from_str(stdout).map_err(|e| ToolError::InvalidOutput {
                command: self.command.clone(),
                reason: e.to_string(),
            })?;

        let target = &job.target.name;
        let diagnostics: Vec<Diagnostic> = output.errors.iter().map(to_diagnostic).collect();

        if diagnostics.iter().any(Diagnostic::is_error) {
            return Err(CompileError {
                source_name: target.clone(),
                diagnostics,
            }
            .into());
        }

        let diagnostics = diagnostics
            .into_iter()
            .filter(|d| d.location.as_ref().map_or(true, |loc| &loc.source == target))
            .collect();

        let mut compiled = output.contracts.get(target).cloned().unwrap_or_default();
        let mut contracts = Vec::new();
        for name in job.target.declared_names() {
            if let Some(raw) = compiled.remove(name) {
                contracts.push(raw.into_contract(name, target));
            }
        }
        // Declarations the scanner missed keep the compiler's (sorted) order.
        for (name, raw) in compiled {
            contracts.push(raw.into_contract(&name, target));
        }

        Ok(Artifact {
            source: target.clone(),
            contracts,
            diagnostics,
        })
    }
}

impl Compiler for SolcCompiler {
    fn compile(
        &self,
        job: &CompileJob<'_>,
        cancel: &CancellationToken,
    ) -> Result<Artifact, CompileFailure> {
        if cancel.is_cancelled() {
            return Err(CompileFailure::Cancelled);
        }

        let input = Self::standard_input(job).to_string();
        let invocation = ToolInvocation::new(&self.command, self.timeout)
            .arg("--standard-json")
            .stdin(input);
        let output = run_tool(&invocation, cancel)?;

        // The compiler reports rejected sources inside its JSON output; only
        // a run with nothing on stdout is a tool failure.
        if output.stdout.trim().is_empty() {
            output.into_success(&self.command)?;
            return Err(ToolError::InvalidOutput {
                command: self.command.clone(),
                reason: "empty output".to_string(),
            }
            .into());
        }

        let artifact = self.parse_output(job, &output.stdout)?;
        tracing::debug!(
            source = %job.target.name,
            contracts = artifact.contracts.len(),
            warnings = artifact.diagnostics.len(),
            "compiled"
        );
        Ok(artifact)
    }
}

/// Extracts `X.Y.Z[+build]` from `--version` output
/// (`Version: 0.8.6+commit.11564f7e.Linux.g++`).
fn parse_version(output: &str) -> Option<String> {
    let line = output.lines().find(|l| l.trim_start().starts_with("Version:"))?;
    let version = line.trim_start().trim_start_matches("Version:").trim();
    let (core, build) = match version.split_once('+') {
        Some((core, build)) => (core, Some(build)),
        None => (version, None),
    };
    if core.is_empty() {
        return None;
    }
    // Keep `commit.<hash>`; the platform suffix varies between builds.
    match build.map(|b| b.split('.').take(2).collect::<Vec<_>>().join(".")) {
        Some(commit) if !commit.is_empty() => Some(format!("{core}+{commit}")),
        _ => Some(core.to_string()),
    }
}

fn to_diagnostic(raw: &SolcMessage) -> Diagnostic {
    let severity = Severity::from_solc(&raw.severity);
    let number = raw
        .error_code
        .as_deref()
        .and_then(|c| c.parse::<u16>().ok())
        .unwrap_or(0);
    let mut diag = Diagnostic::new(
        severity,
        DiagnosticCode::new(Category::Compiler, number),
        raw.message.clone(),
    );
    if let Some(loc) = &raw.source_location {
        if loc.start >= 0 && loc.end >= loc.start {
            diag = diag.with_location(Location::new(
                loc.file.clone(),
                loc.start as u32,
                loc.end as u32,
            ));
        }
    }
    if let Some(kind) = &raw.kind {
        if severity.is_error() {
            diag = diag.with_note(format!("reported as {kind}"));
        }
    }
    diag
}

#[derive(Debug, Deserialize)]
struct SolcOutput {
    #[serde(default)]
    errors: Vec<SolcMessage>,
    #[serde(default)]
    contracts: BTreeMap<String, BTreeMap<String, SolcContract>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SolcMessage {
    severity: String,
    message: String,
    #[serde(rename = "type")]
    kind: Option<String>,
    error_code: Option<String>,
    source_location: Option<SolcLocation>,
}

#[derive(Debug, Deserialize)]
struct SolcLocation {
    file: String,
    start: i64,
    end: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SolcContract {
    #[serde(default)]
    abi: Value,
    #[serde(default)]
    evm: SolcEvm,
    #[serde(default)]
    devdoc: Value,
    #[serde(default)]
    userdoc: Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SolcEvm {
    #[serde(default)]
    bytecode: SolcBytecode,
    #[serde(default)]
    deployed_bytecode: SolcBytecode,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SolcBytecode {
    #[serde(default)]
    object: String,
}

impl SolcContract {
    fn into_contract(self, name: &str, source: &str) -> CompiledContract {
        CompiledContract {
            name: name.to_string(),
            source: source.to_string(),
            abi: json_text(&self.abi, "[]"),
            bytecode: self.evm.bytecode.object,
            deployed_bytecode: self.evm.deployed_bytecode.object,
            devdoc: json_text(&self.devdoc, "{}"),
            userdoc: json_text(&self.userdoc, "{}"),
        }
    }
}

/// Serializes a JSON value canonically (serde_json keeps object keys sorted).
fn json_text(value: &Value, empty: &str) -> String {
    if value.is_null() {
        empty.to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_common::CompilerSettings;
    use keel_source::SourceTree;
    use std::path::Path;

    fn tree() -> SourceTree {
        SourceTree::from_sources(
            Path::new("/proj"),
            [
                (
                    "contracts/Vault.sol",
                    "import \"./Base.sol\";\ninterface IVault {}\ncontract Vault is Base {}",
                ),
                ("contracts/Base.sol", "abstract contract Base {}"),
            ],
        )
    }

    fn with_job<R>(settings: &CompilerSettings, f: impl FnOnce(&CompileJob<'_>) -> R) -> R {
        let tree = tree();
        let target = tree.lookup("contracts/Vault.sol").unwrap();
        let deps = crate::job::dependency_units(&tree, target.id);
        let job = CompileJob {
            target,
            dependencies: &deps,
            settings,
        };
        f(&job)
    }

    fn solc() -> SolcCompiler {
        SolcCompiler::new("solc", Duration::from_secs(10))
    }

    #[test]
    fn standard_input_shape() {
        let mut settings = CompilerSettings::new("0.8.6").with_optimizer(400);
        settings.evm_version = Some("london".into());
        let input = with_job(&settings, SolcCompiler::standard_input);

        assert_eq!(input["language"], "Solidity");
        assert!(input["sources"]["contracts/Vault.sol"]["content"].is_string());
        assert!(input["sources"]["contracts/Base.sol"]["content"].is_string());
        assert_eq!(input["settings"]["optimizer"]["enabled"], true);
        assert_eq!(input["settings"]["optimizer"]["runs"], 400);
        assert_eq!(input["settings"]["evmVersion"], "london");
        let selection = &input["settings"]["outputSelection"];
        assert!(selection["contracts/Vault.sol"]["*"].is_array());
        assert!(selection.get("contracts/Base.sol").is_none());
    }

    #[test]
    fn contracts_in_declaration_order() {
        let stdout = r#"{
            "contracts": {
                "contracts/Vault.sol": {
                    "Vault": {
                        "abi": [{"type": "function", "name": "deposit"}],
                        "evm": {
                            "bytecode": {"object": "60806040"},
                            "deployedBytecode": {"object": "6080"}
                        },
                        "devdoc": {"title": "Vault"},
                        "userdoc": {}
                    },
                    "IVault": {"abi": [], "evm": {"bytecode": {"object": ""}, "deployedBytecode": {"object": ""}}}
                },
                "contracts/Base.sol": {
                    "Base": {"abi": []}
                }
            }
        }"#;
        let settings = CompilerSettings::new("0.8.6");
        let artifact = with_job(&settings, |job| solc().parse_output(job, stdout)).unwrap();

        assert_eq!(artifact.source, "contracts/Vault.sol");
        assert_eq!(artifact.contract_names(), vec!["IVault", "Vault"]);
        let vault = artifact.contract("Vault").unwrap();
        assert_eq!(vault.deployed_size(), 2);
        assert_eq!(vault.devdoc, r#"{"title":"Vault"}"#);
        assert!(artifact.contract("IVault").unwrap().is_empty());
        assert!(artifact.diagnostics.is_empty());
    }

    #[test]
    fn errors_fail_the_unit_with_all_diagnostics() {
        let stdout = r#"{
            "errors": [
                {"severity": "warning", "type": "Warning", "errorCode": "5667",
                 "message": "Unused function parameter.",
                 "sourceLocation": {"file": "contracts/Vault.sol", "start": 10, "end": 20}},
                {"severity": "error", "type": "ParserError", "errorCode": "2314",
                 "message": "Expected ';' but got '}'",
                 "sourceLocation": {"file": "contracts/Vault.sol", "start": 30, "end": 31}}
            ]
        }"#;
        let settings = CompilerSettings::new("0.8.6");
        let failure = with_job(&settings, |job| solc().parse_output(job, stdout)).unwrap_err();

        let CompileFailure::Diagnostics(err) = failure else {
            panic!("expected diagnostics failure");
        };
        assert_eq!(err.source_name, "contracts/Vault.sol");
        assert_eq!(err.diagnostics.len(), 2);
        assert_eq!(err.error_count(), 1);
        assert_eq!(err.diagnostics[1].code.to_string(), "C2314");
        assert_eq!(err.diagnostics[1].location.as_ref().unwrap().start, 30);
    }

    #[test]
    fn warnings_outside_target_are_dropped() {
        let stdout = r#"{
            "errors": [
                {"severity": "warning", "message": "in target",
                 "sourceLocation": {"file": "contracts/Vault.sol", "start": 0, "end": 1}},
                {"severity": "warning", "message": "in dependency",
                 "sourceLocation": {"file": "contracts/Base.sol", "start": 0, "end": 1}},
                {"severity": "warning", "message": "SPDX license identifier not provided"}
            ],
            "contracts": {"contracts/Vault.sol": {"Vault": {}}}
        }"#;
        let settings = CompilerSettings::new("0.8.6");
        let artifact = with_job(&settings, |job| solc().parse_output(job, stdout)).unwrap();
        let messages: Vec<&str> = artifact
            .diagnostics
            .iter()
            .map(|d| d.message.as_str())
            .collect();
        assert_eq!(
            messages,
            vec!["in target", "SPDX license identifier not provided"]
        );
    }

    #[test]
    fn unparsable_output_is_tool_error() {
        let settings = CompilerSettings::new("0.8.6");
        let failure = with_job(&settings, |job| solc().parse_output(job, "not json")).unwrap_err();
        assert!(matches!(
            failure,
            CompileFailure::Tool(ToolError::InvalidOutput { .. })
        ));
    }

    #[test]
    fn version_parsing() {
        let out = "solc, the solidity compiler commandline interface\nVersion: 0.8.6+commit.11564f7e.Linux.g++\n";
        assert_eq!(parse_version(out).as_deref(), Some("0.8.6+commit.11564f7e"));
        assert_eq!(parse_version("Version: 0.8.6").as_deref(), Some("0.8.6"));
        assert!(parse_version("garbage").is_none());
    }

    #[cfg(unix)]
    fn fake_solc(dir: &Path, script: &str) -> String {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("fake-solc");
        std::fs::write(&path, format!("#!/bin/sh\n{script}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[cfg(unix)]
    #[test]
    fn compile_through_executable() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = fake_solc(
            dir.path(),
            r#"cat > /dev/null
echo '{"contracts":{"contracts/Vault.sol":{"Vault":{"evm":{"deployedBytecode":{"object":"00"}}}}}}'"#,
        );
        let compiler = SolcCompiler::new(cmd, Duration::from_secs(10));
        let settings = CompilerSettings::new("0.8.6");
        let artifact = with_job(&settings, |job| {
            compiler.compile(job, &CancellationToken::new())
        })
        .unwrap();
        assert_eq!(artifact.contract_names(), vec!["Vault"]);
    }

    #[cfg(unix)]
    #[test]
    fn crashing_executable_is_tool_failure() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = fake_solc(dir.path(), "echo 'segfault' >&2\nexit 139");
        let compiler = SolcCompiler::new(cmd, Duration::from_secs(10));
        let settings = CompilerSettings::new("0.8.6");
        let failure = with_job(&settings, |job| {
            compiler.compile(job, &CancellationToken::new())
        })
        .unwrap_err();
        assert!(matches!(failure, CompileFailure::Tool(ToolError::Failed { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn verify_version_against_executable() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = fake_solc(dir.path(), "echo 'Version: 0.8.6+commit.11564f7e.Linux.g++'");
        let compiler = SolcCompiler::new(cmd, Duration::from_secs(10));
        let cancel = CancellationToken::new();
        compiler.verify_version("0.8.6", &cancel).unwrap();
        compiler
            .verify_version("0.8.6+commit.11564f7e", &cancel)
            .unwrap();
        let err = compiler.verify_version("0.8.7", &cancel).unwrap_err();
        assert!(matches!(err, ToolError::VersionMismatch { .. }));
    }

    #[test]
    fn cancelled_before_start() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let settings = CompilerSettings::new("0.8.6");
        let failure = with_job(&settings, |job| solc().compile(job, &cancel)).unwrap_err();
        assert!(matches!(failure, CompileFailure::Cancelled));
    }
}
