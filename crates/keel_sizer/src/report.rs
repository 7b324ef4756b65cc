//! Size entries, the aggregate report, and the checks producing them.

use std::fmt;

use keel_cache::Artifact;
use keel_diagnostics::{Category, Diagnostic, DiagnosticCode, Severity};
use serde::Serialize;

/// Code attached to size-ceiling violations.
pub const SIZE_VIOLATION: DiagnosticCode = DiagnosticCode {
    category: Category::Size,
    number: 1,
};

/// Options for [`check_all`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeOptions {
    /// Maximum deployed size in bytes; a contract fails when strictly larger.
    pub ceiling: u64,
    /// Sort entries by display name instead of compile order.
    pub alpha_sort: bool,
    /// Display contracts as `source:Name`.
    pub disambiguate_paths: bool,
}

impl SizeOptions {
    /// Options with the given ceiling, compile order, and plain names.
    pub fn new(ceiling: u64) -> Self {
        Self {
            ceiling,
            alpha_sort: false,
            disambiguate_paths: false,
        }
    }
}

/// The size check result for one compiled contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SizeEntry {
    /// Name shown in the report.
    pub display_name: String,
    /// Source-unit name the contract was compiled from.
    pub source: String,
    /// Contract name.
    pub contract: String,
    /// Deployed bytecode size in bytes.
    pub deployed_size: u64,
    /// Creation bytecode size in bytes.
    pub init_size: u64,
    /// The ceiling the contract was checked against.
    pub ceiling: u64,
    /// `false` when `deployed_size > ceiling`.
    pub passed: bool,
}

/// Size entries for every contract of a build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SizeReport {
    /// One entry per compiled contract.
    pub entries: Vec<SizeEntry>,
}

impl SizeReport {
    /// Returns the entries over the ceiling.
    pub fn violations(&self) -> impl Iterator<Item = &SizeEntry> {
        self.entries.iter().filter(|e| !e.passed)
    }

    /// Returns `true` if no contract exceeds the ceiling.
    pub fn passed(&self) -> bool {
        self.entries.iter().all(|e| e.passed)
    }

    /// Builds one diagnostic per violation at the given severity.
    pub fn diagnostics(&self, severity: Severity) -> Vec<Diagnostic> {
        self.violations()
            .map(|e| {
                Diagnostic::new(
                    severity,
                    SIZE_VIOLATION,
                    format!(
                        "contract `{}` is {} bytes, over the {}-byte ceiling by {}",
                        e.display_name,
                        e.deployed_size,
                        e.ceiling,
                        e.deployed_size - e.ceiling
                    ),
                )
                .with_help("enable the optimizer, lower its runs, or split the contract")
            })
            .collect()
    }
}

impl fmt::Display for SizeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .entries
            .iter()
            .map(|e| e.display_name.len())
            .chain(std::iter::once("Contract".len()))
            .max()
            .unwrap_or(0);
        writeln!(
            f,
            "{:<width$}  {:>10}  {:>10}",
            "Contract", "Size (KiB)", "Init (KiB)"
        )?;
        for e in &self.entries {
            writeln!(
                f,
                "{:<width$}  {:>10.3}  {:>10.3}{}",
                e.display_name,
                kib(e.deployed_size),
                kib(e.init_size),
                if e.passed { "" } else { "  !" }
            )?;
        }
        Ok(())
    }
}

fn kib(bytes: u64) -> f64 {
    bytes as f64 / 1024.0
}

/// Checks every contract of one artifact. Entries use plain contract names
/// and keep the artifact's declaration order.
pub fn check(artifact: &Artifact, ceiling: u64) -> Vec<SizeEntry> {
    artifact
        .contracts
        .iter()
        .map(|c| {
            let deployed_size = c.deployed_size() as u64;
            SizeEntry {
                display_name: c.name.clone(),
                source: artifact.source.clone(),
                contract: c.name.clone(),
                deployed_size,
                init_size: c.init_size() as u64,
                ceiling,
                passed: deployed_size <= ceiling,
            }
        })
        .collect()
}

/// Checks every contract of every artifact, in the given order unless
/// `alpha_sort` is set.
pub fn check_all<'a, I>(artifacts: I, options: &SizeOptions) -> SizeReport
where
    I: IntoIterator<Item = &'a Artifact>,
{
    let mut entries: Vec<SizeEntry> = artifacts
        .into_iter()
        .flat_map(|a| check(a, options.ceiling))
        .collect();

    if options.disambiguate_paths {
        for e in &mut entries {
            e.display_name = format!("{}:{}", e.source, e.contract);
        }
    }
    if options.alpha_sort {
        entries.sort_by(|a, b| a.display_name.cmp(&b.display_name));
    }

    let report = SizeReport { entries };
    tracing::info!(
        contracts = report.entries.len(),
        violations = report.violations().count(),
        "size check finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_cache::CompiledContract;

    fn contract(source: &str, name: &str, deployed: usize, init: usize) -> CompiledContract {
        CompiledContract {
            name: name.to_string(),
            source: source.to_string(),
            abi: "[]".to_string(),
            bytecode: "ab".repeat(init),
            deployed_bytecode: "cd".repeat(deployed),
            devdoc: "{}".to_string(),
            userdoc: "{}".to_string(),
        }
    }

    fn artifact(source: &str, contracts: &[(&str, usize)]) -> Artifact {
        Artifact::new(
            source,
            contracts
                .iter()
                .map(|(name, size)| contract(source, name, *size, size + 100))
                .collect(),
        )
    }

    #[test]
    fn ceiling_is_inclusive() {
        let a = artifact("c/A.sol", &[("AtLimit", 24000), ("Over", 24001)]);
        let entries = check(&a, 24000);
        assert!(entries[0].passed);
        assert!(!entries[1].passed);
        assert_eq!(entries[1].deployed_size, 24001);
        assert_eq!(entries[1].init_size, 24101);
    }

    #[test]
    fn every_contract_gets_an_entry() {
        let a = artifact("c/A.sol", &[("A", 10), ("IA", 0)]);
        let b = artifact("c/B.sol", &[("B", 20)]);
        let report = check_all([&a, &b], &SizeOptions::new(24576));
        assert_eq!(report.entries.len(), 3);
        assert!(report.passed());
        assert!(report.diagnostics(Severity::Error).is_empty());
    }

    #[test]
    fn compile_order_unless_sorted() {
        let a = artifact("c/Z.sol", &[("Zeta", 1)]);
        let b = artifact("c/A.sol", &[("Alpha", 1)]);
        let names = |r: &SizeReport| -> Vec<String> {
            r.entries.iter().map(|e| e.display_name.clone()).collect()
        };

        let report = check_all([&a, &b], &SizeOptions::new(100));
        assert_eq!(names(&report), vec!["Zeta", "Alpha"]);

        let sorted = SizeOptions {
            alpha_sort: true,
            ..SizeOptions::new(100)
        };
        assert_eq!(names(&check_all([&a, &b], &sorted)), vec!["Alpha", "Zeta"]);
    }

    #[test]
    fn disambiguated_names() {
        let a = artifact("c/A.sol", &[("Token", 1)]);
        let b = artifact("c/legacy/A.sol", &[("Token", 1)]);
        let options = SizeOptions {
            disambiguate_paths: true,
            ..SizeOptions::new(100)
        };
        let report = check_all([&a, &b], &options);
        assert_eq!(report.entries[0].display_name, "c/A.sol:Token");
        assert_eq!(report.entries[1].display_name, "c/legacy/A.sol:Token");
    }

    #[test]
    fn violation_diagnostics_use_requested_severity() {
        let a = artifact("c/A.sol", &[("Big", 24001)]);
        let report = check_all([&a], &SizeOptions::new(24000));
        assert!(!report.passed());

        let diags = report.diagnostics(Severity::Warning);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].severity, Severity::Warning);
        assert_eq!(diags[0].code.to_string(), "S001");
        assert!(diags[0].message.contains("24001 bytes"));
        assert!(report.diagnostics(Severity::Error)[0].is_error());
    }

    #[test]
    fn table_marks_violations() {
        let a = artifact("c/A.sol", &[("Small", 512), ("Big", 2048)]);
        let table = check_all([&a], &SizeOptions::new(1024)).to_string();
        let lines: Vec<&str> = table.lines().collect();
        assert!(lines[0].starts_with("Contract"));
        assert!(lines[1].starts_with("Small") && lines[1].contains("0.500"));
        assert!(lines[2].ends_with('!'));
    }

    #[test]
    fn report_serializes() {
        let a = artifact("c/A.sol", &[("A", 1)]);
        let json = serde_json::to_value(check_all([&a], &SizeOptions::new(10))).unwrap();
        assert_eq!(json["entries"][0]["contract"], "A");
        assert_eq!(json["entries"][0]["passed"], true);
    }
}
