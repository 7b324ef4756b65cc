//! Writing rendered documents to disk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use keel_diagnostics::{Category, Diagnostic, DiagnosticCode, Severity};

use crate::error::RenderError;
use crate::extract::DocSet;
use crate::render::DocRenderer;

/// Code attached to documentation that could not be rendered or written.
pub const RENDER_FAILED: DiagnosticCode = DiagnosticCode {
    category: Category::Docs,
    number: 1,
};

/// A contract whose documentation was not produced.
#[derive(Debug)]
pub struct DocFailure {
    /// Contract name.
    pub contract: String,
    /// What went wrong.
    pub error: RenderError,
}

impl DocFailure {
    /// Reports the failure at the given severity.
    pub fn diagnostic(&self, severity: Severity) -> Diagnostic {
        Diagnostic::new(
            severity,
            RENDER_FAILED,
            format!("documentation for `{}` not generated: {}", self.contract, self.error),
        )
    }
}

/// Outcome of [`write_docs`].
#[derive(Debug, Default)]
pub struct DocOutput {
    /// Files written, in [`DocSet`] order.
    pub written: Vec<PathBuf>,
    /// Contracts that failed to render or write.
    pub failures: Vec<DocFailure>,
}

/// Renders every contract of `docs` into `out_dir`, one file each.
///
/// Files are named `<Contract>.<ext>`. When two selected contracts share a
/// name, each is written under a directory named after its source unit
/// instead. A failure for one contract does not stop the others; only a
/// failure to create `out_dir` is returned as an error.
pub fn write_docs(
    docs: &DocSet,
    renderer: &dyn DocRenderer,
    out_dir: &Path,
) -> Result<DocOutput, RenderError> {
    std::fs::create_dir_all(out_dir).map_err(|e| RenderError::Io {
        path: out_dir.to_path_buf(),
        source: e,
    })?;

    let mut name_counts: HashMap<&str, usize> = HashMap::new();
    for c in &docs.contracts {
        *name_counts.entry(c.name.as_str()).or_default() += 1;
    }

    let mut output = DocOutput::default();
    for doc in &docs.contracts {
        let file = format!("{}.{}", doc.name, renderer.extension());
        let path = if name_counts[doc.name.as_str()] > 1 {
            out_dir.join(&doc.source).join(file)
        } else {
            out_dir.join(file)
        };

        let result = renderer.render(doc).and_then(|text| write_file(&path, &text));
        match result {
            Ok(()) => {
                tracing::debug!(contract = %doc.name, path = %path.display(), "wrote docs");
                output.written.push(path);
            }
            Err(error) => {
                tracing::warn!(contract = %doc.name, "documentation failed: {error}");
                output.failures.push(DocFailure {
                    contract: doc.name.clone(),
                    error,
                });
            }
        }
    }

    tracing::info!(
        written = output.written.len(),
        failed = output.failures.len(),
        "documentation generated"
    );
    Ok(output)
}

fn write_file(path: &Path, text: &str) -> Result<(), RenderError> {
    let io = |e| RenderError::Io {
        path: path.to_path_buf(),
        source: e,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io)?;
    }
    std::fs::write(path, text).map_err(io)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ContractDoc;
    use crate::render::{MarkdownRenderer, TemplateRenderer};

    fn doc(name: &str, source: &str) -> ContractDoc {
        ContractDoc {
            name: name.to_string(),
            source: source.to_string(),
            ..ContractDoc::default()
        }
    }

    #[test]
    fn one_file_per_contract() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("docs");
        let docs = DocSet {
            contracts: vec![doc("Foo", "c/Foo.sol"), doc("Bar", "c/Bar.sol")],
        };
        let output = write_docs(&docs, &MarkdownRenderer, &out).unwrap();
        assert_eq!(output.written, vec![out.join("Foo.md"), out.join("Bar.md")]);
        assert!(output.failures.is_empty());
        let text = std::fs::read_to_string(out.join("Foo.md")).unwrap();
        assert!(text.starts_with("# Foo"));
    }

    #[test]
    fn duplicate_names_go_under_source() {
        let dir = tempfile::tempdir().unwrap();
        let docs = DocSet {
            contracts: vec![doc("Token", "c/a/Token.sol"), doc("Token", "c/b/Token.sol")],
        };
        let output = write_docs(&docs, &MarkdownRenderer, dir.path()).unwrap();
        assert_eq!(
            output.written,
            vec![
                dir.path().join("c/a/Token.sol/Token.md"),
                dir.path().join("c/b/Token.sol/Token.md"),
            ]
        );
    }

    #[test]
    fn render_failures_are_collected() {
        let dir = tempfile::tempdir().unwrap();
        let docs = DocSet {
            contracts: vec![doc("Foo", "c/Foo.sol")],
        };
        let renderer = TemplateRenderer::new("{{bogus}}");
        let output = write_docs(&docs, &renderer, dir.path()).unwrap();
        assert!(output.written.is_empty());
        assert_eq!(output.failures.len(), 1);

        let diag = output.failures[0].diagnostic(Severity::Warning);
        assert_eq!(diag.code.to_string(), "D001");
        assert!(diag.message.contains("`Foo`"));
        assert!(!diag.is_error());
    }
}
