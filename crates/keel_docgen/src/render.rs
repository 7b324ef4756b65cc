//! Turning a [`ContractDoc`] into text.

use std::fmt::Write as _;
use std::path::Path;

use crate::error::RenderError;
use crate::extract::{ContractDoc, MemberDoc};

/// Renders one contract's documentation.
pub trait DocRenderer: Send + Sync {
    /// Produces the document text.
    fn render(&self, doc: &ContractDoc) -> Result<String, RenderError>;

    /// File extension of rendered documents, without the dot.
    fn extension(&self) -> &str {
        "md"
    }
}

/// Built-in Markdown layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownRenderer;

impl DocRenderer for MarkdownRenderer {
    fn render(&self, doc: &ContractDoc) -> Result<String, RenderError> {
        let mut out = format!("# {}\n\n", doc.name);
        for (label, value) in [("Title", &doc.title), ("Author", &doc.author)] {
            if let Some(v) = value {
                let _ = writeln!(out, "**{label}:** {v}\n");
            }
        }
        for value in [&doc.notice, &doc.details].into_iter().flatten() {
            let _ = writeln!(out, "{value}\n");
        }
        let _ = writeln!(out, "_Source: `{}`_\n", doc.source);

        for (heading, members) in [
            ("Functions", &doc.functions),
            ("Events", &doc.events),
            ("Errors", &doc.errors),
        ] {
            if !members.is_empty() {
                let _ = writeln!(out, "## {heading}\n");
                out.push_str(&render_members(members));
            }
        }
        Ok(out.trim_end().to_string() + "\n")
    }
}

/// Markdown for a list of members: one `###` section each.
fn render_members(members: &[MemberDoc]) -> String {
    let mut out = String::new();
    for m in members {
        let _ = writeln!(out, "### `{}`\n", m.signature);
        for value in [&m.notice, &m.details].into_iter().flatten() {
            let _ = writeln!(out, "{value}\n");
        }
        for (label, rows) in [("Parameter", &m.params), ("Return", &m.returns)] {
            if rows.is_empty() {
                continue;
            }
            let _ = writeln!(out, "| {label} | Description |\n| --- | --- |");
            for (name, desc) in rows {
                let _ = writeln!(out, "| `{name}` | {desc} |");
            }
            out.push('\n');
        }
    }
    out
}

/// Substitutes `{{placeholder}}`s in a user template.
///
/// Scalar placeholders are `name`, `source`, `title`, `author`, `notice` and
/// `details` (empty when absent). `functions`, `events` and `errors` expand
/// to the same Markdown sections the built-in layout uses.
#[derive(Debug, Clone)]
pub struct TemplateRenderer {
    template: String,
    extension: String,
}

impl TemplateRenderer {
    /// Creates a renderer from template text producing `.md` files.
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            extension: "md".to_string(),
        }
    }

    /// Loads a template file. Output files take the template's extension.
    pub fn load(path: &Path) -> Result<Self, RenderError> {
        let template = std::fs::read_to_string(path).map_err(|e| RenderError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("md")
            .to_string();
        Ok(Self {
            template,
            extension,
        })
    }

    fn value(doc: &ContractDoc, name: &str) -> Result<String, RenderError> {
        let opt = |v: &Option<String>| v.clone().unwrap_or_default();
        Ok(match name {
            "name" => doc.name.clone(),
            "source" => doc.source.clone(),
            "title" => opt(&doc.title),
            "author" => opt(&doc.author),
            "notice" => opt(&doc.notice),
            "details" => opt(&doc.details),
            "functions" => render_members(&doc.functions),
            "events" => render_members(&doc.events),
            "errors" => render_members(&doc.errors),
            other => {
                return Err(RenderError::UnknownPlaceholder {
                    name: other.to_string(),
                })
            }
        })
    }
}

impl DocRenderer for TemplateRenderer {
    fn render(&self, doc: &ContractDoc) -> Result<String, RenderError> {
        let mut out = String::with_capacity(self.template.len());
        let mut rest = self.template.as_str();
        let mut offset = 0;

        while let Some(open) = rest.find("{{") {
            out.push_str(&rest[..open]);
            let after = &rest[open + 2..];
            let close = after.find("}}").ok_or(RenderError::Unterminated {
                offset: offset + open,
            })?;
            out.push_str(&Self::value(doc, after[..close].trim())?);
            let consumed = open + 2 + close + 2;
            offset += consumed;
            rest = &rest[consumed..];
        }
        out.push_str(rest);
        Ok(out)
    }

    fn extension(&self) -> &str {
        &self.extension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vault() -> ContractDoc {
        ContractDoc {
            name: "Vault".to_string(),
            source: "contracts/Vault.sol".to_string(),
            title: Some("A vault".to_string()),
            notice: Some("Stores tokens.".to_string()),
            functions: vec![MemberDoc {
                signature: "deposit(uint256)".to_string(),
                notice: Some("Deposit.".to_string()),
                params: vec![("amount".to_string(), "how much".to_string())],
                ..MemberDoc::default()
            }],
            ..ContractDoc::default()
        }
    }

    #[test]
    fn markdown_layout() {
        let text = MarkdownRenderer.render(&vault()).unwrap();
        assert!(text.starts_with("# Vault\n\n**Title:** A vault\n"));
        assert!(text.contains("Stores tokens."));
        assert!(text.contains("## Functions\n\n### `deposit(uint256)`\n\nDeposit.\n"));
        assert!(text.contains("| `amount` | how much |"));
        assert!(!text.contains("## Events"));
        assert!(text.ends_with("|\n"));
    }

    #[test]
    fn template_substitution() {
        let renderer = TemplateRenderer::new("<h1>{{ name }}</h1>{{title}}|{{author}}|{{functions}}");
        let text = renderer.render(&vault()).unwrap();
        assert!(text.starts_with("<h1>Vault</h1>A vault||### `deposit(uint256)`"));
        assert_eq!(renderer.extension(), "md");
    }

    #[test]
    fn template_without_placeholders_is_verbatim() {
        let renderer = TemplateRenderer::new("static text");
        assert_eq!(renderer.render(&vault()).unwrap(), "static text");
    }

    #[test]
    fn unknown_placeholder_fails() {
        let err = TemplateRenderer::new("{{nmae}}").render(&vault()).unwrap_err();
        assert!(matches!(err, RenderError::UnknownPlaceholder { ref name } if name == "nmae"));
        assert_eq!(err.to_string(), "unknown template placeholder `{{nmae}}`");
    }

    #[test]
    fn unterminated_placeholder_fails() {
        let err = TemplateRenderer::new("ok {{name}} then {{title")
            .render(&vault())
            .unwrap_err();
        assert!(matches!(err, RenderError::Unterminated { offset: 17 }));
    }

    #[test]
    fn load_takes_extension_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contract.html");
        std::fs::write(&path, "<p>{{notice}}</p>").unwrap();
        let renderer = TemplateRenderer::load(&path).unwrap();
        assert_eq!(renderer.extension(), "html");
        assert_eq!(renderer.render(&vault()).unwrap(), "<p>Stores tokens.</p>");
    }

    #[test]
    fn load_missing_template_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = TemplateRenderer::load(&dir.path().join("nope.md")).unwrap_err();
        assert!(matches!(err, RenderError::Io { .. }));
    }
}
