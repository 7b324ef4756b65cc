//! Diagnostic rendering for human-readable terminal output.

use crate::diagnostic::Diagnostic;
use crate::severity::Severity;
use keel_source::SourceTree;

/// Trait for rendering diagnostics into formatted output strings.
pub trait DiagnosticRenderer {
    /// Renders a single diagnostic into a formatted string.
    fn render(&self, diag: &Diagnostic, tree: &SourceTree) -> String;
}

/// Renders diagnostics in a rustc-style terminal format.
///
/// Produces output like:
/// ```text
/// error[C2314]: Expected ';' but got '}'
///   --> contracts/Vault.sol:10:5
///    |
/// 10 |     uint256 total
///    |     ^^^^^^^
///    |
///    = note: ...
///    = help: ...
/// ```
pub struct TerminalRenderer {
    /// Whether to use ANSI color codes in output.
    pub color: bool,
}

impl TerminalRenderer {
    /// Creates a new terminal renderer.
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn paint(&self, text: &str, severity: Severity) -> String {
        if !self.color {
            return text.to_string();
        }
        let code = match severity {
            Severity::Error => "1;31",
            Severity::Warning => "1;33",
            Severity::Note => "1;36",
        };
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

impl DiagnosticRenderer for TerminalRenderer {
    fn render(&self, diag: &Diagnostic, tree: &SourceTree) -> String {
        let mut out = String::new();

        let header = format!("{}[{}]", diag.severity, diag.code);
        out.push_str(&format!(
            "{}: {}\n",
            self.paint(&header, diag.severity),
            diag.message
        ));

        let resolved = diag
            .location
            .as_ref()
            .and_then(|loc| tree.resolve_location(loc).map(|r| (loc, r)));

        match (resolved, &diag.location) {
            (Some((loc, resolved)), _) => {
                out.push_str(&format!("  --> {resolved}\n"));

                if let Some(unit) = tree.lookup(&loc.source) {
                    let line_num = resolved.start_line.to_string();
                    let padding = " ".repeat(line_num.len());
                    let line_content = unit.line_text(loc.start);

                    out.push_str(&format!("{padding} |\n"));
                    out.push_str(&format!("{line_num} | {line_content}\n"));

                    // Underline stops at the end of the first line.
                    let col = resolved.start_col as usize;
                    let room = line_content.len().saturating_sub(col - 1).max(1);
                    let carets = "^".repeat((loc.len() as usize).clamp(1, room));
                    let col_padding = " ".repeat(col.saturating_sub(1));
                    out.push_str(&format!(
                        "{padding} | {col_padding}{}\n",
                        self.paint(&carets, diag.severity)
                    ));
                }
            }
            // Location in a unit that is not part of this build.
            (None, Some(loc)) => {
                out.push_str(&format!("  --> {}\n", loc.source));
            }
            (None, None) => {}
        }

        for note in &diag.notes {
            out.push_str(&format!("   = note: {note}\n"));
        }

        for help in &diag.help {
            out.push_str(&format!("   = help: {help}\n"));
        }

        out
    }
}
