//! `keel build`: compile the project and run the post-compile stages.

use keel_build::{BuildReport, Pipeline};
use keel_common::CancellationToken;
use keel_config::BuildOverrides;
use keel_diagnostics::{DiagnosticRenderer, TerminalRenderer};

use crate::project::load_project;
use crate::{BuildArgs, GlobalArgs, ReportFormat};

/// Runs the `keel build` command.
///
/// Returns the build's exit code: 0 when done, 2 when a contract exceeds the
/// size ceiling, 1 for any other failure.
pub fn run(args: &BuildArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let (root, config) = load_project(global)?;
    let config = overrides(args).apply(config)?;

    if !global.quiet {
        let name = if config.project.name.is_empty() {
            root.display().to_string()
        } else {
            config.project.name.clone()
        };
        eprintln!("   Building {name} (solc {})", config.compiler.version);
    }

    let cancel = CancellationToken::new();
    if let Err(err) = ctrlc::set_handler(interrupt_handler(cancel.clone(), global.quiet)) {
        tracing::warn!("failed to install Ctrl-C handler: {err}");
    }
    let pipeline = Pipeline::with_solc(&root, config, &cancel)?;
    let report = pipeline.run(&cancel)?;

    match args.format {
        ReportFormat::Text => print_text(&report, global),
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(report.exit_code())
}

/// Builds the Ctrl-C handler: the first interrupt cancels the build
/// cooperatively, a second one exits immediately.
fn interrupt_handler(cancel: CancellationToken, quiet: bool) -> impl FnMut() + Send + 'static {
    move || {
        if cancel.cancel() {
            if !quiet {
                eprintln!("\n Cancelling build (press Ctrl-C again to exit)");
            }
        } else {
            std::process::exit(130);
        }
    }
}

/// Maps the paired on/off flags onto config overrides.
fn overrides(args: &BuildArgs) -> BuildOverrides {
    BuildOverrides {
        size_check: toggle(args.size_check, args.no_size_check),
        gas_report: toggle(args.gas_report, args.no_gas_report),
        docs: toggle(args.docs, args.no_docs),
        strict: args.strict.then_some(true),
        jobs: args.jobs,
    }
}

/// Each flag of a pair overrides the other, so at most one is set.
fn toggle(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, false) => Some(true),
        (false, true) => Some(false),
        _ => None,
    }
}

fn print_text(report: &BuildReport, global: &GlobalArgs) {
    let renderer = TerminalRenderer::new(global.color);
    for diag in &report.diagnostics {
        if global.quiet && !diag.is_error() {
            continue;
        }
        match report.tree {
            Some(ref tree) => eprintln!("{}", renderer.render(diag, tree)),
            None => eprintln!("{}: {}", diag.severity, diag.message),
        }
    }
    if global.quiet {
        return;
    }

    if let Some(ref size) = report.size {
        println!("{size}");
    }
    if let Some(ref gas) = report.gas {
        println!("{gas}");
    }
    if let Some(ref docs) = report.docs {
        eprintln!("  Documented {} contract(s)", docs.contracts.len());
    }

    let stats = &report.stats;
    eprintln!(
        "   Compiled {} unit(s): {} fresh, {} cached, {} failed",
        stats.units,
        stats.compiled,
        stats.cache_hits(),
        stats.failed
    );
    match report.failure {
        Some(ref cause) => eprintln!("     Failed {cause}"),
        None => eprintln!(
            "   Finished {} contract(s), {} artifact file(s)",
            report.contract_names().len(),
            report.artifact_files.len()
        ),
    }
    eprintln!(
        "     Result: {} error(s), {} warning(s)",
        report.error_count(),
        report.warning_count()
    );
}
