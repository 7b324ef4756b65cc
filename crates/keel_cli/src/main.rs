//! Keel CLI: the command-line interface for the keel contract build tool.
//!
//! Provides `keel build` to compile a project and run the configured size,
//! gas and documentation stages, and `keel clean` to remove build outputs.

#![warn(missing_docs)]

mod build;
mod clean;
mod project;

use std::io::IsTerminal;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};

/// Keel: cached, parallel smart-contract builds.
#[derive(Parser, Debug)]
#[command(name = "keel", version, about = "Keel contract build orchestrator")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Control colored output.
    #[arg(long, global = true, value_enum, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    /// Path to a `keel.toml` file or the directory containing it.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compile the project and run the enabled post-compile stages.
    Build(BuildArgs),
    /// Remove the artifact cache and the artifacts directory.
    Clean,
}

/// Arguments for the `keel build` subcommand.
#[derive(Parser, Debug)]
pub struct BuildArgs {
    /// Check deployed sizes against the ceiling.
    #[arg(long, overrides_with = "no_size_check")]
    pub size_check: bool,

    /// Skip the size check.
    #[arg(long, overrides_with = "size_check")]
    pub no_size_check: bool,

    /// Run gas scenarios and print the gas report.
    #[arg(long, overrides_with = "no_gas_report")]
    pub gas_report: bool,

    /// Skip the gas report.
    #[arg(long, overrides_with = "gas_report")]
    pub no_gas_report: bool,

    /// Generate documentation for the allow-listed contracts.
    #[arg(long, overrides_with = "no_docs")]
    pub docs: bool,

    /// Skip documentation even if `docs.run_on_compile` is set.
    #[arg(long, overrides_with = "docs")]
    pub no_docs: bool,

    /// Fail the build when any source fails to compile.
    #[arg(long)]
    pub strict: bool,

    /// Number of compiler worker threads (0 = available parallelism).
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Output format for the build report.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

/// Controls whether colored output is produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ColorChoice {
    /// Detect from terminal capabilities.
    Auto,
    /// Always produce colored output.
    Always,
    /// Never produce colored output.
    Never,
}

/// Build report output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable terminal output.
    Text,
    /// Machine-readable JSON output.
    Json,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to print verbose/debug information.
    pub verbose: bool,
    /// Whether to use colored output.
    pub color: bool,
    /// Optional path to a config file or project directory.
    pub config: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let color = match cli.color {
        ColorChoice::Auto => std::io::stderr().is_terminal(),
        ColorChoice::Always => true,
        ColorChoice::Never => false,
    };

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        color,
        config: cli.config,
    };

    let result = match cli.command {
        Command::Build(ref args) => build::run(args, &global),
        Command::Clean => clean::run(&global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}
