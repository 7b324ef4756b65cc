//! `keel clean`: remove the artifact cache and artifacts directory.

use crate::project::load_project;
use crate::GlobalArgs;

/// Runs the `keel clean` command.
pub fn run(global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let (root, config) = load_project(global)?;
    let removed = keel_build::clean(&root, &config)?;

    if !global.quiet {
        if removed.is_empty() {
            eprintln!("   Nothing to clean");
        }
        for dir in &removed {
            eprintln!("    Removed {}", dir.display());
        }
    }
    Ok(0)
}
