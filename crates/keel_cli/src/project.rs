//! Locating the project and loading its configuration.

use std::path::{Path, PathBuf};

use keel_config::{load_config, load_config_file, KeelConfig, CONFIG_FILE};

use crate::GlobalArgs;

/// Walks up from `start` looking for a directory containing `keel.toml`.
pub fn find_project_root(start: &Path) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(CONFIG_FILE).exists() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(format!(
                "could not find {CONFIG_FILE} in {} or any parent directory",
                start.display()
            )
            .into());
        }
    }
}

/// Resolves the project root and loads its configuration.
///
/// With `--config`, a file is loaded directly and its directory becomes the
/// root; a directory is used as the root. Otherwise the root is found by
/// walking up from the current directory.
pub fn load_project(
    global: &GlobalArgs,
) -> Result<(PathBuf, KeelConfig), Box<dyn std::error::Error>> {
    match global.config {
        Some(ref config_path) => {
            let p = PathBuf::from(config_path);
            if p.is_file() {
                let root = p
                    .parent()
                    .filter(|d| !d.as_os_str().is_empty())
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from("."));
                let config = load_config_file(&p)?;
                Ok((root, config))
            } else {
                let config = load_config(&p)?;
                Ok((p, config))
            }
        }
        None => {
            let root = find_project_root(&std::env::current_dir()?)?;
            let config = load_config(&root)?;
            Ok((root, config))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const MINIMAL: &str = "[compiler]\nversion = \"0.8.6\"\n";

    fn global(config: Option<&Path>) -> GlobalArgs {
        GlobalArgs {
            quiet: true,
            verbose: false,
            color: false,
            config: config.map(|p| p.display().to_string()),
        }
    }

    #[test]
    fn find_project_root_in_current_dir() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE), MINIMAL).unwrap();
        assert_eq!(find_project_root(tmp.path()).unwrap(), tmp.path());
    }

    #[test]
    fn find_project_root_in_parent() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE), MINIMAL).unwrap();
        let sub = tmp.path().join("contracts/tokens");
        fs::create_dir_all(&sub).unwrap();
        assert_eq!(find_project_root(&sub).unwrap(), tmp.path());
    }

    #[test]
    fn find_project_root_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let err = find_project_root(tmp.path()).unwrap_err();
        assert!(err.to_string().contains(CONFIG_FILE));
    }

    #[test]
    fn config_flag_accepts_file_or_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join(CONFIG_FILE);
        fs::write(&file, MINIMAL).unwrap();

        let (root, config) = load_project(&global(Some(&file))).unwrap();
        assert_eq!(root, tmp.path());
        assert_eq!(config.compiler.version, "0.8.6");

        let (root, _) = load_project(&global(Some(tmp.path()))).unwrap();
        assert_eq!(root, tmp.path());
    }

    #[test]
    fn invalid_config_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join(CONFIG_FILE);
        fs::write(&file, "[compiler]\n").unwrap();
        assert!(load_project(&global(Some(&file))).is_err());
    }
}
