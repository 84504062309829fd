//! Shared helpers for command handlers.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use lensctl_config::{Config, ConfigError, Profile};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Config file selected by `--config`, or the platform default.
pub fn config_file(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(lensctl_config::config_path)
}

pub fn load_config(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(lensctl_config::load_config_from(&config_file(global))?)
}

/// Resolve `--profile` against the config, listing known profiles on a miss.
pub fn resolve_profile(cfg: &Config, global: &GlobalOpts) -> Result<(String, Profile), CliError> {
    lensctl_config::resolve_profile(cfg, global.profile.as_deref()).map_err(|e| match e {
        ConfigError::UnknownProfile { name } => CliError::ProfileNotFound {
            name,
            available: available_profiles(cfg),
        },
        other => other.into(),
    })
}

pub fn available_profiles(cfg: &Config) -> String {
    if cfg.profiles.is_empty() {
        "(none)".into()
    } else {
        cfg.profiles.keys().cloned().collect::<Vec<_>>().join(", ")
    }
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, action: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: action.into(),
        });
    }
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))?;
    Ok(confirmed)
}

/// Where a downloaded camera file lands.
///
/// An explicit path that is an existing directory gets `file_name` appended;
/// any other explicit path is used as is. Without one the file goes into
/// the profile's download directory, or the working directory.
pub fn destination(explicit: Option<&Path>, download_dir: Option<&Path>, file_name: &str) -> PathBuf {
    match explicit {
        Some(path) if path.is_dir() => path.join(file_name),
        Some(path) => path.to_path_buf(),
        None => download_dir.unwrap_or(Path::new(".")).join(file_name),
    }
}

/// Create the parent directory of `path` if it is missing.
pub async fn ensure_parent(path: &Path) -> Result<(), CliError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn destination_prefers_explicit_paths() {
        let dir = tempfile::tempdir().unwrap();

        assert_eq!(
            destination(Some(dir.path()), None, "IMG_1.JPG"),
            dir.path().join("IMG_1.JPG")
        );
        assert_eq!(
            destination(Some(Path::new("/tmp/out.jpg")), Some(dir.path()), "IMG_1.JPG"),
            PathBuf::from("/tmp/out.jpg")
        );
        assert_eq!(
            destination(None, Some(dir.path()), "IMG_1.JPG"),
            dir.path().join("IMG_1.JPG")
        );
        assert_eq!(destination(None, None, "IMG_1.JPG"), PathBuf::from("./IMG_1.JPG"));
    }
}
