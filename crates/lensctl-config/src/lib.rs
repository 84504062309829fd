//! Shared configuration for lensctl.
//!
//! TOML profiles, device fixtures for the simulated backend, and
//! translation to `lensctl_core::SessionConfig`. Loading merges built-in
//! defaults, the config file and `LENSCTL_`-prefixed environment variables,
//! in that order.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use lensctl_core::{BusyPolicy, FileKind, SessionConfig};
use lensctl_transport::simulated::DeviceFixture;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;
use tracing::debug;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("unknown profile '{name}'")]
    UnknownProfile { name: String },

    #[error("cannot read device fixture {}: {reason}", .path.display())]
    Fixture { path: PathBuf, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when `--profile` is not given.
    pub default_profile: Option<String>,

    /// Settings every profile inherits.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named camera profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default)]
    pub busy_policy: BusyPolicy,

    /// Longest single event poll, e.g. `"2s"`.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,

    /// How long `capture drain` listens, e.g. `"10s"`.
    #[serde(default = "default_drain_window")]
    pub drain_window: String,

    #[serde(default = "default_true")]
    pub delete_after_download: bool,

    #[serde(default = "default_chunk_size")]
    pub download_chunk_size: usize,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            busy_policy: BusyPolicy::default(),
            poll_interval: default_poll_interval(),
            drain_window: default_drain_window(),
            delete_after_download: true,
            download_chunk_size: default_chunk_size(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_poll_interval() -> String {
    "2s".into()
}
fn default_drain_window() -> String {
    "10s".into()
}
fn default_true() -> bool {
    true
}
fn default_chunk_size() -> usize {
    64 * 1024
}

/// Which transport a profile talks through.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// In-memory camera, optionally loaded from a fixture file.
    #[default]
    Simulated,
}

/// A named camera profile. Unset fields fall back to [`Defaults`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Profile {
    #[serde(default)]
    pub backend: Backend,

    /// TOML device fixture for the simulated backend.
    pub fixture: Option<PathBuf>,

    /// Where downloads land when no output path is given.
    pub download_dir: Option<PathBuf>,

    pub busy_policy: Option<BusyPolicy>,
    pub poll_interval: Option<String>,
    pub drain_window: Option<String>,
    pub delete_after_download: Option<bool>,
    pub file_kind: Option<FileKind>,
    pub download_chunk_size: Option<usize>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("io", "lensctl", "lensctl").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("lensctl");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the full Config from `path` + environment. A missing file is not
/// an error; the defaults apply.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("LENSCTL_").split("__"));

    let config: Config = figment.extract()?;
    debug!(path = %path.display(), profiles = config.profiles.len(), "config loaded");
    Ok(config)
}

/// Load config, returning a default if it cannot be read.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Profile resolution ──────────────────────────────────────────────

/// Pick the profile to use: the explicit name, else `default_profile`.
///
/// A config without any profiles yields an implicit simulated profile so
/// the tool works before `profile init` has been run.
pub fn resolve_profile(cfg: &Config, name: Option<&str>) -> Result<(String, Profile), ConfigError> {
    let name = name
        .map(str::to_owned)
        .or_else(|| cfg.default_profile.clone())
        .unwrap_or_else(|| "default".into());

    match cfg.profiles.get(&name) {
        Some(profile) => Ok((name, profile.clone())),
        None if cfg.profiles.is_empty() => Ok((name, Profile::default())),
        None => Err(ConfigError::UnknownProfile { name }),
    }
}

fn parse_duration(field: &str, value: &str) -> Result<Duration, ConfigError> {
    let duration = humantime::parse_duration(value).map_err(|e| ConfigError::Validation {
        field: field.into(),
        reason: format!("'{value}': {e}"),
    })?;
    if duration.is_zero() {
        return Err(ConfigError::Validation {
            field: field.into(),
            reason: "must be greater than zero".into(),
        });
    }
    Ok(duration)
}

/// Build a `SessionConfig` from a profile layered over the defaults.
pub fn profile_to_session_config(
    defaults: &Defaults,
    profile: &Profile,
) -> Result<SessionConfig, ConfigError> {
    let poll_interval = parse_duration(
        "poll_interval",
        profile
            .poll_interval
            .as_deref()
            .unwrap_or(&defaults.poll_interval),
    )?;
    let drain_window = parse_duration(
        "drain_window",
        profile
            .drain_window
            .as_deref()
            .unwrap_or(&defaults.drain_window),
    )?;

    let download_chunk_size = profile
        .download_chunk_size
        .unwrap_or(defaults.download_chunk_size);
    if download_chunk_size == 0 {
        return Err(ConfigError::Validation {
            field: "download_chunk_size".into(),
            reason: "must be greater than zero".into(),
        });
    }

    Ok(SessionConfig {
        busy_policy: profile.busy_policy.unwrap_or(defaults.busy_policy),
        poll_interval,
        drain_window,
        delete_after_download: profile
            .delete_after_download
            .unwrap_or(defaults.delete_after_download),
        file_kind: profile.file_kind.unwrap_or_default(),
        download_chunk_size,
    })
}

// ── Device fixtures ─────────────────────────────────────────────────

/// Read a TOML device fixture.
pub fn load_fixture(path: &Path) -> Result<DeviceFixture, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Fixture {
        path: path.into(),
        reason: e.to_string(),
    })?;
    toml::from_str(&text).map_err(|e| ConfigError::Fixture {
        path: path.into(),
        reason: e.to_string(),
    })
}

/// The fixture a profile asks for, or the built-in generic DSLR.
pub fn profile_fixture(profile: &Profile) -> Result<DeviceFixture, ConfigError> {
    match &profile.fixture {
        Some(path) => load_fixture(path),
        None => Ok(DeviceFixture::generic_dslr()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.default_profile.as_deref(), Some("default"));
        assert_eq!(cfg.defaults, Defaults::default());
        assert!(cfg.profiles.is_empty());
    }

    #[test]
    fn profiles_load_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
default_profile = "studio"

[defaults]
poll_interval = "500ms"

[profiles.studio]
backend = "simulated"
busy_policy = "fail-fast"
delete_after_download = false
file_kind = "raw"
"#,
        )
        .unwrap();

        let cfg = load_config_from(&path).unwrap();
        let (name, profile) = resolve_profile(&cfg, None).unwrap();
        assert_eq!(name, "studio");

        let session = profile_to_session_config(&cfg.defaults, &profile).unwrap();
        assert_eq!(session.busy_policy, BusyPolicy::FailFast);
        assert_eq!(session.poll_interval, Duration::from_millis(500));
        assert_eq!(session.drain_window, Duration::from_secs(10));
        assert!(!session.delete_after_download);
        assert_eq!(session.file_kind, FileKind::Raw);
    }

    #[test]
    fn unknown_profile_is_an_error_once_profiles_exist() {
        let mut cfg = Config::default();
        assert!(resolve_profile(&cfg, Some("anything")).is_ok());

        cfg.profiles.insert("studio".into(), Profile::default());
        assert!(matches!(
            resolve_profile(&cfg, Some("field")),
            Err(ConfigError::UnknownProfile { .. })
        ));
    }

    #[test]
    fn invalid_durations_are_rejected() {
        let profile = Profile {
            poll_interval: Some("soon".into()),
            ..Profile::default()
        };
        assert!(matches!(
            profile_to_session_config(&Defaults::default(), &profile),
            Err(ConfigError::Validation { ref field, .. }) if field == "poll_interval"
        ));

        let profile = Profile {
            drain_window: Some("0s".into()),
            ..Profile::default()
        };
        assert!(profile_to_session_config(&Defaults::default(), &profile).is_err());
    }

    #[test]
    fn save_then_load_keeps_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = Config::default();
        cfg.profiles.insert(
            "default".into(),
            Profile {
                download_dir: Some("/tmp/shots".into()),
                ..Profile::default()
            },
        );

        save_config_to(&cfg, &path).unwrap();
        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.profiles, cfg.profiles);
    }

    #[test]
    fn fixture_files_parse() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("camera.toml");
        std::fs::write(
            &path,
            r#"
model = "Bench Camera"
files = ["/DCIM/IMG_0001.JPG"]

[[sections]]
name = "imgsettings"
label = "Image Settings"

[[sections.widgets]]
name = "iso"
label = "ISO Speed"
type = "radio"
value = "200"
choices = ["100", "200"]
"#,
        )
        .unwrap();

        let fixture = load_fixture(&path).unwrap();
        assert_eq!(fixture.model, "Bench Camera");
        assert_eq!(fixture.sections[0].widgets[0].choices, vec!["100", "200"]);

        let err = load_fixture(&dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Fixture { .. }));
    }
}
