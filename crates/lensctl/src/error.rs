//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use lensctl_config::ConfigError;
use lensctl_core::{CoreError, StatusCode};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const PERMISSION: i32 = 5;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
    pub const INTERRUPTED: i32 = 130;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not open the camera: {reason}")]
    #[diagnostic(
        code(lensctl::camera_unavailable),
        help(
            "Check that the camera is switched on, connected and not claimed by\n\
             another program. Run with -v for details."
        )
    )]
    CameraUnavailable { reason: String },

    #[error("The camera session is busy")]
    #[diagnostic(
        code(lensctl::busy),
        help("Another operation holds the camera. Retry, or set busy_policy = \"wait\".")
    )]
    Busy,

    // ── Settings ─────────────────────────────────────────────────────
    #[error("Setting '{name}' not found")]
    #[diagnostic(
        code(lensctl::setting_not_found),
        help("Run: lensctl config list --all to see available settings")
    )]
    SettingNotFound { name: String },

    #[error("Setting '{name}' is read-only")]
    #[diagnostic(code(lensctl::read_only))]
    ReadOnly { name: String },

    #[error("Invalid value '{value}' for {name}: {reason}")]
    #[diagnostic(
        code(lensctl::invalid_value),
        help("Run: lensctl config get {name} to see the allowed values")
    )]
    InvalidValue {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Settings change aborted at '{failed}': {cause}")]
    #[diagnostic(code(lensctl::batch_aborted), help("{rollback}"))]
    BatchAborted {
        failed: String,
        cause: String,
        rollback: String,
    },

    // ── Files ────────────────────────────────────────────────────────
    #[error("'{path}' not found on the camera")]
    #[diagnostic(
        code(lensctl::file_not_found),
        help("Run: lensctl files tree to see the camera's storage")
    )]
    FileNotFound { path: String },

    // ── Camera ───────────────────────────────────────────────────────
    #[error("{message}")]
    #[diagnostic(code(lensctl::camera))]
    Camera {
        message: String,
        code: Option<StatusCode>,
    },

    #[error("{failed} of {total} settings could not be changed")]
    #[diagnostic(code(lensctl::partial_failure))]
    PartialFailure { failed: usize, total: usize },

    #[error("No file arrived within {seconds}s")]
    #[diagnostic(
        code(lensctl::timeout),
        help("Increase the wait with --timeout, or trigger the shutter on the camera.")
    )]
    Timeout { seconds: u64 },

    #[error("Interrupted")]
    #[diagnostic(code(lensctl::interrupted))]
    Interrupted,

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(lensctl::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(lensctl::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: lensctl profile init --name {name}"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("Cannot load device fixture {path}: {reason}")]
    #[diagnostic(code(lensctl::fixture))]
    Fixture { path: String, reason: String },

    #[error(transparent)]
    #[diagnostic(code(lensctl::config))]
    Config(Box<figment::Error>),

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(lensctl::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON payload: {0}")]
    #[diagnostic(code(lensctl::json), help("Check the JSON file contents and try again."))]
    Json(#[from] serde_json::Error),

    #[error("YAML rendering failed: {0}")]
    #[diagnostic(code(lensctl::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::CameraUnavailable { .. } => exit_code::CONNECTION,
            Self::Busy
            | Self::BatchAborted { .. }
            | Self::Camera {
                code: Some(StatusCode::CAMERA_BUSY),
                ..
            } => exit_code::CONFLICT,
            Self::SettingNotFound { .. }
            | Self::FileNotFound { .. }
            | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::ReadOnly { .. } => exit_code::PERMISSION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Interrupted => exit_code::INTERRUPTED,
            Self::InvalidValue { .. }
            | Self::Validation { .. }
            | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Context { .. } | CoreError::DeviceAcquire { .. } | CoreError::Init { .. } => {
                CliError::CameraUnavailable {
                    reason: err.to_string(),
                }
            }

            CoreError::SessionBusy => CliError::Busy,

            CoreError::NotFound { name } => CliError::SettingNotFound { name },

            CoreError::ReadOnly { name } => CliError::ReadOnly { name },

            CoreError::InvalidValue {
                name,
                value,
                reason,
            } => CliError::InvalidValue {
                name,
                value,
                reason,
            },

            CoreError::BatchAborted {
                failed,
                cause,
                rollback_failures,
            } => {
                let rollback = if rollback_failures.is_empty() {
                    "Every setting changed before the failure was restored.".to_owned()
                } else {
                    let names: Vec<String> = rollback_failures
                        .iter()
                        .map(|f| format!("{} ({})", f.name, f.error))
                        .collect();
                    format!(
                        "These settings could not be restored: {}",
                        names.join(", ")
                    )
                };
                CliError::BatchAborted {
                    failed,
                    cause: cause.to_string(),
                    rollback,
                }
            }

            CoreError::Listing { ref path, code } | CoreError::Delete { ref path, code }
                if matches!(
                    code,
                    StatusCode::FILE_NOT_FOUND | StatusCode::DIRECTORY_NOT_FOUND
                ) =>
            {
                CliError::FileNotFound { path: path.clone() }
            }

            CoreError::Timeout { timeout } => CliError::Timeout {
                seconds: timeout.as_secs(),
            },

            CoreError::Cancelled => CliError::Interrupted,

            other => CliError::Camera {
                code: other.status_code(),
                message: other.to_string(),
            },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::UnknownProfile { name } => CliError::ProfileNotFound {
                name,
                available: String::new(),
            },
            ConfigError::Fixture { path, reason } => CliError::Fixture {
                path: path.display().to_string(),
                reason,
            },
            ConfigError::Serialization(e) => CliError::Validation {
                field: "config".into(),
                reason: format!("failed to serialize config: {e}"),
            },
            ConfigError::Figment(e) => CliError::Config(e),
            ConfigError::Io(e) => CliError::Io(e),
        }
    }
}
