// ── Core error types ──
//
// User-facing errors from lensctl-core. Callers never match on raw
// transport failures: the `From<lensctl_transport::Error>` impl and the
// per-operation constructors below translate them into domain variants,
// keeping the device status code as context.

use std::time::Duration;

use lensctl_transport::StatusCode;
use thiserror::Error;

use crate::session::SessionState;

/// A rollback step that could not restore a setting after a batch abort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackFailure {
    pub name: String,
    pub error: lensctl_transport::Error,
}

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Session lifecycle ────────────────────────────────────────────
    #[error("Cannot create library context: {code}")]
    Context { code: StatusCode },

    #[error("Cannot acquire camera: {code}")]
    DeviceAcquire { code: StatusCode },

    #[error("Camera initialization failed: {code}")]
    Init { code: StatusCode },

    #[error("Session is busy with another operation")]
    SessionBusy,

    #[error("Session is not connected")]
    SessionClosed,

    #[error("Cannot {operation} while the session is {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    #[error("Teardown failed at {step}: {code}")]
    Teardown { step: &'static str, code: StatusCode },

    // ── Configuration tree ───────────────────────────────────────────
    #[error("Setting not found: {name}")]
    NotFound { name: String },

    #[error("Setting is read-only: {name}")]
    ReadOnly { name: String },

    #[error("Invalid value {value:?} for {name}: {reason}")]
    InvalidValue {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Camera rejected {name}: {code}")]
    Commit { name: String, code: StatusCode },

    #[error(
        "Batch aborted at {failed}: {cause} ({} rollback failure(s))",
        .rollback_failures.len()
    )]
    BatchAborted {
        failed: String,
        cause: Box<CoreError>,
        rollback_failures: Vec<RollbackFailure>,
    },

    // ── Capture & files ──────────────────────────────────────────────
    #[error("Capture failed: {code}")]
    Capture { code: StatusCode },

    #[error("Download of {path} failed: {reason}")]
    Download { path: String, reason: String },

    #[error("No file arrived within {}s", .timeout.as_secs_f32())]
    Timeout { timeout: Duration },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Cannot delete {path}: {code}")]
    Delete { path: String, code: StatusCode },

    #[error("Cannot list {path}: {code}")]
    Listing { path: String, code: StatusCode },

    // ── Transport (wrapped, not exposed raw) ─────────────────────────
    #[error("{operation} failed: {code}")]
    Transport {
        operation: &'static str,
        code: StatusCode,
    },
}

impl CoreError {
    /// The device status code behind this error, if one exists.
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            Self::Context { code }
            | Self::DeviceAcquire { code }
            | Self::Init { code }
            | Self::Teardown { code, .. }
            | Self::Commit { code, .. }
            | Self::Capture { code }
            | Self::Delete { code, .. }
            | Self::Listing { code, .. }
            | Self::Transport { code, .. } => Some(*code),
            Self::BatchAborted { cause, .. } => cause.status_code(),
            _ => None,
        }
    }

    /// Returns `true` if retrying the same call later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::SessionBusy | Self::Timeout { .. })
            || self.status_code().is_some_and(|code| {
                matches!(
                    code,
                    StatusCode::TIMEOUT | StatusCode::CAMERA_BUSY | StatusCode::IO_USB_CLAIM
                )
            })
    }

    pub(crate) fn download(path: impl ToString, err: &lensctl_transport::Error) -> Self {
        Self::Download {
            path: path.to_string(),
            reason: err.to_string(),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<lensctl_transport::Error> for CoreError {
    fn from(err: lensctl_transport::Error) -> Self {
        CoreError::Transport {
            operation: err.operation(),
            code: err.code(),
        }
    }
}
