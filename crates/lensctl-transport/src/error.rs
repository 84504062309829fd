use std::fmt;

use serde::ser::{Serialize, SerializeStruct, Serializer};
use thiserror::Error;

/// Result code reported by the device transport.
///
/// Values follow the libgphoto2 numbering (`GP_OK`, `GP_ERROR_*`) so that a
/// native backend can pass codes through untouched. Negative values are
/// failures; anything the table below does not name is reported as
/// "unknown error".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StatusCode(i32);

impl StatusCode {
    pub const OK: Self = Self(0);
    pub const GENERIC: Self = Self(-1);
    pub const BAD_PARAMETERS: Self = Self(-2);
    pub const NO_MEMORY: Self = Self(-3);
    pub const LIBRARY: Self = Self(-4);
    pub const UNKNOWN_PORT: Self = Self(-5);
    pub const NOT_SUPPORTED: Self = Self(-6);
    pub const IO: Self = Self(-7);
    pub const TIMEOUT: Self = Self(-10);
    pub const IO_USB_CLAIM: Self = Self(-53);
    pub const CORRUPTED_DATA: Self = Self(-102);
    pub const FILE_EXISTS: Self = Self(-103);
    pub const MODEL_NOT_FOUND: Self = Self(-105);
    pub const DIRECTORY_NOT_FOUND: Self = Self(-107);
    pub const FILE_NOT_FOUND: Self = Self(-108);
    pub const DIRECTORY_EXISTS: Self = Self(-109);
    pub const CAMERA_BUSY: Self = Self(-110);
    pub const PATH_NOT_ABSOLUTE: Self = Self(-111);
    pub const CANCEL: Self = Self(-112);
    pub const CAMERA_ERROR: Self = Self(-113);
    pub const OS_FAILURE: Self = Self(-114);
    pub const NO_SPACE: Self = Self(-115);

    pub const fn from_raw(code: i32) -> Self {
        Self(code)
    }

    pub const fn as_raw(self) -> i32 {
        self.0
    }

    pub const fn is_ok(self) -> bool {
        self.0 >= 0
    }

    /// Human-readable description of the code.
    pub fn description(self) -> &'static str {
        match self.0 {
            0 => "no error",
            -1 => "unspecified error",
            -2 => "bad parameters",
            -3 => "out of memory",
            -4 => "error in the camera driver",
            -5 => "unknown port",
            -6 => "unsupported operation",
            -7 => "I/O problem",
            -10 => "timeout reading from or writing to the port",
            -53 => "could not claim the USB device",
            -102 => "corrupted data",
            -103 => "file already exists",
            -105 => "unknown model",
            -107 => "directory not found",
            -108 => "file not found",
            -109 => "directory already exists",
            -110 => "camera busy",
            -111 => "path not absolute",
            -112 => "cancelled",
            -113 => "camera error",
            -114 => "OS failure",
            -115 => "not enough space",
            _ => "unknown error",
        }
    }
}

/// Serialized as `{"code": -108, "description": "file not found"}`.
impl Serialize for StatusCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("StatusCode", 2)?;
        s.serialize_field("code", &self.0)?;
        s.serialize_field("description", self.description())?;
        s.end()
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description(), self.0)
    }
}

/// Top-level error type for the `lensctl-transport` crate.
///
/// Every primitive reports failures as a status code tagged with the
/// operation that produced it. `lensctl-core` translates these into its own
/// taxonomy at the component boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The device (or the library driving it) rejected the operation.
    #[error("{operation} failed: {code}")]
    Status {
        operation: &'static str,
        code: StatusCode,
    },

    /// A handle was used after it was released, or never existed.
    #[error("{operation}: {kind} handle {handle} is not live")]
    StaleHandle {
        operation: &'static str,
        kind: &'static str,
        handle: u64,
    },
}

impl Error {
    pub fn status(operation: &'static str, code: StatusCode) -> Self {
        Self::Status { operation, code }
    }

    /// The status code carried by this error. Stale handles report
    /// [`StatusCode::BAD_PARAMETERS`], which is what a native library
    /// returns for an invalid pointer argument.
    pub fn code(&self) -> StatusCode {
        match self {
            Self::Status { code, .. } => *code,
            Self::StaleHandle { .. } => StatusCode::BAD_PARAMETERS,
        }
    }

    /// Name of the primitive that failed.
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Status { operation, .. } | Self::StaleHandle { operation, .. } => operation,
        }
    }

    /// Returns `true` if the device reported that the addressed object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self.code(),
            StatusCode::FILE_NOT_FOUND | StatusCode::DIRECTORY_NOT_FOUND
        )
    }

    /// Returns `true` if this is a transient condition worth retrying later.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.code(),
            StatusCode::TIMEOUT | StatusCode::CAMERA_BUSY | StatusCode::IO_USB_CLAIM
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn status_code_display_includes_description_and_number() {
        assert_eq!(StatusCode::CAMERA_BUSY.to_string(), "camera busy (-110)");
        assert_eq!(StatusCode::from_raw(-999).to_string(), "unknown error (-999)");
    }

    #[test]
    fn status_code_serializes_number_and_description() {
        let json = serde_json::to_value(StatusCode::CORRUPTED_DATA).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "code": -102, "description": "corrupted data" })
        );
    }

    #[test]
    fn stale_handle_reports_bad_parameters() {
        let err = Error::StaleHandle {
            operation: "device_release",
            kind: "device",
            handle: 7,
        };
        assert_eq!(err.code(), StatusCode::BAD_PARAMETERS);
        assert_eq!(err.operation(), "device_release");
    }

    #[test]
    fn not_found_covers_files_and_directories() {
        assert!(Error::status("file_get", StatusCode::FILE_NOT_FOUND).is_not_found());
        assert!(Error::status("list_files", StatusCode::DIRECTORY_NOT_FOUND).is_not_found());
        assert!(!Error::status("file_get", StatusCode::IO).is_not_found());
    }
}
