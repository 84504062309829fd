// lensctl-core: Session lifecycle, capture and configuration engines on top of lensctl-transport.

pub mod capture;
pub mod catalog;
pub mod config;
pub mod error;
pub mod session;
pub mod widget;

// ── Primary re-exports ──────────────────────────────────────────────
pub use capture::{CaptureEngine, CapturedImage, DrainReport, DrainStop};
pub use catalog::{CapturedFile, FileCatalog};
pub use config::{BusyPolicy, SessionConfig};
pub use error::{CoreError, RollbackFailure};
pub use session::{Lease, Session, SessionState};
pub use widget::{
    BatchReport, ConfigEngine, ConflictPolicy, ItemState, Partial, PartialResultWarning,
    PendingWrite, ToggleState, WidgetId, WidgetNode, WidgetRecord, WidgetTree, WidgetValue,
    WriteOutcome,
};

// Transport types that appear in this crate's public API.
pub use lensctl_transport::{DeviceTransport, FileKind, FilePath, StatusCode};
pub use tokio_util::sync::CancellationToken;
