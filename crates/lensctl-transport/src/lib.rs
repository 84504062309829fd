//! Device transport primitives for `lensctl`.
//!
//! This crate defines the boundary between camera-control logic and the
//! library that actually talks to a camera over USB/PTP:
//!
//! - **[`DeviceTransport`]**: the primitive operations (context/device
//!   lifecycle, capture, event polling, file access, configuration widgets).
//! - **[`Error`] / [`StatusCode`]**: failures tagged with the primitive that
//!   produced them and a libgphoto2-compatible status code.
//! - **[`simulated`]** (feature `simulated`): an in-memory camera with
//!   scripted events, fault injection and a call journal.

pub mod error;
#[cfg(feature = "simulated")]
pub mod simulated;
pub mod transport;
pub mod types;

pub use error::{Error, StatusCode};
pub use transport::{DeviceTransport, Result};
pub use types::{
    ContextHandle, DeviceEvent, DeviceHandle, EventKind, FileKind, FilePath, ListEntry,
    RangeBounds, RawValue, WidgetHandle, WidgetType,
};
