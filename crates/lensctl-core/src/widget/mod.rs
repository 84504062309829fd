//! Configuration tree engine.
//!
//! [`ConfigEngine`] snapshots the camera's settings into an arena-indexed
//! [`WidgetTree`], resolves single settings by name, and writes values back
//! one at a time or as a [batch](ConfigEngine::write_batch) with rollback.

mod batch;
mod engine;
mod record;
mod tree;
mod value;

pub use batch::{BatchReport, ConflictPolicy, ItemState, PendingWrite};
pub use engine::{ConfigEngine, WriteOutcome};
pub use record::WidgetRecord;
pub use tree::{Partial, PartialResultWarning, WidgetId, WidgetNode, WidgetTree};
pub use value::{TOGGLE_UNSUPPORTED, ToggleState, WidgetValue};
