// ── Fault injection and call journal ──

use std::collections::{HashMap, HashSet};

use crate::error::StatusCode;
use crate::types::RawValue;

/// Failures the simulated camera should report.
///
/// Each field names the primitive it affects; `None` (or an empty set)
/// means the primitive behaves normally. Faults stay in place until cleared.
#[derive(Debug, Clone, Default)]
pub struct Faults {
    pub context_create: Option<StatusCode>,
    pub context_release: Option<StatusCode>,
    pub device_create: Option<StatusCode>,
    pub device_init: Option<StatusCode>,
    pub device_exit: Option<StatusCode>,
    pub device_release: Option<StatusCode>,
    pub capture_still: Option<StatusCode>,
    pub capture_preview: Option<StatusCode>,
    pub wait_for_event: Option<StatusCode>,
    pub file_get: Option<StatusCode>,
    pub file_delete: Option<StatusCode>,
    pub listing: Option<StatusCode>,
    pub config_get_root: Option<StatusCode>,
    /// `config_commit` failures keyed by setting name.
    pub commit: HashMap<String, StatusCode>,
    /// `config_commit` failures keyed by setting name and the value being
    /// committed, for failing only a specific write (such as a restore).
    pub commit_value: HashMap<(String, String), StatusCode>,
    /// `widget_set_value` failures keyed by setting name.
    pub set_value: HashMap<String, StatusCode>,
    /// `widget_children` failures keyed by parent name.
    pub children: HashSet<String>,
    /// `widget_child` failures, as `(parent name, child index)`.
    pub child: HashSet<(String, usize)>,
    /// `widget_choice` failures, as `(widget name, choice index)`.
    pub choice: HashSet<(String, usize)>,
    /// `widget_value` failures keyed by widget name.
    pub value: HashSet<String>,
}

/// One primitive invocation, recorded whether or not it succeeded.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    ContextCreate,
    ContextRelease(u64),
    DeviceCreate,
    DeviceInit(u64),
    DeviceExit(u64),
    DeviceRelease(u64),
    CaptureStill,
    CapturePreview,
    WaitForEvent,
    FileGet { path: String },
    FileDelete { path: String },
    ListFolders { path: String },
    ListFiles { path: String },
    ConfigGetRoot,
    ConfigGetSingle { name: String },
    ConfigCommit { name: String, value: RawValue },
    WidgetSetValue { name: String, value: RawValue },
    WidgetRelease(u64),
}

impl Call {
    pub fn is_device_release(&self) -> bool {
        matches!(self, Self::DeviceRelease(_))
    }

    pub fn is_commit(&self) -> bool {
        matches!(self, Self::ConfigCommit { .. })
    }
}
