// ── Runtime session configuration ──
//
// These types describe *how* a session behaves: contention handling,
// event polling cadence and what happens to files on the card after a
// download. They never touch disk; lensctl-config builds a
// `SessionConfig` from a profile and hands it in.

use std::time::Duration;

use lensctl_transport::FileKind;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// What a caller experiences when the session is already `Busy`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum BusyPolicy {
    /// Queue behind the running operation.
    #[default]
    Wait,
    /// Return `CoreError::SessionBusy` immediately.
    FailFast,
}

/// Tuning for one [`Session`](crate::Session).
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub busy_policy: BusyPolicy,
    /// Upper bound on a single `wait_for_event` call.
    pub poll_interval: Duration,
    /// How long `drain_events` listens before giving up.
    pub drain_window: Duration,
    /// Remove the device original once a capture has been downloaded.
    pub delete_after_download: bool,
    /// Rendition fetched by downloads.
    pub file_kind: FileKind,
    /// Bytes written to the caller's sink per write call.
    pub download_chunk_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            busy_policy: BusyPolicy::Wait,
            poll_interval: Duration::from_secs(2),
            drain_window: Duration::from_secs(10),
            delete_after_download: true,
            file_kind: FileKind::Normal,
            download_chunk_size: 64 * 1024,
        }
    }
}
