// ── Capture engine ──
//
// Still and preview capture, event-driven capture with a deadline, event
// backlog draining and streaming downloads. Each call holds one session
// lease for its whole duration.

use std::time::Duration;

use bytes::Bytes;
use lensctl_transport::{DeviceEvent, DeviceTransport, FilePath};
use serde::Serialize;
use strum::Display;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::error::CoreError;
use crate::session::{Access, Lease};

/// An image pulled off the camera.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedImage {
    /// Where the camera stored the image.
    pub file: FilePath,
    pub data: Bytes,
}

/// Why [`CaptureEngine::drain_events`] stopped listening.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, Serialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum DrainStop {
    /// The drain window elapsed.
    #[default]
    WindowElapsed,
    /// The camera reported no pending events.
    Idle,
    /// `wait_for_event` failed.
    PollFailed,
    /// An announced file could not be deleted.
    DeleteFailed,
    /// The session could not be leased.
    Unavailable,
}

/// Outcome of a best-effort drain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    pub polls: u32,
    /// Full paths of the files removed from the camera.
    pub deleted: Vec<String>,
    pub stop: DrainStop,
    /// The error that ended the drain, if any.
    pub error: Option<String>,
}

// ── EventWait ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
enum WaitState {
    Polling,
    Arrived(FilePath),
    Expired,
    Cancelled,
}

/// Poll schedule for one event-driven capture: each poll waits for at most
/// `min(poll_interval, remaining)`, so the deadline is never overshot.
#[derive(Debug)]
struct EventWait {
    deadline: Instant,
    poll_interval: Duration,
    polls: u32,
    state: WaitState,
}

impl EventWait {
    fn new(window: Duration, poll_interval: Duration) -> Self {
        Self {
            deadline: Instant::now() + window,
            poll_interval,
            polls: 0,
            state: WaitState::Polling,
        }
    }

    /// Timeout for the next poll; `None` once the deadline has passed.
    fn next_poll(&mut self) -> Option<Duration> {
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            self.state = WaitState::Expired;
            return None;
        }
        self.polls += 1;
        Some(remaining.min(self.poll_interval))
    }

    fn observe(&mut self, event: DeviceEvent) {
        match event {
            DeviceEvent::FileAdded(file) => self.state = WaitState::Arrived(file),
            other => trace!(kind = %other.kind(), "ignoring event"),
        }
    }
}

// ── CaptureEngine ────────────────────────────────────────────────────

/// Capture operations against a connected [`Session`](crate::Session).
pub struct CaptureEngine<'s, T: DeviceTransport> {
    access: Access<'s, T>,
}

impl<'s, T: DeviceTransport> CaptureEngine<'s, T> {
    pub(crate) fn new(access: Access<'s, T>) -> Self {
        Self { access }
    }

    /// Trigger the shutter and download the result.
    ///
    /// If the download fails the image stays on the card. After a
    /// successful download the original is removed when
    /// `delete_after_download` is set; a failed removal is only logged.
    pub async fn still(&self) -> Result<CapturedImage, CoreError> {
        let held = self.access.lease().await?;
        let lease = &*held;
        let file = lease
            .transport()
            .capture_still(lease.context(), lease.device())
            .await
            .map_err(|e| CoreError::Capture { code: e.code() })?;
        debug!(path = %file, "still captured");

        let data = fetch(lease, &file)
            .await
            .map_err(|e| CoreError::download(&file, &e))?;

        if lease.config().delete_after_download {
            remove_quietly(lease, &file).await;
        }
        info!(path = %file, bytes = data.len(), "still downloaded");
        Ok(CapturedImage { file, data })
    }

    /// Grab one live-view frame. Nothing is written to the card.
    pub async fn preview(&self) -> Result<Bytes, CoreError> {
        let held = self.access.lease().await?;
        let lease = &*held;
        lease
            .transport()
            .capture_preview(lease.context(), lease.device())
            .await
            .map_err(|e| CoreError::Capture { code: e.code() })
    }

    /// Wait for the camera to announce a new file (for example after the
    /// physical shutter button was pressed) and download it.
    ///
    /// Only file-added events end the wait. `cancel` is checked between
    /// polls. When the download fails the announced file is deleted from
    /// the card before the error is returned.
    pub async fn on_event(
        &self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<CapturedImage, CoreError> {
        let held = self.access.lease().await?;
        let lease = &*held;
        let transport = lease.transport();
        let mut wait = EventWait::new(timeout, lease.config().poll_interval);

        let file = loop {
            if cancel.is_cancelled() && wait.state == WaitState::Polling {
                wait.state = WaitState::Cancelled;
            }
            match std::mem::replace(&mut wait.state, WaitState::Polling) {
                WaitState::Arrived(file) => break file,
                WaitState::Expired => {
                    debug!(polls = wait.polls, ?timeout, "event capture timed out");
                    return Err(CoreError::Timeout { timeout });
                }
                WaitState::Cancelled => return Err(CoreError::Cancelled),
                WaitState::Polling => {
                    if let Some(poll) = wait.next_poll() {
                        let event = transport
                            .wait_for_event(lease.context(), lease.device(), poll)
                            .await
                            .map_err(|e| CoreError::Capture { code: e.code() })?;
                        wait.observe(event);
                    }
                }
            }
        };
        debug!(path = %file, polls = wait.polls, "file added");

        let data = match fetch(lease, &file).await {
            Ok(data) => data,
            Err(e) => {
                remove_quietly(lease, &file).await;
                return Err(CoreError::download(&file, &e));
            }
        };

        if lease.config().delete_after_download {
            remove_quietly(lease, &file).await;
        }
        info!(path = %file, bytes = data.len(), "event capture downloaded");
        Ok(CapturedImage { file, data })
    }

    /// Delete every file the camera announces within `window`, leaving the
    /// card's capture buffer empty. Stops early once the camera has nothing
    /// more to report. Never fails; the report says why it stopped.
    pub async fn drain_events(&self, window: Duration) -> DrainReport {
        let mut report = DrainReport::default();
        let held = match self.access.lease().await {
            Ok(held) => held,
            Err(e) => {
                report.stop = DrainStop::Unavailable;
                report.error = Some(e.to_string());
                return report;
            }
        };
        let lease = &*held;
        let transport = lease.transport();
        let mut wait = EventWait::new(window, lease.config().poll_interval);

        while let Some(poll) = wait.next_poll() {
            report.polls = wait.polls;
            let event = match transport
                .wait_for_event(lease.context(), lease.device(), poll)
                .await
            {
                Ok(event) => event,
                Err(e) => {
                    report.stop = DrainStop::PollFailed;
                    report.error = Some(e.to_string());
                    break;
                }
            };

            match event {
                DeviceEvent::Timeout => {
                    report.stop = DrainStop::Idle;
                    break;
                }
                DeviceEvent::FileAdded(file) => {
                    if let Err(e) = transport
                        .file_delete(lease.context(), lease.device(), &file.folder, &file.name)
                        .await
                    {
                        report.stop = DrainStop::DeleteFailed;
                        report.error = Some(e.to_string());
                        break;
                    }
                    report.deleted.push(file.to_string());
                }
                DeviceEvent::Other(_) => {}
            }
        }

        debug!(
            deleted = report.deleted.len(),
            stop = %report.stop,
            "event drain finished"
        );
        report
    }

    /// Stream `file` into `sink`, returning the number of bytes written.
    ///
    /// On failure the device file is deleted unless `keep_on_device` is set.
    pub async fn download<W>(
        &self,
        file: &FilePath,
        sink: &mut W,
        keep_on_device: bool,
    ) -> Result<u64, CoreError>
    where
        W: AsyncWrite + Unpin + Send + ?Sized,
    {
        let held = self.access.lease().await?;
        let lease = &*held;
        let result = write_to_sink(lease, file, sink).await;
        if result.is_err() && !keep_on_device {
            remove_quietly(lease, file).await;
        }
        result
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

async fn fetch<T: DeviceTransport>(
    lease: &Lease<'_, T>,
    file: &FilePath,
) -> Result<Bytes, lensctl_transport::Error> {
    lease
        .transport()
        .file_get(
            lease.context(),
            lease.device(),
            &file.folder,
            &file.name,
            lease.config().file_kind,
        )
        .await
}

async fn write_to_sink<T, W>(
    lease: &Lease<'_, T>,
    file: &FilePath,
    sink: &mut W,
) -> Result<u64, CoreError>
where
    T: DeviceTransport,
    W: AsyncWrite + Unpin + Send + ?Sized,
{
    let data = fetch(lease, file)
        .await
        .map_err(|e| CoreError::download(file, &e))?;
    let io_err = |e: std::io::Error| CoreError::Download {
        path: file.to_string(),
        reason: e.to_string(),
    };

    for chunk in data.chunks(lease.config().download_chunk_size.max(1)) {
        sink.write_all(chunk).await.map_err(io_err)?;
    }
    sink.flush().await.map_err(io_err)?;
    Ok(u64::try_from(data.len()).unwrap_or(u64::MAX))
}

async fn remove_quietly<T: DeviceTransport>(lease: &Lease<'_, T>, file: &FilePath) {
    if let Err(e) = lease
        .transport()
        .file_delete(lease.context(), lease.device(), &file.folder, &file.name)
        .await
    {
        warn!(path = %file, error = %e, "could not delete file from camera");
    }
}
