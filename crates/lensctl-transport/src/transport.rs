// ── Device transport interface ──
//
// The narrow set of primitives the core consumes. Device I/O is async;
// widget accessors are synchronous because they only read the in-memory
// tree produced by `config_get_root` / `config_get_single`.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Error;
use crate::types::{
    ContextHandle, DeviceEvent, DeviceHandle, FileKind, FilePath, ListEntry, RangeBounds,
    RawValue, WidgetHandle, WidgetType,
};

pub type Result<T> = std::result::Result<T, Error>;

/// Primitive operations against one physical camera.
///
/// Implementations make no lifecycle guarantees of their own: acquiring,
/// initializing and releasing handles in the right order is the caller's
/// job. Using a released handle must fail with [`Error::StaleHandle`] rather
/// than panic.
#[async_trait]
pub trait DeviceTransport: Send + Sync {
    // ── Context & device lifecycle ───────────────────────────────────

    async fn context_create(&self) -> Result<ContextHandle>;
    async fn context_release(&self, ctx: ContextHandle) -> Result<()>;

    async fn device_create(&self) -> Result<DeviceHandle>;
    async fn device_init(&self, ctx: ContextHandle, dev: DeviceHandle) -> Result<()>;
    async fn device_exit(&self, ctx: ContextHandle, dev: DeviceHandle) -> Result<()>;
    async fn device_release(&self, dev: DeviceHandle) -> Result<()>;

    // ── Capture ──────────────────────────────────────────────────────

    /// Trigger a still capture; returns where the device stored the image.
    async fn capture_still(&self, ctx: ContextHandle, dev: DeviceHandle) -> Result<FilePath>;

    /// Grab one live-view frame. Nothing is stored on the device.
    async fn capture_preview(&self, ctx: ContextHandle, dev: DeviceHandle) -> Result<Bytes>;

    /// Block for at most `timeout` waiting for the next device event.
    async fn wait_for_event(
        &self,
        ctx: ContextHandle,
        dev: DeviceHandle,
        timeout: Duration,
    ) -> Result<DeviceEvent>;

    // ── Files ────────────────────────────────────────────────────────

    async fn file_get(
        &self,
        ctx: ContextHandle,
        dev: DeviceHandle,
        folder: &str,
        name: &str,
        kind: FileKind,
    ) -> Result<Bytes>;

    async fn file_delete(
        &self,
        ctx: ContextHandle,
        dev: DeviceHandle,
        folder: &str,
        name: &str,
    ) -> Result<()>;

    async fn list_folders(
        &self,
        ctx: ContextHandle,
        dev: DeviceHandle,
        path: &str,
    ) -> Result<Vec<ListEntry>>;

    async fn list_files(
        &self,
        ctx: ContextHandle,
        dev: DeviceHandle,
        path: &str,
    ) -> Result<Vec<ListEntry>>;

    // ── Configuration ────────────────────────────────────────────────

    /// Fetch a copy of the full configuration tree. The returned root must
    /// be passed to [`widget_release`](Self::widget_release) exactly once.
    async fn config_get_root(&self, ctx: ContextHandle, dev: DeviceHandle)
    -> Result<WidgetHandle>;

    /// Fetch a copy of the single widget called `name` (exact,
    /// case-sensitive). The result is a root of its own.
    async fn config_get_single(
        &self,
        ctx: ContextHandle,
        dev: DeviceHandle,
        name: &str,
    ) -> Result<WidgetHandle>;

    /// Write the value held by `widget` to the device setting `name`.
    async fn config_commit(
        &self,
        ctx: ContextHandle,
        dev: DeviceHandle,
        name: &str,
        widget: WidgetHandle,
    ) -> Result<()>;

    fn widget_children(&self, widget: WidgetHandle) -> Result<usize>;
    fn widget_child(&self, widget: WidgetHandle, index: usize) -> Result<WidgetHandle>;

    fn widget_name(&self, widget: WidgetHandle) -> Result<String>;
    fn widget_label(&self, widget: WidgetHandle) -> Result<String>;
    fn widget_info(&self, widget: WidgetHandle) -> Result<String>;
    fn widget_type(&self, widget: WidgetHandle) -> Result<WidgetType>;
    fn widget_readonly(&self, widget: WidgetHandle) -> Result<bool>;
    fn widget_value(&self, widget: WidgetHandle) -> Result<RawValue>;

    fn widget_choice_count(&self, widget: WidgetHandle) -> Result<usize>;
    fn widget_choice(&self, widget: WidgetHandle, index: usize) -> Result<String>;
    fn widget_range(&self, widget: WidgetHandle) -> Result<RangeBounds>;

    /// Change the value held by the in-memory widget. Nothing reaches the
    /// device until [`config_commit`](Self::config_commit).
    fn widget_set_value(&self, widget: WidgetHandle, value: &RawValue) -> Result<()>;

    /// Free a tree returned by `config_get_root` / `config_get_single`.
    fn widget_release(&self, root: WidgetHandle) -> Result<()>;
}
