//! In-memory camera implementing [`DeviceTransport`].
//!
//! Behaves like a tethered camera as seen through libgphoto2: configuration
//! fetches return private copies of the settings tree that must be released,
//! commits write a single named setting back, captures materialize files on
//! the card, and `wait_for_event` sleeps on tokio's clock so tests can run
//! with a paused runtime. Every primitive is recorded in a [`Call`] journal
//! and can be made to fail through [`Faults`].

mod faults;
mod fixture;

pub use faults::{Call, Faults};
pub use fixture::{DeviceFixture, FixtureSection, FixtureValue, FixtureWidget};

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::error::{Error, StatusCode};
use crate::transport::{DeviceTransport, Result};
use crate::types::{
    ContextHandle, DeviceEvent, DeviceHandle, FileKind, FilePath, ListEntry, RangeBounds,
    RawValue, WidgetHandle, WidgetType,
};

#[derive(Debug, Clone)]
struct SimWidget {
    name: String,
    label: String,
    info: String,
    kind: WidgetType,
    readonly: bool,
    value: RawValue,
    choices: Vec<String>,
    range: Option<RangeBounds>,
    children: Vec<usize>,
}

struct ScheduledEvent {
    at: Instant,
    event: DeviceEvent,
}

struct SimState {
    capture_folder: String,
    settings: Vec<SimWidget>,
    folders: BTreeSet<String>,
    files: BTreeMap<String, BTreeMap<String, Bytes>>,
    contexts: HashSet<u64>,
    /// Device handle -> initialized.
    devices: HashMap<u64, bool>,
    trees: HashMap<u64, Vec<SimWidget>>,
    next_handle: u64,
    captures: u32,
    events: VecDeque<ScheduledEvent>,
    faults: Faults,
    journal: Vec<Call>,
}

/// A camera that lives entirely in memory.
pub struct SimulatedCamera {
    state: Mutex<SimState>,
}

impl Default for SimulatedCamera {
    fn default() -> Self {
        Self::new(DeviceFixture::generic_dslr())
    }
}

impl SimulatedCamera {
    pub fn new(fixture: DeviceFixture) -> Self {
        let mut settings = vec![SimWidget {
            name: "main".into(),
            label: fixture.model.clone(),
            info: String::new(),
            kind: WidgetType::Window,
            readonly: false,
            value: RawValue::Text(String::new()),
            choices: Vec::new(),
            range: None,
            children: Vec::new(),
        }];

        for section in &fixture.sections {
            let section_idx = settings.len();
            settings.push(SimWidget {
                name: section.name.clone(),
                label: section.label.clone(),
                info: String::new(),
                kind: WidgetType::Section,
                readonly: false,
                value: RawValue::Text(String::new()),
                choices: Vec::new(),
                range: None,
                children: Vec::new(),
            });
            settings[0].children.push(section_idx);

            for widget in &section.widgets {
                let idx = settings.len();
                settings.push(SimWidget {
                    name: widget.name.clone(),
                    label: widget.label.clone(),
                    info: widget.info.clone(),
                    kind: widget.kind,
                    readonly: widget.readonly,
                    value: widget.raw_value(),
                    choices: widget.choices.clone(),
                    range: widget.range,
                    children: Vec::new(),
                });
                settings[section_idx].children.push(idx);
            }
        }

        let faults = Faults {
            value: fixture
                .sections
                .iter()
                .flat_map(|section| &section.widgets)
                .filter(|widget| widget.unreadable)
                .map(|widget| widget.name.clone())
                .collect(),
            ..Faults::default()
        };

        let mut state = SimState {
            capture_folder: normalize_folder(&fixture.capture_folder),
            settings,
            folders: BTreeSet::from(["/".to_owned()]),
            files: BTreeMap::new(),
            contexts: HashSet::new(),
            devices: HashMap::new(),
            trees: HashMap::new(),
            next_handle: 0,
            captures: 0,
            events: VecDeque::new(),
            faults,
            journal: Vec::new(),
        };
        let capture_folder = state.capture_folder.clone();
        state.ensure_folder(&capture_folder);
        for path in &fixture.files {
            if let Some(file) = FilePath::parse(path) {
                state.insert_file(&file, synthetic_jpeg(&file.name));
            } else {
                debug!(path, "ignoring fixture file without a file name");
            }
        }

        Self {
            state: Mutex::new(state),
        }
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Test controls ────────────────────────────────────────────────

    /// Adjust the active faults.
    pub fn inject(&self, f: impl FnOnce(&mut Faults)) {
        f(&mut self.state().faults);
    }

    pub fn clear_faults(&self) {
        self.state().faults = Faults::default();
    }

    /// Every primitive invoked so far, in order.
    pub fn journal(&self) -> Vec<Call> {
        self.state().journal.clone()
    }

    pub fn clear_journal(&self) {
        self.state().journal.clear();
    }

    /// Current device-side value of a setting.
    pub fn setting(&self, name: &str) -> Option<RawValue> {
        let state = self.state();
        state
            .setting_index(name)
            .map(|idx| state.settings[idx].value.clone())
    }

    /// Overwrite a setting directly, bypassing read-only flags.
    pub fn set_setting(&self, name: &str, value: RawValue) -> bool {
        let mut state = self.state();
        match state.setting_index(name) {
            Some(idx) => {
                state.settings[idx].value = value;
                true
            }
            None => false,
        }
    }

    pub fn add_folder(&self, path: &str) {
        self.state().ensure_folder(&normalize_folder(path));
    }

    pub fn add_file(&self, path: &str, data: Bytes) -> bool {
        let Some(file) = FilePath::parse(path) else {
            return false;
        };
        self.state().insert_file(&file, data);
        true
    }

    pub fn file_exists(&self, path: &str) -> bool {
        let Some(file) = FilePath::parse(path) else {
            return false;
        };
        let state = self.state();
        state
            .files
            .get(&normalize_folder(&file.folder))
            .is_some_and(|names| names.contains_key(&file.name))
    }

    /// Deliver `event` from `wait_for_event` once `after` has elapsed.
    pub fn schedule_event(&self, after: Duration, event: DeviceEvent) {
        let at = Instant::now() + after;
        let mut state = self.state();
        let pos = state
            .events
            .iter()
            .position(|e| e.at > at)
            .unwrap_or(state.events.len());
        state.events.insert(pos, ScheduledEvent { at, event });
    }

    /// Write a file to the card now and announce it after `after`, the way a
    /// camera reports a shot taken with its own shutter button.
    pub fn schedule_file_added(&self, after: Duration, path: &str, data: Bytes) -> bool {
        let Some(file) = FilePath::parse(path) else {
            return false;
        };
        self.state().insert_file(&file, data);
        self.schedule_event(after, DeviceEvent::FileAdded(file));
        true
    }

    pub fn live_contexts(&self) -> usize {
        self.state().contexts.len()
    }

    pub fn live_devices(&self) -> usize {
        self.state().devices.len()
    }

    pub fn live_widget_trees(&self) -> usize {
        self.state().trees.len()
    }
}

// ── State helpers ────────────────────────────────────────────────────

impl SimState {
    fn alloc(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn check_session(
        &self,
        operation: &'static str,
        ctx: ContextHandle,
        dev: DeviceHandle,
    ) -> Result<()> {
        if !self.contexts.contains(&ctx.as_raw()) {
            return Err(stale(operation, ContextHandle::KIND, ctx.as_raw()));
        }
        match self.devices.get(&dev.as_raw()) {
            None => Err(stale(operation, DeviceHandle::KIND, dev.as_raw())),
            Some(false) => Err(Error::status(operation, StatusCode::GENERIC)),
            Some(true) => Ok(()),
        }
    }

    fn setting_index(&self, name: &str) -> Option<usize> {
        self.settings.iter().position(|w| w.name == name)
    }

    fn tree_node(&self, operation: &'static str, widget: WidgetHandle) -> Result<&SimWidget> {
        let (tree, idx) = split_handle(widget);
        self.trees
            .get(&tree)
            .and_then(|nodes| nodes.get(idx))
            .ok_or_else(|| stale(operation, WidgetHandle::KIND, widget.as_raw()))
    }

    fn tree_node_mut(
        &mut self,
        operation: &'static str,
        widget: WidgetHandle,
    ) -> Result<&mut SimWidget> {
        let (tree, idx) = split_handle(widget);
        self.trees
            .get_mut(&tree)
            .and_then(|nodes| nodes.get_mut(idx))
            .ok_or_else(|| stale(operation, WidgetHandle::KIND, widget.as_raw()))
    }

    fn ensure_folder(&mut self, folder: &str) {
        let mut current = Some(folder.to_owned());
        while let Some(path) = current {
            current = parent_folder(&path);
            self.folders.insert(path);
        }
    }

    fn insert_file(&mut self, file: &FilePath, data: Bytes) {
        let folder = normalize_folder(&file.folder);
        self.ensure_folder(&folder);
        self.files
            .entry(folder)
            .or_default()
            .insert(file.name.clone(), data);
    }

    fn existing_folder(&self, operation: &'static str, path: &str) -> Result<String> {
        let folder = normalize_folder(path);
        if self.folders.contains(&folder) {
            Ok(folder)
        } else {
            Err(Error::status(operation, StatusCode::DIRECTORY_NOT_FOUND))
        }
    }
}

fn fault(operation: &'static str, code: Option<StatusCode>) -> Result<()> {
    match code {
        Some(code) => Err(Error::status(operation, code)),
        None => Ok(()),
    }
}

fn stale(operation: &'static str, kind: &'static str, handle: u64) -> Error {
    Error::StaleHandle {
        operation,
        kind,
        handle,
    }
}

fn make_handle(tree: u64, idx: usize) -> WidgetHandle {
    WidgetHandle::from_raw((tree << 32) | u64::try_from(idx).unwrap_or(u64::from(u32::MAX)))
}

fn split_handle(widget: WidgetHandle) -> (u64, usize) {
    let raw = widget.as_raw();
    (raw >> 32, usize::try_from(raw & 0xffff_ffff).unwrap_or(usize::MAX))
}

/// `""` and `"/"` are the root; trailing slashes are dropped elsewhere.
fn normalize_folder(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_owned()
    } else if trimmed.starts_with('/') {
        trimmed.to_owned()
    } else {
        format!("/{trimmed}")
    }
}

fn parent_folder(path: &str) -> Option<String> {
    if path == "/" {
        return None;
    }
    let (head, _) = path.rsplit_once('/')?;
    Some(if head.is_empty() { "/".into() } else { head.into() })
}

fn synthetic_jpeg(label: &str) -> Bytes {
    let mut data = vec![0xFF, 0xD8, 0xFF, 0xE0];
    data.extend_from_slice(label.as_bytes());
    data.resize(data.len() + 2048, 0x5A);
    data.extend_from_slice(&[0xFF, 0xD9]);
    Bytes::from(data)
}

fn value_matches_kind(kind: WidgetType, value: &RawValue) -> bool {
    matches!(
        (kind, value),
        (
            WidgetType::Text | WidgetType::Radio | WidgetType::Menu,
            RawValue::Text(_)
        ) | (WidgetType::Range, RawValue::Float(_))
            | (WidgetType::Toggle | WidgetType::Date, RawValue::Int(_))
    )
}

// ── DeviceTransport ──────────────────────────────────────────────────

#[async_trait]
impl DeviceTransport for SimulatedCamera {
    async fn context_create(&self) -> Result<ContextHandle> {
        let mut state = self.state();
        state.journal.push(Call::ContextCreate);
        fault("context_create", state.faults.context_create)?;
        let id = state.alloc();
        state.contexts.insert(id);
        trace!(context = id, "context created");
        Ok(ContextHandle::from_raw(id))
    }

    async fn context_release(&self, ctx: ContextHandle) -> Result<()> {
        let mut state = self.state();
        state.journal.push(Call::ContextRelease(ctx.as_raw()));
        if !state.contexts.remove(&ctx.as_raw()) {
            return Err(stale("context_release", ContextHandle::KIND, ctx.as_raw()));
        }
        fault("context_release", state.faults.context_release)
    }

    async fn device_create(&self) -> Result<DeviceHandle> {
        let mut state = self.state();
        state.journal.push(Call::DeviceCreate);
        fault("device_create", state.faults.device_create)?;
        let id = state.alloc();
        state.devices.insert(id, false);
        Ok(DeviceHandle::from_raw(id))
    }

    async fn device_init(&self, ctx: ContextHandle, dev: DeviceHandle) -> Result<()> {
        let mut state = self.state();
        state.journal.push(Call::DeviceInit(dev.as_raw()));
        if !state.contexts.contains(&ctx.as_raw()) {
            return Err(stale("device_init", ContextHandle::KIND, ctx.as_raw()));
        }
        fault("device_init", state.faults.device_init)?;
        match state.devices.get_mut(&dev.as_raw()) {
            Some(initialized) => {
                *initialized = true;
                Ok(())
            }
            None => Err(stale("device_init", DeviceHandle::KIND, dev.as_raw())),
        }
    }

    async fn device_exit(&self, ctx: ContextHandle, dev: DeviceHandle) -> Result<()> {
        let mut state = self.state();
        state.journal.push(Call::DeviceExit(dev.as_raw()));
        if !state.contexts.contains(&ctx.as_raw()) {
            return Err(stale("device_exit", ContextHandle::KIND, ctx.as_raw()));
        }
        match state.devices.get_mut(&dev.as_raw()) {
            Some(initialized) => *initialized = false,
            None => return Err(stale("device_exit", DeviceHandle::KIND, dev.as_raw())),
        }
        fault("device_exit", state.faults.device_exit)
    }

    async fn device_release(&self, dev: DeviceHandle) -> Result<()> {
        let mut state = self.state();
        state.journal.push(Call::DeviceRelease(dev.as_raw()));
        if state.devices.remove(&dev.as_raw()).is_none() {
            return Err(stale("device_release", DeviceHandle::KIND, dev.as_raw()));
        }
        fault("device_release", state.faults.device_release)
    }

    async fn capture_still(&self, ctx: ContextHandle, dev: DeviceHandle) -> Result<FilePath> {
        let mut state = self.state();
        state.journal.push(Call::CaptureStill);
        state.check_session("capture_still", ctx, dev)?;
        fault("capture_still", state.faults.capture_still)?;
        let name = format!("capt{:04}.jpg", state.captures);
        state.captures += 1;
        let file = FilePath::new(state.capture_folder.clone(), name);
        state.insert_file(&file, synthetic_jpeg(&file.name));
        debug!(path = %file, "simulated capture");
        Ok(file)
    }

    async fn capture_preview(&self, ctx: ContextHandle, dev: DeviceHandle) -> Result<Bytes> {
        let mut state = self.state();
        state.journal.push(Call::CapturePreview);
        state.check_session("capture_preview", ctx, dev)?;
        fault("capture_preview", state.faults.capture_preview)?;
        Ok(synthetic_jpeg("preview"))
    }

    async fn wait_for_event(
        &self,
        ctx: ContextHandle,
        dev: DeviceHandle,
        timeout: Duration,
    ) -> Result<DeviceEvent> {
        let (sleep_for, event) = {
            let mut state = self.state();
            state.journal.push(Call::WaitForEvent);
            state.check_session("wait_for_event", ctx, dev)?;
            fault("wait_for_event", state.faults.wait_for_event)?;
            let now = Instant::now();
            let due = state
                .events
                .front()
                .is_some_and(|e| e.at <= now + timeout);
            if due {
                let next = state.events.pop_front();
                let wait = next
                    .as_ref()
                    .map_or(Duration::ZERO, |e| e.at.saturating_duration_since(now));
                (wait, next.map(|e| e.event))
            } else {
                (timeout, None)
            }
        };

        tokio::time::sleep(sleep_for).await;
        Ok(event.unwrap_or(DeviceEvent::Timeout))
    }

    async fn file_get(
        &self,
        ctx: ContextHandle,
        dev: DeviceHandle,
        folder: &str,
        name: &str,
        _kind: FileKind,
    ) -> Result<Bytes> {
        let mut state = self.state();
        state.journal.push(Call::FileGet {
            path: FilePath::new(folder, name).to_string(),
        });
        state.check_session("file_get", ctx, dev)?;
        fault("file_get", state.faults.file_get)?;
        state
            .files
            .get(&normalize_folder(folder))
            .and_then(|names| names.get(name))
            .cloned()
            .ok_or_else(|| Error::status("file_get", StatusCode::FILE_NOT_FOUND))
    }

    async fn file_delete(
        &self,
        ctx: ContextHandle,
        dev: DeviceHandle,
        folder: &str,
        name: &str,
    ) -> Result<()> {
        let mut state = self.state();
        state.journal.push(Call::FileDelete {
            path: FilePath::new(folder, name).to_string(),
        });
        state.check_session("file_delete", ctx, dev)?;
        fault("file_delete", state.faults.file_delete)?;
        state
            .files
            .get_mut(&normalize_folder(folder))
            .and_then(|names| names.remove(name))
            .map(|_| ())
            .ok_or_else(|| Error::status("file_delete", StatusCode::FILE_NOT_FOUND))
    }

    async fn list_folders(
        &self,
        ctx: ContextHandle,
        dev: DeviceHandle,
        path: &str,
    ) -> Result<Vec<ListEntry>> {
        let mut state = self.state();
        state.journal.push(Call::ListFolders { path: path.into() });
        state.check_session("list_folders", ctx, dev)?;
        fault("list_folders", state.faults.listing)?;
        let folder = state.existing_folder("list_folders", path)?;
        Ok(state
            .folders
            .iter()
            .filter(|f| parent_folder(f).as_deref() == Some(folder.as_str()))
            .filter_map(|f| f.rsplit('/').next())
            .map(|name| ListEntry {
                name: name.to_owned(),
                value: String::new(),
            })
            .collect())
    }

    async fn list_files(
        &self,
        ctx: ContextHandle,
        dev: DeviceHandle,
        path: &str,
    ) -> Result<Vec<ListEntry>> {
        let mut state = self.state();
        state.journal.push(Call::ListFiles { path: path.into() });
        state.check_session("list_files", ctx, dev)?;
        fault("list_files", state.faults.listing)?;
        let folder = state.existing_folder("list_files", path)?;
        Ok(state
            .files
            .get(&folder)
            .map(|names| {
                names
                    .keys()
                    .map(|name| ListEntry {
                        name: name.clone(),
                        value: String::new(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn config_get_root(
        &self,
        ctx: ContextHandle,
        dev: DeviceHandle,
    ) -> Result<WidgetHandle> {
        let mut state = self.state();
        state.journal.push(Call::ConfigGetRoot);
        state.check_session("config_get_root", ctx, dev)?;
        fault("config_get_root", state.faults.config_get_root)?;
        let tree = state.alloc();
        let copy = state.settings.clone();
        state.trees.insert(tree, copy);
        Ok(make_handle(tree, 0))
    }

    async fn config_get_single(
        &self,
        ctx: ContextHandle,
        dev: DeviceHandle,
        name: &str,
    ) -> Result<WidgetHandle> {
        let mut state = self.state();
        state.journal.push(Call::ConfigGetSingle { name: name.into() });
        state.check_session("config_get_single", ctx, dev)?;
        let idx = state
            .setting_index(name)
            .ok_or_else(|| Error::status("config_get_single", StatusCode::BAD_PARAMETERS))?;
        let mut node = state.settings[idx].clone();
        node.children.clear();
        let tree = state.alloc();
        state.trees.insert(tree, vec![node]);
        Ok(make_handle(tree, 0))
    }

    async fn config_commit(
        &self,
        ctx: ContextHandle,
        dev: DeviceHandle,
        name: &str,
        widget: WidgetHandle,
    ) -> Result<()> {
        let mut state = self.state();
        let value = state.tree_node("config_commit", widget)?.value.clone();
        state.journal.push(Call::ConfigCommit {
            name: name.into(),
            value: value.clone(),
        });
        state.check_session("config_commit", ctx, dev)?;
        fault("config_commit", state.faults.commit.get(name).copied())?;
        let keyed = (name.to_owned(), value.to_string());
        fault("config_commit", state.faults.commit_value.get(&keyed).copied())?;
        let idx = state
            .setting_index(name)
            .ok_or_else(|| Error::status("config_commit", StatusCode::BAD_PARAMETERS))?;
        if state.settings[idx].readonly {
            return Err(Error::status("config_commit", StatusCode::NOT_SUPPORTED));
        }
        state.settings[idx].value = value;
        Ok(())
    }

    fn widget_children(&self, widget: WidgetHandle) -> Result<usize> {
        let state = self.state();
        let node = state.tree_node("widget_children", widget)?;
        if state.faults.children.contains(&node.name) {
            return Err(Error::status("widget_children", StatusCode::CORRUPTED_DATA));
        }
        Ok(node.children.len())
    }

    fn widget_child(&self, widget: WidgetHandle, index: usize) -> Result<WidgetHandle> {
        let state = self.state();
        let node = state.tree_node("widget_child", widget)?;
        if state.faults.child.contains(&(node.name.clone(), index)) {
            return Err(Error::status("widget_child", StatusCode::CORRUPTED_DATA));
        }
        let child = node
            .children
            .get(index)
            .copied()
            .ok_or_else(|| Error::status("widget_child", StatusCode::BAD_PARAMETERS))?;
        Ok(make_handle(split_handle(widget).0, child))
    }

    fn widget_name(&self, widget: WidgetHandle) -> Result<String> {
        Ok(self.state().tree_node("widget_name", widget)?.name.clone())
    }

    fn widget_label(&self, widget: WidgetHandle) -> Result<String> {
        Ok(self.state().tree_node("widget_label", widget)?.label.clone())
    }

    fn widget_info(&self, widget: WidgetHandle) -> Result<String> {
        Ok(self.state().tree_node("widget_info", widget)?.info.clone())
    }

    fn widget_type(&self, widget: WidgetHandle) -> Result<WidgetType> {
        Ok(self.state().tree_node("widget_type", widget)?.kind)
    }

    fn widget_readonly(&self, widget: WidgetHandle) -> Result<bool> {
        Ok(self.state().tree_node("widget_readonly", widget)?.readonly)
    }

    fn widget_value(&self, widget: WidgetHandle) -> Result<RawValue> {
        let state = self.state();
        let node = state.tree_node("widget_value", widget)?;
        if state.faults.value.contains(&node.name) {
            return Err(Error::status("widget_value", StatusCode::CORRUPTED_DATA));
        }
        Ok(node.value.clone())
    }

    fn widget_choice_count(&self, widget: WidgetHandle) -> Result<usize> {
        Ok(self
            .state()
            .tree_node("widget_choice_count", widget)?
            .choices
            .len())
    }

    fn widget_choice(&self, widget: WidgetHandle, index: usize) -> Result<String> {
        let state = self.state();
        let node = state.tree_node("widget_choice", widget)?;
        if state.faults.choice.contains(&(node.name.clone(), index)) {
            return Err(Error::status("widget_choice", StatusCode::CORRUPTED_DATA));
        }
        node.choices
            .get(index)
            .cloned()
            .ok_or_else(|| Error::status("widget_choice", StatusCode::BAD_PARAMETERS))
    }

    fn widget_range(&self, widget: WidgetHandle) -> Result<RangeBounds> {
        self.state()
            .tree_node("widget_range", widget)?
            .range
            .ok_or_else(|| Error::status("widget_range", StatusCode::BAD_PARAMETERS))
    }

    fn widget_set_value(&self, widget: WidgetHandle, value: &RawValue) -> Result<()> {
        let mut state = self.state();
        let name = state.tree_node("widget_set_value", widget)?.name.clone();
        state.journal.push(Call::WidgetSetValue {
            name: name.clone(),
            value: value.clone(),
        });
        fault("widget_set_value", state.faults.set_value.get(&name).copied())?;
        let node = state.tree_node_mut("widget_set_value", widget)?;
        if !value_matches_kind(node.kind, value) {
            return Err(Error::status("widget_set_value", StatusCode::BAD_PARAMETERS));
        }
        node.value = value.clone();
        Ok(())
    }

    fn widget_release(&self, root: WidgetHandle) -> Result<()> {
        let mut state = self.state();
        state.journal.push(Call::WidgetRelease(root.as_raw()));
        let (tree, idx) = split_handle(root);
        if idx != 0 {
            return Err(Error::status("widget_release", StatusCode::BAD_PARAMETERS));
        }
        state
            .trees
            .remove(&tree)
            .map(|_| ())
            .ok_or_else(|| stale("widget_release", WidgetHandle::KIND, root.as_raw()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_folder_strips_trailing_slash_but_keeps_root() {
        assert_eq!(normalize_folder(""), "/");
        assert_eq!(normalize_folder("/"), "/");
        assert_eq!(normalize_folder("/DCIM/"), "/DCIM");
        assert_eq!(normalize_folder("DCIM"), "/DCIM");
    }

    #[test]
    fn parent_folder_walks_up_to_root() {
        assert_eq!(parent_folder("/a/b").as_deref(), Some("/a"));
        assert_eq!(parent_folder("/a").as_deref(), Some("/"));
        assert_eq!(parent_folder("/"), None);
    }

    #[test]
    fn widget_handles_round_trip() {
        let handle = make_handle(42, 7);
        assert_eq!(split_handle(handle), (42, 7));
    }

    #[test]
    fn fixture_files_create_ancestor_folders() {
        let camera = SimulatedCamera::default();
        assert!(camera.file_exists("/store_00010001/DCIM/100CANON/IMG_0001.JPG"));
        let state = camera.state();
        assert!(state.folders.contains("/store_00010001"));
        assert!(state.folders.contains("/store_00010001/DCIM"));
    }
}
