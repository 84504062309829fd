// ── Configuration engine ──
//
// Reads the camera's settings into `WidgetTree` snapshots and writes single
// values back. Every tree fetched from the transport is owned by a
// `WidgetRoot` guard, so it is released on every exit path.

use lensctl_transport::{DeviceTransport, StatusCode, WidgetHandle, WidgetType};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::tree::{Partial, PartialResultWarning, WidgetId, WidgetNode, WidgetTree};
use super::value::WidgetValue;
use crate::error::CoreError;
use crate::session::{Access, Lease};

/// Result of a single write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WriteOutcome {
    /// The requested value was already set; nothing was sent to the camera.
    Unchanged,
    Applied { old: String, new: String },
}

// ── WidgetRoot ───────────────────────────────────────────────────────

/// Owns a fetched configuration tree and releases it on drop.
pub(crate) struct WidgetRoot<'a, T: DeviceTransport> {
    transport: &'a T,
    handle: WidgetHandle,
}

impl<'a, T: DeviceTransport> WidgetRoot<'a, T> {
    pub(crate) fn new(transport: &'a T, handle: WidgetHandle) -> Self {
        Self { transport, handle }
    }

    pub(crate) fn handle(&self) -> WidgetHandle {
        self.handle
    }
}

impl<T: DeviceTransport> Drop for WidgetRoot<'_, T> {
    fn drop(&mut self) {
        if let Err(e) = self.transport.widget_release(self.handle) {
            warn!(error = %e, "failed to release configuration tree");
        }
    }
}

/// A single setting fetched by name, with its live handle.
pub(crate) struct SingleWidget<'a, T: DeviceTransport> {
    pub(crate) root: WidgetRoot<'a, T>,
    pub(crate) node: WidgetNode,
}

// ── Reading ──────────────────────────────────────────────────────────

/// Read everything about one widget except its children.
///
/// Metadata failures fail the node; value and choice failures degrade to
/// `Unreadable` / a shorter choice list and are reported as warnings.
pub(crate) fn read_node<T: DeviceTransport>(
    transport: &T,
    handle: WidgetHandle,
    warnings: &mut Vec<PartialResultWarning>,
) -> Result<WidgetNode, lensctl_transport::Error> {
    let name = transport.widget_name(handle)?;
    let kind = transport.widget_type(handle)?;
    let label = transport.widget_label(handle)?;
    let info = transport.widget_info(handle)?;
    let read_only = transport.widget_readonly(handle)?;

    let mut warn_on = |item: String, err: &lensctl_transport::Error| {
        debug!(widget = %name, item, error = %err, "partial widget read");
        warnings.push(PartialResultWarning {
            widget: name.clone(),
            item,
            code: err.code(),
        });
    };

    let choices = if matches!(kind, WidgetType::Radio | WidgetType::Menu) {
        match transport.widget_choice_count(handle) {
            Ok(count) => (0..count)
                .filter_map(|i| match transport.widget_choice(handle, i) {
                    Ok(choice) => Some(choice),
                    Err(e) => {
                        warn_on(format!("choice {i}"), &e);
                        None
                    }
                })
                .collect(),
            Err(e) => {
                warn_on("choices".into(), &e);
                Vec::new()
            }
        }
    } else {
        Vec::new()
    };

    let range = if kind == WidgetType::Range {
        match transport.widget_range(handle) {
            Ok(range) => Some(range),
            Err(e) => {
                warn_on("range".into(), &e);
                None
            }
        }
    } else {
        None
    };

    let value = if kind.is_container() {
        WidgetValue::Group
    } else {
        match transport.widget_value(handle) {
            Ok(raw) => WidgetValue::from_raw(kind, raw, choices, range),
            Err(e) => {
                warn_on("value".into(), &e);
                WidgetValue::Unreadable
            }
        }
    };

    Ok(WidgetNode {
        id: WidgetId(0),
        name,
        label,
        info,
        kind,
        read_only,
        value,
        parent: None,
        children: Vec::new(),
    })
}

/// Resolve `name` on the device. Unknown names and containers are
/// `NotFound`.
pub(crate) async fn fetch_single<'a, T: DeviceTransport>(
    lease: &'a Lease<'_, T>,
    name: &str,
    warnings: &mut Vec<PartialResultWarning>,
) -> Result<SingleWidget<'a, T>, CoreError> {
    let transport = lease.transport();
    let handle = transport
        .config_get_single(lease.context(), lease.device(), name)
        .await
        .map_err(|e| {
            if e.code() == StatusCode::BAD_PARAMETERS || e.is_not_found() {
                CoreError::NotFound { name: name.into() }
            } else {
                e.into()
            }
        })?;
    let root = WidgetRoot::new(transport, handle);
    let node = read_node(transport, handle, warnings)?;

    if !node.is_leaf() || node.name != name {
        return Err(CoreError::NotFound { name: name.into() });
    }
    Ok(SingleWidget { root, node })
}

/// Decide what writing `input` over `node` means.
///
/// `Ok(None)` is a no-op: the value is already current.
pub(crate) fn plan_write(
    node: &WidgetNode,
    input: &str,
) -> Result<Option<lensctl_transport::RawValue>, CoreError> {
    if node.read_only {
        return Err(CoreError::ReadOnly {
            name: node.name.clone(),
        });
    }

    let current = node.value.raw();
    if current.is_some() && node.value.encode() == input {
        return Ok(None);
    }

    let raw = node
        .value
        .parse_input(input)
        .map_err(|reason| CoreError::InvalidValue {
            name: node.name.clone(),
            value: input.into(),
            reason,
        })?;
    if current.as_ref() == Some(&raw) {
        return Ok(None);
    }
    Ok(Some(raw))
}

// ── ConfigEngine ─────────────────────────────────────────────────────

/// Configuration access for a connected [`Session`](crate::Session).
pub struct ConfigEngine<'s, T: DeviceTransport> {
    pub(crate) access: Access<'s, T>,
}

impl<'s, T: DeviceTransport> ConfigEngine<'s, T> {
    pub(crate) fn new(access: Access<'s, T>) -> Self {
        Self { access }
    }

    /// Snapshot the whole configuration tree.
    ///
    /// Sections or settings that cannot be enumerated are skipped and
    /// reported as warnings instead of failing the fetch. If the root's
    /// children cannot be counted the tree holds only the root.
    pub async fn fetch_tree(&self) -> Result<Partial<WidgetTree>, CoreError> {
        let held = self.access.lease().await?;
        let lease = &*held;
        let transport = lease.transport();
        let handle = transport
            .config_get_root(lease.context(), lease.device())
            .await?;
        let root = WidgetRoot::new(transport, handle);

        let mut warnings = Vec::new();
        let root_node = read_node(transport, root.handle(), &mut warnings)?;
        let mut tree = WidgetTree::new(root_node, lease.generation());

        let section_count = match transport.widget_children(root.handle()) {
            Ok(count) => count,
            Err(e) => {
                skip_warning(&mut warnings, &tree.root().name, "children".into(), &e);
                0
            }
        };
        for s in 0..section_count {
            let Some((section_handle, section)) =
                read_child(transport, root.handle(), s, &tree.root().name, &mut warnings)
            else {
                continue;
            };
            let section_name = section.name.clone();
            let section_id = tree.push(WidgetId(0), section);

            let leaf_count = match transport.widget_children(section_handle) {
                Ok(count) => count,
                Err(e) => {
                    skip_warning(&mut warnings, &section_name, "children".into(), &e);
                    0
                }
            };
            for l in 0..leaf_count {
                if let Some((_, leaf)) =
                    read_child(transport, section_handle, l, &section_name, &mut warnings)
                {
                    tree.push(section_id, leaf);
                }
            }
        }

        debug!(
            nodes = tree.len(),
            warnings = warnings.len(),
            "configuration tree fetched"
        );
        Ok(Partial {
            value: tree,
            warnings,
        })
    }

    /// Resolve one setting by exact name, fresh from the camera.
    pub async fn lookup_by_name(&self, name: &str) -> Result<Partial<WidgetNode>, CoreError> {
        let held = self.access.lease().await?;
        let lease = &*held;
        let mut warnings = Vec::new();
        let single = fetch_single(lease, name, &mut warnings).await?;
        Ok(Partial {
            value: single.node,
            warnings,
        })
    }

    /// Current value of one setting.
    pub async fn read_value(&self, name: &str) -> Result<Partial<WidgetValue>, CoreError> {
        Ok(self.lookup_by_name(name).await?.map(|node| node.value))
    }

    /// Set one setting and commit it to the camera.
    ///
    /// Writing the value a setting already has sends nothing to the camera.
    pub async fn write_value(&self, name: &str, value: &str) -> Result<WriteOutcome, CoreError> {
        let held = self.access.lease().await?;
        let lease = &*held;
        let transport = lease.transport();
        let mut warnings = Vec::new();
        let single = fetch_single(lease, name, &mut warnings).await?;

        let Some(raw) = plan_write(&single.node, value)? else {
            debug!(name, value, "value already current");
            return Ok(WriteOutcome::Unchanged);
        };
        let old = single.node.value.encode();

        transport
            .widget_set_value(single.root.handle(), &raw)
            .map_err(|e| set_value_error(name, value, &e))?;
        transport
            .config_commit(lease.context(), lease.device(), name, single.root.handle())
            .await
            .map_err(|e| CoreError::Commit {
                name: name.into(),
                code: e.code(),
            })?;

        info!(name, old = %old, new = %raw, "setting written");
        Ok(WriteOutcome::Applied {
            old,
            new: raw.to_string(),
        })
    }

    /// Whether `tree` still reflects the session's current device handle.
    pub fn is_current(&self, tree: &WidgetTree) -> bool {
        !tree.is_stale(self.access.generation())
    }
}

pub(crate) fn set_value_error(
    name: &str,
    value: &str,
    err: &lensctl_transport::Error,
) -> CoreError {
    if err.code() == StatusCode::BAD_PARAMETERS {
        CoreError::InvalidValue {
            name: name.into(),
            value: value.into(),
            reason: format!("rejected by the camera: {}", err.code()),
        }
    } else {
        err.clone().into()
    }
}

fn read_child<T: DeviceTransport>(
    transport: &T,
    parent: WidgetHandle,
    index: usize,
    parent_name: &str,
    warnings: &mut Vec<PartialResultWarning>,
) -> Option<(WidgetHandle, WidgetNode)> {
    let handle = match transport.widget_child(parent, index) {
        Ok(handle) => handle,
        Err(e) => {
            skip_warning(warnings, parent_name, format!("child {index}"), &e);
            return None;
        }
    };
    match read_node(transport, handle, warnings) {
        Ok(node) => Some((handle, node)),
        Err(e) => {
            skip_warning(warnings, parent_name, format!("child {index}"), &e);
            None
        }
    }
}

fn skip_warning(
    warnings: &mut Vec<PartialResultWarning>,
    widget: &str,
    item: String,
    err: &lensctl_transport::Error,
) {
    warn!(widget, item, error = %err, "skipping unreadable widget");
    warnings.push(PartialResultWarning {
        widget: widget.into(),
        item,
        code: err.code(),
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use lensctl_transport::RawValue;
    use lensctl_transport::simulated::{Call, SimulatedCamera};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::config::SessionConfig;
    use crate::session::Session;

    async fn connected() -> (Arc<SimulatedCamera>, Session<SimulatedCamera>) {
        let camera = Arc::new(SimulatedCamera::default());
        let session = Session::new(Arc::clone(&camera), SessionConfig::default());
        session.connect().await.unwrap();
        (camera, session)
    }

    #[tokio::test]
    async fn fetch_tree_is_three_levels_and_releases_root() {
        let (camera, session) = connected().await;

        let fetched = session.settings().fetch_tree().await.unwrap();
        assert!(fetched.is_complete());
        let tree = fetched.value;
        assert_eq!(tree.root().kind, WidgetType::Window);
        assert_eq!(tree.sections().count(), 5);
        for section in tree.sections() {
            assert_eq!(section.kind, WidgetType::Section);
            for leaf in tree.children(section.id) {
                assert!(leaf.is_leaf());
                assert!(leaf.children.is_empty());
            }
        }
        assert_eq!(camera.live_widget_trees(), 0);
    }

    #[tokio::test]
    async fn fetch_then_lookup_agree() {
        let (_camera, session) = connected().await;
        let tree = session.settings().fetch_tree().await.unwrap().value;

        for leaf in tree.leaves() {
            let fresh = session.settings().lookup_by_name(&leaf.name).await.unwrap();
            assert_eq!(fresh.value.value, leaf.value, "{}", leaf.name);
            assert_eq!(fresh.value.read_only, leaf.read_only);
            assert_eq!(tree.lookup(&leaf.name).unwrap().id, leaf.id);
        }
    }

    #[tokio::test]
    async fn unreadable_children_become_warnings() {
        let (camera, session) = connected().await;
        camera.inject(|f| {
            f.child.insert(("imgsettings".into(), 1));
            f.choice.insert(("iso".into(), 0));
            f.value.insert("batterylevel".into());
        });

        let fetched = session.settings().fetch_tree().await.unwrap();
        assert_eq!(fetched.warnings.len(), 3);
        let tree = fetched.value;
        assert!(tree.lookup("whitebalance").is_none());
        assert!(!tree.lookup("iso").unwrap().choices().contains(&"Auto".to_owned()));
        assert_eq!(
            tree.lookup("batterylevel").unwrap().value,
            WidgetValue::Unreadable
        );
        assert_eq!(camera.live_widget_trees(), 0);
    }

    #[tokio::test]
    async fn unreadable_root_yields_bare_tree_with_warning() {
        let (camera, session) = connected().await;
        camera.inject(|f| {
            f.children.insert("main".into());
        });

        let fetched = session.settings().fetch_tree().await.unwrap();
        assert_eq!(fetched.warnings.len(), 1);
        assert_eq!(fetched.warnings[0].widget, "main");
        assert_eq!(fetched.warnings[0].item, "children");
        assert_eq!(fetched.value.len(), 1);
        assert_eq!(fetched.value.sections().count(), 0);
        assert_eq!(camera.live_widget_trees(), 0);
    }

    #[tokio::test]
    async fn lookup_is_exact_and_leaf_only() {
        let (camera, session) = connected().await;
        let settings = session.settings();

        assert!(matches!(
            settings.lookup_by_name("ISO").await,
            Err(CoreError::NotFound { .. })
        ));
        assert!(matches!(
            settings.lookup_by_name("imgsettings").await,
            Err(CoreError::NotFound { .. })
        ));
        let iso = settings.lookup_by_name("iso").await.unwrap().value;
        assert_eq!(iso.value.encode(), "100");
        assert_eq!(camera.live_widget_trees(), 0);
    }

    #[tokio::test]
    async fn unsupported_toggle_reads_as_empty() {
        let (_camera, session) = connected().await;
        let node = session.settings().lookup_by_name("autofocus").await.unwrap().value;
        assert_eq!(node.value.encode(), "");
        assert_eq!(node.choices(), vec!["not supported"]);
    }

    #[tokio::test]
    async fn write_value_sets_and_commits() {
        let (camera, session) = connected().await;

        let outcome = session.settings().write_value("iso", "400").await.unwrap();
        assert_eq!(
            outcome,
            WriteOutcome::Applied {
                old: "100".into(),
                new: "400".into()
            }
        );
        assert_eq!(camera.setting("iso"), Some(RawValue::Text("400".into())));
        assert_eq!(camera.live_widget_trees(), 0);
    }

    #[tokio::test]
    async fn idempotent_write_touches_nothing() {
        let (camera, session) = connected().await;
        camera.clear_journal();

        let outcome = session.settings().write_value("iso", "100").await.unwrap();
        assert_eq!(outcome, WriteOutcome::Unchanged);
        let outcome = session
            .settings()
            .write_value("exposurecompensation", "0.0")
            .await
            .unwrap();
        assert_eq!(outcome, WriteOutcome::Unchanged);

        let journal = camera.journal();
        assert!(!journal.iter().any(Call::is_commit));
        assert!(
            !journal
                .iter()
                .any(|c| matches!(c, Call::WidgetSetValue { .. }))
        );
    }

    #[tokio::test]
    async fn read_only_and_invalid_values_are_rejected_before_writing() {
        let (camera, session) = connected().await;
        camera.clear_journal();
        let settings = session.settings();

        assert!(matches!(
            settings.write_value("serialnumber", "x").await,
            Err(CoreError::ReadOnly { .. })
        ));
        assert!(matches!(
            settings.write_value("iso", "12345").await,
            Err(CoreError::InvalidValue { .. })
        ));
        assert!(matches!(
            settings.write_value("exposurecompensation", "9").await,
            Err(CoreError::InvalidValue { .. })
        ));
        assert!(matches!(
            settings.write_value("viewfinder", "maybe").await,
            Err(CoreError::InvalidValue { .. })
        ));
        assert!(matches!(
            settings.write_value("autofocusdrive", "1").await,
            Err(CoreError::InvalidValue { .. })
        ));
        assert!(!camera.journal().iter().any(Call::is_commit));
    }

    #[tokio::test]
    async fn commit_failure_is_reported_as_commit_error() {
        let (camera, session) = connected().await;
        camera.inject(|f| {
            f.commit.insert("whitebalance".into(), StatusCode::CAMERA_BUSY);
        });

        let err = session
            .settings()
            .write_value("whitebalance", "Daylight")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::Commit {
                code: StatusCode::CAMERA_BUSY,
                ..
            }
        ));
        assert_eq!(camera.setting("whitebalance"), Some(RawValue::Text("Auto".into())));
        assert_eq!(camera.live_widget_trees(), 0);
    }

    #[tokio::test]
    async fn datetime_accepts_rfc3339() {
        let (camera, session) = connected().await;
        session
            .settings()
            .write_value("datetime", "2024-01-01T00:00:00Z")
            .await
            .unwrap();
        assert_eq!(camera.setting("datetime"), Some(RawValue::Int(1_704_067_200)));
    }

    #[tokio::test]
    async fn reinitialize_makes_snapshots_stale() {
        let (_camera, session) = connected().await;
        let tree = session.settings().fetch_tree().await.unwrap().value;
        assert!(session.settings().is_current(&tree));

        session.reinitialize().await.unwrap();
        assert!(!session.settings().is_current(&tree));
    }
}
