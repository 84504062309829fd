// ── Transactional batch writes ──
//
// A batch validates every item and captures its old value before anything
// is written. Under `AllOrNothing` the first failure reverts the committed
// items in reverse order; under `BestEffort` every item is attempted and
// the report carries per-item errors.

use std::collections::HashSet;

use lensctl_transport::{DeviceTransport, RawValue, WidgetType};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::{debug, info, warn};

use super::engine::{ConfigEngine, SingleWidget, fetch_single, plan_write, set_value_error};
use super::record::WidgetRecord;
use crate::error::{CoreError, RollbackFailure};
use crate::session::Lease;

/// How a batch reacts to a failing item.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy {
    /// Stop at the first failure and restore every committed item.
    #[default]
    AllOrNothing,
    /// Attempt every item; failures are reported per item.
    BestEffort,
}

/// Lifecycle of one item in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ItemState {
    Pending,
    Validated,
    /// Value set on the fetched widget, not yet committed.
    Applied,
    Committed,
    /// Value already current; nothing was sent.
    Unchanged,
    RolledBack,
    Failed,
    /// Never attempted because an earlier item aborted the batch.
    Skipped,
}

/// One `(name, value)` change and what became of it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingWrite {
    pub name: String,
    pub value: String,
    /// Encoded value before the batch ran; captured during validation.
    pub old_value: Option<String>,
    pub state: ItemState,
    pub error: Option<String>,
    #[serde(skip)]
    old_raw: Option<RawValue>,
    #[serde(skip)]
    new_raw: Option<RawValue>,
}

impl PendingWrite {
    fn new(name: String, value: String) -> Self {
        Self {
            name,
            value,
            old_value: None,
            state: ItemState::Pending,
            error: None,
            old_raw: None,
            new_raw: None,
        }
    }

    fn fail(&mut self, err: &CoreError) {
        self.state = ItemState::Failed;
        self.error = Some(err.to_string());
    }
}

/// Per-item outcome of a batch that was not aborted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    pub policy: ConflictPolicy,
    pub items: Vec<PendingWrite>,
}

impl BatchReport {
    pub fn failures(&self) -> impl Iterator<Item = &PendingWrite> {
        self.items.iter().filter(|i| i.state == ItemState::Failed)
    }

    pub fn committed(&self) -> impl Iterator<Item = &PendingWrite> {
        self.items.iter().filter(|i| i.state == ItemState::Committed)
    }

    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }
}

impl<T: DeviceTransport> ConfigEngine<'_, T> {
    /// Write several settings under one lease.
    ///
    /// Under [`ConflictPolicy::AllOrNothing`] any failure returns
    /// [`CoreError::BatchAborted`] carrying the triggering error and any
    /// setting that could not be restored.
    pub async fn write_batch<I, N, V>(
        &self,
        changes: I,
        policy: ConflictPolicy,
    ) -> Result<BatchReport, CoreError>
    where
        I: IntoIterator<Item = (N, V)>,
        N: Into<String>,
        V: Into<String>,
    {
        let mut items: Vec<PendingWrite> = changes
            .into_iter()
            .map(|(n, v)| PendingWrite::new(n.into(), v.into()))
            .collect();

        let held = self.access.lease().await?;

        let lease = &*held;
        let mut warnings = Vec::new();

        // ── Validate everything, capture old values ──
        let mut widgets: Vec<Option<SingleWidget<'_, T>>> = Vec::with_capacity(items.len());
        let mut seen = HashSet::new();
        for item in &mut items {
            let validated = if seen.insert(item.name.clone()) {
                validate(lease, item, &mut warnings).await
            } else {
                Err(CoreError::InvalidValue {
                    name: item.name.clone(),
                    value: item.value.clone(),
                    reason: "setting appears more than once in the batch".into(),
                })
            };
            match validated {
                Ok(widget) => widgets.push(Some(widget)),
                Err(e) => {
                    item.fail(&e);
                    if policy == ConflictPolicy::AllOrNothing {
                        debug!(name = %item.name, error = %e, "batch rejected during validation");
                        return Err(CoreError::BatchAborted {
                            failed: item.name.clone(),
                            cause: Box::new(e),
                            rollback_failures: Vec::new(),
                        });
                    }
                    widgets.push(None);
                }
            }
        }

        // ── Apply in order ──
        let mut abort = None;
        for idx in 0..items.len() {
            let (Some(item), Some(Some(widget))) = (items.get_mut(idx), widgets.get(idx)) else {
                continue;
            };
            if item.state != ItemState::Validated {
                continue;
            }
            if abort.is_some() {
                item.state = ItemState::Skipped;
                continue;
            }
            if let Err(e) = apply(lease, item, widget).await {
                item.fail(&e);
                if policy == ConflictPolicy::AllOrNothing {
                    abort = Some((item.name.clone(), e));
                }
            }
        }

        if let Some((failed, cause)) = abort {
            let rollback_failures = rollback(lease, &mut items, &widgets).await;
            warn!(
                failed = %failed,
                error = %cause,
                rollback_failures = rollback_failures.len(),
                "batch aborted"
            );
            return Err(CoreError::BatchAborted {
                failed,
                cause: Box::new(cause),
                rollback_failures,
            });
        }

        let report = BatchReport { policy, items };
        info!(
            committed = report.committed().count(),
            failed = report.failures().count(),
            "batch finished"
        );
        Ok(report)
    }

    /// Write the values of previously dumped records. Read-only records,
    /// buttons and containers are informational and skipped.
    pub async fn apply_records(
        &self,
        records: &[WidgetRecord],
        policy: ConflictPolicy,
    ) -> Result<BatchReport, CoreError> {
        let changes = records
            .iter()
            .filter(|r| !r.read_only)
            .filter(|r| {
                !matches!(
                    r.kind,
                    Some(WidgetType::Button | WidgetType::Window | WidgetType::Section)
                )
            })
            .map(|r| (r.name.clone(), r.value.clone()));
        self.write_batch(changes, policy).await
    }
}

async fn validate<'a, T: DeviceTransport>(
    lease: &'a Lease<'_, T>,
    item: &mut PendingWrite,
    warnings: &mut Vec<super::tree::PartialResultWarning>,
) -> Result<SingleWidget<'a, T>, CoreError> {
    let widget = fetch_single(lease, &item.name, warnings).await?;
    let plan = plan_write(&widget.node, &item.value)?;
    item.old_value = Some(widget.node.value.encode());
    item.old_raw = widget.node.value.raw();
    item.state = match plan {
        Some(raw) => {
            item.new_raw = Some(raw);
            ItemState::Validated
        }
        None => ItemState::Unchanged,
    };
    Ok(widget)
}

async fn apply<T: DeviceTransport>(
    lease: &Lease<'_, T>,
    item: &mut PendingWrite,
    widget: &SingleWidget<'_, T>,
) -> Result<(), CoreError> {
    let Some(raw) = item.new_raw.as_ref() else {
        return Ok(());
    };
    let transport = lease.transport();
    transport
        .widget_set_value(widget.root.handle(), raw)
        .map_err(|e| set_value_error(&item.name, &item.value, &e))?;
    item.state = ItemState::Applied;

    transport
        .config_commit(
            lease.context(),
            lease.device(),
            &item.name,
            widget.root.handle(),
        )
        .await
        .map_err(|e| CoreError::Commit {
            name: item.name.clone(),
            code: e.code(),
        })?;
    item.state = ItemState::Committed;
    debug!(name = %item.name, value = %item.value, "batch item committed");
    Ok(())
}

/// Restore committed items, newest first.
async fn rollback<T: DeviceTransport>(
    lease: &Lease<'_, T>,
    items: &mut [PendingWrite],
    widgets: &[Option<SingleWidget<'_, T>>],
) -> Vec<RollbackFailure> {
    let transport = lease.transport();
    let mut failures = Vec::new();

    for (item, widget) in items.iter_mut().zip(widgets).rev() {
        if item.state != ItemState::Committed {
            continue;
        }
        let (Some(widget), Some(old)) = (widget, item.old_raw.as_ref()) else {
            continue;
        };

        let restored = match transport.widget_set_value(widget.root.handle(), old) {
            Ok(()) => {
                transport
                    .config_commit(
                        lease.context(),
                        lease.device(),
                        &item.name,
                        widget.root.handle(),
                    )
                    .await
            }
            Err(e) => Err(e),
        };

        match restored {
            Ok(()) => {
                item.state = ItemState::RolledBack;
                debug!(name = %item.name, "batch item rolled back");
            }
            Err(error) => {
                warn!(name = %item.name, error = %error, "rollback failed");
                item.state = ItemState::Failed;
                item.error = Some(format!("rollback failed: {error}"));
                failures.push(RollbackFailure {
                    name: item.name.clone(),
                    error,
                });
            }
        }
    }
    failures
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use lensctl_transport::StatusCode;
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

    fn text(v: &str) -> Option<RawValue> {
        Some(RawValue::Text(v.into()))
    }

    #[tokio::test]
    async fn all_or_nothing_commits_everything() {
        let (camera, session) = connected().await;

        let report = session
            .settings()
            .write_batch(
                [("iso", "400"), ("aperture", "8"), ("whitebalance", "Auto")],
                ConflictPolicy::AllOrNothing,
            )
            .await
            .unwrap();

        let states: Vec<_> = report.items.iter().map(|i| i.state).collect();
        assert_eq!(
            states,
            vec![
                ItemState::Committed,
                ItemState::Committed,
                ItemState::Unchanged
            ]
        );
        assert_eq!(report.items[0].old_value.as_deref(), Some("100"));
        assert_eq!(camera.setting("iso"), text("400"));
        assert_eq!(camera.setting("aperture"), text("8"));
        assert_eq!(camera.live_widget_trees(), 0);
    }

    #[tokio::test]
    async fn all_or_nothing_rolls_back_in_reverse_order() {
        let (camera, session) = connected().await;
        camera.inject(|f| {
            f.commit.insert("shutterspeed".into(), StatusCode::CAMERA_ERROR);
        });
        camera.clear_journal();

        let err = session
            .settings()
            .write_batch(
                [("iso", "400"), ("aperture", "8"), ("shutterspeed", "1/250")],
                ConflictPolicy::AllOrNothing,
            )
            .await
            .unwrap_err();

        let CoreError::BatchAborted {
            failed,
            cause,
            rollback_failures,
        } = err
        else {
            panic!("expected batch abort, got {err:?}");
        };
        assert_eq!(failed, "shutterspeed");
        assert!(matches!(*cause, CoreError::Commit { .. }));
        assert!(rollback_failures.is_empty());

        assert_eq!(camera.setting("iso"), text("100"));
        assert_eq!(camera.setting("aperture"), text("5.6"));
        assert_eq!(camera.setting("shutterspeed"), text("1/60"));

        let commits: Vec<_> = camera
            .journal()
            .into_iter()
            .filter_map(|c| match c {
                Call::ConfigCommit { name, value } => Some((name, value.to_string())),
                _ => None,
            })
            .collect();
        assert_eq!(
            commits,
            vec![
                ("iso".to_owned(), "400".to_owned()),
                ("aperture".to_owned(), "8".to_owned()),
                ("shutterspeed".to_owned(), "1/250".to_owned()),
                ("aperture".to_owned(), "5.6".to_owned()),
                ("iso".to_owned(), "100".to_owned()),
            ]
        );
        assert_eq!(camera.live_widget_trees(), 0);
    }

    #[tokio::test]
    async fn validation_failure_aborts_before_any_write() {
        let (camera, session) = connected().await;
        camera.clear_journal();

        let err = session
            .settings()
            .write_batch(
                [("iso", "400"), ("serialnumber", "x")],
                ConflictPolicy::AllOrNothing,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::BatchAborted { ref cause, .. } if matches!(**cause, CoreError::ReadOnly { .. })
        ));
        assert!(!camera.journal().iter().any(Call::is_commit));
        assert_eq!(camera.setting("iso"), text("100"));
    }

    #[tokio::test]
    async fn rollback_failures_are_attached() {
        let (camera, session) = connected().await;
        camera.inject(|f| {
            f.commit.insert("shutterspeed".into(), StatusCode::IO);
            f.commit_value
                .insert(("iso".into(), "100".into()), StatusCode::CAMERA_BUSY);
        });

        let err = session
            .settings()
            .write_batch(
                [("iso", "400"), ("aperture", "8"), ("shutterspeed", "1/250")],
                ConflictPolicy::AllOrNothing,
            )
            .await
            .unwrap_err();
        let CoreError::BatchAborted {
            failed,
            rollback_failures,
            ..
        } = err
        else {
            panic!("expected batch abort, got {err:?}");
        };
        assert_eq!(failed, "shutterspeed");
        assert_eq!(rollback_failures.len(), 1);
        assert_eq!(rollback_failures[0].name, "iso");
        assert_eq!(rollback_failures[0].error.code(), StatusCode::CAMERA_BUSY);

        assert_eq!(camera.setting("aperture"), text("5.6"));
        assert_eq!(camera.setting("iso"), text("400"));
        assert_eq!(camera.live_widget_trees(), 0);
    }

    #[tokio::test]
    async fn best_effort_reports_single_failure() {
        let (camera, session) = connected().await;
        camera.inject(|f| {
            f.commit.insert("aperture".into(), StatusCode::CAMERA_BUSY);
        });

        let report = session
            .settings()
            .write_batch(
                [("iso", "400"), ("aperture", "8"), ("shutterspeed", "1/250")],
                ConflictPolicy::BestEffort,
            )
            .await
            .unwrap();

        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].name, "aperture");
        assert!(failures[0].error.is_some());
        assert_eq!(report.committed().count(), 2);
        assert_eq!(camera.setting("iso"), text("400"));
        assert_eq!(camera.setting("shutterspeed"), text("1/250"));
    }

    #[tokio::test]
    async fn best_effort_continues_past_invalid_items() {
        let (_camera, session) = connected().await;

        let report = session
            .settings()
            .write_batch(
                [("nope", "1"), ("iso", "200"), ("iso", "400")],
                ConflictPolicy::BestEffort,
            )
            .await
            .unwrap();
        let states: Vec<_> = report.items.iter().map(|i| i.state).collect();
        assert_eq!(
            states,
            vec![ItemState::Failed, ItemState::Committed, ItemState::Failed]
        );
    }

    #[tokio::test]
    async fn apply_records_skips_read_only() {
        let (camera, session) = connected().await;
        let mut records = session.settings().fetch_tree().await.unwrap().value.records();
        for record in &mut records {
            if record.name == "iso" {
                record.value = "1600".into();
            }
        }

        let report = session
            .settings()
            .apply_records(&records, ConflictPolicy::AllOrNothing)
            .await
            .unwrap();
        assert!(report.is_success());
        assert!(report.items.iter().all(|i| i.name != "serialnumber"));
        assert_eq!(camera.setting("iso"), text("1600"));
    }
}
