//! Camera settings: list, get, set, apply.

use std::path::Path;

use chrono::{DateTime, SecondsFormat};
use lensctl_core::{
    BatchReport, ConflictPolicy, DeviceTransport, PartialResultWarning, Session, WidgetNode,
    WidgetRecord, WidgetTree, WidgetValue, WriteOutcome,
};
use lensctl_transport::WidgetType;
use serde::Serialize;
use tabled::Tabled;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct SettingRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Label")]
    label: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Access")]
    access: &'static str,
}

impl From<&WidgetRecord> for SettingRow {
    fn from(r: &WidgetRecord) -> Self {
        Self {
            name: r.name.clone(),
            label: r.label.clone(),
            kind: r.kind.map(|k| k.to_string()).unwrap_or_default(),
            value: r.value.clone(),
            access: if r.read_only { "ro" } else { "rw" },
        }
    }
}

#[derive(Tabled)]
struct BatchRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Previous")]
    previous: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Error")]
    error: String,
}

/// A single write, as rendered for `config set name=value`.
#[derive(Serialize)]
struct WriteResult {
    name: String,
    #[serde(flatten)]
    outcome: WriteOutcome,
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle<T: DeviceTransport>(
    session: &Session<T>,
    args: ConfigArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let color = output::should_color(global.color);
    let settings = session.settings();

    match args.command {
        ConfigCommand::List { section, all } => {
            let partial = settings.fetch_tree().await?;
            report_warnings(&partial.warnings, global.output, color);
            let tree = partial.into_value();

            let nodes = match section {
                Some(name) => {
                    let section = tree
                        .sections()
                        .find(|s| s.name == name)
                        .ok_or(CliError::SettingNotFound { name })?;
                    let mut found = Vec::new();
                    leaves_under(&tree, section, &mut found);
                    found
                }
                None => tree.leaves().collect(),
            };
            let records: Vec<WidgetRecord> = nodes
                .into_iter()
                .filter(|n| all || (!n.read_only && n.kind != WidgetType::Button))
                .map(WidgetNode::record)
                .collect();

            let out = output::render_list(global.output, &records, |r| SettingRow::from(r), |r| {
                format!("{}={}", r.name, r.value)
            })?;
            output::print_output(&out, global.quiet);
        }

        ConfigCommand::Get { name } => {
            let partial = settings.lookup_by_name(&name).await?;
            report_warnings(&partial.warnings, global.output, color);
            let node = partial.into_value();

            let out = output::render_single(
                global.output,
                &node.record(),
                |_| setting_detail(&node, color),
                |r| r.value.clone(),
            )?;
            output::print_output(&out, global.quiet);
        }

        ConfigCommand::Set {
            assignments,
            best_effort,
        } => {
            if let [(name, value)] = assignments.as_slice() {
                let outcome = settings.write_value(name, value).await?;
                let result = WriteResult {
                    name: name.clone(),
                    outcome,
                };
                let out = output::render_single(
                    global.output,
                    &result,
                    describe_write,
                    |r| r.name.clone(),
                )?;
                output::print_output(&out, global.quiet);
            } else {
                let report = settings
                    .write_batch(assignments, policy(best_effort))
                    .await?;
                print_report(&report, global)?;
            }
        }

        ConfigCommand::Apply { file, best_effort } => {
            let records = read_records(&file)?;
            let report = settings
                .apply_records(&records, policy(best_effort))
                .await?;
            print_report(&report, global)?;
        }
    }
    Ok(())
}

// ── Helpers ─────────────────────────────────────────────────────────

fn policy(best_effort: bool) -> ConflictPolicy {
    if best_effort {
        ConflictPolicy::BestEffort
    } else {
        ConflictPolicy::AllOrNothing
    }
}

fn leaves_under<'t>(tree: &'t WidgetTree, node: &'t WidgetNode, out: &mut Vec<&'t WidgetNode>) {
    for child in tree.children(node.id) {
        if child.is_leaf() {
            out.push(child);
        } else {
            leaves_under(tree, child, out);
        }
    }
}

/// Warnings go to stderr so stdout stays parseable. JSON output modes
/// emit one JSON object per warning.
fn report_warnings(warnings: &[PartialResultWarning], format: OutputFormat, color: bool) {
    for w in warnings {
        tracing::debug!(widget = %w.widget, item = %w.item, code = %w.code, "partial read");
        match format {
            OutputFormat::Json | OutputFormat::JsonCompact => match serde_json::to_string(w) {
                Ok(line) => eprintln!("{line}"),
                Err(e) => tracing::warn!(error = %e, "could not serialize warning"),
            },
            _ => eprintln!("{}", output::warn(&format!("warning: {w}"), color)),
        }
    }
}

fn setting_detail(node: &WidgetNode, color: bool) -> String {
    let mut pairs = vec![
        ("Name", node.name.clone()),
        ("Label", node.label.clone()),
        ("Type", node.kind.to_string()),
        ("Value", node.value.encode()),
        (
            "Access",
            if node.read_only { "read-only" } else { "read-write" }.to_owned(),
        ),
    ];
    match &node.value {
        WidgetValue::Range {
            min, max, step, ..
        } => pairs.push(("Range", format!("{min} .. {max} step {step}"))),
        WidgetValue::DateTime { seconds } => {
            if let Some(at) = format_epoch(*seconds) {
                pairs.push(("Time", at));
            }
        }
        _ => {}
    }
    let choices = node.choices();
    if !choices.is_empty() {
        pairs.push(("Choices", choices.join(", ")));
    }
    if !node.info.is_empty() {
        pairs.push(("Info", node.info.clone()));
    }
    output::detail_lines(&pairs, color)
}

fn format_epoch(seconds: i64) -> Option<String> {
    DateTime::from_timestamp(seconds, 0).map(|at| at.to_rfc3339_opts(SecondsFormat::Secs, true))
}

fn describe_write(result: &WriteResult) -> String {
    match &result.outcome {
        WriteOutcome::Unchanged => format!("{}: unchanged", result.name),
        WriteOutcome::Applied { old, new } => format!("{}: {old} -> {new}", result.name),
    }
}

fn print_report(report: &BatchReport, global: &GlobalOpts) -> Result<(), CliError> {
    let out = output::render_list(
        global.output,
        &report.items,
        |item| BatchRow {
            name: item.name.clone(),
            value: item.value.clone(),
            previous: item.old_value.clone().unwrap_or_default(),
            state: item.state.to_string(),
            error: item.error.clone().unwrap_or_default(),
        },
        |item| format!("{} {}", item.name, item.state),
    )?;
    output::print_output(&out, global.quiet);

    let failed = report.failures().count();
    if failed > 0 {
        return Err(CliError::PartialFailure {
            failed,
            total: report.items.len(),
        });
    }
    Ok(())
}

fn read_records(path: &Path) -> Result<Vec<WidgetRecord>, CliError> {
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn epoch_seconds_render_as_rfc3339() {
        assert_eq!(
            format_epoch(1_700_000_000).as_deref(),
            Some("2023-11-14T22:13:20Z")
        );
    }

    #[test]
    fn single_writes_describe_the_change() {
        let applied = WriteResult {
            name: "iso".into(),
            outcome: WriteOutcome::Applied {
                old: "100".into(),
                new: "400".into(),
            },
        };
        assert_eq!(describe_write(&applied), "iso: 100 -> 400");
        assert_eq!(
            serde_json::to_string(&applied).unwrap(),
            r#"{"name":"iso","outcome":"applied","old":"100","new":"400"}"#
        );
    }

    #[test]
    fn dumps_with_the_old_field_spelling_are_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump.json");
        std::fs::write(
            &path,
            r#"[{"label":"ISO Speed","name":"iso","info":"","value":"400","choise":["100","400"],"readOnly":false}]"#,
        )
        .unwrap();
        let records = read_records(&path).unwrap();
        assert_eq!(records[0].choice, vec!["100", "400"]);
    }
}
