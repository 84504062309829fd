// ── Wire record ──
//
// Flat JSON shape of a setting, as exchanged with scripts and saved dumps:
// `{label, name, info, value, choice, readOnly, type}`. Batch writes read
// the same shape back and match on `name`.

use lensctl_transport::WidgetType;
use serde::{Deserialize, Serialize};

use super::tree::WidgetNode;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetRecord {
    #[serde(default)]
    pub label: String,
    pub name: String,
    #[serde(default)]
    pub info: String,
    pub value: String,
    /// Older dumps spell this `choise`.
    #[serde(default, alias = "choise")]
    pub choice: Vec<String>,
    #[serde(default)]
    pub read_only: bool,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<WidgetType>,
}

impl From<&WidgetNode> for WidgetRecord {
    fn from(node: &WidgetNode) -> Self {
        Self {
            label: node.label.clone(),
            name: node.name.clone(),
            info: node.info.clone(),
            value: node.value.encode(),
            choice: node.choices(),
            read_only: node.read_only,
            kind: Some(node.kind),
        }
    }
}
