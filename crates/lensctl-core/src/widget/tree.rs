// ── Configuration tree snapshot ──
//
// Arena of widget nodes, window -> sections -> leaves. Nodes refer to each
// other by `WidgetId`; leaves are indexed by name in fetch order.

use std::fmt;

use indexmap::IndexMap;
use lensctl_transport::{StatusCode, WidgetType};
use serde::Serialize;

use super::record::WidgetRecord;
use super::value::WidgetValue;

/// Index of a node inside one [`WidgetTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct WidgetId(pub(crate) usize);

impl WidgetId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Something that could not be read while building an otherwise usable result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartialResultWarning {
    /// Widget being read when the failure happened.
    pub widget: String,
    /// What was being read.
    pub item: String,
    pub code: StatusCode,
}

impl fmt::Display for PartialResultWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: could not read {}: {}", self.widget, self.item, self.code)
    }
}

/// A successful result together with the pieces that could not be read.
#[derive(Debug, Clone, PartialEq)]
pub struct Partial<T> {
    pub value: T,
    pub warnings: Vec<PartialResultWarning>,
}

impl<T> Partial<T> {
    pub fn is_complete(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Partial<U> {
        Partial {
            value: f(self.value),
            warnings: self.warnings,
        }
    }
}

/// One setting or grouping.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WidgetNode {
    pub id: WidgetId,
    pub name: String,
    pub label: String,
    pub info: String,
    pub kind: WidgetType,
    pub read_only: bool,
    pub value: WidgetValue,
    pub parent: Option<WidgetId>,
    pub children: Vec<WidgetId>,
}

impl WidgetNode {
    /// Leaves are the settings; windows and sections only group them.
    pub fn is_leaf(&self) -> bool {
        !self.kind.is_container()
    }

    pub fn choices(&self) -> Vec<String> {
        self.value.choices()
    }

    pub fn record(&self) -> WidgetRecord {
        WidgetRecord::from(self)
    }
}

/// Snapshot of a camera's configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetTree {
    nodes: Vec<WidgetNode>,
    by_name: IndexMap<String, WidgetId>,
    generation: u64,
}

impl WidgetTree {
    /// Start a tree from its root node.
    pub(crate) fn new(mut root: WidgetNode, generation: u64) -> Self {
        root.id = WidgetId(0);
        root.parent = None;
        root.children.clear();
        Self {
            nodes: vec![root],
            by_name: IndexMap::new(),
            generation,
        }
    }

    /// Append `node` under `parent`, returning its id.
    pub(crate) fn push(&mut self, parent: WidgetId, mut node: WidgetNode) -> WidgetId {
        let id = WidgetId(self.nodes.len());
        node.id = id;
        node.parent = Some(parent);
        node.children.clear();
        if node.is_leaf() && !self.by_name.contains_key(&node.name) {
            self.by_name.insert(node.name.clone(), id);
        }
        self.nodes.push(node);
        if let Some(p) = self.nodes.get_mut(parent.0) {
            p.children.push(id);
        }
        id
    }

    pub fn root(&self) -> &WidgetNode {
        &self.nodes[0]
    }

    pub fn get(&self, id: WidgetId) -> Option<&WidgetNode> {
        self.nodes.get(id.0)
    }

    /// Leaf called `name` (exact, case-sensitive).
    pub fn lookup(&self, name: &str) -> Option<&WidgetNode> {
        self.by_name.get(name).and_then(|id| self.get(*id))
    }

    pub fn children(&self, id: WidgetId) -> impl Iterator<Item = &WidgetNode> {
        self.get(id)
            .into_iter()
            .flat_map(|n| n.children.iter())
            .filter_map(|c| self.get(*c))
    }

    pub fn sections(&self) -> impl Iterator<Item = &WidgetNode> {
        self.children(WidgetId(0))
    }

    /// Every leaf, in fetch order.
    pub fn leaves(&self) -> impl Iterator<Item = &WidgetNode> {
        self.by_name.values().filter_map(|id| self.get(*id))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Session generation the snapshot was taken under.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// `true` once the session has been reinitialized since the fetch.
    pub fn is_stale(&self, session_generation: u64) -> bool {
        self.generation != session_generation
    }

    /// Wire records for every leaf, in fetch order.
    pub fn records(&self) -> Vec<WidgetRecord> {
        self.leaves().map(WidgetRecord::from).collect()
    }
}
