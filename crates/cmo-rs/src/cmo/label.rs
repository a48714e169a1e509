use std::collections::BTreeMap;
use std::fmt::{self, Write as _};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::graph::{Graph, NodeId, ObjectKind};

/// CMO instruction kinds, in the order the task encoder expects them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CmoType {
    Prefetch,
    Invalid,
    Barrier,
    Writeback,
}

impl CmoType {
    pub const ALL: [CmoType; 4] = [
        CmoType::Prefetch,
        CmoType::Invalid,
        CmoType::Barrier,
        CmoType::Writeback,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CmoType::Prefetch => "Prefetch",
            CmoType::Invalid => "Invalid",
            CmoType::Barrier => "Barrier",
            CmoType::Writeback => "Writeback",
        }
    }
}

impl fmt::Display for CmoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown CMO type `{0}`")]
pub struct UnknownCmoType(pub String);

impl FromStr for CmoType {
    type Err = UnknownCmoType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CmoType::ALL
            .into_iter()
            .find(|ty| ty.as_str() == s)
            .ok_or_else(|| UnknownCmoType(s.to_string()))
    }
}

/// Identifies which buffer of which node a label is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CmoAttr {
    pub node: NodeId,
    pub object: ObjectKind,
    pub index: u32,
}

impl CmoAttr {
    pub fn new(node: NodeId, object: ObjectKind, index: u32) -> Self {
        Self {
            node,
            object,
            index,
        }
    }
}

/// Per-node CMO labels, grouped by type and kept in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CmoLabelSet {
    labels: BTreeMap<CmoType, Vec<CmoAttr>>,
}

impl CmoLabelSet {
    pub fn get(&self, ty: CmoType) -> &[CmoAttr] {
        self.labels.get(&ty).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains_type(&self, ty: CmoType) -> bool {
        !self.get(ty).is_empty()
    }

    pub fn extend(&mut self, ty: CmoType, attrs: impl IntoIterator<Item = CmoAttr>) -> usize {
        let entry = self.labels.entry(ty).or_default();
        let before = entry.len();
        entry.extend(attrs);
        let added = entry.len() - before;
        if entry.is_empty() {
            self.labels.remove(&ty);
        }
        added
    }

    pub fn is_empty(&self) -> bool {
        self.labels.values().all(Vec::is_empty)
    }

    /// Total number of labels across all types.
    pub fn len(&self) -> usize {
        self.labels.values().map(Vec::len).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (CmoType, &[CmoAttr])> {
        self.labels
            .iter()
            .filter(|(_, attrs)| !attrs.is_empty())
            .map(|(ty, attrs)| (*ty, attrs.as_slice()))
    }
}

/// Label as handed to the task encoder, with the target resolved to a name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedCmoAttr {
    pub node: NodeId,
    pub node_name: String,
    pub object: ObjectKind,
    pub index: u32,
}

/// Labels of every labeled node, keyed by node name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CmoLabelTable {
    pub graph: String,
    pub nodes: BTreeMap<String, BTreeMap<CmoType, Vec<ExportedCmoAttr>>>,
}

impl CmoLabelTable {
    pub fn from_graph(graph: &Graph) -> Self {
        let mut nodes = BTreeMap::new();
        for node in graph.nodes() {
            if node.cmo.is_empty() {
                continue;
            }
            let mut by_type = BTreeMap::new();
            for (ty, attrs) in node.cmo.iter() {
                let exported = attrs
                    .iter()
                    .filter_map(|attr| {
                        let target = graph.node(attr.node)?;
                        Some(ExportedCmoAttr {
                            node: attr.node,
                            node_name: target.name.clone(),
                            object: attr.object,
                            index: attr.index,
                        })
                    })
                    .collect::<Vec<_>>();
                by_type.insert(ty, exported);
            }
            nodes.insert(node.name.clone(), by_type);
        }
        Self {
            graph: graph.name().to_string(),
            nodes,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Renders the labels of every labeled node, one node per line in schedule order:
///
/// ```text
/// %n1: Invalid[%n4.out0]
/// %n4: Barrier[%n4.out0]
/// ```
pub fn render_labels(graph: &Graph) -> String {
    let mut out = String::new();
    for node in graph.nodes() {
        if node.cmo.is_empty() {
            continue;
        }
        let _ = write!(out, "%{}:", node.name);
        for (ty, attrs) in node.cmo.iter() {
            let targets = attrs
                .iter()
                .map(|attr| {
                    let name = graph
                        .node(attr.node)
                        .map(|target| target.name.as_str())
                        .unwrap_or("?");
                    format!("%{name}.{}{}", attr.object.short_name(), attr.index)
                })
                .collect::<Vec<_>>();
            let _ = write!(out, " {ty}[{}]", targets.join(", "));
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_set_keeps_insertion_order_and_duplicates() {
        let mut set = CmoLabelSet::default();
        let a = CmoAttr::new(NodeId(1), ObjectKind::Output, 0);
        let b = CmoAttr::new(NodeId(2), ObjectKind::Workspace, 1);
        assert_eq!(set.extend(CmoType::Invalid, [a, b]), 2);
        assert_eq!(set.extend(CmoType::Invalid, [a]), 1);
        assert_eq!(set.get(CmoType::Invalid), &[a, b, a]);
        assert_eq!(set.len(), 3);
        assert!(set.get(CmoType::Barrier).is_empty());
    }

    #[test]
    fn empty_extend_leaves_no_entry() {
        let mut set = CmoLabelSet::default();
        assert_eq!(set.extend(CmoType::Prefetch, std::iter::empty::<CmoAttr>()), 0);
        assert!(set.is_empty());
        assert_eq!(set.iter().count(), 0);
    }

    #[test]
    fn cmo_type_names_round_trip() {
        for ty in CmoType::ALL {
            assert_eq!(ty.as_str().parse::<CmoType>(), Ok(ty));
        }
        let err = "Flush".parse::<CmoType>().unwrap_err();
        assert_eq!(err, UnknownCmoType("Flush".to_string()));
        assert_eq!(err.to_string(), "unknown CMO type `Flush`");
    }

    #[test]
    fn label_set_serializes_with_type_names() {
        let mut set = CmoLabelSet::default();
        set.extend(
            CmoType::Writeback,
            [CmoAttr::new(NodeId(4), ObjectKind::Output, 2)],
        );
        let json = serde_json::to_value(&set).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "labels": {
                    "Writeback": [{"node": 4, "object": "Output", "index": 2}]
                }
            })
        );
    }
}
