//! Annotated compute graph consumed by the CMO scheduler.
//!
//! Nodes live in an arena and refer to each other through [`NodeId`]s, so labels
//! written by the scheduler stay valid regardless of how the graph is stored and
//! can be serialized as-is for the task encoder. Arena order is schedule order:
//! a node may only consume outputs of nodes inserted before it.

mod builder;
mod reuse;
pub mod topology;

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cmo::CmoLabelSet;
use crate::error::GraphError;

pub use builder::NodeBuilder;
pub use reuse::{MemReuseInfo, ObjectKind, ReuseEntry};

/// Stable arena index of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Engine a node's work is dispatched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImplyType {
    AiCore,
    VectorCore,
    AiCpu,
    Dsa,
    Host,
}

impl ImplyType {
    /// Engines whose caches are maintained by compiler-emitted CMO instructions.
    pub fn is_ai_core_class(self) -> bool {
        matches!(self, ImplyType::AiCore | ImplyType::VectorCore)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ImplyType::AiCore => "aicore",
            ImplyType::VectorCore => "vectorcore",
            ImplyType::AiCpu => "aicpu",
            ImplyType::Dsa => "dsa",
            ImplyType::Host => "host",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "aicore" => Some(ImplyType::AiCore),
            "vectorcore" => Some(ImplyType::VectorCore),
            "aicpu" => Some(ImplyType::AiCpu),
            "dsa" => Some(ImplyType::Dsa),
            "host" => Some(ImplyType::Host),
            _ => None,
        }
    }
}

/// Per-tensor facts attached by the scheduling and memory-reuse passes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorDesc {
    /// Byte size, if known.
    pub size: Option<i64>,
    /// `DataVisitDistance`; the first element is the producer-to-read distance.
    pub data_visit_distance: Option<Vec<i32>>,
    /// `IsEndOfInputMemLifecycle`: this read is the last one of the memory.
    pub end_of_mem_lifecycle: Option<bool>,
}

impl TensorDesc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_size(mut self, bytes: i64) -> Self {
        self.size = Some(bytes);
        self
    }

    pub fn with_visit_distance(mut self, distance: impl Into<Vec<i32>>) -> Self {
        self.data_visit_distance = Some(distance.into());
        self
    }

    pub fn with_end_of_lifecycle(mut self, end: bool) -> Self {
        self.end_of_mem_lifecycle = Some(end);
        self
    }

    pub fn first_visit_distance(&self) -> Option<i32> {
        self.data_visit_distance
            .as_ref()
            .and_then(|distance| distance.first().copied())
    }
}

/// Output slot of a producer feeding an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutAnchor {
    pub node: NodeId,
    pub index: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputDesc {
    /// Connected producer; graph inputs have none.
    pub peer: Option<OutAnchor>,
    pub desc: TensorDesc,
}

/// An operator instance together with the annotations the scheduler reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub op_type: String,
    pub imply_type: Option<ImplyType>,
    pub stream_id: Option<u32>,
    pub read_write_index: Option<i32>,
    pub inputs: Vec<InputDesc>,
    pub outputs: Vec<TensorDesc>,
    /// Workspace region sizes in bytes.
    pub workspace: Vec<i64>,
    /// Sizes of the resolved constant tensors bound to the node.
    pub weights: Vec<i64>,
    pub mem_reuse: Option<MemReuseInfo>,
    /// Output attribute written by the scheduler.
    pub cmo: CmoLabelSet,
}

impl Node {
    pub fn is_ai_core_class(&self) -> bool {
        self.imply_type.is_some_and(ImplyType::is_ai_core_class)
    }

    pub fn input(&self, index: usize) -> Option<&InputDesc> {
        self.inputs.get(index)
    }

    pub fn peer_of(&self, index: usize) -> Option<OutAnchor> {
        self.input(index).and_then(|input| input.peer)
    }

    pub fn first_reuser(&self, kind: ObjectKind, index: u32) -> Option<&ReuseEntry> {
        self.mem_reuse
            .as_ref()
            .and_then(|info| info.first_reuser(kind, index))
    }

    /// Number of slots of the given kind.
    pub fn slot_count(&self, kind: ObjectKind) -> usize {
        match kind {
            ObjectKind::Output => self.outputs.len(),
            ObjectKind::Workspace => self.workspace.len(),
        }
    }
}

/// Arena-backed DAG in schedule order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Graph {
    name: String,
    nodes: Vec<Node>,
    names: HashMap<String, NodeId>,
}

impl Graph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
            names: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index())
    }

    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied()
    }

    /// Nodes in schedule order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().map(|node| node.id)
    }

    /// Appends a node. Every connected producer must already be part of the graph.
    pub fn insert(&mut self, builder: NodeBuilder) -> Result<NodeId, GraphError> {
        if self.names.contains_key(&builder.name) {
            return Err(GraphError::DuplicateNode { name: builder.name });
        }
        for input in &builder.inputs {
            if let Some(peer) = input.peer {
                self.check_slot(peer.node, ObjectKind::Output, peer.index)?;
            }
        }
        let id = NodeId(self.nodes.len() as u32);
        let node = builder.build(id);
        self.names.insert(node.name.clone(), id);
        self.nodes.push(node);
        Ok(id)
    }

    /// Records that `reuser` will alias slot `(kind, index)` of `owner`.
    ///
    /// Entries are kept in insertion order; the first one is the nearest reuser.
    pub fn add_mem_reuse(
        &mut self,
        owner: NodeId,
        kind: ObjectKind,
        index: u32,
        reuser: ReuseEntry,
    ) -> Result<(), GraphError> {
        self.check_slot(owner, kind, index)?;
        self.check_slot(reuser.node, reuser.kind, reuser.index)?;
        let node = self
            .node_mut(owner)
            .ok_or(GraphError::UnknownNode { node: owner })?;
        node.mem_reuse
            .get_or_insert_with(MemReuseInfo::new)
            .push(kind, index, reuser);
        Ok(())
    }

    fn check_slot(&self, id: NodeId, kind: ObjectKind, index: u32) -> Result<(), GraphError> {
        let node = self.node(id).ok_or(GraphError::UnknownNode { node: id })?;
        if index as usize >= node.slot_count(kind) {
            return Err(GraphError::SlotOutOfRange {
                node: node.name.clone(),
                kind,
                index,
            });
        }
        Ok(())
    }

    /// Whether any node already carries a CMO label.
    pub fn first_labeled_node(&self) -> Option<&Node> {
        self.nodes.iter().find(|node| !node.cmo.is_empty())
    }
}
