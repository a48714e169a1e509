use crate::cmo::CmoLabelSet;

use super::{ImplyType, InputDesc, Node, NodeId, OutAnchor, TensorDesc};

/// Fluent description of a node, turned into a [`Node`] by
/// [`Graph::insert`](super::Graph::insert).
#[derive(Debug, Clone)]
pub struct NodeBuilder {
    pub(super) name: String,
    op_type: String,
    imply_type: Option<ImplyType>,
    stream_id: Option<u32>,
    read_write_index: Option<i32>,
    pub(super) inputs: Vec<InputDesc>,
    outputs: Vec<TensorDesc>,
    workspace: Vec<i64>,
    weights: Vec<i64>,
}

impl NodeBuilder {
    pub fn new(name: impl Into<String>, op_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            op_type: op_type.into(),
            imply_type: None,
            stream_id: None,
            read_write_index: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
            workspace: Vec::new(),
            weights: Vec::new(),
        }
    }

    pub fn imply_type(mut self, imply_type: ImplyType) -> Self {
        self.imply_type = Some(imply_type);
        self
    }

    pub fn ai_core(self) -> Self {
        self.imply_type(ImplyType::AiCore)
    }

    pub fn stream(mut self, stream_id: u32) -> Self {
        self.stream_id = Some(stream_id);
        self
    }

    pub fn read_write_index(mut self, index: i32) -> Self {
        self.read_write_index = Some(index);
        self
    }

    /// Input fed by output `index` of `producer`.
    pub fn input_from(mut self, producer: NodeId, index: u32, desc: TensorDesc) -> Self {
        self.inputs.push(InputDesc {
            peer: Some(OutAnchor {
                node: producer,
                index,
            }),
            desc,
        });
        self
    }

    /// Input without a producer inside the graph.
    pub fn graph_input(mut self, desc: TensorDesc) -> Self {
        self.inputs.push(InputDesc { peer: None, desc });
        self
    }

    pub fn output(mut self, desc: TensorDesc) -> Self {
        self.outputs.push(desc);
        self
    }

    pub fn output_bytes(self, bytes: i64) -> Self {
        self.output(TensorDesc::new().with_size(bytes))
    }

    pub fn workspace(mut self, bytes: i64) -> Self {
        self.workspace.push(bytes);
        self
    }

    pub fn weight(mut self, bytes: i64) -> Self {
        self.weights.push(bytes);
        self
    }

    pub(super) fn build(self, id: NodeId) -> Node {
        Node {
            id,
            name: self.name,
            op_type: self.op_type,
            imply_type: self.imply_type,
            stream_id: self.stream_id,
            read_write_index: self.read_write_index,
            inputs: self.inputs,
            outputs: self.outputs,
            workspace: self.workspace,
            weights: self.weights,
            mem_reuse: None,
            cmo: CmoLabelSet::default(),
        }
    }
}
