use std::collections::TryReserveError;

use thiserror::Error;

use crate::graph::topology::TopologyError;
use crate::graph::{NodeId, ObjectKind};

/// Structural errors raised while assembling a [`Graph`](crate::graph::Graph).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("node `{name}` is already defined")]
    DuplicateNode { name: String },
    #[error("node {node} does not exist")]
    UnknownNode { node: NodeId },
    #[error("node `{node}` has no {kind} slot {index}")]
    SlotOutOfRange {
        node: String,
        kind: ObjectKind,
        index: u32,
    },
}

/// Fatal errors of the CMO scheduling pass.
///
/// Everything the strategies look up on nodes is optional and degrades to
/// "no label"; only registry allocation and malformed graphs end up here.
#[derive(Debug, Error)]
pub enum CmoError {
    #[error("failed to allocate the CMO strategy registry")]
    Allocation(#[from] TryReserveError),
    #[error(transparent)]
    Topology(#[from] TopologyError),
    #[error("graph `{graph}` already carries CMO labels (first on node `{node}`)")]
    AlreadyScheduled { graph: String, node: String },
    #[error(transparent)]
    Graph(#[from] GraphError),
}
