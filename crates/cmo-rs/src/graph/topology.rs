use thiserror::Error;

use super::{Graph, NodeId};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TopologyError {
    #[error("input {input} of node `{node}` reads {producer}, which is not scheduled before it")]
    ProducerNotBefore {
        node: String,
        input: usize,
        producer: NodeId,
    },
    #[error("node `{node}` at position {position} carries id {id}")]
    IdMismatch {
        node: String,
        position: usize,
        id: NodeId,
    },
    #[error("name index maps `{name}` to {indexed:?}, but the node lives at {actual}")]
    NameMismatch {
        name: String,
        indexed: Option<NodeId>,
        actual: NodeId,
    },
    #[error("name index has {indexed} entries for {nodes} nodes")]
    StaleNameIndex { indexed: usize, nodes: usize },
}

/// Checks that arena order is a valid schedule: every node sits at the position
/// its id names, the name index agrees with the nodes, and every producer
/// precedes its consumers.
///
/// Graphs assembled through [`Graph::insert`] satisfy this by construction; graphs
/// deserialized or edited in place may not.
pub fn validate_graph_topology(graph: &Graph) -> Result<(), TopologyError> {
    for (position, node) in graph.nodes.iter().enumerate() {
        if node.id.index() != position {
            return Err(TopologyError::IdMismatch {
                node: node.name.clone(),
                position,
                id: node.id,
            });
        }
        let indexed = graph.names.get(&node.name).copied();
        if indexed != Some(node.id) {
            return Err(TopologyError::NameMismatch {
                name: node.name.clone(),
                indexed,
                actual: node.id,
            });
        }
        for (input, desc) in node.inputs.iter().enumerate() {
            let Some(peer) = desc.peer else {
                continue;
            };
            if peer.node.index() >= position || graph.node(peer.node).is_none() {
                return Err(TopologyError::ProducerNotBefore {
                    node: node.name.clone(),
                    input,
                    producer: peer.node,
                });
            }
        }
    }
    if graph.names.len() != graph.nodes.len() {
        return Err(TopologyError::StaleNameIndex {
            indexed: graph.names.len(),
            nodes: graph.nodes.len(),
        });
    }
    Ok(())
}
