use smallvec::SmallVec;

use crate::config::CmoConfig;
use crate::graph::{Graph, Node, NodeId, ObjectKind, OutAnchor};

use super::base::{
    add_to_node_cmo_attr, check_parent_op_is_ai_core, read_is_life_cycle_end,
    read_visit_distance,
};
use super::label::{CmoAttr, CmoType};

/// Emits `Invalid` on a last reader whose memory is reused shortly after,
/// paired with a `Barrier` on the reusing node, so no stale line for the old
/// tensor survives once the address belongs to the new one.
#[derive(Debug, Default)]
pub struct InvalidateStrategy;

impl InvalidateStrategy {
    pub const NAME: &'static str = "invalidate";

    pub fn generate_type(&mut self, graph: &mut Graph, node: NodeId, config: &CmoConfig) -> usize {
        let Some(current) = graph.node(node) else {
            return 0;
        };

        let mut reads: SmallVec<[OutAnchor; 4]> = SmallVec::new();
        for index in 0..current.inputs.len() {
            if !check_parent_op_is_ai_core(graph, current, index)
                || !read_is_life_cycle_end(current, index)
                || !check_read_distance(current, index, config)
            {
                continue;
            }
            if let Some(peer) = current.peer_of(index) {
                reads.push(peer);
            }
        }
        let workspaces = if current.is_ai_core_class() {
            current.workspace.len() as u32
        } else {
            0
        };

        let mut added = 0;
        for peer in reads {
            added += check_reuse_distance_and_labeled(
                graph,
                node,
                peer.node,
                ObjectKind::Output,
                peer.index,
                config,
            );
        }
        // A workspace is read by the node that owns it.
        for index in 0..workspaces {
            added += check_reuse_distance_and_labeled(
                graph,
                node,
                node,
                ObjectKind::Workspace,
                index,
                config,
            );
        }
        added
    }
}

/// Short visit distance: the read happens soon after the write.
fn check_read_distance(node: &Node, index: usize, config: &CmoConfig) -> bool {
    read_visit_distance(node, index)
        .is_some_and(|distance| distance < config.data_visit_dist_threshold)
}

/// Labels `reader` with `Invalid` and the nearest reuser of `producer`'s slot with
/// `Barrier` when the reuse is close enough to race with the read.
pub fn check_reuse_distance_and_labeled(
    graph: &mut Graph,
    reader: NodeId,
    producer: NodeId,
    kind: ObjectKind,
    index: u32,
    config: &CmoConfig,
) -> usize {
    let Some(entry) = graph
        .node(producer)
        .and_then(|node| node.first_reuser(kind, index))
        .copied()
    else {
        return 0;
    };
    let (Some(reader_node), Some(reuser_node)) = (graph.node(reader), graph.node(entry.node))
    else {
        return 0;
    };
    if !reuser_node.is_ai_core_class() {
        tracing::trace!(
            reuser = %reuser_node.name,
            "reuser is not AI-core class, no invalidate needed"
        );
        return 0;
    }
    if !check_reuse_distance(reader_node, reuser_node, config) {
        return 0;
    }

    tracing::debug!(
        reader = %reader_node.name,
        reuser = %reuser_node.name,
        slot = %kind.reuse_key(index),
        "invalidate before reuse"
    );
    let attr = CmoAttr::new(entry.node, entry.kind, entry.index);
    add_to_node_cmo_attr(graph, reader, CmoType::Invalid, [attr])
        + add_to_node_cmo_attr(graph, entry.node, CmoType::Barrier, [attr])
}

/// Reader and reuser must share a stream; the hazard exists when the reuse is
/// at least `mem_reuse_dist_threshold` steps after the read.
pub fn check_reuse_distance(reader: &Node, reuser: &Node, config: &CmoConfig) -> bool {
    let (Some(reader_stream), Some(reuser_stream)) = (reader.stream_id, reuser.stream_id) else {
        return false;
    };
    if reader_stream != reuser_stream {
        return false;
    }
    let (Some(read_index), Some(reuse_index)) = (reader.read_write_index, reuser.read_write_index)
    else {
        return false;
    };
    i64::from(reuse_index) - i64::from(read_index) >= i64::from(config.mem_reuse_dist_threshold)
}
