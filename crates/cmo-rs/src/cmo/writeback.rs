use smallvec::SmallVec;

use crate::config::CmoConfig;
use crate::graph::{Graph, Node, NodeId, ObjectKind, OutAnchor};

use super::base::{
    add_to_node_cmo_attr, check_parent_op_is_ai_core, read_is_life_cycle_end,
    read_visit_distance,
};
use super::label::{CmoAttr, CmoType};

/// Emits `Writeback` on a producer whose output is read far away in the schedule,
/// where the write may still sit in the producer's cache.
#[derive(Debug, Default)]
pub struct WritebackStrategy;

impl WritebackStrategy {
    pub const NAME: &'static str = "writeback";

    pub fn generate_type(&mut self, graph: &mut Graph, node: NodeId, config: &CmoConfig) -> usize {
        let Some(current) = graph.node(node) else {
            return 0;
        };

        let mut producers: SmallVec<[(OutAnchor, u32); 4]> = SmallVec::new();
        for index in 0..current.inputs.len() {
            if !check_parent_op_is_ai_core(graph, current, index)
                || !read_is_life_cycle_end(current, index)
                || !check_read_distance(current, index, config)
            {
                continue;
            }
            if let Some(peer) = current.peer_of(index) {
                producers.push((peer, index as u32));
            }
        }

        let mut added = 0;
        for (peer, input_index) in producers {
            if let (Some(producer), Some(reader)) = (graph.node(peer.node), graph.node(node)) {
                tracing::debug!(
                    producer = %producer.name,
                    reader = %reader.name,
                    input = input_index,
                    "writeback for distant read"
                );
            }
            let attr = CmoAttr::new(node, ObjectKind::Output, input_index);
            added += add_to_node_cmo_attr(graph, peer.node, CmoType::Writeback, [attr]);
        }
        added
    }
}

/// Long visit distance; the complement of the invalidate distance check.
fn check_read_distance(node: &Node, index: usize, config: &CmoConfig) -> bool {
    read_visit_distance(node, index)
        .is_some_and(|distance| distance >= config.data_visit_dist_threshold)
}
