//! Read-only queries shared by the strategies, plus the single label writer.
//!
//! None of these fail: absent sizes count as zero and absent flags as false.

use crate::config::CmoConfig;
use crate::graph::{Graph, Node, NodeId};

use super::label::{CmoAttr, CmoType};

pub fn get_input_tensor_size(node: &Node) -> i64 {
    node.inputs
        .iter()
        .filter_map(|input| input.desc.size)
        .fold(0i64, i64::saturating_add)
}

pub fn get_output_tensor_size(node: &Node) -> i64 {
    node.outputs
        .iter()
        .filter_map(|output| output.size)
        .fold(0i64, i64::saturating_add)
}

pub fn get_workspace_size(node: &Node) -> i64 {
    node.workspace
        .iter()
        .copied()
        .fold(0i64, i64::saturating_add)
}

pub fn get_weight_size(node: &Node) -> i64 {
    node.weights.iter().copied().fold(0i64, i64::saturating_add)
}

pub fn get_cache_size(config: &CmoConfig) -> u64 {
    config.cache_size
}

/// True iff input `index` of `node` is fed by an AI-core-class producer.
pub fn check_parent_op_is_ai_core(graph: &Graph, node: &Node, index: usize) -> bool {
    node.peer_of(index)
        .and_then(|peer| graph.node(peer.node))
        .is_some_and(Node::is_ai_core_class)
}

/// Whether input `index` is the last read of its memory.
pub fn read_is_life_cycle_end(node: &Node, index: usize) -> bool {
    node.input(index)
        .and_then(|input| input.desc.end_of_mem_lifecycle)
        .unwrap_or(false)
}

/// First element of the input's `DataVisitDistance`, if annotated.
pub fn read_visit_distance(node: &Node, index: usize) -> Option<i32> {
    node.input(index)
        .and_then(|input| input.desc.first_visit_distance())
}

/// Appends `attrs` under `ty` on `target`, returning how many labels were added.
///
/// Targets missing from the graph are skipped.
pub fn add_to_node_cmo_attr(
    graph: &mut Graph,
    target: NodeId,
    ty: CmoType,
    attrs: impl IntoIterator<Item = CmoAttr>,
) -> usize {
    let Some(node) = graph.node_mut(target) else {
        tracing::trace!(%target, cmo = %ty, "label target is not in the graph");
        return 0;
    };
    node.cmo.extend(ty, attrs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ImplyType, NodeBuilder, ObjectKind, TensorDesc};

    fn sample() -> (Graph, NodeId, NodeId) {
        let mut graph = Graph::new("base");
        let producer = graph
            .insert(
                NodeBuilder::new("producer", "conv")
                    .ai_core()
                    .output_bytes(128)
                    .output(TensorDesc::new())
                    .workspace(32)
                    .workspace(16)
                    .weight(64),
            )
            .unwrap();
        let host = graph
            .insert(NodeBuilder::new("host", "data").imply_type(ImplyType::Host).output_bytes(8))
            .unwrap();
        let consumer = graph
            .insert(
                NodeBuilder::new("consumer", "add")
                    .input_from(
                        producer,
                        0,
                        TensorDesc::new()
                            .with_size(128)
                            .with_end_of_lifecycle(true)
                            .with_visit_distance([3, 9]),
                    )
                    .input_from(host, 0, TensorDesc::new().with_end_of_lifecycle(false))
                    .graph_input(TensorDesc::new().with_size(4)),
            )
            .unwrap();
        (graph, producer, consumer)
    }

    #[test]
    fn size_accounting_skips_unknown_sizes() {
        let (graph, producer, consumer) = sample();
        let producer = graph.node(producer).unwrap();
        let consumer = graph.node(consumer).unwrap();
        assert_eq!(get_output_tensor_size(producer), 128);
        assert_eq!(get_workspace_size(producer), 48);
        assert_eq!(get_weight_size(producer), 64);
        assert_eq!(get_input_tensor_size(consumer), 132);
        assert_eq!(get_weight_size(consumer), 0);
    }

    #[test]
    fn parent_affinity_and_lifecycle_lookups() {
        let (graph, _, consumer) = sample();
        let consumer = graph.node(consumer).unwrap();
        assert!(check_parent_op_is_ai_core(&graph, consumer, 0));
        assert!(!check_parent_op_is_ai_core(&graph, consumer, 1));
        assert!(!check_parent_op_is_ai_core(&graph, consumer, 2));
        assert!(!check_parent_op_is_ai_core(&graph, consumer, 9));

        assert!(read_is_life_cycle_end(consumer, 0));
        assert!(!read_is_life_cycle_end(consumer, 1));
        assert!(!read_is_life_cycle_end(consumer, 2));
        assert_eq!(read_visit_distance(consumer, 0), Some(3));
        assert_eq!(read_visit_distance(consumer, 1), None);
    }

    #[test]
    fn labels_are_appended_and_missing_targets_skipped() {
        let (mut graph, producer, consumer) = sample();
        let attr = CmoAttr::new(consumer, ObjectKind::Output, 0);
        assert_eq!(
            add_to_node_cmo_attr(&mut graph, producer, CmoType::Writeback, [attr]),
            1
        );
        assert_eq!(
            add_to_node_cmo_attr(&mut graph, producer, CmoType::Writeback, [attr]),
            1
        );
        assert_eq!(
            add_to_node_cmo_attr(&mut graph, NodeId(42), CmoType::Writeback, [attr]),
            0
        );
        let labels = &graph.node(producer).unwrap().cmo;
        assert_eq!(labels.get(CmoType::Writeback), &[attr, attr]);
    }
}
