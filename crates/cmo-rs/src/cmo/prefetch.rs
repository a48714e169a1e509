use std::collections::HashMap;

use smallvec::SmallVec;

use crate::config::CmoConfig;
use crate::graph::{Graph, NodeId, ObjectKind, OutAnchor};

use super::base::{
    add_to_node_cmo_attr, get_cache_size, get_input_tensor_size, get_output_tensor_size,
    get_weight_size, get_workspace_size,
};
use super::label::{CmoAttr, CmoType};

/// Emits `Prefetch` on weight producers feeding AI-core consumers.
///
/// `prefetch_cache` maps each producer to the consumer it was last prefetched
/// for. Only a new label moves the entry; a consumer scheduled close to that
/// consumer finds the weight still warm and is skipped. The cache lives as
/// long as the strategy, i.e. one manager run.
#[derive(Debug, Default)]
pub struct PrefetchStrategy {
    prefetch_cache: HashMap<NodeId, NodeId>,
}

impl PrefetchStrategy {
    pub const NAME: &'static str = "prefetch";

    pub fn generate_type(&mut self, graph: &mut Graph, node: NodeId, config: &CmoConfig) -> usize {
        let Some(current) = graph.node(node) else {
            return 0;
        };
        if !current.is_ai_core_class() {
            return 0;
        }
        let producers: SmallVec<[OutAnchor; 4]> = current
            .inputs
            .iter()
            .filter_map(|input| input.peer)
            .collect();

        let mut added = 0;
        for peer in producers {
            if self.check_need_prefetch(graph, peer.node, node, config) {
                added += self.labeled_prefetch(graph, peer, node);
            }
        }
        added
    }

    /// Last consumer recorded for `producer` in this run.
    pub fn last_prefetched(&self, producer: NodeId) -> Option<NodeId> {
        self.prefetch_cache.get(&producer).copied()
    }

    fn check_need_prefetch(
        &mut self,
        graph: &Graph,
        producer: NodeId,
        consumer: NodeId,
        config: &CmoConfig,
    ) -> bool {
        let Some(producer_node) = graph.node(producer) else {
            return false;
        };
        if get_weight_size(producer_node) <= 0 {
            return false;
        }
        if let Some(last) = self.last_prefetched(producer) {
            if last == consumer {
                return false;
            }
            if is_still_warm(graph, last, consumer, config) {
                return false;
            }
        }
        check_size_is_available(graph, producer, consumer, config)
    }

    fn labeled_prefetch(&mut self, graph: &mut Graph, peer: OutAnchor, consumer: NodeId) -> usize {
        if let (Some(producer), Some(reader)) = (graph.node(peer.node), graph.node(consumer)) {
            tracing::debug!(
                producer = %producer.name,
                consumer = %reader.name,
                output = peer.index,
                "prefetch weight"
            );
        }
        let attr = CmoAttr::new(consumer, ObjectKind::Output, peer.index);
        let added = add_to_node_cmo_attr(graph, peer.node, CmoType::Prefetch, [attr]);
        self.prefetch_cache.insert(peer.node, consumer);
        added
    }
}

/// `consumer` runs on the same stream shortly after `last`, the consumer the
/// weight was actually prefetched for. Unknown placement counts as warm.
fn is_still_warm(graph: &Graph, last: NodeId, consumer: NodeId, config: &CmoConfig) -> bool {
    let (Some(last), Some(consumer)) = (graph.node(last), graph.node(consumer)) else {
        return true;
    };
    let (Some(last_stream), Some(stream)) = (last.stream_id, consumer.stream_id) else {
        return true;
    };
    let (Some(last_index), Some(index)) = (last.read_write_index, consumer.read_write_index) else {
        return true;
    };
    if last_stream != stream {
        return false;
    }
    let gap = i64::from(index) - i64::from(last_index);
    (0..i64::from(config.data_visit_dist_threshold)).contains(&gap)
}

/// The weight and the consumer's working set must both fit in the cache.
fn check_size_is_available(
    graph: &Graph,
    producer: NodeId,
    consumer: NodeId,
    config: &CmoConfig,
) -> bool {
    let (Some(producer), Some(consumer)) = (graph.node(producer), graph.node(consumer)) else {
        return false;
    };
    let cache_size = i128::from(get_cache_size(config));
    let weight_size = i128::from(get_weight_size(producer));
    let working_set = i128::from(get_input_tensor_size(consumer))
        + i128::from(get_output_tensor_size(consumer))
        + i128::from(get_workspace_size(consumer));
    if weight_size > cache_size || working_set > cache_size {
        tracing::trace!(
            producer = %producer.name,
            consumer = %consumer.name,
            weight_size = weight_size as i64,
            cache_size = cache_size as u64,
            "prefetch does not fit in cache"
        );
        return false;
    }
    true
}
