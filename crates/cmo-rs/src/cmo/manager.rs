use crate::config::CmoConfig;
use crate::error::CmoError;
use crate::graph::{Graph, NodeId};

use super::invalidate::InvalidateStrategy;
use super::prefetch::PrefetchStrategy;
use super::writeback::WritebackStrategy;

/// Closed set of label generators. `Barrier` has no generator of its own; it
/// is written by [`InvalidateStrategy`] alongside `Invalid`.
#[derive(Debug)]
pub enum CmoStrategy {
    Prefetch(PrefetchStrategy),
    Invalidate(InvalidateStrategy),
    Writeback(WritebackStrategy),
}

impl CmoStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            CmoStrategy::Prefetch(_) => PrefetchStrategy::NAME,
            CmoStrategy::Invalidate(_) => InvalidateStrategy::NAME,
            CmoStrategy::Writeback(_) => WritebackStrategy::NAME,
        }
    }

    pub fn generate_type(&mut self, graph: &mut Graph, node: NodeId, config: &CmoConfig) -> usize {
        match self {
            CmoStrategy::Prefetch(strategy) => strategy.generate_type(graph, node, config),
            CmoStrategy::Invalidate(strategy) => strategy.generate_type(graph, node, config),
            CmoStrategy::Writeback(strategy) => strategy.generate_type(graph, node, config),
        }
    }
}

/// Registry and per-node driver for the CMO strategies.
///
/// One manager serves one compilation: construct it, [`initialize`](Self::initialize),
/// call [`generate_type`](Self::generate_type) for every node in schedule order,
/// then [`finalize`](Self::finalize).
#[derive(Debug)]
pub struct CmoTypeManager {
    config: CmoConfig,
    strategies: Vec<CmoStrategy>,
}

impl CmoTypeManager {
    pub fn new(config: CmoConfig) -> Self {
        Self {
            config,
            strategies: Vec::new(),
        }
    }

    pub fn config(&self) -> &CmoConfig {
        &self.config
    }

    /// Registers Prefetch, Invalidate and Writeback. Repeated calls are no-ops
    /// until [`finalize`](Self::finalize).
    pub fn initialize(&mut self) -> Result<(), CmoError> {
        if self.is_initialized() {
            return Ok(());
        }
        let mut registry = Vec::new();
        registry.try_reserve_exact(3)?;
        registry.push(CmoStrategy::Prefetch(PrefetchStrategy::default()));
        registry.push(CmoStrategy::Invalidate(InvalidateStrategy));
        registry.push(CmoStrategy::Writeback(WritebackStrategy));
        self.strategies = registry;
        Ok(())
    }

    /// Drops all strategies together with their per-run state.
    pub fn finalize(&mut self) {
        self.strategies.clear();
    }

    pub fn is_initialized(&self) -> bool {
        !self.strategies.is_empty()
    }

    /// Registered strategy names in execution order.
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(CmoStrategy::name).collect()
    }

    pub fn strategies(&self) -> &[CmoStrategy] {
        &self.strategies
    }

    /// Runs every registered strategy on `node`; returns the number of labels added.
    pub fn generate_type(&mut self, graph: &mut Graph, node: NodeId) -> usize {
        let config = &self.config;
        self.strategies
            .iter_mut()
            .map(|strategy| strategy.generate_type(graph, node, config))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{NodeBuilder, TensorDesc};

    #[test]
    fn initialize_is_idempotent_and_ordered() {
        let mut manager = CmoTypeManager::new(CmoConfig::default());
        assert!(!manager.is_initialized());
        manager.initialize().unwrap();
        manager.initialize().unwrap();
        assert_eq!(
            manager.strategy_names(),
            ["prefetch", "invalidate", "writeback"]
        );
        manager.finalize();
        assert!(manager.strategy_names().is_empty());
    }

    #[test]
    fn uninitialized_manager_produces_nothing() {
        let mut graph = Graph::new("g");
        let weights = graph
            .insert(NodeBuilder::new("w", "const").output_bytes(16).weight(16))
            .unwrap();
        let consumer = graph
            .insert(NodeBuilder::new("mm", "matmul").ai_core().input_from(
                weights,
                0,
                TensorDesc::new().with_size(16),
            ))
            .unwrap();
        let mut manager = CmoTypeManager::new(CmoConfig::default());
        assert_eq!(manager.generate_type(&mut graph, consumer), 0);
        assert!(graph.first_labeled_node().is_none());
    }

    #[test]
    fn finalize_forgets_prefetch_state() {
        let mut graph = Graph::new("g");
        let weights = graph
            .insert(NodeBuilder::new("w", "const").output_bytes(16).weight(16))
            .unwrap();
        let consumer = graph
            .insert(
                NodeBuilder::new("mm", "matmul")
                    .ai_core()
                    .stream(0)
                    .read_write_index(1)
                    .input_from(weights, 0, TensorDesc::new().with_size(16)),
            )
            .unwrap();
        let mut manager = CmoTypeManager::new(CmoConfig::default());
        manager.initialize().unwrap();
        assert_eq!(manager.generate_type(&mut graph, consumer), 1);
        assert_eq!(manager.generate_type(&mut graph, consumer), 0);

        manager.finalize();
        manager.initialize().unwrap();
        assert_eq!(manager.generate_type(&mut graph, consumer), 1);
    }
}
