use anyhow::Context;
use serde::Serialize;

use crate::cmo::{CmoType, CmoTypeManager};
use crate::config::CmoConfig;
use crate::env::EnvOverrides;
use crate::error::CmoError;
use crate::graph::topology::validate_graph_topology;
use crate::graph::Graph;

/// Statistics reported by [`CmoSchedulePass::run`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PassResult {
    /// Whether any label was written.
    pub changed: bool,
    pub visited_nodes: usize,
    pub labels_added: usize,
    pub prefetch: usize,
    pub invalid: usize,
    pub barrier: usize,
    pub writeback: usize,
}

impl PassResult {
    /// Merges two run results, accumulating statistics.
    pub fn merge(self, other: PassResult) -> PassResult {
        PassResult {
            changed: self.changed || other.changed,
            visited_nodes: self.visited_nodes + other.visited_nodes,
            labels_added: self.labels_added + other.labels_added,
            prefetch: self.prefetch + other.prefetch,
            invalid: self.invalid + other.invalid,
            barrier: self.barrier + other.barrier,
            writeback: self.writeback + other.writeback,
        }
    }

    pub fn count(&self, ty: CmoType) -> usize {
        match ty {
            CmoType::Prefetch => self.prefetch,
            CmoType::Invalid => self.invalid,
            CmoType::Barrier => self.barrier,
            CmoType::Writeback => self.writeback,
        }
    }

    fn record(&mut self, ty: CmoType, count: usize) {
        match ty {
            CmoType::Prefetch => self.prefetch += count,
            CmoType::Invalid => self.invalid += count,
            CmoType::Barrier => self.barrier += count,
            CmoType::Writeback => self.writeback += count,
        }
    }
}

/// Runs the CMO strategies once over every node of a graph, in schedule order.
#[derive(Debug, Clone, Default)]
pub struct CmoSchedulePass {
    config: CmoConfig,
}

impl CmoSchedulePass {
    const NAME: &'static str = "cmo_schedule";

    pub fn new(config: CmoConfig) -> Self {
        Self { config }
    }

    pub fn from_env() -> Self {
        Self::new(CmoConfig::from_env())
    }

    pub fn name(&self) -> &'static str {
        Self::NAME
    }

    pub fn config(&self) -> &CmoConfig {
        &self.config
    }

    /// Labels are additive, so a graph may only be scheduled once.
    pub fn run(&self, graph: &mut Graph) -> Result<PassResult, CmoError> {
        let _span = tracing::debug_span!("cmo_schedule", graph = %graph.name()).entered();

        validate_graph_topology(graph)?;
        if let Some(node) = graph.first_labeled_node() {
            return Err(CmoError::AlreadyScheduled {
                graph: graph.name().to_string(),
                node: node.name.clone(),
            });
        }

        let mut manager = CmoTypeManager::new(self.config.clone());
        manager.initialize()?;
        let order = graph.node_ids().collect::<Vec<_>>();
        let mut result = PassResult::default();
        for node in order {
            result.labels_added += manager.generate_type(graph, node);
            result.visited_nodes += 1;
        }
        manager.finalize();

        for node in graph.nodes() {
            for (ty, attrs) in node.cmo.iter() {
                result.record(ty, attrs.len());
            }
        }
        result.changed = result.labels_added > 0;

        tracing::info!(
            pass = self.name(),
            graph = %graph.name(),
            nodes = result.visited_nodes,
            prefetch = result.prefetch,
            invalid = result.invalid,
            barrier = result.barrier,
            writeback = result.writeback,
            "cmo scheduling finished"
        );
        Ok(result)
    }
}

/// Schedules CMO labels for `graph` unless disabled through `CMO_DISABLE`.
pub fn schedule_cmo(graph: &mut Graph, config: &CmoConfig) -> anyhow::Result<PassResult> {
    schedule_with_overrides(graph, config, crate::env::overrides())
}

fn schedule_with_overrides(
    graph: &mut Graph,
    config: &CmoConfig,
    overrides: &EnvOverrides,
) -> anyhow::Result<PassResult> {
    if overrides.disabled {
        tracing::info!(graph = %graph.name(), "cmo scheduling disabled by CMO_DISABLE");
        return Ok(PassResult::default());
    }
    let name = graph.name().to_string();
    CmoSchedulePass::new(config.clone())
        .run(graph)
        .with_context(|| format!("cmo scheduling failed for graph `{name}`"))
}
