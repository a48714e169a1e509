//! Cache-maintenance-operation (CMO) scheduling for streaming accelerator pipelines.
//!
//! The target pipeline has no hardware coherence between execution units, so the
//! compiler decides per producer/consumer edge whether a cache invalidate, writeback
//! or prefetch has to be emitted, and where a barrier keeps those operations ordered.
//!
//! ```text
//! Graph (annotated by upstream scheduling / memory-reuse passes)
//!      |
//!      v
//! CmoSchedulePass --> CmoTypeManager --+-- PrefetchStrategy
//!                                      +-- InvalidateStrategy
//!                                      +-- WritebackStrategy
//!      |
//!      v
//! Node::cmo (CmoLabelSet) --> task-context encoder
//! ```

pub mod cmo;
pub mod config;
mod env;
pub mod error;
pub mod graph;
pub mod pass;
pub mod text;

pub use cmo::{CmoAttr, CmoLabelSet, CmoLabelTable, CmoType, CmoTypeManager};
pub use config::CmoConfig;
pub use error::{CmoError, GraphError};
pub use graph::{Graph, ImplyType, Node, NodeBuilder, NodeId, ObjectKind, TensorDesc};
pub use pass::{schedule_cmo, CmoSchedulePass, PassResult};
