//! CMO label generation.
//!
//! Each strategy inspects one node at a time and writes labels onto whichever
//! nodes own the affected buffers; [`CmoTypeManager`] sequences them.

pub mod base;
mod invalidate;
mod label;
mod manager;
mod prefetch;
mod writeback;

pub use invalidate::{check_reuse_distance, check_reuse_distance_and_labeled, InvalidateStrategy};
pub use label::{
    render_labels, CmoAttr, CmoLabelSet, CmoLabelTable, CmoType, ExportedCmoAttr, UnknownCmoType,
};
pub use manager::{CmoStrategy, CmoTypeManager};
pub use prefetch::PrefetchStrategy;
pub use writeback::WritebackStrategy;
