use serde::{Deserialize, Serialize};

use crate::env::EnvOverrides;

/// Default distance (in scheduled steps) separating "near" reads from "far" reads.
pub const DEFAULT_DATA_VISIT_DIST_THRESHOLD: i32 = 5;
/// Default gap between a last read and the aliasing write that still needs an invalidate.
pub const DEFAULT_MEM_REUSE_DIST_THRESHOLD: i32 = 2;
/// Default on-chip cache capacity used for prefetch admission.
pub const DEFAULT_CACHE_SIZE: u64 = 32 * 1024 * 1024;

/// Platform knobs consumed by the CMO strategies.
///
/// Missing fields fall back to the defaults when deserializing, so a partial
/// platform description such as `{"cache_size": 4096}` is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CmoConfig {
    /// Reads below this visit distance are candidates for invalidation,
    /// reads at or above it are candidates for writeback.
    pub data_visit_dist_threshold: i32,
    /// Minimum read-to-reuse gap (same stream) that requires invalidate + barrier.
    pub mem_reuse_dist_threshold: i32,
    /// Cache capacity in bytes.
    pub cache_size: u64,
}

impl Default for CmoConfig {
    fn default() -> Self {
        Self {
            data_visit_dist_threshold: DEFAULT_DATA_VISIT_DIST_THRESHOLD,
            mem_reuse_dist_threshold: DEFAULT_MEM_REUSE_DIST_THRESHOLD,
            cache_size: DEFAULT_CACHE_SIZE,
        }
    }
}

impl CmoConfig {
    /// Defaults with `CMO_*` environment overrides applied.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    pub fn with_env_overrides(self) -> Self {
        self.apply_overrides(crate::env::overrides())
    }

    pub(crate) fn apply_overrides(mut self, overrides: &EnvOverrides) -> Self {
        if let Some(value) = overrides.data_visit_dist_threshold {
            self.data_visit_dist_threshold = value;
        }
        if let Some(value) = overrides.mem_reuse_dist_threshold {
            self.mem_reuse_dist_threshold = value;
        }
        if let Some(value) = overrides.cache_size {
            self.cache_size = value;
        }
        self
    }

    pub fn with_data_visit_dist_threshold(mut self, threshold: i32) -> Self {
        self.data_visit_dist_threshold = threshold;
        self
    }

    pub fn with_mem_reuse_dist_threshold(mut self, threshold: i32) -> Self {
        self.mem_reuse_dist_threshold = threshold;
        self
    }

    pub fn with_cache_size(mut self, bytes: u64) -> Self {
        self.cache_size = bytes;
        self
    }
}
