use std::env;
use std::str::FromStr;
use std::sync::OnceLock;

static OVERRIDES: OnceLock<EnvOverrides> = OnceLock::new();

/// `CMO_*` knobs, read once per process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct EnvOverrides {
    pub disabled: bool,
    pub data_visit_dist_threshold: Option<i32>,
    pub mem_reuse_dist_threshold: Option<i32>,
    pub cache_size: Option<u64>,
}

impl EnvOverrides {
    /// Builds the overrides from any variable source; `lookup` returns `None`
    /// for unset variables.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        Self {
            disabled: read("CMO_DISABLE").is_some_and(|value| parse_bool(&value)),
            data_visit_dist_threshold: read("CMO_DATA_VISIT_DIST_THRESHOLD")
                .and_then(|value| parse_value("CMO_DATA_VISIT_DIST_THRESHOLD", &value)),
            mem_reuse_dist_threshold: read("CMO_MEM_REUSE_DIST_THRESHOLD")
                .and_then(|value| parse_value("CMO_MEM_REUSE_DIST_THRESHOLD", &value)),
            cache_size: read("CMO_CACHE_SIZE")
                .and_then(|value| parse_value("CMO_CACHE_SIZE", &value)),
        }
    }
}

fn parse_bool(value: &str) -> bool {
    let normalized = value.trim().to_ascii_lowercase();
    matches!(normalized.as_str(), "1" | "true" | "yes" | "on")
}

fn parse_value<T: FromStr>(name: &str, value: &str) -> Option<T> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<T>() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            tracing::warn!(var = name, value = trimmed, "ignoring unparseable override");
            None
        }
    }
}

pub(crate) fn overrides() -> &'static EnvOverrides {
    OVERRIDES.get_or_init(|| EnvOverrides::from_lookup(|name| env::var(name).ok()))
}
