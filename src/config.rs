use serde::{Deserialize, Serialize};
use std::path::Path;

/// Engine tuning knobs. Loadable from a YAML file for deployments; the
/// defaults match the values the engine was balanced against.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Period of the global unit timer, in milliseconds.
    pub tick_interval_ms: u64,
    /// Concurrent group slots per caster; the oldest group is evicted when
    /// a caster places one beyond this.
    pub max_groups_per_caster: usize,
    /// Group ids below this value are reserved for other object classes.
    pub group_id_floor: u32,
    /// Capacity of the footprint offset cache.
    pub layout_cache_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,
            max_groups_per_caster: 25,
            group_id_floor: 0x10000,
            layout_cache_capacity: 64,
        }
    }
}

impl EngineConfig {
    pub fn from_yaml_str(contents: &str) -> Result<Self, String> {
        serde_yaml::from_str(contents).map_err(|err| format!("engine config parse failed: {}", err))
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self, String> {
        let contents = std::fs::read_to_string(path)
            .map_err(|err| format!("engine config read {} failed: {}", path.display(), err))?;
        Self::from_yaml_str(&contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = EngineConfig::default();
        assert_eq!(config.tick_interval_ms, 100);
        assert_eq!(config.max_groups_per_caster, 25);
        assert!(config.group_id_floor > 0);
    }

    #[test]
    fn yaml_overrides_only_named_fields() {
        let config =
            EngineConfig::from_yaml_str("tick_interval_ms: 50\nmax_groups_per_caster: 3\n")
                .expect("parse");
        assert_eq!(config.tick_interval_ms, 50);
        assert_eq!(config.max_groups_per_caster, 3);
        assert_eq!(config.group_id_floor, EngineConfig::default().group_id_floor);
    }

    #[test]
    fn malformed_yaml_is_a_string_error() {
        let err = EngineConfig::from_yaml_str("tick_interval_ms: [nope").unwrap_err();
        assert!(err.contains("engine config parse failed"));
    }
}
