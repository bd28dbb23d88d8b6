//! Ambient configuration for a [`super::StorageEngine`].
//!
//! The engine has exactly one tunable, the defragmentation efficiency
//! threshold — a tuning knob, not a correctness property.
//! [`EngineConfig::default`] reproduces the engine's original fixed 40%
//! behavior; a TOML file can override it, loaded the same way the
//! teacher crate's binaries load their own settings (`serde` + `toml`).

use serde::Deserialize;

/// Configuration accepted by [`super::StorageEngine::open_with_config`].
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Defragmentation runs when `live_bytes / backing_file_size` falls
    /// below this ratio. Spec §4.3 fixes it at `0.4`.
    pub defrag_threshold: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { defrag_threshold: 0.4 }
    }
}

impl EngineConfig {
    /// Parse configuration from a TOML document. Missing fields fall back
    /// to [`EngineConfig::default`].
    pub fn from_toml_str(source: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_spec_threshold() {
        assert_eq!(EngineConfig::default().defrag_threshold, 0.4);
    }

    #[test]
    fn partial_toml_keeps_default_for_missing_fields() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config.defrag_threshold, 0.4);
    }

    #[test]
    fn overrides_threshold() {
        let config = EngineConfig::from_toml_str("defrag_threshold = 0.6").unwrap();
        assert_eq!(config.defrag_threshold, 0.6);
    }
}
