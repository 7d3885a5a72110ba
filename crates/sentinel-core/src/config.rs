//! Configuration for the decision engine and the tick processor.
//!
//! Both structs mirror sections of `sentinel-config.yaml` (`engine` and
//! `processor`). Every field has a default, so a partial or empty section
//! is valid. The service binary loads the file and threads these values
//! into [`DecisionEngine::new`] and [`TickProcessor::new`].
//!
//! [`DecisionEngine::new`]: crate::engine::DecisionEngine::new
//! [`TickProcessor::new`]: crate::processor::TickProcessor::new

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

/// Decision engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EngineConfig {
    /// Maximum actions returned per tick after priority sorting.
    #[serde(default = "default_max_actions_per_tick")]
    pub max_actions_per_tick: usize,

    /// Per-subsystem enable flags. Subsystems not listed are enabled.
    #[serde(default)]
    pub subsystems: BTreeMap<String, bool>,
}

impl EngineConfig {
    /// Whether the named subsystem should run.
    pub fn is_enabled(&self, name: &str) -> bool {
        self.subsystems.get(name).copied().unwrap_or(true)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_actions_per_tick: default_max_actions_per_tick(),
            subsystems: BTreeMap::new(),
        }
    }
}

/// Tick processor settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProcessorConfig {
    /// Number of past snapshots kept in the tick history.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Number of recent ticks in the latency statistics window.
    #[serde(default = "default_stats_window")]
    pub stats_window: usize,

    /// Processing budget per tick in milliseconds. Exceeding it is
    /// logged and counted, never fatal.
    #[serde(default = "default_decision_budget_ms")]
    pub decision_budget_ms: u64,
}

impl ProcessorConfig {
    /// The processing budget as a [`Duration`].
    pub const fn decision_budget(&self) -> Duration {
        Duration::from_millis(self.decision_budget_ms)
    }
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            history_capacity: default_history_capacity(),
            stats_window: default_stats_window(),
            decision_budget_ms: default_decision_budget_ms(),
        }
    }
}

const fn default_max_actions_per_tick() -> usize {
    8
}

const fn default_history_capacity() -> usize {
    32
}

const fn default_stats_window() -> usize {
    100
}

const fn default_decision_budget_ms() -> u64 {
    50
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let engine = EngineConfig::default();
        assert_eq!(engine.max_actions_per_tick, 8);
        assert!(engine.is_enabled("anything"));

        let processor = ProcessorConfig::default();
        assert_eq!(processor.history_capacity, 32);
        assert_eq!(processor.stats_window, 100);
        assert_eq!(processor.decision_budget(), Duration::from_millis(50));
    }

    #[test]
    fn partial_sections_fill_in_defaults() {
        let json = serde_json::json!({ "subsystems": { "economy": false } });
        let engine: EngineConfig = serde_json::from_value(json).unwrap_or_default();

        assert_eq!(engine.max_actions_per_tick, 8);
        assert!(!engine.is_enabled("economy"));
        assert!(engine.is_enabled("combat"));
    }
}
