use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bounds for one agent loop run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentLoopConfig {
    /// Router round-trips allowed per message.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Tool calls allowed per message, across all iterations.
    #[serde(default = "default_max_tool_calls")]
    pub max_tool_calls: u32,
    /// Wall-clock budget for the whole run.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_max_iterations() -> u32 {
    10
}

fn default_max_tool_calls() -> u32 {
    5
}

fn default_timeout_ms() -> u64 {
    120_000
}

impl AgentLoopConfig {
    /// The run deadline as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for AgentLoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_tool_calls: default_max_tool_calls(),
            timeout_ms: default_timeout_ms(),
        }
    }
}
