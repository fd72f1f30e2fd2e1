//! Tunables for a reconciliation pass

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Polling policy for asynchronous state transitions (exponential backoff
/// with an overall deadline)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitConfig {
    /// First delay between polls (ms)
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,
    /// Upper bound on a single delay (ms)
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    /// Give up once this much time has passed (ms)
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
}

fn default_initial_delay() -> u64 {
    2000 // 2秒
}
fn default_max_delay() -> u64 {
    10000 // 10秒
}
fn default_multiplier() -> f64 {
    2.0
}
fn default_timeout() -> u64 {
    600_000 // 10分
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            multiplier: default_multiplier(),
            timeout_ms: default_timeout(),
        }
    }
}

impl WaitConfig {
    /// Delay before poll number `attempt` (0-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.initial_delay_ms as f64 * self.multiplier.powi(attempt as i32);
        Duration::from_millis((delay as u64).min(self.max_delay_ms))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// What the Volumes comparator does when describing volumes fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeProbeFailure {
    /// Log a warning and report the volumes as up to date
    #[default]
    AssumeInSync,
    /// Fail the diff with the describe error
    Propagate,
}

/// Settings shared by every reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconcileSettings {
    #[serde(default)]
    pub wait: WaitConfig,

    /// Issue a best-effort start when a power-cycled mutation fails
    #[serde(default)]
    pub restart_on_failure: bool,

    #[serde(default)]
    pub volume_probe_failure: VolumeProbeFailure,
}
