//! Engine configuration for the progress strategies.
//!
//! Timing tunables come from the `[engine]` table of a plan file, are then
//! overridden by environment variables, and finally by CLI flags:
//!
//! ```toml
//! [engine]
//! synthetic_tick_ms = 1000
//! synthetic_default_duration_ms = 10000
//! synthetic_cap_percent = 95
//! immediate_default_duration_ms = 500
//! immediate_max_duration_ms = 1000
//! milestone_detail_max_chars = 100
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::PlanError;

pub const ENV_SYNTHETIC_TICK_MS: &str = "STEPWISE_SYNTHETIC_TICK_MS";
pub const ENV_IMMEDIATE_MAX_MS: &str = "STEPWISE_IMMEDIATE_MAX_MS";

fn default_synthetic_tick_ms() -> u64 {
    1000
}

fn default_synthetic_duration_ms() -> u64 {
    10_000
}

fn default_synthetic_cap() -> u8 {
    95
}

fn default_immediate_duration_ms() -> u64 {
    500
}

fn default_immediate_max_ms() -> u64 {
    1000
}

fn default_detail_max_chars() -> usize {
    100
}

/// Timing and display tunables shared by every strategy invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Interval between synthetic progress ticks
    #[serde(default = "default_synthetic_tick_ms")]
    pub synthetic_tick_ms: u64,
    /// Estimate used by the synthetic strategy when a step declares none
    #[serde(default = "default_synthetic_duration_ms")]
    pub synthetic_default_duration_ms: u64,
    /// Highest percent a synthetic tick may claim before the process exits
    #[serde(default = "default_synthetic_cap")]
    pub synthetic_cap_percent: u8,
    /// Minimum display duration for fast commands without an estimate
    #[serde(default = "default_immediate_duration_ms")]
    pub immediate_default_duration_ms: u64,
    /// Upper bound on any minimum display duration
    #[serde(default = "default_immediate_max_ms")]
    pub immediate_max_duration_ms: u64,
    /// Truncation length for raw output used as milestone detail
    #[serde(default = "default_detail_max_chars")]
    pub milestone_detail_max_chars: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            synthetic_tick_ms: default_synthetic_tick_ms(),
            synthetic_default_duration_ms: default_synthetic_duration_ms(),
            synthetic_cap_percent: default_synthetic_cap(),
            immediate_default_duration_ms: default_immediate_duration_ms(),
            immediate_max_duration_ms: default_immediate_max_ms(),
            milestone_detail_max_chars: default_detail_max_chars(),
        }
    }
}

impl EngineConfig {
    pub fn synthetic_tick(&self) -> Duration {
        Duration::from_millis(self.synthetic_tick_ms)
    }

    pub fn synthetic_default_duration(&self) -> Duration {
        Duration::from_millis(self.synthetic_default_duration_ms)
    }

    pub fn immediate_default_duration(&self) -> Duration {
        Duration::from_millis(self.immediate_default_duration_ms)
    }

    pub fn immediate_max_duration(&self) -> Duration {
        Duration::from_millis(self.immediate_max_duration_ms)
    }

    /// Check invariants the strategies rely on.
    pub fn validate(&self) -> Result<(), PlanError> {
        if self.synthetic_tick_ms == 0 {
            return Err(invalid("synthetic_tick_ms", "must be greater than zero"));
        }
        if self.synthetic_cap_percent >= 100 {
            return Err(invalid(
                "synthetic_cap_percent",
                "must be below 100 so synthetic progress never claims completion",
            ));
        }
        if self.milestone_detail_max_chars < 4 {
            return Err(invalid("milestone_detail_max_chars", "must be at least 4"));
        }
        Ok(())
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), PlanError> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), PlanError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_SYNTHETIC_TICK_MS) {
            self.synthetic_tick_ms = parse_millis(ENV_SYNTHETIC_TICK_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_IMMEDIATE_MAX_MS) {
            self.immediate_max_duration_ms = parse_millis(ENV_IMMEDIATE_MAX_MS, &value)?;
        }
        Ok(())
    }

    /// Apply CLI flag overrides, which take precedence over file and env.
    pub fn apply_overrides(&mut self, overrides: &EngineOverrides) {
        if let Some(tick) = overrides.synthetic_tick_ms {
            self.synthetic_tick_ms = tick;
        }
        if let Some(max) = overrides.immediate_max_duration_ms {
            self.immediate_max_duration_ms = max;
        }
    }
}

/// Engine settings supplied on the command line.
#[derive(Debug, Clone, Default)]
pub struct EngineOverrides {
    pub synthetic_tick_ms: Option<u64>,
    pub immediate_max_duration_ms: Option<u64>,
}

fn invalid(setting: &str, message: &str) -> PlanError {
    PlanError::InvalidEngine {
        setting: setting.to_string(),
        message: message.to_string(),
    }
}

fn parse_millis(key: &str, value: &str) -> Result<u64, PlanError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|e| invalid(key, &format!("expected milliseconds, got '{}' ({})", value, e)))
}
