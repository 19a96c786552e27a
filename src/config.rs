// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Arena Match Engine - Engine Configuration

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Timing and threshold parameters for a [`MatchEngine`](crate::MatchEngine).
///
/// All durations are milliseconds on the engine clock. Missing JSON fields
/// take the defaults below.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Period of each ACTIVE match's repeating timer.
    pub tick_interval_ms: u64,
    /// Intro window after acceptance during which ticks are no-ops.
    pub warmup_ms: u64,
    /// OPEN matches not accepted within this window are voided.
    pub open_expiry_ms: u64,
    /// Delay between a finisher firing and settlement.
    pub finisher_grace_ms: u64,
    /// Solves by one combatant that unlock the power puzzle.
    pub puzzle_threshold: u32,
    /// Resolved ticks after which the match is decided on hp.
    pub timeout_ticks: u32,
    /// Outstanding oracle requests older than this fall back to local generation.
    pub oracle_timeout_ms: u64,
    /// Narration entries kept per round.
    pub narration_capacity: usize,
    /// Seed for the engine rng and the fallback generator.
    pub seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 600,
            warmup_ms: 7_000,
            open_expiry_ms: 90_000,
            finisher_grace_ms: 5_000,
            puzzle_threshold: 5,
            timeout_ticks: 150,
            oracle_timeout_ms: 4_000,
            narration_capacity: 30,
            seed: 0,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let cfg: EngineConfig = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "tick_interval_ms",
                reason: "must be non-zero",
            });
        }
        if self.open_expiry_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "open_expiry_ms",
                reason: "must be non-zero",
            });
        }
        if self.puzzle_threshold == 0 {
            return Err(ConfigError::Invalid {
                field: "puzzle_threshold",
                reason: "must be at least 1",
            });
        }
        if self.timeout_ticks == 0 {
            return Err(ConfigError::Invalid {
                field: "timeout_ticks",
                reason: "must be at least 1",
            });
        }
        if self.narration_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "narration_capacity",
                reason: "must be at least 1",
            });
        }
        Ok(())
    }
}
