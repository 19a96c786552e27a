// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Arena Match Engine

pub mod types;
pub mod config;
pub mod error;
pub mod profile;
pub mod oracle;
pub mod skill;
pub mod round;
pub mod resolution;
pub mod escrow;
pub mod settlement;
pub mod registry;
pub mod scheduler;
pub mod engine;
pub mod adapter;

pub use config::EngineConfig;
pub use engine::{MatchEngine, OracleStats};
pub use error::{ConfigError, LedgerError, MatchError, OracleError};
pub use oracle::{DelayedOracle, LocalPuzzleGenerator, Puzzle, PuzzleOracle, PuzzleType};
pub use profile::{AgentProfile, Mood, SkillProfile};
pub use registry::MatchRegistry;
pub use types::*;

use wasm_bindgen::prelude::*;

// ─── WASM Interface ──────────────────────────────────────────────────────────

/// Presentation-layer handle. Money crosses the boundary as f64; every
/// structured result is a serialized projection.
#[wasm_bindgen]
pub struct ArenaEngine {
    inner: MatchEngine<LocalPuzzleGenerator>,
}

fn js_err(e: impl std::fmt::Display) -> JsError {
    JsError::new(&e.to_string())
}

impl ArenaEngine {
    fn build(config: EngineConfig) -> Result<ArenaEngine, JsError> {
        #[cfg(target_arch = "wasm32")]
        std::panic::set_hook(Box::new(console_error_panic_hook::hook));

        let seed = config.seed;
        let inner = MatchEngine::new(config, LocalPuzzleGenerator::new(seed)).map_err(js_err)?;
        Ok(Self { inner })
    }
}

#[wasm_bindgen]
impl ArenaEngine {
    #[wasm_bindgen(constructor)]
    pub fn new(seed: u32) -> Result<ArenaEngine, JsError> {
        Self::build(EngineConfig::default().with_seed(seed as u64))
    }

    /// Partial JSON documents take defaults for missing fields.
    pub fn from_config(json: &str) -> Result<ArenaEngine, JsError> {
        Self::build(EngineConfig::from_json_str(json).map_err(js_err)?)
    }

    /// `{ id, coins, skill?: { speed, accuracy, dodge, collect }, underdog? }`
    pub fn register_agent(&mut self, spec: JsValue) -> Result<(), JsError> {
        let spec: adapter::AgentSpec = serde_wasm_bindgen::from_value(spec).map_err(js_err)?;
        let profile = spec.into_profile().map_err(js_err)?;
        self.inner.register_agent(profile).map_err(js_err)
    }

    pub fn create_match(&mut self, creator: &str, stake: f64) -> Result<u64, JsError> {
        let stake = adapter::coins_from_f64(stake).map_err(js_err)?;
        let id = self
            .inner
            .create_match(&AgentId::from(creator), stake)
            .map_err(js_err)?;
        Ok(id.0)
    }

    pub fn accept_match(&mut self, match_id: u64, opponent: &str) -> Result<(), JsError> {
        self.inner
            .accept_match(MatchId(match_id), &AgentId::from(opponent))
            .map_err(js_err)
    }

    /// Moves the clock to `now_ms` and returns the events produced.
    pub fn advance(&mut self, now_ms: u64) -> JsValue {
        self.inner.advance_to(now_ms);
        let events = self.inner.drain_events();
        serde_wasm_bindgen::to_value(&events).unwrap_or(JsValue::NULL)
    }

    pub fn get_match(&self, match_id: u64) -> JsValue {
        match self.inner.view(MatchId(match_id)) {
            Some(v) => serde_wasm_bindgen::to_value(&v).unwrap_or(JsValue::NULL),
            None => JsValue::NULL,
        }
    }

    pub fn open_matches(&self) -> JsValue {
        serde_wasm_bindgen::to_value(&self.inner.open_matches()).unwrap_or(JsValue::NULL)
    }

    pub fn get_profile(&self, agent: &str) -> JsValue {
        match self.inner.profile(&AgentId::from(agent)) {
            Some(p) => serde_wasm_bindgen::to_value(p).unwrap_or(JsValue::NULL),
            None => JsValue::NULL,
        }
    }

    pub fn balance(&self, agent: &str) -> f64 {
        self.inner
            .profile(&AgentId::from(agent))
            .map(|p| adapter::coins_to_f64(p.coins))
            .unwrap_or(0.0)
    }

    /// Voids every OPEN and ACTIVE match with refunds; returns how many.
    pub fn shutdown(&mut self) -> u32 {
        self.inner.void_in_flight() as u32
    }
}
