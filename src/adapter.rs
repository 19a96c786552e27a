//! Adapter layer: converts between the JS boundary's f64 world and the
//! engine's Decimal-backed types.

use num_traits::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::MatchError;
use crate::profile::{AgentProfile, SkillProfile};
use crate::types::Coins;

/// Smallest coin unit carried across the boundary.
const COIN_DP: u32 = 8;

/// Strict conversion for money entering the engine.
pub fn coins_from_f64(v: f64) -> Result<Coins, MatchError> {
    if !v.is_finite() || v < 0.0 {
        return Err(MatchError::InvalidAmount(v));
    }
    let d = Decimal::from_f64(v).ok_or(MatchError::InvalidAmount(v))?;
    Ok(Coins(d.round_dp(COIN_DP)))
}

/// Display-side conversion; precision past f64 is dropped.
pub fn coins_to_f64(c: Coins) -> f64 {
    c.0.to_f64().unwrap_or(0.0)
}

/// Registration payload from the presentation layer.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentSpec {
    pub id: String,
    pub coins: f64,
    #[serde(default)]
    pub skill: SkillProfile,
    #[serde(default)]
    pub underdog: bool,
}

impl AgentSpec {
    pub fn into_profile(self) -> Result<AgentProfile, MatchError> {
        let coins = coins_from_f64(self.coins)?;
        let profile = AgentProfile::new(self.id, coins, self.skill.clamped());
        Ok(if self.underdog { profile.as_underdog() } else { profile })
    }
}
