// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Arena Match Engine - Agent Profiles
//
// Persistent per-agent economy and psychology: balance, win/loss record,
// signed streak, recent-results ring buffer, derived mood and unlocks.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, VecDeque};

use crate::error::MatchError;
use crate::types::{AgentId, Coins};

/// Outcomes kept in each profile's ring buffer.
pub const RECENT_RESULTS_CAP: usize = 10;

const STREAK_HOT: i32 = 3;
const STREAK_COLD: i32 = -3;
const MOOD_MIN_GAMES: u32 = 3;
const WIN_RATE_HIGH: f64 = 0.6;
const WIN_RATE_LOW: f64 = 0.35;

// ---------------------------------------------------------------------------
// Skill profile
// ---------------------------------------------------------------------------

/// Baseline abilities, each in `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkillProfile {
    pub speed: f64,
    pub accuracy: f64,
    pub dodge: f64,
    pub collect: f64,
}

/// NaN reads as zero; everything else is clamped into the unit interval.
fn unit(v: f64) -> f64 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

impl SkillProfile {
    pub fn new(speed: f64, accuracy: f64, dodge: f64, collect: f64) -> Self {
        Self {
            speed: unit(speed),
            accuracy: unit(accuracy),
            dodge: unit(dodge),
            collect: unit(collect),
        }
    }

    /// Re-applies the `[0.0, 1.0]` bounds to a profile built field by field.
    pub fn clamped(self) -> Self {
        Self::new(self.speed, self.accuracy, self.dodge, self.collect)
    }
}

impl Default for SkillProfile {
    fn default() -> Self {
        Self::new(0.5, 0.5, 0.5, 0.5)
    }
}

// ---------------------------------------------------------------------------
// Mood
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Mood {
    Ecstatic,
    Happy,
    #[default]
    Neutral,
    Frustrated,
    Tilted,
}

/// Per-ability scaling applied on top of the skill profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoodModifiers {
    pub speed: f64,
    pub accuracy: f64,
    pub dodge: f64,
    pub collect: f64,
}

impl Mood {
    pub fn modifiers(&self) -> MoodModifiers {
        let (speed, accuracy, dodge, collect) = match self {
            Self::Ecstatic => (1.10, 1.08, 1.05, 1.10),
            Self::Happy => (1.05, 1.04, 1.02, 1.05),
            Self::Neutral => (1.00, 1.00, 1.00, 1.00),
            Self::Frustrated => (0.95, 0.94, 0.96, 0.95),
            Self::Tilted => (0.90, 0.88, 0.92, 0.90),
        };
        MoodModifiers { speed, accuracy, dodge, collect }
    }

    /// Pure function of the record after the latest result.
    /// Streaks dominate; win rate only counts once a few games exist.
    pub fn derive(wins: u32, losses: u32, streak: i32) -> Mood {
        if streak >= STREAK_HOT {
            return Mood::Ecstatic;
        }
        if streak <= STREAK_COLD {
            return Mood::Tilted;
        }
        let games = wins + losses;
        if games < MOOD_MIN_GAMES {
            return Mood::Neutral;
        }
        let rate = wins as f64 / games as f64;
        if rate >= WIN_RATE_HIGH {
            Mood::Happy
        } else if rate <= WIN_RATE_LOW {
            Mood::Frustrated
        } else {
            Mood::Neutral
        }
    }
}

// ---------------------------------------------------------------------------
// Unlocks
// ---------------------------------------------------------------------------

/// A cosmetic or ability tier granted once its thresholds are met.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnlockTier {
    pub key: &'static str,
    pub min_wins: u32,
    pub min_games: u32,
}

pub const UNLOCK_TIERS: &[UnlockTier] = &[
    UnlockTier { key: "first_blood_banner", min_wins: 1, min_games: 1 },
    UnlockTier { key: "victory_dance", min_wins: 3, min_games: 5 },
    UnlockTier { key: "silver_aura", min_wins: 5, min_games: 10 },
    UnlockTier { key: "power_surge", min_wins: 10, min_games: 20 },
    UnlockTier { key: "gold_aura", min_wins: 25, min_games: 50 },
];

// ---------------------------------------------------------------------------
// AgentProfile
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchResult {
    Win,
    Loss,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentProfile {
    pub id: AgentId,
    pub coins: Coins,
    pub wins: u32,
    pub losses: u32,
    /// Positive on win streaks, negative on loss streaks.
    pub streak: i32,
    pub recent_results: VecDeque<MatchResult>,
    pub mood: Mood,
    pub skill: SkillProfile,
    /// Designated to receive the one-time debut boost.
    #[serde(default)]
    pub underdog: bool,
    /// Set when an accepted match takes the debut boost.
    #[serde(default)]
    pub debut_claimed: bool,
    #[serde(default)]
    pub unlocked: BTreeSet<String>,
}

impl AgentProfile {
    pub fn new(id: impl Into<AgentId>, coins: Coins, skill: SkillProfile) -> Self {
        Self {
            id: id.into(),
            coins,
            wins: 0,
            losses: 0,
            streak: 0,
            recent_results: VecDeque::with_capacity(RECENT_RESULTS_CAP),
            mood: Mood::Neutral,
            skill,
            underdog: false,
            debut_claimed: false,
            unlocked: BTreeSet::new(),
        }
    }

    pub fn as_underdog(mut self) -> Self {
        self.underdog = true;
        self
    }

    pub fn games_played(&self) -> u32 {
        self.wins + self.losses
    }

    /// True until the first match completes with a result or a live match
    /// has already claimed the debut.
    pub fn is_debut(&self) -> bool {
        self.games_played() == 0 && !self.debut_claimed
    }

    /// Check-and-set on the debut boost; true only for the first claim.
    pub fn claim_debut(&mut self) -> bool {
        if !self.underdog || !self.is_debut() {
            return false;
        }
        self.debut_claimed = true;
        true
    }

    /// Hands an unused debut back, e.g. when its match is voided.
    pub fn release_debut(&mut self) {
        if self.games_played() == 0 {
            self.debut_claimed = false;
        }
    }

    /// Extend or reverse the streak, push to the ring buffer, re-derive mood.
    pub fn record_result(&mut self, result: MatchResult) {
        match result {
            MatchResult::Win => {
                self.wins += 1;
                self.streak = if self.streak > 0 { self.streak + 1 } else { 1 };
            }
            MatchResult::Loss => {
                self.losses += 1;
                self.streak = if self.streak < 0 { self.streak - 1 } else { -1 };
            }
        }
        self.recent_results.push_back(result);
        while self.recent_results.len() > RECENT_RESULTS_CAP {
            self.recent_results.pop_front();
        }
        self.mood = Mood::derive(self.wins, self.losses, self.streak);
    }

    /// Grants every tier newly satisfied by the current record.
    ///
    /// Set insertion is the check-and-set, so a retried call grants nothing.
    pub fn grant_unlocks(&mut self) -> Vec<String> {
        let games = self.games_played();
        let mut granted = Vec::new();
        for tier in UNLOCK_TIERS {
            if self.wins >= tier.min_wins
                && games >= tier.min_games
                && self.unlocked.insert(tier.key.to_string())
            {
                granted.push(tier.key.to_string());
            }
        }
        granted
    }
}

// ---------------------------------------------------------------------------
// ProfileStore
// ---------------------------------------------------------------------------

/// In-memory profile collaborator owned by the registry.
#[derive(Debug, Clone, Default)]
pub struct ProfileStore {
    profiles: HashMap<AgentId, AgentProfile>,
}

impl ProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skill values are clamped on the way in; the rolls assume unit bounds.
    pub fn register(&mut self, mut profile: AgentProfile) -> Result<(), MatchError> {
        if self.profiles.contains_key(&profile.id) {
            return Err(MatchError::DuplicateAgent(profile.id));
        }
        profile.skill = profile.skill.clamped();
        self.profiles.insert(profile.id.clone(), profile);
        Ok(())
    }

    pub fn get(&self, id: &AgentId) -> Option<&AgentProfile> {
        self.profiles.get(id)
    }

    pub fn get_mut(&mut self, id: &AgentId) -> Option<&mut AgentProfile> {
        self.profiles.get_mut(id)
    }

    pub fn contains(&self, id: &AgentId) -> bool {
        self.profiles.contains_key(id)
    }

    pub fn total_coins(&self) -> Coins {
        self.profiles.values().fold(Coins::zero(), |acc, p| acc + p.coins)
    }
}
