// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Arena Match Engine - Stochastic Skill Model
//
// Success probability and think time for one attempt, given a combatant's
// accuracy, the puzzle difficulty, mood, and the debut asymmetry.
//
//   p_main  = clamp(accuracy - difficulty * 0.08, 0.05, 1.0)
//   t_main  = (800ms + difficulty * 400ms + U(0, 600ms)) * (1 + (0.5 - speed) * 0.4)
//   p_power = 0.02 + accuracy * 0.13

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::profile::{Mood, SkillProfile};

const DIFFICULTY_PENALTY: f64 = 0.08;
const MIN_SOLVE_P: f64 = 0.05;
const MAX_SOLVE_P: f64 = 1.0;

const THINK_BASE_MS: f64 = 800.0;
const THINK_PER_DIFFICULTY_MS: f64 = 400.0;
const THINK_JITTER_MS: f64 = 600.0;
/// Think-time swing between the slowest and fastest speed around the 0.5 midpoint.
const SPEED_SPREAD: f64 = 0.4;

const POWER_BASE_P: f64 = 0.02;
const POWER_ACCURACY_WEIGHT: f64 = 0.13;
/// Retry window after a failed power attempt.
pub const POWER_RETRY_MS: (u64, u64) = (3_000, 7_000);
/// First attempt window after enrollment.
pub const POWER_ENROLL_MS: (u64, u64) = (5_000, 10_000);

// Debut asymmetry, main track
const BOOST_P: f64 = 0.4;
const BOOST_P_CAP: f64 = 0.98;
const PENALTY_P: f64 = 0.3;
// Debut asymmetry, power track
const POWER_BOOST_P: f64 = 0.3;
const POWER_BOOST_P_CAP: f64 = 0.6;
const POWER_PENALTY_FACTOR: f64 = 0.5;
const POWER_MIN_P: f64 = 0.01;

const DODGE_WEIGHT: f64 = 0.2;
const DODGE_CAP: f64 = 0.25;

/// Debut role of a combatant, fixed when the match is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Onboarding {
    #[default]
    None,
    /// Underdog on its first-ever match.
    Boosted,
    /// Facing a boosted underdog.
    Penalized,
}

impl Onboarding {
    /// Roles for (creator, opponent). A double debut cancels out.
    pub fn assign(creator_boosted: bool, opponent_boosted: bool) -> (Onboarding, Onboarding) {
        match (creator_boosted, opponent_boosted) {
            (true, false) => (Onboarding::Boosted, Onboarding::Penalized),
            (false, true) => (Onboarding::Penalized, Onboarding::Boosted),
            _ => (Onboarding::None, Onboarding::None),
        }
    }

    fn think_scale(&self) -> f64 {
        match self {
            Onboarding::None => 1.0,
            Onboarding::Boosted => 0.5,
            Onboarding::Penalized => 2.0,
        }
    }
}

/// Skill snapshot read from the profile store at tick time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkillInputs {
    pub skill: SkillProfile,
    pub mood: Mood,
    pub onboarding: Onboarding,
}

impl SkillInputs {
    pub fn new(skill: SkillProfile, mood: Mood, onboarding: Onboarding) -> Self {
        Self { skill, mood, onboarding }
    }

    /// Accuracy after mood or the debut adjustment (mood is bypassed while
    /// the asymmetry applies).
    pub fn effective_accuracy(&self) -> f64 {
        let acc = self.skill.accuracy;
        match self.onboarding {
            Onboarding::Boosted => (acc + BOOST_P).min(BOOST_P_CAP),
            Onboarding::Penalized => (acc - PENALTY_P).max(MIN_SOLVE_P),
            Onboarding::None => (acc * self.mood.modifiers().accuracy).min(1.0),
        }
    }

    pub fn effective_dodge(&self) -> f64 {
        self.skill.dodge * self.mood.modifiers().dodge
    }

    fn speed_scale(&self) -> f64 {
        let trait_scale = 1.0 + (0.5 - self.skill.speed) * SPEED_SPREAD;
        let situational = match self.onboarding {
            Onboarding::None => 1.0 / self.mood.modifiers().speed,
            other => other.think_scale(),
        };
        trait_scale * situational
    }

    /// Probability of solving a main puzzle at `difficulty`.
    pub fn solve_probability(&self, difficulty: u8) -> f64 {
        let raw = |acc: f64| {
            (acc - difficulty as f64 * DIFFICULTY_PENALTY).clamp(MIN_SOLVE_P, MAX_SOLVE_P)
        };
        match self.onboarding {
            Onboarding::None => raw(self.effective_accuracy()),
            Onboarding::Boosted => (raw(self.skill.accuracy) + BOOST_P).min(BOOST_P_CAP),
            Onboarding::Penalized => (raw(self.skill.accuracy) - PENALTY_P).max(MIN_SOLVE_P),
        }
    }

    pub fn think_time_ms<R: Rng + ?Sized>(&self, difficulty: u8, rng: &mut R) -> u64 {
        let base = THINK_BASE_MS
            + difficulty as f64 * THINK_PER_DIFFICULTY_MS
            + rng.gen_range(0.0..THINK_JITTER_MS);
        (base * self.speed_scale()).round() as u64
    }

    /// Probability of solving the power puzzle on one attempt.
    pub fn power_probability(&self) -> f64 {
        let base = POWER_BASE_P + self.skill.accuracy * POWER_ACCURACY_WEIGHT;
        match self.onboarding {
            Onboarding::None => {
                POWER_BASE_P + self.effective_accuracy() * POWER_ACCURACY_WEIGHT
            }
            Onboarding::Boosted => (base + POWER_BOOST_P).min(POWER_BOOST_P_CAP),
            Onboarding::Penalized => (base * POWER_PENALTY_FACTOR).max(POWER_MIN_P),
        }
    }

    /// Delay drawn from `window`, scaled like think time.
    pub fn power_delay_ms<R: Rng + ?Sized>(&self, window: (u64, u64), rng: &mut R) -> u64 {
        let raw = rng.gen_range(window.0..=window.1) as f64;
        (raw * self.speed_scale()).round() as u64
    }

    /// Chance of avoiding a counter-hit outright.
    pub fn dodge_chance(&self) -> f64 {
        (self.effective_dodge() * DODGE_WEIGHT).min(DODGE_CAP)
    }

    pub fn roll_solve<R: Rng + ?Sized>(&self, difficulty: u8, rng: &mut R) -> bool {
        rng.gen_bool(self.solve_probability(difficulty))
    }

    pub fn roll_power<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        rng.gen_bool(self.power_probability())
    }

    pub fn roll_dodge<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        rng.gen_bool(self.dodge_chance())
    }
}
