// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Arena Match Engine - Type Definitions

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Mul, Sub};

use crate::round::MatchRound;

// ─── AgentId ─────────────────────────────────────────────────────────────────

/// Identity of a human or AI-controlled agent.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct AgentId(pub String);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for AgentId {
    fn from(s: String) -> Self { AgentId(s) }
}

impl From<&str> for AgentId {
    fn from(s: &str) -> Self { AgentId(s.to_string()) }
}

// ─── MatchId ─────────────────────────────────────────────────────────────────

/// Opaque match identifier, allocated sequentially by the registry.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct MatchId(pub u64);

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m-{}", self.0)
    }
}

// ─── Coins ───────────────────────────────────────────────────────────────────

/// Play-money amount backed by `rust_decimal::Decimal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Coins(pub Decimal);

impl Coins {
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn from_decimal(d: Decimal) -> Self {
        Self(d)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }
}

impl Add for Coins {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Coins {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Mul<u32> for Coins {
    type Output = Self;
    fn mul(self, rhs: u32) -> Self::Output {
        Self(self.0 * Decimal::from(rhs))
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} coins", self.0)
    }
}

// ─── Match Kind / Status ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum MatchKind {
    /// Two combatants race the same puzzle; solves deal damage.
    #[default]
    PuzzleDuel,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MatchStatus {
    Open,
    Active,
    /// TERMINAL: settled with a winner, or voided with none.
    Finished,
}

impl MatchStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished)
    }
}

/// Which of the two parties a combatant is.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Side {
    Creator = 0,
    Opponent = 1,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Creator, Side::Opponent];

    pub fn other(self) -> Side {
        match self {
            Side::Creator => Side::Opponent,
            Side::Opponent => Side::Creator,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

/// How an ACTIVE match reached its outcome.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SettleCause {
    /// The loser's hp reached zero.
    Knockout,
    /// The winner solved the power puzzle.
    Finisher,
    /// Tick budget exhausted; decided on hp then tie-break.
    Timeout,
}

// ─── Match ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Match {
    pub id: MatchId,
    pub kind: MatchKind,
    pub creator: AgentId,
    pub opponent: Option<AgentId>,
    pub stake: Coins,
    pub status: MatchStatus,
    pub created_at_ms: u64,
    pub started_at_ms: Option<u64>,
    pub finished_at_ms: Option<u64>,
    pub warmup_ends_at_ms: Option<u64>,
    pub winner: Option<AgentId>,
    pub cause: Option<SettleCause>,
    /// Present exactly while the match is `Active`.
    pub round: Option<MatchRound>,
}

impl Match {
    pub fn new(id: MatchId, creator: AgentId, stake: Coins, now_ms: u64) -> Self {
        Self {
            id,
            kind: MatchKind::PuzzleDuel,
            creator,
            opponent: None,
            stake,
            status: MatchStatus::Open,
            created_at_ms: now_ms,
            started_at_ms: None,
            finished_at_ms: None,
            warmup_ends_at_ms: None,
            winner: None,
            cause: None,
            round: None,
        }
    }

    pub fn agent(&self, side: Side) -> Option<&AgentId> {
        match side {
            Side::Creator => Some(&self.creator),
            Side::Opponent => self.opponent.as_ref(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == MatchStatus::Active
    }

    /// Presentation-safe projection.
    pub fn view(&self, now_ms: u64) -> MatchView {
        MatchView {
            id: self.id,
            kind: self.kind,
            creator: self.creator.clone(),
            opponent: self.opponent.clone(),
            stake: self.stake,
            status: self.status,
            created_at_ms: self.created_at_ms,
            started_at_ms: self.started_at_ms,
            finished_at_ms: self.finished_at_ms,
            warmup_remaining_ms: self
                .warmup_ends_at_ms
                .filter(|_| self.is_active())
                .map(|end| end.saturating_sub(now_ms)),
            winner: self.winner.clone(),
            cause: self.cause,
            round: self.round.as_ref().map(|r| r.view()),
        }
    }
}

// ─── Projections ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct MatchView {
    pub id: MatchId,
    pub kind: MatchKind,
    pub creator: AgentId,
    pub opponent: Option<AgentId>,
    pub stake: Coins,
    pub status: MatchStatus,
    pub created_at_ms: u64,
    pub started_at_ms: Option<u64>,
    pub finished_at_ms: Option<u64>,
    pub warmup_remaining_ms: Option<u64>,
    pub winner: Option<AgentId>,
    pub cause: Option<SettleCause>,
    pub round: Option<RoundView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoundView {
    pub tick_count: u32,
    pub combatants: [CombatantView; 2],
    pub question: String,
    pub puzzle_type: crate::oracle::PuzzleType,
    pub puzzle_difficulty: u8,
    pub power_question: Option<String>,
    pub finisher: Option<AgentId>,
    pub log: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CombatantView {
    pub agent: AgentId,
    pub hp: u8,
    pub puzzles_solved: u32,
    pub difficulty: u8,
    pub working: bool,
    pub power_enrolled: bool,
}

// ─── MatchEvent ──────────────────────────────────────────────────────────────

/// Notification fan-out, drained by callers after each `advance`.
#[derive(Debug, Clone, Serialize)]
pub enum MatchEvent {
    Created { id: MatchId, creator: AgentId, stake: Coins },
    Accepted { id: MatchId, opponent: AgentId, warmup_ends_at_ms: u64 },
    PuzzleSolved { id: MatchId, agent: AgentId, damage: u8, solved: u32 },
    PowerPuzzleReady { id: MatchId },
    Finisher { id: MatchId, agent: AgentId, at_ms: u64 },
    Settled {
        id: MatchId,
        winner: AgentId,
        loser: AgentId,
        pot: Coins,
        cause: SettleCause,
        unlocked: Vec<String>,
    },
    Voided { id: MatchId, refunded: Vec<AgentId> },
}
