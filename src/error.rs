// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Arena Match Engine - Errors

use crate::types::{AgentId, Coins, MatchId};

/// Lifecycle failures surfaced to callers. None of these mutate state.
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error("{agent} has {balance}, cannot cover stake of {stake}")]
    InsufficientFunds { agent: AgentId, balance: Coins, stake: Coins },

    #[error("match {0} is not open")]
    MatchNotOpen(MatchId),

    #[error("an agent cannot accept its own challenge")]
    SelfChallenge,

    #[error("unknown match {0}")]
    UnknownMatch(MatchId),

    #[error("unknown agent {0}")]
    UnknownAgent(AgentId),

    #[error("stake must be positive, got {0}")]
    InvalidStake(Coins),

    #[error("agent {0} is already registered")]
    DuplicateAgent(AgentId),

    #[error("amount {0} is not a finite, non-negative number")]
    InvalidAmount(f64),
}

/// Puzzle oracle faults. Never surfaced; the engine falls back to local generation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    #[error("oracle unavailable: {0}")]
    Unavailable(String),

    #[error("oracle request {ticket} timed out after {waited_ms}ms")]
    TimedOut { ticket: u64, waited_ms: u64 },
}

/// Escrow and profile faults raised while moving stakes.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("escrow holds {held}, cannot release {requested}")]
    EscrowShortfall { held: Coins, requested: Coins },

    #[error("no profile for agent {0}")]
    UnknownAgent(AgentId),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config parse failed: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config field `{field}`: {reason}")]
    Invalid { field: &'static str, reason: &'static str },
}
