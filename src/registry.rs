// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Arena Match Engine - Match Registry
//
// Explicit context object holding every match, the profile store and the
// stake escrow. One registry per engine; nothing here is global.

use std::collections::BTreeMap;
use tracing::info;

use crate::error::{LedgerError, MatchError};
use crate::escrow::Escrow;
use crate::oracle::Puzzle;
use crate::profile::{AgentProfile, ProfileStore};
use crate::round::{CombatantState, MatchRound};
use crate::settlement::{self, SettlementReceipt, VoidReceipt};
use crate::skill::{Onboarding, SkillInputs};
use crate::types::{AgentId, Coins, Match, MatchId, MatchStatus, SettleCause, Side};

/// Inputs for the round built at acceptance.
#[derive(Debug, Clone)]
pub struct RoundSetup {
    pub initial_puzzle: Puzzle,
    pub warmup_ends_at_ms: u64,
    pub puzzle_threshold: u32,
    pub narration_capacity: usize,
}

#[derive(Debug, Clone, Default)]
pub struct MatchRegistry {
    matches: BTreeMap<MatchId, Match>,
    profiles: ProfileStore,
    escrow: Escrow,
    next_id: u64,
}

impl MatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_agent(&mut self, profile: AgentProfile) -> Result<(), MatchError> {
        self.profiles.register(profile)
    }

    pub fn profiles(&self) -> &ProfileStore {
        &self.profiles
    }

    pub fn profile(&self, id: &AgentId) -> Option<&AgentProfile> {
        self.profiles.get(id)
    }

    pub fn escrow(&self) -> &Escrow {
        &self.escrow
    }

    pub fn get(&self, id: MatchId) -> Option<&Match> {
        self.matches.get(&id)
    }

    pub fn get_mut(&mut self, id: MatchId) -> Option<&mut Match> {
        self.matches.get_mut(&id)
    }

    pub fn matches(&self) -> impl Iterator<Item = &Match> {
        self.matches.values()
    }

    /// OPEN and ACTIVE matches.
    pub fn in_flight(&self) -> Vec<MatchId> {
        self.matches
            .values()
            .filter(|m| !m.status.is_terminal())
            .map(|m| m.id)
            .collect()
    }

    fn check_funds(&self, agent: &AgentId, stake: Coins) -> Result<(), MatchError> {
        let profile = self
            .profiles
            .get(agent)
            .ok_or_else(|| MatchError::UnknownAgent(agent.clone()))?;
        if profile.coins < stake {
            return Err(MatchError::InsufficientFunds {
                agent: agent.clone(),
                balance: profile.coins,
                stake,
            });
        }
        Ok(())
    }

    fn debit(&mut self, agent: &AgentId, stake: Coins) {
        if let Some(p) = self.profiles.get_mut(agent) {
            p.coins = p.coins - stake;
            self.escrow.deposit(stake);
        }
    }

    /// Withholds `stake` from the creator and opens a challenge.
    pub fn create(&mut self, creator: &AgentId, stake: Coins, now_ms: u64) -> Result<MatchId, MatchError> {
        if !stake.is_positive() {
            return Err(MatchError::InvalidStake(stake));
        }
        self.check_funds(creator, stake)?;
        self.debit(creator, stake);

        self.next_id += 1;
        let id = MatchId(self.next_id);
        self.matches.insert(id, Match::new(id, creator.clone(), stake, now_ms));
        info!(match_id = %id, %creator, %stake, "match created");
        Ok(id)
    }

    /// Every rejection `accept` can raise, without touching any state.
    pub fn check_accept(&self, id: MatchId, opponent: &AgentId) -> Result<(AgentId, Coins), MatchError> {
        let m = self.matches.get(&id).ok_or(MatchError::UnknownMatch(id))?;
        if m.status != MatchStatus::Open {
            return Err(MatchError::MatchNotOpen(id));
        }
        if &m.creator == opponent {
            return Err(MatchError::SelfChallenge);
        }
        self.check_funds(opponent, m.stake)?;
        Ok((m.creator.clone(), m.stake))
    }

    /// Withholds the same stake from `opponent` and starts the match.
    pub fn accept(
        &mut self,
        id: MatchId,
        opponent: &AgentId,
        now_ms: u64,
        setup: RoundSetup,
    ) -> Result<(), MatchError> {
        let (creator, stake) = self.check_accept(id, opponent)?;

        let debut = |id: &AgentId| {
            self.profiles.get(id).map(|p| p.underdog && p.is_debut()).unwrap_or(false)
        };
        let (creator_role, opponent_role) = Onboarding::assign(debut(&creator), debut(opponent));
        for (agent, role) in [(&creator, creator_role), (opponent, opponent_role)] {
            if role == Onboarding::Boosted {
                if let Some(p) = self.profiles.get_mut(agent) {
                    p.claim_debut();
                }
            }
        }

        self.debit(opponent, stake);
        let round = MatchRound::new(
            CombatantState::new(creator.clone(), creator_role),
            CombatantState::new(opponent.clone(), opponent_role),
            setup.initial_puzzle,
            setup.warmup_ends_at_ms,
            setup.puzzle_threshold,
            setup.narration_capacity,
        );
        if let Some(m) = self.matches.get_mut(&id) {
            m.opponent = Some(opponent.clone());
            m.status = MatchStatus::Active;
            m.started_at_ms = Some(now_ms);
            m.warmup_ends_at_ms = Some(setup.warmup_ends_at_ms);
            m.round = Some(round);
        }
        info!(match_id = %id, %creator, %opponent, ?creator_role, ?opponent_role, "match accepted");
        Ok(())
    }

    /// Skill, current mood and the debut role for both combatants.
    pub fn skill_inputs(&self, id: MatchId) -> Option<[SkillInputs; 2]> {
        let round = self.matches.get(&id)?.round.as_ref()?;
        let inputs = |side: Side| {
            let c = round.player(side);
            let p = self.profiles.get(&c.agent)?;
            Some(SkillInputs::new(p.skill, p.mood, c.onboarding))
        };
        Some([inputs(Side::Creator)?, inputs(Side::Opponent)?])
    }

    pub fn settle(
        &mut self,
        id: MatchId,
        winner: Side,
        cause: SettleCause,
        now_ms: u64,
    ) -> Result<Option<SettlementReceipt>, LedgerError> {
        match self.matches.get_mut(&id) {
            Some(m) => settlement::settle(m, &mut self.profiles, &mut self.escrow, winner, cause, now_ms),
            None => Ok(None),
        }
    }

    pub fn void(&mut self, id: MatchId, now_ms: u64) -> Result<Option<VoidReceipt>, LedgerError> {
        match self.matches.get_mut(&id) {
            Some(m) => settlement::void(m, &mut self.profiles, &mut self.escrow, now_ms),
            None => Ok(None),
        }
    }

    pub fn force_close(&mut self, id: MatchId, now_ms: u64) {
        if let Some(m) = self.matches.get_mut(&id) {
            settlement::force_close(m, now_ms);
        }
    }

    /// Total play money in the system; constant across every operation.
    pub fn total_money(&self) -> Coins {
        self.profiles.total_coins() + self.escrow.held()
    }
}
