// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Arena Match Engine - Settlement
//
// The single exit from ACTIVE (settle) and from OPEN/ACTIVE without a result
// (void). Both check status first and no-op on a finished match, so the
// knockout, finisher and timeout paths can all call in without coordination.
// Every fallible check runs before the first mutation.

use serde::Serialize;
use tracing::info;

use crate::error::LedgerError;
use crate::escrow::Escrow;
use crate::profile::{MatchResult, ProfileStore};
use crate::skill::Onboarding;
use crate::types::{AgentId, Coins, Match, MatchId, MatchStatus, SettleCause, Side};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettlementReceipt {
    pub match_id: MatchId,
    pub winner: AgentId,
    pub loser: AgentId,
    pub pot: Coins,
    pub cause: SettleCause,
    pub unlocked: Vec<String>,
    pub finished_at_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoidReceipt {
    pub match_id: MatchId,
    pub refunds: Vec<(AgentId, Coins)>,
}

/// Pays the pot to `winner` and records the result for both parties.
///
/// Returns `Ok(None)` if the match is not ACTIVE.
pub fn settle(
    m: &mut Match,
    profiles: &mut ProfileStore,
    escrow: &mut Escrow,
    winner: Side,
    cause: SettleCause,
    now_ms: u64,
) -> Result<Option<SettlementReceipt>, LedgerError> {
    if m.status != MatchStatus::Active {
        return Ok(None);
    }
    let winner_id = party(m, winner)?;
    let loser_id = party(m, winner.other())?;
    for id in [&winner_id, &loser_id] {
        if !profiles.contains(id) {
            return Err(LedgerError::UnknownAgent(id.clone()));
        }
    }
    let pot = m.stake * 2;
    escrow.release(pot)?;

    m.status = MatchStatus::Finished;
    m.winner = Some(winner_id.clone());
    m.cause = Some(cause);
    m.finished_at_ms = Some(now_ms);
    m.round = None;

    let mut unlocked = Vec::new();
    if let Some(p) = profiles.get_mut(&winner_id) {
        p.coins = p.coins + pot;
        p.record_result(MatchResult::Win);
        unlocked = p.grant_unlocks();
    }
    if let Some(p) = profiles.get_mut(&loser_id) {
        p.record_result(MatchResult::Loss);
    }

    info!(
        match_id = %m.id,
        winner = %winner_id,
        loser = %loser_id,
        pot = %pot,
        ?cause,
        "match settled"
    );
    Ok(Some(SettlementReceipt {
        match_id: m.id,
        winner: winner_id,
        loser: loser_id,
        pot,
        cause,
        unlocked,
        finished_at_ms: now_ms,
    }))
}

/// Refunds every stake taken so far and closes the match with no winner.
/// Streaks, mood and win/loss records are untouched.
pub fn void(
    m: &mut Match,
    profiles: &mut ProfileStore,
    escrow: &mut Escrow,
    now_ms: u64,
) -> Result<Option<VoidReceipt>, LedgerError> {
    let payers: Vec<AgentId> = match m.status {
        MatchStatus::Finished => return Ok(None),
        MatchStatus::Open => vec![m.creator.clone()],
        MatchStatus::Active => {
            let mut v = vec![m.creator.clone()];
            v.extend(m.opponent.clone());
            v
        }
    };
    for id in &payers {
        if !profiles.contains(id) {
            return Err(LedgerError::UnknownAgent(id.clone()));
        }
    }
    escrow.release(m.stake * payers.len() as u32)?;

    // A voided match does not spend the debut boost.
    if let Some(round) = &m.round {
        for side in Side::BOTH {
            let c = round.player(side);
            if c.onboarding == Onboarding::Boosted {
                if let Some(p) = profiles.get_mut(&c.agent) {
                    p.release_debut();
                }
            }
        }
    }

    m.status = MatchStatus::Finished;
    m.winner = None;
    m.cause = None;
    m.finished_at_ms = Some(now_ms);
    m.round = None;

    let mut refunds = Vec::with_capacity(payers.len());
    for id in payers {
        if let Some(p) = profiles.get_mut(&id) {
            p.coins = p.coins + m.stake;
        }
        refunds.push((id, m.stake));
    }
    info!(match_id = %m.id, refunded = refunds.len(), "match voided");
    Ok(Some(VoidReceipt { match_id: m.id, refunds }))
}

/// Closes a match whose ledger step failed, leaving balances as they are.
pub fn force_close(m: &mut Match, now_ms: u64) {
    if m.status.is_terminal() {
        return;
    }
    m.status = MatchStatus::Finished;
    m.finished_at_ms = Some(now_ms);
    m.round = None;
}

fn party(m: &Match, side: Side) -> Result<AgentId, LedgerError> {
    m.agent(side)
        .cloned()
        .ok_or_else(|| LedgerError::UnknownAgent(AgentId::from(format!("{}:{side:?}", m.id))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{AgentProfile, Mood, SkillProfile};
    use crate::round::tests::round;
    use rust_decimal_macros::dec;

    const STAKE: Coins = Coins(dec!(0.0001));

    fn fixture() -> (Match, ProfileStore, Escrow) {
        let mut profiles = ProfileStore::new();
        for id in ["ada", "bob"] {
            let p = AgentProfile::new(id, Coins(dec!(1.0)) - STAKE, SkillProfile::default());
            profiles.register(p).expect("test: register");
        }
        let mut escrow = Escrow::new();
        escrow.deposit(STAKE);
        escrow.deposit(STAKE);
        let mut m = Match::new(MatchId(1), AgentId::from("ada"), STAKE, 0);
        m.opponent = Some(AgentId::from("bob"));
        m.status = MatchStatus::Active;
        m.round = Some(round());
        (m, profiles, escrow)
    }

    fn coins(profiles: &ProfileStore, id: &str) -> Coins {
        profiles.get(&AgentId::from(id)).map(|p| p.coins).unwrap_or_default()
    }

    #[test]
    fn winner_receives_exactly_both_stakes() {
        let (mut m, mut profiles, mut escrow) = fixture();
        let before = coins(&profiles, "bob");
        let receipt = settle(&mut m, &mut profiles, &mut escrow, Side::Opponent, SettleCause::Knockout, 9_000)
            .expect("test: settle")
            .expect("test: first settle produces a receipt");
        assert_eq!(coins(&profiles, "bob") - before, STAKE * 2);
        assert_eq!(receipt.pot, STAKE * 2);
        assert_eq!(m.winner, Some(AgentId::from("bob")));
        assert_eq!(m.status, MatchStatus::Finished);
        assert!(m.round.is_none(), "round discarded at settlement");
        assert!(escrow.held().is_zero());
    }

    #[test]
    fn second_settle_is_a_no_op() {
        let (mut m, mut profiles, mut escrow) = fixture();
        settle(&mut m, &mut profiles, &mut escrow, Side::Creator, SettleCause::Timeout, 1)
            .expect("test: settle");
        let ada = profiles.get(&AgentId::from("ada")).cloned().expect("test: ada");
        let again = settle(&mut m, &mut profiles, &mut escrow, Side::Opponent, SettleCause::Finisher, 2)
            .expect("test: re-entrant settle must not error");
        assert!(again.is_none());
        let ada_after = profiles.get(&AgentId::from("ada")).expect("test: ada");
        assert_eq!(ada_after.coins, ada.coins);
        assert_eq!(ada_after.wins, 1);
        assert_eq!(ada_after.streak, 1);
        assert_eq!(m.winner, Some(AgentId::from("ada")));
        assert_eq!(m.cause, Some(SettleCause::Timeout));
    }

    #[test]
    fn records_streaks_and_unlocks_for_winner() {
        let (mut m, mut profiles, mut escrow) = fixture();
        let receipt = settle(&mut m, &mut profiles, &mut escrow, Side::Creator, SettleCause::Finisher, 1)
            .expect("test: settle")
            .expect("test: receipt");
        assert_eq!(receipt.unlocked, vec!["first_blood_banner".to_string()]);
        let bob = profiles.get(&AgentId::from("bob")).expect("test: bob");
        assert_eq!((bob.losses, bob.streak), (1, -1));
        assert_eq!(bob.mood, Mood::Neutral);
        assert!(bob.unlocked.is_empty());
    }

    #[test]
    fn void_refunds_without_touching_record() {
        let (mut m, mut profiles, mut escrow) = fixture();
        let receipt = void(&mut m, &mut profiles, &mut escrow, 5)
            .expect("test: void")
            .expect("test: receipt");
        assert_eq!(receipt.refunds.len(), 2);
        for id in ["ada", "bob"] {
            let p = profiles.get(&AgentId::from(id)).expect("test: profile");
            assert_eq!(p.coins, Coins(dec!(1.0)));
            assert_eq!((p.wins, p.losses, p.streak), (0, 0, 0));
        }
        assert_eq!(m.winner, None);
        assert!(void(&mut m, &mut profiles, &mut escrow, 6).expect("test: void").is_none());
    }

    #[test]
    fn escrow_shortfall_leaves_match_active() {
        let (mut m, mut profiles, _) = fixture();
        let mut empty = Escrow::new();
        let err = settle(&mut m, &mut profiles, &mut empty, Side::Creator, SettleCause::Knockout, 1)
            .expect_err("test: empty escrow must fail");
        assert!(matches!(err, LedgerError::EscrowShortfall { .. }));
        assert_eq!(m.status, MatchStatus::Active);
        assert_eq!(coins(&profiles, "ada"), Coins(dec!(1.0)) - STAKE);
    }
}
