// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Arena Match Engine - Engine Core
//
// Glues the registry, scheduler, puzzle oracle and rng together. The engine
// owns one clock; `advance_to` walks every firing due up to the new time in
// deadline order, draining oracle replies before each one.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::error::{ConfigError, MatchError, OracleError};
use crate::oracle::{LocalPuzzleGenerator, OracleReply, Puzzle, PuzzleOracle, PuzzleRequest, Ticket};
use crate::profile::AgentProfile;
use crate::registry::{MatchRegistry, RoundSetup};
use crate::resolution::{resolve_tick, PuzzleSlot, TickContext, TickVerdict};
use crate::scheduler::{Firing, FiringKind, Scheduler};
use crate::types::{AgentId, Coins, MatchEvent, MatchId, MatchStatus, MatchView, SettleCause, Side};

/// Oracle traffic counters, per engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OracleStats {
    pub main_requests: u32,
    pub power_requests: u32,
    /// Puzzles built locally after an error reply or a timeout.
    pub fallbacks: u32,
    /// Replies whose ticket was already retired.
    pub late_replies: u32,
}

#[derive(Debug, Clone, Copy)]
struct Outstanding {
    match_id: MatchId,
    slot: PuzzleSlot,
    difficulty: u8,
    issued_at_ms: u64,
}

pub struct MatchEngine<O, R = ChaCha8Rng> {
    config: EngineConfig,
    registry: MatchRegistry,
    scheduler: Scheduler,
    oracle: O,
    fallback: LocalPuzzleGenerator,
    rng: R,
    now_ms: u64,
    next_ticket: Ticket,
    outstanding: HashMap<Ticket, Outstanding>,
    stats: OracleStats,
    events: Vec<MatchEvent>,
}

impl<O: PuzzleOracle> MatchEngine<O, ChaCha8Rng> {
    /// Engine whose rolls are seeded from `config.seed`.
    pub fn new(config: EngineConfig, oracle: O) -> Result<Self, ConfigError> {
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Self::with_rng(config, oracle, rng)
    }
}

impl<O: PuzzleOracle, R: Rng> MatchEngine<O, R> {
    pub fn with_rng(config: EngineConfig, oracle: O, rng: R) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            fallback: LocalPuzzleGenerator::new(config.seed.wrapping_add(1)),
            config,
            registry: MatchRegistry::new(),
            scheduler: Scheduler::new(),
            oracle,
            rng,
            now_ms: 0,
            next_ticket: 0,
            outstanding: HashMap::new(),
            stats: OracleStats::default(),
            events: Vec::new(),
        })
    }

    // ─── Accessors ───────────────────────────────────────────────────────────

    pub fn now(&self) -> u64 {
        self.now_ms
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &MatchRegistry {
        &self.registry
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn oracle_mut(&mut self) -> &mut O {
        &mut self.oracle
    }

    pub fn oracle_stats(&self) -> OracleStats {
        self.stats
    }

    pub fn profile(&self, agent: &AgentId) -> Option<&AgentProfile> {
        self.registry.profile(agent)
    }

    pub fn view(&self, id: MatchId) -> Option<MatchView> {
        self.registry.get(id).map(|m| m.view(self.now_ms))
    }

    /// Lobby listing.
    pub fn open_matches(&self) -> Vec<MatchView> {
        self.registry
            .matches()
            .filter(|m| m.status == MatchStatus::Open)
            .map(|m| m.view(self.now_ms))
            .collect()
    }

    pub fn drain_events(&mut self) -> Vec<MatchEvent> {
        std::mem::take(&mut self.events)
    }

    // ─── Lifecycle ───────────────────────────────────────────────────────────

    pub fn register_agent(&mut self, profile: AgentProfile) -> Result<(), MatchError> {
        self.registry.register_agent(profile)
    }

    pub fn create_match(&mut self, creator: &AgentId, stake: Coins) -> Result<MatchId, MatchError> {
        let id = self.registry.create(creator, stake, self.now_ms)?;
        self.scheduler
            .schedule(id, FiringKind::Expire, self.now_ms + self.config.open_expiry_ms);
        self.events.push(MatchEvent::Created { id, creator: creator.clone(), stake });
        Ok(id)
    }

    /// Starts the match on a locally generated puzzle and asks the oracle for
    /// a replacement; warmup hides the swap.
    pub fn accept_match(&mut self, id: MatchId, opponent: &AgentId) -> Result<(), MatchError> {
        // Rejections must leave the fallback stream untouched.
        self.registry.check_accept(id, opponent)?;
        let warmup_ends_at_ms = self.now_ms + self.config.warmup_ms;
        let setup = RoundSetup {
            initial_puzzle: self.fallback.generate(1),
            warmup_ends_at_ms,
            puzzle_threshold: self.config.puzzle_threshold,
            narration_capacity: self.config.narration_capacity,
        };
        self.registry.accept(id, opponent, self.now_ms, setup)?;

        self.issue(id, PuzzleSlot::Main, 1);
        self.scheduler
            .schedule(id, FiringKind::Tick, self.now_ms + self.config.tick_interval_ms);
        self.events.push(MatchEvent::Accepted {
            id,
            opponent: opponent.clone(),
            warmup_ends_at_ms,
        });
        Ok(())
    }

    /// Runs every firing due at or before `now_ms`. The clock never moves
    /// backwards; an earlier `now_ms` is a no-op.
    pub fn advance_to(&mut self, now_ms: u64) {
        if now_ms < self.now_ms {
            return;
        }
        while let Some(firing) = self.scheduler.pop_due(now_ms) {
            self.now_ms = firing.at_ms.max(self.now_ms);
            self.pump_oracle();
            self.fire(firing);
        }
        self.now_ms = now_ms;
        self.pump_oracle();
    }

    pub fn advance_by(&mut self, delta_ms: u64) {
        self.advance_to(self.now_ms + delta_ms);
    }

    /// Voids every OPEN and ACTIVE match with refunds. Used on shutdown, where
    /// in-progress rounds cannot survive.
    pub fn void_in_flight(&mut self) -> usize {
        let ids = self.registry.in_flight();
        let voided = ids.iter().filter(|id| self.void(**id)).count();
        if voided > 0 {
            warn!(voided, "in-flight matches voided");
        }
        voided
    }

    // ─── Firings ─────────────────────────────────────────────────────────────

    fn fire(&mut self, firing: Firing) {
        match firing.kind {
            FiringKind::Tick => self.on_tick(firing.match_id),
            FiringKind::Expire => {
                let open = self
                    .registry
                    .get(firing.match_id)
                    .is_some_and(|m| m.status == MatchStatus::Open);
                if open && self.void(firing.match_id) {
                    info!(match_id = %firing.match_id, "open match expired");
                }
            }
            FiringKind::Settle => {
                let finisher = self
                    .registry
                    .get(firing.match_id)
                    .and_then(|m| m.round.as_ref())
                    .and_then(|r| r.finisher())
                    .map(|f| f.side);
                if let Some(side) = finisher {
                    self.settle(firing.match_id, side, SettleCause::Finisher);
                }
            }
        }
    }

    fn on_tick(&mut self, id: MatchId) {
        if !self.registry.get(id).is_some_and(|m| m.is_active()) {
            debug!(match_id = %id, "tick timer retired");
            return;
        }
        self.scheduler
            .schedule(id, FiringKind::Tick, self.now_ms + self.config.tick_interval_ms);

        let Some(skills) = self.registry.skill_inputs(id) else {
            warn!(match_id = %id, "combatant profile missing; tick skipped");
            return;
        };
        let ctx = TickContext {
            now_ms: self.now_ms,
            finisher_grace_ms: self.config.finisher_grace_ms,
            timeout_ticks: self.config.timeout_ticks,
        };
        let Some(round) = self.registry.get_mut(id).and_then(|m| m.round.as_mut()) else {
            return;
        };
        let report = resolve_tick(round, &skills, &ctx, &mut self.rng);
        if !report.resolved {
            return;
        }
        debug!(
            match_id = %id,
            tick = round.tick_count,
            hp = ?[round.players[0].hp, round.players[1].hp],
            "tick resolved"
        );

        for solve in &report.solves {
            self.events.push(MatchEvent::PuzzleSolved {
                id,
                agent: round.player(solve.side).agent.clone(),
                damage: solve.damage,
                solved: solve.solved,
            });
        }
        let finisher = round.finisher().cloned();

        for need in &report.needs {
            self.issue(id, need.slot, need.difficulty);
        }

        match report.verdict {
            TickVerdict::Continue => {}
            TickVerdict::Finisher(_) => {
                if let Some(f) = finisher {
                    info!(match_id = %id, agent = %f.agent, settle_at_ms = f.settle_at_ms, "finisher");
                    self.scheduler.schedule(id, FiringKind::Settle, f.settle_at_ms);
                    self.events.push(MatchEvent::Finisher { id, agent: f.agent, at_ms: f.at_ms });
                }
            }
            TickVerdict::Decided { winner, cause } => self.settle(id, winner, cause),
        }
    }

    // ─── Settlement ──────────────────────────────────────────────────────────

    fn settle(&mut self, id: MatchId, winner: Side, cause: SettleCause) {
        match self.registry.settle(id, winner, cause, self.now_ms) {
            Ok(Some(r)) => self.events.push(MatchEvent::Settled {
                id,
                winner: r.winner,
                loser: r.loser,
                pot: r.pot,
                cause: r.cause,
                unlocked: r.unlocked,
            }),
            Ok(None) => debug!(match_id = %id, "settle on finished match ignored"),
            Err(e) => {
                error!(match_id = %id, error = %e, "settlement ledger fault; closing match");
                self.registry.force_close(id, self.now_ms);
            }
        }
        self.outstanding.retain(|_, o| o.match_id != id);
    }

    fn void(&mut self, id: MatchId) -> bool {
        let voided = match self.registry.void(id, self.now_ms) {
            Ok(Some(r)) => {
                let refunded = r.refunds.into_iter().map(|(agent, _)| agent).collect();
                self.events.push(MatchEvent::Voided { id, refunded });
                true
            }
            Ok(None) => false,
            Err(e) => {
                error!(match_id = %id, error = %e, "void ledger fault; closing match");
                self.registry.force_close(id, self.now_ms);
                false
            }
        };
        self.outstanding.retain(|_, o| o.match_id != id);
        voided
    }

    // ─── Oracle plumbing ─────────────────────────────────────────────────────

    fn issue(&mut self, id: MatchId, slot: PuzzleSlot, difficulty: u8) {
        let Some(round) = self.registry.get_mut(id).and_then(|m| m.round.as_mut()) else {
            return;
        };
        self.next_ticket += 1;
        let ticket = self.next_ticket;
        match slot {
            PuzzleSlot::Main => {
                round.main_ticket = Some(ticket);
                self.outstanding
                    .retain(|_, o| !(o.match_id == id && o.slot == PuzzleSlot::Main));
                self.stats.main_requests += 1;
            }
            PuzzleSlot::Power => {
                round.attach_power_ticket(ticket);
                self.stats.power_requests += 1;
            }
        }
        self.outstanding.insert(
            ticket,
            Outstanding { match_id: id, slot, difficulty, issued_at_ms: self.now_ms },
        );
        self.oracle.request(PuzzleRequest { ticket, difficulty }, self.now_ms);
    }

    fn pump_oracle(&mut self) {
        for reply in self.oracle.poll(self.now_ms) {
            self.deliver(reply);
        }

        let deadline = self.config.oracle_timeout_ms;
        let mut expired: Vec<(Ticket, u64)> = self
            .outstanding
            .iter()
            .filter(|(_, o)| self.now_ms.saturating_sub(o.issued_at_ms) >= deadline)
            .map(|(t, o)| (*t, self.now_ms - o.issued_at_ms))
            .collect();
        expired.sort_unstable();
        for (ticket, waited_ms) in expired {
            self.deliver(OracleReply {
                ticket,
                result: Err(OracleError::TimedOut { ticket, waited_ms }),
            });
        }
    }

    fn deliver(&mut self, reply: OracleReply) {
        let Some(o) = self.outstanding.remove(&reply.ticket) else {
            self.stats.late_replies += 1;
            debug!(ticket = reply.ticket, "oracle reply for retired ticket ignored");
            return;
        };
        let puzzle = match reply.result {
            Ok(p) => p,
            Err(e) => {
                warn!(match_id = %o.match_id, error = %e, difficulty = o.difficulty, "oracle fallback");
                self.stats.fallbacks += 1;
                self.fallback.generate(o.difficulty)
            }
        };
        self.install(reply.ticket, o, puzzle);
    }

    fn install(&mut self, ticket: Ticket, o: Outstanding, puzzle: Puzzle) {
        let Some(round) = self.registry.get_mut(o.match_id).and_then(|m| m.round.as_mut()) else {
            return;
        };
        match o.slot {
            PuzzleSlot::Main => {
                round.install_main_puzzle(ticket, puzzle);
            }
            PuzzleSlot::Power => {
                if round.install_power_puzzle(ticket, puzzle) {
                    round.log.push("a power puzzle appears");
                    self.events.push(MatchEvent::PowerPuzzleReady { id: o.match_id });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{DelayedOracle, LocalPuzzleGenerator};
    use crate::profile::SkillProfile;
    use rand::rngs::mock::StepRng;
    use rust_decimal_macros::dec;

    fn engine<O: PuzzleOracle>(oracle: O) -> MatchEngine<O, StepRng> {
        let mut e = MatchEngine::with_rng(EngineConfig::default(), oracle, StepRng::new(0, 0))
            .expect("test: default config is valid");
        for id in ["ada", "bob"] {
            e.register_agent(AgentProfile::new(id, Coins(dec!(1)), SkillProfile::default()))
                .expect("test: register");
        }
        e
    }

    fn started<O: PuzzleOracle>(e: &mut MatchEngine<O, StepRng>) -> MatchId {
        let id = e.create_match(&AgentId::from("ada"), Coins(dec!(0.1))).expect("test: create");
        e.accept_match(id, &AgentId::from("bob")).expect("test: accept");
        id
    }

    #[test]
    fn open_match_expires_with_refund() {
        let mut e = engine(LocalPuzzleGenerator::new(1));
        let id = e.create_match(&AgentId::from("ada"), Coins(dec!(0.1))).expect("test: create");
        e.advance_to(89_999);
        assert_eq!(e.view(id).map(|v| v.status), Some(MatchStatus::Open));
        e.advance_to(90_000);
        let v = e.view(id).expect("test: view");
        assert_eq!(v.status, MatchStatus::Finished);
        assert_eq!(v.winner, None);
        let ada = e.profile(&AgentId::from("ada")).expect("test: ada");
        assert_eq!(ada.coins, Coins(dec!(1)));
        assert_eq!((ada.wins, ada.losses, ada.streak), (0, 0, 0));
        assert!(e
            .drain_events()
            .iter()
            .any(|ev| matches!(ev, MatchEvent::Voided { id: v, .. } if *v == id)));
    }

    #[test]
    fn rejected_accept_leaves_the_engine_untouched() {
        let opening = |reject_first: bool| {
            let mut e = engine(LocalPuzzleGenerator::new(1));
            let id = e.create_match(&AgentId::from("ada"), Coins(dec!(0.1))).expect("test: create");
            if reject_first {
                let err = e.accept_match(id, &AgentId::from("ada")).expect_err("test: self challenge");
                assert!(matches!(err, MatchError::SelfChallenge));
                assert_eq!(e.oracle_stats(), OracleStats::default());
                assert_eq!(e.scheduler().pending(id, FiringKind::Tick), 0);
            }
            e.accept_match(id, &AgentId::from("bob")).expect("test: accept");
            e.registry()
                .get(id)
                .and_then(|m| m.round.as_ref())
                .map(|r| r.current_puzzle.clone())
                .expect("test: round")
        };
        assert_eq!(opening(true), opening(false));
    }

    #[test]
    fn accepted_match_does_not_expire() {
        let mut e = engine(LocalPuzzleGenerator::new(1));
        let id = started(&mut e);
        e.advance_to(7_000);
        assert_eq!(e.view(id).and_then(|v| v.round).map(|r| r.tick_count), Some(0));
        let settled = (0..400).any(|_| {
            e.advance_by(600);
            e.view(id).is_some_and(|v| v.status == MatchStatus::Finished)
        });
        assert!(settled);
        assert!(e.view(id).and_then(|v| v.winner).is_some(), "settled, not voided");
    }

    #[test]
    fn timer_retires_after_settlement() {
        let mut e = engine(LocalPuzzleGenerator::new(1));
        let id = started(&mut e);
        while e.view(id).is_some_and(|v| v.status == MatchStatus::Active) {
            e.advance_by(600);
        }
        e.advance_by(600);
        assert_eq!(e.scheduler().pending(id, FiringKind::Tick), 0);
    }

    #[test]
    fn slow_oracle_never_stalls_the_round() {
        let mut e = engine(DelayedOracle::new(1, 60_000));
        let id = started(&mut e);
        e.advance_to(20_000);
        let round = e.view(id).and_then(|v| v.round).expect("test: round");
        assert!(round.tick_count > 0);
        assert!(e.oracle_stats().fallbacks >= 1, "timed-out requests use the local generator");

        // The original replies eventually land on retired tickets.
        e.oracle_mut().set_latency(0);
        e.advance_to(80_000);
        assert!(e.oracle_stats().late_replies >= 1);
    }

    #[test]
    fn void_in_flight_refunds_everyone() {
        let mut e = engine(LocalPuzzleGenerator::new(1));
        let active = started(&mut e);
        let open = e.create_match(&AgentId::from("ada"), Coins(dec!(0.2))).expect("test: create");
        e.advance_to(10_000);
        assert_eq!(e.void_in_flight(), 2);
        for id in [active, open] {
            assert_eq!(e.view(id).map(|v| v.status), Some(MatchStatus::Finished));
        }
        for agent in ["ada", "bob"] {
            let p = e.profile(&AgentId::from(agent)).expect("test: profile");
            assert_eq!(p.coins, Coins(dec!(1)));
        }
        assert!(e.registry().escrow().held().is_zero());
        assert_eq!(e.void_in_flight(), 0);
    }
}
