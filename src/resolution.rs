// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Arena Match Engine - Resolution Algorithm
//
// One call per timer firing. Each combatant independently:
//   1. power track   (attempt due -> finisher or re-arm)
//   2. main track    (attempt due -> solve damages opponent, miss takes counter-hit)
//   3. enrollment    (power puzzle exists -> start power attempts once)
// then the tick budget is checked. Puzzle fetches are returned as needs;
// the engine issues them without waiting.

use rand::Rng;
use std::ops::RangeInclusive;
use tracing::debug;

use crate::round::{MatchRound, PowerTrack};
use crate::skill::{SkillInputs, POWER_ENROLL_MS, POWER_RETRY_MS};
use crate::types::{SettleCause, Side};

const SOLVE_DAMAGE: RangeInclusive<u8> = 8..=15;
const COUNTER_DAMAGE: RangeInclusive<u8> = 3..=7;

// ─── Report types ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PuzzleSlot {
    Main,
    Power,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PuzzleNeed {
    pub slot: PuzzleSlot,
    pub difficulty: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickVerdict {
    /// Nothing terminal happened (or the tick was a no-op).
    Continue,
    /// A power puzzle was solved; settle after the grace delay.
    Finisher(Side),
    /// Settle now.
    Decided { winner: Side, cause: SettleCause },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolveNote {
    pub side: Side,
    pub damage: u8,
    pub solved: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub verdict: TickVerdict,
    pub needs: Vec<PuzzleNeed>,
    pub solves: Vec<SolveNote>,
    /// False for warmup and post-finisher firings.
    pub resolved: bool,
}

impl TickReport {
    fn idle() -> Self {
        Self { verdict: TickVerdict::Continue, needs: Vec::new(), solves: Vec::new(), resolved: false }
    }

    /// Later main needs supersede earlier ones within a tick.
    fn need_main(&mut self, difficulty: u8) {
        self.needs.retain(|n| n.slot != PuzzleSlot::Main);
        self.needs.push(PuzzleNeed { slot: PuzzleSlot::Main, difficulty });
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TickContext {
    pub now_ms: u64,
    pub finisher_grace_ms: u64,
    pub timeout_ticks: u32,
}

// ─── Algorithm ───────────────────────────────────────────────────────────────

pub fn resolve_tick<R: Rng + ?Sized>(
    round: &mut MatchRound,
    skills: &[SkillInputs; 2],
    ctx: &TickContext,
    rng: &mut R,
) -> TickReport {
    let mut report = TickReport::idle();
    if !round.try_begin_racing(ctx.now_ms) {
        return report;
    }
    report.resolved = true;
    round.tick_count += 1;

    for side in Side::BOTH {
        let inputs = &skills[side.index()];

        if power_step(round, side, inputs, ctx, rng) {
            report.verdict = TickVerdict::Finisher(side);
            return report;
        }

        if let Some(verdict) = main_step(round, side, inputs, ctx, rng, &mut report) {
            report.verdict = verdict;
            return report;
        }

        if round.power_puzzle().is_some() && round.player(side).power == PowerTrack::NotEnrolled {
            let delay = inputs.power_delay_ms(POWER_ENROLL_MS, rng);
            round.player_mut(side).power = PowerTrack::Attempting { solve_at_ms: ctx.now_ms + delay };
            let agent = round.player(side).agent.clone();
            round.log.push(format!("{agent} squares up to the power puzzle"));
        }
    }

    if round.tick_count >= ctx.timeout_ticks {
        let winner = timeout_winner(round, rng);
        round.log.push(format!("time! {} takes it on points", round.player(winner).agent));
        report.verdict = TickVerdict::Decided { winner, cause: SettleCause::Timeout };
    }
    report
}

/// Returns true when this combatant lands the finisher.
fn power_step<R: Rng + ?Sized>(
    round: &mut MatchRound,
    side: Side,
    inputs: &SkillInputs,
    ctx: &TickContext,
    rng: &mut R,
) -> bool {
    if round.power_puzzle().is_none() {
        return false;
    }
    let PowerTrack::Attempting { solve_at_ms } = round.player(side).power else {
        return false;
    };
    if ctx.now_ms < solve_at_ms {
        return false;
    }
    if inputs.roll_power(rng) && round.record_finisher(side, ctx.now_ms, ctx.finisher_grace_ms) {
        let agent = round.player(side).agent.clone();
        debug!(%agent, tick = round.tick_count, "power puzzle solved");
        round.log.push(format!("{agent} cracks the power puzzle. FINISHER!"));
        return true;
    }
    let delay = inputs.power_delay_ms(POWER_RETRY_MS, rng);
    round.player_mut(side).power = PowerTrack::Attempting { solve_at_ms: ctx.now_ms + delay };
    false
}

fn main_step<R: Rng + ?Sized>(
    round: &mut MatchRound,
    side: Side,
    inputs: &SkillInputs,
    ctx: &TickContext,
    rng: &mut R,
    report: &mut TickReport,
) -> Option<TickVerdict> {
    let due = matches!(round.player(side).solve_at_ms, Some(at) if ctx.now_ms >= at);
    if due {
        round.player_mut(side).solve_at_ms = None;
        let difficulty = round.current_puzzle.difficulty;
        let agent = round.player(side).agent.clone();

        if inputs.roll_solve(difficulty, rng) {
            let damage = round.player_mut(side.other()).take_damage(rng.gen_range(SOLVE_DAMAGE));
            round.player_mut(side).record_solve();
            let solved = round.player(side).puzzles_solved;
            round.log.push(format!("{agent} solves it and hits for {damage}"));
            report.solves.push(SolveNote { side, damage, solved });
            report.need_main(round.next_main_difficulty());

            if solved >= round.puzzle_threshold && round.request_power_puzzle() {
                report.needs.push(PuzzleNeed {
                    slot: PuzzleSlot::Power,
                    difficulty: round.power_difficulty(),
                });
            }
            if round.player(side.other()).is_down() {
                round.log.push(format!("{} is knocked out", round.player(side.other()).agent));
                return Some(TickVerdict::Decided { winner: side, cause: SettleCause::Knockout });
            }
        } else if inputs.roll_dodge(rng) {
            round.log.push(format!("{agent} misses but dodges the counter"));
        } else {
            let damage = round.player_mut(side).take_damage(rng.gen_range(COUNTER_DAMAGE));
            round.log.push(format!("{agent} misses and eats a {damage} hp counter"));
            if round.player(side).is_down() {
                round.log.push(format!("{agent} is knocked out"));
                return Some(TickVerdict::Decided { winner: side.other(), cause: SettleCause::Knockout });
            }
        }
    }

    if !round.player(side).is_solving() {
        let think = inputs.think_time_ms(round.current_puzzle.difficulty, rng);
        round.player_mut(side).solve_at_ms = Some(ctx.now_ms + think);
    }
    None
}

/// Higher hp wins; then more puzzles solved; then a coin flip.
pub fn timeout_winner<R: Rng + ?Sized>(round: &MatchRound, rng: &mut R) -> Side {
    let (a, b) = (round.player(Side::Creator), round.player(Side::Opponent));
    let key = |c: &crate::round::CombatantState| (c.hp, c.puzzles_solved);
    match key(a).cmp(&key(b)) {
        std::cmp::Ordering::Greater => Side::Creator,
        std::cmp::Ordering::Less => Side::Opponent,
        std::cmp::Ordering::Equal => {
            if rng.gen_bool(0.5) { Side::Creator } else { Side::Opponent }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{Mood, SkillProfile};
    use crate::round::tests::{puzzle, round};
    use crate::round::{PowerPuzzleState, RoundPhase};
    use crate::skill::Onboarding;
    use rand::rngs::mock::StepRng;

    /// Every Bernoulli succeeds and every range yields its low end.
    fn lucky() -> StepRng {
        StepRng::new(0, 0)
    }

    /// Every Bernoulli below 1.0 fails.
    fn unlucky() -> StepRng {
        StepRng::new(u64::MAX, 0)
    }

    /// Fails Bernoulli trials below 0.5; ranges land mid-window.
    fn coin() -> StepRng {
        StepRng::new(1 << 63, 0)
    }

    /// Every draw sits at 0.1: Bernoulli trials pass only above p = 0.1.
    fn tenth() -> StepRng {
        StepRng::new((0.1 * 2f64.powi(64)) as u64, 0)
    }

    fn skills() -> [SkillInputs; 2] {
        let s = SkillInputs::new(SkillProfile::new(0.5, 0.5, 0.5, 0.5), Mood::Neutral, Onboarding::None);
        [s, s]
    }

    fn ctx(now_ms: u64) -> TickContext {
        TickContext { now_ms, finisher_grace_ms: 5_000, timeout_ticks: 150 }
    }

    #[test]
    fn warmup_firing_is_a_no_op() {
        let mut r = round();
        r.phase = RoundPhase::Warmup { ends_at_ms: 7_000 };
        let report = resolve_tick(&mut r, &skills(), &ctx(6_999), &mut lucky());
        assert!(!report.resolved);
        assert_eq!(r.tick_count, 0);
        assert!(r.players.iter().all(|p| p.solve_at_ms.is_none()));
    }

    #[test]
    fn first_racing_tick_arms_both() {
        let mut r = round();
        let report = resolve_tick(&mut r, &skills(), &ctx(100), &mut lucky());
        assert_eq!(report.verdict, TickVerdict::Continue);
        assert_eq!(r.tick_count, 1);
        // 800 + 1 * 400 + 0 jitter
        assert_eq!(r.player(Side::Creator).solve_at_ms, Some(1_300));
        assert_eq!(r.player(Side::Opponent).solve_at_ms, Some(1_300));
    }

    #[test]
    fn solve_damages_opponent_and_ramps_difficulty() {
        let mut r = round();
        r.player_mut(Side::Creator).solve_at_ms = Some(0);
        let report = resolve_tick(&mut r, &skills(), &ctx(0), &mut lucky());
        assert_eq!(r.player(Side::Opponent).hp, 92);
        assert_eq!(r.player(Side::Creator).difficulty, 2);
        assert_eq!(report.solves, vec![SolveNote { side: Side::Creator, damage: 8, solved: 1 }]);
        assert_eq!(report.needs, vec![PuzzleNeed { slot: PuzzleSlot::Main, difficulty: 2 }]);
        assert!(r.player(Side::Creator).is_solving(), "re-armed for the next attempt");
    }

    #[test]
    fn power_puzzle_requested_exactly_once() {
        let mut r = round();
        r.player_mut(Side::Creator).puzzles_solved = 4;
        r.player_mut(Side::Creator).solve_at_ms = Some(0);
        r.player_mut(Side::Opponent).solve_at_ms = Some(0);

        let mut power_needs = 0;
        let mut now = 0;
        for _ in 0..4 {
            let report = resolve_tick(&mut r, &skills(), &ctx(now), &mut lucky());
            power_needs += report.needs.iter().filter(|n| n.slot == PuzzleSlot::Power).count();
            now += 5_000;
        }
        assert_eq!(power_needs, 1);
        assert_eq!(r.power, PowerPuzzleState::Generating { ticket: None });
        assert!(r.player(Side::Creator).puzzles_solved >= 6);
    }

    #[test]
    fn knockout_on_solve() {
        let mut r = round();
        r.player_mut(Side::Opponent).hp = 5;
        r.player_mut(Side::Creator).solve_at_ms = Some(0);
        let report = resolve_tick(&mut r, &skills(), &ctx(0), &mut lucky());
        assert_eq!(
            report.verdict,
            TickVerdict::Decided { winner: Side::Creator, cause: SettleCause::Knockout }
        );
        assert_eq!(r.player(Side::Opponent).hp, 0);
    }

    #[test]
    fn counter_hit_can_knock_out_the_attacker() {
        let mut r = round();
        r.player_mut(Side::Creator).hp = 3;
        r.player_mut(Side::Creator).solve_at_ms = Some(0);
        let report = resolve_tick(&mut r, &skills(), &ctx(0), &mut unlucky());
        assert_eq!(
            report.verdict,
            TickVerdict::Decided { winner: Side::Opponent, cause: SettleCause::Knockout }
        );
        assert_eq!(r.player(Side::Creator).hp, 0);
        assert_eq!(r.player(Side::Opponent).hp, 100);
    }

    #[test]
    fn dodge_turns_away_the_counter_hit() {
        // Solve chance floors at 0.05 and misses; a 0.2 dodge chance holds.
        let hopeless = |dodge: f64| {
            let s = SkillInputs::new(SkillProfile::new(0.5, 0.0, dodge, 0.5), Mood::Neutral, Onboarding::None);
            [s, s]
        };
        let attempt = |dodge: f64| {
            let mut r = round();
            r.player_mut(Side::Creator).solve_at_ms = Some(0);
            r.player_mut(Side::Opponent).solve_at_ms = Some(u64::MAX);
            let report = resolve_tick(&mut r, &hopeless(dodge), &ctx(0), &mut tenth());
            assert_eq!(report.verdict, TickVerdict::Continue);
            assert!(report.solves.is_empty());
            r
        };

        let dodged = attempt(1.0);
        assert_eq!(dodged.player(Side::Creator).hp, 100);
        assert_eq!(dodged.player(Side::Opponent).hp, 100);
        assert!(dodged.player(Side::Creator).is_solving(), "re-armed after the miss");

        let hit = attempt(0.0);
        assert!(hit.player(Side::Creator).hp < 100);
        assert!(hit.player(Side::Creator).hp >= 93);
    }

    #[test]
    fn enrollment_then_finisher_short_circuits() {
        let mut r = round();
        r.power = PowerPuzzleState::Ready(puzzle(8));
        resolve_tick(&mut r, &skills(), &ctx(0), &mut lucky());
        assert_eq!(r.player(Side::Creator).power, PowerTrack::Attempting { solve_at_ms: 5_000 });
        assert_eq!(r.player(Side::Opponent).power, PowerTrack::Attempting { solve_at_ms: 5_000 });

        let report = resolve_tick(&mut r, &skills(), &ctx(5_000), &mut lucky());
        assert_eq!(report.verdict, TickVerdict::Finisher(Side::Creator));
        let ticks = r.tick_count;
        let hp = (r.player(Side::Creator).hp, r.player(Side::Opponent).hp);

        let after = resolve_tick(&mut r, &skills(), &ctx(5_600), &mut lucky());
        assert_eq!(after.verdict, TickVerdict::Continue);
        assert!(!after.resolved);
        assert_eq!(r.tick_count, ticks);
        assert_eq!((r.player(Side::Creator).hp, r.player(Side::Opponent).hp), hp);
    }

    #[test]
    fn failed_power_attempt_rearms_within_window() {
        let mut r = round();
        r.power = PowerPuzzleState::Ready(puzzle(8));
        r.player_mut(Side::Creator).power = PowerTrack::Attempting { solve_at_ms: 0 };
        r.player_mut(Side::Creator).solve_at_ms = Some(u64::MAX);
        r.player_mut(Side::Opponent).solve_at_ms = Some(u64::MAX);
        r.player_mut(Side::Opponent).power = PowerTrack::Attempting { solve_at_ms: u64::MAX };
        let report = resolve_tick(&mut r, &skills(), &ctx(1_000), &mut coin());
        assert_eq!(report.verdict, TickVerdict::Continue);
        let PowerTrack::Attempting { solve_at_ms } = r.player(Side::Creator).power else {
            panic!("test: creator should still be attempting");
        };
        assert!((4_000..=8_000).contains(&solve_at_ms), "retry at {solve_at_ms}");
    }

    #[test]
    fn timeout_prefers_higher_hp() {
        let mut r = round();
        r.tick_count = 149;
        for p in r.players.iter_mut() {
            p.solve_at_ms = Some(u64::MAX);
        }
        r.player_mut(Side::Creator).hp = 60;
        r.player_mut(Side::Opponent).hp = 80;
        let report = resolve_tick(&mut r, &skills(), &ctx(0), &mut lucky());
        assert_eq!(
            report.verdict,
            TickVerdict::Decided { winner: Side::Opponent, cause: SettleCause::Timeout }
        );
    }

    #[test]
    fn timeout_tie_breaks_on_puzzles_solved() {
        let mut r = round();
        r.player_mut(Side::Creator).hp = 40;
        r.player_mut(Side::Opponent).hp = 40;
        r.player_mut(Side::Creator).puzzles_solved = 1;
        r.player_mut(Side::Opponent).puzzles_solved = 3;
        assert_eq!(timeout_winner(&r, &mut lucky()), Side::Opponent);
        r.player_mut(Side::Creator).puzzles_solved = 3;
        // Exact tie falls to the rng, not to iteration order.
        assert_eq!(timeout_winner(&r, &mut lucky()), Side::Creator);
        assert_eq!(timeout_winner(&r, &mut unlucky()), Side::Opponent);
    }
}
