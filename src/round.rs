// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Arena Match Engine - Match Round State
//
// The ephemeral per-match state owned by an ACTIVE match. The "exactly
// once" rules (power puzzle requested once, finisher recorded once, one
// enrollment per combatant) are transitions on the enums below and are
// enforced here and nowhere else.

use serde::Serialize;
use std::collections::VecDeque;

use crate::oracle::{clamp_difficulty, Puzzle, Ticket, MAX_DIFFICULTY};
use crate::skill::Onboarding;
use crate::types::{AgentId, CombatantView, RoundView, Side};

pub const MAX_HP: u8 = 100;
const POWER_DIFFICULTY_BONUS: u8 = 3;

// ---------------------------------------------------------------------------
// Phase and power-puzzle state machines
// ---------------------------------------------------------------------------

/// Instant-win event recorded when a power puzzle is solved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finisher {
    pub side: Side,
    pub agent: AgentId,
    pub at_ms: u64,
    pub settle_at_ms: u64,
}

/// ```text
/// Warmup --(now >= ends_at)--> Racing --(power solve)--> Finishing
/// ```
/// `Finishing` is absorbing; settlement happens outside the round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundPhase {
    Warmup { ends_at_ms: u64 },
    Racing,
    Finishing(Finisher),
}

/// ```text
/// Locked --(threshold)--> Generating --(reply)--> Ready
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PowerPuzzleState {
    Locked,
    /// Requested; ticket attached once the engine has issued it.
    Generating { ticket: Option<Ticket> },
    Ready(Puzzle),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerTrack {
    NotEnrolled,
    Attempting { solve_at_ms: u64 },
}

// ---------------------------------------------------------------------------
// CombatantState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct CombatantState {
    pub agent: AgentId,
    /// Invariant: `0 <= hp <= MAX_HP`.
    pub hp: u8,
    pub puzzles_solved: u32,
    /// Never decreases, capped at `MAX_DIFFICULTY`.
    pub difficulty: u8,
    /// `Some` while working on the shared puzzle.
    pub solve_at_ms: Option<u64>,
    pub power: PowerTrack,
    pub onboarding: Onboarding,
}

impl CombatantState {
    pub fn new(agent: AgentId, onboarding: Onboarding) -> Self {
        Self {
            agent,
            hp: MAX_HP,
            puzzles_solved: 0,
            difficulty: 1,
            solve_at_ms: None,
            power: PowerTrack::NotEnrolled,
            onboarding,
        }
    }

    /// Returns the hp actually removed.
    pub fn take_damage(&mut self, amount: u8) -> u8 {
        let dealt = amount.min(self.hp);
        self.hp -= dealt;
        dealt
    }

    pub fn is_down(&self) -> bool {
        self.hp == 0
    }

    pub fn record_solve(&mut self) {
        self.puzzles_solved += 1;
        self.difficulty = (self.difficulty + 1).min(MAX_DIFFICULTY);
    }

    pub fn is_solving(&self) -> bool {
        self.solve_at_ms.is_some()
    }
}

// ---------------------------------------------------------------------------
// Narration
// ---------------------------------------------------------------------------

/// Append-only log that drops its oldest entries past `capacity`.
#[derive(Debug, Clone, PartialEq)]
pub struct NarrationLog {
    entries: VecDeque<String>,
    capacity: usize,
}

impl NarrationLog {
    pub fn new(capacity: usize) -> Self {
        Self { entries: VecDeque::with_capacity(capacity), capacity: capacity.max(1) }
    }

    pub fn push(&mut self, line: impl Into<String>) {
        self.entries.push_back(line.into());
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn lines(&self) -> impl Iterator<Item = &String> {
        self.entries.iter()
    }
}

// ---------------------------------------------------------------------------
// MatchRound
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MatchRound {
    pub players: [CombatantState; 2],
    /// Shared puzzle both combatants race; always present.
    pub current_puzzle: Puzzle,
    /// Latest outstanding main-puzzle request. Older replies are stale.
    pub main_ticket: Option<Ticket>,
    pub power: PowerPuzzleState,
    pub phase: RoundPhase,
    /// Resolved ticks; warmup firings excluded.
    pub tick_count: u32,
    pub puzzle_threshold: u32,
    pub log: NarrationLog,
}

impl MatchRound {
    pub fn new(
        creator: CombatantState,
        opponent: CombatantState,
        initial_puzzle: Puzzle,
        warmup_ends_at_ms: u64,
        puzzle_threshold: u32,
        narration_capacity: usize,
    ) -> Self {
        Self {
            players: [creator, opponent],
            current_puzzle: initial_puzzle,
            main_ticket: None,
            power: PowerPuzzleState::Locked,
            phase: RoundPhase::Warmup { ends_at_ms: warmup_ends_at_ms },
            tick_count: 0,
            puzzle_threshold,
            log: NarrationLog::new(narration_capacity),
        }
    }

    pub fn player(&self, side: Side) -> &CombatantState {
        &self.players[side.index()]
    }

    pub fn player_mut(&mut self, side: Side) -> &mut CombatantState {
        &mut self.players[side.index()]
    }

    pub fn finisher(&self) -> Option<&Finisher> {
        match &self.phase {
            RoundPhase::Finishing(f) => Some(f),
            _ => None,
        }
    }

    /// Leaves warmup once `now_ms` reaches its end. Returns whether the
    /// round is racing.
    pub fn try_begin_racing(&mut self, now_ms: u64) -> bool {
        match self.phase {
            RoundPhase::Warmup { ends_at_ms } if now_ms >= ends_at_ms => {
                self.phase = RoundPhase::Racing;
                true
            }
            RoundPhase::Racing => true,
            _ => false,
        }
    }

    /// Records the finisher. Only the first call while racing succeeds.
    pub fn record_finisher(&mut self, side: Side, now_ms: u64, grace_ms: u64) -> bool {
        if self.phase != RoundPhase::Racing {
            return false;
        }
        self.phase = RoundPhase::Finishing(Finisher {
            side,
            agent: self.player(side).agent.clone(),
            at_ms: now_ms,
            settle_at_ms: now_ms + grace_ms,
        });
        true
    }

    /// `Locked -> Generating`. False if already requested or ready.
    pub fn request_power_puzzle(&mut self) -> bool {
        if self.power != PowerPuzzleState::Locked {
            return false;
        }
        self.power = PowerPuzzleState::Generating { ticket: None };
        true
    }

    pub fn attach_power_ticket(&mut self, ticket: Ticket) {
        if let PowerPuzzleState::Generating { ticket: slot } = &mut self.power {
            slot.get_or_insert(ticket);
        }
    }

    /// `Generating -> Ready` for the matching ticket only.
    pub fn install_power_puzzle(&mut self, ticket: Ticket, puzzle: Puzzle) -> bool {
        match self.power {
            PowerPuzzleState::Generating { ticket: Some(t) } if t == ticket => {
                self.power = PowerPuzzleState::Ready(puzzle);
                true
            }
            _ => false,
        }
    }

    pub fn power_puzzle(&self) -> Option<&Puzzle> {
        match &self.power {
            PowerPuzzleState::Ready(p) => Some(p),
            _ => None,
        }
    }

    /// Installs a main puzzle if `ticket` is the latest one issued.
    pub fn install_main_puzzle(&mut self, ticket: Ticket, puzzle: Puzzle) -> bool {
        if self.main_ticket != Some(ticket) {
            return false;
        }
        self.current_puzzle = puzzle;
        self.main_ticket = None;
        true
    }

    /// Difficulty for the next shared puzzle.
    pub fn next_main_difficulty(&self) -> u8 {
        self.players[0].difficulty.max(self.players[1].difficulty)
    }

    pub fn power_difficulty(&self) -> u8 {
        clamp_difficulty(self.next_main_difficulty() + POWER_DIFFICULTY_BONUS)
    }

    pub fn view(&self) -> RoundView {
        let combatant = |c: &CombatantState| CombatantView {
            agent: c.agent.clone(),
            hp: c.hp,
            puzzles_solved: c.puzzles_solved,
            difficulty: c.difficulty,
            working: c.is_solving(),
            power_enrolled: c.power != PowerTrack::NotEnrolled,
        };
        RoundView {
            tick_count: self.tick_count,
            combatants: [combatant(&self.players[0]), combatant(&self.players[1])],
            question: self.current_puzzle.question.clone(),
            puzzle_type: self.current_puzzle.puzzle_type,
            puzzle_difficulty: self.current_puzzle.difficulty,
            power_question: self.power_puzzle().map(|p| p.question.clone()),
            finisher: self.finisher().map(|f| f.agent.clone()),
            log: self.log.lines().cloned().collect(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::oracle::PuzzleType;

    pub(crate) fn puzzle(difficulty: u8) -> Puzzle {
        Puzzle {
            question: format!("What is {difficulty} + 1?"),
            answer: (difficulty + 1).to_string(),
            puzzle_type: PuzzleType::Arithmetic,
            difficulty,
        }
    }

    pub(crate) fn round() -> MatchRound {
        MatchRound::new(
            CombatantState::new(AgentId::from("ada"), Onboarding::None),
            CombatantState::new(AgentId::from("bob"), Onboarding::None),
            puzzle(1),
            0,
            5,
            4,
        )
    }

    #[test]
    fn damage_saturates_at_zero() {
        let mut c = CombatantState::new(AgentId::from("ada"), Onboarding::None);
        assert_eq!(c.take_damage(30), 30);
        assert_eq!(c.hp, 70);
        assert_eq!(c.take_damage(200), 70);
        assert_eq!(c.hp, 0);
        assert!(c.is_down());
    }

    #[test]
    fn difficulty_caps_at_ten() {
        let mut c = CombatantState::new(AgentId::from("ada"), Onboarding::None);
        for _ in 0..20 {
            c.record_solve();
        }
        assert_eq!(c.difficulty, MAX_DIFFICULTY);
        assert_eq!(c.puzzles_solved, 20);
    }

    #[test]
    fn power_puzzle_requested_once() {
        let mut r = round();
        assert!(r.request_power_puzzle());
        assert!(!r.request_power_puzzle());
        r.attach_power_ticket(9);
        assert!(!r.install_power_puzzle(8, puzzle(8)), "wrong ticket");
        assert!(r.install_power_puzzle(9, puzzle(8)));
        assert!(!r.request_power_puzzle());
        assert_eq!(r.power_puzzle().map(|p| p.difficulty), Some(8));
    }

    #[test]
    fn finisher_recorded_once_and_only_while_racing() {
        let mut r = MatchRound::new(
            CombatantState::new(AgentId::from("ada"), Onboarding::None),
            CombatantState::new(AgentId::from("bob"), Onboarding::None),
            puzzle(1),
            1_000,
            5,
            4,
        );
        assert!(!r.record_finisher(Side::Creator, 500, 5_000), "still in warmup");
        assert!(!r.try_begin_racing(999));
        assert!(r.try_begin_racing(1_000));
        assert!(r.record_finisher(Side::Opponent, 2_000, 5_000));
        assert!(!r.record_finisher(Side::Creator, 2_600, 5_000));
        let f = r.finisher().expect("test: finisher set");
        assert_eq!(f.side, Side::Opponent);
        assert_eq!(f.settle_at_ms, 7_000);
        assert!(!r.try_begin_racing(9_000), "finishing is absorbing");
    }

    #[test]
    fn stale_main_ticket_ignored() {
        let mut r = round();
        r.main_ticket = Some(2);
        assert!(!r.install_main_puzzle(1, puzzle(3)));
        assert_eq!(r.current_puzzle.difficulty, 1);
        assert!(r.install_main_puzzle(2, puzzle(3)));
        assert_eq!(r.current_puzzle.difficulty, 3);
        assert_eq!(r.main_ticket, None);
    }

    #[test]
    fn narration_drops_oldest() {
        let mut log = NarrationLog::new(3);
        for i in 0..5 {
            log.push(format!("line {i}"));
        }
        let lines: Vec<_> = log.lines().cloned().collect();
        assert_eq!(lines, vec!["line 2", "line 3", "line 4"]);
    }
}
