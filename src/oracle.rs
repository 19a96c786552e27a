// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Arena Match Engine - Puzzle Oracle
//
// The engine never authors or grades puzzles on its own terms: it requests
// them by difficulty and installs whatever arrives. `LocalPuzzleGenerator`
// is the synchronous fallback used whenever a remote oracle fails or lags.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::OracleError;

pub const MIN_DIFFICULTY: u8 = 1;
pub const MAX_DIFFICULTY: u8 = 10;

/// Identifies one outstanding request.
pub type Ticket = u64;

// ─── Puzzle ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PuzzleType {
    Arithmetic,
    Sequence,
    Scramble,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Puzzle {
    pub question: String,
    pub answer: String,
    pub puzzle_type: PuzzleType,
    pub difficulty: u8,
}

impl Puzzle {
    pub fn verify(&self, submitted: &str) -> bool {
        verify(self, submitted)
    }
}

/// Single-shot equality check, ignoring case and whitespace.
pub fn verify(puzzle: &Puzzle, submitted: &str) -> bool {
    normalize(&puzzle.answer) == normalize(submitted)
}

fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

pub fn clamp_difficulty(d: u8) -> u8 {
    d.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY)
}

// ─── Oracle contract ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PuzzleRequest {
    pub ticket: Ticket,
    pub difficulty: u8,
}

#[derive(Debug, Clone)]
pub struct OracleReply {
    pub ticket: Ticket,
    pub result: Result<Puzzle, OracleError>,
}

/// A puzzle source that may answer immediately or several ticks later.
///
/// `request` must not block. Replies are collected with `poll`, which the
/// engine calls at the start of every firing.
pub trait PuzzleOracle {
    fn request(&mut self, request: PuzzleRequest, now_ms: u64);
    fn poll(&mut self, now_ms: u64) -> Vec<OracleReply>;
}

// ─── LocalPuzzleGenerator ────────────────────────────────────────────────────

const WORDS: [&[&str]; 4] = [
    &["cat", "sun", "map", "owl", "jet"],
    &["tiger", "piano", "storm", "ember", "quilt"],
    &["lantern", "harbor", "glacier", "pilgrim", "cobalt"],
    &["labyrinth", "archipelago", "chrysalis", "quicksilver", "zephyrous"],
];

/// Synchronous puzzle source; deterministic for a given seed.
#[derive(Debug, Clone)]
pub struct LocalPuzzleGenerator {
    rng: ChaCha8Rng,
    ready: Vec<OracleReply>,
}

impl LocalPuzzleGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            ready: Vec::new(),
        }
    }

    pub fn generate(&mut self, difficulty: u8) -> Puzzle {
        let difficulty = clamp_difficulty(difficulty);
        match self.rng.gen_range(0..3) {
            0 => self.arithmetic(difficulty),
            1 => self.sequence(difficulty),
            _ => self.scramble(difficulty),
        }
    }

    fn arithmetic(&mut self, difficulty: u8) -> Puzzle {
        let span = 10 * difficulty as i64;
        let a = self.rng.gen_range(1..=span);
        let b = self.rng.gen_range(1..=span);
        let (question, answer) = if difficulty >= 7 {
            let c = self.rng.gen_range(1..=span);
            (format!("What is {a} * {b} - {c}?"), a * b - c)
        } else if difficulty >= 4 {
            (format!("What is {a} * {b}?"), a * b)
        } else if self.rng.gen_bool(0.5) {
            (format!("What is {a} + {b}?"), a + b)
        } else {
            (format!("What is {a} - {b}?"), a - b)
        };
        Puzzle {
            question,
            answer: answer.to_string(),
            puzzle_type: PuzzleType::Arithmetic,
            difficulty,
        }
    }

    fn sequence(&mut self, difficulty: u8) -> Puzzle {
        let start = self.rng.gen_range(1..=10 * difficulty as i64);
        let step = self.rng.gen_range(1..=difficulty as i64 + 1);
        // Quadratic growth from difficulty 6 upward.
        let term = |i: i64| {
            if difficulty >= 6 { start + step * i * i } else { start + step * i }
        };
        let shown: Vec<String> = (0..4).map(|i| term(i).to_string()).collect();
        Puzzle {
            question: format!("What comes next: {}, ?", shown.join(", ")),
            answer: term(4).to_string(),
            puzzle_type: PuzzleType::Sequence,
            difficulty,
        }
    }

    fn scramble(&mut self, difficulty: u8) -> Puzzle {
        let bucket = WORDS[((difficulty - 1) / 3) as usize];
        let word = bucket[self.rng.gen_range(0..bucket.len())];
        let mut letters: Vec<char> = word.chars().collect();
        letters.shuffle(&mut self.rng);
        if letters.iter().copied().eq(word.chars()) {
            letters.rotate_left(1);
        }
        let scrambled: String = letters.into_iter().collect();
        Puzzle {
            question: format!("Unscramble: {}", scrambled.to_uppercase()),
            answer: word.to_string(),
            puzzle_type: PuzzleType::Scramble,
            difficulty,
        }
    }
}

impl PuzzleOracle for LocalPuzzleGenerator {
    fn request(&mut self, request: PuzzleRequest, _now_ms: u64) {
        let puzzle = self.generate(request.difficulty);
        self.ready.push(OracleReply { ticket: request.ticket, result: Ok(puzzle) });
    }

    fn poll(&mut self, _now_ms: u64) -> Vec<OracleReply> {
        std::mem::take(&mut self.ready)
    }
}

// ─── DelayedOracle ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct InFlight {
    ready_at_ms: u64,
    reply: OracleReply,
}

/// Simulates a remote generator: replies arrive `latency_ms` after the request,
/// or as errors while in outage.
#[derive(Debug, Clone)]
pub struct DelayedOracle {
    generator: LocalPuzzleGenerator,
    latency_ms: u64,
    outage: bool,
    in_flight: Vec<InFlight>,
    requests_issued: u32,
    requested_difficulties: Vec<u8>,
}

impl DelayedOracle {
    pub fn new(seed: u64, latency_ms: u64) -> Self {
        Self {
            generator: LocalPuzzleGenerator::new(seed),
            latency_ms,
            outage: false,
            in_flight: Vec::new(),
            requests_issued: 0,
            requested_difficulties: Vec::new(),
        }
    }

    pub fn set_latency(&mut self, latency_ms: u64) {
        self.latency_ms = latency_ms;
    }

    pub fn set_outage(&mut self, outage: bool) {
        self.outage = outage;
    }

    pub fn requests_issued(&self) -> u32 {
        self.requests_issued
    }

    pub fn requested_difficulties(&self) -> &[u8] {
        &self.requested_difficulties
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}

impl PuzzleOracle for DelayedOracle {
    fn request(&mut self, request: PuzzleRequest, now_ms: u64) {
        self.requests_issued += 1;
        self.requested_difficulties.push(request.difficulty);
        let result = if self.outage {
            Err(OracleError::Unavailable("remote generator offline".to_string()))
        } else {
            Ok(self.generator.generate(request.difficulty))
        };
        self.in_flight.push(InFlight {
            ready_at_ms: now_ms + self.latency_ms,
            reply: OracleReply { ticket: request.ticket, result },
        });
    }

    fn poll(&mut self, now_ms: u64) -> Vec<OracleReply> {
        let mut delivered = Vec::new();
        let mut remaining = Vec::new();
        for f in self.in_flight.drain(..) {
            if f.ready_at_ms <= now_ms {
                delivered.push(f.reply);
            } else {
                remaining.push(f);
            }
        }
        self.in_flight = remaining;
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_ignores_case_and_whitespace() {
        let p = Puzzle {
            question: "Unscramble: NAIPO".to_string(),
            answer: "piano".to_string(),
            puzzle_type: PuzzleType::Scramble,
            difficulty: 4,
        };
        assert!(p.verify("  PiAno "));
        assert!(p.verify("pi ano"));
        assert!(!p.verify("pianos"));
    }

    #[test]
    fn generated_puzzles_answer_their_own_question() {
        let mut gen = LocalPuzzleGenerator::new(11);
        for d in MIN_DIFFICULTY..=MAX_DIFFICULTY {
            for _ in 0..20 {
                let p = gen.generate(d);
                assert_eq!(p.difficulty, d);
                assert!(!p.answer.is_empty());
                assert!(verify(&p, &p.answer));
            }
        }
    }

    #[test]
    fn out_of_range_difficulty_clamped() {
        let mut gen = LocalPuzzleGenerator::new(3);
        assert_eq!(gen.generate(0).difficulty, MIN_DIFFICULTY);
        assert_eq!(gen.generate(42).difficulty, MAX_DIFFICULTY);
    }

    #[test]
    fn same_seed_same_puzzles() {
        let mut a = LocalPuzzleGenerator::new(5);
        let mut b = LocalPuzzleGenerator::new(5);
        for d in 1..=10 {
            assert_eq!(a.generate(d), b.generate(d));
        }
    }

    #[test]
    fn delayed_oracle_holds_reply_until_latency() {
        let mut oracle = DelayedOracle::new(1, 1_000);
        oracle.request(PuzzleRequest { ticket: 7, difficulty: 3 }, 500);
        assert!(oracle.poll(1_499).is_empty());
        let replies = oracle.poll(1_500);
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].ticket, 7);
        assert!(replies[0].result.is_ok());
        assert_eq!(oracle.in_flight(), 0);
    }

    #[test]
    fn delayed_oracle_outage_replies_with_error() {
        let mut oracle = DelayedOracle::new(1, 0);
        oracle.set_outage(true);
        oracle.request(PuzzleRequest { ticket: 1, difficulty: 1 }, 0);
        let replies = oracle.poll(0);
        assert!(matches!(replies[0].result, Err(OracleError::Unavailable(_))));
        assert_eq!(oracle.requests_issued(), 1);
    }
}
