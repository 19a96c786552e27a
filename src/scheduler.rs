// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Arena Match Engine - Match Scheduler
//
// One driving clock, many logical timers. Each ACTIVE match owns a repeating
// Tick; OPEN matches own a one-shot Expire; a recorded finisher owns a one-shot
// Settle. Firings pop in (fire_at, seq) order, so equal deadlines run in the
// order they were scheduled and every run is reproducible.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::types::MatchId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FiringKind {
    Tick,
    Expire,
    Settle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Firing {
    pub at_ms: u64,
    pub seq: u64,
    pub match_id: MatchId,
    pub kind: FiringKind,
}

#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    queue: BinaryHeap<Reverse<Firing>>,
    next_seq: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, match_id: MatchId, kind: FiringKind, at_ms: u64) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Reverse(Firing { at_ms, seq, match_id, kind }));
    }

    /// Pops the earliest firing due at or before `now_ms`.
    pub fn pop_due(&mut self, now_ms: u64) -> Option<Firing> {
        match self.queue.peek() {
            Some(Reverse(f)) if f.at_ms <= now_ms => self.queue.pop().map(|Reverse(f)| f),
            _ => None,
        }
    }

    /// Live timers of `kind` for one match.
    pub fn pending(&self, match_id: MatchId, kind: FiringKind) -> usize {
        self.queue
            .iter()
            .filter(|Reverse(f)| f.match_id == match_id && f.kind == kind)
            .count()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_in_deadline_then_schedule_order() {
        let mut s = Scheduler::new();
        s.schedule(MatchId(2), FiringKind::Tick, 600);
        s.schedule(MatchId(1), FiringKind::Expire, 90_000);
        s.schedule(MatchId(1), FiringKind::Tick, 600);
        s.schedule(MatchId(3), FiringKind::Settle, 100);

        assert_eq!(s.len(), 4);
        assert!(s.pop_due(99).is_none());

        let order: Vec<_> = std::iter::from_fn(|| s.pop_due(1_000))
            .map(|f| (f.match_id, f.kind))
            .collect();
        assert_eq!(
            order,
            vec![
                (MatchId(3), FiringKind::Settle),
                (MatchId(2), FiringKind::Tick),
                (MatchId(1), FiringKind::Tick),
            ]
        );
        assert_eq!(s.len(), 1);
        assert_eq!(s.pending(MatchId(1), FiringKind::Expire), 1);
    }
}
