// Scenario Definitions
// Each scenario fixes two agents, an oracle behaviour and pass criteria; the
// Monte Carlo layer varies only the seed.

// ─── Scenario Configuration ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct AgentSetup {
    pub speed: f64,
    pub accuracy: f64,
    pub dodge: f64,
    pub underdog: bool,
}

impl AgentSetup {
    fn new(speed: f64, accuracy: f64, dodge: f64) -> Self {
        Self { speed, accuracy, dodge, underdog: false }
    }

    fn underdog(mut self) -> Self {
        self.underdog = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OracleMode {
    /// Replies on the next firing.
    Local,
    /// Replies after a fixed latency.
    Slow { latency_ms: u64 },
    /// Every request errors; all puzzles come from the fallback.
    Dead,
}

pub struct Scenario {
    pub name: &'static str,
    pub label: &'static str,
    pub category: &'static str,
    pub creator: AgentSetup,
    pub opponent: AgentSetup,
    pub oracle: OracleMode,
    /// Back-to-back matches between the pair in one run.
    pub matches: u32,
    pub criteria: PassCriteria,
}

pub struct PassCriteria {
    pub max_conservation_error: f64,
    pub min_creator_win_rate: Option<f64>,
    pub max_creator_win_rate: Option<f64>,
    pub require_zero_stuck: bool,
}

impl Default for PassCriteria {
    fn default() -> Self {
        Self {
            max_conservation_error: 0.0,
            min_creator_win_rate: None,
            max_creator_win_rate: None,
            require_zero_stuck: true,
        }
    }
}

// ─── Scenario Matrix ────────────────────────────────────────────────────────

pub fn scenarios() -> Vec<Scenario> {
    vec![
        Scenario {
            name: "EVEN_MATCHUP",
            label: "Even matchup (0.7 vs 0.7)",
            category: "balance",
            creator: AgentSetup::new(0.5, 0.7, 0.5),
            opponent: AgentSetup::new(0.5, 0.7, 0.5),
            oracle: OracleMode::Local,
            matches: 10,
            criteria: PassCriteria {
                min_creator_win_rate: Some(0.1),
                max_creator_win_rate: Some(0.9),
                ..PassCriteria::default()
            },
        },
        Scenario {
            name: "SKILL_GAP",
            label: "Skill gap (0.95 vs 0.45)",
            category: "balance",
            creator: AgentSetup::new(0.7, 0.95, 0.5),
            opponent: AgentSetup::new(0.3, 0.45, 0.5),
            oracle: OracleMode::Local,
            matches: 10,
            criteria: PassCriteria {
                min_creator_win_rate: Some(0.5),
                ..PassCriteria::default()
            },
        },
        Scenario {
            name: "UNDERDOG_DEBUT",
            label: "Underdog debut (0.9 vs boosted 0.5)",
            category: "onboarding",
            creator: AgentSetup::new(0.5, 0.9, 0.5),
            opponent: AgentSetup::new(0.5, 0.5, 0.5).underdog(),
            oracle: OracleMode::Local,
            matches: 1,
            criteria: PassCriteria::default(),
        },
        Scenario {
            name: "SLOW_ORACLE",
            label: "Slow oracle (2.5s latency)",
            category: "resilience",
            creator: AgentSetup::new(0.5, 0.7, 0.5),
            opponent: AgentSetup::new(0.5, 0.7, 0.5),
            oracle: OracleMode::Slow { latency_ms: 2_500 },
            matches: 5,
            criteria: PassCriteria::default(),
        },
        Scenario {
            name: "DEAD_ORACLE",
            label: "Dead oracle (fallback only)",
            category: "resilience",
            creator: AgentSetup::new(0.5, 0.7, 0.5),
            opponent: AgentSetup::new(0.5, 0.7, 0.5),
            oracle: OracleMode::Dead,
            matches: 5,
            criteria: PassCriteria::default(),
        },
    ]
}
