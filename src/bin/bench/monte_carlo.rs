// Monte Carlo Infrastructure: N runs per scenario with statistical aggregation
// Each scenario runs N times with seeds base..base+N, computing mean ± 95% CI

use arena_match_engine::adapter::coins_to_f64;
use arena_match_engine::*;
use rust_decimal_macros::dec;
use tracing::{debug, warn};

use crate::report::*;
use crate::scenarios::{AgentSetup, OracleMode, Scenario};

use std::time::Instant;

const STAKE: Coins = Coins(dec!(0.0001));
const STARTING_COINS: Coins = Coins(dec!(1));
/// Clock steps allowed per match before it counts as stuck.
const MAX_STEPS_PER_MATCH: u32 = 2_000;

#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Match(#[from] MatchError),
}

fn profile(id: &str, setup: &AgentSetup) -> AgentProfile {
    let skill = SkillProfile::new(setup.speed, setup.accuracy, setup.dodge, 0.5);
    let p = AgentProfile::new(id, STARTING_COINS, skill);
    if setup.underdog { p.as_underdog() } else { p }
}

fn oracle(mode: OracleMode, seed: u64) -> DelayedOracle {
    match mode {
        OracleMode::Local => DelayedOracle::new(seed, 0),
        OracleMode::Slow { latency_ms } => DelayedOracle::new(seed, latency_ms),
        OracleMode::Dead => {
            let mut o = DelayedOracle::new(seed, 0);
            o.set_outage(true);
            o
        }
    }
}

/// Run a single scenario iteration with a specific seed.
pub fn run_single(scenario: &Scenario, seed: u64) -> Result<BenchResult, BenchError> {
    let start = Instant::now();
    let config = EngineConfig::default().with_seed(seed);
    let step = config.tick_interval_ms;
    let mut engine = MatchEngine::new(config, oracle(scenario.oracle, seed))?;

    let creator = AgentId::from("creator");
    let opponent = AgentId::from("opponent");
    engine.register_agent(profile("creator", &scenario.creator))?;
    engine.register_agent(profile("opponent", &scenario.opponent))?;
    let money_before = engine.registry().total_money();

    let (mut creator_wins, mut knockouts, mut finishers, mut timeouts, mut stuck) = (0, 0, 0, 0, 0);
    let mut ticks = Vec::with_capacity(scenario.matches as usize);

    for _ in 0..scenario.matches {
        let id = engine.create_match(&creator, STAKE)?;
        engine.accept_match(id, &opponent)?;

        let mut last_tick = 0;
        let mut finished = false;
        for _ in 0..MAX_STEPS_PER_MATCH {
            engine.advance_by(step);
            match engine.view(id) {
                Some(v) if v.status == MatchStatus::Finished => {
                    finished = true;
                    break;
                }
                Some(v) => last_tick = v.round.map(|r| r.tick_count).unwrap_or(last_tick),
                None => break,
            }
        }
        if !finished {
            warn!(match_id = %id, seed, "match exceeded step budget");
            stuck += 1;
        }
        ticks.push(last_tick as f64);

        for event in engine.drain_events() {
            if let MatchEvent::Settled { winner, cause, .. } = event {
                if winner == creator {
                    creator_wins += 1;
                }
                match cause {
                    SettleCause::Knockout => knockouts += 1,
                    SettleCause::Finisher => finishers += 1,
                    SettleCause::Timeout => timeouts += 1,
                }
            }
        }
    }

    engine.void_in_flight();
    // Money drift across the run plus any escrow book-keeping drift.
    let escrow_drift = coins_to_f64(Coins(engine.registry().escrow().imbalance()));
    let conservation_error =
        coins_to_f64(engine.registry().total_money() - money_before).abs() + escrow_drift.abs();
    debug!(scenario = scenario.name, seed, conservation_error, "run complete");

    let mut result = BenchResult {
        scenario: scenario.label.to_string(),
        name: scenario.name.to_string(),
        seed,
        pass: true,
        matches: scenario.matches,
        creator_wins,
        knockouts,
        finishers,
        timeouts,
        stuck,
        mean_ticks: Stats::from_samples(&ticks).mean,
        conservation_error,
        oracle: engine.oracle_stats(),
        elapsed_ms: start.elapsed().as_millis(),
    };
    result.pass = evaluate(scenario, &result);
    Ok(result)
}

fn evaluate(scenario: &Scenario, r: &BenchResult) -> bool {
    let c = &scenario.criteria;
    let mut pass = r.conservation_error <= c.max_conservation_error;
    if c.require_zero_stuck && r.stuck > 0 {
        pass = false;
    }
    pass
}

/// Run Monte Carlo: N runs of a scenario, aggregate stats.
pub fn run_monte_carlo(
    scenario: &Scenario,
    n_runs: usize,
    base_seed: u64,
) -> Result<MonteCarloReport, BenchError> {
    let mut results = Vec::with_capacity(n_runs);
    for i in 0..n_runs {
        let seed = base_seed + i as u64;
        results.push(run_single(scenario, seed)?);
    }
    Ok(aggregate(scenario, results))
}

/// Aggregate individual runs into a MonteCarloReport. Win-rate bounds are
/// judged on the aggregate, where a single unlucky seed cannot fail them.
fn aggregate(scenario: &Scenario, results: Vec<BenchResult>) -> MonteCarloReport {
    let n = results.len();
    let sample = |f: &dyn Fn(&BenchResult) -> f64| {
        Stats::from_samples(&results.iter().map(f).collect::<Vec<_>>())
    };

    let creator_win_rate = sample(&|r: &BenchResult| r.creator_win_rate());
    let mean_ticks = sample(&|r: &BenchResult| r.mean_ticks);
    let knockout_share = sample(&|r: &BenchResult| ratio(r.knockouts, r.matches));
    let finisher_share = sample(&|r: &BenchResult| ratio(r.finishers, r.matches));
    let timeout_share = sample(&|r: &BenchResult| ratio(r.timeouts, r.matches));
    let fallbacks = sample(&|r: &BenchResult| r.oracle.fallbacks as f64);
    let conservation_error = sample(&|r: &BenchResult| r.conservation_error);
    let elapsed_ms = sample(&|r: &BenchResult| r.elapsed_ms as f64);

    let passed = results.iter().filter(|r| r.pass).count();
    let mut pass_rate = if n == 0 { 0.0 } else { passed as f64 / n as f64 };
    let c = &scenario.criteria;
    let too_low = c.min_creator_win_rate.is_some_and(|min| creator_win_rate.mean < min);
    let too_high = c.max_creator_win_rate.is_some_and(|max| creator_win_rate.mean > max);
    if too_low || too_high {
        pass_rate = 0.0;
    }

    MonteCarloReport {
        scenario_name: scenario.name.to_string(),
        label: scenario.label.to_string(),
        category: scenario.category.to_string(),
        n_runs: n,
        pass_rate,
        creator_win_rate,
        mean_ticks,
        knockout_share,
        finisher_share,
        timeout_share,
        fallbacks,
        conservation_error,
        elapsed_ms,
        individual_runs: results,
    }
}
