// Arena Match Engine Benchmark Runner
// Monte Carlo (N=30), seedable PRNG, scenario matrix over skill and oracle behaviour
//
// Usage:
//   cargo run --release --bin bench                     # Run all scenarios (30 runs each)
//   cargo run --release --bin bench -- --runs 5         # Quick mode (5 runs each)
//   cargo run --release --bin bench -- ORACLE           # Filter by name, label or category
//   cargo run --release --bin bench -- --json           # Print the JSON report to stdout
//   cargo run --release --bin bench -- --seed 42        # Custom base seed
//
// Logging goes to stderr; set RUST_LOG (default `warn`).

mod monte_carlo;
mod report;
mod scenarios;

use report::*;
use scenarios::*;
use std::process::ExitCode;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const PASS_THRESHOLD: f64 = 0.933;

// ─── CLI Parsing ────────────────────────────────────────────────────────────

struct CliArgs {
    runs: usize,
    seed: u64,
    json: bool,
    filter: Option<String>,
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut cli = CliArgs {
        runs: 30,
        seed: 0,
        json: false,
        filter: None,
    };

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--runs" => {
                i += 1;
                if i < args.len() {
                    cli.runs = args[i].parse().unwrap_or(30);
                }
            }
            "--seed" => {
                i += 1;
                if i < args.len() {
                    cli.seed = args[i].parse().unwrap_or(0);
                }
            }
            "--json" => {
                cli.json = true;
            }
            arg if !arg.starts_with('-') => {
                cli.filter = Some(arg.to_string());
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
            }
        }
        i += 1;
    }

    cli
}

// ─── Main ───────────────────────────────────────────────────────────────────

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = parse_args();
    let all_scenarios = scenarios();

    let to_run: Vec<&Scenario> = match &cli.filter {
        Some(f) => {
            let f_lower = f.to_lowercase();
            all_scenarios.iter()
                .filter(|s| s.name.to_lowercase().contains(&f_lower)
                          || s.label.to_lowercase().contains(&f_lower)
                          || s.category.to_lowercase().contains(&f_lower))
                .collect()
        }
        None => all_scenarios.iter().collect(),
    };

    if to_run.is_empty() {
        eprintln!("No scenarios match filter: {:?}", cli.filter);
        return ExitCode::FAILURE;
    }

    if !cli.json {
        println!("\n  Arena Match Engine Benchmark");
        println!("  PRNG: ChaCha8Rng | Runs/scenario: {} | Base seed: {}", cli.runs, cli.seed);
        println!("  Running {} scenario(s)...\n", to_run.len());
        println!("  {:<38} {:>5} {:>13} {:>7} {:>5} {:>5} {:>5} {:>9} {:>7}",
            "Scenario", "Pass%", "CreatorWin%", "Ticks", "KO%", "Fin%", "TO%", "Fallback", "Time");
        println!("  {}", "-".repeat(104));
    }

    let suite_start = Instant::now();
    let mut mc_reports = Vec::new();

    for scenario in &to_run {
        let report = match monte_carlo::run_monte_carlo(scenario, cli.runs, cli.seed) {
            Ok(r) => r,
            Err(e) => {
                error!(scenario = scenario.name, error = %e, "scenario setup failed");
                return ExitCode::FAILURE;
            }
        };

        if !cli.json {
            let status = if report.pass_rate >= PASS_THRESHOLD { "PASS" } else { "FAIL" };
            println!("  {:<38} {:>4}% {:>7.1}±{:<4.1} {:>7.1} {:>5.0} {:>5.0} {:>5.0} {:>9.1} {:>5.0}ms  {}",
                report.label,
                (report.pass_rate * 100.0) as u32,
                report.creator_win_rate.mean * 100.0,
                report.creator_win_rate.margin() * 100.0,
                report.mean_ticks.mean,
                report.knockout_share.mean * 100.0,
                report.finisher_share.mean * 100.0,
                report.timeout_share.mean * 100.0,
                report.fallbacks.mean,
                report.elapsed_ms.mean,
                status,
            );
        }

        mc_reports.push(report);
    }

    let suite_elapsed = suite_start.elapsed();

    // ─── Summary ────────────────────────────────────────────────────────

    let total = mc_reports.len();
    let passed = mc_reports.iter().filter(|r| r.pass_rate >= PASS_THRESHOLD).count();
    let failed = total - passed;
    let max_conservation_error = mc_reports.iter()
        .map(|r| r.conservation_error.max)
        .fold(0.0_f64, f64::max);

    if !cli.json {
        println!("  {}", "-".repeat(104));
        println!("  Total: {}  Passed: {}  Failed: {}  Suite time: {:.1}s",
            total, passed, failed, suite_elapsed.as_secs_f64());
        println!("  Max conservation error: {:.2e}\n", max_conservation_error);
    }

    // ─── Write JSON Report ──────────────────────────────────────────────

    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let timestamp = format!("{}", ts);

    let report = BenchReport {
        timestamp: timestamp.clone(),
        version: env!("CARGO_PKG_VERSION"),
        prng: "ChaCha8Rng",
        n_runs_per_scenario: cli.runs,
        base_seed: cli.seed,
        summary: Summary {
            total,
            passed,
            failed,
            pass_rate: passed as f64 / total as f64,
        },
        max_conservation_error,
        scenarios: mc_reports,
    };

    let json = match serde_json::to_string_pretty(&report) {
        Ok(j) => j,
        Err(e) => {
            error!(error = %e, "report serialization failed");
            return ExitCode::FAILURE;
        }
    };

    if cli.json {
        println!("{json}");
    } else {
        let dir = std::path::Path::new("benchmark-results");
        let path = dir.join(format!("bench-{}.json", timestamp));
        match std::fs::create_dir_all(dir).and_then(|_| std::fs::write(&path, &json)) {
            Ok(()) => {
                info!(path = %path.display(), "report written");
                println!("  Results saved to: {}\n", path.display());
            }
            Err(e) => error!(path = %path.display(), error = %e, "failed to write report"),
        }
    }

    if failed > 0 {
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
