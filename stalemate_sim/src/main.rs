//! Stalemate deadlock simulator CLI
//!
//! Run the naive, ordered, retry and banker scenarios in discrete or
//! concurrent mode and compare how each policy copes with contention.

use clap::{Parser, ValueEnum};
use stalemate_core::RunConfig;
use stalemate_sim::exporter::{self, MetricsFormat};
use stalemate_sim::render;
use stalemate_sim::scenarios::ScenarioId;
use stalemate_sim::{
    ContentionPreset, ExecutionMode, RunOutcome, ScenarioResult, ScenarioRunner, SeedSchedule, WorldConfig,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Report rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Human-readable transcript and summary
    Text,
    /// JSON report file
    Json,
}

/// Stalemate deadlock simulator
#[derive(Parser, Debug)]
#[command(name = "stalemate-sim")]
#[command(about = "Simulate deadlocks and compare prevention, recovery and avoidance", long_about = None)]
struct Args {
    /// Scenario to run (naive, ordered, retry, banker, all; aliases deadlock, prevention, recovery, avoidance)
    #[arg(default_value = "all")]
    scenario: String,

    /// Execution mode
    #[arg(short, long, value_enum, default_value_t = ExecutionMode::Discrete)]
    mode: ExecutionMode,

    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Number of consecutive seeds to run
    #[arg(long, default_value = "1")]
    seeds: usize,

    /// Number of processes (discrete mode)
    #[arg(short = 'p', long)]
    num_processes: Option<usize>,

    /// Number of resources (discrete mode)
    #[arg(short = 'r', long)]
    num_resources: Option<usize>,

    /// Number of resources of type A
    #[arg(long)]
    res_a: Option<usize>,

    /// Number of resources of type B
    #[arg(long)]
    res_b: Option<usize>,

    /// Number of resources of type C
    #[arg(long)]
    res_c: Option<usize>,

    /// Predefined contention level
    #[arg(long, value_enum)]
    contention: Option<ContentionPreset>,

    /// Deterministic three-process demo world
    #[arg(long)]
    demo: bool,

    /// Step budget of a discrete run
    #[arg(long, default_value = "50")]
    max_steps: u64,

    /// Steps a process holds each fresh grant
    #[arg(long, default_value = "0")]
    hold_steps: u32,

    /// Blocked steps before a retry attempt is abandoned
    #[arg(long, default_value = "2")]
    retry_timeout_steps: u32,

    /// Upper bound of the discrete backoff
    #[arg(long, default_value = "4")]
    backoff_steps: u32,

    /// Number of concurrent workers
    #[arg(short, long, default_value = "2", value_parser = clap::value_parser!(u64).range(1..))]
    workers: u64,

    /// Time each worker holds a resource (ms)
    #[arg(long, default_value = "800")]
    hold_ms: u64,

    /// Liveness deadline of the naive scenario (ms)
    #[arg(long, default_value = "5000")]
    deadlock_timeout_ms: u64,

    /// Bound on one acquisition attempt in retry mode (ms)
    #[arg(long, default_value = "1000")]
    retry_timeout_ms: u64,

    /// Give up after this many retries (default: never)
    #[arg(long)]
    max_retries: Option<u32>,

    /// Telemetry queue capacity (0 disables telemetry)
    #[arg(long, default_value = "64")]
    telemetry_capacity: usize,

    /// Log completed/total as workers finish
    #[arg(long)]
    progress: bool,

    /// Run concurrent scenarios on a virtual clock
    #[arg(long)]
    virtual_time: bool,

    /// Output as transcript (text) or JSON report file
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    output_format: OutputFormat,

    /// Report path for --output-format json (single run only)
    #[arg(long)]
    report_out: Option<PathBuf>,

    /// Save collected worker metrics to this path
    #[arg(long)]
    metrics_out: Option<PathBuf>,

    /// Format of --metrics-out
    #[arg(long, value_enum, default_value_t = MetricsFormat::Json)]
    metrics_format: MetricsFormat,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON summary for CI parsing
    #[arg(long)]
    json: bool,
}

impl Args {
    fn run_config(&self, seed: u64) -> RunConfig {
        RunConfig::default()
            .with_seed(seed)
            .with_workers(self.workers as usize)
            .with_hold_time(Duration::from_millis(self.hold_ms))
            .with_deadlock_timeout(Duration::from_millis(self.deadlock_timeout_ms))
            .with_retry_timeout(Duration::from_millis(self.retry_timeout_ms))
            .with_max_steps(self.max_steps)
            .with_hold_steps(self.hold_steps)
            .with_retry_steps(self.retry_timeout_steps, self.backoff_steps)
            .with_max_retries(self.max_retries)
            .with_telemetry_capacity(self.telemetry_capacity)
            .with_progress(self.progress)
    }

    fn world(&self) -> WorldConfig {
        WorldConfig {
            processes: self.num_processes,
            resources: self.num_resources,
            res_a: self.res_a,
            res_b: self.res_b,
            res_c: self.res_c,
            contention: self.contention,
            demo: self.demo,
        }
    }
}

/// Prints or saves the outcome of one run.
fn present(args: &Args, result: &ScenarioResult) {
    match args.output_format {
        OutputFormat::Text => {
            if args.json {
                return;
            }
            let text = match &result.outcome {
                RunOutcome::Discrete { report, .. } => render::discrete_transcript(report),
                RunOutcome::Concurrent(report) => render::concurrent_summary(report, result.scenario.name()),
            };
            println!("{}\n", text);
        }
        OutputFormat::Json => {
            let (path, written) = match &result.outcome {
                RunOutcome::Discrete { report, .. } => {
                    let path = report_path(args, &report.mode);
                    let written = exporter::write_report(report, &path);
                    (path, written)
                }
                RunOutcome::Concurrent(report) => {
                    let path = report_path(args, &report.mode);
                    let written = exporter::write_report(report, &path);
                    (path, written)
                }
            };
            match written {
                Ok(()) => info!("JSON report saved to {}", path.display()),
                Err(e) => error!("Failed to write report {}: {}", path.display(), e),
            }
        }
    }
}

fn report_path(args: &Args, mode: &str) -> PathBuf {
    args.report_out
        .clone()
        .unwrap_or_else(|| exporter::default_report_path(mode))
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Logging unavailable: {}", e);
    }

    if !args.json {
        info!("Stalemate deadlock simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    let scenarios = ScenarioId::select(&args.scenario).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        eprintln!("Available scenarios: naive, ordered, retry, banker, all");
        std::process::exit(1);
    });

    // Determine base seed
    let base_seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(42)
    } else {
        args.seed
    };

    if args.report_out.is_some() && scenarios.len() * args.seeds > 1 {
        eprintln!("Error: --report-out only supports a single scenario and seed");
        std::process::exit(1);
    }

    let world = args.world();
    let mut all_results: Vec<ScenarioResult> = Vec::new();
    let mut failed_count = 0;
    let mut collected = Vec::new();

    for seed in SeedSchedule::sweep(base_seed, args.seeds) {
        let runner = ScenarioRunner::new(args.run_config(seed), world.clone()).with_virtual_time(args.virtual_time);

        for scenario in &scenarios {
            if !args.json {
                info!("▶ {}: {}", scenario.name(), scenario.description());
            }
            let result = match runner.run(*scenario, args.mode) {
                Ok(result) => result,
                Err(e) => {
                    error!("✗ {} (seed={}) could not run: {}", scenario.name(), seed, e);
                    failed_count += 1;
                    continue;
                }
            };

            present(&args, &result);
            if let RunOutcome::Concurrent(report) = &result.outcome {
                collected.extend(report.metrics.iter().cloned());
            }

            if !args.json {
                if result.passed {
                    info!("✓ {} (seed={}) PASSED", scenario.name(), seed);
                } else {
                    error!(
                        "✗ {} (seed={}) FAILED: {}",
                        scenario.name(),
                        seed,
                        result.failure_reason.as_deref().unwrap_or("unknown")
                    );
                }
            }
            if !result.passed {
                failed_count += 1;
            }
            all_results.push(result);
        }
    }

    if let Some(path) = &args.metrics_out {
        match exporter::export_metrics(&collected, path, args.metrics_format) {
            Ok(true) => info!("Metrics exported to {} ({:?})", path.display(), args.metrics_format),
            Ok(false) => warn!("No metrics collected; {} not written", path.display()),
            Err(e) => {
                error!("Failed to export metrics to {}: {}", path.display(), e);
                failed_count += 1;
            }
        }
    }

    let total = all_results.len();
    let passed = all_results.iter().filter(|r| r.passed).count();

    if args.json {
        // JSON output for CI parsing
        let summary = serde_json::json!({
            "total": total,
            "passed": passed,
            "failed": failed_count,
            "results": all_results.iter().map(|r| {
                serde_json::json!({
                    "scenario": r.scenario.name(),
                    "mode": r.mode().to_string(),
                    "seed": r.seed,
                    "passed": r.passed,
                    "failure_reason": r.failure_reason,
                })
            }).collect::<Vec<_>>(),
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(text) => println!("{}", text),
            Err(e) => error!("Failed to encode summary: {}", e),
        }
    } else {
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        if failed_count == 0 {
            info!("✅ All {} scenario runs held their guarantees", total);
        } else {
            error!("❌ {} scenario runs failed", failed_count);
            for result in all_results.iter().filter(|r| !r.passed) {
                error!(
                    "  - {} seed={}: {}",
                    result.scenario.name(),
                    result.seed,
                    result.failure_reason.as_deref().unwrap_or("unknown")
                );
            }
        }
    }

    // Exit with proper code for CI
    if failed_count > 0 {
        std::process::exit(1);
    }
}
