//! SkyWatch Simulator CLI
//!
//! Run the drone swarm under one or all anomaly scenarios.

use anyhow::{bail, Context, Result};
use clap::Parser;
use skywatch_core::SimConfig;
use skywatch_env::OsEntropy;
use skywatch_sim::exporter::export_run;
use skywatch_sim::scenarios::ScenarioId;
use skywatch_sim::{ScenarioResult, ScenarioRunner};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// SkyWatch drone swarm simulator
#[derive(Parser, Debug)]
#[command(name = "skywatch-sim")]
#[command(about = "Simulate a drone swarm covering a field of spreading anomalies", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Number of drones
    #[arg(short, long, default_value = "7")]
    agents: usize,

    /// Scenario to run (no_anomalies, sparse_anomalies, normal, heavy_pollution, rapidly_spreading, all)
    #[arg(short = 'S', long, default_value = "normal")]
    scenario: String,

    /// Simulated duration in seconds
    #[arg(short, long, default_value = "300")]
    duration: f64,

    /// JSON configuration file applied before the scenario preset
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for CSV and JSON exports
    #[arg(long)]
    export: Option<PathBuf>,

    /// JSON output for scripting
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn load_config(path: Option<&PathBuf>) -> Result<SimConfig> {
    let Some(path) = path else {
        return Ok(SimConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config = SimConfig::from_json_str(&text)
        .with_context(|| format!("parsing config {}", path.display()))?;
    Ok(config)
}

fn parse_scenarios(name: &str) -> Result<Vec<ScenarioId>> {
    if name == "all" {
        return Ok(ScenarioId::all());
    }
    match name.parse::<ScenarioId>() {
        Ok(scenario) => Ok(vec![scenario]),
        Err(e) => {
            let available: Vec<&str> = ScenarioId::all().iter().map(|s| s.name()).collect();
            bail!("{} (available: {}, all)", e, available.join(", "))
        }
    }
}

fn log_result(result: &ScenarioResult) {
    let m = &result.final_metrics;
    info!("✓ {} (seed={})", result.scenario.name(), result.seed);
    info!(
        "    t={:.1}s ticks={} anomalies={} peak_area={:.2}%",
        result.final_time_secs,
        result.total_ticks,
        result.live_anomalies,
        result.peak_field_area * 100.0
    );
    info!(
        "    detections={} uploaded={} retasks={} coverage={:.1}%",
        result.detections,
        result.uploads,
        result.retasks,
        m.agent_coverage_fraction * 100.0
    );
    info!(
        "    roaming={} sensing={} returning={} charging={}",
        m.roaming_agents, m.sensing_agents, m.returning_agents, m.charging_agents
    );
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging; RUST_LOG overrides the default level
    let level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    if !args.json {
        info!("SkyWatch Simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    let scenarios = parse_scenarios(&args.scenario)?;
    let base_config = load_config(args.config.as_ref())?;

    let seed = if args.seed == 0 {
        OsEntropy::new().draw_seed()
    } else {
        args.seed
    };

    let runner = ScenarioRunner::new(seed, args.agents)
        .with_duration(args.duration)
        .with_config(base_config);

    let mut all_results = Vec::new();
    for scenario in &scenarios {
        if !args.json {
            info!("▶ {}: {}", scenario.name(), scenario.description());
        }

        let (result, engine) = runner
            .execute(*scenario)
            .with_context(|| format!("invalid configuration for {}", scenario))?;

        if let Some(dir) = &args.export {
            let paths = export_run(dir, *scenario, &engine)
                .with_context(|| format!("exporting {} to {}", scenario, dir.display()))?;
            info!(
                "Exported {}, {}, {}",
                paths.metrics_csv.display(),
                paths.measurements_csv.display(),
                paths.run_json.display()
            );
        }

        if !args.json {
            log_result(&result);
        }
        all_results.push(result);
    }

    if args.json {
        let summary = serde_json::json!({
            "seed": seed,
            "agents": args.agents,
            "duration_secs": args.duration,
            "results": all_results.iter().map(|r| {
                serde_json::json!({
                    "scenario": r.scenario.name(),
                    "ticks": r.total_ticks,
                    "time_secs": r.final_time_secs,
                    "live_anomalies": r.live_anomalies,
                    "detections": r.detections,
                    "uploads": r.uploads,
                    "retasks": r.retasks,
                    "peak_field_area": r.peak_field_area,
                    "final_metrics": r.final_metrics,
                })
            }).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        info!("✅ {} scenario run(s) complete", all_results.len());
    }

    Ok(())
}
