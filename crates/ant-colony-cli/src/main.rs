use ant_colony_core::colony::Colony;
use ant_colony_core::config::{PolicyKind, SimConfig};
use ant_colony_core::evolution::EvolutionEngine;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const WARMUP_TICKS: u64 = 10;
const BENCHMARK_TICKS: u64 = 300;
/// Ticks per second the UI loop expects the engine to sustain.
const TARGET_TPS: f64 = 60.0;

#[derive(Parser)]
#[command(name = "ant-colony")]
#[command(about = "Headless ant colony simulation and learning engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a colony headless, optionally resuming a saved elite pool
    Run {
        /// Path to config file (JSON); defaults are used when omitted
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output directory for the run summary (optional)
        #[arg(long)]
        out: Option<PathBuf>,

        /// Number of ticks to run
        #[arg(long, default_value_t = 18_000)]
        steps: u64,

        /// Record colony stats every N ticks
        #[arg(long, default_value_t = 600)]
        sample_every: u64,

        /// Elite pool JSON to resume from; missing or malformed files start fresh
        #[arg(long)]
        load_pool: Option<PathBuf>,

        /// Where to write the elite pool when the run ends
        #[arg(long)]
        save_pool: Option<PathBuf>,
    },
    /// Measure tick throughput across population sizes, policy kinds and
    /// serial/parallel perception
    Benchmark,
    /// Dump the default configuration to stdout
    DumpDefaultConfig,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn load_config(path: Option<&Path>) -> Result<SimConfig> {
    let Some(path) = path else {
        return Ok(SimConfig::default());
    };
    let file = File::open(path).context("failed to open config file")?;
    let config: SimConfig =
        serde_json::from_reader(BufReader::new(file)).context("failed to parse config")?;
    config.validate().context("Config validation error")?;
    Ok(config)
}

fn load_pool(path: Option<&Path>, config: &SimConfig) -> EvolutionEngine {
    let json = path.and_then(|p| match std::fs::read_to_string(p) {
        Ok(json) => Some(json),
        Err(e) => {
            warn!(path = %p.display(), error = %e, "pool file unreadable, starting fresh");
            None
        }
    });
    EvolutionEngine::restore_from_json(json.as_deref(), config)
}

/// Every (policy, population, parallel perception) combination measured.
fn benchmark_cases() -> Vec<(PolicyKind, usize, bool)> {
    let mut cases = Vec::new();
    for kind in [PolicyKind::Heuristic, PolicyKind::Network] {
        for population in [100, 500, 2000] {
            for parallel in [false, true] {
                cases.push((kind, population, parallel));
            }
        }
    }
    cases
}

fn benchmark_config(population: usize, policy_kind: PolicyKind, parallel: bool) -> SimConfig {
    SimConfig {
        initial_population: population,
        target_population: population,
        min_population: 1,
        max_population: population,
        policy_kind,
        parallel_perception: parallel,
        ..SimConfig::default()
    }
}

fn run_benchmark(population: usize, policy_kind: PolicyKind, parallel: bool) -> Result<()> {
    let config = benchmark_config(population, policy_kind, parallel);
    let mut colony = Colony::try_new(config).context("Benchmark config validation error")?;

    for _ in 0..WARMUP_TICKS {
        colony.tick();
    }

    let mut total_spatial = 0u64;
    let mut total_perception = 0u64;
    let mut total_merge = 0u64;
    let mut total_time = 0u64;
    for _ in 0..BENCHMARK_TICKS {
        let timings = colony.tick().timings;
        total_spatial += timings.spatial_build_us;
        total_perception += timings.perception_us;
        total_merge += timings.merge_us;
        total_time += timings.total_us;
    }

    let avg_tick_us = total_time as f64 / BENCHMARK_TICKS as f64;
    let ticks_per_sec = 1_000_000.0 / avg_tick_us.max(1.0);
    let mode = if parallel { "parallel" } else { "serial" };
    println!("--- {population} ants, {policy_kind:?} policy, {mode} perception ---");
    println!("  Avg tick:      {avg_tick_us:.0} us ({ticks_per_sec:.1} ticks/sec)");
    println!(
        "  Breakdown:     spatial={:.0} us, perception={:.0} us, merge={:.0} us",
        total_spatial as f64 / BENCHMARK_TICKS as f64,
        total_perception as f64 / BENCHMARK_TICKS as f64,
        total_merge as f64 / BENCHMARK_TICKS as f64,
    );
    let verdict = if ticks_per_sec >= TARGET_TPS {
        "GO"
    } else {
        "NO-GO"
    };
    println!("  Verdict:       {verdict} (target: >={TARGET_TPS} ticks/sec)");
    let stats = colony.stats();
    println!(
        "  Colony:        generation {}, delivered {}, elites {}",
        stats.generation, stats.total_delivered, stats.elite_count
    );
    println!();
    Ok(())
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::DumpDefaultConfig => {
            let config = SimConfig::default();
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::Benchmark => {
            if cfg!(debug_assertions) {
                eprintln!("WARNING: running in debug mode. Results are not representative.");
                eprintln!("         Use: cargo run -p ant-colony-cli --release -- benchmark");
                eprintln!();
            }
            println!("=== Ant Colony Throughput ===");
            println!("Warmup: {WARMUP_TICKS} ticks, Benchmark: {BENCHMARK_TICKS} ticks");
            println!();
            for (kind, population, parallel) in benchmark_cases() {
                run_benchmark(population, kind, parallel)?;
            }
        }
        Commands::Run {
            config,
            out,
            steps,
            sample_every,
            load_pool: pool_in,
            save_pool,
        } => {
            let sim_config = load_config(config.as_deref())?;
            let engine = load_pool(pool_in.as_deref(), &sim_config);
            info!(
                generation = engine.generation(),
                elites = engine.pool().len(),
                "evolution engine ready"
            );
            let mut colony = Colony::try_with_evolution(sim_config, engine)
                .context("failed to initialize colony")?;

            println!("Simulating for {steps} ticks...");
            let summary = colony
                .try_run(steps, sample_every)
                .context("invalid run parameters")?;

            if let Some(path) = save_pool {
                let json = colony
                    .evolution()
                    .to_json()
                    .context("failed to serialize elite pool")?;
                std::fs::write(&path, json).context("failed to write elite pool")?;
                println!("Elite pool saved to {:?}", path);
            }

            if let Some(out_dir) = out {
                std::fs::create_dir_all(&out_dir).context("failed to create output directory")?;
                let summary_path = out_dir.join("summary.json");
                let file = File::create(summary_path).context("failed to create summary file")?;
                serde_json::to_writer_pretty(file, &summary).context("failed to write summary")?;
                println!("Run complete. Results saved to {:?}", out_dir);
            } else {
                let stats = &summary.final_stats;
                println!(
                    "Run complete. Generation {}, population {}, delivered {}, best fitness {:.1}",
                    stats.generation, stats.population, stats.total_delivered, stats.best_fitness_ever
                );
            }
        }
    }
    Ok(())
}
