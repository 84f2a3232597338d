use ant_colony_core::colony::Colony;
use ant_colony_core::config::{PolicyKind, SimConfig};
use std::time::{Duration, Instant};

fn timed_run(config: SimConfig, ticks: u64) -> (Duration, Colony) {
    let mut colony = Colony::new(config);
    let start = Instant::now();
    for _ in 0..ticks {
        colony.tick();
    }
    (start.elapsed(), colony)
}

fn main() {
    let population = 3000;
    let ticks = 200;
    println!("Benchmarking serial vs parallel perception with {population} ants");

    for kind in [PolicyKind::Heuristic, PolicyKind::Network] {
        let config = SimConfig {
            world_width: 2400.0,
            world_height: 1600.0,
            initial_population: population,
            target_population: population,
            max_population: population,
            policy_kind: kind,
            seed: 42,
            ..SimConfig::default()
        };
        let parallel_config = SimConfig {
            parallel_perception: true,
            ..config.clone()
        };

        let (serial_time, serial) = timed_run(config, ticks);
        let (parallel_time, parallel) = timed_run(parallel_config, ticks);

        println!("=== {kind:?} policy ===");
        println!("Serial:   {:?} total, {:?} per tick", serial_time, serial_time / ticks as u32);
        println!("Parallel: {:?} total, {:?} per tick", parallel_time, parallel_time / ticks as u32);
        println!(
            "Speedup:  {:.2}x",
            serial_time.as_secs_f64() / parallel_time.as_secs_f64().max(f64::EPSILON)
        );
        let identical = serial.agent_snapshots() == parallel.agent_snapshots();
        println!("Identical final state: {identical}");
    }
}
