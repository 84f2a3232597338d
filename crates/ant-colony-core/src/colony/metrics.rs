use super::Colony;
use crate::agent::AntState;
use crate::fitness::FitnessWeights;
use crate::pheromone::Channel;
use serde::{Deserialize, Serialize};
use std::{error::Error, fmt};

pub const STATS_SCHEMA_VERSION: u32 = 1;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TickTimings {
    pub spatial_build_us: u64,
    pub perception_us: u64,
    pub merge_us: u64,
    pub total_us: u64,
}

/// What happened during one `Colony::tick`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    pub tick: u64,
    pub births: usize,
    pub deaths: usize,
    pub pickups: usize,
    pub deliveries: usize,
    pub collisions: usize,
    pub food_respawned: usize,
    pub population: usize,
    pub generation: u64,
    pub generation_advanced: bool,
    pub timings: TickTimings,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrailTotals {
    pub to_food: f64,
    pub to_home: f64,
    pub danger: f64,
}

fn default_schema_version() -> u32 {
    STATS_SCHEMA_VERSION
}

/// Colony-wide counters for front ends.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColonyStats {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub tick: u64,
    pub population: usize,
    pub foraging: usize,
    pub returning: usize,
    pub idle: usize,
    pub carrying: usize,
    pub mean_energy: f32,
    pub food_stored: u32,
    pub total_delivered: u64,
    pub total_births: u64,
    pub total_deaths: u64,
    pub generation: u64,
    pub elite_count: usize,
    pub best_elite_fitness: f32,
    pub best_fitness_ever: f32,
    pub last_fitness: Option<f32>,
    pub active_food_sources: usize,
    pub trail_totals: TrailTotals,
    /// Mean current fitness of live ants.
    pub mean_fitness: f32,
    /// Mean exploration bias of the last decisions of live ants.
    pub exploration: f32,
    /// `1 - exploration`.
    pub cooperation: f32,
    /// Mean pairwise gene distance in the elite pool, in `[0, 1]`.
    pub diversity: f32,
    /// Mean elite fitness relative to saturation, in `[0, 1]`.
    pub knowledge: f32,
}

/// One tick of the colony's learning history.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LearningSample {
    pub tick: u64,
    pub food_delivered: usize,
    pub mean_fitness: f32,
    pub population: usize,
    pub exploration: f32,
}

/// Exploration reported when no ant is alive.
const NEUTRAL_EXPLORATION: f32 = 0.5;

/// Serializable view of one ant for renderers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub id: u32,
    pub x: f64,
    pub y: f64,
    pub heading: f64,
    pub state: AntState,
    pub energy: f32,
    pub carrying: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunSummary {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub ticks: u64,
    pub sample_every: u64,
    pub samples: Vec<ColonyStats>,
    #[serde(default)]
    pub total_deliveries: u64,
    #[serde(default)]
    pub generations_advanced: u64,
    pub final_stats: ColonyStats,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunError {
    InvalidSampleEvery,
    TooManyTicks { max: u64, actual: u64 },
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::InvalidSampleEvery => write!(f, "sample_every must be positive"),
            RunError::TooManyTicks { max, actual } => {
                write!(f, "ticks ({actual}) exceed supported maximum ({max})")
            }
        }
    }
}

impl Error for RunError {}

impl Colony {
    pub const MAX_RUN_TICKS: u64 = 10_000_000;

    pub fn stats(&self) -> ColonyStats {
        let mut stats = ColonyStats {
            schema_version: STATS_SCHEMA_VERSION,
            tick: self.tick_index,
            food_stored: self.food_stored,
            total_delivered: self.total_delivered,
            total_births: self.total_births,
            total_deaths: self.total_deaths,
            generation: self.evolution.generation(),
            elite_count: self.evolution.pool().len(),
            best_elite_fitness: self.evolution.pool().best().map_or(0.0, |e| e.fitness),
            best_fitness_ever: self.evolution.stats().best_fitness_ever,
            last_fitness: self.evolution.stats().last_fitness,
            active_food_sources: self.food.iter().filter(|f| f.is_active()).count(),
            trail_totals: TrailTotals {
                to_food: self.field.total(Channel::ToFood),
                to_home: self.field.total(Channel::ToHome),
                danger: self.field.total(Channel::Danger),
            },
            ..ColonyStats::default()
        };
        let (mean_fitness, exploration) = self.learning_means();
        stats.mean_fitness = mean_fitness;
        stats.exploration = exploration;
        stats.cooperation = 1.0 - exploration;
        stats.diversity = self.evolution.pool().diversity();
        stats.knowledge = self.evolution.knowledge();
        let mut energy_sum = 0.0f32;
        for agent in self.agents.iter().filter(|a| a.is_alive()) {
            stats.population += 1;
            energy_sum += agent.energy;
            match agent.state() {
                AntState::Foraging => stats.foraging += 1,
                AntState::Returning => stats.returning += 1,
                AntState::Idle => stats.idle += 1,
                AntState::Dead => {}
            }
            if agent.carrying {
                stats.carrying += 1;
            }
        }
        if stats.population > 0 {
            stats.mean_energy = energy_sum / stats.population as f32;
        }
        stats
    }

    /// Mean live fitness and mean exploration bias.
    fn learning_means(&self) -> (f32, f32) {
        let weights = FitnessWeights::from_config(&self.config);
        let mut count = 0usize;
        let mut fitness = 0.0f32;
        let mut exploration = 0.0f64;
        for agent in self.agents.iter().filter(|a| a.is_alive()) {
            count += 1;
            fitness += agent.fitness.score(&weights);
            exploration += agent.last_decision.explore_bias;
        }
        if count == 0 {
            return (0.0, NEUTRAL_EXPLORATION);
        }
        (fitness / count as f32, (exploration / count as f64) as f32)
    }

    /// Append a learning sample, dropping the oldest at capacity.
    pub(crate) fn record_history(&mut self, food_delivered: usize) {
        let capacity = self.config.history_capacity;
        if capacity == 0 {
            return;
        }
        let (mean_fitness, exploration) = self.learning_means();
        if self.history.len() >= capacity {
            self.history.pop_front();
        }
        self.history.push_back(LearningSample {
            tick: self.tick_index,
            food_delivered,
            mean_fitness,
            population: self.population(),
            exploration,
        });
    }

    /// Learning samples, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &LearningSample> + '_ {
        self.history.iter()
    }

    pub fn agent_snapshots(&self) -> Vec<AgentSnapshot> {
        self.agents
            .iter()
            .filter(|a| a.is_alive())
            .map(|a| AgentSnapshot {
                id: a.id,
                x: a.position[0],
                y: a.position[1],
                heading: a.heading,
                state: a.state(),
                energy: a.energy,
                carrying: a.carrying,
            })
            .collect()
    }

    pub fn run(&mut self, ticks: u64, sample_every: u64) -> RunSummary {
        self.try_run(ticks, sample_every)
            .unwrap_or_else(|e| panic!("{e}"))
    }

    /// Tick `ticks` times, sampling stats every `sample_every` ticks and on
    /// the final tick.
    pub fn try_run(&mut self, ticks: u64, sample_every: u64) -> Result<RunSummary, RunError> {
        if sample_every == 0 {
            return Err(RunError::InvalidSampleEvery);
        }
        if ticks > Self::MAX_RUN_TICKS {
            return Err(RunError::TooManyTicks {
                max: Self::MAX_RUN_TICKS,
                actual: ticks,
            });
        }
        let mut samples = Vec::new();
        let mut total_deliveries = 0;
        let mut generations_advanced = 0;
        for step in 1..=ticks {
            let report = self.tick();
            total_deliveries += report.deliveries as u64;
            if report.generation_advanced {
                generations_advanced += 1;
            }
            if step % sample_every == 0 || step == ticks {
                samples.push(self.stats());
            }
        }
        Ok(RunSummary {
            schema_version: STATS_SCHEMA_VERSION,
            ticks,
            sample_every,
            samples,
            total_deliveries,
            generations_advanced,
            final_stats: self.stats(),
        })
    }
}
