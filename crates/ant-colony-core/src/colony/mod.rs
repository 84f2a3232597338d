pub mod lifecycle;
pub mod metrics;

pub use metrics::*;

use crate::agent::Agent;
use crate::config::{PolicyKind, SimConfig, SimConfigError};
use crate::constants::MAX_TOTAL_AGENTS;
use crate::evolution::EvolutionEngine;
use crate::food::{place_food_sources, FoodSource};
use crate::geom::Vec2;
use crate::maze::generate_obstacles;
use crate::obstacle::ObstacleSet;
use crate::pheromone::PheromoneField;
use crate::rng::create_rng;
use rand::Rng;
use rand_chacha::ChaCha12Rng;
use std::collections::VecDeque;
use std::f64::consts::PI;
use std::{error::Error, fmt};
use tracing::info;

/// The colony owns the world: field, walls, food, ants and the evolution engine.
pub struct Colony {
    pub(crate) agents: Vec<Agent>,
    pub(crate) config: SimConfig,
    pub(crate) field: PheromoneField,
    pub(crate) obstacles: ObstacleSet,
    pub(crate) food: Vec<FoodSource>,
    pub(crate) evolution: EvolutionEngine,
    pub(crate) rng: ChaCha12Rng,
    pub(crate) tick_index: u64,
    pub(crate) next_agent_id: u32,
    pub(crate) next_food_id: u32,
    pub(crate) food_stored: u32,
    pub(crate) total_delivered: u64,
    pub(crate) total_births: u64,
    pub(crate) total_deaths: u64,
    pub(crate) resets: u64,
    pub(crate) history: VecDeque<LearningSample>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColonyInitError {
    Config(SimConfigError),
    PolicyKindMismatch {
        config: PolicyKind,
        engine: PolicyKind,
    },
}

impl fmt::Display for ColonyInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColonyInitError::Config(e) => write!(f, "{}", e),
            ColonyInitError::PolicyKindMismatch { config, engine } => write!(
                f,
                "evolution engine evolves {engine:?} policies but the config selects {config:?}"
            ),
        }
    }
}

impl From<SimConfigError> for ColonyInitError {
    fn from(err: SimConfigError) -> Self {
        ColonyInitError::Config(err)
    }
}

impl Error for ColonyInitError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ColonyInitError::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl Colony {
    pub fn new(config: SimConfig) -> Self {
        Self::try_new(config).unwrap_or_else(|e| panic!("{e}"))
    }

    pub fn try_new(config: SimConfig) -> Result<Self, ColonyInitError> {
        let engine = EvolutionEngine::new(&config);
        Self::try_with_evolution(config, engine)
    }

    /// Start from a previously trained evolution engine.
    pub fn with_evolution(config: SimConfig, engine: EvolutionEngine) -> Self {
        Self::try_with_evolution(config, engine).unwrap_or_else(|e| panic!("{e}"))
    }

    pub fn try_with_evolution(
        config: SimConfig,
        engine: EvolutionEngine,
    ) -> Result<Self, ColonyInitError> {
        config.validate()?;
        if engine.policy_kind() != config.policy_kind {
            return Err(ColonyInitError::PolicyKindMismatch {
                config: config.policy_kind,
                engine: engine.policy_kind(),
            });
        }
        let mut rng = create_rng(config.seed);
        let obstacles = ObstacleSet::new(generate_obstacles(&config, &mut rng));
        let food = place_food_sources(&config, &obstacles, 0, &mut rng);
        let next_food_id = food.len() as u32;
        let mut colony = Self {
            agents: Vec::with_capacity(config.max_population),
            field: PheromoneField::from_config(&config),
            obstacles,
            food,
            evolution: engine,
            rng,
            tick_index: 0,
            next_agent_id: 0,
            next_food_id,
            food_stored: 0,
            total_delivered: 0,
            total_births: 0,
            total_deaths: 0,
            resets: 0,
            history: VecDeque::with_capacity(config.history_capacity),
            config,
        };
        colony.spawn_initial_population();
        Ok(colony)
    }

    pub(crate) fn spawn_initial_population(&mut self) {
        for _ in 0..self.config.initial_population {
            if self.spawn_agent().is_none() {
                break;
            }
        }
    }

    pub(crate) fn population_cap(&self) -> usize {
        self.config.max_population.min(MAX_TOTAL_AGENTS)
    }

    /// Spawn one ant near home with a genome from the evolution engine.
    /// Returns `None` at the population cap or when ids run out.
    pub(crate) fn spawn_agent(&mut self) -> Option<u32> {
        if self.agents.len() >= self.population_cap() || self.next_agent_id == u32::MAX {
            return None;
        }
        let id = self.next_agent_id;
        self.next_agent_id += 1;

        let home = self.config.home();
        let theta = self.rng.random::<f64>() * 2.0 * PI;
        let radius = self.rng.random::<f64>().sqrt() * self.config.spawn_radius;
        let mut position = [home[0] + radius * theta.cos(), home[1] + radius * theta.sin()];
        if self
            .obstacles
            .is_colliding(position, self.config.agent_radius)
        {
            position = self.obstacles.push_out(position, self.config.agent_radius);
        }
        let heading = self.rng.random_range(-PI..PI);
        let genome = self.evolution.spawn_policy(&mut self.rng);
        self.agents
            .push(Agent::new(id, position, heading, genome, &self.config));
        self.total_births += 1;
        Some(id)
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn tick_index(&self) -> u64 {
        self.tick_index
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn agent(&self, id: u32) -> Option<&Agent> {
        self.agents.iter().find(|a| a.id == id)
    }

    pub fn field(&self) -> &PheromoneField {
        &self.field
    }

    pub fn obstacles(&self) -> &ObstacleSet {
        &self.obstacles
    }

    pub fn food_sources(&self) -> &[FoodSource] {
        &self.food
    }

    pub fn food_stored(&self) -> u32 {
        self.food_stored
    }

    pub fn evolution(&self) -> &EvolutionEngine {
        &self.evolution
    }

    /// Swap in another engine, e.g. one restored from disk.
    pub fn replace_evolution(&mut self, engine: EvolutionEngine) -> Result<(), ColonyInitError> {
        if engine.policy_kind() != self.config.policy_kind {
            return Err(ColonyInitError::PolicyKindMismatch {
                config: self.config.policy_kind,
                engine: engine.policy_kind(),
            });
        }
        self.evolution = engine;
        Ok(())
    }

    pub fn population(&self) -> usize {
        self.agents.iter().filter(|a| a.is_alive()).count()
    }

    /// Place an extra food source. The position is clamped into the world
    /// and moved out of walls; returns the new source id.
    pub fn add_food_source(&mut self, position: Vec2, amount: u32) -> u32 {
        let r = self.config.food_radius;
        let clamped = [
            position[0].clamp(r, (self.config.world_width - r).max(r)),
            position[1].clamp(r, (self.config.world_height - r).max(r)),
        ];
        let position = self.obstacles.push_out(clamped, r);
        let id = self.next_food_id;
        self.next_food_id = self.next_food_id.saturating_add(1);
        self.food
            .push(FoodSource::new(id, position, r, amount.max(1)));
        info!(id, x = position[0], y = position[1], amount, "food source added");
        id
    }
}
