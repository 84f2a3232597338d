use super::metrics::{TickReport, TickTimings};
use super::Colony;
use crate::agent::{Agent, AgentEnv, AntState};
use crate::constants::MAX_FOOD_STORED;
use crate::fitness::FitnessWeights;
use crate::food::place_food_sources;
use crate::geom::distance;
use crate::maze::generate_obstacles;
use crate::obstacle::ObstacleSet;
use crate::perception::{perceive, Perception, WorldView};
use crate::pheromone::{ChannelRates, PheromoneField};
use crate::policy::Decision;
use crate::rng::{create_rng, derive_agent_rng};
use crate::spatial::{self, AgentLocation};
use rayon::prelude::*;
use rstar::RTree;
use std::time::Instant;
use tracing::{debug, info};

/// Per-tick tallies from the merge phase.
#[derive(Default)]
struct MergeTally {
    pickups: usize,
    deliveries: usize,
    collisions: usize,
}

impl Colony {
    /// Perceive and decide for every agent against the pre-move world.
    ///
    /// Each agent draws from its own stream derived from `(seed, tick, id)`,
    /// so the serial and rayon paths produce the same plans.
    fn sense_and_decide(&self, tree: &RTree<AgentLocation>) -> Vec<(Perception, Decision)> {
        let view = WorldView {
            config: &self.config,
            field: &self.field,
            obstacles: &self.obstacles,
            food: &self.food,
            index: tree,
            home: self.config.home(),
        };
        let seed = self.config.seed;
        let tick = self.tick_index;
        let think = |agent: &Agent| {
            if !agent.is_alive() {
                return (Perception::blank(), Decision::default());
            }
            let perception = perceive(&view, agent);
            let mut rng = derive_agent_rng(seed, tick, agent.id);
            let decision = agent.decide(&perception, &mut rng);
            (perception, decision)
        };
        if self.config.parallel_perception {
            self.agents.par_iter().map(think).collect()
        } else {
            self.agents.iter().map(think).collect()
        }
    }

    /// Serial phase: movement, deposits, then pickup and delivery.
    fn merge_phase(&mut self, plans: Vec<(Perception, Decision)>) -> MergeTally {
        let home = self.config.home();
        let mut tally = MergeTally::default();
        let mut env = AgentEnv {
            config: &self.config,
            field: &mut self.field,
            obstacles: &self.obstacles,
            home,
        };
        for (agent, (perception, decision)) in self.agents.iter_mut().zip(plans) {
            let outcome = agent.update(&perception, decision, &mut env, &mut self.rng);
            if outcome.collided {
                tally.collisions += 1;
            }
            if outcome.died {
                continue;
            }
            match agent.state() {
                AntState::Foraging => {
                    let pickup_radius = env.config.pickup_radius;
                    let source = self
                        .food
                        .iter_mut()
                        .filter(|f| f.is_active())
                        .map(|f| (distance(f.position, agent.position), f))
                        .filter(|(d, _)| *d <= pickup_radius)
                        .min_by(|a, b| a.0.total_cmp(&b.0))
                        .map(|(_, f)| f);
                    if let Some(source) = source {
                        if source.take_one(env.config.food_respawn_ticks) && agent.pick_up(home) {
                            tally.pickups += 1;
                        }
                    }
                }
                AntState::Returning => {
                    if distance(agent.position, home) <= env.config.colony_radius
                        && agent.deliver(env.config.delivery_energy_bonus, env.config.max_energy)
                    {
                        tally.deliveries += 1;
                        self.food_stored = (self.food_stored + 1).min(MAX_FOOD_STORED);
                    }
                }
                AntState::Idle | AntState::Dead => {}
            }
        }
        tally
    }

    /// Record every dead ant in the evolution engine, then compact.
    fn retire_dead(&mut self) -> usize {
        if self.agents.iter().all(Agent::is_alive) {
            return 0;
        }
        let weights = FitnessWeights::from_config(&self.config);
        let mut retired = 0;
        for agent in self.agents.iter().filter(|a| !a.is_alive()) {
            let score = agent.fitness.score(&weights);
            let kept = self.evolution.record(agent.genome().clone(), score);
            debug!(agent = agent.id, age = agent.age, score, kept, "ant retired");
            retired += 1;
        }
        self.agents.retain(Agent::is_alive);
        self.total_deaths += retired as u64;
        retired
    }

    fn spawn_replacements(&mut self) -> usize {
        let target = self
            .config
            .effective_target_population()
            .min(self.population_cap());
        let mut births = 0;
        while self.agents.len() < target {
            if self.spawn_agent().is_none() {
                break;
            }
            births += 1;
        }
        births
    }

    /// Spend stored food on extra ants beyond the replacement target.
    fn grow_from_store(&mut self) -> usize {
        if !self
            .tick_index
            .is_multiple_of(self.config.growth_interval_ticks)
        {
            return 0;
        }
        let cost = self.config.spawn_food_cost;
        let mut births = 0;
        for _ in 0..self.config.growth_batch {
            if self.food_stored < self.config.growth_food_threshold || self.food_stored < cost {
                break;
            }
            if self.spawn_agent().is_none() {
                break;
            }
            self.food_stored -= cost;
            births += 1;
        }
        if births > 0 {
            debug!(births, food_stored = self.food_stored, "colony grew");
        }
        births
    }

    fn respawn_food(&mut self) -> usize {
        self.food
            .iter_mut()
            .map(|f| f.tick_respawn())
            .filter(|&refilled| refilled)
            .count()
    }

    pub fn tick(&mut self) -> TickReport {
        let total_start = Instant::now();
        self.tick_index = self.tick_index.saturating_add(1);

        self.field
            .decay_channels(ChannelRates::from_config(&self.config));

        let t0 = Instant::now();
        let tree = spatial::build_index(&self.agents);
        let spatial_build_us = t0.elapsed().as_micros() as u64;

        let t1 = Instant::now();
        let plans = self.sense_and_decide(&tree);
        let perception_us = t1.elapsed().as_micros() as u64;

        let t2 = Instant::now();
        let tally = self.merge_phase(plans);
        let retired = self.retire_dead();
        let births = self.spawn_replacements() + self.grow_from_store();
        let food_respawned = self.respawn_food();
        self.total_delivered += tally.deliveries as u64;
        let population = self.agents.len();
        let generation_advanced = self.evolution.on_tick(retired, population);
        self.record_history(tally.deliveries);
        let merge_us = t2.elapsed().as_micros() as u64;

        TickReport {
            tick: self.tick_index,
            births,
            deaths: retired,
            pickups: tally.pickups,
            deliveries: tally.deliveries,
            collisions: tally.collisions,
            food_respawned,
            population,
            generation: self.evolution.generation(),
            generation_advanced,
            timings: TickTimings {
                spatial_build_us,
                perception_us,
                merge_us,
                total_us: total_start.elapsed().as_micros() as u64,
            },
        }
    }

    /// Rebuild the world from the config, keeping the evolution engine.
    pub fn reset(&mut self) {
        self.resets += 1;
        self.rng = create_rng(self.config.seed.wrapping_add(self.resets));
        self.field = PheromoneField::from_config(&self.config);
        self.obstacles = ObstacleSet::new(generate_obstacles(&self.config, &mut self.rng));
        self.food = place_food_sources(&self.config, &self.obstacles, 0, &mut self.rng);
        self.next_food_id = self.food.len() as u32;
        self.agents.clear();
        self.tick_index = 0;
        self.food_stored = 0;
        self.history.clear();
        self.spawn_initial_population();
        info!(
            generation = self.evolution.generation(),
            elites = self.evolution.pool().len(),
            population = self.agents.len(),
            "colony reset"
        );
    }

    /// New wall layout. Ants and food caught inside walls are moved out.
    pub fn regenerate_obstacles(&mut self) {
        self.obstacles = ObstacleSet::new(generate_obstacles(&self.config, &mut self.rng));
        let agent_radius = self.config.agent_radius;
        for agent in &mut self.agents {
            agent.relocate_out_of(&self.obstacles, agent_radius);
        }
        let mut moved_food = 0;
        for source in &mut self.food {
            if self.obstacles.is_colliding(source.position, source.radius) {
                source.position = self.obstacles.push_out(source.position, source.radius);
                moved_food += 1;
            }
        }
        info!(
            walls = self.obstacles.len(),
            moved_food, "obstacles regenerated"
        );
    }
}
