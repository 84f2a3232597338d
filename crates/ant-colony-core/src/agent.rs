use crate::config::SimConfig;
use crate::constants::STUCK_STEP_DISTANCE;
use crate::fitness::FitnessTracker;
use crate::genome::Genome;
use crate::geom::{distance, heading_to, is_finite, length, turn_toward, unit, wrap_angle, Vec2};
use crate::obstacle::ObstacleSet;
use crate::perception::Perception;
use crate::pheromone::{Channel, PheromoneField};
use crate::policy::{Decision, Policy};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, PI};
use std::{error::Error, fmt};
use tracing::debug;

/// Strength of the outward nudge at home, fading to zero at `outward_bias_radius`.
const OUTWARD_BIAS_GAIN: f64 = 0.2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AntState {
    Foraging,
    Returning,
    Idle,
    Dead,
}

impl AntState {
    pub fn can_transition_to(self, next: AntState) -> bool {
        use AntState::*;
        matches!(
            (self, next),
            (Foraging, Returning)
                | (Foraging, Idle)
                | (Foraging, Dead)
                | (Returning, Foraging)
                | (Returning, Dead)
                | (Idle, Foraging)
                | (Idle, Dead)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IllegalTransition {
    pub from: AntState,
    pub to: AntState,
}

impl fmt::Display for IllegalTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "illegal ant state transition {:?} -> {:?}", self.from, self.to)
    }
}

impl Error for IllegalTransition {}

#[derive(Clone, Debug)]
struct StuckTracker {
    checkpoint: Vec2,
    window_ticks: u32,
    escape_attempts: u32,
}

impl StuckTracker {
    fn new(position: Vec2) -> Self {
        Self {
            checkpoint: position,
            window_ticks: 0,
            escape_attempts: 0,
        }
    }
}

/// Mutable world state an agent touches during the merge phase.
pub struct AgentEnv<'a> {
    pub config: &'a SimConfig,
    pub field: &'a mut PheromoneField,
    pub obstacles: &'a ObstacleSet,
    pub home: Vec2,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StepOutcome {
    pub distance: f64,
    pub collided: bool,
    pub died: bool,
}

#[derive(Clone, Debug)]
pub struct Agent {
    pub id: u32,
    pub position: Vec2,
    /// Radians.
    pub heading: f64,
    pub energy: f32,
    pub carrying: bool,
    pub(crate) state: AntState,
    genome: Genome,
    policy: Policy,
    pub fitness: FitnessTracker,
    stuck: StuckTracker,
    idle_remaining: u32,
    pub distance_since_home: f64,
    /// Ticks lived.
    pub age: u64,
    trip_started_at: u64,
    pub last_decision: Decision,
}

impl Agent {
    pub fn new(id: u32, position: Vec2, heading: f64, genome: Genome, config: &SimConfig) -> Self {
        let policy = Policy::from_genome(&genome);
        Self {
            id,
            position,
            heading: wrap_angle(heading),
            energy: config.max_energy,
            carrying: false,
            state: AntState::Foraging,
            genome,
            policy,
            fitness: FitnessTracker::default(),
            stuck: StuckTracker::new(position),
            idle_remaining: 0,
            distance_since_home: 0.0,
            age: 0,
            trip_started_at: 0,
            last_decision: Decision::default(),
        }
    }

    pub fn state(&self) -> AntState {
        self.state
    }

    pub fn is_alive(&self) -> bool {
        self.state != AntState::Dead
    }

    pub fn genome(&self) -> &Genome {
        &self.genome
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn idle_remaining(&self) -> u32 {
        self.idle_remaining
    }

    pub fn escape_attempts(&self) -> u32 {
        self.stuck.escape_attempts
    }

    pub fn transition(&mut self, next: AntState) -> Result<(), IllegalTransition> {
        if !self.state.can_transition_to(next) {
            return Err(IllegalTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }

    fn enter(&mut self, next: AntState) -> bool {
        match self.transition(next) {
            Ok(()) => true,
            Err(e) => {
                debug!(agent = self.id, error = %e, "state change rejected");
                false
            }
        }
    }

    /// Run the policy. Idle and dead agents hold still.
    pub fn decide<R: Rng + ?Sized>(&self, perception: &Perception, rng: &mut R) -> Decision {
        match self.state {
            AntState::Foraging | AntState::Returning => self.policy.decide(perception, rng),
            AntState::Idle | AntState::Dead => Decision::default(),
        }
    }

    /// Apply one tick: movement, deposits, stuck detection, energy.
    pub fn update<R: Rng + ?Sized>(
        &mut self,
        perception: &Perception,
        decision: Decision,
        env: &mut AgentEnv<'_>,
        rng: &mut R,
    ) -> StepOutcome {
        let mut outcome = StepOutcome::default();
        if !self.is_alive() {
            return outcome;
        }
        let cfg = env.config;
        self.age += 1;
        self.fitness.survival_ticks += 1;
        let decision = sanitize(decision);
        self.last_decision = decision;

        if self.state == AntState::Idle {
            self.idle_remaining = self.idle_remaining.saturating_sub(1);
            if self.idle_remaining == 0 {
                self.enter(AntState::Foraging);
                self.stuck = StuckTracker::new(self.position);
            }
        } else {
            self.move_step(perception, decision, env, &mut outcome);
            self.lay_trail(env, outcome.distance);
            self.check_stuck(cfg, env.home, rng);
            if self.state == AntState::Foraging && rng.random_bool(cfg.idle_probability) {
                self.begin_idle(cfg.idle_ticks);
            }
        }

        let drain =
            self.policy.base_drain(cfg) + cfg.movement_energy_cost * outcome.distance as f32;
        self.energy -= drain;
        self.fitness.energy_spent += drain;
        if self.energy <= 0.0 {
            self.energy = 0.0;
            if self.enter(AntState::Dead) {
                outcome.died = true;
                if cfg.deposit_danger_on_death {
                    env.field
                        .deposit(self.position, Channel::Danger, cfg.danger_deposit_amount);
                }
            }
        }
        outcome
    }

    fn goal_turn(&self, perception: &Perception, cfg: &SimConfig, home: Vec2) -> f64 {
        match self.state {
            AntState::Foraging => {
                if let Some(food) = perception.smelled_food {
                    let intensity = 1.0 - food.distance / cfg.smell_range;
                    let to_food = turn_toward(self.heading, heading_to(self.position, food.position));
                    return to_food * cfg.smell_strength * intensity.max(0.0);
                }
                let d = perception.home_distance;
                if d > 0.0 && d < cfg.outward_bias_radius {
                    let outward = turn_toward(self.heading, heading_to(home, self.position));
                    return outward * (1.0 - d / cfg.outward_bias_radius) * OUTWARD_BIAS_GAIN;
                }
                0.0
            }
            AntState::Returning => perception.home_turn * cfg.home_turn_rate,
            AntState::Idle | AntState::Dead => 0.0,
        }
    }

    fn move_step(
        &mut self,
        perception: &Perception,
        decision: Decision,
        env: &AgentEnv<'_>,
        outcome: &mut StepOutcome,
    ) {
        let cfg = env.config;
        let goal = self.goal_turn(perception, cfg, env.home);
        let steering =
            decision.turn + (1.0 - decision.explore_bias) * goal + danger_turn(perception, cfg);
        let steer_dir = unit(self.heading + steering);
        let repulsion = env
            .obstacles
            .repulsion_vector(self.position, cfg.wall_repel_range);
        let w = cfg.obstacle_weight;
        let blended = [
            w * repulsion[0] + (1.0 - w) * steer_dir[0],
            w * repulsion[1] + (1.0 - w) * steer_dir[1],
        ];
        if length(blended) > 1e-9 {
            self.heading = blended[1].atan2(blended[0]);
        } else {
            self.heading = wrap_angle(self.heading + steering);
        }

        let speed = self.policy.base_speed(cfg) * decision.speed_factor * cfg.tick_scale;
        let dir = unit(self.heading);
        let old = self.position;
        let mut next = [old[0] + dir[0] * speed, old[1] + dir[1] * speed];

        if env.obstacles.is_colliding(next, cfg.agent_radius) {
            next = env.obstacles.push_out(next, cfg.agent_radius);
            self.fitness.collisions += 1;
            outcome.collided = true;
            let away = env.obstacles.repulsion_vector(next, cfg.wall_repel_range);
            self.heading = if length(away) > 1e-9 {
                away[1].atan2(away[0])
            } else {
                wrap_angle(self.heading + PI)
            };
        }
        self.reflect_at_bounds(&mut next, cfg);

        if is_finite(next) {
            self.position = next;
        }
        let moved = distance(old, self.position);
        outcome.distance = moved;
        self.fitness.distance += moved;
        if moved < STUCK_STEP_DISTANCE {
            self.fitness.stuck_ticks += 1;
        }
        if distance(self.position, env.home) <= cfg.colony_radius {
            self.distance_since_home = 0.0;
            if self.state == AntState::Foraging {
                self.trip_started_at = self.age;
            }
        } else {
            self.distance_since_home += moved;
        }
    }

    fn reflect_at_bounds(&mut self, p: &mut Vec2, cfg: &SimConfig) {
        let rx = cfg.agent_radius.min(cfg.world_width * 0.5);
        let ry = cfg.agent_radius.min(cfg.world_height * 0.5);
        if p[0] < rx {
            p[0] = rx;
            self.heading = PI - self.heading;
        } else if p[0] > cfg.world_width - rx {
            p[0] = cfg.world_width - rx;
            self.heading = PI - self.heading;
        }
        if p[1] < ry {
            p[1] = ry;
            self.heading = -self.heading;
        } else if p[1] > cfg.world_height - ry {
            p[1] = cfg.world_height - ry;
            self.heading = -self.heading;
        }
        self.heading = wrap_angle(self.heading);
    }

    fn lay_trail(&mut self, env: &mut AgentEnv<'_>, moved: f64) {
        let cfg = env.config;
        if moved <= 0.0 || distance(self.position, env.home) <= cfg.home_no_deposit_radius {
            return;
        }
        let base = cfg.trail_deposit_amount * self.policy.deposit_strength() * moved as f32;
        match self.state {
            AntState::Foraging => {
                let fade = (-cfg.home_trail_distance_decay * self.distance_since_home).exp();
                env.field
                    .deposit(self.position, Channel::ToHome, base * fade as f32);
            }
            AntState::Returning => env.field.deposit(self.position, Channel::ToFood, base),
            AntState::Idle | AntState::Dead => {}
        }
    }

    /// Escape attempts are capped at `max_escape_attempts`: a forager then
    /// rests, a returner heads straight home and starts counting again.
    fn check_stuck<R: Rng + ?Sized>(&mut self, cfg: &SimConfig, home: Vec2, rng: &mut R) {
        self.stuck.window_ticks += 1;
        if self.stuck.window_ticks < cfg.stuck_window_ticks {
            return;
        }
        let moved = distance(self.stuck.checkpoint, self.position);
        self.stuck.window_ticks = 0;
        self.stuck.checkpoint = self.position;
        if moved >= cfg.stuck_min_distance {
            self.stuck.escape_attempts = 0;
            return;
        }
        self.stuck.escape_attempts += 1;
        debug!(
            agent = self.id,
            attempts = self.stuck.escape_attempts,
            "stuck escape"
        );
        if self.stuck.escape_attempts < cfg.max_escape_attempts {
            self.heading = rng.random_range(-PI..PI);
            return;
        }
        match self.state {
            AntState::Foraging => self.begin_idle(cfg.idle_ticks),
            _ => {
                self.heading = heading_to(self.position, home);
                self.stuck.escape_attempts = 0;
            }
        }
    }

    fn begin_idle(&mut self, ticks: u32) {
        if self.enter(AntState::Idle) {
            self.idle_remaining = ticks.max(1);
            self.stuck = StuckTracker::new(self.position);
        }
    }

    /// Forager takes food: switch to returning and face home.
    pub fn pick_up(&mut self, home: Vec2) -> bool {
        if self.state != AntState::Foraging || !self.enter(AntState::Returning) {
            return false;
        }
        self.carrying = true;
        self.heading = heading_to(self.position, home);
        self.fitness
            .record_discovery(self.age.saturating_sub(self.trip_started_at));
        true
    }

    /// Returning agent drops food at home and turns back out.
    pub fn deliver(&mut self, energy_bonus: f32, max_energy: f32) -> bool {
        if self.state != AntState::Returning || !self.enter(AntState::Foraging) {
            return false;
        }
        self.carrying = false;
        self.fitness.food_collected += 1;
        self.fitness.round_trips += 1;
        self.energy = (self.energy + energy_bonus).min(max_energy);
        self.heading = wrap_angle(self.heading + PI);
        self.distance_since_home = 0.0;
        self.trip_started_at = self.age;
        true
    }

    /// Move out of any wall, used when obstacles are regenerated.
    pub fn relocate_out_of(&mut self, obstacles: &ObstacleSet, radius: f64) {
        if obstacles.is_colliding(self.position, radius) {
            self.position = obstacles.push_out(self.position, radius);
            self.stuck = StuckTracker::new(self.position);
        }
    }
}

/// Turn away from a danger marker ahead, stronger the closer it lies to
/// straight ahead.
fn danger_turn(perception: &Perception, cfg: &SimConfig) -> f64 {
    match perception.danger {
        Some(d) => {
            let away = if d.turn >= 0.0 { -1.0 } else { 1.0 };
            away * cfg.danger_avoidance * FRAC_PI_2 * d.intensity as f64
        }
        None => 0.0,
    }
}

fn sanitize(d: Decision) -> Decision {
    Decision {
        turn: if d.turn.is_finite() { d.turn } else { 0.0 },
        speed_factor: if d.speed_factor.is_finite() {
            d.speed_factor.clamp(0.5, 1.5)
        } else {
            1.0
        },
        explore_bias: if d.explore_bias.is_finite() {
            d.explore_bias.clamp(0.0, 1.0)
        } else {
            0.0
        },
    }
}
