use serde::{Deserialize, Serialize};

/// Which controller every agent in the population runs.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    #[default]
    Heuristic,
    Network,
}

/// How obstacles are laid out on world setup and regeneration.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ObstacleLayout {
    #[default]
    Maze,
    Empty,
}

/// How elites are drawn as parents when spawning a new agent.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ParentSelection {
    #[default]
    Uniform,
    FitnessWeighted,
}

/// When the generation counter advances.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum EvolutionCadence {
    /// Advance every `interval` ticks.
    FixedTicks { interval: u64 },
    /// Advance once as many agents have retired as were alive at the last advance.
    PopulationTurnover,
}

impl Default for EvolutionCadence {
    fn default() -> Self {
        EvolutionCadence::FixedTicks { interval: 1800 }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Deterministic seed for reproducible simulation runs.
    pub seed: u64,
    /// World extent along x in world units.
    pub world_width: f64,
    /// World extent along y in world units.
    pub world_height: f64,
    /// Simulated ticks per second. Converts tick counts into seconds for fitness.
    pub ticks_per_second: f64,
    /// Multiplier applied to per-tick displacement.
    pub tick_scale: f64,
    /// Agents spawned on reset.
    pub initial_population: usize,
    /// Population the colony refills toward after retirements.
    pub target_population: usize,
    /// Lower clamp for `target_population`.
    pub min_population: usize,
    /// Hard cap on live agents, including growth spawns.
    pub max_population: usize,
    /// Controller used by every agent in the population.
    pub policy_kind: PolicyKind,
    /// Evaluate perception and decisions on the rayon pool.
    pub parallel_perception: bool,

    /// Side length of one pheromone grid cell.
    pub pheromone_cell_size: f64,
    /// Upper clamp for every pheromone cell.
    pub max_intensity: f32,
    /// Per-tick multiplier for the two trail channels.
    pub trail_decay: f32,
    /// Per-tick multiplier for the danger channel.
    pub danger_decay: f32,
    /// Minimum cell value reported as a trail signal.
    pub detection_threshold: f32,
    /// Ring radius (in cells) examined by gradient sampling.
    pub gradient_radius: usize,
    /// Trail deposited per world unit travelled, before deposit strength.
    pub trail_deposit_amount: f32,
    /// No home trail is laid within this distance of home.
    pub home_no_deposit_radius: f64,
    /// Exponential attenuation of home trail with distance since leaving home.
    pub home_trail_distance_decay: f64,
    /// Danger marker left where an agent dies.
    pub danger_deposit_amount: f32,
    /// Leave a danger marker on death.
    pub deposit_danger_on_death: bool,

    /// Obstacle layout used on reset and regeneration.
    pub obstacle_layout: ObstacleLayout,
    /// Cell size of the maze carving grid.
    pub maze_cell_size: f64,
    /// Cells around home kept free of walls.
    pub maze_clear_radius_cells: usize,
    /// Extra passages knocked through as a fraction of maze cells.
    pub maze_extra_passage_ratio: f64,
    /// Distance within which walls push agents away.
    pub wall_repel_range: f64,
    /// Weight of obstacle repulsion in the desired heading (steering gets the rest).
    pub obstacle_weight: f64,

    /// Length of each vision ray.
    pub vision_range: f64,
    /// Distance at which food is smelled and steered toward.
    pub smell_range: f64,
    /// Fraction of a full turn toward smelled food per tick.
    pub smell_strength: f64,
    /// Collision radius of an agent.
    pub agent_radius: f64,
    /// Foragers only follow food trails beyond this distance from home.
    pub trail_follow_min_home_distance: f64,
    /// Foragers within this distance of home are nudged outward.
    pub outward_bias_radius: f64,
    /// Fraction of a full turn toward home per tick while returning.
    pub home_turn_rate: f64,
    /// Turn away from danger markers ahead, as a fraction of a quarter turn
    /// at full marker intensity.
    pub danger_avoidance: f64,

    /// Number of food sources placed on reset.
    pub food_source_count: usize,
    /// Minimum initial quantity of a food source.
    pub food_min_amount: u32,
    /// Maximum initial quantity of a food source.
    pub food_max_amount: u32,
    /// Radius of a food source for vision and placement.
    pub food_radius: f64,
    /// Distance within which a forager picks up food.
    pub pickup_radius: f64,
    /// Ticks a depleted source waits before refilling.
    pub food_respawn_ticks: u64,
    /// Food sources are not placed closer than this to home.
    pub food_min_home_distance: f64,

    /// Delivery radius around home.
    pub colony_radius: f64,
    /// New agents appear within this distance of home.
    pub spawn_radius: f64,
    /// Movement speed for network-driven agents.
    pub base_speed: f64,
    /// Starting (and maximum) energy.
    pub max_energy: f32,
    /// Per-tick energy drain for network-driven agents.
    pub base_energy_drain: f32,
    /// Extra drain per world unit moved.
    pub movement_energy_cost: f32,
    /// Energy restored on delivery. Zero keeps energy monotone.
    pub delivery_energy_bonus: f32,
    /// Per-tick probability that a forager rests.
    pub idle_probability: f64,
    /// Length of a rest.
    pub idle_ticks: u32,
    /// Ticks between stuck checks.
    pub stuck_window_ticks: u32,
    /// Displacement required within a window to count as moving.
    pub stuck_min_distance: f64,
    /// Consecutive failed escapes before a forager goes idle.
    pub max_escape_attempts: u32,

    /// Ticks between food-store growth checks.
    pub growth_interval_ticks: u64,
    /// Food store required before growth spawning.
    pub growth_food_threshold: u32,
    /// Maximum ants added per growth check.
    pub growth_batch: usize,
    /// Food consumed per growth spawn.
    pub spawn_food_cost: u32,

    /// Capacity of the elite pool.
    pub pool_cap: usize,
    /// When the generation counter advances.
    pub evolution_cadence: EvolutionCadence,
    /// How parents are drawn from the pool.
    pub parent_selection: ParentSelection,
    /// Per-gene mutation probability.
    pub mutation_rate: f32,
    /// Multiplier on each trait's mutation step.
    pub trait_mutation_scale: f32,
    /// Mutation step for network weights.
    pub weight_mutation_step: f32,
    /// Crossover noise for network weights.
    pub weight_crossover_noise: f32,
    /// Network weights are clamped to `[-limit, limit]`.
    pub weight_limit: f32,
    /// Multiplier applied to elite fitness on every generation advance.
    pub elite_fitness_decay: f32,
    /// Per-tick learning samples kept by the colony; zero disables history.
    pub history_capacity: usize,

    /// Fitness per food unit delivered.
    pub fitness_food_weight: f32,
    /// Fitness per food unit per energy spent.
    pub fitness_efficiency_weight: f32,
    /// Fitness per tick survived.
    pub fitness_survival_weight: f32,
    /// Fitness per completed round trip.
    pub fitness_trip_weight: f32,
    /// Fitness per world unit travelled.
    pub fitness_distance_weight: f32,
    /// Fitness per second the average discovery time beats the horizon.
    pub fitness_speed_bonus_weight: f32,
    /// Discovery time (seconds) above which no speed bonus is paid.
    pub fitness_speed_bonus_horizon_secs: f32,
    /// Fitness lost per wall collision.
    pub fitness_collision_penalty: f32,
    /// Fitness lost per stuck tick.
    pub fitness_stuck_penalty: f32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            world_width: 1200.0,
            world_height: 800.0,
            ticks_per_second: 60.0,
            tick_scale: 1.0,
            initial_population: 100,
            target_population: 100,
            min_population: 30,
            max_population: 500,
            policy_kind: PolicyKind::Heuristic,
            parallel_perception: false,

            pheromone_cell_size: 20.0,
            max_intensity: 200.0,
            trail_decay: 0.995,
            danger_decay: 0.98,
            detection_threshold: 10.0,
            gradient_radius: 2,
            trail_deposit_amount: 3.0,
            home_no_deposit_radius: 50.0,
            home_trail_distance_decay: 0.0,
            danger_deposit_amount: 100.0,
            deposit_danger_on_death: true,

            obstacle_layout: ObstacleLayout::Maze,
            maze_cell_size: 60.0,
            maze_clear_radius_cells: 4,
            maze_extra_passage_ratio: 1.0 / 15.0,
            wall_repel_range: 120.0,
            obstacle_weight: 0.4,

            vision_range: 100.0,
            smell_range: 150.0,
            smell_strength: 0.8,
            agent_radius: 6.0,
            trail_follow_min_home_distance: 150.0,
            outward_bias_radius: 250.0,
            home_turn_rate: 0.4,
            danger_avoidance: 0.5,

            food_source_count: 12,
            food_min_amount: 50,
            food_max_amount: 150,
            food_radius: 10.0,
            pickup_radius: 15.0,
            food_respawn_ticks: 1800,
            food_min_home_distance: 200.0,

            colony_radius: 25.0,
            spawn_radius: 25.0,
            base_speed: 2.5,
            max_energy: 100.0,
            base_energy_drain: 0.01,
            movement_energy_cost: 0.002,
            delivery_energy_bonus: 0.0,
            idle_probability: 0.0005,
            idle_ticks: 120,
            stuck_window_ticks: 180,
            stuck_min_distance: 80.0,
            max_escape_attempts: 5,

            growth_interval_ticks: 60,
            growth_food_threshold: 500,
            growth_batch: 5,
            spawn_food_cost: 20,

            pool_cap: 50,
            evolution_cadence: EvolutionCadence::default(),
            parent_selection: ParentSelection::Uniform,
            mutation_rate: 0.15,
            trait_mutation_scale: 1.0,
            weight_mutation_step: 0.3,
            weight_crossover_noise: 0.1,
            weight_limit: 2.0,
            elite_fitness_decay: 0.95,
            history_capacity: 300,

            fitness_food_weight: 15.0,
            fitness_efficiency_weight: 50.0,
            fitness_survival_weight: 0.01,
            fitness_trip_weight: 20.0,
            fitness_distance_weight: 0.01,
            fitness_speed_bonus_weight: 0.5,
            fitness_speed_bonus_horizon_secs: 100.0,
            fitness_collision_penalty: 5.0,
            fitness_stuck_penalty: 0.5,
        }
    }
}

macro_rules! define_sim_config_error {
    (
        $(
            $variant:ident $( { $($field:ident : $type:ty),* } )? => $fmt:literal $(, $arg:expr)*
        );* $(;)?
    ) => {
        #[derive(Debug, Clone, PartialEq)]
        pub enum SimConfigError {
            $(
                $variant $( { $($field : $type),* } )?,
            )*
        }

        impl std::fmt::Display for SimConfigError {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(
                        Self::$variant $( { $($field),* } )? => write!(f, $fmt $(, $arg)*),
                    )*
                }
            }
        }
    };
}

define_sim_config_error! {
    InvalidWorldSize => "world_width and world_height must be positive and finite";
    WorldSizeTooLarge { max: f64, actual: f64 } => "world dimension {} exceeds max {}", actual, max;
    InvalidTickRate => "ticks_per_second and tick_scale must be positive and finite";
    InvalidPopulationBounds => "population bounds must satisfy 0 < min_population <= max_population";
    TooManyAgents { max: usize, actual: usize } => "Too many agents: {} > max {}", actual, max;
    InvalidCellSize => "pheromone_cell_size must be positive, finite and no larger than the world";
    InvalidMaxIntensity => "max_intensity must be positive and finite";
    InvalidDecayRate => "trail_decay and danger_decay must lie in (0, 1)";
    InvalidDetectionThreshold => "detection_threshold must be finite and within [0, max_intensity]";
    InvalidGradientRadius => "gradient_radius must be at least 1";
    InvalidDepositAmount => "deposit amounts must be finite and non-negative";
    InvalidMazeCellSize => "maze_cell_size must be positive and finite";
    InvalidObstacleWeight => "obstacle_weight must be finite and within [0, 1]";
    InvalidSensingRange => "vision_range, smell_range and wall_repel_range must be positive and finite";
    InvalidRadius => "agent, food, pickup, colony and spawn radii must be finite and non-negative";
    InvalidFoodAmounts => "food amounts must satisfy 0 < food_min_amount <= food_max_amount";
    InvalidSpeed => "base_speed must be positive and finite";
    InvalidEnergy => "max_energy must be positive; drains and bonus must be finite and non-negative";
    InvalidProbability { field: &'static str } => "{} must be finite and within [0, 1]", field;
    InvalidStuckWindow => "stuck_window_ticks must be greater than 0";
    InvalidGrowthInterval => "growth_interval_ticks must be greater than 0";
    InvalidPoolCap => "pool_cap must be greater than 0";
    InvalidCadence => "evolution_cadence interval must be greater than 0";
    InvalidMutation => "mutation steps and limits must be finite and non-negative";
    HistoryTooLong { max: usize, actual: usize } => "history_capacity {} exceeds max {}", actual, max;
    InvalidFitnessWeight { field: &'static str } => "{} must be finite and non-negative", field;
}

impl std::error::Error for SimConfigError {}

impl SimConfig {
    pub const MAX_WORLD_SIZE: f64 = crate::constants::MAX_WORLD_SIZE;
    pub const MAX_TOTAL_AGENTS: usize = crate::constants::MAX_TOTAL_AGENTS;
    pub const MAX_HISTORY_CAPACITY: usize = crate::constants::MAX_HISTORY_CAPACITY;

    pub fn validate(&self) -> Result<(), SimConfigError> {
        self.validate_world()?;
        self.validate_population()?;
        self.validate_field()?;
        self.validate_obstacles()?;
        self.validate_sensing()?;
        self.validate_food()?;
        self.validate_agents()?;
        self.validate_evolution()?;
        self.validate_fitness()?;
        Ok(())
    }

    fn validate_world(&self) -> Result<(), SimConfigError> {
        for size in [self.world_width, self.world_height] {
            if !(size.is_finite() && size > 0.0) {
                return Err(SimConfigError::InvalidWorldSize);
            }
            if size > Self::MAX_WORLD_SIZE {
                return Err(SimConfigError::WorldSizeTooLarge {
                    max: Self::MAX_WORLD_SIZE,
                    actual: size,
                });
            }
        }
        if !(self.ticks_per_second.is_finite()
            && self.ticks_per_second > 0.0
            && self.tick_scale.is_finite()
            && self.tick_scale > 0.0)
        {
            return Err(SimConfigError::InvalidTickRate);
        }
        Ok(())
    }

    fn validate_population(&self) -> Result<(), SimConfigError> {
        if self.min_population == 0 || self.min_population > self.max_population {
            return Err(SimConfigError::InvalidPopulationBounds);
        }
        if self.max_population > Self::MAX_TOTAL_AGENTS {
            return Err(SimConfigError::TooManyAgents {
                max: Self::MAX_TOTAL_AGENTS,
                actual: self.max_population,
            });
        }
        if self.initial_population > self.max_population {
            return Err(SimConfigError::TooManyAgents {
                max: self.max_population,
                actual: self.initial_population,
            });
        }
        Ok(())
    }

    fn validate_field(&self) -> Result<(), SimConfigError> {
        if !(self.pheromone_cell_size.is_finite()
            && self.pheromone_cell_size > 0.0
            && self.pheromone_cell_size <= self.world_width.min(self.world_height))
        {
            return Err(SimConfigError::InvalidCellSize);
        }
        if !(self.max_intensity.is_finite() && self.max_intensity > 0.0) {
            return Err(SimConfigError::InvalidMaxIntensity);
        }
        for rate in [self.trail_decay, self.danger_decay] {
            if !(rate.is_finite() && rate > 0.0 && rate < 1.0) {
                return Err(SimConfigError::InvalidDecayRate);
            }
        }
        if !(self.detection_threshold.is_finite()
            && (0.0..=self.max_intensity).contains(&self.detection_threshold))
        {
            return Err(SimConfigError::InvalidDetectionThreshold);
        }
        if self.gradient_radius == 0 {
            return Err(SimConfigError::InvalidGradientRadius);
        }
        let amounts_ok = [self.trail_deposit_amount, self.danger_deposit_amount]
            .iter()
            .all(|a| a.is_finite() && *a >= 0.0)
            && [self.home_no_deposit_radius, self.home_trail_distance_decay]
                .iter()
                .all(|a| a.is_finite() && *a >= 0.0);
        if !amounts_ok {
            return Err(SimConfigError::InvalidDepositAmount);
        }
        Ok(())
    }

    fn validate_obstacles(&self) -> Result<(), SimConfigError> {
        if !(self.maze_cell_size.is_finite() && self.maze_cell_size > 0.0) {
            return Err(SimConfigError::InvalidMazeCellSize);
        }
        if !(self.maze_extra_passage_ratio.is_finite() && self.maze_extra_passage_ratio >= 0.0) {
            return Err(SimConfigError::InvalidProbability {
                field: "maze_extra_passage_ratio",
            });
        }
        if !(self.obstacle_weight.is_finite() && (0.0..=1.0).contains(&self.obstacle_weight)) {
            return Err(SimConfigError::InvalidObstacleWeight);
        }
        Ok(())
    }

    fn validate_sensing(&self) -> Result<(), SimConfigError> {
        for range in [self.vision_range, self.smell_range, self.wall_repel_range] {
            if !(range.is_finite() && range > 0.0) {
                return Err(SimConfigError::InvalidSensingRange);
            }
        }
        for (field, value) in [
            ("smell_strength", self.smell_strength),
            ("home_turn_rate", self.home_turn_rate),
            ("danger_avoidance", self.danger_avoidance),
        ] {
            if !(value.is_finite() && (0.0..=1.0).contains(&value)) {
                return Err(SimConfigError::InvalidProbability { field });
            }
        }
        let distances = [
            self.trail_follow_min_home_distance,
            self.outward_bias_radius,
        ];
        if !distances.iter().all(|d| d.is_finite() && *d >= 0.0) {
            return Err(SimConfigError::InvalidSensingRange);
        }
        Ok(())
    }

    fn validate_food(&self) -> Result<(), SimConfigError> {
        if self.food_min_amount == 0 || self.food_min_amount > self.food_max_amount {
            return Err(SimConfigError::InvalidFoodAmounts);
        }
        let radii = [
            self.agent_radius,
            self.food_radius,
            self.pickup_radius,
            self.colony_radius,
            self.spawn_radius,
            self.food_min_home_distance,
        ];
        if !radii.iter().all(|r| r.is_finite() && *r >= 0.0) {
            return Err(SimConfigError::InvalidRadius);
        }
        Ok(())
    }

    fn validate_agents(&self) -> Result<(), SimConfigError> {
        if !(self.base_speed.is_finite() && self.base_speed > 0.0) {
            return Err(SimConfigError::InvalidSpeed);
        }
        let energy_ok = self.max_energy.is_finite()
            && self.max_energy > 0.0
            && [
                self.base_energy_drain,
                self.movement_energy_cost,
                self.delivery_energy_bonus,
            ]
            .iter()
            .all(|v| v.is_finite() && *v >= 0.0);
        if !energy_ok {
            return Err(SimConfigError::InvalidEnergy);
        }
        if !(self.idle_probability.is_finite() && (0.0..=1.0).contains(&self.idle_probability)) {
            return Err(SimConfigError::InvalidProbability {
                field: "idle_probability",
            });
        }
        if self.stuck_window_ticks == 0
            || !(self.stuck_min_distance.is_finite() && self.stuck_min_distance >= 0.0)
        {
            return Err(SimConfigError::InvalidStuckWindow);
        }
        if self.growth_interval_ticks == 0 {
            return Err(SimConfigError::InvalidGrowthInterval);
        }
        Ok(())
    }

    fn validate_evolution(&self) -> Result<(), SimConfigError> {
        if self.pool_cap == 0 {
            return Err(SimConfigError::InvalidPoolCap);
        }
        if let EvolutionCadence::FixedTicks { interval: 0 } = self.evolution_cadence {
            return Err(SimConfigError::InvalidCadence);
        }
        for (field, value) in [
            ("mutation_rate", self.mutation_rate),
            ("elite_fitness_decay", self.elite_fitness_decay),
        ] {
            if !(value.is_finite() && (0.0..=1.0).contains(&value)) {
                return Err(SimConfigError::InvalidProbability { field });
            }
        }
        let steps_ok = [
            self.trait_mutation_scale,
            self.weight_mutation_step,
            self.weight_crossover_noise,
        ]
        .iter()
        .all(|v| v.is_finite() && *v >= 0.0)
            && self.weight_limit.is_finite()
            && self.weight_limit > 0.0;
        if !steps_ok {
            return Err(SimConfigError::InvalidMutation);
        }
        if self.history_capacity > Self::MAX_HISTORY_CAPACITY {
            return Err(SimConfigError::HistoryTooLong {
                max: Self::MAX_HISTORY_CAPACITY,
                actual: self.history_capacity,
            });
        }
        Ok(())
    }

    fn validate_fitness(&self) -> Result<(), SimConfigError> {
        let weights = [
            ("fitness_food_weight", self.fitness_food_weight),
            ("fitness_efficiency_weight", self.fitness_efficiency_weight),
            ("fitness_survival_weight", self.fitness_survival_weight),
            ("fitness_trip_weight", self.fitness_trip_weight),
            ("fitness_distance_weight", self.fitness_distance_weight),
            ("fitness_speed_bonus_weight", self.fitness_speed_bonus_weight),
            (
                "fitness_speed_bonus_horizon_secs",
                self.fitness_speed_bonus_horizon_secs,
            ),
            ("fitness_collision_penalty", self.fitness_collision_penalty),
            ("fitness_stuck_penalty", self.fitness_stuck_penalty),
        ];
        for (field, value) in weights {
            if !(value.is_finite() && value >= 0.0) {
                return Err(SimConfigError::InvalidFitnessWeight { field });
            }
        }
        Ok(())
    }

    /// Population the colony refills toward, clamped into the configured bounds.
    pub fn effective_target_population(&self) -> usize {
        self.target_population
            .clamp(self.min_population, self.max_population)
    }

    /// Home position: the world centre.
    pub fn home(&self) -> [f64; 2] {
        [self.world_width * 0.5, self.world_height * 0.5]
    }

    pub fn world_diagonal(&self) -> f64 {
        self.world_width.hypot(self.world_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(SimConfig::default().validate(), Ok(()));
    }

    #[test]
    fn legacy_config_json_deserializes_with_defaults() {
        let legacy_json = r#"{
            "seed": 7,
            "world_width": 600.0,
            "world_height": 400.0,
            "initial_population": 20
        }"#;
        let cfg: SimConfig = serde_json::from_str(legacy_json).expect("legacy config should parse");
        assert_eq!(cfg.seed, 7);
        assert_eq!(cfg.initial_population, 20);
        assert_eq!(cfg.policy_kind, PolicyKind::Heuristic);
        assert_eq!(cfg.pool_cap, 50);
        assert!(cfg.trail_decay > 0.0 && cfg.trail_decay < 1.0);
        assert_eq!(cfg.validate(), Ok(()));
    }

    #[test]
    fn cadence_round_trips_through_json() {
        let cfg = SimConfig {
            evolution_cadence: EvolutionCadence::PopulationTurnover,
            policy_kind: PolicyKind::Network,
            ..SimConfig::default()
        };
        let json = serde_json::to_string(&cfg).expect("serialize config");
        let parsed: SimConfig = serde_json::from_str(&json).expect("parse config");
        assert_eq!(parsed.evolution_cadence, EvolutionCadence::PopulationTurnover);
        assert_eq!(parsed.policy_kind, PolicyKind::Network);
    }

    #[test]
    fn rejects_invalid_decay_rate() {
        let cfg = SimConfig {
            trail_decay: 1.0,
            ..SimConfig::default()
        };
        assert_eq!(cfg.validate(), Err(SimConfigError::InvalidDecayRate));
    }

    #[test]
    fn rejects_oversized_world() {
        let cfg = SimConfig {
            world_width: SimConfig::MAX_WORLD_SIZE + 1.0,
            ..SimConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(SimConfigError::WorldSizeTooLarge { .. })
        ));
    }

    #[test]
    fn rejects_inverted_population_bounds() {
        let cfg = SimConfig {
            min_population: 600,
            ..SimConfig::default()
        };
        assert_eq!(cfg.validate(), Err(SimConfigError::InvalidPopulationBounds));
    }

    #[test]
    fn rejects_zero_cadence_interval() {
        let cfg = SimConfig {
            evolution_cadence: EvolutionCadence::FixedTicks { interval: 0 },
            ..SimConfig::default()
        };
        assert_eq!(cfg.validate(), Err(SimConfigError::InvalidCadence));
    }

    #[test]
    fn rejects_oversized_history() {
        let cfg = SimConfig {
            history_capacity: SimConfig::MAX_HISTORY_CAPACITY + 1,
            ..SimConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(SimConfigError::HistoryTooLong { .. })
        ));
    }

    #[test]
    fn rejects_nan_fitness_weight() {
        let cfg = SimConfig {
            fitness_trip_weight: f32::NAN,
            ..SimConfig::default()
        };
        assert_eq!(
            cfg.validate(),
            Err(SimConfigError::InvalidFitnessWeight {
                field: "fitness_trip_weight"
            })
        );
    }

    #[test]
    fn target_population_is_clamped() {
        let cfg = SimConfig {
            target_population: 5,
            ..SimConfig::default()
        };
        assert_eq!(cfg.effective_target_population(), cfg.min_population);
    }
}
