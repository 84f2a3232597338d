use crate::agent::{Agent, AntState};
use crate::config::SimConfig;
use crate::constants::{AGENT_RAY_PADDING, FEATURE_COUNT, FIELD_OF_VIEW, NUM_RAYS};
use crate::food::FoodSource;
use crate::geom::{distance, heading_to, ray_circle, turn_toward, unit, Vec2};
use crate::obstacle::ObstacleSet;
use crate::pheromone::{Channel, PheromoneField};
use crate::spatial::{for_each_neighbor, AgentLocation};
use rstar::RTree;
use std::f64::consts::{FRAC_PI_2, PI};

/// Offsets into the feature vector.
pub const OBSTACLE_RAYS: usize = 0;
pub const AGENT_RAYS: usize = NUM_RAYS;
pub const FOOD_RAYS: usize = NUM_RAYS * 2;
pub const TO_FOOD: usize = NUM_RAYS * 3;
pub const TO_HOME: usize = TO_FOOD + 1;
pub const HOME_DISTANCE: usize = TO_FOOD + 2;
pub const HOME_DIRECTION: usize = TO_FOOD + 3;
pub const CARRYING: usize = TO_FOOD + 4;
pub const ENERGY: usize = TO_FOOD + 5;

/// Read-only world state shared by every agent's perception in one tick.
pub struct WorldView<'a> {
    pub config: &'a SimConfig,
    pub field: &'a PheromoneField,
    pub obstacles: &'a ObstacleSet,
    pub food: &'a [FoodSource],
    pub index: &'a RTree<AgentLocation>,
    pub home: Vec2,
}

/// Food within smell range.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SmelledFood {
    pub id: u32,
    pub position: Vec2,
    pub distance: f64,
}

/// Strongest danger marker in front of the agent.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DangerSignal {
    /// Turn that would face the marker; always within a quarter turn.
    pub turn: f64,
    /// Marker strength as a fraction of `max_intensity`.
    pub intensity: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Perception {
    pub features: [f32; FEATURE_COUNT],
    /// Turn toward the strongest trail on the channel the agent's state follows.
    pub trail_turn: Option<f64>,
    pub smelled_food: Option<SmelledFood>,
    pub danger: Option<DangerSignal>,
    pub home_distance: f64,
    /// Turn needed to face home.
    pub home_turn: f64,
}

impl Perception {
    /// Perception for an agent that sees, smells and carries nothing.
    pub fn blank() -> Self {
        Self {
            features: [0.0; FEATURE_COUNT],
            trail_turn: None,
            smelled_food: None,
            danger: None,
            home_distance: 0.0,
            home_turn: 0.0,
        }
    }
}

/// Ray angles relative to heading, evenly spaced across the field of view.
pub fn ray_offsets() -> [f64; NUM_RAYS] {
    let step = FIELD_OF_VIEW / (NUM_RAYS - 1) as f64;
    std::array::from_fn(|k| -FIELD_OF_VIEW * 0.5 + k as f64 * step)
}

fn ray_feature(hit: Option<f64>, range: f64) -> f32 {
    match hit {
        Some(d) if d <= range => (1.0 - d / range).clamp(0.0, 1.0) as f32,
        _ => 0.0,
    }
}

pub fn perceive(view: &WorldView<'_>, agent: &Agent) -> Perception {
    let cfg = view.config;
    let p = agent.position;
    let h = agent.heading;
    let range = cfg.vision_range;
    let mut features = [0.0f32; FEATURE_COUNT];

    let agent_hit_radius = cfg.agent_radius + AGENT_RAY_PADDING;
    let mut neighbors: Vec<Vec2> = Vec::new();
    for_each_neighbor(view.index, p, range + agent_hit_radius, agent.id, |loc| {
        neighbors.push(loc.position)
    });
    let visible_food: Vec<&FoodSource> = view
        .food
        .iter()
        .filter(|f| f.is_active() && distance(f.position, p) <= range + f.radius)
        .collect();

    for (k, offset) in ray_offsets().iter().enumerate() {
        let dir = unit(h + offset);
        features[OBSTACLE_RAYS + k] = ray_feature(view.obstacles.ray_distance(p, dir, range), range);
        let agent_hit = neighbors
            .iter()
            .filter_map(|&c| ray_circle(p, dir, c, agent_hit_radius))
            .min_by(f64::total_cmp);
        features[AGENT_RAYS + k] = ray_feature(agent_hit, range);
        let food_hit = visible_food
            .iter()
            .filter_map(|f| ray_circle(p, dir, f.position, f.radius))
            .min_by(f64::total_cmp);
        features[FOOD_RAYS + k] = ray_feature(food_hit, range);
    }

    let max = view.field.max_intensity();
    features[TO_FOOD] = view.field.query(p, Channel::ToFood) / max;
    features[TO_HOME] = view.field.query(p, Channel::ToHome) / max;

    let home_distance = distance(p, view.home);
    let home_turn = if home_distance > 0.0 {
        turn_toward(h, heading_to(p, view.home))
    } else {
        0.0
    };
    features[HOME_DISTANCE] = (home_distance / cfg.world_diagonal()).min(1.0) as f32;
    features[HOME_DIRECTION] = (home_turn / PI) as f32;
    features[CARRYING] = if agent.carrying { 1.0 } else { 0.0 };
    features[ENERGY] = (agent.energy / cfg.max_energy).clamp(0.0, 1.0);

    let trail = match agent.state() {
        AntState::Foraging if home_distance > cfg.trail_follow_min_home_distance => view
            .field
            .sample_gradient_forward(p, Channel::ToFood, cfg.gradient_radius, h),
        AntState::Returning => {
            view.field
                .sample_gradient_forward(p, Channel::ToHome, cfg.gradient_radius, h)
        }
        _ => None,
    };
    let trail_turn = trail.map(|g| turn_toward(h, g.heading));

    let danger = view
        .field
        .sample_gradient(p, Channel::Danger, cfg.gradient_radius)
        .map(|g| DangerSignal {
            turn: turn_toward(h, g.heading),
            intensity: (g.strength / max).clamp(0.0, 1.0),
        })
        .filter(|d| d.turn.abs() <= FRAC_PI_2);

    let smelled_food = view
        .food
        .iter()
        .filter(|f| f.is_active())
        .map(|f| SmelledFood {
            id: f.id,
            position: f.position,
            distance: distance(f.position, p),
        })
        .filter(|s| s.distance < cfg.smell_range)
        .min_by(|a, b| a.distance.total_cmp(&b.distance));

    Perception {
        features,
        trail_turn,
        smelled_food,
        danger,
        home_distance,
        home_turn,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PolicyKind;
    use crate::genome::Genome;
    use crate::obstacle::Obstacle;
    use crate::spatial::build_index;
    use rand::SeedableRng;
    use rand_chacha::ChaCha12Rng;

    fn agent(id: u32, position: Vec2, heading: f64) -> Agent {
        let cfg = SimConfig::default();
        let mut rng = ChaCha12Rng::seed_from_u64(1);
        Agent::new(id, position, heading, Genome::random(PolicyKind::Heuristic, &mut rng), &cfg)
    }

    #[test]
    fn rays_fan_across_half_circle() {
        let offsets = ray_offsets();
        assert!((offsets[0] + PI / 2.0).abs() < 1e-12);
        assert!(offsets[NUM_RAYS / 2].abs() < 1e-12);
        assert!((offsets[NUM_RAYS - 1] - PI / 2.0).abs() < 1e-12);
    }

    #[test]
    fn features_report_walls_agents_and_food_ahead() {
        let cfg = SimConfig::default();
        let field = PheromoneField::from_config(&cfg);
        let obstacles = ObstacleSet::new(vec![Obstacle::new(150.0, 90.0, 10.0, 20.0)]);
        let food = vec![FoodSource::new(0, [100.0, 150.0], 10.0, 5)];
        let me = agent(0, [100.0, 100.0], 0.0);
        let other = agent(1, [100.0, 50.0], 0.0);
        let index = build_index(&[me.clone(), other]);
        let view = WorldView {
            config: &cfg,
            field: &field,
            obstacles: &obstacles,
            food: &food,
            index: &index,
            home: cfg.home(),
        };
        let p = perceive(&view, &me);
        let centre = NUM_RAYS / 2;
        // Wall 50 units straight ahead.
        assert!((p.features[OBSTACLE_RAYS + centre] - 0.5).abs() < 1e-6);
        // Other agent straight left (-90 degrees), surface at 50 - 8.
        assert!((p.features[AGENT_RAYS] - 0.58).abs() < 1e-5);
        // Food straight right (+90 degrees), surface at 50 - 10.
        assert!((p.features[FOOD_RAYS + NUM_RAYS - 1] - 0.6).abs() < 1e-5);
        assert_eq!(p.features[CARRYING], 0.0);
        assert_eq!(p.features[ENERGY], 1.0);
        assert_eq!(p.smelled_food.map(|s| s.id), Some(0));
    }

    #[test]
    fn home_direction_is_relative_to_heading() {
        let cfg = SimConfig::default();
        let field = PheromoneField::from_config(&cfg);
        let obstacles = ObstacleSet::default();
        let index = build_index(&[]);
        let home = cfg.home();
        let me = agent(0, [home[0] - 100.0, home[1]], PI / 2.0);
        let view = WorldView {
            config: &cfg,
            field: &field,
            obstacles: &obstacles,
            food: &[],
            index: &index,
            home,
        };
        let p = perceive(&view, &me);
        assert!((p.home_turn + PI / 2.0).abs() < 1e-9);
        assert!((p.features[HOME_DIRECTION] + 0.5).abs() < 1e-6);
        assert!(p.trail_turn.is_none());
    }

    #[test]
    fn foragers_ignore_food_trails_near_home() {
        let cfg = SimConfig::default();
        let mut field = PheromoneField::from_config(&cfg);
        let home = cfg.home();
        let near = [home[0] + 60.0, home[1]];
        let far = [home[0] + 300.0, home[1]];
        for p in [near, far] {
            field.deposit([p[0] + 25.0, p[1]], Channel::ToFood, 100.0);
        }
        let obstacles = ObstacleSet::default();
        let index = build_index(&[]);
        let view = WorldView {
            config: &cfg,
            field: &field,
            obstacles: &obstacles,
            food: &[],
            index: &index,
            home,
        };
        assert!(perceive(&view, &agent(0, near, 0.0)).trail_turn.is_none());
        let turn = perceive(&view, &agent(0, far, 0.0)).trail_turn.unwrap();
        assert!(turn.abs() < 0.5);
    }

    #[test]
    fn danger_is_reported_only_ahead() {
        let cfg = SimConfig::default();
        let mut field = PheromoneField::from_config(&cfg);
        let at = [300.0, 300.0];
        field.deposit([at[0] + 25.0, at[1]], Channel::Danger, 100.0);
        let obstacles = ObstacleSet::default();
        let index = build_index(&[]);
        let view = WorldView {
            config: &cfg,
            field: &field,
            obstacles: &obstacles,
            food: &[],
            index: &index,
            home: cfg.home(),
        };
        let ahead = perceive(&view, &agent(0, at, 0.0)).danger.unwrap();
        assert!(ahead.turn.abs() < 0.5);
        assert!((ahead.intensity - 0.5).abs() < 1e-6);
        assert!(perceive(&view, &agent(0, at, PI)).danger.is_none());
    }
}
