use crate::config::SimConfig;
use crate::constants::{FOOD_EDGE_MARGIN, FOOD_PLACEMENT_ATTEMPTS};
use crate::geom::{distance, Vec2};
use crate::obstacle::ObstacleSet;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// A depletable, respawning pile of food. Sources are never removed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FoodSource {
    pub id: u32,
    pub position: Vec2,
    pub radius: f64,
    remaining: u32,
    max_amount: u32,
    /// Ticks left until a depleted source refills.
    respawn_timer: u64,
}

impl FoodSource {
    pub fn new(id: u32, position: Vec2, radius: f64, amount: u32) -> Self {
        Self {
            id,
            position,
            radius,
            remaining: amount,
            max_amount: amount,
            respawn_timer: 0,
        }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn max_amount(&self) -> u32 {
        self.max_amount
    }

    pub fn respawn_timer(&self) -> u64 {
        self.respawn_timer
    }

    pub fn is_active(&self) -> bool {
        self.remaining > 0
    }

    /// Take one unit. Emptying the source starts its respawn cooldown.
    pub fn take_one(&mut self, respawn_ticks: u64) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        if self.remaining == 0 {
            self.respawn_timer = respawn_ticks;
        }
        true
    }

    /// Advance the cooldown by one tick. Returns true when the source refilled.
    pub fn tick_respawn(&mut self) -> bool {
        if self.remaining > 0 {
            return false;
        }
        self.respawn_timer = self.respawn_timer.saturating_sub(1);
        if self.respawn_timer == 0 {
            self.remaining = self.max_amount;
            return true;
        }
        false
    }
}

/// Pick a spot for a food source away from home and outside walls.
/// Falls back to the last candidate when every attempt violates a constraint.
pub fn random_food_position<R: Rng + ?Sized>(
    config: &SimConfig,
    obstacles: &ObstacleSet,
    rng: &mut R,
) -> Vec2 {
    let margin_x = FOOD_EDGE_MARGIN.min(config.world_width * 0.25);
    let margin_y = FOOD_EDGE_MARGIN.min(config.world_height * 0.25);
    let home = config.home();
    let mut candidate = home;
    for _ in 0..FOOD_PLACEMENT_ATTEMPTS {
        candidate = [
            rng.random_range(margin_x..=config.world_width - margin_x),
            rng.random_range(margin_y..=config.world_height - margin_y),
        ];
        let far_from_home = distance(candidate, home) >= config.food_min_home_distance;
        if far_from_home && !obstacles.is_colliding(candidate, config.food_radius) {
            return candidate;
        }
    }
    obstacles.push_out(candidate, config.food_radius)
}

pub fn random_food_amount<R: Rng + ?Sized>(config: &SimConfig, rng: &mut R) -> u32 {
    rng.random_range(config.food_min_amount..=config.food_max_amount)
}

/// Scatter `config.food_source_count` sources with ids starting at `first_id`.
pub fn place_food_sources<R: Rng + ?Sized>(
    config: &SimConfig,
    obstacles: &ObstacleSet,
    first_id: u32,
    rng: &mut R,
) -> Vec<FoodSource> {
    (0..config.food_source_count)
        .map(|i| {
            let position = random_food_position(config, obstacles, rng);
            let amount = random_food_amount(config, rng);
            FoodSource::new(first_id + i as u32, position, config.food_radius, amount)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::maze::generate_obstacles;
    use rand::SeedableRng;
    use rand_chacha::ChaCha12Rng;

    #[test]
    fn last_unit_depletes_and_respawns_after_cooldown() {
        let mut food = FoodSource::new(0, [0.0, 0.0], 10.0, 1);
        assert!(food.take_one(3));
        assert_eq!(food.remaining(), 0);
        assert!(!food.is_active());
        assert!(!food.take_one(3));
        assert!(!food.tick_respawn());
        assert!(!food.tick_respawn());
        assert!(food.tick_respawn());
        assert_eq!(food.remaining(), food.max_amount());
        assert!(food.is_active());
    }

    #[test]
    fn active_source_ignores_respawn_ticks() {
        let mut food = FoodSource::new(0, [0.0, 0.0], 10.0, 5);
        food.take_one(10);
        assert!(!food.tick_respawn());
        assert_eq!(food.remaining(), 4);
    }

    #[test]
    fn placement_avoids_home_and_walls() {
        let cfg = SimConfig::default();
        let mut rng = ChaCha12Rng::seed_from_u64(21);
        let obstacles = ObstacleSet::new(generate_obstacles(&cfg, &mut rng));
        let sources = place_food_sources(&cfg, &obstacles, 0, &mut rng);
        assert_eq!(sources.len(), cfg.food_source_count);
        for (i, s) in sources.iter().enumerate() {
            assert_eq!(s.id, i as u32);
            assert!(distance(s.position, cfg.home()) >= cfg.food_min_home_distance);
            assert!(!obstacles.is_colliding(s.position, cfg.food_radius));
            assert!((cfg.food_min_amount..=cfg.food_max_amount).contains(&s.remaining()));
        }
    }
}
