use crate::config::SimConfig;
use serde::{Deserialize, Serialize};

/// Coefficients of the fitness formula.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FitnessWeights {
    pub food: f32,
    pub efficiency: f32,
    pub survival: f32,
    pub trip: f32,
    pub distance: f32,
    pub speed_bonus: f32,
    pub speed_bonus_horizon_secs: f32,
    pub collision_penalty: f32,
    pub stuck_penalty: f32,
    pub ticks_per_second: f32,
}

impl FitnessWeights {
    pub fn from_config(config: &SimConfig) -> Self {
        Self {
            food: config.fitness_food_weight,
            efficiency: config.fitness_efficiency_weight,
            survival: config.fitness_survival_weight,
            trip: config.fitness_trip_weight,
            distance: config.fitness_distance_weight,
            speed_bonus: config.fitness_speed_bonus_weight,
            speed_bonus_horizon_secs: config.fitness_speed_bonus_horizon_secs,
            collision_penalty: config.fitness_collision_penalty,
            stuck_penalty: config.fitness_stuck_penalty,
            ticks_per_second: config.ticks_per_second as f32,
        }
    }
}

impl Default for FitnessWeights {
    fn default() -> Self {
        Self::from_config(&SimConfig::default())
    }
}

/// Per-agent lifetime accumulators.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FitnessTracker {
    pub food_collected: u32,
    pub round_trips: u32,
    pub survival_ticks: u64,
    pub distance: f64,
    pub energy_spent: f32,
    pub collisions: u32,
    pub stuck_ticks: u64,
    /// Sum of ticks from leaving home to reaching food, over all pickups.
    pub discovery_ticks_total: u64,
    pub discoveries: u32,
}

impl FitnessTracker {
    pub fn record_discovery(&mut self, ticks: u64) {
        self.discovery_ticks_total += ticks;
        self.discoveries += 1;
    }

    /// Mean discovery time per completed round trip, in seconds. `None`
    /// without a delivery or without any recorded discovery time.
    pub fn average_discovery_secs(&self, ticks_per_second: f32) -> Option<f32> {
        if self.round_trips == 0 || self.discovery_ticks_total == 0 || ticks_per_second <= 0.0 {
            return None;
        }
        Some(self.discovery_ticks_total as f32 / self.round_trips as f32 / ticks_per_second)
    }

    /// Weighted score, floored at zero.
    pub fn score(&self, w: &FitnessWeights) -> f32 {
        let food = self.food_collected as f32;
        let efficiency = food / self.energy_spent.max(1.0);
        let speed_bonus = self
            .average_discovery_secs(w.ticks_per_second)
            .map_or(0.0, |secs| {
                (w.speed_bonus_horizon_secs - secs).max(0.0) * w.speed_bonus
            });
        let raw = food * w.food
            + efficiency * w.efficiency
            + self.survival_ticks as f32 * w.survival
            + self.round_trips as f32 * w.trip
            + self.distance as f32 * w.distance
            + speed_bonus
            - self.collisions as f32 * w.collision_penalty
            - self.stuck_ticks as f32 * w.stuck_penalty;
        if raw.is_finite() {
            raw.max(0.0)
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_tracker_scores_zero() {
        assert_eq!(FitnessTracker::default().score(&FitnessWeights::default()), 0.0);
    }

    #[test]
    fn score_combines_all_terms() {
        let tracker = FitnessTracker {
            food_collected: 2,
            round_trips: 2,
            survival_ticks: 1000,
            distance: 500.0,
            energy_spent: 10.0,
            collisions: 1,
            stuck_ticks: 4,
            discovery_ticks_total: 1200,
            discoveries: 2,
        };
        // 30 + 10 + 10 + 40 + 5 + (100 - 10) * 0.5 - 5 - 2
        let expected = 30.0 + 10.0 + 10.0 + 40.0 + 5.0 + 45.0 - 5.0 - 2.0;
        let score = tracker.score(&FitnessWeights::default());
        assert!((score - expected).abs() < 1e-3, "{score}");
    }

    #[test]
    fn penalties_floor_at_zero() {
        let tracker = FitnessTracker {
            collisions: 100,
            stuck_ticks: 1000,
            ..FitnessTracker::default()
        };
        assert_eq!(tracker.score(&FitnessWeights::default()), 0.0);
    }

    #[test]
    fn slow_discovery_earns_no_speed_bonus() {
        let tracker = FitnessTracker {
            round_trips: 1,
            discovery_ticks_total: 60 * 500,
            discoveries: 1,
            ..FitnessTracker::default()
        };
        assert_eq!(tracker.score(&FitnessWeights::default()), 20.0);
    }

    #[test]
    fn speed_bonus_averages_over_round_trips() {
        // Two pickups but one delivery: 3600 ticks over one trip is 60 s.
        let tracker = FitnessTracker {
            round_trips: 1,
            discoveries: 2,
            discovery_ticks_total: 3600,
            ..FitnessTracker::default()
        };
        let score = tracker.score(&FitnessWeights::default());
        assert!((score - 40.0).abs() < 1e-3, "{score}");
    }

    #[test]
    fn zero_discovery_time_earns_no_speed_bonus() {
        let tracker = FitnessTracker {
            round_trips: 1,
            discoveries: 1,
            discovery_ticks_total: 0,
            ..FitnessTracker::default()
        };
        assert_eq!(tracker.score(&FitnessWeights::default()), 20.0);
    }
}
