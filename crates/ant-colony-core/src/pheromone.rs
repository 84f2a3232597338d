use crate::config::SimConfig;
use crate::constants::{BACKWARD_TRAIL_ATTENUATION, FIELD_EPSILON};
use crate::geom::{heading_to, turn_toward, Vec2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_2;

/// Grids at least this large decay their cells on the rayon pool.
const PARALLEL_DECAY_MIN_CELLS: usize = 16_384;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Laid by returning agents; leads toward food.
    ToFood,
    /// Laid by foragers; leads back home.
    ToHome,
    /// Left where an agent died.
    Danger,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::ToFood, Channel::ToHome, Channel::Danger];

    fn index(self) -> usize {
        match self {
            Channel::ToFood => 0,
            Channel::ToHome => 1,
            Channel::Danger => 2,
        }
    }
}

/// Per-channel decay multipliers.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChannelRates {
    pub to_food: f32,
    pub to_home: f32,
    pub danger: f32,
}

impl ChannelRates {
    pub fn uniform(rate: f32) -> Self {
        Self {
            to_food: rate,
            to_home: rate,
            danger: rate,
        }
    }

    pub fn from_config(config: &SimConfig) -> Self {
        Self {
            to_food: config.trail_decay,
            to_home: config.trail_decay,
            danger: config.danger_decay,
        }
    }

    fn as_array(self) -> [f32; 3] {
        [self.to_food, self.to_home, self.danger]
    }
}

/// Direction of the strongest nearby cell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrailGradient {
    /// Absolute heading from the sample position to the cell centre.
    pub heading: f64,
    pub strength: f32,
}

/// Three-layer scalar grid of chemical markers.
/// Every value stays within `[0, max_intensity]`.
#[derive(Clone, Debug)]
pub struct PheromoneField {
    width: usize,
    height: usize,
    cell_size: f64,
    max_intensity: f32,
    detection_threshold: f32,
    layers: [Vec<f32>; 3],
}

impl PheromoneField {
    pub fn new(
        world_width: f64,
        world_height: f64,
        cell_size: f64,
        max_intensity: f32,
        detection_threshold: f32,
    ) -> Self {
        let width = ((world_width / cell_size).ceil() as usize).max(1);
        let height = ((world_height / cell_size).ceil() as usize).max(1);
        let cells = width * height;
        Self {
            width,
            height,
            cell_size,
            max_intensity,
            detection_threshold,
            layers: [vec![0.0; cells], vec![0.0; cells], vec![0.0; cells]],
        }
    }

    pub fn from_config(config: &SimConfig) -> Self {
        Self::new(
            config.world_width,
            config.world_height,
            config.pheromone_cell_size,
            config.max_intensity,
            config.detection_threshold,
        )
    }

    /// Grid size in cells as `(columns, rows)`.
    pub fn dims(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    pub fn max_intensity(&self) -> f32 {
        self.max_intensity
    }

    /// Row-major cell values of one channel.
    pub fn layer(&self, channel: Channel) -> &[f32] {
        &self.layers[channel.index()]
    }

    pub fn total(&self, channel: Channel) -> f64 {
        self.layer(channel).iter().map(|&v| v as f64).sum()
    }

    pub fn reset(&mut self) {
        for layer in &mut self.layers {
            layer.fill(0.0);
        }
    }

    fn cell_of(&self, position: Vec2) -> Option<(usize, usize)> {
        let [x, y] = position;
        if !(x.is_finite() && y.is_finite()) || x < 0.0 || y < 0.0 {
            return None;
        }
        let cx = (x / self.cell_size) as usize;
        let cy = (y / self.cell_size) as usize;
        (cx < self.width && cy < self.height).then_some((cx, cy))
    }

    fn cell_center(&self, cx: usize, cy: usize) -> Vec2 {
        [
            (cx as f64 + 0.5) * self.cell_size,
            (cy as f64 + 0.5) * self.cell_size,
        ]
    }

    /// Add `amount` to the cell containing `position`, clamped to `max_intensity`.
    pub fn deposit(&mut self, position: Vec2, channel: Channel, amount: f32) {
        if !(amount.is_finite() && amount > 0.0) {
            return;
        }
        let Some((cx, cy)) = self.cell_of(position) else {
            return;
        };
        let idx = cy * self.width + cx;
        let cell = &mut self.layers[channel.index()][idx];
        *cell = (*cell + amount).min(self.max_intensity);
    }

    pub fn query(&self, position: Vec2, channel: Channel) -> f32 {
        self.cell_of(position)
            .map(|(cx, cy)| self.layers[channel.index()][cy * self.width + cx])
            .unwrap_or(0.0)
    }

    /// Multiply every cell of every channel by `rate`.
    pub fn decay(&mut self, rate: f32) {
        self.decay_channels(ChannelRates::uniform(rate));
    }

    pub fn decay_channels(&mut self, rates: ChannelRates) {
        let rates = rates.as_array().map(clamp_rate);
        if self.width * self.height >= PARALLEL_DECAY_MIN_CELLS {
            self.layers
                .as_mut_slice()
                .par_iter_mut()
                .zip(rates.as_slice().par_iter())
                .for_each(|(layer, &rate)| {
                    layer.par_iter_mut().for_each(|v| decay_cell(v, rate));
                });
        } else {
            for (layer, &rate) in self.layers.iter_mut().zip(rates.iter()) {
                layer.iter_mut().for_each(|v| decay_cell(v, rate));
            }
        }
    }

    /// Strongest cell in the rings `1..=radius` around `position`.
    pub fn sample_gradient(
        &self,
        position: Vec2,
        channel: Channel,
        radius: usize,
    ) -> Option<TrailGradient> {
        self.strongest_in_ring(position, channel, radius, None)
    }

    /// Like [`sample_gradient`](Self::sample_gradient), with cells more than
    /// 90 degrees off `heading` attenuated.
    pub fn sample_gradient_forward(
        &self,
        position: Vec2,
        channel: Channel,
        radius: usize,
        heading: f64,
    ) -> Option<TrailGradient> {
        self.strongest_in_ring(position, channel, radius, Some(heading))
    }

    fn strongest_in_ring(
        &self,
        position: Vec2,
        channel: Channel,
        radius: usize,
        heading: Option<f64>,
    ) -> Option<TrailGradient> {
        let (cx, cy) = self.cell_of(position)?;
        let layer = self.layer(channel);
        let r = radius as isize;
        let mut best: Option<TrailGradient> = None;
        for dy in -r..=r {
            for dx in -r..=r {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let nx = cx as isize + dx;
                let ny = cy as isize + dy;
                if nx < 0 || ny < 0 || nx >= self.width as isize || ny >= self.height as isize {
                    continue;
                }
                let (nx, ny) = (nx as usize, ny as usize);
                let raw = layer[ny * self.width + nx];
                if raw <= 0.0 {
                    continue;
                }
                let target = heading_to(position, self.cell_center(nx, ny));
                let strength = match heading {
                    Some(h) if turn_toward(h, target).abs() > FRAC_PI_2 => {
                        raw * BACKWARD_TRAIL_ATTENUATION
                    }
                    _ => raw,
                };
                if strength < self.detection_threshold {
                    continue;
                }
                if best.is_none_or(|b| strength > b.strength) {
                    best = Some(TrailGradient {
                        heading: target,
                        strength,
                    });
                }
            }
        }
        best
    }
}

fn clamp_rate(rate: f32) -> f32 {
    if rate.is_nan() {
        return 1.0 - f32::EPSILON;
    }
    rate.clamp(f32::EPSILON, 1.0 - f32::EPSILON)
}

fn decay_cell(v: &mut f32, rate: f32) {
    *v *= rate;
    if *v < FIELD_EPSILON {
        *v = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field() -> PheromoneField {
        PheromoneField::new(200.0, 100.0, 20.0, 200.0, 10.0)
    }

    #[test]
    fn grid_dimensions_round_up() {
        let f = PheromoneField::new(210.0, 95.0, 20.0, 200.0, 10.0);
        assert_eq!(f.dims(), (11, 5));
        assert_eq!(f.layer(Channel::Danger).len(), 55);
    }

    #[test]
    fn single_decay_matches_rate() {
        let mut f = field();
        f.deposit([50.0, 50.0], Channel::ToFood, 50.0);
        f.decay(0.999);
        assert!((f.query([50.0, 50.0], Channel::ToFood) - 49.95).abs() < 1e-3);
    }

    #[test]
    fn repeated_decay_is_geometric_then_zero() {
        let mut f = field();
        f.deposit([10.0, 10.0], Channel::ToHome, 100.0);
        for _ in 0..10 {
            f.decay(0.9);
        }
        let expected = 100.0 * 0.9f32.powi(10);
        assert!((f.query([10.0, 10.0], Channel::ToHome) - expected).abs() < 1e-3);
        for _ in 0..2_000 {
            f.decay(0.9);
        }
        assert_eq!(f.query([10.0, 10.0], Channel::ToHome), 0.0);
    }

    #[test]
    fn deposit_is_clamped_and_ignores_bad_amounts() {
        let mut f = field();
        for _ in 0..10 {
            f.deposit([30.0, 30.0], Channel::Danger, 90.0);
        }
        assert_eq!(f.query([30.0, 30.0], Channel::Danger), 200.0);
        f.deposit([70.0, 30.0], Channel::Danger, -5.0);
        f.deposit([70.0, 30.0], Channel::Danger, f32::NAN);
        assert_eq!(f.query([70.0, 30.0], Channel::Danger), 0.0);
    }

    #[test]
    fn out_of_bounds_is_noop_and_reads_zero() {
        let mut f = field();
        f.deposit([-1.0, 10.0], Channel::ToFood, 10.0);
        f.deposit([500.0, 10.0], Channel::ToFood, 10.0);
        assert_eq!(f.total(Channel::ToFood), 0.0);
        assert_eq!(f.query([500.0, 10.0], Channel::ToFood), 0.0);
    }

    #[test]
    fn channel_rates_decay_independently() {
        let mut f = field();
        f.deposit([50.0, 50.0], Channel::ToFood, 100.0);
        f.deposit([50.0, 50.0], Channel::Danger, 100.0);
        f.decay_channels(ChannelRates {
            to_food: 0.5,
            to_home: 0.5,
            danger: 0.25,
        });
        assert!((f.query([50.0, 50.0], Channel::ToFood) - 50.0).abs() < 1e-4);
        assert!((f.query([50.0, 50.0], Channel::Danger) - 25.0).abs() < 1e-4);
    }

    #[test]
    fn parallel_decay_matches_serial() {
        let mut big = PheromoneField::new(4000.0, 4000.0, 20.0, 200.0, 10.0);
        let mut small = field();
        big.deposit([50.0, 50.0], Channel::ToFood, 77.0);
        small.deposit([50.0, 50.0], Channel::ToFood, 77.0);
        big.decay(0.95);
        small.decay(0.95);
        assert_eq!(
            big.query([50.0, 50.0], Channel::ToFood),
            small.query([50.0, 50.0], Channel::ToFood)
        );
    }

    #[test]
    fn gradient_reports_no_signal_below_threshold() {
        let mut f = field();
        f.deposit([70.0, 50.0], Channel::ToFood, 5.0);
        assert!(f.sample_gradient([50.0, 50.0], Channel::ToFood, 1).is_none());
    }

    #[test]
    fn gradient_points_at_strongest_cell() {
        let mut f = field();
        f.deposit([70.0, 50.0], Channel::ToFood, 40.0);
        f.deposit([30.0, 50.0], Channel::ToFood, 20.0);
        let g = f
            .sample_gradient([50.0, 50.0], Channel::ToFood, 1)
            .expect("signal present");
        assert!(g.heading.abs() < 0.2, "heading {}", g.heading);
        assert_eq!(g.strength, 40.0);
    }

    #[test]
    fn forward_gradient_attenuates_cells_behind() {
        let mut f = field();
        f.deposit([30.0, 50.0], Channel::ToHome, 100.0);
        f.deposit([70.0, 50.0], Channel::ToHome, 40.0);
        let plain = f.sample_gradient([50.0, 50.0], Channel::ToHome, 1).unwrap();
        assert!(plain.heading.abs() > 2.5);
        let forward = f
            .sample_gradient_forward([50.0, 50.0], Channel::ToHome, 1, 0.0)
            .unwrap();
        assert!(forward.heading.abs() < 0.2);
        assert_eq!(forward.strength, 40.0);
    }

    #[test]
    fn reset_zeroes_all_channels() {
        let mut f = field();
        for channel in Channel::ALL {
            f.deposit([50.0, 50.0], channel, 10.0);
        }
        f.reset();
        assert!(Channel::ALL.iter().all(|&c| f.total(c) == 0.0));
    }
}
