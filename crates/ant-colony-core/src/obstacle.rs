use crate::constants::MAX_PUSH_OUT_PASSES;
use crate::geom::{distance, Vec2};
use serde::{Deserialize, Serialize};

/// Clearance added when pushing a point out of an inflated rectangle.
const PUSH_OUT_MARGIN: f64 = 1e-6;

/// Fallback search extent for points buried in touching rectangles.
const PUSH_OUT_RINGS: usize = 64;
const PUSH_OUT_RING_DIRECTIONS: usize = 16;

/// Closed axis-aligned rectangle.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Obstacle {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn contains(&self, p: Vec2, inflate: f64) -> bool {
        p[0] >= self.x - inflate
            && p[0] <= self.x + self.width + inflate
            && p[1] >= self.y - inflate
            && p[1] <= self.y + self.height + inflate
    }

    /// Nearest point on the boundary. Interior points project onto the
    /// nearest edge.
    pub fn closest_point(&self, p: Vec2) -> Vec2 {
        if self.contains(p, 0.0) {
            let (dir, depth) = self.nearest_exit(p, 0.0);
            return [p[0] + dir[0] * depth, p[1] + dir[1] * depth];
        }
        [
            p[0].clamp(self.x, self.x + self.width),
            p[1].clamp(self.y, self.y + self.height),
        ]
    }

    /// Unit direction and depth of the nearest exit for a point inside the
    /// rectangle inflated by `inflate`.
    fn nearest_exit(&self, p: Vec2, inflate: f64) -> (Vec2, f64) {
        let exits = [
            ([-1.0, 0.0], p[0] - (self.x - inflate)),
            ([1.0, 0.0], (self.x + self.width + inflate) - p[0]),
            ([0.0, -1.0], p[1] - (self.y - inflate)),
            ([0.0, 1.0], (self.y + self.height + inflate) - p[1]),
        ];
        exits
            .into_iter()
            .fold(exits[0], |best, e| if e.1 < best.1 { e } else { best })
    }

    /// Nearest hit distance of a ray against this rectangle (slab test).
    pub fn ray_hit(&self, origin: Vec2, dir: Vec2) -> Option<f64> {
        let mut t_min = f64::NEG_INFINITY;
        let mut t_max = f64::INFINITY;
        let bounds = [(self.x, self.x + self.width), (self.y, self.y + self.height)];
        for axis in 0..2 {
            let (lo, hi) = bounds[axis];
            if dir[axis].abs() < 1e-12 {
                if origin[axis] < lo || origin[axis] > hi {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / dir[axis];
            let mut t1 = (lo - origin[axis]) * inv;
            let mut t2 = (hi - origin[axis]) * inv;
            if t1 > t2 {
                std::mem::swap(&mut t1, &mut t2);
            }
            t_min = t_min.max(t1);
            t_max = t_max.min(t2);
            if t_min > t_max {
                return None;
            }
        }
        if t_max < 0.0 {
            None
        } else {
            Some(t_min.max(0.0))
        }
    }
}

/// Static set of wall rectangles.
#[derive(Clone, Debug, Default)]
pub struct ObstacleSet {
    obstacles: Vec<Obstacle>,
}

impl ObstacleSet {
    pub fn new(obstacles: Vec<Obstacle>) -> Self {
        Self { obstacles }
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    pub fn len(&self) -> usize {
        self.obstacles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.obstacles.is_empty()
    }

    /// Closest point on any obstacle boundary and its distance.
    pub fn closest_point(&self, position: Vec2) -> Option<(Vec2, f64)> {
        self.obstacles
            .iter()
            .map(|o| {
                let cp = o.closest_point(position);
                (cp, distance(cp, position))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    /// Sum of push-away vectors from obstacles within `range`, each scaled by
    /// `1 - distance / range`. A point inside a rectangle gets a full-weight
    /// push toward its nearest edge.
    pub fn repulsion_vector(&self, position: Vec2, range: f64) -> Vec2 {
        let mut out = [0.0, 0.0];
        if range <= 0.0 {
            return out;
        }
        for o in &self.obstacles {
            if o.contains(position, 0.0) {
                let (dir, _) = o.nearest_exit(position, 0.0);
                out[0] += dir[0];
                out[1] += dir[1];
                continue;
            }
            let cp = o.closest_point(position);
            let d = distance(cp, position);
            if d < range && d > 0.0 {
                let weight = 1.0 - d / range;
                out[0] += (position[0] - cp[0]) / d * weight;
                out[1] += (position[1] - cp[1]) / d * weight;
            }
        }
        out
    }

    pub fn is_colliding(&self, position: Vec2, radius: f64) -> bool {
        self.obstacles.iter().any(|o| o.contains(position, radius))
    }

    /// Move `position` out of every inflated rectangle through the nearest edge.
    /// Overlapping obstacles get a bounded number of passes; if the point is
    /// still inside after those, the nearest free spot on expanding rings wins.
    pub fn push_out(&self, position: Vec2, radius: f64) -> Vec2 {
        let mut p = position;
        for _ in 0..MAX_PUSH_OUT_PASSES {
            let Some(hit) = self.obstacles.iter().find(|o| o.contains(p, radius)) else {
                return p;
            };
            let (dir, depth) = hit.nearest_exit(p, radius);
            let step = depth + PUSH_OUT_MARGIN;
            p = [p[0] + dir[0] * step, p[1] + dir[1] * step];
        }
        if !self.is_colliding(p, radius) {
            return p;
        }
        self.ring_search(position, radius).unwrap_or(p)
    }

    fn ring_search(&self, center: Vec2, radius: f64) -> Option<Vec2> {
        let step = radius.max(1.0);
        for ring in 1..=PUSH_OUT_RINGS {
            let r = ring as f64 * step;
            for k in 0..PUSH_OUT_RING_DIRECTIONS {
                let theta = k as f64 * std::f64::consts::TAU / PUSH_OUT_RING_DIRECTIONS as f64;
                let candidate = [center[0] + r * theta.cos(), center[1] + r * theta.sin()];
                if !self.is_colliding(candidate, radius) {
                    return Some(candidate);
                }
            }
        }
        None
    }

    /// Nearest obstacle hit along `direction` (unit) within `max`.
    pub fn ray_distance(&self, origin: Vec2, direction: Vec2, max: f64) -> Option<f64> {
        self.obstacles
            .iter()
            .filter_map(|o| o.ray_hit(origin, direction))
            .filter(|&t| t <= max)
            .min_by(f64::total_cmp)
    }
}
