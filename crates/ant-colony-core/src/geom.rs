use std::f64::consts::{PI, TAU};

pub type Vec2 = [f64; 2];

/// Wrap an angle into `(-PI, PI]`.
pub fn wrap_angle(angle: f64) -> f64 {
    if !angle.is_finite() {
        return 0.0;
    }
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI {
        wrapped + TAU
    } else {
        wrapped
    }
}

pub fn distance(a: Vec2, b: Vec2) -> f64 {
    length([a[0] - b[0], a[1] - b[1]])
}

pub fn length(v: Vec2) -> f64 {
    (v[0] * v[0] + v[1] * v[1]).sqrt()
}

/// Unit vector for a heading in radians.
pub fn unit(angle: f64) -> Vec2 {
    [angle.cos(), angle.sin()]
}

/// Absolute heading from `from` toward `to`.
pub fn heading_to(from: Vec2, to: Vec2) -> f64 {
    (to[1] - from[1]).atan2(to[0] - from[0])
}

/// Signed turn needed to go from `heading` to `target`, in `(-PI, PI]`.
pub fn turn_toward(heading: f64, target: f64) -> f64 {
    wrap_angle(target - heading)
}

pub fn is_finite(v: Vec2) -> bool {
    v[0].is_finite() && v[1].is_finite()
}

/// Ray/circle intersection. Returns the nearest positive hit distance.
pub fn ray_circle(origin: Vec2, dir: Vec2, center: Vec2, radius: f64) -> Option<f64> {
    let oc = [origin[0] - center[0], origin[1] - center[1]];
    let b = 2.0 * (oc[0] * dir[0] + oc[1] * dir[1]);
    let c = oc[0] * oc[0] + oc[1] * oc[1] - radius * radius;
    let discriminant = b * b - 4.0 * c;
    if discriminant < 0.0 {
        return None;
    }
    let sqrt_disc = discriminant.sqrt();
    let t1 = (-b - sqrt_disc) / 2.0;
    let t2 = (-b + sqrt_disc) / 2.0;
    if t1 > 0.0 {
        Some(t1)
    } else if t2 > 0.0 {
        Some(t2)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_angle_stays_in_half_open_range() {
        for raw in [-10.0, -PI, 0.0, PI, 3.5 * PI, 100.0] {
            let w = wrap_angle(raw);
            assert!(w > -PI - 1e-12 && w <= PI + 1e-12, "{raw} -> {w}");
        }
        assert!((wrap_angle(3.0 * PI) - PI).abs() < 1e-9);
    }

    #[test]
    fn ray_circle_hits_circle_ahead_only() {
        let hit = ray_circle([0.0, 0.0], [1.0, 0.0], [10.0, 0.0], 2.0);
        assert!((hit.unwrap() - 8.0).abs() < 1e-9);
        assert!(ray_circle([0.0, 0.0], [-1.0, 0.0], [10.0, 0.0], 2.0).is_none());
        assert!(ray_circle([0.0, 0.0], [0.0, 1.0], [10.0, 0.0], 2.0).is_none());
    }
}
