//! Hatch line generation
//!
//! A hatch is a family of parallel lines `step` apart, measured
//! perpendicular to the lines, clipped to a rectangle. Lines are aligned to
//! multiples of `step` from the origin so neighbouring shapes hatch
//! continuously.

use glam::DVec2;

use crate::shapefile::Line;
use crate::types::{Angle, Rect};

/// Hatch lines at `angle` covering `rect`.
///
/// Horizontal and vertical hatches are generated directly. Other angles
/// clip each line of the family against the rectangle.
pub fn hatch_lines(rect: &Rect, angle: Angle, step: f64) -> Vec<Line> {
    if rect.is_empty() || step.is_nan() || step <= 0.0 || step.is_infinite() {
        return Vec::new();
    }
    let degrees = angle.0.rem_euclid(180.0);
    if degrees == 0.0 {
        return steps(rect.miny, rect.maxy, step)
            .map(|y| Line::from_xy(&[(rect.minx, y), (rect.maxx, y)]))
            .collect();
    }
    if degrees == 90.0 {
        return steps(rect.minx, rect.maxx, step)
            .map(|x| Line::from_xy(&[(x, rect.miny), (x, rect.maxy)]))
            .collect();
    }

    let theta = degrees.to_radians();
    let direction = DVec2::new(theta.cos(), theta.sin());
    let normal = direction.perp();
    let corners = [
        DVec2::new(rect.minx, rect.miny),
        DVec2::new(rect.maxx, rect.miny),
        DVec2::new(rect.minx, rect.maxy),
        DVec2::new(rect.maxx, rect.maxy),
    ];
    let (lo, hi) = corners.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), c| {
        let d = c.dot(normal);
        (lo.min(d), hi.max(d))
    });

    steps(lo, hi, step)
        .filter_map(|d| clip_line(normal * d, direction, rect))
        .map(|(a, b)| Line::from_xy(&[(a.x, a.y), (b.x, b.y)]))
        .collect()
}

/// Multiples of `step` within `[lo, hi]`.
fn steps(lo: f64, hi: f64, step: f64) -> impl Iterator<Item = f64> {
    let first = (lo / step).ceil() as i64;
    let last = (hi / step).floor() as i64;
    (first..=last).map(move |k| k as f64 * step)
}

/// Clip the infinite line `origin + t * direction` to `rect`.
fn clip_line(origin: DVec2, direction: DVec2, rect: &Rect) -> Option<(DVec2, DVec2)> {
    let mut t0 = f64::NEG_INFINITY;
    let mut t1 = f64::INFINITY;
    for (o, d, min, max) in [
        (origin.x, direction.x, rect.minx, rect.maxx),
        (origin.y, direction.y, rect.miny, rect.maxy),
    ] {
        if d == 0.0 {
            if o < min || o > max {
                return None;
            }
            continue;
        }
        let (a, b) = ((min - o) / d, (max - o) / d);
        t0 = t0.max(a.min(b));
        t1 = t1.min(a.max(b));
    }
    (t0 < t1).then(|| (origin + direction * t0, origin + direction * t1))
}
