//! Marker placement along polylines
//!
//! Markers sit `symbol_width + spacing` apart along each line. The first
//! one is inset by half that step, and the distance still owed carries over
//! vertices, so spacing does not restart at every segment.

use std::f64::consts::PI;

use glam::DVec2;

use crate::shapefile::Line;

/// Where one marker goes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerPlacement {
    pub position: DVec2,
    /// Radians.
    pub rotation: f64,
}

/// Direction of a unit segment vector as a marker rotation.
///
/// Image y grows downward, so angles are mirrored against the usual
/// mathematical convention.
pub fn segment_angle(direction: DVec2) -> f64 {
    let theta = direction.y.clamp(-1.0, 1.0).asin();
    if direction.x < 0.0 { theta + PI } else { -theta }
}

/// Positions for markers `symbol_width` wide, `spacing` apart.
///
/// With `auto_angle` each marker turns with its segment, on top of
/// `base_rotation`. A line too short to hold a marker at the regular
/// spacing, but longer than the marker itself, gets one at its midpoint.
pub fn marker_positions(
    lines: &[Line],
    symbol_width: f64,
    spacing: f64,
    auto_angle: bool,
    base_rotation: f64,
) -> Vec<MarkerPlacement> {
    let step = symbol_width + spacing;
    let mut placements = Vec::new();
    if step <= 0.0 {
        return placements;
    }
    let rotation = |direction: DVec2| {
        if auto_angle {
            base_rotation + segment_angle(direction)
        } else {
            base_rotation
        }
    };

    for line in lines {
        let mut current = step / 2.0;
        let mut line_length = 0.0;
        let mut placed_on_line = false;

        for w in line.points.windows(2) {
            let (a, b) = (w[0].xy(), w[1].xy());
            let length = a.distance(b);
            line_length += length;
            if length == 0.0 {
                continue;
            }
            let direction = (b - a) / length;
            let mut placed_on_segment = false;
            while current <= length {
                placements.push(MarkerPlacement {
                    position: a + direction * current,
                    rotation: rotation(direction),
                });
                current += step;
                placed_on_segment = true;
                placed_on_line = true;
            }
            if placed_on_segment {
                current -= length + symbol_width / 2.0;
            } else {
                current -= length;
            }
        }

        if !placed_on_line && line_length > symbol_width {
            if let Some(mid) = midpoint(line, line_length / 2.0) {
                placements.push(MarkerPlacement {
                    position: mid.0,
                    rotation: rotation(mid.1),
                });
            }
        }
    }
    placements
}

/// Point `distance` along `line`, with the direction of its segment.
fn midpoint(line: &Line, distance: f64) -> Option<(DVec2, DVec2)> {
    let mut before = 0.0;
    for w in line.points.windows(2) {
        let (a, b) = (w[0].xy(), w[1].xy());
        let length = a.distance(b);
        if length > 0.0 && before + length > distance {
            let direction = (b - a) / length;
            return Some((a + direction * (distance - before), direction));
        }
        before += length;
    }
    None
}
