//! Geometry shifts applied before drawing: translation, parallel offset
//! and arcs.

use std::borrow::Cow;

use glam::DVec2;

use super::defaults::{ARC_STEP_DEGREES, MITER_LIMIT_COS, PARALLEL_OFFSET};
use crate::shapefile::Line;
use crate::types::{Point, Rect};

/// Apply a style offset scaled by `factor`.
///
/// `offset_y == PARALLEL_OFFSET` shifts every line sideways by
/// `offset_x * factor` instead of translating it.
pub fn offset_lines(lines: &[Line], offset_x: f64, offset_y: f64, factor: f64) -> Cow<'_, [Line]> {
    if offset_y == PARALLEL_OFFSET {
        let distance = offset_x * factor;
        return Cow::Owned(lines.iter().map(|l| parallel_offset(l, distance)).collect());
    }
    if offset_x == 0.0 && offset_y == 0.0 {
        return Cow::Borrowed(lines);
    }
    Cow::Owned(translate(lines, DVec2::new(offset_x, offset_y) * factor))
}

pub fn translate(lines: &[Line], by: DVec2) -> Vec<Line> {
    lines
        .iter()
        .map(|line| Line::new(line.points.iter().map(|p| Point::from(p.xy() + by)).collect()))
        .collect()
}

/// Line running `distance` to the left of `line` (image coordinates, so
/// positive distances move an eastbound line down the image).
///
/// Interior vertices are mitered; joins sharper than the miter limit are
/// beveled with two points. Closed rings stay closed.
pub fn parallel_offset(line: &Line, distance: f64) -> Line {
    let mut pts: Vec<DVec2> = Vec::with_capacity(line.len());
    for p in &line.points {
        let p = p.xy();
        if pts.last() != Some(&p) {
            pts.push(p);
        }
    }
    if pts.len() < 2 {
        return Line::new(pts.into_iter().map(Point::from).collect());
    }

    let normals: Vec<DVec2> = pts.windows(2).map(|w| (w[1] - w[0]).normalize().perp()).collect();
    let closed = pts.len() > 3 && pts[0] == pts[pts.len() - 1];
    let last = normals.len() - 1;

    let mut out = Vec::with_capacity(pts.len());
    for (i, p) in pts.iter().enumerate() {
        let (before, after) = match i {
            0 if closed => (normals[last], normals[0]),
            0 => (normals[0], normals[0]),
            i if i == pts.len() - 1 && closed => (normals[last], normals[0]),
            i if i == pts.len() - 1 => (normals[last], normals[last]),
            i => (normals[i - 1], normals[i]),
        };
        join(&mut out, *p, before, after, distance);
    }
    if closed {
        if let Some(&first) = out.first() {
            if out.last() != Some(&first) {
                out.push(first);
            }
        }
    }
    Line::new(out.into_iter().map(Point::from).collect())
}

fn join(out: &mut Vec<DVec2>, p: DVec2, before: DVec2, after: DVec2, distance: f64) {
    let bisector = before + after;
    let cos_half = if bisector.length_squared() > 0.0 {
        bisector.normalize().dot(before)
    } else {
        0.0
    };
    if cos_half >= MITER_LIMIT_COS {
        out.push(p + bisector.normalize() * (distance / cos_half));
    } else {
        out.push(p + before * distance);
        out.push(p + after * distance);
    }
}

/// Polygon approximating the arc of `radius` around `center` from `start`
/// to `end` degrees, clockwise on the image. A slice also runs through
/// the center.
pub fn arc_polygon(center: DVec2, radius: f64, start: f64, end: f64, slice: bool) -> Line {
    let mut sweep = end - start;
    if sweep <= 0.0 {
        sweep += 360.0;
    }
    let sweep = sweep.min(360.0);
    let segments = (sweep / ARC_STEP_DEGREES).ceil().max(1.0) as usize;

    let mut points = Vec::with_capacity(segments + 3);
    if slice {
        points.push(center);
    }
    for i in 0..=segments {
        let a = (start + sweep * i as f64 / segments as f64).to_radians();
        points.push(center + DVec2::new(a.cos(), a.sin()) * radius);
    }
    if let Some(&first) = points.first() {
        points.push(first);
    }
    Line::new(points.into_iter().map(Point::from).collect())
}

/// Bounding box of every vertex.
pub fn lines_bounds(lines: &[Line]) -> Rect {
    let mut rect = Rect::EMPTY;
    for p in lines.iter().flat_map(|l| &l.points) {
        rect.expand_point(p.x, p.y);
    }
    rect
}
