//! Default sizes and settings (pixels unless noted)

/// Cached symbol tiles per image.
pub const TILE_CACHE_CAPACITY: usize = 6;

/// Output resolution in dots per inch.
pub const RESOLUTION: f64 = 72.0;

pub const STYLE_MIN_SIZE: f64 = 0.0;
pub const STYLE_MAX_SIZE: f64 = 500.0;
pub const STYLE_WIDTH: f64 = 1.0;
pub const STYLE_MIN_WIDTH: f64 = 0.0;
pub const STYLE_MAX_WIDTH: f64 = 32.0;
pub const LINE_JOIN_MAX_SIZE: f64 = 3.0;

/// `offsety` value requesting a parallel offset instead of a translation.
pub const PARALLEL_OFFSET: f64 = -99.0;

/// Vector symbol coordinate pair that lifts the pen.
pub const PEN_UP: f64 = -99.0;

pub const LABEL_SIZE: f64 = 10.0;
pub const LABEL_MIN_SIZE: f64 = 4.0;
pub const LABEL_MAX_SIZE: f64 = 256.0;

/// Angular step (degrees) when turning arcs into polygons.
pub const ARC_STEP_DEGREES: f64 = 5.0;

/// Miters sharper than this (cosine of the half angle) are beveled.
pub const MITER_LIMIT_COS: f64 = 0.25;
