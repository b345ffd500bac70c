//! Plain-data primitives shared by the storage and rendering layers.
//!
//! Map coordinates stay raw `f64` (they come straight off disk), but anything
//! a caller configures goes through a validating constructor.

use std::fmt;
use std::str::FromStr;

use glam::DVec2;

/// Error type for invalid numeric values
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumericError {
    /// Value is NaN
    NaN,
    /// Value is infinite
    Infinite,
    /// Value is zero when non-zero required
    Zero,
    /// Value is negative when positive required
    Negative,
}

impl fmt::Display for NumericError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumericError::NaN => write!(f, "value is NaN"),
            NumericError::Infinite => write!(f, "value is infinite"),
            NumericError::Zero => write!(f, "value is zero"),
            NumericError::Negative => write!(f, "value is negative"),
        }
    }
}

impl std::error::Error for NumericError {}

/// Validate a strictly positive, finite factor (scale factors, resolutions).
pub fn positive_factor(val: f64) -> Result<f64, NumericError> {
    if val.is_nan() {
        Err(NumericError::NaN)
    } else if val.is_infinite() {
        Err(NumericError::Infinite)
    } else if val == 0.0 {
        Err(NumericError::Zero)
    } else if val < 0.0 {
        Err(NumericError::Negative)
    } else {
        Ok(val)
    }
}

// ============================================================================
// Points and rectangles
// ============================================================================

/// A vertex with optional elevation (`z`) and measure (`m`).
///
/// Files without Z or M data decode those fields as `0.0`.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub m: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Point { x, y, z: 0.0, m: 0.0 }
    }

    pub const fn with_zm(x: f64, y: f64, z: f64, m: f64) -> Self {
        Point { x, y, z, m }
    }

    /// Planar position as a glam vector.
    #[inline]
    pub fn xy(self) -> DVec2 {
        DVec2::new(self.x, self.y)
    }
}

impl From<DVec2> for Point {
    fn from(v: DVec2) -> Self {
        Point::new(v.x, v.y)
    }
}

/// Axis-aligned rectangle in map or image units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    pub minx: f64,
    pub miny: f64,
    pub maxx: f64,
    pub maxy: f64,
}

impl Default for Rect {
    fn default() -> Self {
        Rect::EMPTY
    }
}

impl Rect {
    /// A rectangle that expands to the first point added to it.
    pub const EMPTY: Rect = Rect {
        minx: f64::MAX,
        miny: f64::MAX,
        maxx: f64::MIN,
        maxy: f64::MIN,
    };

    pub const fn new(minx: f64, miny: f64, maxx: f64, maxy: f64) -> Self {
        Rect { minx, miny, maxx, maxy }
    }

    /// Degenerate rectangle covering a single point.
    pub const fn from_point(x: f64, y: f64) -> Self {
        Rect { minx: x, miny: y, maxx: x, maxy: y }
    }

    /// Check if the rect is empty (never expanded)
    pub fn is_empty(&self) -> bool {
        self.minx > self.maxx || self.miny > self.maxy
    }

    pub fn expand_point(&mut self, x: f64, y: f64) {
        self.minx = self.minx.min(x);
        self.miny = self.miny.min(y);
        self.maxx = self.maxx.max(x);
        self.maxy = self.maxy.max(y);
    }

    pub fn expand_rect(&mut self, other: &Rect) {
        if other.is_empty() {
            return;
        }
        self.expand_point(other.minx, other.miny);
        self.expand_point(other.maxx, other.maxy);
    }

    /// Axis-aligned overlap test. Touching edges count as overlapping.
    pub fn overlaps(&self, other: &Rect) -> bool {
        !(self.minx > other.maxx
            || self.maxx < other.minx
            || self.miny > other.maxy
            || self.maxy < other.miny)
    }

    /// True when `self` lies entirely inside `outer` (edges inclusive).
    pub fn is_contained_in(&self, outer: &Rect) -> bool {
        self.minx >= outer.minx
            && self.maxx <= outer.maxx
            && self.miny >= outer.miny
            && self.maxy <= outer.maxy
    }

    /// Grow every side by `amount`.
    pub fn buffered(&self, amount: f64) -> Rect {
        Rect {
            minx: self.minx - amount,
            miny: self.miny - amount,
            maxx: self.maxx + amount,
            maxy: self.maxy + amount,
        }
    }

    pub fn translated(&self, dx: f64, dy: f64) -> Rect {
        Rect {
            minx: self.minx + dx,
            miny: self.miny + dy,
            maxx: self.maxx + dx,
            maxy: self.maxy + dy,
        }
    }

    pub fn width(&self) -> f64 {
        self.maxx - self.minx
    }

    pub fn height(&self) -> f64 {
        self.maxy - self.miny
    }

    pub fn center(&self) -> DVec2 {
        DVec2::new((self.minx + self.maxx) / 2.0, (self.miny + self.maxy) / 2.0)
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} {}, {} {})", self.minx, self.miny, self.maxx, self.maxy)
    }
}

// ============================================================================
// Angles and colors
// ============================================================================

/// Angle in degrees, as written in style declarations.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Default)]
pub struct Angle(pub f64);

impl Angle {
    #[inline]
    pub fn to_radians(self) -> f64 {
        self.0.to_radians()
    }

    /// Fold into `[0, 360)`.
    pub fn normalized(self) -> Angle {
        Angle(self.0.rem_euclid(360.0))
    }
}

impl fmt::Display for Angle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 8-bit RGBA color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Color { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Color { r, g, b, a }
    }

    pub const fn with_alpha(self, a: u8) -> Self {
        Color { a, ..self }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a == 255 {
            write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            write!(f, "#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

/// Error returned when a `#rrggbb[aa]` color fails to parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorParseError(pub String);

impl fmt::Display for ColorParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid color `{}`, expected #rrggbb or #rrggbbaa", self.0)
    }
}

impl std::error::Error for ColorParseError {}

impl FromStr for Color {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ColorParseError(s.to_string());
        let hex = s.strip_prefix('#').ok_or_else(err)?;
        if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
            return Err(err());
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| err());
        let a = if hex.len() == 8 { channel(6)? } else { 255 };
        Ok(Color::rgba(channel(0)?, channel(2)?, channel(4)?, a))
    }
}
