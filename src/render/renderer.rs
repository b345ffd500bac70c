//! Backend capability surface
//!
//! Drawing code is written against [`Renderer`] only. A backend owns its
//! image type and decides how strokes, fills and symbols become pixels.

use camino::Utf8Path;
use glam::DVec2;

use crate::errors::RenderError;
use crate::shapefile::Line;
use crate::symbol::{
    EllipseSymbol, LabelStyle, LineCap, LineJoin, PixmapSymbol, SymbolStyle, TruetypeSymbol,
    VectorSymbol,
};
use crate::types::{Color, Rect};

/// Solid line stroke.
#[derive(Debug, Clone, PartialEq)]
pub struct StrokeStyle {
    pub color: Color,
    pub width: f64,
    /// Dash lengths in pixels; empty for a solid line.
    pub pattern: Vec<f64>,
    pub cap: LineCap,
    pub join: LineJoin,
    pub join_max_size: f64,
}

impl StrokeStyle {
    pub fn solid(color: Color, width: f64) -> Self {
        StrokeStyle {
            color,
            width,
            pattern: Vec::new(),
            cap: LineCap::default(),
            join: LineJoin::default(),
            join_max_size: super::defaults::LINE_JOIN_MAX_SIZE,
        }
    }
}

pub trait Renderer {
    type Image;

    fn create_image(&mut self, width: u32, height: u32, resolution: f64) -> Result<Self::Image, RenderError>;

    fn render_line(&mut self, image: &mut Self::Image, lines: &[Line], stroke: &StrokeStyle) -> Result<(), RenderError>;

    /// Stroke `lines` with `tile` repeated as a brush.
    fn render_line_tiled(&mut self, image: &mut Self::Image, lines: &[Line], tile: &Self::Image) -> Result<(), RenderError>;

    fn render_polygon(&mut self, image: &mut Self::Image, rings: &[Line], color: Color) -> Result<(), RenderError>;

    /// Fill `rings` with `tile` repeated from the image origin.
    fn render_polygon_tiled(&mut self, image: &mut Self::Image, rings: &[Line], tile: &Self::Image) -> Result<(), RenderError>;

    /// Stroke `hatch` clipped to the inside of `rings`.
    fn render_hatch(
        &mut self,
        image: &mut Self::Image,
        rings: &[Line],
        hatch: &[Line],
        stroke: &StrokeStyle,
    ) -> Result<(), RenderError>;

    fn render_vector_symbol(
        &mut self,
        image: &mut Self::Image,
        at: DVec2,
        symbol: &VectorSymbol,
        style: &SymbolStyle,
    ) -> Result<(), RenderError>;

    fn render_pixmap_symbol(
        &mut self,
        image: &mut Self::Image,
        at: DVec2,
        symbol: &PixmapSymbol,
        style: &SymbolStyle,
    ) -> Result<(), RenderError>;

    fn render_ellipse_symbol(
        &mut self,
        image: &mut Self::Image,
        at: DVec2,
        symbol: &EllipseSymbol,
        style: &SymbolStyle,
    ) -> Result<(), RenderError>;

    fn render_truetype_symbol(
        &mut self,
        image: &mut Self::Image,
        at: DVec2,
        symbol: &TruetypeSymbol,
        font: &Utf8Path,
        style: &SymbolStyle,
    ) -> Result<(), RenderError>;

    /// Draw a cached symbol tile centered on `at`.
    fn render_tile(&mut self, image: &mut Self::Image, tile: &Self::Image, at: DVec2) -> Result<(), RenderError>;

    /// Blend a `size` region of `src` at `src_origin` into `dst` at `dst_origin`.
    fn merge_raster(
        &mut self,
        dst: &mut Self::Image,
        src: &Self::Image,
        opacity: f64,
        src_origin: (u32, u32),
        dst_origin: (u32, u32),
        size: (u32, u32),
    ) -> Result<(), RenderError>;

    fn render_glyphs(&mut self, image: &mut Self::Image, at: DVec2, style: &LabelStyle, text: &str) -> Result<(), RenderError>;

    /// Extent of `text` relative to its anchor point.
    fn glyph_bbox(&mut self, font: &Utf8Path, size: f64, text: &str) -> Result<Rect, RenderError>;

    /// Read a pixmap's dimensions.
    fn load_pixmap(&mut self, path: &Utf8Path) -> Result<(u32, u32), RenderError>;

    /// Draw point symbols through cached tiles instead of directly.
    fn uses_image_cache(&self) -> bool {
        false
    }

    /// Antialiased output whose repeated tiles need seamless edges.
    fn seamless_tiles(&self) -> bool {
        false
    }
}
