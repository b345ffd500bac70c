//! A renderer that writes down what it is asked to draw.
//!
//! Each call is recorded as one line of text on the target image and in a
//! renderer-wide log prefixed with the image id. Useful for debugging
//! drawing code and as a test double.

use std::collections::HashMap;

use camino::{Utf8Path, Utf8PathBuf};
use glam::DVec2;

use super::renderer::{Renderer, StrokeStyle};
use crate::errors::RenderError;
use crate::shapefile::Line;
use crate::symbol::{
    EllipseSymbol, LabelStyle, PixmapSymbol, SymbolStyle, TruetypeSymbol, VectorSymbol,
};
use crate::types::{Color, Rect};

/// Glyph advance as a fraction of the font size.
const GLYPH_ADVANCE: f64 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedImage {
    pub id: usize,
    pub width: u32,
    pub height: u32,
    pub resolution: f64,
    pub calls: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RecordingRenderer {
    images_created: usize,
    symbol_renders: usize,
    image_cache: bool,
    seamless: bool,
    pixmaps: HashMap<Utf8PathBuf, (u32, u32)>,
    log: Vec<String>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw point symbols through cached tiles.
    pub fn with_image_cache(mut self) -> Self {
        self.image_cache = true;
        self
    }

    pub fn with_seamless_tiles(mut self) -> Self {
        self.seamless = true;
        self
    }

    /// Make `path` loadable as a `width` x `height` pixmap.
    pub fn with_pixmap(mut self, path: impl Into<Utf8PathBuf>, width: u32, height: u32) -> Self {
        self.pixmaps.insert(path.into(), (width, height));
        self
    }

    pub fn images_created(&self) -> usize {
        self.images_created
    }

    /// Number of point symbols drawn, on any image.
    pub fn symbol_renders(&self) -> usize {
        self.symbol_renders
    }

    pub fn log(&self) -> &[String] {
        &self.log
    }

    fn record(&mut self, image: &mut RecordedImage, call: String) {
        self.log.push(format!("#{} {call}", image.id));
        image.calls.push(call);
    }

    fn record_symbol(&mut self, image: &mut RecordedImage, call: String) {
        self.symbol_renders += 1;
        self.record(image, call);
    }
}

fn point(p: DVec2) -> String {
    format!("{},{}", p.x, p.y)
}

fn point_count(lines: &[Line]) -> usize {
    lines.iter().map(Line::len).sum()
}

fn stroke(s: &StrokeStyle) -> String {
    let mut out = format!("color={} width={}", s.color, s.width);
    if !s.pattern.is_empty() {
        let dashes: Vec<String> = s.pattern.iter().map(f64::to_string).collect();
        out.push_str(&format!(" dash={}", dashes.join(",")));
    }
    out
}

fn symbol_style(s: &SymbolStyle) -> String {
    let mut out = format!("scale={} rotation={:.2}", s.scale, s.rotation);
    if let Some(c) = s.color {
        out.push_str(&format!(" fill={c}"));
    }
    if let Some(c) = s.outline_color {
        out.push_str(&format!(" outline={c} width={}", s.outline_width));
    }
    if let Some(c) = s.background_color {
        out.push_str(&format!(" background={c}"));
    }
    out
}

impl Renderer for RecordingRenderer {
    type Image = RecordedImage;

    fn create_image(&mut self, width: u32, height: u32, resolution: f64) -> Result<RecordedImage, RenderError> {
        self.images_created += 1;
        Ok(RecordedImage {
            id: self.images_created,
            width,
            height,
            resolution,
            calls: Vec::new(),
        })
    }

    fn render_line(&mut self, image: &mut RecordedImage, lines: &[Line], s: &StrokeStyle) -> Result<(), RenderError> {
        let call = format!("line parts={} points={} {}", lines.len(), point_count(lines), stroke(s));
        self.record(image, call);
        Ok(())
    }

    fn render_line_tiled(&mut self, image: &mut RecordedImage, lines: &[Line], tile: &RecordedImage) -> Result<(), RenderError> {
        let call = format!("line-brush parts={} points={} tile=#{}", lines.len(), point_count(lines), tile.id);
        self.record(image, call);
        Ok(())
    }

    fn render_polygon(&mut self, image: &mut RecordedImage, rings: &[Line], color: Color) -> Result<(), RenderError> {
        let call = format!("polygon rings={} points={} fill={color}", rings.len(), point_count(rings));
        self.record(image, call);
        Ok(())
    }

    fn render_polygon_tiled(&mut self, image: &mut RecordedImage, rings: &[Line], tile: &RecordedImage) -> Result<(), RenderError> {
        let call = format!(
            "polygon-tiled rings={} points={} tile=#{} {}x{}",
            rings.len(),
            point_count(rings),
            tile.id,
            tile.width,
            tile.height
        );
        self.record(image, call);
        Ok(())
    }

    fn render_hatch(
        &mut self,
        image: &mut RecordedImage,
        rings: &[Line],
        hatch: &[Line],
        s: &StrokeStyle,
    ) -> Result<(), RenderError> {
        let call = format!("hatch rings={} lines={} {}", rings.len(), hatch.len(), stroke(s));
        self.record(image, call);
        Ok(())
    }

    fn render_vector_symbol(
        &mut self,
        image: &mut RecordedImage,
        at: DVec2,
        symbol: &VectorSymbol,
        style: &SymbolStyle,
    ) -> Result<(), RenderError> {
        let call = format!("vector {} at {} {}", symbol.name, point(at), symbol_style(style));
        self.record_symbol(image, call);
        Ok(())
    }

    fn render_pixmap_symbol(
        &mut self,
        image: &mut RecordedImage,
        at: DVec2,
        symbol: &PixmapSymbol,
        style: &SymbolStyle,
    ) -> Result<(), RenderError> {
        let call = format!("pixmap {} at {} {}", symbol.name, point(at), symbol_style(style));
        self.record_symbol(image, call);
        Ok(())
    }

    fn render_ellipse_symbol(
        &mut self,
        image: &mut RecordedImage,
        at: DVec2,
        symbol: &EllipseSymbol,
        style: &SymbolStyle,
    ) -> Result<(), RenderError> {
        let call = format!("ellipse {} at {} {}", symbol.name, point(at), symbol_style(style));
        self.record_symbol(image, call);
        Ok(())
    }

    fn render_truetype_symbol(
        &mut self,
        image: &mut RecordedImage,
        at: DVec2,
        symbol: &TruetypeSymbol,
        font: &Utf8Path,
        style: &SymbolStyle,
    ) -> Result<(), RenderError> {
        let call = format!(
            "truetype {} {:?} font={font} at {} {}",
            symbol.name,
            symbol.character,
            point(at),
            symbol_style(style)
        );
        self.record_symbol(image, call);
        Ok(())
    }

    fn render_tile(&mut self, image: &mut RecordedImage, tile: &RecordedImage, at: DVec2) -> Result<(), RenderError> {
        let call = format!("tile #{} at {}", tile.id, point(at));
        self.record(image, call);
        Ok(())
    }

    fn merge_raster(
        &mut self,
        dst: &mut RecordedImage,
        src: &RecordedImage,
        opacity: f64,
        src_origin: (u32, u32),
        dst_origin: (u32, u32),
        size: (u32, u32),
    ) -> Result<(), RenderError> {
        let call = format!(
            "merge #{} {},{} -> {},{} {}x{} opacity={opacity}",
            src.id, src_origin.0, src_origin.1, dst_origin.0, dst_origin.1, size.0, size.1
        );
        self.record(dst, call);
        Ok(())
    }

    fn render_glyphs(&mut self, image: &mut RecordedImage, at: DVec2, style: &LabelStyle, text: &str) -> Result<(), RenderError> {
        let mut call = format!(
            "text {text:?} at {} size={} rotation={:.2} color={}",
            point(at),
            style.size,
            style.rotation,
            style.color
        );
        if let Some(c) = style.outline_color {
            call.push_str(&format!(" outline={c} width={}", style.outline_width));
        }
        self.record(image, call);
        Ok(())
    }

    fn glyph_bbox(&mut self, _font: &Utf8Path, size: f64, text: &str) -> Result<Rect, RenderError> {
        let width = text.chars().count() as f64 * size * GLYPH_ADVANCE;
        Ok(Rect::new(0.0, -size, width, 0.0))
    }

    fn load_pixmap(&mut self, path: &Utf8Path) -> Result<(u32, u32), RenderError> {
        self.pixmaps
            .get(path)
            .copied()
            .ok_or_else(|| RenderError::Backend {
                message: format!("cannot load pixmap {path}"),
            })
    }

    fn uses_image_cache(&self) -> bool {
        self.image_cache
    }

    fn seamless_tiles(&self) -> bool {
        self.seamless
    }
}
