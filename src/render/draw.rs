//! Drawing features with styles
//!
//! Every entry point resolves the style against its symbol and then picks
//! one of the renderer's primitives:
//!
//! - points draw the symbol directly, or stamp a cached tile when the
//!   backend prefers tiles
//! - lines stroke with a solid pen, place markers along the path, or use
//!   the symbol tile as a brush
//! - polygons fill solid, hatch, or tile the symbol across the interior

use camino::Utf8Path;
use glam::DVec2;

use super::canvas::Canvas;
use super::hatch::hatch_lines;
use super::markers::marker_positions;
use super::offset::{arc_polygon, lines_bounds, offset_lines};
use super::renderer::{Renderer, StrokeStyle};
use super::tile_cache::TileRequest;
use crate::errors::RenderError;
use crate::log::debug;
use crate::shapefile::Line;
use crate::symbol::{
    FontSet, LabelDef, LabelStyle, StyleDef, Symbol, SymbolSet, SymbolShape, SymbolStyle, compute_label_style,
    compute_symbol_style,
};

/// Draw `symbol` centered on `at` with the renderer's direct primitive.
///
/// Simple and hatch symbols have no point form and draw nothing.
pub(crate) fn render_symbol<R: Renderer>(
    renderer: &mut R,
    image: &mut R::Image,
    symbol: &Symbol,
    font: Option<&Utf8Path>,
    at: DVec2,
    style: &SymbolStyle,
) -> Result<(), RenderError> {
    match symbol {
        Symbol::Vector(s) => renderer.render_vector_symbol(image, at, s, style),
        Symbol::Pixmap(s) => renderer.render_pixmap_symbol(image, at, s, style),
        Symbol::Ellipse(s) => renderer.render_ellipse_symbol(image, at, s, style),
        Symbol::Truetype(s) => {
            let font = font.ok_or_else(|| RenderError::UnknownFont { name: s.font.clone() })?;
            renderer.render_truetype_symbol(image, at, s, font, style)
        }
        Symbol::Simple(_) | Symbol::Hatch(_) => {
            debug!(kind = symbol.kind_name(), "symbol kind has no point form");
            Ok(())
        }
    }
}

fn has_colors(symbol: &Symbol, style: &SymbolStyle) -> bool {
    symbol.is_pixmap() || style.color.is_some() || style.outline_color.is_some()
}

impl<R: Renderer> Canvas<R> {
    /// Load what a symbol needs before drawing: pixmap dimensions and the
    /// font file of a glyph.
    fn prepare_symbol<'s>(&mut self, symbols: &'s SymbolSet, symbol: &Symbol) -> Result<Option<&'s Utf8Path>, RenderError> {
        if let Symbol::Pixmap(pixmap) = symbol {
            let renderer = &mut self.renderer;
            pixmap.ensure_loaded(|path| renderer.load_pixmap(path))?;
        }
        symbols.font_for(symbol)
    }

    /// Width a marker occupies along a line.
    fn marker_width(&mut self, symbol: &Symbol, font: Option<&Utf8Path>, style: &SymbolStyle) -> Result<f64, RenderError> {
        match (symbol, font) {
            (Symbol::Truetype(glyph), Some(font)) => {
                let bbox = self.renderer.glyph_bbox(font, style.scale, &glyph.character)?;
                Ok(bbox.width())
            }
            _ => Ok((symbol.size_x() * style.scale).max(1.0)),
        }
    }

    /// Draw a point symbol at `at` (image pixels).
    pub fn draw_marker_symbol(
        &mut self,
        symbols: &SymbolSet,
        at: DVec2,
        style: &StyleDef,
        scale_factor: f64,
    ) -> Result<(), RenderError> {
        let symbol = symbols.symbol(style.symbol)?;
        let font = self.prepare_symbol(symbols, symbol)?;
        let s = compute_symbol_style(style, symbol, scale_factor);
        if !has_colors(symbol, &s) {
            debug!(symbol = style.symbol, "marker style has no color");
            return Ok(());
        }
        let at = at + DVec2::new(style.offset_x, style.offset_y) * scale_factor;

        if self.renderer.uses_image_cache() {
            let request = TileRequest {
                symbol: style.symbol,
                style: &s,
                size: None,
                seamless: false,
            };
            let tile = self.get_tile(symbols, request)?;
            return self.renderer.render_tile(&mut self.image, &tile, at);
        }
        render_symbol(&mut self.renderer, &mut self.image, symbol, font, at, &s)
    }

    /// Draw a line shape.
    pub fn draw_line_symbol(
        &mut self,
        symbols: &SymbolSet,
        lines: &[Line],
        style: &StyleDef,
        scale_factor: f64,
    ) -> Result<(), RenderError> {
        if lines.is_empty() {
            return Ok(());
        }
        let symbol = symbols.symbol(style.symbol)?;
        let width = (style.width * scale_factor)
            .min(style.max_width)
            .max(style.min_width);
        let lines = offset_lines(lines, style.offset_x, style.offset_y, width);

        if style.symbol == 0 || symbol.is_simple() {
            let color = style.color.or(style.outline_color).ok_or(RenderError::NoColor)?;
            let stroke = StrokeStyle {
                color,
                width,
                pattern: style.pattern.iter().map(|dash| dash * width).collect(),
                cap: style.line_cap,
                join: style.line_join,
                join_max_size: style.line_join_max_size,
            };
            return self.renderer.render_line(&mut self.image, &lines, &stroke);
        }

        if let Symbol::Hatch(_) = symbol {
            return Err(RenderError::UnsupportedSymbol {
                kind: symbol.kind_name(),
            });
        }
        let font = self.prepare_symbol(symbols, symbol)?;
        let s = compute_symbol_style(style, symbol, scale_factor);
        if style.gap != 0.0 {
            let symbol_width = self.marker_width(symbol, font, &s)?;
            let auto_angle = style.gap < 0.0;
            let placements = marker_positions(&lines, symbol_width, style.gap.abs(), auto_angle, s.rotation);
            debug!(markers = placements.len(), "placing line markers");
            for placement in placements {
                let marker = SymbolStyle {
                    rotation: placement.rotation,
                    ..s
                };
                render_symbol(&mut self.renderer, &mut self.image, symbol, font, placement.position, &marker)?;
            }
            return Ok(());
        }

        let request = TileRequest {
            symbol: style.symbol,
            style: &s,
            size: None,
            seamless: false,
        };
        let tile = self.get_tile(symbols, request)?;
        self.renderer.render_line_tiled(&mut self.image, &lines, &tile)
    }

    /// Fill a polygon shape.
    pub fn draw_shade_symbol(
        &mut self,
        symbols: &SymbolSet,
        rings: &[Line],
        style: &StyleDef,
        scale_factor: f64,
    ) -> Result<(), RenderError> {
        if rings.is_empty() {
            return Ok(());
        }
        let symbol = symbols.symbol(style.symbol)?;

        // An outline color without a fill color outlines the polygon.
        let fill = match style.color {
            Some(color) => Some(color),
            None if symbol.is_pixmap() => None,
            None if style.outline_color.is_some() => {
                return self.draw_line_symbol(symbols, rings, style, scale_factor);
            }
            None => {
                debug!(symbol = style.symbol, "shade style has no color");
                return Ok(());
            }
        };
        let rings = offset_lines(rings, style.offset_x, style.offset_y, scale_factor);

        if style.symbol == 0 || symbol.is_simple() {
            let Some(fill) = fill else {
                return Ok(());
            };
            self.renderer.render_polygon(&mut self.image, &rings, fill)?;
            if let Some(outline) = style.outline_color {
                let width = if style.width == 0.0 {
                    scale_factor
                } else {
                    style.width * scale_factor
                };
                let width = width.min(style.max_width).max(style.min_width);
                let stroke = StrokeStyle::solid(outline.with_alpha(fill.a), width);
                self.renderer.render_line(&mut self.image, &rings, &stroke)?;
            }
            return Ok(());
        }

        if let Symbol::Hatch(_) = symbol {
            let Some(fill) = fill else {
                return Ok(());
            };
            if let Some(background) = style.background_color {
                self.renderer.render_polygon(&mut self.image, &rings, background)?;
            }
            let width = if style.width <= 0.0 {
                scale_factor
            } else {
                style.width * scale_factor
            };
            let spacing = match style.size {
                Some(size) if size > 0.0 => size * scale_factor,
                _ => scale_factor,
            };
            let hatch = hatch_lines(&lines_bounds(&rings), style.angle, spacing);
            let stroke = StrokeStyle::solid(fill, width);
            return self.renderer.render_hatch(&mut self.image, &rings, &hatch, &stroke);
        }

        self.prepare_symbol(symbols, symbol)?;
        let s = compute_symbol_style(style, symbol, scale_factor);
        if !has_colors(symbol, &s) {
            return Ok(());
        }
        if let Some(background) = s.background_color {
            self.renderer.render_polygon(&mut self.image, &rings, background)?;
        }

        let (width, height) = pattern_tile_size(symbol, &s, style.gap);
        let seamless = matches!(symbol, Symbol::Vector(_)) && style.gap == 0.0 && self.renderer.seamless_tiles();
        let request = TileRequest {
            symbol: style.symbol,
            style: &s,
            size: Some((width, height)),
            seamless,
        };
        let tile = self.get_tile(symbols, request)?;
        self.renderer.render_polygon_tiled(&mut self.image, &rings, &tile)
    }

    /// Fill a circle of `radius` pixels around `center`.
    pub fn draw_circle_shade_symbol(
        &mut self,
        symbols: &SymbolSet,
        center: DVec2,
        radius: f64,
        style: &StyleDef,
        scale_factor: f64,
    ) -> Result<(), RenderError> {
        let circle = arc_polygon(center, radius, 0.0, 360.0, false);
        self.draw_shade_symbol(symbols, &[circle], style, scale_factor)
    }

    /// Stroke a circle of `radius` pixels around `center`.
    pub fn draw_circle_line_symbol(
        &mut self,
        symbols: &SymbolSet,
        center: DVec2,
        radius: f64,
        style: &StyleDef,
        scale_factor: f64,
    ) -> Result<(), RenderError> {
        let circle = arc_polygon(center, radius, 0.0, 360.0, false);
        self.draw_line_symbol(symbols, &[circle], style, scale_factor)
    }

    /// Fill the slice between `start` and `end` degrees, clockwise.
    ///
    /// A positive `offset_x` pulls the slice out of the pie along its
    /// bisector; no other offset applies.
    pub fn draw_pie_slice(
        &mut self,
        symbols: &SymbolSet,
        center: DVec2,
        style: &StyleDef,
        radius: f64,
        start: f64,
        end: f64,
    ) -> Result<(), RenderError> {
        let mut center = center;
        if style.offset_x > 0.0 {
            let mid = ((start + end) / 2.0).to_radians();
            center += DVec2::new(mid.cos(), mid.sin()) * style.offset_x;
        }
        let slice = arc_polygon(center, radius, start, end, true);
        let style = StyleDef {
            offset_x: 0.0,
            offset_y: 0.0,
            ..style.clone()
        };
        self.draw_shade_symbol(symbols, &[slice], &style, 1.0)
    }

    /// Draw `text` anchored at `at`, with its shadow and outline.
    pub fn draw_text(
        &mut self,
        at: DVec2,
        text: &str,
        label: &LabelDef,
        fontset: &FontSet,
        scale_factor: f64,
    ) -> Result<(), RenderError> {
        if text.is_empty() {
            return Ok(());
        }
        let style = compute_label_style(label, fontset, scale_factor)?;
        // Unrotated text snaps to whole pixels.
        let at = if style.rotation == 0.0 { at.round() } else { at };

        if let Some(shadow) = label.shadow_color {
            let (dx, dy) = label.shadow_offset;
            let shadow_style = LabelStyle {
                color: shadow,
                outline_color: None,
                outline_width: 0.0,
                ..style.clone()
            };
            let shadow_at = at + DVec2::new(dx, dy) * scale_factor;
            self.renderer.render_glyphs(&mut self.image, shadow_at, &shadow_style, text)?;
        }
        self.renderer.render_glyphs(&mut self.image, at, &style, text)
    }
}

/// Pattern cell for tiling a symbol: the scaled symbol plus `gap`.
fn pattern_tile_size(symbol: &Symbol, style: &SymbolStyle, gap: f64) -> (i64, i64) {
    let cell = |size: f64| {
        if style.scale != 1.0 {
            ((size * style.scale).round() + 1.0 + gap) as i64
        } else {
            (size + gap) as i64
        }
    };
    (cell(symbol.size_x()), cell(symbol.size_y()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::recording::RecordingRenderer;
    use crate::symbol::{EllipseSymbol, HatchSymbol, PixmapSymbol, TruetypeSymbol, VectorSymbol};
    use crate::types::Color;

    const RED: Color = Color::rgb(255, 0, 0);
    const BLUE: Color = Color::rgb(0, 0, 255);

    struct Fixture {
        symbols: SymbolSet,
        dot: usize,
        tick: usize,
        hatch: usize,
        glyph: usize,
        icon: usize,
    }

    fn fixture() -> Fixture {
        let mut symbols = SymbolSet::new().with_fontset(FontSet::new().with_font("sans", "sans.ttf"));
        let dot = symbols.add(EllipseSymbol {
            name: "dot".into(),
            width: 10.0,
            height: 10.0,
            filled: true,
        });
        let tick = symbols.add(VectorSymbol::from_pairs("tick", &[(0.0, 0.0), (10.0, 10.0)], false));
        let hatch = symbols.add(HatchSymbol { name: "hatch".into() });
        let glyph = symbols.add(TruetypeSymbol {
            name: "star".into(),
            font: "sans".into(),
            character: "*".into(),
        });
        let icon = symbols.add(PixmapSymbol::new("icon", "icon.png"));
        Fixture {
            symbols,
            dot,
            tick,
            hatch,
            glyph,
            icon,
        }
    }

    fn canvas() -> Canvas<RecordingRenderer> {
        Canvas::new(RecordingRenderer::new().with_pixmap("icon.png", 16, 12), 100, 100).unwrap()
    }

    fn square() -> Vec<Line> {
        vec![Line::from_xy(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0), (0.0, 0.0)])]
    }

    fn horizontal() -> Vec<Line> {
        vec![Line::from_xy(&[(0.0, 0.0), (100.0, 0.0)])]
    }

    // ==================== marker tests ====================

    #[test]
    fn marker_is_drawn_at_the_offset_point() {
        let f = fixture();
        let mut c = canvas();
        let style = StyleDef::default()
            .with_symbol(f.dot)
            .with_color(RED)
            .with_offset(2.0, 3.0);
        c.draw_marker_symbol(&f.symbols, DVec2::new(50.0, 50.0), &style, 2.0).unwrap();
        assert_eq!(c.image().calls, vec!["ellipse dot at 54,56 scale=2 rotation=0.00 fill=#ff0000"]);
    }

    #[test]
    fn marker_without_color_draws_nothing() {
        let f = fixture();
        let mut c = canvas();
        let style = StyleDef::default().with_symbol(f.dot);
        c.draw_marker_symbol(&f.symbols, DVec2::ZERO, &style, 1.0).unwrap();
        assert!(c.image().calls.is_empty());
    }

    #[test]
    fn pixmap_markers_load_the_image_once() {
        let f = fixture();
        let mut c = canvas();
        let style = StyleDef::default().with_symbol(f.icon);
        c.draw_marker_symbol(&f.symbols, DVec2::new(5.0, 5.0), &style, 1.0).unwrap();
        c.draw_marker_symbol(&f.symbols, DVec2::new(9.0, 5.0), &style, 1.0).unwrap();
        assert_eq!(c.image().calls.len(), 2);
        assert_eq!(f.symbols.symbol(f.icon).unwrap().size_y(), 12.0);
    }

    #[test]
    fn tile_backends_stamp_cached_tiles() {
        let f = fixture();
        let renderer = RecordingRenderer::new().with_image_cache();
        let mut c = Canvas::new(renderer, 100, 100).unwrap();
        let style = StyleDef::default().with_symbol(f.dot).with_color(RED);
        for x in [10.0, 20.0, 30.0] {
            c.draw_marker_symbol(&f.symbols, DVec2::new(x, 10.0), &style, 1.0).unwrap();
        }
        assert_eq!(c.renderer().symbol_renders(), 1);
        assert_eq!(
            c.image().calls,
            vec!["tile #2 at 10,10", "tile #2 at 20,10", "tile #2 at 30,10"]
        );
    }

    #[test]
    fn glyph_markers_need_a_known_font() {
        let f = fixture();
        let mut c = canvas();
        let style = StyleDef::default().with_symbol(f.glyph).with_color(BLUE).with_size(12.0);
        c.draw_marker_symbol(&f.symbols, DVec2::new(1.0, 2.0), &style, 1.0).unwrap();
        assert_eq!(
            c.image().calls,
            vec!["truetype star \"*\" font=sans.ttf at 1,2 scale=12 rotation=0.00 fill=#0000ff"]
        );

        let empty = SymbolSet::new();
        assert!(matches!(
            c.draw_marker_symbol(&empty, DVec2::ZERO, &style, 1.0),
            Err(RenderError::UnknownSymbol { .. })
        ));
    }

    // ==================== line tests ====================

    #[test]
    fn simple_lines_scale_their_dash_pattern() {
        let f = fixture();
        let mut c = canvas();
        let mut style = StyleDef::default().with_color(RED).with_width(2.0);
        style.pattern = vec![3.0, 1.0];
        c.draw_line_symbol(&f.symbols, &horizontal(), &style, 1.5).unwrap();
        assert_eq!(c.image().calls, vec!["line parts=1 points=2 color=#ff0000 width=3 dash=9,3"]);
    }

    #[test]
    fn lines_need_a_color() {
        let f = fixture();
        let mut c = canvas();
        let style = StyleDef::default();
        assert!(matches!(
            c.draw_line_symbol(&f.symbols, &horizontal(), &style, 1.0),
            Err(RenderError::NoColor)
        ));
    }

    #[test]
    fn positive_gap_places_markers() {
        let f = fixture();
        let mut c = canvas();
        let style = StyleDef::default().with_symbol(f.dot).with_color(RED).with_gap(20.0);
        c.draw_line_symbol(&f.symbols, &horizontal(), &style, 1.0).unwrap();
        let positions: Vec<&str> = c
            .image()
            .calls
            .iter()
            .filter_map(|call| call.split(" at ").nth(1))
            .filter_map(|rest| rest.split(' ').next())
            .collect();
        assert_eq!(positions, vec!["15,0", "45,0", "75,0"]);
    }

    #[test]
    fn negative_gap_orients_markers() {
        let f = fixture();
        let mut c = canvas();
        let style = StyleDef::default().with_symbol(f.tick).with_color(RED).with_gap(-20.0);
        let westward = vec![Line::from_xy(&[(100.0, 0.0), (0.0, 0.0)])];
        c.draw_line_symbol(&f.symbols, &westward, &style, 1.0).unwrap();
        assert!(!c.image().calls.is_empty());
        assert!(c.image().calls.iter().all(|call| call.contains("rotation=3.14")));
    }

    #[test]
    fn zero_gap_uses_the_symbol_as_a_brush() {
        let f = fixture();
        let mut c = canvas();
        let style = StyleDef::default().with_symbol(f.dot).with_color(RED);
        c.draw_line_symbol(&f.symbols, &horizontal(), &style, 1.0).unwrap();
        assert_eq!(c.image().calls, vec!["line-brush parts=1 points=2 tile=#2"]);
        assert_eq!(c.tile_cache().len(), 1);
    }

    #[test]
    fn hatch_symbols_cannot_stroke_lines() {
        let f = fixture();
        let mut c = canvas();
        let style = StyleDef::default().with_symbol(f.hatch).with_color(RED);
        assert!(matches!(
            c.draw_line_symbol(&f.symbols, &horizontal(), &style, 1.0),
            Err(RenderError::UnsupportedSymbol { kind: "hatch" })
        ));
    }

    #[test]
    fn parallel_offset_scales_with_the_width() {
        let f = fixture();
        let mut c = canvas();
        let style = StyleDef::default()
            .with_color(RED)
            .with_width(2.0)
            .with_offset(3.0, crate::render::defaults::PARALLEL_OFFSET);
        let lines = horizontal();
        c.draw_line_symbol(&f.symbols, &lines, &style, 1.0).unwrap();
        assert_eq!(c.image().calls.len(), 1);
        // Covered in detail by the offset tests; here only the call count
        // and that the original geometry was not modified.
        assert_eq!(lines, horizontal());
    }

    // ==================== polygon tests ====================

    #[test]
    fn solid_fill_with_outline() {
        let f = fixture();
        let mut c = canvas();
        let style = StyleDef::default()
            .with_color(RED.with_alpha(128))
            .with_outline_color(BLUE)
            .with_width(0.0);
        c.draw_shade_symbol(&f.symbols, &square(), &style, 2.0).unwrap();
        assert_eq!(
            c.image().calls,
            vec![
                "polygon rings=1 points=5 fill=#ff000080",
                "line parts=1 points=5 color=#0000ff80 width=2",
            ]
        );
    }

    #[test]
    fn outline_only_polygons_are_stroked() {
        let f = fixture();
        let mut c = canvas();
        let style = StyleDef::default().with_outline_color(BLUE);
        c.draw_shade_symbol(&f.symbols, &square(), &style, 1.0).unwrap();
        assert_eq!(c.image().calls, vec!["line parts=1 points=5 color=#0000ff width=1"]);
    }

    #[test]
    fn colorless_polygons_are_skipped() {
        let f = fixture();
        let mut c = canvas();
        c.draw_shade_symbol(&f.symbols, &square(), &StyleDef::default(), 1.0).unwrap();
        assert!(c.image().calls.is_empty());
    }

    #[test]
    fn hatch_fill_over_background() {
        let f = fixture();
        let mut c = canvas();
        let style = StyleDef::default()
            .with_symbol(f.hatch)
            .with_color(RED)
            .with_background_color(Color::WHITE)
            .with_size(5.0)
            .with_angle(90.0);
        c.draw_shade_symbol(&f.symbols, &square(), &style, 1.0).unwrap();
        assert_eq!(
            c.image().calls,
            vec![
                "polygon rings=1 points=5 fill=#ffffff",
                "hatch rings=1 lines=3 color=#ff0000 width=1",
            ]
        );
    }

    #[test]
    fn symbol_fill_tiles_the_pattern() {
        let f = fixture();
        let mut c = canvas();
        let mut style = StyleDef::default().with_symbol(f.dot).with_color(RED).with_size(20.0);
        style.gap = 4.0;
        c.draw_shade_symbol(&f.symbols, &square(), &style, 1.0).unwrap();
        // scale 2: round(10 * 2) + 1 + gap
        assert_eq!(c.image().calls, vec!["polygon-tiled rings=1 points=5 tile=#2 25x25"]);
    }

    #[test]
    fn seamless_tiles_for_vector_patterns() {
        let f = fixture();
        let mut c = Canvas::new(RecordingRenderer::new().with_seamless_tiles(), 100, 100).unwrap();
        let style = StyleDef::default().with_symbol(f.tick).with_color(RED);
        c.draw_shade_symbol(&f.symbols, &square(), &style, 1.0).unwrap();
        assert_eq!(c.renderer().symbol_renders(), 9);
    }

    // ==================== circle and text tests ====================

    #[test]
    fn circles_and_pie_slices_become_polygons() {
        let f = fixture();
        let mut c = canvas();
        let style = StyleDef::default().with_color(RED);
        c.draw_circle_shade_symbol(&f.symbols, DVec2::new(50.0, 50.0), 10.0, &style, 1.0).unwrap();
        c.draw_pie_slice(&f.symbols, DVec2::new(50.0, 50.0), &style, 10.0, 0.0, 90.0).unwrap();
        assert_eq!(
            c.image().calls,
            vec![
                "polygon rings=1 points=74 fill=#ff0000",
                "polygon rings=1 points=21 fill=#ff0000",
            ]
        );
    }

    #[test]
    fn text_draws_shadow_then_outlined_glyphs() {
        let mut c = canvas();
        let fonts = FontSet::new().with_font("sans", "sans.ttf");
        let label = LabelDef {
            shadow_color: Some(Color::rgb(128, 128, 128)),
            outline_color: Some(Color::WHITE),
            ..LabelDef::new("sans")
        };
        c.draw_text(DVec2::new(10.4, 20.6), "Main St", &label, &fonts, 1.0).unwrap();
        assert_eq!(
            c.image().calls,
            vec![
                "text \"Main St\" at 11,22 size=10 rotation=0.00 color=#808080",
                "text \"Main St\" at 10,21 size=10 rotation=0.00 color=#000000 outline=#ffffff width=1",
            ]
        );
    }
}
