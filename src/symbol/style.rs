//! Style declarations and the per-draw styles derived from them.
//!
//! [`StyleDef`] and [`LabelDef`] hold what a map author wrote. Before each
//! draw they are resolved against a symbol (or font set) and the current
//! scale factor into a [`SymbolStyle`] or [`LabelStyle`], which is all a
//! renderer sees.

use camino::Utf8PathBuf;

use super::{FontSet, Symbol, SymbolShape};
use crate::errors::RenderError;
use crate::render::defaults;
use crate::types::{Angle, Color};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineCap {
    Butt,
    #[default]
    Round,
    Square,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineJoin {
    #[default]
    Round,
    Miter,
    Bevel,
    None,
}

/// One STYLE block.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleDef {
    /// Index into the symbol set; 0 draws plain strokes and fills.
    pub symbol: usize,
    pub color: Option<Color>,
    pub background_color: Option<Color>,
    pub outline_color: Option<Color>,
    /// Explicit size; the symbol's own size when unset.
    pub size: Option<f64>,
    pub min_size: f64,
    pub max_size: f64,
    pub width: f64,
    pub min_width: f64,
    pub max_width: f64,
    pub offset_x: f64,
    /// [`defaults::PARALLEL_OFFSET`] turns `offset_x` into a parallel offset.
    pub offset_y: f64,
    pub angle: Angle,
    /// Marker spacing along lines. Negative spacing also orients markers
    /// along the line; zero uses the symbol as a brush.
    pub gap: f64,
    /// Dash lengths in multiples of the line width.
    pub pattern: Vec<f64>,
    pub line_cap: LineCap,
    pub line_join: LineJoin,
    pub line_join_max_size: f64,
}

impl Default for StyleDef {
    fn default() -> Self {
        StyleDef {
            symbol: 0,
            color: None,
            background_color: None,
            outline_color: None,
            size: None,
            min_size: defaults::STYLE_MIN_SIZE,
            max_size: defaults::STYLE_MAX_SIZE,
            width: defaults::STYLE_WIDTH,
            min_width: defaults::STYLE_MIN_WIDTH,
            max_width: defaults::STYLE_MAX_WIDTH,
            offset_x: 0.0,
            offset_y: 0.0,
            angle: Angle(0.0),
            gap: 0.0,
            pattern: Vec::new(),
            line_cap: LineCap::default(),
            line_join: LineJoin::default(),
            line_join_max_size: defaults::LINE_JOIN_MAX_SIZE,
        }
    }
}

impl StyleDef {
    pub fn with_symbol(mut self, symbol: usize) -> Self {
        self.symbol = symbol;
        self
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }

    pub fn with_outline_color(mut self, color: Color) -> Self {
        self.outline_color = Some(color);
        self
    }

    pub fn with_background_color(mut self, color: Color) -> Self {
        self.background_color = Some(color);
        self
    }

    pub fn with_size(mut self, size: f64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_width(mut self, width: f64) -> Self {
        self.width = width;
        self
    }

    pub fn with_gap(mut self, gap: f64) -> Self {
        self.gap = gap;
        self
    }

    pub fn with_angle(mut self, degrees: f64) -> Self {
        self.angle = Angle(degrees);
        self
    }

    pub fn with_offset(mut self, x: f64, y: f64) -> Self {
        self.offset_x = x;
        self.offset_y = y;
        self
    }

    /// Whether `offset_y` holds the parallel offset marker.
    pub fn is_parallel_offset(&self) -> bool {
        self.offset_y == defaults::PARALLEL_OFFSET
    }
}

/// Style handed to a renderer for one symbol draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SymbolStyle {
    /// Fill color.
    pub color: Option<Color>,
    pub outline_color: Option<Color>,
    pub background_color: Option<Color>,
    /// Factor from symbol coordinates to pixels.
    pub scale: f64,
    /// Zero whenever `outline_color` is unset.
    pub outline_width: f64,
    /// Radians.
    pub rotation: f64,
}

/// Pixel size a style asks for, clamped to `[min_size, max_size]`.
pub fn target_size(style: &StyleDef, symbol: &Symbol, scale_factor: f64) -> f64 {
    let size = style.size.unwrap_or_else(|| symbol.default_size());
    (size * scale_factor).max(style.min_size).min(style.max_size)
}

/// Resolve a style against the symbol it draws.
///
/// Pixmaps bring their own colors. Filled symbols and glyphs use `color` as
/// fill and `outline_color` as stroke. Open vector paths have no fill, so
/// `color` (or failing that `outline_color`) becomes their stroke.
pub fn compute_symbol_style(style: &StyleDef, symbol: &Symbol, scale_factor: f64) -> SymbolStyle {
    let (color, outline_color) = match symbol {
        Symbol::Pixmap(_) => (None, None),
        Symbol::Truetype(_) => (style.color, style.outline_color),
        s if s.is_filled() => (style.color, style.outline_color),
        _ => (None, style.color.or(style.outline_color)),
    };

    let outline_width = if outline_color.is_some() {
        (style.width * scale_factor)
            .max(style.min_width)
            .min(style.max_width)
    } else {
        0.0
    };

    SymbolStyle {
        color,
        outline_color,
        background_color: style.background_color,
        scale: target_size(style, symbol, scale_factor) / symbol.default_size(),
        outline_width,
        rotation: style.angle.to_radians(),
    }
}

// ============================================================================
// Labels
// ============================================================================

/// One LABEL block.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelDef {
    /// Font set alias.
    pub font: String,
    pub size: f64,
    pub min_size: f64,
    pub max_size: f64,
    pub color: Option<Color>,
    pub outline_color: Option<Color>,
    pub outline_width: f64,
    pub shadow_color: Option<Color>,
    pub shadow_offset: (f64, f64),
    pub angle: Angle,
    pub offset: (f64, f64),
    /// Clearance around the text kept free of other labels.
    pub buffer: f64,
    /// Higher priorities are placed first.
    pub priority: i32,
    /// Allow labels that run off the image.
    pub partials: bool,
}

impl Default for LabelDef {
    fn default() -> Self {
        LabelDef {
            font: String::new(),
            size: defaults::LABEL_SIZE,
            min_size: defaults::LABEL_MIN_SIZE,
            max_size: defaults::LABEL_MAX_SIZE,
            color: Some(Color::BLACK),
            outline_color: None,
            outline_width: 1.0,
            shadow_color: None,
            shadow_offset: (1.0, 1.0),
            angle: Angle(0.0),
            offset: (0.0, 0.0),
            buffer: 0.0,
            priority: 1,
            partials: true,
        }
    }
}

impl LabelDef {
    pub fn new(font: impl Into<String>) -> Self {
        LabelDef {
            font: font.into(),
            ..Self::default()
        }
    }
}

/// Style handed to a renderer for one run of glyphs.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelStyle {
    pub font: Utf8PathBuf,
    pub size: f64,
    /// Radians.
    pub rotation: f64,
    pub color: Color,
    pub outline_color: Option<Color>,
    pub outline_width: f64,
}

/// Resolve a label's font and scale its size.
pub fn compute_label_style(
    label: &LabelDef,
    fontset: &FontSet,
    scale_factor: f64,
) -> Result<LabelStyle, RenderError> {
    let color = label.color.ok_or(RenderError::NoColor)?;
    let font = fontset
        .lookup(&label.font)
        .ok_or_else(|| RenderError::UnknownFont {
            name: label.font.clone(),
        })?;
    let size = (label.size * scale_factor)
        .max(label.min_size)
        .min(label.max_size);
    let outline_width = match label.outline_color {
        Some(_) if label.size > 0.0 => label.outline_width * size / label.size,
        _ => 0.0,
    };
    Ok(LabelStyle {
        font: font.to_path_buf(),
        size,
        rotation: label.angle.to_radians(),
        color,
        outline_color: label.outline_color,
        outline_width,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::{EllipseSymbol, PixmapSymbol, TruetypeSymbol, VectorSymbol};

    const RED: Color = Color::rgb(255, 0, 0);
    const BLUE: Color = Color::rgb(0, 0, 255);

    fn open_path() -> Symbol {
        VectorSymbol::from_pairs("tick", &[(0.0, 0.0), (0.0, 10.0)], false).into()
    }

    fn dot() -> Symbol {
        EllipseSymbol {
            name: "dot".into(),
            width: 4.0,
            height: 4.0,
            filled: true,
        }
        .into()
    }

    // ==================== color resolution tests ====================

    #[test]
    fn filled_symbols_fill_with_color() {
        let style = StyleDef::default().with_color(RED).with_outline_color(BLUE);
        let s = compute_symbol_style(&style, &dot(), 1.0);
        assert_eq!(s.color, Some(RED));
        assert_eq!(s.outline_color, Some(BLUE));
        assert_eq!(s.outline_width, 1.0);
    }

    #[test]
    fn open_paths_stroke_with_color() {
        let style = StyleDef::default().with_color(RED).with_outline_color(BLUE);
        let s = compute_symbol_style(&style, &open_path(), 1.0);
        assert_eq!(s.color, None);
        assert_eq!(s.outline_color, Some(RED));

        let outline_only = StyleDef::default().with_outline_color(BLUE);
        let s = compute_symbol_style(&outline_only, &open_path(), 1.0);
        assert_eq!(s.outline_color, Some(BLUE));
    }

    #[test]
    fn pixmaps_carry_no_colors() {
        let style = StyleDef::default()
            .with_color(RED)
            .with_outline_color(BLUE)
            .with_background_color(Color::WHITE);
        let pixmap: Symbol = PixmapSymbol::new("p", "p.png").with_size(8, 8).into();
        let s = compute_symbol_style(&style, &pixmap, 1.0);
        assert_eq!((s.color, s.outline_color), (None, None));
        assert_eq!(s.background_color, Some(Color::WHITE));
        assert_eq!(s.outline_width, 0.0);
    }

    #[test]
    fn glyphs_use_fill_and_outline() {
        let glyph: Symbol = TruetypeSymbol {
            name: "g".into(),
            font: "sans".into(),
            character: "A".into(),
        }
        .into();
        let style = StyleDef::default().with_color(RED).with_size(12.0);
        let s = compute_symbol_style(&style, &glyph, 1.0);
        assert_eq!(s.color, Some(RED));
        assert_eq!(s.outline_color, None);
        assert_eq!(s.outline_width, 0.0);
        assert_eq!(s.scale, 12.0);
    }

    // ==================== size tests ====================

    #[test]
    fn scale_is_relative_to_the_symbol_size() {
        let style = StyleDef::default().with_color(RED).with_size(8.0);
        let s = compute_symbol_style(&style, &dot(), 1.5);
        assert_eq!(s.scale, 3.0);

        let no_size = StyleDef::default().with_color(RED);
        assert_eq!(compute_symbol_style(&no_size, &dot(), 1.0).scale, 1.0);
    }

    #[test]
    fn size_and_width_are_clamped() {
        let mut style = StyleDef::default()
            .with_color(RED)
            .with_outline_color(BLUE)
            .with_size(100.0)
            .with_width(10.0);
        style.max_size = 20.0;
        style.max_width = 4.0;
        assert_eq!(target_size(&style, &dot(), 1.0), 20.0);
        let s = compute_symbol_style(&style, &dot(), 1.0);
        assert_eq!(s.scale, 5.0);
        assert_eq!(s.outline_width, 4.0);

        style.size = Some(0.1);
        style.min_size = 2.0;
        assert_eq!(target_size(&style, &dot(), 1.0), 2.0);
    }

    #[test]
    fn rotation_is_in_radians() {
        let style = StyleDef::default().with_color(RED).with_angle(90.0);
        let s = compute_symbol_style(&style, &dot(), 1.0);
        assert!((s.rotation - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }

    // ==================== label style tests ====================

    #[test]
    fn label_style_resolves_font_and_scales() {
        let fonts = FontSet::new().with_font("sans", "/fonts/sans.ttf");
        let mut label = LabelDef::new("sans");
        label.size = 10.0;
        label.outline_color = Some(Color::WHITE);
        label.outline_width = 2.0;
        label.angle = Angle(180.0);

        let s = compute_label_style(&label, &fonts, 2.0).unwrap();
        assert_eq!(s.font.as_str(), "/fonts/sans.ttf");
        assert_eq!(s.size, 20.0);
        assert_eq!(s.outline_width, 4.0);
        assert!((s.rotation - std::f64::consts::PI).abs() < 1e-12);

        let s = compute_label_style(&label, &fonts, 100.0).unwrap();
        assert_eq!(s.size, defaults::LABEL_MAX_SIZE);
    }

    #[test]
    fn label_style_errors() {
        let fonts = FontSet::new();
        let label = LabelDef::new("missing");
        assert!(matches!(
            compute_label_style(&label, &fonts, 1.0),
            Err(RenderError::UnknownFont { .. })
        ));

        let fonts = fonts.with_font("missing", "m.ttf");
        let colorless = LabelDef {
            color: None,
            ..label
        };
        assert!(matches!(
            compute_label_style(&colorless, &fonts, 1.0),
            Err(RenderError::NoColor)
        ));
    }
}
