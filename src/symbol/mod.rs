//! Symbol definitions
//!
//! A symbol is drawn in its own coordinate space; styles scale, rotate and
//! color it. Each kind is its own type implementing [`SymbolShape`], and
//! [`Symbol`] dispatches over them.

pub mod style;

pub use style::{
    LabelDef, LabelStyle, LineCap, LineJoin, StyleDef, SymbolStyle, compute_label_style,
    compute_symbol_style, target_size,
};

use std::cell::OnceCell;
use std::collections::HashMap;

use camino::{Utf8Path, Utf8PathBuf};
use enum_dispatch::enum_dispatch;
use glam::DVec2;

use crate::errors::RenderError;
use crate::render::defaults::PEN_UP;

/// Intrinsic geometry of a symbol kind
#[enum_dispatch]
pub trait SymbolShape {
    fn name(&self) -> &str;

    /// Width of the symbol in its own coordinates
    fn size_x(&self) -> f64;

    /// Height of the symbol in its own coordinates
    fn size_y(&self) -> f64;

    fn is_filled(&self) -> bool {
        false
    }

    /// Keyword naming the kind, as written in symbol declarations
    fn kind_name(&self) -> &'static str;

    /// Size a style's SIZE is measured against. Never zero.
    fn default_size(&self) -> f64 {
        positive_or_one(self.size_y())
    }
}

fn positive_or_one(size: f64) -> f64 {
    if size > 0.0 { size } else { 1.0 }
}

#[enum_dispatch(SymbolShape)]
#[derive(Debug, Clone, PartialEq)]
pub enum Symbol {
    Simple(SimpleSymbol),
    Vector(VectorSymbol),
    Ellipse(EllipseSymbol),
    Pixmap(PixmapSymbol),
    Truetype(TruetypeSymbol),
    Hatch(HatchSymbol),
}

impl Symbol {
    /// Solid strokes and fills with no symbol geometry.
    pub fn is_simple(&self) -> bool {
        matches!(self, Symbol::Simple(_))
    }

    pub fn is_pixmap(&self) -> bool {
        matches!(self, Symbol::Pixmap(_))
    }
}

// ============================================================================
// Symbol kinds
// ============================================================================

/// Plain stroke or fill; index 0 of every symbol set.
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleSymbol {
    pub name: String,
}

impl SymbolShape for SimpleSymbol {
    fn name(&self) -> &str {
        &self.name
    }

    fn size_x(&self) -> f64 {
        1.0
    }

    fn size_y(&self) -> f64 {
        1.0
    }

    fn kind_name(&self) -> &'static str {
        "simple"
    }
}

/// Polyline or polygon symbol. `None` entries lift the pen.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorSymbol {
    pub name: String,
    pub points: Vec<Option<DVec2>>,
    pub filled: bool,
    size: DVec2,
}

impl VectorSymbol {
    pub fn new(name: impl Into<String>, points: Vec<Option<DVec2>>, filled: bool) -> Self {
        let size = points
            .iter()
            .flatten()
            .fold(DVec2::ZERO, |acc, p| acc.max(*p));
        VectorSymbol {
            name: name.into(),
            points,
            filled,
            size,
        }
    }

    /// Build from raw coordinate pairs where `(-99, -99)` lifts the pen.
    pub fn from_pairs(name: impl Into<String>, pairs: &[(f64, f64)], filled: bool) -> Self {
        let points = pairs
            .iter()
            .map(|&(x, y)| {
                if x == PEN_UP && y == PEN_UP {
                    None
                } else {
                    Some(DVec2::new(x, y))
                }
            })
            .collect();
        VectorSymbol::new(name, points, filled)
    }

    /// Connected runs of points between pen lifts.
    pub fn strokes(&self) -> impl Iterator<Item = Vec<DVec2>> + '_ {
        self.points
            .split(Option::is_none)
            .filter(|run| !run.is_empty())
            .map(|run| run.iter().flatten().copied().collect())
    }
}

impl SymbolShape for VectorSymbol {
    fn name(&self) -> &str {
        &self.name
    }

    fn size_x(&self) -> f64 {
        self.size.x
    }

    fn size_y(&self) -> f64 {
        self.size.y
    }

    fn is_filled(&self) -> bool {
        self.filled
    }

    fn kind_name(&self) -> &'static str {
        "vector"
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EllipseSymbol {
    pub name: String,
    pub width: f64,
    pub height: f64,
    pub filled: bool,
}

impl SymbolShape for EllipseSymbol {
    fn name(&self) -> &str {
        &self.name
    }

    fn size_x(&self) -> f64 {
        self.width
    }

    fn size_y(&self) -> f64 {
        self.height
    }

    fn is_filled(&self) -> bool {
        self.filled
    }

    fn kind_name(&self) -> &'static str {
        "ellipse"
    }
}

/// Raster image symbol. Its size is known once the backend has loaded it.
#[derive(Debug, Clone, PartialEq)]
pub struct PixmapSymbol {
    pub name: String,
    pub image: Utf8PathBuf,
    size: OnceCell<(u32, u32)>,
}

impl PixmapSymbol {
    pub fn new(name: impl Into<String>, image: impl Into<Utf8PathBuf>) -> Self {
        PixmapSymbol {
            name: name.into(),
            image: image.into(),
            size: OnceCell::new(),
        }
    }

    /// A pixmap whose dimensions are already known.
    pub fn with_size(self, width: u32, height: u32) -> Self {
        let _ = self.size.set((width, height));
        self
    }

    pub fn loaded_size(&self) -> Option<(u32, u32)> {
        self.size.get().copied()
    }

    /// Load the image dimensions once through `load`.
    pub fn ensure_loaded<E>(
        &self,
        load: impl FnOnce(&Utf8Path) -> Result<(u32, u32), E>,
    ) -> Result<(u32, u32), E> {
        if let Some(size) = self.size.get() {
            return Ok(*size);
        }
        let size = load(&self.image)?;
        let _ = self.size.set(size);
        Ok(size)
    }
}

impl SymbolShape for PixmapSymbol {
    fn name(&self) -> &str {
        &self.name
    }

    fn size_x(&self) -> f64 {
        self.loaded_size().map_or(0.0, |(w, _)| f64::from(w))
    }

    fn size_y(&self) -> f64 {
        self.loaded_size().map_or(0.0, |(_, h)| f64::from(h))
    }

    fn kind_name(&self) -> &'static str {
        "pixmap"
    }
}

/// Single glyph drawn from a font of the font set.
#[derive(Debug, Clone, PartialEq)]
pub struct TruetypeSymbol {
    pub name: String,
    /// Font set alias.
    pub font: String,
    pub character: String,
}

impl SymbolShape for TruetypeSymbol {
    fn name(&self) -> &str {
        &self.name
    }

    fn size_x(&self) -> f64 {
        1.0
    }

    fn size_y(&self) -> f64 {
        1.0
    }

    fn kind_name(&self) -> &'static str {
        "truetype"
    }

    fn default_size(&self) -> f64 {
        1.0
    }
}

/// Polygon fill made of parallel lines.
#[derive(Debug, Clone, PartialEq)]
pub struct HatchSymbol {
    pub name: String,
}

impl SymbolShape for HatchSymbol {
    fn name(&self) -> &str {
        &self.name
    }

    fn size_x(&self) -> f64 {
        1.0
    }

    fn size_y(&self) -> f64 {
        1.0
    }

    fn kind_name(&self) -> &'static str {
        "hatch"
    }
}

// ============================================================================
// Symbol and font sets
// ============================================================================

/// Font aliases mapped to font files.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FontSet {
    fonts: HashMap<String, Utf8PathBuf>,
}

impl FontSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, alias: impl Into<String>, path: impl Into<Utf8PathBuf>) {
        self.fonts.insert(alias.into(), path.into());
    }

    pub fn with_font(mut self, alias: impl Into<String>, path: impl Into<Utf8PathBuf>) -> Self {
        self.insert(alias, path);
        self
    }

    pub fn lookup(&self, alias: &str) -> Option<&Utf8Path> {
        self.fonts.get(alias).map(Utf8PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }
}

/// Symbols addressed by index; index 0 is always the simple symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolSet {
    symbols: Vec<Symbol>,
    fontset: FontSet,
}

impl Default for SymbolSet {
    fn default() -> Self {
        SymbolSet {
            symbols: vec![Symbol::Simple(SimpleSymbol {
                name: "default".to_string(),
            })],
            fontset: FontSet::default(),
        }
    }
}

impl SymbolSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fontset(mut self, fontset: FontSet) -> Self {
        self.fontset = fontset;
        self
    }

    /// Append a symbol and return its index.
    pub fn add(&mut self, symbol: impl Into<Symbol>) -> usize {
        self.symbols.push(symbol.into());
        self.symbols.len() - 1
    }

    pub fn get(&self, index: usize) -> Option<&Symbol> {
        self.symbols.get(index)
    }

    /// Like [`SymbolSet::get`], as a render error.
    pub fn symbol(&self, index: usize) -> Result<&Symbol, RenderError> {
        self.get(index).ok_or(RenderError::UnknownSymbol { index })
    }

    /// Case-insensitive lookup by name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.symbols
            .iter()
            .position(|s| s.name().eq_ignore_ascii_case(name))
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter()
    }

    pub fn fontset(&self) -> &FontSet {
        &self.fontset
    }

    pub fn fontset_mut(&mut self) -> &mut FontSet {
        &mut self.fontset
    }

    /// Font file of a truetype symbol; `None` for other kinds.
    pub fn font_for(&self, symbol: &Symbol) -> Result<Option<&Utf8Path>, RenderError> {
        match symbol {
            Symbol::Truetype(t) => self
                .fontset
                .lookup(&t.font)
                .map(Some)
                .ok_or_else(|| RenderError::UnknownFont {
                    name: t.font.clone(),
                }),
            _ => Ok(None),
        }
    }
}
