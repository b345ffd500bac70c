//! Symbol tile cache
//!
//! Rendering a symbol into a small offscreen image once and stamping that
//! image is much cheaper than redrawing the symbol's geometry for every
//! point, brush repeat or pattern fill. Tiles are keyed on everything that
//! changes their pixels and live as long as the image being drawn.

use std::rc::Rc;

use glam::DVec2;

use super::defaults::TILE_CACHE_CAPACITY;
use super::draw::render_symbol;
use super::renderer::Renderer;
use crate::errors::RenderError;
use crate::log::debug;
use crate::symbol::{Symbol, SymbolSet, SymbolShape, SymbolStyle};

/// Everything that distinguishes one rendered tile from another.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileKey {
    /// Index of the symbol in its symbol set.
    pub symbol: usize,
    pub width: u32,
    pub height: u32,
    pub style: SymbolStyle,
}

/// Fixed-capacity ring of rendered tiles.
///
/// Once full, each insert overwrites the oldest slot in place.
pub struct TileCache<I> {
    slots: Vec<(TileKey, Rc<I>)>,
    oldest: usize,
    capacity: usize,
}

impl<I> Default for TileCache<I> {
    fn default() -> Self {
        Self::with_capacity(TILE_CACHE_CAPACITY)
    }
}

impl<I> TileCache<I> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        TileCache {
            slots: Vec::with_capacity(capacity),
            oldest: 0,
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn lookup(&self, key: &TileKey) -> Option<Rc<I>> {
        self.slots
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, image)| Rc::clone(image))
    }

    pub fn insert(&mut self, key: TileKey, image: I) -> Rc<I> {
        let image = Rc::new(image);
        if self.slots.len() < self.capacity {
            self.slots.push((key, Rc::clone(&image)));
        } else {
            self.slots[self.oldest] = (key, Rc::clone(&image));
            self.oldest = (self.oldest + 1) % self.capacity;
        }
        image
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.oldest = 0;
    }
}

/// Side of the square tile a symbol occupies at `style`'s scale.
pub fn symbol_tile_side(symbol: &Symbol, style: &SymbolStyle) -> u32 {
    let side = (symbol.size_x().max(symbol.size_y()) * style.scale).ceil();
    if side >= 1.0 { side.min(f64::from(u32::MAX)) as u32 } else { 1 }
}

fn tile_dimensions(width: i64, height: i64) -> Result<(u32, u32), RenderError> {
    match (u32::try_from(width), u32::try_from(height)) {
        (Ok(w), Ok(h)) if w > 0 && h > 0 => Ok((w, h)),
        _ => Err(RenderError::InvalidTileSize { width, height }),
    }
}

/// Parameters of one tile request.
#[derive(Debug, Clone, Copy)]
pub struct TileRequest<'a> {
    pub symbol: usize,
    pub style: &'a SymbolStyle,
    /// Explicit tile size; a square fitting the scaled symbol when unset.
    pub size: Option<(i64, i64)>,
    /// Render a 3x3 grid and keep the center, so antialiased edges match
    /// their neighbors when the tile is repeated.
    pub seamless: bool,
}

/// Fetch a tile from `cache`, rendering and caching it on a miss.
pub fn get_tile<R: Renderer>(
    renderer: &mut R,
    cache: &mut TileCache<R::Image>,
    symbols: &SymbolSet,
    request: TileRequest<'_>,
    resolution: f64,
) -> Result<Rc<R::Image>, RenderError> {
    let symbol = symbols.symbol(request.symbol)?;
    let (width, height) = match request.size {
        Some((w, h)) => tile_dimensions(w, h)?,
        None => {
            let side = symbol_tile_side(symbol, request.style);
            (side, side)
        }
    };
    let key = TileKey {
        symbol: request.symbol,
        width,
        height,
        style: *request.style,
    };
    if let Some(tile) = cache.lookup(&key) {
        return Ok(tile);
    }

    let font = symbols.font_for(symbol)?;
    if let Symbol::Pixmap(pixmap) = symbol {
        pixmap.ensure_loaded(|path| renderer.load_pixmap(path))?;
    }

    let (w, h) = (f64::from(width), f64::from(height));
    let tile = if request.seamless {
        let too_big = || RenderError::InvalidTileSize {
            width: i64::from(width) * 3,
            height: i64::from(height) * 3,
        };
        let grid_w = width.checked_mul(3).ok_or_else(too_big)?;
        let grid_h = height.checked_mul(3).ok_or_else(too_big)?;
        let mut grid = renderer.create_image(grid_w, grid_h, resolution)?;
        for i in 0..3 {
            for j in 0..3 {
                let at = DVec2::new((f64::from(i) + 0.5) * w, (f64::from(j) + 0.5) * h);
                render_symbol(renderer, &mut grid, symbol, font, at, request.style)?;
            }
        }
        let mut tile = renderer.create_image(width, height, resolution)?;
        renderer.merge_raster(&mut tile, &grid, 1.0, (width, height), (0, 0), (width, height))?;
        tile
    } else {
        let mut tile = renderer.create_image(width, height, resolution)?;
        render_symbol(renderer, &mut tile, symbol, font, DVec2::new(w / 2.0, h / 2.0), request.style)?;
        tile
    };
    debug!(
        symbol = request.symbol,
        width,
        height,
        seamless = request.seamless,
        "rendered symbol tile"
    );
    Ok(cache.insert(key, tile))
}
