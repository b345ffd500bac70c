//! One image being drawn, with the caches that live as long as it does.

use std::rc::Rc;

use super::defaults;
use super::labels::LabelCache;
use super::renderer::Renderer;
use super::tile_cache::{TileCache, TileRequest, get_tile};
use crate::errors::RenderError;
use crate::symbol::SymbolSet;
use crate::types::{Rect, positive_factor};

pub struct Canvas<R: Renderer> {
    pub(crate) renderer: R,
    pub(crate) image: R::Image,
    width: u32,
    height: u32,
    resolution: f64,
    pub(crate) tiles: TileCache<R::Image>,
    pub(crate) labels: LabelCache,
}

impl<R: Renderer> Canvas<R> {
    pub fn new(mut renderer: R, width: u32, height: u32) -> Result<Self, RenderError> {
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidTileSize {
                width: i64::from(width),
                height: i64::from(height),
            });
        }
        let image = renderer.create_image(width, height, defaults::RESOLUTION)?;
        Ok(Canvas {
            renderer,
            image,
            width,
            height,
            resolution: defaults::RESOLUTION,
            tiles: TileCache::new(),
            labels: LabelCache::new(),
        })
    }

    /// Recreate the image at `dpi`. Cached tiles are dropped.
    pub fn with_resolution(mut self, dpi: f64) -> Result<Self, RenderError> {
        let dpi = positive_factor(dpi)?;
        self.image = self.renderer.create_image(self.width, self.height, dpi)?;
        self.resolution = dpi;
        self.tiles.clear();
        Ok(self)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    /// The image in pixel coordinates.
    pub fn extent(&self) -> Rect {
        Rect::new(0.0, 0.0, f64::from(self.width), f64::from(self.height))
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn image(&self) -> &R::Image {
        &self.image
    }

    pub fn tile_cache(&self) -> &TileCache<R::Image> {
        &self.tiles
    }

    pub fn labels(&self) -> &LabelCache {
        &self.labels
    }

    pub fn labels_mut(&mut self) -> &mut LabelCache {
        &mut self.labels
    }

    /// Fetch or render a symbol tile for this image.
    pub fn get_tile(&mut self, symbols: &SymbolSet, request: TileRequest<'_>) -> Result<Rc<R::Image>, RenderError> {
        get_tile(&mut self.renderer, &mut self.tiles, symbols, request, self.resolution)
    }

    /// Finish drawing and hand back the renderer and image.
    pub fn into_parts(self) -> (R, R::Image) {
        (self.renderer, self.image)
    }
}
