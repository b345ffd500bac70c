//! Layers split across many shapefiles.
//!
//! A tile index is itself a shapefile layer: each record's geometry covers
//! one tile and one attribute names the tile's data file. Queries run
//! against the index first; matching tiles are opened one at a time and
//! queried with the same rectangle.

use std::fs::File;

use camino::{Utf8Path, Utf8PathBuf};

use crate::errors::{LayerError, ShapefileError};
use crate::layer::{AttributeFilter, LayerOptions, ShapefileLayer};
use crate::log::{self, debug};
use crate::shapefile::{Shape, ShapeType};
use crate::spatial::QueryStatus;
use crate::types::Rect;

/// Attribute holding tile locations unless configured otherwise.
pub const DEFAULT_TILE_ITEM: &str = "location";

#[derive(Clone)]
pub struct TiledLayerOptions {
    /// Tile index attribute naming each tile's data file.
    pub tile_item: String,
    /// Fixed data name joined below each tile location as `<tile>/<data>`.
    pub data: Option<String>,
    /// Directories tried, in order, for relative tile locations.
    pub search_paths: Vec<Utf8PathBuf>,
    /// Fail the query when a tile cannot be opened instead of skipping it.
    pub strict: bool,
    /// Items and filter applied to each tile.
    pub layer: LayerOptions,
}

impl Default for TiledLayerOptions {
    fn default() -> Self {
        TiledLayerOptions {
            tile_item: DEFAULT_TILE_ITEM.to_string(),
            data: None,
            search_paths: Vec::new(),
            strict: false,
            layer: LayerOptions::default(),
        }
    }
}

struct OpenTile {
    tile: usize,
    layer: ShapefileLayer<File>,
}

pub struct TiledShapefileLayer {
    name: String,
    tile_index: ShapefileLayer<File>,
    options: TiledLayerOptions,
    shape_type: ShapeType,
    current: Option<OpenTile>,
}

impl TiledShapefileLayer {
    /// Open the tile index shapefile at `index_path`.
    pub fn open(
        name: impl Into<String>,
        index_path: impl AsRef<Utf8Path>,
        options: TiledLayerOptions,
    ) -> Result<Self, LayerError> {
        let name = name.into();
        let tile_index = ShapefileLayer::open(format!("{name}-tileindex"), index_path, LayerOptions::default())?;
        Self::with_tile_index(name, tile_index, options)
    }

    /// Use an already opened layer as the tile index.
    ///
    /// The index layer's items are replaced by the tile item. A template
    /// tile is opened to learn the layer's shape type.
    pub fn with_tile_index(
        name: impl Into<String>,
        mut tile_index: ShapefileLayer<File>,
        options: TiledLayerOptions,
    ) -> Result<Self, LayerError> {
        tile_index.set_items(std::slice::from_ref(&options.tile_item))?;
        let mut layer = TiledShapefileLayer {
            name: name.into(),
            tile_index,
            options,
            shape_type: ShapeType::Null,
            current: None,
        };
        layer.shape_type = layer.template_shape_type()?;
        debug!(layer = %layer.name, shape_type = %layer.shape_type, "opened tiled layer");
        Ok(layer)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shape type of the tiles (taken from the first tile that opens).
    pub fn shape_type(&self) -> ShapeType {
        self.shape_type
    }

    pub fn tile_index(&self) -> &ShapefileLayer<File> {
        &self.tile_index
    }

    /// Tile currently open, if any.
    pub fn current_tile(&self) -> Option<usize> {
        self.current.as_ref().map(|t| t.tile)
    }

    pub fn extent(&self) -> Rect {
        self.tile_index.extent()
    }

    pub fn set_filter(&mut self, filter: Option<AttributeFilter>) {
        self.options.layer.filter = filter;
    }

    /// Close the open tile, if any.
    pub fn close(&mut self) {
        self.current = None;
    }

    pub fn which_shapes(&mut self, rect: Rect) -> Result<QueryStatus, LayerError> {
        self.current = None;
        if self.tile_index.which_shapes(rect)? == QueryStatus::Done {
            return Ok(QueryStatus::Done);
        }
        self.advance(rect)
    }

    /// Next matching shape, moving across tiles as each one runs out.
    pub fn next_shape(&mut self) -> Result<Option<Shape>, LayerError> {
        loop {
            let Some(current) = self.current.as_mut() else {
                return Ok(None);
            };
            if let Some(mut shape) = current.layer.next_shape()? {
                shape.tile_index = Some(current.tile);
                return Ok(Some(shape));
            }
            debug!(layer = %self.name, tile = current.tile, "tile exhausted");
            self.current = None;
            let Some(rect) = self.tile_index.shapefile().status_bounds() else {
                return Ok(None);
            };
            if self.advance(rect)? == QueryStatus::Done {
                return Ok(None);
            }
        }
    }

    /// Fetch `record` of `tile`, opening that tile if it is not current.
    pub fn get_shape(&mut self, tile: usize, record: usize) -> Result<Shape, LayerError> {
        if self.current_tile() != Some(tile) {
            self.current = None;
            let location = self.tile_location(tile)?;
            let layer = match self.open_tile(&location)? {
                Some(layer) => layer,
                None => {
                    return Err(LayerError::MissingTile {
                        path: location.into(),
                    });
                }
            };
            self.current = Some(OpenTile { tile, layer });
        }
        let Some(current) = self.current.as_mut() else {
            return Err(LayerError::NoTiles);
        };
        let mut shape = current.layer.get_shape(record)?;
        shape.tile_index = Some(tile);
        Ok(shape)
    }

    /// Open the next selected tile whose data overlaps `rect`.
    fn advance(&mut self, rect: Rect) -> Result<QueryStatus, LayerError> {
        while let Some(tile_shape) = self.tile_index.next_shape()? {
            let Some(tile) = tile_shape.index else {
                continue;
            };
            let location = tile_shape.values.into_iter().next().unwrap_or_default();
            if location.is_empty() {
                debug!(layer = %self.name, tile, "tile without a location");
                continue;
            }
            let Some(mut layer) = self.open_tile(&location)? else {
                continue;
            };
            if layer.which_shapes(rect)? == QueryStatus::Done {
                continue;
            }
            debug!(layer = %self.name, tile, %location, "opened tile");
            self.current = Some(OpenTile { tile, layer });
            return Ok(QueryStatus::Selected);
        }
        Ok(QueryStatus::Done)
    }

    fn tile_location(&mut self, tile: usize) -> Result<String, LayerError> {
        let shape = self.tile_index.get_shape(tile)?;
        Ok(shape.values.into_iter().next().unwrap_or_default())
    }

    /// Candidate paths for a tile location, most specific first.
    fn tile_paths(&self, location: &str) -> Vec<Utf8PathBuf> {
        let relative = match &self.options.data {
            Some(data) => Utf8PathBuf::from(location).join(data),
            None => Utf8PathBuf::from(location),
        };
        if relative.is_absolute() {
            return vec![relative];
        }
        self.options
            .search_paths
            .iter()
            .map(|dir| dir.join(&relative))
            .chain(std::iter::once(relative.clone()))
            .collect()
    }

    /// `Ok(None)` when the tile is missing and missing tiles are skipped.
    fn open_tile(&self, location: &str) -> Result<Option<ShapefileLayer<File>>, LayerError> {
        let paths = self.tile_paths(location);
        for path in &paths {
            match ShapefileLayer::open(location, path, self.options.layer.clone()) {
                Ok(layer) => return Ok(Some(layer)),
                Err(LayerError::Shapefile(ShapefileError::MissingFile { .. })) => continue,
                Err(err) if self.options.strict => return Err(err),
                Err(err) => {
                    log::skipped_tile(&self.name, path, Some(&err));
                    return Ok(None);
                }
            }
        }
        let path = paths.into_iter().last().unwrap_or_default();
        if self.options.strict {
            return Err(LayerError::MissingTile { path });
        }
        log::skipped_tile(&self.name, &path, None);
        Ok(None)
    }

    fn template_shape_type(&mut self) -> Result<ShapeType, LayerError> {
        let count = self.tile_index.shapefile().num_shapes();
        for tile in 0..count {
            let location = self.tile_location(tile)?;
            if location.is_empty() {
                continue;
            }
            if let Some(layer) = self.open_tile(&location)? {
                return Ok(layer.shapefile().shape_type());
            }
        }
        Err(LayerError::NoTiles)
    }
}
