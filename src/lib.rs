//! Shapefile storage, spatial queries and symbol rendering for map renderers.
//!
//! The pieces, leaf first:
//! - [`shapefile`]: `.shp`/`.shx` reading and writing with a lazily paged
//!   record index
//! - [`spatial`] and [`layer`]: bounding-box queries and feature iteration
//!   over one shapefile or a tile index of many ([`tiled`])
//! - [`symbol`]: symbol definitions and style resolution
//! - [`render`]: marker, line, polygon and label drawing against a
//!   [`render::Renderer`] backend, with a symbol tile cache
//! - [`config`]: a text format for symbol sets, styles and labels

use pest_derive::Parser;

pub mod attributes;
pub mod bitset;
pub mod config;
pub mod errors;
pub mod layer;
pub mod log;
pub mod render;
pub mod shapefile;
pub mod spatial;
pub mod symbol;
pub mod tiled;
pub mod types;

pub use config::Config;
pub use errors::{ConfigError, LayerError, RenderError, ShapefileError};
pub use layer::{LayerOptions, ShapefileLayer};
pub use render::{Canvas, Renderer};
pub use shapefile::{Geometry, Line, Shape, ShapeType, ShapefileHandle};
pub use spatial::Shapefile;
pub use symbol::{StyleDef, Symbol, SymbolSet, SymbolStyle, compute_symbol_style};
pub use tiled::{TiledLayerOptions, TiledShapefileLayer};
pub use types::{Angle, Color, Point, Rect};

#[derive(Parser)]
#[grammar = "config.pest"]
pub struct ConfigParser;
