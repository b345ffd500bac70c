//! Symbol rendering pipeline
//!
//! This module is organized into submodules:
//! - `defaults`: Default sizes and limits
//! - `renderer`: The `Renderer` capability a drawing backend implements
//! - `canvas`: One image in progress with its tile and label caches
//! - `tile_cache`: Rendered symbol tiles reused across draws
//! - `draw`: Marker, line, polygon and text drawing
//! - `markers`, `hatch`, `offset`: Geometry feeding the draw calls
//! - `labels`: Label placement with collision avoidance
//! - `recording`: A backend that records its calls as text

pub mod canvas;
pub mod defaults;
pub mod draw;
pub mod hatch;
pub mod labels;
pub mod markers;
pub mod offset;
pub mod recording;
pub mod renderer;
pub mod tile_cache;

pub use canvas::Canvas;
pub use labels::{LabelCache, LabelCandidate};
pub use markers::{MarkerPlacement, marker_positions};
pub use recording::{RecordedImage, RecordingRenderer};
pub use renderer::{Renderer, StrokeStyle};
pub use tile_cache::{TileCache, TileKey, TileRequest, get_tile};
