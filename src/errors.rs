//! Error types with rich diagnostics using miette
//!
//! Storage errors carry the offending path or record index; configuration
//! errors carry source spans for readable reports.

use camino::Utf8PathBuf;
use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use crate::types::NumericError;

// ============================================================================
// Shapefile Errors
// ============================================================================

/// Errors raised by the `.shp`/`.shx` reader and writer.
#[derive(Error, Diagnostic, Debug)]
pub enum ShapefileError {
    #[error("i/o error on {path}")]
    #[diagnostic(code(shapemap::shapefile::io))]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to open {path}")]
    #[diagnostic(
        code(shapemap::shapefile::missing_file),
        help("a shapefile needs both a .shp and a .shx file with the same base name")
    )]
    MissingFile { path: Utf8PathBuf },

    #[error("{path} is not a shapefile index (bad magic cookie)")]
    #[diagnostic(code(shapemap::shapefile::bad_magic))]
    BadMagic { path: Utf8PathBuf },

    #[error("corrupt header: record count {count} is out of range")]
    #[diagnostic(code(shapemap::shapefile::too_many_records))]
    TooManyRecords { count: i64 },

    #[error("record {index} is out of range (file has {count} records)")]
    #[diagnostic(code(shapemap::shapefile::index_out_of_range))]
    IndexOutOfRange { index: usize, count: usize },

    #[error("corrupted record {index}: {reason}")]
    #[diagnostic(code(shapemap::shapefile::corrupt_record))]
    CorruptRecord { index: usize, reason: String },

    #[error("unable to allocate {bytes} bytes for a record buffer")]
    #[diagnostic(code(shapemap::shapefile::out_of_memory))]
    OutOfMemory { bytes: usize },

    #[error("cannot write a {shape} shape into a {file} file")]
    #[diagnostic(code(shapemap::shapefile::shape_type_mismatch))]
    ShapeTypeMismatch {
        file: &'static str,
        shape: &'static str,
    },

    #[error("unknown shape type code {code}")]
    #[diagnostic(code(shapemap::shapefile::unknown_shape_type))]
    UnknownShapeType { code: i32 },

    #[error("{path} was opened read-only")]
    #[diagnostic(
        code(shapemap::shapefile::read_only),
        help("open the shapefile with OpenMode::Update to append records")
    )]
    ReadOnly { path: Utf8PathBuf },

    #[error("point access on a file that does not hold points")]
    #[diagnostic(code(shapemap::shapefile::not_point_file))]
    NotPointFile,

    #[error("attribute file error: {message}")]
    #[diagnostic(code(shapemap::shapefile::attributes))]
    Attributes { message: String },
}

impl ShapefileError {
    /// True for errors that only affect one record.
    pub fn is_record_local(&self) -> bool {
        matches!(self, ShapefileError::CorruptRecord { .. })
    }
}

// ============================================================================
// Layer Errors
// ============================================================================

/// Errors raised while querying plain or tiled shapefile layers
#[derive(Error, Diagnostic, Debug)]
pub enum LayerError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Shapefile(#[from] ShapefileError),

    #[error("unable to open tile {path}")]
    #[diagnostic(
        code(shapemap::layer::missing_tile),
        help("enable skip-missing mode to ignore tiles that cannot be opened")
    )]
    MissingTile { path: Utf8PathBuf },

    #[error("item `{name}` not found in the attribute table")]
    #[diagnostic(code(shapemap::layer::unknown_item))]
    UnknownItem { name: String },

    #[error("layer has no attribute table")]
    #[diagnostic(code(shapemap::layer::no_attributes))]
    NoAttributes,

    #[error("no tile of the tile index could be opened")]
    #[diagnostic(code(shapemap::layer::no_tiles))]
    NoTiles,
}

// ============================================================================
// Render Errors
// ============================================================================

/// Errors that occur while rendering symbols and shapes
#[derive(Error, Diagnostic, Debug)]
pub enum RenderError {
    #[error("style has neither a color nor an outline color")]
    #[diagnostic(code(shapemap::render::no_color))]
    NoColor,

    #[error("{kind} symbols cannot be rendered this way")]
    #[diagnostic(code(shapemap::render::unsupported_symbol))]
    UnsupportedSymbol { kind: &'static str },

    #[error("symbol {index} is not defined")]
    #[diagnostic(code(shapemap::render::unknown_symbol))]
    UnknownSymbol { index: usize },

    #[error("font `{name}` is not defined in the font set")]
    #[diagnostic(code(shapemap::render::unknown_font))]
    UnknownFont { name: String },

    #[error("invalid tile size {width}x{height}")]
    #[diagnostic(code(shapemap::render::invalid_tile_size))]
    InvalidTileSize { width: i64, height: i64 },

    #[error("invalid numeric value: {0}")]
    #[diagnostic(code(shapemap::render::invalid_value))]
    Numeric(#[from] NumericError),

    #[error("renderer backend failed: {message}")]
    #[diagnostic(code(shapemap::render::backend))]
    Backend { message: String },
}

// ============================================================================
// Config Errors
// ============================================================================

/// Errors raised while reading symbol set and style declarations
#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("cannot read {path}")]
    #[diagnostic(code(shapemap::config::io))]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("syntax error: {message}")]
    #[diagnostic(code(shapemap::config::syntax))]
    Syntax {
        message: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("here")]
        span: SourceSpan,
    },

    #[error("invalid value for {keyword}: {message}")]
    #[diagnostic(code(shapemap::config::invalid_value))]
    InvalidValue {
        keyword: String,
        message: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("invalid value")]
        span: SourceSpan,
    },

    #[error("style references unknown symbol `{name}`")]
    #[diagnostic(code(shapemap::config::unknown_symbol))]
    UnknownSymbol {
        name: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("not defined in the symbol set")]
        span: SourceSpan,
    },
}
