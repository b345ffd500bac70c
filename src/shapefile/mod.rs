//! `.shp`/`.shx` storage.
//!
//! A [`ShapefileHandle`] owns the geometry stream and the index stream of one
//! shapefile. Record offsets come from the index file in pages on demand
//! ([`index::RecordIndex`]); geometry is decoded into a [`Shape`] per call.
//!
//! Byte order is never guessed from the process: every handle carries a
//! [`HostOrder`] and decodes each field through the wire layout table in
//! [`codec`].

pub mod codec;
pub mod header;
pub mod index;
mod reader;
mod writer;

use std::fs::File;

use camino::Utf8PathBuf;

pub use codec::{FieldCodec, HostOrder};
pub use header::Header;
pub use index::{PageSource, RecordEntry, RecordIndex};
pub use reader::decode_record;
pub(crate) use reader::find_component;

use crate::errors::ShapefileError;
use crate::types::{Point, Rect};

// ============================================================================
// Format limits
// ============================================================================

/// Size of the `.shp` and `.shx` headers.
pub const HEADER_BYTES: usize = 100;
/// Record header: record number and content length, both big-endian.
pub const RECORD_HEADER_BYTES: u64 = 8;
/// Record counts outside `[0, MAX_RECORDS]` mark a corrupt index header.
pub const MAX_RECORDS: i64 = 256_000_000;
/// Upper bound on the point count of one record.
pub const MAX_POINTS: i32 = 50_000_000;
/// Upper bound on the part count of one record.
pub const MAX_PARTS: i32 = 10_000_000;
/// Content length of a Null record (the shape type field alone).
pub const NULL_CONTENT_BYTES: u64 = 4;

// ============================================================================
// Shape types
// ============================================================================

/// Shape type codes of the on-disk format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShapeType {
    Null,
    Point,
    Arc,
    Polygon,
    MultiPoint,
    PointZ,
    ArcZ,
    PolygonZ,
    MultiPointZ,
    PointM,
    ArcM,
    PolygonM,
    MultiPointM,
}

/// Geometry family of a [`ShapeType`], ignoring Z and M.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    Null,
    Point,
    MultiPoint,
    Arc,
    Polygon,
}

impl ShapeType {
    pub const ALL: [ShapeType; 13] = [
        ShapeType::Null,
        ShapeType::Point,
        ShapeType::Arc,
        ShapeType::Polygon,
        ShapeType::MultiPoint,
        ShapeType::PointZ,
        ShapeType::ArcZ,
        ShapeType::PolygonZ,
        ShapeType::MultiPointZ,
        ShapeType::PointM,
        ShapeType::ArcM,
        ShapeType::PolygonM,
        ShapeType::MultiPointM,
    ];

    pub fn from_code(code: i32) -> Result<Self, ShapefileError> {
        Ok(match code {
            0 => ShapeType::Null,
            1 => ShapeType::Point,
            3 => ShapeType::Arc,
            5 => ShapeType::Polygon,
            8 => ShapeType::MultiPoint,
            11 => ShapeType::PointZ,
            13 => ShapeType::ArcZ,
            15 => ShapeType::PolygonZ,
            18 => ShapeType::MultiPointZ,
            21 => ShapeType::PointM,
            23 => ShapeType::ArcM,
            25 => ShapeType::PolygonM,
            28 => ShapeType::MultiPointM,
            _ => return Err(ShapefileError::UnknownShapeType { code }),
        })
    }

    pub const fn code(self) -> i32 {
        match self {
            ShapeType::Null => 0,
            ShapeType::Point => 1,
            ShapeType::Arc => 3,
            ShapeType::Polygon => 5,
            ShapeType::MultiPoint => 8,
            ShapeType::PointZ => 11,
            ShapeType::ArcZ => 13,
            ShapeType::PolygonZ => 15,
            ShapeType::MultiPointZ => 18,
            ShapeType::PointM => 21,
            ShapeType::ArcM => 23,
            ShapeType::PolygonM => 25,
            ShapeType::MultiPointM => 28,
        }
    }

    pub const fn kind(self) -> ShapeKind {
        match self {
            ShapeType::Null => ShapeKind::Null,
            ShapeType::Point | ShapeType::PointZ | ShapeType::PointM => ShapeKind::Point,
            ShapeType::MultiPoint | ShapeType::MultiPointZ | ShapeType::MultiPointM => {
                ShapeKind::MultiPoint
            }
            ShapeType::Arc | ShapeType::ArcZ | ShapeType::ArcM => ShapeKind::Arc,
            ShapeType::Polygon | ShapeType::PolygonZ | ShapeType::PolygonM => ShapeKind::Polygon,
        }
    }

    /// Z types carry a Z block followed by an optional M block.
    pub const fn has_z(self) -> bool {
        matches!(
            self,
            ShapeType::PointZ | ShapeType::ArcZ | ShapeType::PolygonZ | ShapeType::MultiPointZ
        )
    }

    /// True when records may carry measures (M and Z types).
    pub const fn has_m(self) -> bool {
        self.has_z()
            || matches!(
                self,
                ShapeType::PointM | ShapeType::ArcM | ShapeType::PolygonM | ShapeType::MultiPointM
            )
    }

    pub const fn name(self) -> &'static str {
        match self {
            ShapeType::Null => "null",
            ShapeType::Point => "point",
            ShapeType::Arc => "arc",
            ShapeType::Polygon => "polygon",
            ShapeType::MultiPoint => "multipoint",
            ShapeType::PointZ => "pointz",
            ShapeType::ArcZ => "arcz",
            ShapeType::PolygonZ => "polygonz",
            ShapeType::MultiPointZ => "multipointz",
            ShapeType::PointM => "pointm",
            ShapeType::ArcM => "arcm",
            ShapeType::PolygonM => "polygonm",
            ShapeType::MultiPointM => "multipointm",
        }
    }
}

impl std::fmt::Display for ShapeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Geometry
// ============================================================================

/// One part of a line or one ring of a polygon.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Line {
    pub points: Vec<Point>,
}

impl Line {
    pub fn new(points: Vec<Point>) -> Self {
        Line { points }
    }

    /// Build a line from planar coordinates.
    pub fn from_xy(coords: &[(f64, f64)]) -> Self {
        Line {
            points: coords.iter().map(|&(x, y)| Point::new(x, y)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Planar length of the polyline.
    pub fn length(&self) -> f64 {
        self.points
            .windows(2)
            .map(|w| w[0].xy().distance(w[1].xy()))
            .sum()
    }
}

/// Decoded geometry of one record.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum Geometry {
    #[default]
    Null,
    Point(Point),
    MultiPoint(Vec<Point>),
    Line(Vec<Line>),
    Polygon(Vec<Line>),
}

impl Geometry {
    pub fn kind(&self) -> ShapeKind {
        match self {
            Geometry::Null => ShapeKind::Null,
            Geometry::Point(_) => ShapeKind::Point,
            Geometry::MultiPoint(_) => ShapeKind::MultiPoint,
            Geometry::Line(_) => ShapeKind::Arc,
            Geometry::Polygon(_) => ShapeKind::Polygon,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Geometry::Null => "null",
            Geometry::Point(_) => "point",
            Geometry::MultiPoint(_) => "multipoint",
            Geometry::Line(_) => "line",
            Geometry::Polygon(_) => "polygon",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Geometry::Null)
    }

    /// Parts of a line or rings of a polygon; empty for other kinds.
    pub fn lines(&self) -> &[Line] {
        match self {
            Geometry::Line(lines) | Geometry::Polygon(lines) => lines,
            _ => &[],
        }
    }

    /// Every vertex in file order.
    pub fn points(&self) -> Box<dyn Iterator<Item = &Point> + '_> {
        match self {
            Geometry::Null => Box::new(std::iter::empty()),
            Geometry::Point(p) => Box::new(std::iter::once(p)),
            Geometry::MultiPoint(points) => Box::new(points.iter()),
            Geometry::Line(lines) | Geometry::Polygon(lines) => {
                Box::new(lines.iter().flat_map(|l| l.points.iter()))
            }
        }
    }

    pub fn point_count(&self) -> usize {
        match self {
            Geometry::Null => 0,
            Geometry::Point(_) => 1,
            Geometry::MultiPoint(points) => points.len(),
            Geometry::Line(lines) | Geometry::Polygon(lines) => {
                lines.iter().map(Line::len).sum()
            }
        }
    }

    /// Planar bounds; empty for Null geometry.
    pub fn bounds(&self) -> Rect {
        let mut r = Rect::EMPTY;
        for p in self.points() {
            r.expand_point(p.x, p.y);
        }
        r
    }
}

/// A decoded record plus the bookkeeping layers attach to it.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Shape {
    /// Record index within its shapefile.
    pub index: Option<usize>,
    /// Tile the record came from, for tiled layers.
    pub tile_index: Option<usize>,
    pub bounds: Rect,
    pub geometry: Geometry,
    /// Attribute values, in the order of the layer's requested items.
    pub values: Vec<String>,
}

impl Shape {
    pub fn null(index: Option<usize>) -> Self {
        Shape {
            index,
            ..Shape::default()
        }
    }

    pub fn from_geometry(geometry: Geometry) -> Self {
        Shape {
            bounds: geometry.bounds(),
            geometry,
            ..Shape::default()
        }
    }

    pub fn is_null(&self) -> bool {
        self.geometry.is_null()
    }
}

// ============================================================================
// Handle
// ============================================================================

/// How an existing shapefile is opened.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum OpenMode {
    #[default]
    Read,
    /// Read and append records.
    Update,
}

/// Per-record scratch space reused across reads.
#[derive(Debug, Default)]
pub(crate) struct ScratchBuffer {
    bytes: Vec<u8>,
}

impl ScratchBuffer {
    /// Grow to at least `len` bytes. On allocation failure the previous
    /// contents stay untouched.
    pub(crate) fn ensure_capacity(&mut self, len: usize) -> Result<&mut [u8], ShapefileError> {
        if self.bytes.len() < len {
            self.bytes
                .try_reserve_exact(len - self.bytes.len())
                .map_err(|_| ShapefileError::OutOfMemory { bytes: len })?;
            self.bytes.resize(len, 0);
        }
        Ok(&mut self.bytes[..len])
    }

    pub(crate) fn capacity(&self) -> usize {
        self.bytes.len()
    }
}

/// An open `.shp`/`.shx` pair.
///
/// Storage is generic so the same code runs over files and in-memory
/// buffers. Handles opened for update must be finished with
/// [`ShapefileHandle::close`] to persist the rewritten headers and index.
#[derive(Debug)]
pub struct ShapefileHandle<S = File> {
    shp: S,
    shx: S,
    path: Utf8PathBuf,
    codec: FieldCodec,
    header: Header,
    shape_type: ShapeType,
    num_records: usize,
    /// Actual length of the geometry stream, used to reject offsets past EOF.
    shp_len: u64,
    index: RecordIndex,
    buffer: ScratchBuffer,
    writable: bool,
    updated: bool,
    /// False until the header bounds describe at least one vertex.
    bounds_set: bool,
}

impl<S> ShapefileHandle<S> {
    pub fn shape_type(&self) -> ShapeType {
        self.shape_type
    }

    pub fn num_records(&self) -> usize {
        self.num_records
    }

    /// File-wide planar bounds from the header.
    pub fn bounds(&self) -> Rect {
        self.header.bounds
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Base path (without extension) the handle was opened from.
    pub fn path(&self) -> &camino::Utf8Path {
        &self.path
    }

    pub fn host_order(&self) -> HostOrder {
        self.codec.host()
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    pub(crate) fn check_index(&self, index: usize) -> Result<(), ShapefileError> {
        if index >= self.num_records {
            return Err(ShapefileError::IndexOutOfRange {
                index,
                count: self.num_records,
            });
        }
        Ok(())
    }

    fn io_error(&self, source: std::io::Error) -> ShapefileError {
        ShapefileError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== ShapeType tests ====================

    #[test]
    fn shape_type_codes_round_trip() {
        for t in ShapeType::ALL {
            assert_eq!(ShapeType::from_code(t.code()).unwrap(), t);
        }
    }

    #[test]
    fn shape_type_rejects_unknown_codes() {
        assert!(matches!(
            ShapeType::from_code(31),
            Err(ShapefileError::UnknownShapeType { code: 31 })
        ));
    }

    #[test]
    fn shape_type_z_implies_m() {
        assert!(ShapeType::ArcZ.has_z());
        assert!(ShapeType::ArcZ.has_m());
        assert!(!ShapeType::ArcM.has_z());
        assert!(ShapeType::ArcM.has_m());
        assert!(!ShapeType::Arc.has_m());
        assert_eq!(ShapeType::PolygonM.kind(), ShapeKind::Polygon);
    }

    // ==================== Geometry tests ====================

    #[test]
    fn geometry_bounds_and_counts() {
        let g = Geometry::Polygon(vec![Line::from_xy(&[
            (0.0, 0.0),
            (10.0, 0.0),
            (10.0, 5.0),
            (0.0, 0.0),
        ])]);
        assert_eq!(g.bounds(), Rect::new(0.0, 0.0, 10.0, 5.0));
        assert_eq!(g.point_count(), 4);
        assert_eq!(g.lines().len(), 1);
        assert!(Geometry::Null.bounds().is_empty());
    }

    #[test]
    fn line_length_sums_segments() {
        let l = Line::from_xy(&[(0.0, 0.0), (3.0, 4.0), (3.0, 10.0)]);
        assert_eq!(l.length(), 11.0);
    }

    // ==================== ScratchBuffer tests ====================

    #[test]
    fn scratch_buffer_grows_and_keeps_capacity() {
        let mut buf = ScratchBuffer::default();
        assert_eq!(buf.ensure_capacity(16).unwrap().len(), 16);
        assert_eq!(buf.ensure_capacity(4).unwrap().len(), 4);
        assert_eq!(buf.capacity(), 16);
    }

    #[test]
    fn scratch_buffer_reports_impossible_allocations() {
        let mut buf = ScratchBuffer::default();
        buf.ensure_capacity(8).unwrap();
        let err = buf.ensure_capacity(usize::MAX).err();
        assert!(matches!(err, Some(ShapefileError::OutOfMemory { .. })));
        assert_eq!(buf.capacity(), 8);
    }
}
