//! Opening shapefiles and decoding records.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom};

use camino::{Utf8Path, Utf8PathBuf};

use super::{
    FieldCodec, Geometry, HEADER_BYTES, Header, HostOrder, Line, MAX_PARTS, MAX_POINTS,
    MAX_RECORDS, NULL_CONTENT_BYTES, OpenMode, PageSource, RECORD_HEADER_BYTES, RecordEntry,
    RecordIndex, ScratchBuffer, Shape, ShapeKind, ShapeType, ShapefileHandle,
};
use crate::errors::ShapefileError;
use crate::log::{self, debug};
use crate::types::{Point, Rect};

/// Extensions stripped from a path to get the shapefile base name.
const KNOWN_EXTENSIONS: [&str; 4] = ["shp", "shx", "dbf", "qix"];

/// `roads.shp` and `roads` both name the base `roads`.
pub(crate) fn base_path(path: &Utf8Path) -> Utf8PathBuf {
    match path.extension() {
        Some(ext) if KNOWN_EXTENSIONS.iter().any(|k| ext.eq_ignore_ascii_case(k)) => {
            path.with_extension("")
        }
        _ => path.to_path_buf(),
    }
}

/// `<base>.<ext>`, falling back to the upper-case extension.
pub(crate) fn find_component(base: &Utf8Path, ext: &str) -> Option<Utf8PathBuf> {
    [ext.to_ascii_lowercase(), ext.to_ascii_uppercase()]
        .into_iter()
        .map(|e| Utf8PathBuf::from(format!("{base}.{e}")))
        .find(|p| p.is_file())
}

fn open_component(base: &Utf8Path, ext: &str, mode: OpenMode) -> Result<File, ShapefileError> {
    let Some(path) = find_component(base, ext) else {
        return Err(ShapefileError::MissingFile {
            path: format!("{base}.{ext}").into(),
        });
    };
    OpenOptions::new()
        .read(true)
        .write(mode == OpenMode::Update)
        .open(&path)
        .map_err(|source| ShapefileError::Io { path, source })
}

impl ShapefileHandle<File> {
    /// Open `<base>.shp` and `<base>.shx`.
    pub fn open(path: impl AsRef<Utf8Path>, mode: OpenMode) -> Result<Self, ShapefileError> {
        Self::open_with(path, mode, HostOrder::native())
    }

    pub fn open_with(
        path: impl AsRef<Utf8Path>,
        mode: OpenMode,
        host: HostOrder,
    ) -> Result<Self, ShapefileError> {
        let base = base_path(path.as_ref());
        let shp = open_component(&base, "shp", mode)?;
        let shx = open_component(&base, "shx", mode)?;
        Self::from_parts(shp, shx, host, base, mode == OpenMode::Update)
    }
}

impl<S: Read + Seek> ShapefileHandle<S> {
    /// Read-only handle over arbitrary streams, such as in-memory buffers.
    pub fn from_streams(shp: S, shx: S, host: HostOrder) -> Result<Self, ShapefileError> {
        Self::from_parts(shp, shx, host, Utf8PathBuf::from("<memory>"), false)
    }

    pub(crate) fn from_parts(
        mut shp: S,
        mut shx: S,
        host: HostOrder,
        path: Utf8PathBuf,
        writable: bool,
    ) -> Result<Self, ShapefileError> {
        let codec = FieldCodec::new(host);

        let mut shx_bytes = [0u8; HEADER_BYTES];
        read_header(&mut shx, &mut shx_bytes, &path, "shx")?;
        if !Header::has_magic(&shx_bytes) {
            return Err(ShapefileError::BadMagic {
                path: format!("{path}.shx").into(),
            });
        }
        let shx_header = Header::decode(&shx_bytes, codec);
        let count = shx_header.index_record_count();
        if !(0..=MAX_RECORDS).contains(&count) {
            return Err(ShapefileError::TooManyRecords { count });
        }
        let shape_type = ShapeType::from_code(shx_header.shape_type_code)?;

        let mut shp_bytes = [0u8; HEADER_BYTES];
        read_header(&mut shp, &mut shp_bytes, &path, "shp")?;
        let header = Header::decode(&shp_bytes, codec);
        let shp_len = shp
            .seek(SeekFrom::End(0))
            .map_err(|source| ShapefileError::Io {
                path: path.clone(),
                source,
            })?;

        let num_records = count as usize;
        debug!(%path, num_records, %shape_type, "opened shapefile");
        Ok(ShapefileHandle {
            shp,
            shx,
            path,
            codec,
            header,
            shape_type,
            num_records,
            shp_len,
            index: RecordIndex::new(num_records),
            buffer: ScratchBuffer::default(),
            writable,
            updated: false,
            bounds_set: num_records > 0,
        })
    }

    /// Location of a record, loading its index page on first use.
    pub fn record_entry(&mut self, index: usize) -> Result<RecordEntry, ShapefileError> {
        self.check_index(index)?;
        self.index
            .entry(&mut self.shx, self.codec, index)
            .map_err(|source| ShapefileError::Io {
                path: self.path.clone(),
                source,
            })
    }

    /// Number of index pages read so far.
    pub fn loaded_index_pages(&self) -> usize {
        self.index.loaded_pages()
    }

    /// Decode one record. Corrupt records are errors; see
    /// [`ShapefileHandle::read_shape_lossy`] for the degrading variant.
    pub fn read_shape(&mut self, index: usize) -> Result<Shape, ShapefileError> {
        let len = self.read_content(index)?;
        decode_record(&self.buffer.bytes[..len], self.shape_type, self.codec, index)
    }

    /// Like [`ShapefileHandle::read_shape`], but a corrupt record comes back
    /// as a Null shape after being reported.
    pub fn read_shape_lossy(&mut self, index: usize) -> Result<Shape, ShapefileError> {
        match self.read_shape(index) {
            Err(err) if err.is_record_local() => {
                log::corrupt_record(&self.path, index, &err);
                Ok(Shape::null(Some(index)))
            }
            other => other,
        }
    }

    /// Bounds of a record without decoding its geometry.
    ///
    /// `None` for Null records, records too short to hold bounds and NaN
    /// bounds.
    pub fn read_bounds(&mut self, index: usize) -> Result<Option<Rect>, ShapefileError> {
        let entry = self.record_entry(index)?;
        if entry.size == NULL_CONTENT_BYTES {
            return Ok(None);
        }
        let is_point = self.shape_type.kind() == ShapeKind::Point;
        let n = if is_point { 16 } else { 32 };
        let start = entry.offset + RECORD_HEADER_BYTES + 4;
        if entry.size < 4 + n as u64 || start + n as u64 > self.shp_len {
            debug!(index, size = entry.size, "record too short to hold bounds");
            return Ok(None);
        }

        let mut buf = [0u8; 32];
        self.shp
            .read_exact_at(start, &mut buf[..n])
            .map_err(|source| ShapefileError::Io {
                path: self.path.clone(),
                source,
            })?;
        let f = |at: usize| self.codec.le_f64(&buf[at..at + 8]);
        let rect = if is_point {
            Rect::from_point(f(0), f(8))
        } else {
            Rect::new(f(0), f(8), f(16), f(24))
        };
        if rect.minx.is_nan() {
            debug!(index, "record has NaN bounds");
            return Ok(None);
        }
        Ok(Some(rect))
    }

    /// Decode a record of a point file.
    pub fn read_point(&mut self, index: usize) -> Result<Point, ShapefileError> {
        if self.shape_type.kind() != ShapeKind::Point {
            return Err(ShapefileError::NotPointFile);
        }
        match self.read_shape(index)?.geometry {
            Geometry::Point(p) => Ok(p),
            _ => Err(ShapefileError::CorruptRecord {
                index,
                reason: "null feature in a point file".to_string(),
            }),
        }
    }

    /// Read a record's content into the scratch buffer, returning its length.
    fn read_content(&mut self, index: usize) -> Result<usize, ShapefileError> {
        let entry = self.record_entry(index)?;
        let end = entry.offset + RECORD_HEADER_BYTES + entry.size;
        if entry.offset < HEADER_BYTES as u64 || end > self.shp_len {
            return Err(ShapefileError::CorruptRecord {
                index,
                reason: format!(
                    "record at offset {} with {} bytes lies outside the {} byte file",
                    entry.offset, entry.size, self.shp_len
                ),
            });
        }
        let len = usize::try_from(entry.size)
            .map_err(|_| ShapefileError::OutOfMemory { bytes: usize::MAX })?;
        let buf = self.buffer.ensure_capacity(len)?;
        let read = self.shp.read_exact_at(entry.offset + RECORD_HEADER_BYTES, buf);
        read.map_err(|source| ShapefileError::Io {
            path: self.path.clone(),
            source,
        })?;
        Ok(len)
    }
}

fn read_header<S: Read + Seek>(
    stream: &mut S,
    buf: &mut [u8; HEADER_BYTES],
    path: &Utf8Path,
    ext: &str,
) -> Result<(), ShapefileError> {
    match stream.read_exact_at(0, buf) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(ShapefileError::BadMagic {
            path: format!("{path}.{ext}").into(),
        }),
        Err(source) => Err(ShapefileError::Io {
            path: format!("{path}.{ext}").into(),
            source,
        }),
    }
}

// ============================================================================
// Record decoding
// ============================================================================

/// Decode the content of one record (everything after the 8-byte record
/// header) of a file of type `file_type`.
///
/// Every count is checked against `content.len()` before anything is sized
/// from it.
pub fn decode_record(
    content: &[u8],
    file_type: ShapeType,
    codec: FieldCodec,
    index: usize,
) -> Result<Shape, ShapefileError> {
    let reader = RecordReader {
        content,
        codec,
        file_type,
        index,
    };
    if content.len() < 4 {
        return Err(reader.corrupt("record is shorter than its shape type".to_string()));
    }
    if content.len() as u64 == NULL_CONTENT_BYTES || codec.le_i32(&content[0..4]) == 0 {
        return Ok(Shape::null(Some(index)));
    }
    match file_type.kind() {
        ShapeKind::Null => Ok(Shape::null(Some(index))),
        ShapeKind::Point => reader.point(),
        ShapeKind::MultiPoint => reader.multipoint(),
        ShapeKind::Arc | ShapeKind::Polygon => reader.poly(),
    }
}

struct RecordReader<'a> {
    content: &'a [u8],
    codec: FieldCodec,
    file_type: ShapeType,
    index: usize,
}

impl RecordReader<'_> {
    fn corrupt(&self, reason: String) -> ShapefileError {
        ShapefileError::CorruptRecord {
            index: self.index,
            reason,
        }
    }

    fn f64_at(&self, at: usize) -> f64 {
        self.codec.le_f64(&self.content[at..at + 8])
    }

    fn i32_at(&self, at: usize) -> i32 {
        self.codec.le_i32(&self.content[at..at + 4])
    }

    fn rect_at(&self, at: usize) -> Rect {
        Rect::new(
            self.f64_at(at),
            self.f64_at(at + 8),
            self.f64_at(at + 16),
            self.f64_at(at + 24),
        )
    }

    fn too_short(&self, needed: usize) -> ShapefileError {
        self.corrupt(format!(
            "{} record needs {needed} bytes but has {}",
            self.file_type,
            self.content.len()
        ))
    }

    /// Offsets of the per-point Z and M values following the XY block.
    fn zm_offsets(&self, xy_end: usize, n: usize) -> (Option<usize>, Option<usize>) {
        let block = 16 + 8 * n;
        let len = self.content.len();
        let mut at = xy_end;
        let mut z = None;
        if self.file_type.has_z() {
            if len >= at + block {
                z = Some(at + 16);
            }
            at += block;
        }
        let m = (self.file_type.has_m() && len >= at + block).then_some(at + 16);
        (z, m)
    }

    fn vertex(&self, xy: usize, z: Option<usize>, m: Option<usize>, k: usize) -> Point {
        Point {
            x: self.f64_at(xy + 16 * k),
            y: self.f64_at(xy + 16 * k + 8),
            z: z.map_or(0.0, |at| self.f64_at(at + 8 * k)),
            m: m.map_or(0.0, |at| self.f64_at(at + 8 * k)),
        }
    }

    fn point(&self) -> Result<Shape, ShapefileError> {
        if self.content.len() < 20 {
            return Err(self.too_short(20));
        }
        let len = self.content.len();
        let mut p = Point::new(self.f64_at(4), self.f64_at(12));
        if self.file_type.has_z() {
            if len >= 28 {
                p.z = self.f64_at(20);
            }
            if len >= 36 {
                p.m = self.f64_at(28);
            }
        } else if self.file_type.has_m() && len >= 28 {
            p.m = self.f64_at(20);
        }
        Ok(Shape {
            index: Some(self.index),
            bounds: Rect::from_point(p.x, p.y),
            geometry: Geometry::Point(p),
            ..Shape::default()
        })
    }

    fn multipoint(&self) -> Result<Shape, ShapefileError> {
        if self.content.len() < 40 {
            return Err(self.too_short(40));
        }
        let n = self.i32_at(36);
        if !(0..=MAX_POINTS).contains(&n) {
            return Err(self.corrupt(format!("point count {n} out of range")));
        }
        let n = n as usize;
        let xy_end = 40 + 16 * n;
        if xy_end > self.content.len() {
            return Err(self.too_short(xy_end));
        }
        if n == 0 {
            debug!(index = self.index, "multipoint without points");
            return Ok(Shape::null(Some(self.index)));
        }
        let (z, m) = self.zm_offsets(xy_end, n);
        let points = (0..n).map(|k| self.vertex(40, z, m, k)).collect();
        Ok(Shape {
            index: Some(self.index),
            bounds: self.rect_at(4),
            geometry: Geometry::MultiPoint(points),
            ..Shape::default()
        })
    }

    fn poly(&self) -> Result<Shape, ShapefileError> {
        if self.content.len() < 44 {
            return Err(self.too_short(44));
        }
        let n_parts = self.i32_at(36);
        let n_points = self.i32_at(40);
        if !(0..=MAX_PARTS).contains(&n_parts) || !(0..=MAX_POINTS).contains(&n_points) {
            return Err(self.corrupt(format!(
                "{n_points} points in {n_parts} parts is out of range"
            )));
        }
        let (n_parts, n_points) = (n_parts as usize, n_points as usize);
        let xy = 44 + 4 * n_parts;
        let xy_end = xy + 16 * n_points;
        if xy_end > self.content.len() {
            return Err(self.too_short(xy_end));
        }
        if n_parts == 0 {
            debug!(index = self.index, "poly record without parts");
            return Ok(Shape::null(Some(self.index)));
        }

        let is_polygon = self.file_type.kind() == ShapeKind::Polygon;
        let min_points = if is_polygon { 3 } else { 2 };
        let starts: Vec<i64> = (0..n_parts)
            .map(|i| i64::from(self.i32_at(44 + 4 * i)))
            .collect();
        let (z, m) = self.zm_offsets(xy_end, n_points);

        let mut lines = Vec::with_capacity(n_parts);
        for (i, &start) in starts.iter().enumerate() {
            let end = starts.get(i + 1).copied().unwrap_or(n_points as i64);
            let count = end - start;
            if start < 0 || end > n_points as i64 || count <= 0 {
                return Err(self.corrupt(format!(
                    "part {i} spans points {start}..{end} of {n_points}"
                )));
            }
            if count < min_points {
                return Err(self.corrupt(format!(
                    "part {i} has {count} points, fewer than the {min_points} a {} needs",
                    self.file_type
                )));
            }
            let points = (start as usize..end as usize)
                .map(|k| self.vertex(xy, z, m, k))
                .collect();
            lines.push(Line::new(points));
        }

        let geometry = if is_polygon {
            Geometry::Polygon(lines)
        } else {
            Geometry::Line(lines)
        };
        Ok(Shape {
            index: Some(self.index),
            bounds: self.rect_at(4),
            geometry,
            ..Shape::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn codec() -> FieldCodec {
        FieldCodec::new(HostOrder::native())
    }

    /// Content of a poly record with the given parts and points.
    fn poly_content(shape_type: ShapeType, parts: &[i32], points: &[(f64, f64)]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend(shape_type.code().to_le_bytes());
        for v in [0.0f64, 0.0, 10.0, 10.0] {
            out.extend(v.to_le_bytes());
        }
        out.extend((parts.len() as i32).to_le_bytes());
        out.extend((points.len() as i32).to_le_bytes());
        for p in parts {
            out.extend(p.to_le_bytes());
        }
        for (x, y) in points {
            out.extend(x.to_le_bytes());
            out.extend(y.to_le_bytes());
        }
        out
    }

    const SQUARE: [(f64, f64); 5] = [(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0), (0.0, 0.0)];

    // ==================== base_path tests ====================

    #[test]
    fn base_path_strips_known_extensions_only() {
        assert_eq!(base_path(Utf8Path::new("data/roads.shp")), "data/roads");
        assert_eq!(base_path(Utf8Path::new("data/roads.SHX")), "data/roads");
        assert_eq!(base_path(Utf8Path::new("data/roads")), "data/roads");
        assert_eq!(base_path(Utf8Path::new("data/roads.v2")), "data/roads.v2");
    }

    // ==================== decode_record tests ====================

    #[test]
    fn decodes_polygon_ring() {
        let content = poly_content(ShapeType::Polygon, &[0], &SQUARE);
        let shape = decode_record(&content, ShapeType::Polygon, codec(), 0).unwrap();
        match &shape.geometry {
            Geometry::Polygon(rings) => {
                assert_eq!(rings.len(), 1);
                assert_eq!(rings[0].len(), 5);
                assert_eq!(rings[0].points[2], Point::new(10.0, 10.0));
            }
            other => panic!("expected polygon, got {other:?}"),
        }
    }

    #[test]
    fn decodes_multi_part_line() {
        let pts = [(0.0, 0.0), (1.0, 1.0), (5.0, 5.0), (6.0, 6.0), (7.0, 5.0)];
        let content = poly_content(ShapeType::Arc, &[0, 2], &pts);
        let shape = decode_record(&content, ShapeType::Arc, codec(), 3).unwrap();
        let Shape {
            index,
            geometry: Geometry::Line(lines),
            ..
        } = shape
        else {
            panic!("expected line");
        };
        assert_eq!(index, Some(3));
        assert_eq!(lines.iter().map(Line::len).collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn point_count_past_record_end_is_corrupt() {
        let mut content = poly_content(ShapeType::Polygon, &[0], &SQUARE);
        content[40..44].copy_from_slice(&1000i32.to_le_bytes());
        let err = decode_record(&content, ShapeType::Polygon, codec(), 7).err();
        assert!(matches!(err, Some(ShapefileError::CorruptRecord { index: 7, .. })));
    }

    #[test]
    fn negative_counts_are_corrupt() {
        let mut content = poly_content(ShapeType::Polygon, &[0], &SQUARE);
        content[36..40].copy_from_slice(&(-1i32).to_le_bytes());
        assert!(decode_record(&content, ShapeType::Polygon, codec(), 0).is_err());
    }

    #[test]
    fn huge_part_count_is_rejected_before_allocation() {
        let mut content = poly_content(ShapeType::Arc, &[0], &SQUARE);
        content[36..40].copy_from_slice(&i32::MAX.to_le_bytes());
        assert!(decode_record(&content, ShapeType::Arc, codec(), 0).is_err());
    }

    #[test]
    fn decreasing_part_starts_are_corrupt() {
        let pts = [(0.0, 0.0), (1.0, 1.0), (2.0, 2.0), (3.0, 3.0)];
        let content = poly_content(ShapeType::Arc, &[2, 0], &pts);
        assert!(decode_record(&content, ShapeType::Arc, codec(), 0).is_err());
    }

    #[test]
    fn degenerate_ring_is_corrupt() {
        let pts = [(0.0, 0.0), (1.0, 1.0)];
        let content = poly_content(ShapeType::Polygon, &[0], &pts);
        assert!(decode_record(&content, ShapeType::Polygon, codec(), 0).is_err());

        let line = poly_content(ShapeType::Arc, &[0], &pts);
        assert!(decode_record(&line, ShapeType::Arc, codec(), 0).is_ok());
    }

    #[test]
    fn null_record_decodes_as_null() {
        let content = 0i32.to_le_bytes();
        let shape = decode_record(&content, ShapeType::Polygon, codec(), 1).unwrap();
        assert_eq!(shape, Shape::null(Some(1)));
    }

    #[test]
    fn short_point_record_is_corrupt() {
        let mut content = Vec::new();
        content.extend(1i32.to_le_bytes());
        content.extend(1.0f64.to_le_bytes());
        assert!(decode_record(&content, ShapeType::Point, codec(), 0).is_err());
    }

    #[test]
    fn point_m_reads_measure() {
        let mut content = Vec::new();
        content.extend(21i32.to_le_bytes());
        for v in [1.0f64, 2.0, 9.5] {
            content.extend(v.to_le_bytes());
        }
        let shape = decode_record(&content, ShapeType::PointM, codec(), 0).unwrap();
        assert_eq!(shape.geometry, Geometry::Point(Point::with_zm(1.0, 2.0, 0.0, 9.5)));
    }

    // ==================== open tests ====================

    #[test]
    fn rejects_index_without_magic() {
        let shx = Cursor::new(vec![0u8; 100]);
        let shp = Cursor::new(vec![0u8; 100]);
        let err = ShapefileHandle::from_streams(shp, shx, HostOrder::native()).err();
        assert!(matches!(err, Some(ShapefileError::BadMagic { .. })));
    }

    #[test]
    fn rejects_truncated_index_header() {
        let shx = Cursor::new(vec![0u8, 0, 0x27, 0x0a]);
        let shp = Cursor::new(vec![0u8; 100]);
        let err = ShapefileHandle::from_streams(shp, shx, HostOrder::native()).err();
        assert!(matches!(err, Some(ShapefileError::BadMagic { .. })));
    }

    #[test]
    fn rejects_absurd_record_count() {
        let header = Header {
            file_length: 100 + 8 * (MAX_RECORDS as u64 + 1),
            shape_type_code: 1,
            ..Header::default()
        };
        let bytes = header.encode(codec());
        let shx = Cursor::new(bytes.to_vec());
        let shp = Cursor::new(bytes.to_vec());
        let err = ShapefileHandle::from_streams(shp, shx, HostOrder::native()).err();
        assert!(matches!(err, Some(ShapefileError::TooManyRecords { .. })));
    }

    #[test]
    fn missing_files_fail_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("nothing.shp")).unwrap();
        let err = ShapefileHandle::open(&path, OpenMode::Read).unwrap_err();
        assert!(matches!(err, ShapefileError::MissingFile { .. }));
    }
}
