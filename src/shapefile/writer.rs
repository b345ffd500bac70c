//! Creating shapefiles and appending records.
//!
//! Records are appended at the end of the `.shp` stream. Headers and the
//! whole `.shx` body are rewritten by [`ShapefileHandle::flush`] (called from
//! [`ShapefileHandle::close`]) whenever something was written.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};

use camino::{Utf8Path, Utf8PathBuf};

use super::index::ENTRY_BYTES;
use super::reader::base_path;
use super::{
    FieldCodec, Geometry, HEADER_BYTES, Header, HostOrder, MAX_PARTS, MAX_POINTS,
    RECORD_HEADER_BYTES, RecordEntry, RecordIndex, ScratchBuffer, ShapeKind, ShapeType,
    ShapefileHandle,
};
use crate::errors::ShapefileError;
use crate::log::debug;
use crate::types::{Point, Rect};

impl ShapefileHandle<File> {
    /// Create (or truncate) `<base>.shp` and `<base>.shx`.
    pub fn create(path: impl AsRef<Utf8Path>, shape_type: ShapeType) -> Result<Self, ShapefileError> {
        Self::create_with(path, shape_type, HostOrder::native())
    }

    pub fn create_with(
        path: impl AsRef<Utf8Path>,
        shape_type: ShapeType,
        host: HostOrder,
    ) -> Result<Self, ShapefileError> {
        let base = base_path(path.as_ref());
        let create = |ext: &str| {
            let path = Utf8PathBuf::from(format!("{base}.{ext}"));
            OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .open(&path)
                .map_err(|source| ShapefileError::Io { path, source })
        };
        let shp = create("shp")?;
        let shx = create("shx")?;
        Self::create_in(shp, shx, shape_type, host, base)
    }
}

impl<S: Read + Write + Seek> ShapefileHandle<S> {
    /// Writable handle over empty streams.
    pub fn create_in_streams(
        shp: S,
        shx: S,
        shape_type: ShapeType,
        host: HostOrder,
    ) -> Result<Self, ShapefileError> {
        Self::create_in(shp, shx, shape_type, host, Utf8PathBuf::from("<memory>"))
    }

    fn create_in(
        shp: S,
        shx: S,
        shape_type: ShapeType,
        host: HostOrder,
        path: Utf8PathBuf,
    ) -> Result<Self, ShapefileError> {
        let mut handle = ShapefileHandle {
            shp,
            shx,
            path,
            codec: FieldCodec::new(host),
            header: Header {
                shape_type_code: shape_type.code(),
                ..Header::default()
            },
            shape_type,
            num_records: 0,
            shp_len: HEADER_BYTES as u64,
            index: RecordIndex::new(0),
            buffer: ScratchBuffer::default(),
            writable: true,
            updated: true,
            bounds_set: false,
        };
        handle.flush()?;
        Ok(handle)
    }

    /// Append a record, returning its index.
    pub fn write_shape(&mut self, geometry: &Geometry) -> Result<usize, ShapefileError> {
        if !self.writable {
            return Err(ShapefileError::ReadOnly {
                path: self.path.clone(),
            });
        }
        let index = self.num_records;
        let content = encode_record(geometry, self.shape_type, self.codec, index)?;
        self.ensure_index_loaded()?;

        let offset = self.shp_len;
        let size = content.len() as u64;
        let mut record = Vec::with_capacity(RECORD_HEADER_BYTES as usize + content.len());
        record.resize(RECORD_HEADER_BYTES as usize, 0);
        self.codec.put_be_i32(&mut record[0..4], (index + 1) as i32);
        self.codec.put_be_i32(&mut record[4..8], (size / 2) as i32);
        record.extend_from_slice(&content);
        write_at(&mut self.shp, offset, &record).map_err(|source| ShapefileError::Io {
            path: self.path.clone(),
            source,
        })?;

        self.shp_len = offset + record.len() as u64;
        self.header.file_length = self.shp_len;
        self.index.push(RecordEntry { offset, size });
        self.num_records += 1;
        self.extend_bounds(geometry);
        self.updated = true;
        Ok(index)
    }

    /// Append a record to a point file.
    pub fn write_point(&mut self, point: Point) -> Result<usize, ShapefileError> {
        if self.shape_type.kind() != ShapeKind::Point {
            return Err(ShapefileError::NotPointFile);
        }
        self.write_shape(&Geometry::Point(point))
    }

    /// Rewrite both headers and the full `.shx` entry table if anything was
    /// written since the last flush.
    pub fn flush(&mut self) -> Result<(), ShapefileError> {
        if !self.updated {
            return Ok(());
        }
        let shp_header = Header {
            file_length: self.shp_len,
            shape_type_code: self.shape_type.code(),
            ..self.header
        };
        let shx_header = Header {
            file_length: (HEADER_BYTES + self.num_records * ENTRY_BYTES) as u64,
            ..shp_header
        };

        let mut shx = Vec::with_capacity(HEADER_BYTES + self.num_records * ENTRY_BYTES);
        shx.extend_from_slice(&shx_header.encode(self.codec));
        for entry in self.index.iter_loaded() {
            let at = shx.len();
            shx.resize(at + ENTRY_BYTES, 0);
            entry.encode(&mut shx[at..], self.codec);
        }

        let io = |source: io::Error| ShapefileError::Io {
            path: self.path.clone(),
            source,
        };
        write_at(&mut self.shp, 0, &shp_header.encode(self.codec)).map_err(io)?;
        write_at(&mut self.shx, 0, &shx).map_err(io)?;
        self.shp.flush().map_err(io)?;
        self.shx.flush().map_err(io)?;

        debug!(path = %self.path, records = self.num_records, "rewrote shapefile headers");
        self.updated = false;
        Ok(())
    }

    /// Flush pending header and index updates and release the streams.
    pub fn close(mut self) -> Result<(), ShapefileError> {
        self.flush()
    }

    /// Give back the underlying streams after flushing.
    pub fn into_streams(mut self) -> Result<(S, S), ShapefileError> {
        self.flush()?;
        Ok((self.shp, self.shx))
    }

    fn ensure_index_loaded(&mut self) -> Result<(), ShapefileError> {
        self.index
            .load_all(&mut self.shx, self.codec)
            .map_err(|source| ShapefileError::Io {
                path: self.path.clone(),
                source,
            })
    }

    fn extend_bounds(&mut self, geometry: &Geometry) {
        for p in geometry.points() {
            let h = &mut self.header;
            if !self.bounds_set {
                h.bounds = Rect::from_point(p.x, p.y);
                h.z_range = (p.z, p.z);
                h.m_range = (p.m, p.m);
                self.bounds_set = true;
            } else {
                h.bounds.expand_point(p.x, p.y);
                h.z_range = (h.z_range.0.min(p.z), h.z_range.1.max(p.z));
                h.m_range = (h.m_range.0.min(p.m), h.m_range.1.max(p.m));
            }
        }
    }
}

fn write_at<S: Write + Seek>(stream: &mut S, offset: u64, bytes: &[u8]) -> io::Result<()> {
    stream.seek(SeekFrom::Start(offset))?;
    stream.write_all(bytes)
}

// ============================================================================
// Record encoding
// ============================================================================

/// Encode `geometry` as the content of a record of a `file_type` file.
pub(crate) fn encode_record(
    geometry: &Geometry,
    file_type: ShapeType,
    codec: FieldCodec,
    index: usize,
) -> Result<Vec<u8>, ShapefileError> {
    let mut w = RecordWriter {
        out: Vec::new(),
        codec,
    };
    match (geometry, file_type.kind()) {
        (Geometry::Null, _) => w.i32(0),
        (Geometry::Point(p), ShapeKind::Point) => {
            w.i32(file_type.code());
            w.f64(p.x);
            w.f64(p.y);
            if file_type.has_z() {
                w.f64(p.z);
            }
            if file_type.has_m() {
                w.f64(p.m);
            }
        }
        (Geometry::MultiPoint(points), ShapeKind::MultiPoint) => {
            let n = checked_count(points.len(), MAX_POINTS, index, "points")?;
            w.i32(file_type.code());
            w.rect(&geometry.bounds());
            w.i32(n);
            for p in points {
                w.f64(p.x);
                w.f64(p.y);
            }
            w.zm_blocks(file_type, points);
        }
        (Geometry::Line(lines), ShapeKind::Arc) | (Geometry::Polygon(lines), ShapeKind::Polygon) => {
            let points: Vec<Point> = lines.iter().flat_map(|l| l.points.iter().copied()).collect();
            let n_parts = checked_count(lines.len(), MAX_PARTS, index, "parts")?;
            let n_points = checked_count(points.len(), MAX_POINTS, index, "points")?;
            w.i32(file_type.code());
            w.rect(&geometry.bounds());
            w.i32(n_parts);
            w.i32(n_points);
            let mut start = 0;
            for line in lines {
                w.i32(start as i32);
                start += line.len();
            }
            for p in &points {
                w.f64(p.x);
                w.f64(p.y);
            }
            w.zm_blocks(file_type, &points);
        }
        _ => {
            return Err(ShapefileError::ShapeTypeMismatch {
                file: file_type.name(),
                shape: geometry.kind_name(),
            });
        }
    }
    Ok(w.out)
}

fn checked_count(n: usize, max: i32, index: usize, what: &str) -> Result<i32, ShapefileError> {
    i32::try_from(n)
        .ok()
        .filter(|&n| n <= max)
        .ok_or_else(|| ShapefileError::CorruptRecord {
            index,
            reason: format!("{n} {what} exceed the format limit of {max}"),
        })
}

struct RecordWriter {
    out: Vec<u8>,
    codec: FieldCodec,
}

impl RecordWriter {
    fn i32(&mut self, v: i32) {
        let at = self.out.len();
        self.out.resize(at + 4, 0);
        self.codec.put_le_i32(&mut self.out[at..], v);
    }

    fn f64(&mut self, v: f64) {
        let at = self.out.len();
        self.out.resize(at + 8, 0);
        self.codec.put_le_f64(&mut self.out[at..], v);
    }

    fn rect(&mut self, r: &Rect) {
        let r = if r.is_empty() {
            Rect::new(0.0, 0.0, 0.0, 0.0)
        } else {
            *r
        };
        for v in [r.minx, r.miny, r.maxx, r.maxy] {
            self.f64(v);
        }
    }

    /// Range then per-point values.
    fn measure_block(&mut self, values: impl Iterator<Item = f64> + Clone) {
        let (lo, hi) = values
            .clone()
            .fold(None, |acc: Option<(f64, f64)>, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
            .unwrap_or((0.0, 0.0));
        self.f64(lo);
        self.f64(hi);
        for v in values {
            self.f64(v);
        }
    }

    fn zm_blocks(&mut self, file_type: ShapeType, points: &[Point]) {
        if file_type.has_z() {
            self.measure_block(points.iter().map(|p| p.z));
        }
        if file_type.has_m() {
            self.measure_block(points.iter().map(|p| p.m));
        }
    }
}
