//! Rectangle queries over one shapefile.
//!
//! [`Shapefile::which_shapes`] turns a query rectangle into a [`StatusBits`]
//! selection. The cheap cases never touch records: a disjoint rectangle ends
//! the query and a rectangle covering the whole file selects everything.
//! Otherwise candidates come from an external tree index when one exists,
//! or from reading the bounds of every record.

use std::fs::File;
use std::io::{Read, Seek};

use camino::Utf8Path;

use crate::attributes::{AttributeTable, DbfTable};
use crate::bitset::StatusBits;
use crate::errors::ShapefileError;
use crate::log::{self, debug};
use crate::shapefile::{OpenMode, ShapeType, ShapefileHandle};
use crate::types::Rect;

/// Extension of the on-disk tree index next to a shapefile.
pub const TREE_INDEX_EXTENSION: &str = "qix";

/// Outcome of a spatial query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryStatus {
    /// Some records may match; iterate the selection.
    Selected,
    /// Nothing can match.
    Done,
}

/// External spatial index queried by rectangle.
///
/// Implementations return `None` when no index exists for the shapefile at
/// `base`, which makes the query fall back to a bounds scan.
pub trait SpatialTreeIndex {
    fn search(&self, base: &Utf8Path, rect: &Rect, num_records: usize) -> Option<StatusBits>;
}

/// No external index: every query scans record bounds.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoTreeIndex;

impl SpatialTreeIndex for NoTreeIndex {
    fn search(&self, _base: &Utf8Path, _rect: &Rect, _num_records: usize) -> Option<StatusBits> {
        None
    }
}

impl<F> SpatialTreeIndex for F
where
    F: Fn(&Utf8Path, &Rect, usize) -> Option<StatusBits>,
{
    fn search(&self, base: &Utf8Path, rect: &Rect, num_records: usize) -> Option<StatusBits> {
        self(base, rect, num_records)
    }
}

/// A shapefile with its attributes and the state of the current query.
pub struct Shapefile<S = File> {
    handle: ShapefileHandle<S>,
    attributes: Option<Box<dyn AttributeTable>>,
    tree: Box<dyn SpatialTreeIndex>,
    status: Option<StatusBits>,
    status_bounds: Option<Rect>,
    last_shape: Option<usize>,
}

impl Shapefile<File> {
    /// Open `<base>.shp`/`.shx` and, when present, `<base>.dbf`.
    pub fn open(path: impl AsRef<Utf8Path>) -> Result<Self, ShapefileError> {
        let handle = ShapefileHandle::open(path, OpenMode::Read)?;
        let dbf = crate::shapefile::find_component(handle.path(), "dbf");
        let attributes: Option<Box<dyn AttributeTable>> = match dbf {
            Some(path) => Some(Box::new(DbfTable::open(path)?)),
            None => {
                log::missing_attributes(handle.path());
                None
            }
        };
        Ok(Shapefile {
            attributes,
            ..Shapefile::from_handle(handle)
        })
    }
}

impl<S: Read + Seek> Shapefile<S> {
    pub fn from_handle(handle: ShapefileHandle<S>) -> Self {
        Shapefile {
            handle,
            attributes: None,
            tree: Box::new(NoTreeIndex),
            status: None,
            status_bounds: None,
            last_shape: None,
        }
    }

    pub fn with_attributes(mut self, table: impl AttributeTable + 'static) -> Self {
        self.attributes = Some(Box::new(table));
        self
    }

    pub fn with_tree_index(mut self, tree: impl SpatialTreeIndex + 'static) -> Self {
        self.tree = Box::new(tree);
        self
    }

    pub fn handle(&self) -> &ShapefileHandle<S> {
        &self.handle
    }

    pub fn handle_mut(&mut self) -> &mut ShapefileHandle<S> {
        &mut self.handle
    }

    pub fn attributes_mut(&mut self) -> Option<&mut (dyn AttributeTable + 'static)> {
        self.attributes.as_deref_mut()
    }

    pub fn attributes(&self) -> Option<&(dyn AttributeTable + 'static)> {
        self.attributes.as_deref()
    }

    pub fn num_shapes(&self) -> usize {
        self.handle.num_records()
    }

    pub fn shape_type(&self) -> ShapeType {
        self.handle.shape_type()
    }

    pub fn bounds(&self) -> Rect {
        self.handle.bounds()
    }

    /// Selection built by the last query, if it selected anything.
    pub fn status(&self) -> Option<&StatusBits> {
        self.status.as_ref()
    }

    pub fn status_mut(&mut self) -> Option<&mut StatusBits> {
        self.status.as_mut()
    }

    /// Rectangle of the last query.
    pub fn status_bounds(&self) -> Option<Rect> {
        self.status_bounds
    }

    /// Last record returned by [`Shapefile::next_match`].
    pub fn last_shape(&self) -> Option<usize> {
        self.last_shape
    }

    /// Select the records whose bounds overlap `rect`.
    pub fn which_shapes(&mut self, rect: Rect) -> Result<QueryStatus, ShapefileError> {
        self.status = None;
        self.last_shape = None;
        self.status_bounds = Some(rect);

        let bounds = self.handle.bounds();
        let n = self.handle.num_records();
        if !bounds.overlaps(&rect) {
            return Ok(QueryStatus::Done);
        }
        if bounds.is_contained_in(&rect) {
            self.status = Some(StatusBits::all(n));
            return Ok(QueryStatus::Selected);
        }

        let status = match self.tree.search(self.handle.path(), &rect, n) {
            Some(candidates) => {
                debug!(
                    path = %self.handle.path(),
                    candidates = candidates.count_ones(),
                    "tree index search"
                );
                self.filter_candidates(candidates, &rect)?
            }
            None => self.scan_bounds(&rect)?,
        };
        self.status = Some(status);
        Ok(QueryStatus::Selected)
    }

    /// Forget the current query.
    pub fn clear_query(&mut self) {
        self.status = None;
        self.status_bounds = None;
        self.last_shape = None;
    }

    /// Advance the query cursor to the next selected record.
    pub fn next_match(&mut self) -> Option<usize> {
        let from = self.last_shape.map_or(0, |i| i + 1);
        let i = self.status.as_ref()?.next_set_bit(from)?;
        self.last_shape = Some(i);
        Some(i)
    }

    /// Linear scan over record bounds.
    fn scan_bounds(&mut self, rect: &Rect) -> Result<StatusBits, ShapefileError> {
        let n = self.handle.num_records();
        let mut status = StatusBits::new(n);
        for i in 0..n {
            if self.handle.read_bounds(i)?.is_some_and(|b| b.overlaps(rect)) {
                status.set(i);
            }
        }
        Ok(status)
    }

    /// Drop tree candidates whose own bounds miss `rect`.
    fn filter_candidates(
        &mut self,
        mut candidates: StatusBits,
        rect: &Rect,
    ) -> Result<StatusBits, ShapefileError> {
        let n = self.handle.num_records();
        let mut i = 0;
        while let Some(c) = candidates.next_set_bit(i) {
            if c >= n || !self.handle.read_bounds(c)?.is_some_and(|b| b.overlaps(rect)) {
                candidates.clear(c);
            }
            i = c + 1;
        }
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapefile::{Geometry, HostOrder, Line};
    use std::cell::Cell;
    use std::io::Cursor;
    use std::rc::Rc;

    type MemShapefile = Shapefile<Cursor<Vec<u8>>>;

    fn square(x: f64, y: f64, size: f64) -> Geometry {
        Geometry::Polygon(vec![Line::from_xy(&[
            (x, y),
            (x + size, y),
            (x + size, y + size),
            (x, y + size),
            (x, y),
        ])])
    }

    /// Unit squares at (0,0), (10,0), ..., one per record.
    fn row_of_squares(n: usize) -> MemShapefile {
        let mut h = ShapefileHandle::create_in_streams(
            Cursor::new(Vec::new()),
            Cursor::new(Vec::new()),
            ShapeType::Polygon,
            HostOrder::native(),
        )
        .unwrap();
        for i in 0..n {
            h.write_shape(&square(10.0 * i as f64, 0.0, 1.0)).unwrap();
        }
        let (shp, shx) = h.into_streams().unwrap();
        Shapefile::from_handle(ShapefileHandle::from_streams(shp, shx, HostOrder::native()).unwrap())
    }

    #[test]
    fn disjoint_rect_is_done() {
        let mut shp = row_of_squares(3);
        let status = shp.which_shapes(Rect::new(100.0, 100.0, 200.0, 200.0)).unwrap();
        assert_eq!(status, QueryStatus::Done);
        assert!(shp.status().is_none());
        assert_eq!(shp.next_match(), None);
    }

    #[test]
    fn covering_rect_selects_everything_without_reading_records() {
        let mut shp = row_of_squares(3);
        let status = shp.which_shapes(Rect::new(-1.0, -1.0, 100.0, 100.0)).unwrap();
        assert_eq!(status, QueryStatus::Selected);
        assert_eq!(shp.status().map(StatusBits::count_ones), Some(3));
        assert_eq!(shp.handle().loaded_index_pages(), 0);
    }

    #[test]
    fn partial_rect_scans_bounds() {
        let mut shp = row_of_squares(4);
        shp.which_shapes(Rect::new(9.0, -1.0, 21.0, 2.0)).unwrap();
        let ids: Vec<usize> = std::iter::from_fn(|| shp.next_match()).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(shp.last_shape(), Some(2));
    }

    #[test]
    fn status_bounds_remember_the_query() {
        let mut shp = row_of_squares(2);
        let rect = Rect::new(0.0, 0.0, 0.5, 0.5);
        shp.which_shapes(rect).unwrap();
        assert_eq!(shp.status_bounds(), Some(rect));
    }

    #[test]
    fn tree_index_candidates_are_refined() {
        let calls = Rc::new(Cell::new(0));
        let seen = calls.clone();
        let tree = move |_: &Utf8Path, _: &Rect, n: usize| {
            seen.set(seen.get() + 1);
            let mut bits = StatusBits::new(n);
            bits.set(0);
            bits.set(3);
            Some(bits)
        };
        let mut shp = row_of_squares(4).with_tree_index(tree);
        shp.which_shapes(Rect::new(25.0, -1.0, 35.0, 2.0)).unwrap();
        assert_eq!(calls.get(), 1);
        let ids: Vec<usize> = std::iter::from_fn(|| shp.next_match()).collect();
        assert_eq!(ids, vec![3]);
    }

    #[test]
    fn null_records_are_never_selected() {
        let mut h = ShapefileHandle::create_in_streams(
            Cursor::new(Vec::new()),
            Cursor::new(Vec::new()),
            ShapeType::Polygon,
            HostOrder::native(),
        )
        .unwrap();
        h.write_shape(&square(0.0, 0.0, 10.0)).unwrap();
        h.write_shape(&Geometry::Null).unwrap();
        h.write_shape(&square(20.0, 0.0, 10.0)).unwrap();
        let (shp, shx) = h.into_streams().unwrap();
        let mut shp =
            Shapefile::from_handle(ShapefileHandle::from_streams(shp, shx, HostOrder::native()).unwrap());
        shp.which_shapes(Rect::new(5.0, 5.0, 25.0, 6.0)).unwrap();
        assert_eq!(shp.status().map(|s| s.iter_ones().collect::<Vec<_>>()), Some(vec![0, 2]));
    }
}
