//! Feature iteration over a shapefile.
//!
//! A layer wraps a [`Shapefile`] with the settings a map layer applies to
//! every query: which attribute items ride along with each shape, an
//! optional attribute filter and a maximum feature count.

use std::fs::File;
use std::io::{Read, Seek};
use std::rc::Rc;

use camino::Utf8Path;

use crate::bitset::StatusBits;
use crate::errors::LayerError;
use crate::log::debug;
use crate::shapefile::Shape;
use crate::spatial::{QueryStatus, Shapefile};
use crate::types::Rect;

/// Predicate over the values of a layer's requested items.
pub type AttributeFilter = Rc<dyn Fn(&[String]) -> bool>;

/// Query settings shared by plain and tiled layers.
#[derive(Clone, Default)]
pub struct LayerOptions {
    /// Attribute items attached to each returned shape, in order.
    pub items: Vec<String>,
    /// Cap on the number of selected shapes per query.
    pub max_features: Option<usize>,
    pub filter: Option<AttributeFilter>,
}

impl LayerOptions {
    pub fn with_items<I, S>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.items = items.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_features(mut self, max: usize) -> Self {
        self.max_features = Some(max);
        self
    }

    pub fn with_filter(mut self, filter: impl Fn(&[String]) -> bool + 'static) -> Self {
        self.filter = Some(Rc::new(filter));
        self
    }
}

/// Clear selected bits, walking from the last record backwards, once
/// `max` of them have been kept.
///
/// Runs before attribute filtering, so filtered-out shapes are not
/// replaced and a query can return fewer than `max` shapes.
pub fn trim_to_max_features(status: &mut StatusBits, max: usize) {
    let mut kept = 0;
    for i in (0..status.len()).rev() {
        if status.is_set(i) {
            kept += 1;
            if kept > max {
                status.clear(i);
            }
        }
    }
}

pub struct ShapefileLayer<S = File> {
    name: String,
    shapefile: Shapefile<S>,
    item_indices: Vec<usize>,
    options: LayerOptions,
}

impl ShapefileLayer<File> {
    pub fn open(
        name: impl Into<String>,
        path: impl AsRef<Utf8Path>,
        options: LayerOptions,
    ) -> Result<Self, LayerError> {
        ShapefileLayer::new(name, Shapefile::open(path)?, options)
    }
}

impl<S: Read + Seek> ShapefileLayer<S> {
    pub fn new(
        name: impl Into<String>,
        shapefile: Shapefile<S>,
        options: LayerOptions,
    ) -> Result<Self, LayerError> {
        let mut layer = ShapefileLayer {
            name: name.into(),
            shapefile,
            item_indices: Vec::new(),
            options: LayerOptions::default(),
        };
        layer.set_items(&options.items)?;
        layer.options.max_features = options.max_features;
        layer.options.filter = options.filter;
        Ok(layer)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shapefile(&self) -> &Shapefile<S> {
        &self.shapefile
    }

    pub fn shapefile_mut(&mut self) -> &mut Shapefile<S> {
        &mut self.shapefile
    }

    pub fn items(&self) -> &[String] {
        &self.options.items
    }

    /// Resolve item names against the attribute table.
    pub fn set_items(&mut self, items: &[String]) -> Result<(), LayerError> {
        let indices = if items.is_empty() {
            Vec::new()
        } else {
            let table = self.shapefile.attributes().ok_or(LayerError::NoAttributes)?;
            items
                .iter()
                .map(|name| {
                    table
                        .field_index(name)
                        .ok_or_else(|| LayerError::UnknownItem { name: name.clone() })
                })
                .collect::<Result<Vec<_>, _>>()?
        };
        self.item_indices = indices;
        self.options.items = items.to_vec();
        Ok(())
    }

    pub fn set_max_features(&mut self, max: Option<usize>) {
        self.options.max_features = max;
    }

    pub fn set_filter(&mut self, filter: Option<AttributeFilter>) {
        self.options.filter = filter;
    }

    /// Layer extent: the shapefile's header bounds.
    pub fn extent(&self) -> Rect {
        self.shapefile.bounds()
    }

    /// Start a query; shapes come back from [`ShapefileLayer::next_shape`].
    pub fn which_shapes(&mut self, rect: Rect) -> Result<QueryStatus, LayerError> {
        let status = self.shapefile.which_shapes(rect)?;
        if let (QueryStatus::Selected, Some(max)) = (status, self.options.max_features) {
            if let Some(bits) = self.shapefile.status_mut() {
                trim_to_max_features(bits, max);
            }
        }
        Ok(status)
    }

    /// End the current query. The shapefile stays open for the next one.
    pub fn close(&mut self) {
        self.shapefile.clear_query();
    }

    /// Next selected shape passing the filter, skipping Null geometry.
    pub fn next_shape(&mut self) -> Result<Option<Shape>, LayerError> {
        while let Some(i) = self.shapefile.next_match() {
            let values = self.read_values(i)?;
            if let Some(filter) = &self.options.filter {
                if !filter(&values) {
                    continue;
                }
            }
            let mut shape = self.shapefile.handle_mut().read_shape_lossy(i)?;
            if shape.is_null() {
                debug!(layer = %self.name, record = i, "skipping null shape");
                continue;
            }
            shape.values = values;
            return Ok(Some(shape));
        }
        Ok(None)
    }

    /// Fetch one record by index, with its item values.
    pub fn get_shape(&mut self, record: usize) -> Result<Shape, LayerError> {
        let values = self.read_values(record)?;
        let mut shape = self.shapefile.handle_mut().read_shape_lossy(record)?;
        shape.values = values;
        Ok(shape)
    }

    fn read_values(&mut self, record: usize) -> Result<Vec<String>, LayerError> {
        if self.item_indices.is_empty() {
            return Ok(Vec::new());
        }
        let table = self
            .shapefile
            .attributes_mut()
            .ok_or(LayerError::NoAttributes)?;
        Ok(table.read_values(record, &self.item_indices)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::MemoryTable;
    use crate::shapefile::{Geometry, HostOrder, ShapeType, ShapefileHandle};
    use crate::types::Point;
    use std::io::Cursor;

    type MemLayer = ShapefileLayer<Cursor<Vec<u8>>>;

    /// Points at x = 0..n on the x axis, named "p0".."pN".
    fn point_layer(n: usize, options: LayerOptions) -> MemLayer {
        let mut h = ShapefileHandle::create_in_streams(
            Cursor::new(Vec::new()),
            Cursor::new(Vec::new()),
            ShapeType::Point,
            HostOrder::native(),
        )
        .unwrap();
        let mut table = MemoryTable::new(["NAME"]);
        for i in 0..n {
            h.write_point(Point::new(i as f64, 0.0)).unwrap();
            table = table.with_row([format!("p{i}")]);
        }
        let (shp, shx) = h.into_streams().unwrap();
        let shapefile = Shapefile::from_handle(
            ShapefileHandle::from_streams(shp, shx, HostOrder::native()).unwrap(),
        )
        .with_attributes(table);
        ShapefileLayer::new("points", shapefile, options).unwrap()
    }

    fn drain(layer: &mut MemLayer) -> Vec<usize> {
        std::iter::from_fn(|| layer.next_shape().unwrap())
            .filter_map(|s| s.index)
            .collect()
    }

    // ==================== max_features tests ====================

    #[test]
    fn trim_keeps_the_last_selected_bits() {
        let mut bits = StatusBits::all(6);
        bits.clear(4);
        trim_to_max_features(&mut bits, 2);
        assert_eq!(bits.iter_ones().collect::<Vec<_>>(), vec![3, 5]);
    }

    #[test]
    fn max_features_caps_the_selection() {
        let mut layer = point_layer(5, LayerOptions::default().with_max_features(2));
        layer.which_shapes(Rect::new(-1.0, -1.0, 10.0, 1.0)).unwrap();
        assert_eq!(drain(&mut layer), vec![3, 4]);
    }

    #[test]
    fn filter_runs_after_the_cap_without_backfill() {
        let options = LayerOptions::default()
            .with_items(["NAME"])
            .with_max_features(2)
            .with_filter(|values: &[String]| values[0] != "p4");
        let mut layer = point_layer(5, options);
        layer.which_shapes(Rect::new(-1.0, -1.0, 10.0, 1.0)).unwrap();
        assert_eq!(drain(&mut layer), vec![3]);
    }

    // ==================== iteration tests ====================

    #[test]
    fn next_shape_attaches_item_values() {
        let mut layer = point_layer(3, LayerOptions::default().with_items(["name"]));
        layer.which_shapes(Rect::new(0.5, -1.0, 1.5, 1.0)).unwrap();
        let shape = layer.next_shape().unwrap().unwrap();
        assert_eq!(shape.index, Some(1));
        assert_eq!(shape.values, vec!["p1".to_string()]);
        assert!(layer.next_shape().unwrap().is_none());
    }

    #[test]
    fn close_ends_the_query() {
        let mut layer = point_layer(3, LayerOptions::default());
        layer.which_shapes(Rect::new(-1.0, -1.0, 10.0, 1.0)).unwrap();
        assert!(layer.next_shape().unwrap().is_some());
        layer.close();
        assert!(layer.next_shape().unwrap().is_none());
        assert_eq!(layer.shapefile().status_bounds(), None);
    }

    #[test]
    fn get_shape_reads_any_record() {
        let mut layer = point_layer(3, LayerOptions::default().with_items(["NAME"]));
        let shape = layer.get_shape(2).unwrap();
        assert_eq!(shape.geometry, Geometry::Point(Point::new(2.0, 0.0)));
        assert_eq!(shape.values, vec!["p2".to_string()]);
        assert!(layer.get_shape(3).is_err());
    }

    #[test]
    fn unknown_items_are_rejected() {
        let mut layer = point_layer(1, LayerOptions::default());
        let err = layer.set_items(&["MISSING".to_string()]).err();
        assert!(matches!(err, Some(LayerError::UnknownItem { .. })));
    }

    #[test]
    fn extent_is_the_file_bounds() {
        let layer = point_layer(3, LayerOptions::default());
        assert_eq!(layer.extent(), Rect::new(0.0, 0.0, 2.0, 0.0));
    }
}
