//! Configuration, layers and canvas working together.

use std::io::Cursor;

use glam::DVec2;
use proptest::prelude::*;
use shapemap::render::RecordingRenderer;
use shapemap::shapefile::HostOrder;
use shapemap::spatial::QueryStatus;
use shapemap::symbol::VectorSymbol;
use shapemap::symbol::style::target_size;
use shapemap::{
    Canvas, Color, Config, Geometry, LayerOptions, Line, Point, Rect, ShapeType, Shapefile,
    ShapefileHandle, ShapefileLayer, StyleDef, Symbol, compute_symbol_style,
};

type MemLayer = ShapefileLayer<Cursor<Vec<u8>>>;

const MAP: &str = r#"
SYMBOLSET
  SYMBOL NAME "dot" TYPE ELLIPSE FILLED TRUE POINTS 1 1 END END
END

# sites
STYLE SYMBOL "dot" COLOR 255 0 0 SIZE 6 END
# roads
STYLE COLOR 0 0 255 WIDTH 2 END
# parcels
STYLE COLOR 0 255 0 OUTLINECOLOR 0 0 0 END
"#;

fn memory_layer(name: &str, t: ShapeType, geometries: &[Geometry]) -> MemLayer {
    let host = HostOrder::native();
    let mut h = ShapefileHandle::create_in_streams(Cursor::new(Vec::new()), Cursor::new(Vec::new()), t, host).unwrap();
    for g in geometries {
        h.write_shape(g).unwrap();
    }
    let (shp, shx) = h.into_streams().unwrap();
    let handle = ShapefileHandle::from_streams(Cursor::new(shp.into_inner()), Cursor::new(shx.into_inner()), host).unwrap();
    ShapefileLayer::new(name, Shapefile::from_handle(handle), LayerOptions::default()).unwrap()
}

/// Query `layer` over the canvas and draw every shape with `style`.
fn draw_layer(canvas: &mut Canvas<RecordingRenderer>, config: &Config, layer: &mut MemLayer, style: &StyleDef) {
    if layer.which_shapes(canvas.extent()).unwrap() == QueryStatus::Done {
        return;
    }
    while let Some(shape) = layer.next_shape().unwrap() {
        match &shape.geometry {
            Geometry::Point(p) => canvas.draw_marker_symbol(&config.symbols, p.xy(), style, 1.0).unwrap(),
            Geometry::Line(lines) => canvas.draw_line_symbol(&config.symbols, lines, style, 1.0).unwrap(),
            Geometry::Polygon(rings) => canvas.draw_shade_symbol(&config.symbols, rings, style, 1.0).unwrap(),
            _ => {}
        }
    }
}

// ==================== map drawing tests ====================

#[test]
fn draws_a_small_map() {
    let config = Config::parse(MAP).unwrap();
    let mut canvas = Canvas::new(RecordingRenderer::new(), 100, 100).unwrap();

    let mut sites = memory_layer(
        "sites",
        ShapeType::Point,
        &[
            Geometry::Point(Point::new(10.0, 20.0)),
            Geometry::Point(Point::new(30.0, 40.0)),
            Geometry::Point(Point::new(500.0, 500.0)),
        ],
    );
    let mut roads = memory_layer(
        "roads",
        ShapeType::Arc,
        &[Geometry::Line(vec![Line::from_xy(&[(0.0, 0.0), (50.0, 50.0), (90.0, 10.0)])])],
    );
    let mut parcels = memory_layer(
        "parcels",
        ShapeType::Polygon,
        &[Geometry::Polygon(vec![Line::from_xy(&[
            (60.0, 60.0),
            (60.0, 80.0),
            (80.0, 80.0),
            (80.0, 60.0),
            (60.0, 60.0),
        ])])],
    );

    draw_layer(&mut canvas, &config, &mut sites, &config.styles[0]);
    draw_layer(&mut canvas, &config, &mut roads, &config.styles[1]);
    draw_layer(&mut canvas, &config, &mut parcels, &config.styles[2]);

    insta::assert_snapshot!(canvas.image().calls.join("\n"), @r"
    ellipse dot at 10,20 scale=6 rotation=0.00 fill=#ff0000
    ellipse dot at 30,40 scale=6 rotation=0.00 fill=#ff0000
    line parts=1 points=3 color=#0000ff width=2
    polygon rings=1 points=5 fill=#00ff00
    line parts=1 points=5 color=#000000 width=1
    ");
}

#[test]
fn cached_markers_reuse_one_tile() {
    let config = Config::parse(MAP).unwrap();
    let mut canvas = Canvas::new(RecordingRenderer::new().with_image_cache(), 100, 100).unwrap();
    let style = &config.styles[0];

    for x in [10.0, 20.0, 30.0] {
        canvas.draw_marker_symbol(&config.symbols, DVec2::new(x, 10.0), style, 1.0).unwrap();
    }
    assert_eq!(canvas.renderer().images_created(), 2);
    assert_eq!(canvas.tile_cache().len(), 1);
    assert_eq!(canvas.image().calls, vec!["tile #2 at 10,10", "tile #2 at 20,10", "tile #2 at 30,10"]);

    let blue = style.clone().with_color(Color::rgb(0, 0, 255));
    canvas.draw_marker_symbol(&config.symbols, DVec2::new(40.0, 10.0), &blue, 1.0).unwrap();
    assert_eq!(canvas.renderer().images_created(), 3);
    assert_eq!(canvas.tile_cache().len(), 2);
}

#[test]
fn unknown_symbol_index_is_an_error() {
    let config = Config::parse(MAP).unwrap();
    let mut canvas = Canvas::new(RecordingRenderer::new(), 10, 10).unwrap();
    let style = StyleDef::default().with_symbol(42).with_color(Color::rgb(1, 2, 3));
    let err = canvas
        .draw_marker_symbol(&config.symbols, DVec2::ZERO, &style, 1.0)
        .unwrap_err();
    assert!(matches!(err, shapemap::RenderError::UnknownSymbol { index: 42 }));
}

#[test]
fn extent_covers_the_canvas() {
    let canvas = Canvas::new(RecordingRenderer::new(), 64, 32).unwrap();
    assert_eq!(canvas.extent(), Rect::new(0.0, 0.0, 64.0, 32.0));
}

// ==================== style property tests ====================

fn cross() -> Symbol {
    VectorSymbol::from_pairs("cross", &[(0.0, 0.0), (10.0, 10.0)], false).into()
}

proptest! {
    #[test]
    fn target_size_stays_within_bounds(
        size in 0.0f64..400.0,
        min in 0.0f64..50.0,
        extra in 0.0f64..100.0,
        scale_factor in 0.1f64..4.0,
    ) {
        let style = StyleDef {
            size: Some(size),
            min_size: min,
            max_size: min + extra,
            ..StyleDef::default()
        };
        let t = target_size(&style, &cross(), scale_factor);
        prop_assert!(t >= min && t <= min + extra);
    }

    #[test]
    fn outline_width_is_clamped_or_zero(
        width in 0.0f64..100.0,
        scale_factor in 0.1f64..4.0,
        with_outline in any::<bool>(),
    ) {
        let mut style = StyleDef::default().with_width(width).with_color(Color::rgb(9, 9, 9));
        if with_outline {
            style = style.with_outline_color(Color::rgb(0, 0, 0));
        }
        let symbol: Symbol = shapemap::symbol::EllipseSymbol {
            name: "e".to_string(),
            width: 4.0,
            height: 4.0,
            filled: true,
        }
        .into();
        let s = compute_symbol_style(&style, &symbol, scale_factor);
        if with_outline {
            prop_assert!(s.outline_width >= style.min_width && s.outline_width <= style.max_width);
        } else {
            prop_assert_eq!(s.outline_width, 0.0);
        }
        prop_assert_eq!(s, compute_symbol_style(&style, &symbol, scale_factor));
    }
}
