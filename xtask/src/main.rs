use camino::{Utf8Path, Utf8PathBuf};
use rayon::prelude::*;
use shapemap::shapefile::OpenMode;
use shapemap::spatial::QueryStatus;
use shapemap::{Rect, Shapefile, ShapefileError, ShapefileHandle};
use std::fs;

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        usage();
    }

    let result = match (args[1].as_str(), &args[2..]) {
        ("info", [path]) => info(Utf8Path::new(path)),
        ("query", [path, minx, miny, maxx, maxy]) => match parse_rect([minx, miny, maxx, maxy]) {
            Some(rect) => query(Utf8Path::new(path), rect),
            None => {
                eprintln!("query bounds must be numbers");
                std::process::exit(1);
            }
        },
        ("scan", [dir]) => scan(Utf8Path::new(dir)),
        _ => usage(),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn usage() -> ! {
    eprintln!("Usage: cargo xtask <command>");
    eprintln!("Commands:");
    eprintln!("  info <file.shp>                       Print header, bounds and record count");
    eprintln!("  query <file.shp> minx miny maxx maxy  Print ids of records overlapping a box");
    eprintln!("  scan <dir>                            Check every shapefile in a directory");
    std::process::exit(1);
}

fn parse_rect(values: [&String; 4]) -> Option<Rect> {
    let [minx, miny, maxx, maxy] = values.map(|v| v.parse::<f64>().ok());
    Some(Rect::new(minx?, miny?, maxx?, maxy?))
}

fn format_rect(r: &Rect) -> String {
    format!("{} {} {} {}", r.minx, r.miny, r.maxx, r.maxy)
}

fn info(path: &Utf8Path) -> Result<(), ShapefileError> {
    let handle = ShapefileHandle::open(path, OpenMode::Read)?;
    let header = handle.header();
    println!("file:        {}", handle.path());
    println!("shape type:  {}", handle.shape_type());
    println!("records:     {}", handle.num_records());
    println!("file length: {} bytes", header.file_length);
    println!("bounds:      {}", format_rect(&header.bounds));
    if handle.shape_type().has_z() {
        println!("z range:     {} {}", header.z_range.0, header.z_range.1);
    }
    if handle.shape_type().has_m() {
        println!("m range:     {} {}", header.m_range.0, header.m_range.1);
    }
    Ok(())
}

fn query(path: &Utf8Path, rect: Rect) -> Result<(), ShapefileError> {
    let mut shapefile = Shapefile::open(path)?;
    if shapefile.which_shapes(rect)? == QueryStatus::Done {
        eprintln!("no records overlap {}", format_rect(&rect));
        return Ok(());
    }
    let mut count = 0;
    while let Some(id) = shapefile.next_match() {
        println!("{id}");
        count += 1;
    }
    eprintln!("{count} of {} records", shapefile.num_shapes());
    Ok(())
}

/// Open a shapefile and decode every record, returning the record count.
fn check(path: &Utf8Path) -> Result<usize, ShapefileError> {
    let mut handle = ShapefileHandle::open(path, OpenMode::Read)?;
    let count = handle.num_records();
    for i in 0..count {
        handle.read_shape(i)?;
    }
    Ok(count)
}

fn scan(dir: &Utf8Path) -> Result<(), ShapefileError> {
    let entries = fs::read_dir(dir).map_err(|source| ShapefileError::Io {
        path: dir.to_owned(),
        source,
    })?;
    let mut paths: Vec<Utf8PathBuf> = entries
        .filter_map(|e| e.ok())
        .filter_map(|e| Utf8PathBuf::from_path_buf(e.path()).ok())
        .filter(|p| p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("shp")))
        .collect();
    paths.sort();

    let results: Vec<(Utf8PathBuf, Result<usize, ShapefileError>)> = paths
        .into_par_iter()
        .map(|path| {
            let result = check(&path);
            (path, result)
        })
        .collect();

    let mut failed = 0;
    for (path, result) in &results {
        match result {
            Ok(count) => println!("ok    {path} ({count} records)"),
            Err(e) => {
                failed += 1;
                println!("FAIL  {path}: {e}");
            }
        }
    }
    eprintln!("{} files, {failed} failed", results.len());
    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}
