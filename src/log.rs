//! Logging.
//!
//! `debug!` and `warn!` are the `tracing` macros when the `tracing` feature
//! is on (the default) and expand to nothing without it.
//!
//! The report functions cover data the crate skips or degrades instead of
//! failing: records read as Null, tiles left out of a query, shapefiles
//! without attributes. Each carries the path and record or tile that a
//! caller needs to find the bad data.

use std::fmt::Display;

use camino::Utf8Path;

#[cfg(feature = "tracing")]
pub(crate) use tracing::{debug, warn};

#[cfg(not(feature = "tracing"))]
macro_rules! debug {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
macro_rules! warn {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
pub(crate) use {debug, warn};

/// A record that failed validation and was returned as a Null shape.
#[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
pub(crate) fn corrupt_record(path: &Utf8Path, index: usize, error: &dyn Display) {
    warn!(%path, index, %error, "corrupt record read as null shape");
}

/// A tile left out of a tiled layer query. `error` is `None` when no
/// candidate path exists.
#[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
pub(crate) fn skipped_tile(layer: &str, path: &Utf8Path, error: Option<&dyn Display>) {
    match error {
        Some(error) => {
            warn!(layer, %path, %error, "skipping unreadable tile");
        }
        None => {
            warn!(layer, %path, "skipping missing tile");
        }
    }
}

/// A shapefile opened without a `.dbf`; item lookups on it will fail.
#[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
pub(crate) fn missing_attributes(path: &Utf8Path) {
    debug!(%path, "shapefile has no attribute file");
}
