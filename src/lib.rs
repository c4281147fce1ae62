//! Sky-coordinate crossmatch library.
//!
//! Skyjoin pairs rows of two independently sourced astronomical catalogs
//! (e.g. optical transients and X-ray detections) by angular separation,
//! producing an auditable 1:1 assignment between catalog rows. Catalogs can
//! be deduplicated by row completeness first, and coordinates normalized
//! from sexagesimal notation.

pub mod assign;
pub mod catalog;
pub mod cutout;
pub mod dedup;
pub mod error;
pub mod extract;
pub mod geom;
pub mod kdtree;
pub mod matcher;
pub mod normalize;
pub mod pipeline;
pub mod store;

pub use error::{Error, Result};
pub use pipeline::{CrossmatchConfig, CrossmatchOutcome, crossmatch};
