//! Coordinate normalization: turn whatever a catalog ships (sexagesimal
//! strings, decimal degrees under some other name) into `ra_deg`/`dec_deg`
//! decimal-degree columns.

use serde::Serialize;
use tracing::{info, warn};

use crate::catalog::Catalog;
use crate::error::SchemaError;
use crate::geom::{CoordinateFormat, SkyPosition};

pub const RA_DEG: &str = "ra_deg";
pub const DEC_DEG: &str = "dec_deg";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct NormalizeSummary {
    pub total: usize,
    pub kept: usize,
    pub dropped: usize,
}

/// Write decimal-degree `ra_deg`/`dec_deg` columns derived from
/// `ra_column`/`dec_column`, dropping rows that do not parse.
///
/// Existing `ra_deg`/`dec_deg` columns are overwritten in place; otherwise
/// they are appended. Surviving rows keep their relative order.
pub fn normalize_coordinates(
    catalog: &Catalog,
    ra_column: &str,
    dec_column: &str,
    format: CoordinateFormat,
) -> Result<(Catalog, NormalizeSummary), SchemaError> {
    let points = catalog.sky_points("input", ra_column, dec_column, format)?;

    let rows: Vec<usize> = points.positions.iter().map(|(row, _)| *row).collect();
    let mut out = catalog.select(&rows);
    let (ra, dec): (Vec<String>, Vec<String>) = points
        .positions
        .iter()
        .map(|(_, p): &(usize, SkyPosition)| (p.ra_deg().to_string(), p.dec_deg().to_string()))
        .unzip();
    out.set_column(RA_DEG, ra)?;
    out.set_column(DEC_DEG, dec)?;

    let summary = NormalizeSummary {
        total: catalog.len(),
        kept: out.len(),
        dropped: points.rejected.len(),
    };
    if let Some(first) = points.rejected.first() {
        warn!(
            dropped = summary.dropped,
            first_row = first.row,
            reason = %first.error,
            "rows with unparsable coordinates removed"
        );
    }
    info!(total = summary.total, kept = summary.kept, "normalized coordinates");
    Ok((out, summary))
}
