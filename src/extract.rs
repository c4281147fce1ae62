//! Pulling full records back out of the catalogs once an assignment exists,
//! and sanity checks on catalogs and assignments.

use serde::Serialize;
use tracing::{info, warn};

use crate::assign::{Match, MatchAssignment};
use crate::catalog::{Catalog, is_missing};
use crate::error::SchemaError;
use crate::geom::{CoordinateFormat, parse_coordinate};
use crate::store::SEPARATION_COLUMN;

/// Matched records from both sides, aligned row by row.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub left: Catalog,
    pub right: Catalog,
    /// The assignment entries that survived bounds checking, aligned with
    /// `left` and `right`.
    pub matches: Vec<Match>,
    /// Entries dropped because an index was past the end of its catalog.
    pub dropped: usize,
}

impl Extraction {
    /// Left and right columns side by side, plus the separation.
    ///
    /// Right columns whose names clash with a left column are prefixed with
    /// `right_`.
    pub fn combined(&self) -> Result<Catalog, SchemaError> {
        let mut columns: Vec<String> = self.left.columns().to_vec();
        for c in self.right.columns() {
            if self.left.column_index(c).is_some() {
                columns.push(format!("right_{c}"));
            } else {
                columns.push(c.clone());
            }
        }
        columns.push(SEPARATION_COLUMN.to_string());

        let rows = self
            .left
            .rows()
            .zip(self.right.rows())
            .zip(&self.matches)
            .map(|((l, r), m)| {
                let mut fields = l.fields().to_vec();
                fields.extend_from_slice(r.fields());
                fields.push(format!("{:.7}", m.separation_arcsec));
                fields
            })
            .collect();
        Catalog::from_rows(columns, rows)
    }
}

/// Re-extract matched rows from catalogs that may have changed length since
/// matching.
///
/// Out-of-bounds entries are dropped and counted rather than failing the
/// run. Duplicate indices are reported as warnings but extracted as-is.
pub fn extract_matched(
    assignment: &MatchAssignment,
    left: &Catalog,
    right: &Catalog,
) -> Extraction {
    assignment.duplicates().log();

    let (valid, invalid): (Vec<Match>, Vec<Match>) = assignment
        .iter()
        .copied()
        .partition(|m| m.left_row < left.len() && m.right_row < right.len());

    if !invalid.is_empty() {
        let bad_left: Vec<usize> = invalid
            .iter()
            .filter(|m| m.left_row >= left.len())
            .map(|m| m.left_row)
            .take(5)
            .collect();
        let bad_right: Vec<usize> = invalid
            .iter()
            .filter(|m| m.right_row >= right.len())
            .map(|m| m.right_row)
            .take(5)
            .collect();
        warn!(
            dropped = invalid.len(),
            left_len = left.len(),
            right_len = right.len(),
            ?bad_left,
            ?bad_right,
            "dropping assignment entries with out-of-bounds rows"
        );
    }

    let left_rows: Vec<usize> = valid.iter().map(|m| m.left_row).collect();
    let right_rows: Vec<usize> = valid.iter().map(|m| m.right_row).collect();
    let extraction = Extraction {
        left: left.select(&left_rows),
        right: right.select(&right_rows),
        matches: valid,
        dropped: invalid.len(),
    };
    info!(
        extracted = extraction.matches.len(),
        dropped = extraction.dropped,
        "extracted matched rows"
    );
    extraction
}

/// Copy `column` from `source` onto `target` as `as_name`, row for row.
///
/// Used to tag extracted optical rows with their X-ray observation id.
pub fn attach_column(
    target: &mut Catalog,
    source: &Catalog,
    column: &str,
    as_name: &str,
) -> Result<(), SchemaError> {
    let col = source.require_columns("source", &[column])?[0];
    if source.len() != target.len() {
        return Err(SchemaError::LengthMismatch {
            left: target.len(),
            right: source.len(),
        });
    }
    let values = source.rows().map(|r| r.fields()[col].clone()).collect();
    target.set_column(as_name, values)
}

/// Coordinate health of one catalog.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct CoordinateReport {
    pub total: usize,
    pub missing_ra: usize,
    pub missing_dec: usize,
    /// Rows that cannot be matched: missing either coordinate, or present
    /// but unparsable or out of range.
    pub invalid: usize,
    /// First few invalid rows, for inspection.
    pub sample: Vec<usize>,
}

pub fn validate_coordinates(
    catalog: &Catalog,
    ra_column: &str,
    dec_column: &str,
    format: CoordinateFormat,
) -> Result<CoordinateReport, SchemaError> {
    let cols = catalog.require_columns("catalog", &[ra_column, dec_column])?;
    let mut report = CoordinateReport {
        total: catalog.len(),
        ..CoordinateReport::default()
    };
    for row in catalog.rows() {
        let ra = &row.fields()[cols[0]];
        let dec = &row.fields()[cols[1]];
        let ra_missing = is_missing(ra);
        let dec_missing = is_missing(dec);
        report.missing_ra += usize::from(ra_missing);
        report.missing_dec += usize::from(dec_missing);
        if ra_missing || dec_missing || parse_coordinate(ra, dec, format).is_err() {
            report.invalid += 1;
            if report.sample.len() < 10 {
                report.sample.push(row.index());
            }
        }
    }
    Ok(report)
}

/// Bounds check of an assignment against two catalogs.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct IndexReport {
    pub entries: usize,
    pub valid_left: usize,
    pub valid_right: usize,
    pub duplicate_left: usize,
    pub duplicate_right: usize,
}

impl IndexReport {
    pub fn passed(&self) -> bool {
        self.valid_left == self.entries
            && self.valid_right == self.entries
            && self.duplicate_left == 0
            && self.duplicate_right == 0
    }
}

pub fn validate_indices(
    assignment: &MatchAssignment,
    left: &Catalog,
    right: &Catalog,
) -> IndexReport {
    let dups = assignment.duplicates();
    IndexReport {
        entries: assignment.len(),
        valid_left: assignment.iter().filter(|m| m.left_row < left.len()).count(),
        valid_right: assignment.iter().filter(|m| m.right_row < right.len()).count(),
        duplicate_left: dups.left_extra,
        duplicate_right: dups.right_extra,
    }
}
