//! CSV persistence for catalogs and crossmatch assignments.

use std::io::{Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::assign::{Match, MatchAssignment};
use crate::catalog::Catalog;
use crate::error::{ParseError, Result};

/// Name of the separation column in assignment files.
pub const SEPARATION_COLUMN: &str = "separation_arcsec";

/// Default number of decimals written for separations.
pub const DEFAULT_PRECISION: usize = 7;

pub fn read_catalog(path: &Path) -> Result<Catalog> {
    let file = std::fs::File::open(path)?;
    read_catalog_from(file)
}

pub fn read_catalog_from<R: Read>(reader: R) -> Result<Catalog> {
    let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
    let columns: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    let mut catalog = Catalog::new(columns);
    for record in rdr.records() {
        let record = record?;
        catalog.push_row(record.iter().map(str::to_string).collect())?;
    }
    Ok(catalog)
}

pub fn write_catalog(path: &Path, catalog: &Catalog) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_catalog_to(file, catalog)
}

pub fn write_catalog_to<W: Write>(writer: W, catalog: &Catalog) -> Result<()> {
    let mut w = csv::Writer::from_writer(writer);
    w.write_record(catalog.columns())?;
    for row in catalog.rows() {
        w.write_record(row.fields())?;
    }
    w.flush()?;
    Ok(())
}

/// Labels used to name the row-index columns of an assignment file,
/// e.g. `optical` and `xray` give `optical_row` and `xray_row`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentColumns {
    pub left_label: String,
    pub right_label: String,
}

impl Default for AssignmentColumns {
    fn default() -> Self {
        Self::labeled("left", "right")
    }
}

impl AssignmentColumns {
    pub fn labeled(left: &str, right: &str) -> Self {
        Self {
            left_label: left.to_string(),
            right_label: right.to_string(),
        }
    }

    pub fn left_row(&self) -> String {
        format!("{}_row", self.left_label)
    }

    pub fn right_row(&self) -> String {
        format!("{}_row", self.right_label)
    }
}

/// Extra per-match columns: both sides' coordinates and pass-through fields
/// copied from the right catalog (e.g. an X-ray `obs_id`).
pub struct AssignmentDetail<'a> {
    pub left: &'a Catalog,
    pub right: &'a Catalog,
    pub ra_column: &'a str,
    pub dec_column: &'a str,
    pub carry: &'a [String],
}

pub fn write_assignment(
    path: &Path,
    assignment: &MatchAssignment,
    columns: &AssignmentColumns,
    precision: usize,
    detail: Option<&AssignmentDetail<'_>>,
) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_assignment_to(file, assignment, columns, precision, detail)
}

/// Write an assignment as CSV with separations at fixed `precision`.
pub fn write_assignment_to<W: Write>(
    writer: W,
    assignment: &MatchAssignment,
    columns: &AssignmentColumns,
    precision: usize,
    detail: Option<&AssignmentDetail<'_>>,
) -> Result<()> {
    let mut header = vec![columns.left_row(), columns.right_row(), SEPARATION_COLUMN.to_string()];

    // Column positions in the source catalogs for the detail fields.
    let mut left_cols = Vec::new();
    let mut right_cols = Vec::new();
    if let Some(d) = detail {
        left_cols = d.left.require_columns(&columns.left_label, &[d.ra_column, d.dec_column])?;
        let mut wanted = vec![d.ra_column, d.dec_column];
        wanted.extend(d.carry.iter().map(String::as_str));
        right_cols = d.right.require_columns(&columns.right_label, &wanted)?;

        for label in [&columns.left_label, &columns.right_label] {
            header.push(format!("{}_{label}", d.ra_column));
            header.push(format!("{}_{label}", d.dec_column));
        }
        header.extend(d.carry.iter().cloned());
    }

    let mut w = csv::Writer::from_writer(writer);
    w.write_record(&header)?;
    for m in assignment {
        let mut record = vec![
            m.left_row.to_string(),
            m.right_row.to_string(),
            format!("{:.*}", precision, m.separation_arcsec),
        ];
        if let Some(d) = detail {
            let left = d.left.row(m.left_row).map(|r| r.fields());
            let right = d.right.row(m.right_row).map(|r| r.fields());
            for &c in &left_cols {
                record.push(left.map(|f| f[c].clone()).unwrap_or_default());
            }
            for &c in &right_cols {
                record.push(right.map(|f| f[c].clone()).unwrap_or_default());
            }
        }
        w.write_record(&record)?;
    }
    w.flush()?;
    Ok(())
}

pub fn read_assignment(path: &Path, columns: &AssignmentColumns) -> Result<MatchAssignment> {
    let file = std::fs::File::open(path)?;
    read_assignment_from(file, columns)
}

/// Load an assignment file. Uniqueness is not enforced here; callers that
/// care should inspect [`MatchAssignment::duplicates`].
pub fn read_assignment_from<R: Read>(
    reader: R,
    columns: &AssignmentColumns,
) -> Result<MatchAssignment> {
    let table = read_catalog_from(reader)?;
    let left_name = columns.left_row();
    let right_name = columns.right_row();
    let cols = table.require_columns(
        "assignment",
        &[left_name.as_str(), right_name.as_str(), SEPARATION_COLUMN],
    )?;

    let parse_row = |s: &str| -> std::result::Result<usize, ParseError> {
        let t = s.trim();
        // Index columns written by float-formatting tools come out as "12.0".
        t.parse::<usize>().or_else(|_| match t.parse::<f64>() {
            Ok(v) if v >= 0.0 && v.fract() == 0.0 && v < usize::MAX as f64 => Ok(v as usize),
            _ => Err(ParseError::NotAnInteger(t.to_string())),
        })
    };

    let mut matches = Vec::with_capacity(table.len());
    for row in table.rows() {
        let f = row.fields();
        let separation = f[cols[2]].trim();
        matches.push(Match {
            left_row: parse_row(&f[cols[0]])?,
            right_row: parse_row(&f[cols[1]])?,
            separation_arcsec: separation
                .parse()
                .map_err(|_| ParseError::NotANumber(separation.to_string()))?,
        });
    }
    Ok(MatchAssignment::from_matches(matches))
}
