//! In-memory catalog tables.
//!
//! A catalog is an ordered list of named columns and rows of text fields.
//! Only the coordinate columns are interpreted; everything else passes
//! through the crossmatch untouched.

use tracing::warn;

use crate::error::{ParseError, SchemaError};
use crate::geom::{CoordinateFormat, SkyPosition, parse_coordinate};

/// Markers read as absent, compared case-insensitively. Matches pandas'
/// default NA strings.
const MISSING_MARKERS: &[&str] = &[
    "nan", "-nan", "null", "none", "na", "n/a", "<na>", "#n/a", "#n/a n/a", "#na", "1.#ind",
    "-1.#ind", "1.#qnan", "-1.#qnan",
];

/// Whether a field counts as absent: blank, or one of the NA markers
/// (`nan`, `null`, `none`, `NA`, `N/A`, `<NA>`, ...).
pub fn is_missing(field: &str) -> bool {
    let f = field.trim();
    f.is_empty() || MISSING_MARKERS.iter().any(|m| f.eq_ignore_ascii_case(m))
}

/// A row-oriented table with named columns.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Catalog {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Catalog {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a catalog, checking every row has one field per column.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self, SchemaError> {
        let mut catalog = Self::new(columns);
        for row in rows {
            catalog.push_row(row)?;
        }
        Ok(catalog)
    }

    pub fn push_row(&mut self, fields: Vec<String>) -> Result<(), SchemaError> {
        if fields.len() != self.columns.len() {
            return Err(SchemaError::RaggedRow {
                row: self.rows.len(),
                expected: self.columns.len(),
                found: fields.len(),
            });
        }
        self.rows.push(fields);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Resolve column positions, failing with every absent name at once.
    pub fn require_columns(&self, table: &str, names: &[&str]) -> Result<Vec<usize>, SchemaError> {
        let mut found = Vec::with_capacity(names.len());
        let mut missing = Vec::new();
        for name in names {
            match self.column_index(name) {
                Some(i) => found.push(i),
                None => missing.push(name.to_string()),
            }
        }
        if missing.is_empty() {
            Ok(found)
        } else {
            Err(SchemaError::MissingColumns {
                table: table.to_string(),
                missing,
            })
        }
    }

    pub fn row(&self, index: usize) -> Option<CatalogRow<'_>> {
        self.rows.get(index).map(|fields| CatalogRow {
            index,
            columns: &self.columns,
            fields,
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = CatalogRow<'_>> {
        self.rows.iter().enumerate().map(|(index, fields)| CatalogRow {
            index,
            columns: &self.columns,
            fields,
        })
    }

    /// New catalog with the same schema holding the given rows, in the given
    /// order. Indices past the end are skipped.
    pub fn select(&self, indices: &[usize]) -> Catalog {
        Catalog {
            columns: self.columns.clone(),
            rows: indices
                .iter()
                .filter_map(|&i| self.rows.get(i).cloned())
                .collect(),
        }
    }

    /// Set a column's values, appending the column if it does not exist.
    pub fn set_column(&mut self, name: &str, values: Vec<String>) -> Result<(), SchemaError> {
        if values.len() != self.rows.len() {
            return Err(SchemaError::LengthMismatch {
                left: self.rows.len(),
                right: values.len(),
            });
        }
        match self.column_index(name) {
            Some(col) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[col] = value;
                }
            }
            None => {
                self.columns.push(name.to_string());
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
        Ok(())
    }

    /// Extract validated sky positions from the coordinate columns.
    ///
    /// Absent columns are fatal. Rows whose coordinates are missing or
    /// invalid are reported in [`SkyPoints::rejected`] and left out.
    pub fn sky_points(
        &self,
        table: &str,
        ra_column: &str,
        dec_column: &str,
        format: CoordinateFormat,
    ) -> Result<SkyPoints, SchemaError> {
        let cols = self.require_columns(table, &[ra_column, dec_column])?;
        let (ra_col, dec_col) = (cols[0], cols[1]);

        let mut points = SkyPoints::default();
        for (row, fields) in self.rows.iter().enumerate() {
            let (ra, dec) = (&fields[ra_col], &fields[dec_col]);
            let parsed = if is_missing(ra) || is_missing(dec) {
                Err(ParseError::Missing)
            } else {
                parse_coordinate(ra, dec, format)
            };
            match parsed {
                Ok(position) => points.positions.push((row, position)),
                Err(error) => points.rejected.push(RejectedRow { row, error }),
            }
        }

        if !points.rejected.is_empty() {
            warn!(
                table,
                rejected = points.rejected.len(),
                total = self.len(),
                "excluding rows with invalid coordinates"
            );
        }
        Ok(points)
    }
}

/// Borrowed view of one catalog row.
#[derive(Debug, Clone, Copy)]
pub struct CatalogRow<'a> {
    index: usize,
    columns: &'a [String],
    fields: &'a [String],
}

impl<'a> CatalogRow<'a> {
    /// Position of this row in its source catalog.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn get(&self, column: &str) -> Option<&'a str> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| self.fields[i].as_str())
    }

    pub fn fields(&self) -> &'a [String] {
        self.fields
    }

    /// Number of non-missing fields.
    pub fn completeness(&self) -> usize {
        self.fields.iter().filter(|f| !is_missing(f)).count()
    }
}

/// A coordinate row that could not enter the match.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRow {
    pub row: usize,
    pub error: ParseError,
}

/// Valid positions keyed by catalog row, plus the rows that were excluded.
#[derive(Debug, Clone, Default)]
pub struct SkyPoints {
    pub positions: Vec<(usize, SkyPosition)>,
    pub rejected: Vec<RejectedRow>,
}

impl SkyPoints {
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

#[cfg(test)]
pub(crate) fn table(columns: &[&str], rows: &[&[&str]]) -> Catalog {
    Catalog::from_rows(
        columns.iter().map(|c| c.to_string()).collect(),
        rows.iter()
            .map(|r| r.iter().map(|f| f.to_string()).collect())
            .collect(),
    )
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_markers() {
        for f in ["", "  ", "NaN", "nan", "NULL", "None", "NA", "N/A", "n/a", "<NA>", "#N/A"] {
            assert!(is_missing(f), "{f:?}");
        }
        for f in ["0", "0.0", "-", "nano", "NAME"] {
            assert!(!is_missing(f), "{f:?}");
        }
    }

    #[test]
    fn ragged_rows_rejected() {
        let err = Catalog::from_rows(
            vec!["a".into(), "b".into()],
            vec![vec!["1".into(), "2".into()], vec!["3".into()]],
        )
        .unwrap_err();
        assert_eq!(
            err,
            SchemaError::RaggedRow {
                row: 1,
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn require_columns_lists_all_missing() {
        let cat = table(&["name", "ra"], &[]);
        let err = cat.require_columns("optical", &["ra_deg", "dec_deg", "name"]).unwrap_err();
        assert_eq!(
            err,
            SchemaError::MissingColumns {
                table: "optical".into(),
                missing: vec!["ra_deg".into(), "dec_deg".into()],
            }
        );
    }

    #[test]
    fn sky_points_excludes_and_counts_bad_rows() {
        let cat = table(
            &["name", "ra_deg", "dec_deg"],
            &[
                &["a", "10.0", "20.0"],
                &["b", "", "20.0"],
                &["c", "370.0", "0.0"],
                &["d", "abc", "1.0"],
                &["e", "11.0", "-89.5"],
            ],
        );
        let points = cat
            .sky_points("optical", "ra_deg", "dec_deg", CoordinateFormat::Degrees)
            .unwrap();
        let rows: Vec<usize> = points.positions.iter().map(|(r, _)| *r).collect();
        assert_eq!(rows, vec![0, 4]);
        let rejected: Vec<usize> = points.rejected.iter().map(|r| r.row).collect();
        assert_eq!(rejected, vec![1, 2, 3]);
        assert_eq!(points.rejected[0].error, ParseError::Missing);
    }

    #[test]
    fn sky_points_requires_columns() {
        let cat = table(&["name", "RA"], &[&["a", "1"]]);
        assert!(matches!(
            cat.sky_points("xray", "ra_deg", "dec_deg", CoordinateFormat::Degrees),
            Err(SchemaError::MissingColumns { .. })
        ));
    }

    #[test]
    fn set_column_appends_or_overwrites() {
        let mut cat = table(&["a"], &[&["1"], &["2"]]);
        cat.set_column("b", vec!["x".into(), "y".into()]).unwrap();
        cat.set_column("a", vec!["9".into(), "8".into()]).unwrap();
        assert_eq!(cat.columns(), &["a".to_string(), "b".to_string()]);
        assert_eq!(cat.row(1).unwrap().get("a"), Some("8"));
        assert_eq!(cat.row(0).unwrap().get("b"), Some("x"));
        assert!(cat.set_column("c", vec![]).is_err());
    }

    #[test]
    fn completeness_counts_present_fields() {
        let cat = table(
            &["a", "b", "c"],
            &[&["1", "", "NaN"], &["1", "2", "3"], &["N/A", "<NA>", "x"]],
        );
        assert_eq!(cat.row(0).unwrap().completeness(), 1);
        assert_eq!(cat.row(1).unwrap().completeness(), 3);
        assert_eq!(cat.row(2).unwrap().completeness(), 1);
    }
}
