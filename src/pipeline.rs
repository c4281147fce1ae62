//! End-to-end crossmatch of two catalogs.
//!
//! Optional completeness dedup, coordinate extraction, candidate search and
//! greedy assignment, with the counts needed to audit each stage.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::assign::{MatchAssignment, greedy_assign};
use crate::catalog::Catalog;
use crate::dedup::{DedupConfig, DedupSummary, deduplicate};
use crate::error::{ParseError, Result};
use crate::geom::CoordinateFormat;
use crate::matcher::{MatchMode, find_candidates};

/// Parameters for one crossmatch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossmatchConfig {
    /// Matching radius in arcseconds (inclusive).
    pub tolerance_arcsec: f64,
    pub mode: MatchMode,
    /// Columns identifying duplicate rows. Empty disables deduplication.
    pub dedup_keys: Vec<String>,
    /// Decimals to round dedup keys to before comparing.
    pub dedup_decimals: Option<u32>,
    pub ra_column: String,
    pub dec_column: String,
    pub format: CoordinateFormat,
}

impl Default for CrossmatchConfig {
    fn default() -> Self {
        Self {
            tolerance_arcsec: 45.0,
            mode: MatchMode::AllCandidates,
            dedup_keys: Vec::new(),
            dedup_decimals: None,
            ra_column: "ra_deg".to_string(),
            dec_column: "dec_deg".to_string(),
            format: CoordinateFormat::Degrees,
        }
    }
}

impl CrossmatchConfig {
    fn dedup(&self) -> Option<DedupConfig> {
        (!self.dedup_keys.is_empty())
            .then(|| DedupConfig::new(self.dedup_keys.iter().cloned(), self.dedup_decimals))
    }
}

/// Whether every input row could take part in the match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Completion {
    Complete,
    /// Some rows were excluded for invalid coordinates.
    Partial,
}

/// Counts and diagnostics for one run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MatchStats {
    pub left_total: usize,
    pub right_total: usize,
    pub left_dedup: Option<DedupSummary>,
    pub right_dedup: Option<DedupSummary>,
    pub left_rejected: usize,
    pub right_rejected: usize,
    pub candidates: usize,
    pub matched: usize,
    /// Valid left rows left without a partner.
    pub unmatched_left: usize,
    pub unmatched_right: usize,
    pub median_separation_arcsec: Option<f64>,
    pub max_separation_arcsec: Option<f64>,
    /// Matches over the smaller count of valid rows.
    pub efficiency: Option<f64>,
}

/// Result of [`crossmatch`].
#[derive(Debug, Clone)]
pub struct CrossmatchOutcome {
    pub assignment: MatchAssignment,
    /// Deduplicated left catalog, when dedup ran. Assignment rows index
    /// into this rather than the original.
    pub left_deduped: Option<Catalog>,
    pub right_deduped: Option<Catalog>,
    pub stats: MatchStats,
}

impl CrossmatchOutcome {
    pub fn completion(&self) -> Completion {
        if self.stats.left_rejected + self.stats.right_rejected == 0 {
            Completion::Complete
        } else {
            Completion::Partial
        }
    }

    /// The catalog the assignment's left rows refer to.
    pub fn left_catalog<'a>(&'a self, original: &'a Catalog) -> &'a Catalog {
        self.left_deduped.as_ref().unwrap_or(original)
    }

    pub fn right_catalog<'a>(&'a self, original: &'a Catalog) -> &'a Catalog {
        self.right_deduped.as_ref().unwrap_or(original)
    }
}

/// Crossmatch `left` against `right`.
///
/// Missing coordinate or dedup columns and an invalid tolerance are fatal.
/// Rows with unusable coordinates are excluded and counted, making the
/// outcome [`Completion::Partial`].
pub fn crossmatch(
    left: &Catalog,
    right: &Catalog,
    config: &CrossmatchConfig,
) -> Result<CrossmatchOutcome> {
    if !config.tolerance_arcsec.is_finite() || config.tolerance_arcsec < 0.0 {
        return Err(ParseError::OutOfRange {
            axis: "tolerance",
            value: config.tolerance_arcsec,
        }
        .into());
    }

    let mut stats = MatchStats {
        left_total: left.len(),
        right_total: right.len(),
        ..MatchStats::default()
    };

    let (left_deduped, right_deduped) = match config.dedup() {
        Some(dedup) => {
            let (l, ls) = deduplicate(left, &dedup)?;
            let (r, rs) = deduplicate(right, &dedup)?;
            stats.left_dedup = Some(ls);
            stats.right_dedup = Some(rs);
            (Some(l), Some(r))
        }
        None => (None, None),
    };
    let left_cat = left_deduped.as_ref().unwrap_or(left);
    let right_cat = right_deduped.as_ref().unwrap_or(right);

    let (ra, dec) = (config.ra_column.as_str(), config.dec_column.as_str());
    let left_points = left_cat.sky_points("left", ra, dec, config.format)?;
    let right_points = right_cat.sky_points("right", ra, dec, config.format)?;
    stats.left_rejected = left_points.rejected.len();
    stats.right_rejected = right_points.rejected.len();

    let candidates = find_candidates(
        &left_points.positions,
        &right_points.positions,
        config.tolerance_arcsec,
        config.mode,
    );
    let assignment = greedy_assign(&candidates);

    stats.candidates = candidates.len();
    stats.matched = assignment.len();
    stats.unmatched_left = left_points.len() - assignment.len();
    stats.unmatched_right = right_points.len() - assignment.len();
    stats.median_separation_arcsec = assignment.median_separation();
    stats.max_separation_arcsec = assignment.max_separation();
    let smaller = left_points.len().min(right_points.len());
    stats.efficiency = (smaller > 0).then(|| assignment.len() as f64 / smaller as f64);

    info!(
        left = left_points.len(),
        right = right_points.len(),
        candidates = stats.candidates,
        matched = stats.matched,
        unmatched_left = stats.unmatched_left,
        tolerance_arcsec = config.tolerance_arcsec,
        "crossmatch finished"
    );

    Ok(CrossmatchOutcome {
        assignment,
        left_deduped,
        right_deduped,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::table;
    use crate::error::{Error, SchemaError};

    fn coords(points: &[(&str, &str)]) -> Catalog {
        let rows: Vec<Vec<String>> = points
            .iter()
            .enumerate()
            .map(|(i, (ra, dec))| vec![format!("src{i}"), ra.to_string(), dec.to_string()])
            .collect();
        Catalog::from_rows(vec!["name".into(), "ra_deg".into(), "dec_deg".into()], rows).unwrap()
    }

    fn config(tolerance_arcsec: f64) -> CrossmatchConfig {
        CrossmatchConfig {
            tolerance_arcsec,
            ..CrossmatchConfig::default()
        }
    }

    #[test]
    fn greedy_prefers_smaller_separation() {
        let left = coords(&[("10", "10")]);
        let right = coords(&[("10", "10.0001"), ("10", "10.00005")]);
        let out = crossmatch(&left, &right, &config(1.0)).unwrap();
        assert_eq!(out.assignment.len(), 1);
        assert_eq!(out.assignment.matches()[0].right_row, 1);
        assert_eq!(out.completion(), Completion::Complete);
    }

    #[test]
    fn empty_sides_give_empty_assignment() {
        let some = coords(&[("10", "10")]);
        let none = coords(&[]);
        let out = crossmatch(&none, &some, &config(5.0)).unwrap();
        assert!(out.assignment.is_empty());
        assert_eq!(out.stats.efficiency, None);
        let out = crossmatch(&some, &none, &config(5.0)).unwrap();
        assert!(out.assignment.is_empty());
        assert_eq!(out.stats.unmatched_left, 1);
    }

    #[test]
    fn unmatched_rows_are_tallied() {
        let left = coords(&[("10", "10"), ("200", "-40"), ("300", "60")]);
        let right = coords(&[("10", "10.0002"), ("100", "0")]);
        let out = crossmatch(&left, &right, &config(2.0)).unwrap();
        assert_eq!(out.stats.matched, 1);
        assert_eq!(out.stats.unmatched_left, 2);
        assert_eq!(out.stats.unmatched_right, 1);
        assert_eq!(out.stats.efficiency, Some(0.5));
    }

    #[test]
    fn invalid_rows_make_run_partial() {
        let left = coords(&[("10", "10"), ("", "10"), ("400", "0")]);
        let right = coords(&[("10", "10")]);
        let out = crossmatch(&left, &right, &config(1.0)).unwrap();
        assert_eq!(out.stats.left_rejected, 2);
        assert_eq!(out.stats.matched, 1);
        assert_eq!(out.stats.unmatched_left, 0);
        assert_eq!(out.completion(), Completion::Partial);
    }

    #[test]
    fn missing_coordinate_columns_are_fatal() {
        let left = table(&["name", "RA", "DEC"], &[&["a", "1", "1"]]);
        let right = coords(&[("1", "1")]);
        let err = crossmatch(&left, &right, &config(1.0)).unwrap_err();
        assert!(matches!(err, Error::Schema(SchemaError::MissingColumns { .. })));
    }

    #[test]
    fn negative_tolerance_rejected() {
        let c = coords(&[("1", "1")]);
        assert!(matches!(
            crossmatch(&c, &c, &config(-1.0)),
            Err(Error::Parse(ParseError::OutOfRange { .. }))
        ));
    }

    #[test]
    fn nearest_mode_still_one_to_one() {
        // Both left rows have the same nearest right row.
        let left = coords(&[("50", "0"), ("50", "0.0002")]);
        let right = coords(&[("50", "0.0001"), ("80", "0")]);
        let cfg = CrossmatchConfig {
            mode: MatchMode::Nearest,
            ..config(5.0)
        };
        let out = crossmatch(&left, &right, &cfg).unwrap();
        assert_eq!(out.assignment.len(), 1);
        assert!(out.assignment.duplicates().is_clean());
    }

    #[test]
    fn dedup_runs_before_matching() {
        let left = table(
            &["name", "ra_deg", "dec_deg", "redshift"],
            &[
                &["sparse", "10.0", "10.0", ""],
                &["rich", "10.0", "10.0", "0.3"],
                &["other", "20.0", "20.0", "0.1"],
            ],
        );
        let right = coords(&[("10.0", "10.0001")]);
        let cfg = CrossmatchConfig {
            dedup_keys: vec!["ra_deg".into(), "dec_deg".into()],
            dedup_decimals: Some(5),
            ..config(2.0)
        };
        let out = crossmatch(&left, &right, &cfg).unwrap();
        assert_eq!(out.stats.left_dedup, Some(DedupSummary { before: 3, after: 2 }));

        let left_cat = out.left_catalog(&left);
        let m = out.assignment.matches()[0];
        assert_eq!(left_cat.row(m.left_row).unwrap().get("name"), Some("rich"));
    }

    #[test]
    fn deterministic_across_runs() {
        let mut state: u64 = 99;
        let mut next = || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state as f64) / (u64::MAX as f64)
        };
        let mut field = |n: usize| -> Catalog {
            let rows: Vec<Vec<String>> = (0..n)
                .map(|i| {
                    vec![
                        format!("s{i}"),
                        format!("{:.6}", 30.0 + next() * 0.05),
                        format!("{:.6}", -5.0 + next() * 0.05),
                    ]
                })
                .collect();
            let columns = vec!["name".into(), "ra_deg".into(), "dec_deg".into()];
            Catalog::from_rows(columns, rows).unwrap()
        };
        let left = field(200);
        let right = field(250);
        let a = crossmatch(&left, &right, &config(20.0)).unwrap();
        let b = crossmatch(&left, &right, &config(20.0)).unwrap();
        assert_eq!(a.assignment, b.assignment);
        assert!(a.assignment.duplicates().is_clean());
        assert!(a.assignment.iter().all(|m| m.separation_arcsec <= 20.0));
    }
}
