//! Resolving many-to-many candidate pairs into a one-to-one mapping.
//!
//! The policy is greedy: take pairs in order of increasing separation and
//! accept each one whose rows are both still free. It is not a
//! minimum-total-separation matching, but it is deterministic and always
//! honours the tightest available pairs first.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::matcher::CandidatePair;

/// One accepted association.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub left_row: usize,
    pub right_row: usize,
    pub separation_arcsec: f64,
}

/// A crossmatch result. Built by [`greedy_assign`] it is one-to-one and
/// ordered by increasing separation; loaded from disk it is whatever the
/// file says, so check it with [`MatchAssignment::duplicates`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MatchAssignment {
    matches: Vec<Match>,
}

impl MatchAssignment {
    /// Wrap existing matches without checking uniqueness.
    pub fn from_matches(matches: Vec<Match>) -> Self {
        Self { matches }
    }

    pub fn matches(&self) -> &[Match] {
        &self.matches
    }

    pub fn into_matches(self) -> Vec<Match> {
        self.matches
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Match> {
        self.matches.iter()
    }

    /// Median separation, or `None` when empty.
    pub fn median_separation(&self) -> Option<f64> {
        if self.matches.is_empty() {
            return None;
        }
        let mut seps: Vec<f64> = self.matches.iter().map(|m| m.separation_arcsec).collect();
        seps.sort_by(f64::total_cmp);
        let n = seps.len();
        Some(if n % 2 == 1 {
            seps[n / 2]
        } else {
            (seps[n / 2 - 1] + seps[n / 2]) / 2.0
        })
    }

    pub fn max_separation(&self) -> Option<f64> {
        self.matches
            .iter()
            .map(|m| m.separation_arcsec)
            .max_by(f64::total_cmp)
    }

    /// Rows that appear more than once on either side.
    pub fn duplicates(&self) -> DuplicateReport {
        fn repeated(values: impl Iterator<Item = usize>) -> (usize, Vec<usize>) {
            let mut counts: HashMap<usize, usize> = HashMap::new();
            for v in values {
                *counts.entry(v).or_default() += 1;
            }
            let extra = counts.values().map(|&c| c - 1).sum();
            let mut rows: Vec<usize> = counts
                .into_iter()
                .filter(|&(_, c)| c > 1)
                .map(|(row, _)| row)
                .collect();
            rows.sort_unstable();
            (extra, rows)
        }

        let (left_extra, left_rows) = repeated(self.matches.iter().map(|m| m.left_row));
        let (right_extra, right_rows) = repeated(self.matches.iter().map(|m| m.right_row));
        DuplicateReport {
            left_extra,
            left_rows,
            right_extra,
            right_rows,
        }
    }
}

impl<'a> IntoIterator for &'a MatchAssignment {
    type Item = &'a Match;
    type IntoIter = std::slice::Iter<'a, Match>;

    fn into_iter(self) -> Self::IntoIter {
        self.matches.iter()
    }
}

/// Repeated row indices in an assignment that is supposed to be one-to-one.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct DuplicateReport {
    /// Entries beyond the first for each repeated left row.
    pub left_extra: usize,
    /// Distinct left rows that repeat.
    pub left_rows: Vec<usize>,
    pub right_extra: usize,
    pub right_rows: Vec<usize>,
}

impl DuplicateReport {
    pub fn is_clean(&self) -> bool {
        self.left_extra == 0 && self.right_extra == 0
    }

    /// Emit a warning if the one-to-one invariant is broken.
    pub fn log(&self) {
        if self.left_extra > 0 {
            warn!(
                extra = self.left_extra,
                rows = ?preview(&self.left_rows),
                "duplicate left rows in assignment"
            );
        }
        if self.right_extra > 0 {
            warn!(
                extra = self.right_extra,
                rows = ?preview(&self.right_rows),
                "duplicate right rows in assignment"
            );
        }
    }
}

fn preview(rows: &[usize]) -> &[usize] {
    &rows[..rows.len().min(5)]
}

/// Greedy one-to-one assignment over candidate pairs.
///
/// Pairs are stably sorted by separation, so equal separations keep their
/// candidate-generation order.
pub fn greedy_assign(candidates: &[CandidatePair]) -> MatchAssignment {
    let mut order: Vec<&CandidatePair> = candidates.iter().collect();
    order.sort_by(|a, b| a.separation_arcsec.total_cmp(&b.separation_arcsec));

    let mut used_left = HashSet::new();
    let mut used_right = HashSet::new();
    let mut matches = Vec::new();

    for pair in order {
        if used_left.contains(&pair.left_row) || used_right.contains(&pair.right_row) {
            continue;
        }
        used_left.insert(pair.left_row);
        used_right.insert(pair.right_row);
        matches.push(Match {
            left_row: pair.left_row,
            right_row: pair.right_row,
            separation_arcsec: pair.separation_arcsec,
        });
    }

    debug!(
        candidates = candidates.len(),
        accepted = matches.len(),
        "greedy assignment finished"
    );
    MatchAssignment { matches }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(left_row: usize, right_row: usize, separation_arcsec: f64) -> CandidatePair {
        CandidatePair {
            left_row,
            right_row,
            separation_arcsec,
        }
    }

    fn rows(a: &MatchAssignment) -> Vec<(usize, usize)> {
        a.iter().map(|m| (m.left_row, m.right_row)).collect()
    }

    #[test]
    fn empty_candidates() {
        let a = greedy_assign(&[]);
        assert!(a.is_empty());
        assert_eq!(a.median_separation(), None);
        assert!(a.duplicates().is_clean());
    }

    #[test]
    fn tightest_pair_wins_over_input_order() {
        let a = greedy_assign(&[pair(0, 0, 0.36), pair(0, 1, 0.18)]);
        assert_eq!(rows(&a), vec![(0, 1)]);
    }

    #[test]
    fn conflicts_resolved_globally() {
        // Left 0 is closest to right 0, but left 1 is even closer to right 0;
        // left 0 falls back to right 1.
        let a = greedy_assign(&[
            pair(0, 0, 2.0),
            pair(0, 1, 3.0),
            pair(1, 0, 1.0),
            pair(2, 1, 5.0),
        ]);
        assert_eq!(rows(&a), vec![(1, 0), (0, 1)]);
        assert!(a.duplicates().is_clean());
    }

    #[test]
    fn ties_keep_generation_order() {
        let a = greedy_assign(&[pair(3, 7, 1.5), pair(4, 7, 1.5), pair(3, 8, 1.5)]);
        assert_eq!(rows(&a), vec![(3, 7)]);
    }

    #[test]
    fn output_is_one_to_one() {
        let mut state: u64 = 77;
        let mut next = || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state
        };
        let candidates: Vec<CandidatePair> = (0..500)
            .map(|_| {
                pair(
                    (next() % 40) as usize,
                    (next() % 30) as usize,
                    (next() % 1000) as f64 / 10.0,
                )
            })
            .collect();
        let a = greedy_assign(&candidates);
        assert!(a.duplicates().is_clean());
        assert!(a.len() <= 30);

        let again = greedy_assign(&candidates);
        assert_eq!(a, again);
    }

    #[test]
    fn separation_stats() {
        let a = greedy_assign(&[
            pair(0, 0, 4.0),
            pair(1, 1, 1.0),
            pair(2, 2, 2.0),
            pair(3, 3, 3.0),
        ]);
        assert_eq!(a.median_separation(), Some(2.5));
        assert_eq!(a.max_separation(), Some(4.0));
    }

    #[test]
    fn duplicates_detected_in_loaded_assignment() {
        let m = |l, r| Match {
            left_row: l,
            right_row: r,
            separation_arcsec: 0.0,
        };
        let a = MatchAssignment::from_matches(vec![m(0, 5), m(0, 6), m(0, 7), m(1, 5)]);
        let report = a.duplicates();
        assert_eq!(report.left_extra, 2);
        assert_eq!(report.left_rows, vec![0]);
        assert_eq!(report.right_extra, 1);
        assert_eq!(report.right_rows, vec![5]);
        assert!(!report.is_clean());
    }
}
