//! Candidate generation: which right-catalog rows lie within the matching
//! radius of each left-catalog row.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::geom::SkyPosition;
use crate::geom::sphere::{angle_to_chord_sq, arcsec_to_rad};
use crate::kdtree::SkyTree;

/// Relative padding on the KD-tree search radius. The exact angular test
/// runs afterwards, so this only has to cover chord/angle rounding.
const RADIUS_PAD: f64 = 1e-9;

/// Absolute padding on the search chord. Unit-vector components carry a few
/// ulps of error, which dominates at milliarcsecond radii.
const CHORD_FLOOR: f64 = 8.0 * f64::EPSILON;

/// Which right rows a left row may be paired with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchMode {
    /// Only the single closest right row, kept if it is within tolerance.
    Nearest,
    /// Every right row within tolerance.
    #[default]
    AllCandidates,
}

/// A possible association between two catalog rows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CandidatePair {
    pub left_row: usize,
    pub right_row: usize,
    pub separation_arcsec: f64,
}

/// Find candidate pairs between two position lists.
///
/// Rows are identified by the indices carried in the input tuples. Every
/// returned pair satisfies `separation_arcsec <= tolerance_arcsec`. Pairs
/// come out grouped by left row in input order, each group sorted by
/// separation and then by right row.
pub fn find_candidates(
    left: &[(usize, SkyPosition)],
    right: &[(usize, SkyPosition)],
    tolerance_arcsec: f64,
    mode: MatchMode,
) -> Vec<CandidatePair> {
    if left.is_empty() || right.is_empty() || tolerance_arcsec.is_nan() || tolerance_arcsec < 0.0 {
        return Vec::new();
    }

    // The tree indexes slots into `right` so separations can be recomputed
    // from the original positions.
    let tree = SkyTree::build(right.iter().enumerate().map(|(slot, &(_, pos))| (slot, pos)));
    let radius = arcsec_to_rad(tolerance_arcsec) * (1.0 + RADIUS_PAD);
    let chord = angle_to_chord_sq(radius).sqrt() + CHORD_FLOOR;
    let chord_sq = chord * chord;

    let mut pairs = Vec::new();
    let mut group = Vec::new();
    for &(left_row, left_pos) in left {
        let query = left_pos.to_xyz();
        group.clear();

        match mode {
            MatchMode::Nearest => {
                if let Some(hit) = tree.nearest(&query) {
                    group.push(hit.row);
                }
            }
            MatchMode::AllCandidates => {
                group.extend(tree.within(&query, chord_sq).iter().map(|n| n.row));
            }
        }

        let start = pairs.len();
        for &slot in &group {
            let (right_row, right_pos) = right[slot];
            let separation_arcsec = left_pos.separation_arcsec(&right_pos);
            if separation_arcsec <= tolerance_arcsec {
                pairs.push(CandidatePair {
                    left_row,
                    right_row,
                    separation_arcsec,
                });
            }
        }
        pairs[start..].sort_by(|a, b| {
            a.separation_arcsec
                .total_cmp(&b.separation_arcsec)
                .then(a.right_row.cmp(&b.right_row))
        });
    }

    debug!(
        left = left.len(),
        right = right.len(),
        candidates = pairs.len(),
        ?mode,
        "candidate search finished"
    );
    pairs
}
