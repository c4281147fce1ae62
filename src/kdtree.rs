//! KD-tree over catalog positions on the unit sphere.
//!
//! Positions are stored as 3D unit vectors, so a cone search of angular
//! radius theta is a ball search of chord radius `2 sin(theta / 2)`. This
//! sidesteps the RA wrap at 0/360 and the pole singularities entirely.

use crate::geom::SkyPosition;

/// A row found by a search, with its squared chord distance to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub row: usize,
    pub chord_sq: f64,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    xyz: [f64; 3],
    row: usize,
}

/// Nodes live in a flat array; children are referenced by position.
#[derive(Debug, Clone)]
enum Node {
    Split {
        axis: usize,
        value: f64,
        left: usize,
        right: usize,
    },
    /// Range `[start..end)` into `entries`.
    Leaf { start: usize, end: usize },
}

const LEAF_SIZE: usize = 16;

/// Static spatial index of catalog rows.
pub struct SkyTree {
    nodes: Vec<Node>,
    entries: Vec<Entry>,
}

impl SkyTree {
    /// Build from `(row_index, position)` pairs. Row indices are carried
    /// through untouched and need not be contiguous.
    pub fn build<I>(positions: I) -> Self
    where
        I: IntoIterator<Item = (usize, SkyPosition)>,
    {
        let entries: Vec<Entry> = positions
            .into_iter()
            .map(|(row, pos)| Entry {
                xyz: pos.to_xyz(),
                row,
            })
            .collect();

        let mut tree = SkyTree {
            nodes: Vec::new(),
            entries,
        };
        if !tree.entries.is_empty() {
            tree.build_node(0, tree.entries.len());
        }
        tree
    }

    fn build_node(&mut self, start: usize, end: usize) -> usize {
        let node_idx = self.nodes.len();
        if end - start <= LEAF_SIZE {
            self.nodes.push(Node::Leaf { start, end });
            return node_idx;
        }

        let axis = self.widest_axis(start, end);
        let mid = start + (end - start) / 2;
        self.entries[start..end]
            .select_nth_unstable_by(mid - start, |a, b| a.xyz[axis].total_cmp(&b.xyz[axis]));
        let value = self.entries[mid].xyz[axis];

        // Reserve the slot, fill it once both children exist.
        self.nodes.push(Node::Leaf { start: 0, end: 0 });
        let left = self.build_node(start, mid);
        let right = self.build_node(mid, end);
        self.nodes[node_idx] = Node::Split {
            axis,
            value,
            left,
            right,
        };
        node_idx
    }

    fn widest_axis(&self, start: usize, end: usize) -> usize {
        let mut lo = [f64::INFINITY; 3];
        let mut hi = [f64::NEG_INFINITY; 3];
        for e in &self.entries[start..end] {
            for d in 0..3 {
                lo[d] = lo[d].min(e.xyz[d]);
                hi[d] = hi[d].max(e.xyz[d]);
            }
        }
        (0..3)
            .max_by(|&a, &b| (hi[a] - lo[a]).total_cmp(&(hi[b] - lo[b])))
            .unwrap_or(0)
    }

    /// All rows whose squared chord distance to `query` is `<= chord_sq`,
    /// in tree order.
    pub fn within(&self, query: &[f64; 3], chord_sq: f64) -> Vec<Neighbor> {
        let mut out = Vec::new();
        if !self.nodes.is_empty() {
            self.within_node(0, query, chord_sq, &mut out);
        }
        out
    }

    fn within_node(
        &self,
        node_idx: usize,
        query: &[f64; 3],
        chord_sq: f64,
        out: &mut Vec<Neighbor>,
    ) {
        match self.nodes[node_idx] {
            Node::Leaf { start, end } => {
                for e in &self.entries[start..end] {
                    let d = squared_distance(query, &e.xyz);
                    if d <= chord_sq {
                        out.push(Neighbor {
                            row: e.row,
                            chord_sq: d,
                        });
                    }
                }
            }
            Node::Split {
                axis,
                value,
                left,
                right,
            } => {
                let diff = query[axis] - value;
                let (near, far) = if diff <= 0.0 { (left, right) } else { (right, left) };
                self.within_node(near, query, chord_sq, out);
                if diff * diff <= chord_sq {
                    self.within_node(far, query, chord_sq, out);
                }
            }
        }
    }

    /// The closest row to `query`. Equidistant rows resolve to the lowest
    /// row index.
    pub fn nearest(&self, query: &[f64; 3]) -> Option<Neighbor> {
        if self.nodes.is_empty() {
            return None;
        }
        let mut best = Neighbor {
            row: usize::MAX,
            chord_sq: f64::INFINITY,
        };
        self.nearest_node(0, query, &mut best);
        (best.row != usize::MAX).then_some(best)
    }

    fn nearest_node(&self, node_idx: usize, query: &[f64; 3], best: &mut Neighbor) {
        match self.nodes[node_idx] {
            Node::Leaf { start, end } => {
                for e in &self.entries[start..end] {
                    let d = squared_distance(query, &e.xyz);
                    if d < best.chord_sq || (d == best.chord_sq && e.row < best.row) {
                        *best = Neighbor {
                            row: e.row,
                            chord_sq: d,
                        };
                    }
                }
            }
            Node::Split {
                axis,
                value,
                left,
                right,
            } => {
                let diff = query[axis] - value;
                let (near, far) = if diff <= 0.0 { (left, right) } else { (right, left) };
                self.nearest_node(near, query, best);
                if diff * diff <= best.chord_sq {
                    self.nearest_node(far, query, best);
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[inline]
fn squared_distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    dx * dx + dy * dy + dz * dz
}
