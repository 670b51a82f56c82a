//! Node orders are permutations of node indices which, applied to both
//! axes of a connectivity matrix, pull the nodes of each network together
//! into contiguous blocks.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

use crate::partition::PartitionError;

/// Hold the indices of a node order.
///
/// Type invariant: each index in `0..len` appears exactly once.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeOrder {
    indices: Vec<usize>,
}

impl NodeOrder {
    /// Checks that the indices are a permutation before wrapping them.
    pub fn from_indices(indices: Vec<usize>) -> Result<Self, PartitionError> {
        let order = NodeOrder { indices };
        if order.correct() {
            Ok(order)
        } else {
            Err(PartitionError::InvalidOrder)
        }
    }

    /// The order which leaves every node where it is.
    pub fn identity(len: usize) -> Self {
        NodeOrder {
            indices: (0..len).collect(),
        }
    }

    /// Stable sort of node indices by a key, so nodes sharing a key keep
    /// their relative order.
    pub fn sort_by_key<K: Ord>(keys: &[K]) -> Self {
        let mut indices: Vec<usize> = (0..keys.len()).collect();
        indices.sort_by(|&a, &b| keys[a].cmp(&keys[b]));
        NodeOrder { indices }
    }

    fn correct(&self) -> bool {
        let len = self.indices.len();
        let mut seen = vec![false; len];
        for &i in &self.indices {
            if i >= len || seen[i] {
                return false;
            }
            seen[i] = true;
        }
        true
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Apply `then` to something already sorted by `self`.
    ///
    /// `m[self][then] == m[self.then(then)]`, which is how an empirically
    /// adjusted order (relative to the sorted matrix) is turned into one that
    /// applies to the raw matrix directly.
    pub fn then(&self, then: &NodeOrder) -> NodeOrder {
        debug_assert_eq!(self.len(), then.len());
        NodeOrder {
            indices: then.indices.iter().map(|&i| self.indices[i]).collect(),
        }
    }

    /// The inverse permutation: position of each raw node in the sorted order.
    pub fn inverse(&self) -> NodeOrder {
        let mut inverse = vec![0; self.len()];
        for (sorted, &raw) in self.indices.iter().enumerate() {
            inverse[raw] = sorted;
        }
        NodeOrder { indices: inverse }
    }

    /// Reorder both axes of a square matrix.
    pub fn sort_matrix(&self, matrix: &ArrayView2<f64>) -> Array2<f64> {
        matrix
            .select(Axis(0), &self.indices)
            .select(Axis(1), &self.indices)
    }

    /// Reorder a node vector into partition order.
    pub fn sort_nodes<T: Clone>(&self, values: &ArrayView1<T>) -> Array1<T> {
        self.indices.iter().map(|&i| values[i].clone()).collect()
    }

    /// Take a node vector in partition order back to the acquisition order
    /// the node order was built from. Used when per-node results need to be
    /// displayed against the original atlas.
    pub fn unsort<T: Clone>(&self, sorted: &ArrayView1<T>) -> Array1<T> {
        self.inverse().sort_nodes(sorted)
    }
}
