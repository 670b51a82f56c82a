//! Collapse node x node connectivity down to node x network by averaging
//! each row over the column range of every network.

use ndarray::{s, Array2, ArrayView2};

use crate::connectivity::nanmean;
use crate::partition::PartitionBoundaries;

/// How edge weights inside a network range are averaged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Averaging {
    /// Plain mean, ignoring NaN.
    #[default]
    Arithmetic,
    /// Mean of Fisher z-transformed values (`atanh`), transformed back with
    /// `tanh`. Use for correlation coefficients.
    FisherZ,
}

impl Averaging {
    fn mean<'a, I>(self, values: I) -> f64
    where
        I: IntoIterator<Item = &'a f64>,
    {
        match self {
            Averaging::Arithmetic => nanmean(values),
            Averaging::FisherZ => {
                let z: Vec<f64> = values.into_iter().map(|r| r.atanh()).collect();
                nanmean(z.iter()).tanh()
            }
        }
    }
}

/// Average a sorted node x node slice into node x network.
///
/// The slice must already be in partition order, and its diagonal should
/// be NaN so that a node's own value does not count towards its network.
pub fn cluster_nodes(
    sorted: &ArrayView2<f64>,
    boundaries: &PartitionBoundaries,
    averaging: Averaging,
) -> Array2<f64> {
    let nodes = sorted.nrows();
    let mut clustered = Array2::from_elem((nodes, boundaries.num_nets()), f64::NAN);
    for (node, row) in sorted.rows().into_iter().enumerate() {
        for (network, range) in boundaries.iter().enumerate() {
            clustered[[node, network]] = averaging.mean(row.slice(s![range.nodes()]).iter());
        }
    }
    clustered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::without_diagonal;
    use crate::partition::{NetworkRange, PartitionBoundaries};
    use ndarray::array;

    fn two_by_two() -> PartitionBoundaries {
        PartitionBoundaries::from_ranges(
            vec![
                NetworkRange { start: 0, end: 1, size: 2 },
                NetworkRange { start: 2, end: 3, size: 2 },
            ],
            4,
        )
        .unwrap()
    }

    #[test]
    fn test_arithmetic_cluster_skips_diagonal() {
        let m = array![
            [9.0, 0.4, 0.1, 0.3],
            [0.4, 9.0, 0.2, 0.2],
            [0.1, 0.2, 9.0, 0.6],
            [0.3, 0.2, 0.6, 9.0]
        ];
        let masked = without_diagonal(&m.view(), f64::NAN);
        let c = cluster_nodes(&masked.view(), &two_by_two(), Averaging::Arithmetic);

        assert_eq!(c.dim(), (4, 2));
        assert!((c[[0, 0]] - 0.4).abs() < 1e-12);
        assert!((c[[0, 1]] - 0.2).abs() < 1e-12);
        assert!((c[[3, 1]] - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_all_nan_block_is_nan() {
        let m = array![
            [f64::NAN, f64::NAN, 0.1, 0.3],
            [f64::NAN, f64::NAN, 0.2, 0.2],
            [0.1, 0.2, f64::NAN, 0.6],
            [0.3, 0.2, 0.6, f64::NAN]
        ];
        let c = cluster_nodes(&m.view(), &two_by_two(), Averaging::Arithmetic);
        assert!(c[[0, 0]].is_nan());
        assert!((c[[0, 1]] - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_fisher_z_average() {
        let m = array![
            [f64::NAN, 0.5, 0.1, 0.3],
            [0.5, f64::NAN, 0.2, 0.2],
            [0.1, 0.2, f64::NAN, 0.6],
            [0.3, 0.2, 0.6, f64::NAN]
        ];
        let c = cluster_nodes(&m.view(), &two_by_two(), Averaging::FisherZ);
        let expected = ((0.1f64.atanh() + 0.3f64.atanh()) / 2.0).tanh();
        assert!((c[[0, 1]] - expected).abs() < 1e-12);
        // a single value survives the round trip
        assert!((c[[0, 0]] - 0.5).abs() < 1e-12);
    }
}
