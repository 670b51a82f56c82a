//! Global variability coefficient (Cole et al., 2013).
//!
//! How much a node's connectivity changes across task conditions: the
//! standard deviation of each of its edges across tasks, averaged over its
//! neighbours. Self connections are left out.

use ndarray::{Array1, Array2, Array3, ArrayView3, ArrayView4, Axis};
use rayon::prelude::*;

use crate::connectivity::{
    check_axis, finite_or_zero, mask_diagonal, nanmean, nanstd, ConnectivityError,
};
use crate::partition::Partition;

/// GVC scores of a set of subjects, grouped by network.
#[derive(Debug, Clone)]
pub struct NetworkGvc {
    /// node x subject, in partition order.
    pub nodes_subjects: Array2<f64>,
    /// network x subject; the mean over each network's nodes.
    pub networks_subjects: Array2<f64>,
    /// Grand mean across subjects per node, in partition order.
    pub nodes: Array1<f64>,
}

fn check_block(rows: usize, cols: usize, tasks: usize) -> Result<(), ConnectivityError> {
    if rows != cols {
        return Err(ConnectivityError::NotSquare { rows, cols });
    }
    check_axis(rows, "node")?;
    check_axis(tasks, "task")
}

/// GVC of every node of one subject; `fc` is node x node x task.
///
/// NaN edges are skipped. A node with no usable neighbour scores 0.
pub fn gvc(fc: &ArrayView3<f64>) -> Result<Array1<f64>, ConnectivityError> {
    let (rows, cols, tasks) = fc.dim();
    check_block(rows, cols, tasks)?;

    let mut fc: Array3<f64> = fc.to_owned();
    for slice in fc.axis_iter_mut(Axis(2)) {
        mask_diagonal(slice, f64::NAN);
    }

    // variability of each edge across tasks, then the mean over neighbours
    let variability = fc.map_axis(Axis(2), |edge| nanstd(edge.iter()));
    Ok(variability.map_axis(Axis(1), |row| finite_or_zero(nanmean(row.iter()))))
}

/// GVC of every node for every subject; `fc` is node x node x task x
/// subject. Returns node x subject in the node order of `fc`.
pub fn gvc_subjects(fc: &ArrayView4<f64>) -> Result<Array2<f64>, ConnectivityError> {
    let (rows, cols, tasks, subjects) = fc.dim();
    check_block(rows, cols, tasks)?;
    check_axis(subjects, "subject")?;

    let scores = (0..subjects)
        .into_par_iter()
        .map(|s| gvc(&fc.index_axis(Axis(3), s)))
        .collect::<Result<Vec<_>, _>>()?;

    let mut out = Array2::zeros((rows, subjects));
    for (s, score) in scores.iter().enumerate() {
        out.column_mut(s).assign(score);
    }
    Ok(out)
}

/// GVC per subject, sorted into `partition` order and averaged per network.
///
/// `fc` is node x node x task x subject in acquisition order. An adjusted
/// partition from [`adjust_partition`](crate::consensus::adjust_partition)
/// can be passed as is.
pub fn gvc_by_network(
    fc: &ArrayView4<f64>,
    partition: &Partition,
) -> Result<NetworkGvc, ConnectivityError> {
    let (rows, _, _, subjects) = fc.dim();
    if rows != partition.num_nodes() {
        return Err(ConnectivityError::NodeMismatch {
            expected: partition.num_nodes(),
            found: rows,
        });
    }
    let raw = gvc_subjects(fc)?;
    let nodes_subjects = raw.select(Axis(0), partition.order().indices());

    let nodes = nodes_subjects.map_axis(Axis(1), |row| nanmean(row.iter()));

    let mut networks_subjects = Array2::zeros((partition.num_nets(), subjects));
    for (network, range) in partition.boundaries().iter().enumerate() {
        for (s, column) in nodes_subjects.axis_iter(Axis(1)).enumerate() {
            networks_subjects[[network, s]] =
                nanmean(column.iter().skip(range.start).take(range.size));
        }
    }
    tracing::debug!(subjects, networks = partition.num_nets(), "clustered GVC");

    Ok(NetworkGvc {
        nodes_subjects,
        networks_subjects,
        nodes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::NetworkAffiliation;
    use ndarray::{Array3, Array4};

    #[test]
    fn test_constant_edges_are_zero() {
        let mut fc = Array3::from_elem((3, 3, 4), 0.3);
        // the diagonal may change freely
        for t in 0..4 {
            fc[[1, 1, t]] = t as f64;
        }
        assert_eq!(gvc(&fc.view()).unwrap(), Array1::<f64>::zeros(3));
    }

    #[test]
    fn test_by_hand() {
        // edge 0-1 alternates 0 / 1 across two tasks (sd 0.5), edge 0-2 and
        // 1-2 are constant
        let mut fc = Array3::zeros((3, 3, 2));
        fc[[0, 1, 1]] = 1.0;
        fc[[1, 0, 1]] = 1.0;
        let scores = gvc(&fc.view()).unwrap();
        assert!((scores[0] - 0.25).abs() < 1e-12);
        assert!((scores[1] - 0.25).abs() < 1e-12);
        assert_eq!(scores[2], 0.0);
    }

    #[test]
    fn test_nan_edges_skipped() {
        let mut fc = Array3::zeros((2, 2, 3));
        fc[[0, 1, 0]] = f64::NAN;
        fc[[0, 1, 1]] = 1.0;
        fc[[0, 1, 2]] = 3.0;
        let scores = gvc(&fc.view()).unwrap();
        assert!((scores[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_task_axis() {
        let fc = Array3::<f64>::zeros((2, 2, 0));
        assert_eq!(
            gvc(&fc.view()).unwrap_err(),
            ConnectivityError::EmptyAxis { axis: "task" }
        );
    }

    #[test]
    fn test_by_network() {
        // node 2 (acquisition order) varies; it sorts to the front
        let mut fc = Array4::zeros((3, 3, 2, 2));
        for s in 0..2 {
            for j in [0, 1] {
                fc[[2, j, 1, s]] = 1.0 + s as f64;
                fc[[j, 2, 1, s]] = 1.0 + s as f64;
            }
        }
        let affiliation = NetworkAffiliation::new(vec![1, 1, 0], 2).unwrap();
        let partition = Partition::from_affiliation(affiliation).unwrap();
        let by_net = gvc_by_network(&fc.view(), &partition).unwrap();

        assert_eq!(by_net.nodes_subjects.dim(), (3, 2));
        assert!((by_net.nodes_subjects[[0, 0]] - 0.5).abs() < 1e-12);
        assert!((by_net.nodes_subjects[[0, 1]] - 1.0).abs() < 1e-12);
        assert!((by_net.nodes[0] - 0.75).abs() < 1e-12);
        // nodes 0 and 1 each have one varying edge out of two
        assert!((by_net.networks_subjects[[1, 0]] - 0.25).abs() < 1e-12);
        assert!((by_net.networks_subjects[[0, 1]] - 1.0).abs() < 1e-12);
    }
}
