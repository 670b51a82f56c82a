//! Network partition deviation.
//!
//! For every node and task condition, the network a node connects to most
//! strongly (its preference) is compared against the network the partition
//! assigns it to. The relative frequency, across task conditions, of a node
//! preferring each network is its affinity; averaging affinities over the
//! nodes of a network gives a network x network matrix whose diagonal is
//! the adherence to the partition. Deviation is `1 - adherence`.
//!
//! Based on Cocuzza et al. (2020), J Neurosci.
//!
//! Two modes are offered through [`DeviationOptions`]:
//! - mean first, where connectivity is averaged across subjects before
//!   anything else, giving one score per network;
//! - per subject, where the whole pipeline runs independently for each
//!   subject. Subjects are processed in parallel.
//!
//! The two modes are not numerically equivalent.

use ndarray::{Array2, Array3, Array4, ArrayView2, ArrayView3, ArrayView4, Axis};
use rayon::prelude::*;

use crate::cluster::{cluster_nodes, Averaging};
use crate::connectivity::{check_axis, check_square, nanmean, without_diagonal, ConnectivityError};
use crate::partition::{Partition, PartitionBoundaries};
use crate::preference::preferences;

/// Clustered affinity rows should add to 100%; anything under this is
/// reported.
pub const AFFINITY_FLOOR_PERCENT: f64 = 99.9;

/// How [`deviation`] treats the subject axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviationOptions {
    /// Average connectivity across subjects before clustering.
    pub mean_first: bool,
}

/// A clustered affinity row which did not add up to ~100%.
#[derive(Debug, Clone, PartialEq)]
pub struct AffinityShortfall {
    pub network: usize,
    /// `None` in mean first mode.
    pub subject: Option<usize>,
    pub percent: f64,
}

/// All the intermediate and final arrays of a deviation run.
///
/// The last axis is always subjects; in mean first mode it has length 1.
/// Node axes are in partition order.
#[derive(Debug, Clone)]
pub struct Deviation {
    /// network x subject.
    pub deviation: Array2<f64>,
    /// network x subject; the diagonal of each clustered affinity matrix.
    pub adherence: Array2<f64>,
    /// network x network x subject. Row `a` gives how often network `a`'s
    /// nodes preferred each network.
    pub clustered_affinities: Array3<f64>,
    /// node x network x subject.
    pub node_affinities: Array3<f64>,
    /// node x task x subject; the clustered connectivity of the preferred
    /// network.
    pub preference_values: Array3<f64>,
    /// node x task x subject; the preferred network.
    pub preference_networks: Array3<usize>,
    /// node x task x network x subject; true at the preferred network.
    pub memberships: Array4<bool>,
    /// Clustered affinity rows that failed the 100% check.
    pub shortfalls: Vec<AffinityShortfall>,
}

/// One pass of the pipeline over a node x node x task block.
struct Run {
    clustered_affinities: Array2<f64>,
    node_affinities: Array2<f64>,
    preference_values: Array2<f64>,
    preference_networks: Array2<usize>,
    memberships: Array3<bool>,
    shortfalls: Vec<AffinityShortfall>,
}

/// Cluster every task slice of a raw (acquisition order) node x node x task
/// block down to node x network x task. Slices are sorted by the partition
/// and their diagonal is set to NaN first.
pub fn cluster_task_fc(
    fc: &ArrayView3<f64>,
    partition: &Partition,
    averaging: Averaging,
) -> Array3<f64> {
    let (nodes, _, tasks) = fc.dim();
    let mut clustered = Array3::zeros((nodes, partition.num_nets(), tasks));
    for (task, slice) in fc.axis_iter(Axis(2)).enumerate() {
        let sorted = partition.order().sort_matrix(&slice);
        let masked = without_diagonal(&sorted.view(), f64::NAN);
        clustered
            .index_axis_mut(Axis(2), task)
            .assign(&cluster_nodes(&masked.view(), partition.boundaries(), averaging));
    }
    clustered
}

/// Binarise node x task preferred networks into node x task x network.
pub fn memberships(preference_networks: &ArrayView2<usize>, num_nets: usize) -> Array3<bool> {
    let (nodes, tasks) = preference_networks.dim();
    Array3::from_shape_fn((nodes, tasks, num_nets), |(node, task, network)| {
        preference_networks[[node, task]] == network
    })
}

/// Relative frequency across tasks of each node preferring each network.
pub fn node_affinities(memberships: &ArrayView3<bool>) -> Array2<f64> {
    let tasks = memberships.len_of(Axis(1)) as f64;
    memberships
        .mapv(|m| if m { 1.0 } else { 0.0 })
        .sum_axis(Axis(1))
        / tasks
}

/// Average node affinities over the nodes of each network, giving
/// network x network.
pub fn cluster_affinities(
    node_affinities: &ArrayView2<f64>,
    boundaries: &PartitionBoundaries,
) -> Array2<f64> {
    let num_nets = boundaries.num_nets();
    let mut clustered = Array2::zeros((num_nets, node_affinities.ncols()));
    for (network, range) in boundaries.iter().enumerate() {
        for (target, column) in node_affinities.axis_iter(Axis(1)).enumerate() {
            clustered[[network, target]] =
                nanmean(column.iter().skip(range.start).take(range.size));
        }
    }
    clustered
}

/// Check every clustered affinity row adds up to at least 99.9%. Failures
/// are logged and returned; they never stop the computation.
pub fn check_affinity_rows(
    clustered: &ArrayView2<f64>,
    subject: Option<usize>,
) -> Vec<AffinityShortfall> {
    clustered
        .axis_iter(Axis(0))
        .enumerate()
        .filter_map(|(network, row)| {
            let percent = row.sum() * 100.0;
            // NaN fails the check too
            if percent >= AFFINITY_FLOOR_PERCENT {
                return None;
            }
            match subject {
                Some(s) => tracing::warn!(
                    subject = s,
                    network,
                    "clustered affinities add to {percent}%; not the expected ~100%"
                ),
                None => tracing::warn!(
                    network,
                    "clustered affinities add to {percent}%; not the expected ~100%"
                ),
            }
            Some(AffinityShortfall {
                network,
                subject,
                percent,
            })
        })
        .collect()
}

fn run(fc: &ArrayView3<f64>, partition: &Partition, subject: Option<usize>) -> Run {
    let num_nets = partition.num_nets();

    let clustered_fc = cluster_task_fc(fc, partition, Averaging::Arithmetic);

    let (nodes, _, tasks) = clustered_fc.dim();
    let own = partition.boundaries().sorted_ids();
    let mut preference_values = Array2::<f64>::zeros((nodes, tasks));
    let mut preference_networks = Array2::<usize>::zeros((nodes, tasks));
    for (task, slice) in clustered_fc.axis_iter(Axis(2)).enumerate() {
        let (values, networks) = preferences(&slice, &own);
        preference_values.column_mut(task).assign(&values);
        preference_networks.column_mut(task).assign(&networks);
    }

    let memberships = memberships(&preference_networks.view(), num_nets);
    let node_affinities = node_affinities(&memberships.view());
    let clustered_affinities = cluster_affinities(&node_affinities.view(), partition.boundaries());
    let shortfalls = check_affinity_rows(&clustered_affinities.view(), subject);

    Run {
        clustered_affinities,
        node_affinities,
        preference_values,
        preference_networks,
        memberships,
        shortfalls,
    }
}

/// Compute network partition deviation.
///
/// `fc` is node x node x task x subject, in acquisition order; the
/// partition's node order sorts it. To score against an empirically
/// adjusted partition, pass the partition from
/// [`adjust_partition`](crate::consensus::adjust_partition).
pub fn deviation(
    fc: &ArrayView4<f64>,
    partition: &Partition,
    options: DeviationOptions,
) -> Result<Deviation, ConnectivityError> {
    let (rows, cols, tasks, subjects) = fc.dim();
    check_square(rows, cols, partition.num_nodes())?;
    check_axis(tasks, "task")?;
    check_axis(subjects, "subject")?;

    let runs: Vec<Run> = if options.mean_first {
        tracing::debug!(subjects, "averaging connectivity across subjects first");
        let mean_fc = fc.map_axis(Axis(3), |v| nanmean(v.iter()));
        vec![run(&mean_fc.view(), partition, None)]
    } else {
        tracing::debug!(subjects, "running deviation per subject");
        (0..subjects)
            .into_par_iter()
            .map(|s| run(&fc.index_axis(Axis(3), s), partition, Some(s)))
            .collect()
    };

    Ok(gather(runs, partition.num_nets(), rows, tasks))
}

fn gather(runs: Vec<Run>, num_nets: usize, nodes: usize, tasks: usize) -> Deviation {
    let n = runs.len();
    let mut clustered_affinities = Array3::zeros((num_nets, num_nets, n));
    let mut node_affinities = Array3::zeros((nodes, num_nets, n));
    let mut preference_values = Array3::zeros((nodes, tasks, n));
    let mut preference_networks = Array3::zeros((nodes, tasks, n));
    let mut memberships = Array4::from_elem((nodes, tasks, num_nets, n), false);
    let mut shortfalls = Vec::new();

    for (s, run) in runs.into_iter().enumerate() {
        clustered_affinities
            .index_axis_mut(Axis(2), s)
            .assign(&run.clustered_affinities);
        node_affinities
            .index_axis_mut(Axis(2), s)
            .assign(&run.node_affinities);
        preference_values
            .index_axis_mut(Axis(2), s)
            .assign(&run.preference_values);
        preference_networks
            .index_axis_mut(Axis(2), s)
            .assign(&run.preference_networks);
        memberships
            .index_axis_mut(Axis(3), s)
            .assign(&run.memberships);
        shortfalls.extend(run.shortfalls);
    }

    let adherence = Array2::from_shape_fn((num_nets, n), |(network, s)| {
        clustered_affinities[[network, network, s]]
    });
    let deviation = adherence.mapv(|a| 1.0 - a);

    Deviation {
        deviation,
        adherence,
        clustered_affinities,
        node_affinities,
        preference_values,
        preference_networks,
        memberships,
        shortfalls,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::NetworkAffiliation;
    use ndarray::{array, Array4};

    fn partition(ids: Vec<usize>, num_nets: usize) -> Partition {
        Partition::from_affiliation(NetworkAffiliation::new(ids, num_nets).unwrap()).unwrap()
    }

    /// Two modules of two nodes, raw order interleaved so sorting matters.
    /// Node 0 (module 0) is pulled towards module 1 in task 1 only.
    fn interleaved() -> (Array4<f64>, Partition) {
        // acquisition order: a0 b0 a1 b1
        let rest = array![
            [1.0, 0.1, 0.9, 0.1],
            [0.1, 1.0, 0.1, 0.9],
            [0.9, 0.1, 1.0, 0.1],
            [0.1, 0.9, 0.1, 1.0]
        ];
        let mut pulled = rest.clone();
        for (i, j) in [(0, 1), (1, 0), (0, 3), (3, 0)] {
            pulled[[i, j]] = 0.95;
        }
        let mut fc = Array4::zeros((4, 4, 2, 1));
        fc.slice_mut(ndarray::s![.., .., 0, 0]).assign(&rest);
        fc.slice_mut(ndarray::s![.., .., 1, 0]).assign(&pulled);
        (fc, partition(vec![0, 1, 0, 1], 2))
    }

    #[test]
    fn test_memberships_and_affinities() {
        let prefs = array![[0, 1, 0, 0], [1, 1, 1, 1]];
        let m = memberships(&prefs.view(), 2);
        assert_eq!(m.dim(), (2, 4, 2));
        assert!(m[[0, 1, 1]] && !m[[0, 1, 0]]);

        let aff = node_affinities(&m.view());
        assert_eq!(aff, array![[0.75, 0.25], [0.0, 1.0]]);
        // affinity == sum of memberships over tasks / tasks
        for row in aff.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_per_subject_deviation() {
        let (fc, partition) = interleaved();
        let result = deviation(&fc.view(), &partition, DeviationOptions::default()).unwrap();

        // sorted order: a0 a1 b0 b1; a0 goes to module 1 in task 1
        assert_eq!(result.preference_networks[[0, 0, 0]], 0);
        assert_eq!(result.preference_networks[[0, 1, 0]], 1);
        assert_eq!(result.node_affinities[[0, 0, 0]], 0.5);

        // module 0 = mean over a0 (0.5) and a1 (1.0)
        assert!((result.clustered_affinities[[0, 0, 0]] - 0.75).abs() < 1e-12);
        assert!((result.deviation[[0, 0]] - 0.25).abs() < 1e-12);
        assert_eq!(result.deviation[[1, 0]], 0.0);
        assert!(result.shortfalls.is_empty());
    }

    #[test]
    fn test_mean_first_has_one_subject() {
        let (single, partition) = interleaved();
        let mut fc = Array4::zeros((4, 4, 2, 2));
        fc.index_axis_mut(Axis(3), 0).assign(&single.index_axis(Axis(3), 0));
        // second subject has no pull at all
        let rest = single.slice(ndarray::s![.., .., 0, 0]).to_owned();
        fc.slice_mut(ndarray::s![.., .., 0, 1]).assign(&rest);
        fc.slice_mut(ndarray::s![.., .., 1, 1]).assign(&rest);

        let options = DeviationOptions { mean_first: true };
        let result = deviation(&fc.view(), &partition, options).unwrap();
        assert_eq!(result.deviation.dim(), (2, 1));
        assert!(result.shortfalls.iter().all(|s| s.subject.is_none()));

        // averaged pull (0.95 + 0.1) / 2 stays below 0.9, so no deviation
        assert_eq!(result.deviation[[0, 0]], 0.0);

        let per_subject = deviation(&fc.view(), &partition, DeviationOptions::default()).unwrap();
        assert_eq!(per_subject.deviation.dim(), (2, 2));
        assert!((per_subject.deviation[[0, 0]] - 0.25).abs() < 1e-12);
        assert_eq!(per_subject.deviation[[0, 1]], 0.0);
    }

    #[test]
    fn test_singleton_network_adheres_to_itself() {
        let ids = [0, 0, 1];
        let fc = Array4::from_shape_fn((3, 3, 2, 2), |(i, j, _, _)| {
            if i == j {
                1.0
            } else if ids[i] == ids[j] {
                0.8
            } else {
                0.2
            }
        });
        let p = partition(ids.to_vec(), 2);

        let result = deviation(&fc.view(), &p, DeviationOptions::default()).unwrap();
        assert_eq!(result.deviation, Array2::<f64>::zeros((2, 2)));
        assert!(result.preference_networks.index_axis(Axis(0), 2).iter().all(|&n| n == 1));
        assert!(result.preference_values[[2, 0, 0]].is_nan());
        assert!(result.shortfalls.is_empty());

        let options = DeviationOptions { mean_first: true };
        let mean_first = deviation(&fc.view(), &p, options).unwrap();
        assert_eq!(mean_first.deviation, Array2::<f64>::zeros((2, 1)));
    }

    #[test]
    fn test_shortfall_is_reported_not_fatal() {
        let clustered = array![[0.5, 0.2], [0.0, 1.0]];
        let shortfalls = check_affinity_rows(&clustered.view(), Some(3));
        assert_eq!(
            shortfalls,
            vec![AffinityShortfall {
                network: 0,
                subject: Some(3),
                percent: 70.0
            }]
        );
        let ok = array![[0.9995, 0.0], [0.0, 1.0]];
        assert!(check_affinity_rows(&ok.view(), None).is_empty());
    }

    #[test]
    fn test_shape_errors() {
        let fc = Array4::<f64>::zeros((3, 3, 1, 1));
        let p = partition(vec![0, 1], 2);
        assert_eq!(
            deviation(&fc.view(), &p, DeviationOptions::default()).unwrap_err(),
            ConnectivityError::NodeMismatch {
                expected: 2,
                found: 3
            }
        );
        let empty = Array4::<f64>::zeros((2, 2, 0, 1));
        assert_eq!(
            deviation(&empty.view(), &p, DeviationOptions::default()).unwrap_err(),
            ConnectivityError::EmptyAxis { axis: "task" }
        );
    }
}
