//! Empirical adjustment of an a-priori partition from resting-state data.
//!
//! Each subject's resting-state connectivity votes, per node, for the
//! network the node connects to most strongly (averaging correlations with
//! the Fisher z-transform). Where at least half of the subjects agree, the
//! node is moved to the network they voted for; otherwise it keeps its
//! original assignment. The result is a new partition which can be handed
//! straight to [`deviation`](crate::deviation::deviation) or
//! [`gvc_by_network`](crate::gvc::gvc_by_network).
//!
//! Based on the "empirically adjusted CAB-NP" in Cocuzza et al. (2020).

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, ArrayView3, Axis};
use rayon::prelude::*;

use crate::cluster::{cluster_nodes, Averaging};
use crate::connectivity::{check_axis, check_square, without_diagonal, ConnectivityError};
use crate::order::NodeOrder;
use crate::partition::{NetworkAffiliation, Partition};
use crate::preference::preferences;

/// Fraction of subjects which must agree before a node is moved.
pub const QUORUM: f64 = 0.5;

/// The adjusted partition and the votes behind it.
///
/// Node axes are in the order of the *original* partition.
#[derive(Debug, Clone)]
pub struct ConsensusPartition {
    /// The adjusted partition; its node order applies to acquisition order
    /// matrices directly.
    pub partition: Partition,
    /// The adjustment alone: applies to matrices already sorted by the
    /// original partition.
    pub relative_order: NodeOrder,
    /// node x subject; each subject's preferred network.
    pub preferences: Array2<usize>,
    /// Fraction of subjects voting for the modal network.
    pub percent_agree: Array1<f64>,
    /// Most common preferred network per node (ties to the lowest id).
    pub modal_networks: Array1<usize>,
    /// The network each node ends up in.
    pub adjusted_ids: Array1<usize>,
}

/// The most common value in `votes` and how often it occurs. Ties go to the
/// lowest network id.
pub fn modal_vote(votes: &ArrayView1<usize>, num_nets: usize) -> (usize, usize) {
    let mut counts = vec![0usize; num_nets];
    for &v in votes {
        counts[v] += 1;
    }
    counts
        .iter()
        .enumerate()
        .fold((0, 0), |(best, best_count), (network, &count)| {
            if count > best_count {
                (network, count)
            } else {
                (best, best_count)
            }
        })
}

/// Preferred network of every (sorted) node for every subject, node x
/// subject. `rest_fc` is node x node x subject in acquisition order.
pub fn rest_preferences(
    rest_fc: &ArrayView3<f64>,
    partition: &Partition,
) -> Result<Array2<usize>, ConnectivityError> {
    let (rows, cols, subjects) = rest_fc.dim();
    check_square(rows, cols, partition.num_nodes())?;
    check_axis(subjects, "subject")?;

    let own = partition.boundaries().sorted_ids();
    let votes: Vec<Array1<usize>> = (0..subjects)
        .into_par_iter()
        .map(|s| {
            let sorted = partition
                .order()
                .sort_matrix(&rest_fc.index_axis(Axis(2), s));
            let masked = without_diagonal(&sorted.view(), f64::NAN);
            let clustered = cluster_nodes(&masked.view(), partition.boundaries(), Averaging::FisherZ);
            preferences(&clustered.view(), &own).1
        })
        .collect();

    let mut out = Array2::zeros((rows, subjects));
    for (s, v) in votes.iter().enumerate() {
        out.column_mut(s).assign(v);
    }
    Ok(out)
}

/// Apply the quorum rule to node x subject votes.
///
/// Returns `(modal networks, percent agree, adjusted ids)`; `original` is
/// the network of each node before adjustment.
pub fn vote(
    original: &[usize],
    preferences: &ArrayView2<usize>,
    num_nets: usize,
) -> (Array1<usize>, Array1<f64>, Array1<usize>) {
    let subjects = preferences.ncols() as f64;
    let mut modal = Array1::zeros(original.len());
    let mut agree = Array1::zeros(original.len());
    let mut adjusted = Array1::zeros(original.len());
    for (node, votes) in preferences.axis_iter(Axis(0)).enumerate() {
        let (mode, count) = modal_vote(&votes, num_nets);
        modal[node] = mode;
        agree[node] = count as f64 / subjects;
        adjusted[node] = if agree[node] < QUORUM {
            original[node]
        } else {
            mode
        };
    }
    (modal, agree, adjusted)
}

/// Adjust `partition` to match resting-state connectivity.
///
/// `rest_fc` is node x node x subject, in acquisition order. Fails with
/// [`PartitionError::EmptyNetwork`](crate::partition::PartitionError) if
/// the adjustment leaves a network with no nodes.
pub fn adjust_partition(
    rest_fc: &ArrayView3<f64>,
    partition: &Partition,
) -> Result<ConsensusPartition, ConnectivityError> {
    let num_nets = partition.num_nets();
    let preferences = rest_preferences(rest_fc, partition)?;

    let original = partition.boundaries().sorted_ids();
    let (modal_networks, percent_agree, adjusted_ids) =
        vote(&original, &preferences.view(), num_nets);

    let moved = adjusted_ids
        .iter()
        .zip(&original)
        .filter(|(a, o)| a != o)
        .count();
    tracing::debug!(moved, "nodes reassigned by resting-state consensus");

    let relative_order = NodeOrder::sort_by_key(&adjusted_ids.to_vec());

    // adjusted ids back in acquisition order
    let mut raw_ids = vec![0; adjusted_ids.len()];
    for (sorted, &raw) in partition.order().indices().iter().enumerate() {
        raw_ids[raw] = adjusted_ids[sorted];
    }
    let affiliation = NetworkAffiliation::new(raw_ids, num_nets)?;
    let adjusted = Partition::new(affiliation, partition.order().then(&relative_order))?;

    Ok(ConsensusPartition {
        partition: adjusted,
        relative_order,
        preferences,
        percent_agree,
        modal_networks,
        adjusted_ids,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::PartitionError;
    use ndarray::{array, Array3};

    #[test]
    fn test_modal_vote_ties_to_lowest() {
        assert_eq!(modal_vote(&array![2, 1, 2, 1].view(), 3), (1, 2));
        assert_eq!(modal_vote(&array![2, 2, 0].view(), 3), (2, 2));
    }

    #[test]
    fn test_quorum_rule() {
        // four subjects
        let prefs = array![
            [1, 1, 0, 2], // 50% for 1: moves
            [0, 1, 2, 2], // 50% for 2: moves
            [0, 1, 2, 1], // 50% for 1: moves
            [2, 0, 1, 1], // 50% for 1: moves
            [0, 1, 2, 0], // 50% for 0: moves
        ];
        let original = [0, 0, 1, 1, 2];
        let (modal, agree, adjusted) = vote(&original, &prefs.view(), 3);
        assert_eq!(modal, array![1, 2, 1, 1, 0]);
        assert_eq!(agree, array![0.5, 0.5, 0.5, 0.5, 0.5]);
        assert_eq!(adjusted, array![1, 2, 1, 1, 0]);

        let split = array![[0, 1, 2]];
        let (_, agree, adjusted) = vote(&[2], &split.view(), 3);
        assert!(agree[0] < QUORUM);
        assert_eq!(adjusted, array![2]);
    }

    /// Two modules of three nodes in acquisition order, with node 2 wired
    /// into module 1 although the partition puts it in module 0.
    fn mislabelled(subjects: usize) -> (Array3<f64>, Partition) {
        let truth = [0, 0, 1, 1, 1, 1];
        let mut fc = Array3::zeros((6, 6, subjects));
        for s in 0..subjects {
            for i in 0..6 {
                for j in 0..6 {
                    fc[[i, j, s]] = if i == j {
                        1.0
                    } else if truth[i] == truth[j] {
                        0.6 + 0.01 * s as f64
                    } else {
                        0.1
                    };
                }
            }
        }
        let affiliation = NetworkAffiliation::new(vec![0, 0, 0, 1, 1, 1], 2).unwrap();
        (fc, Partition::from_affiliation(affiliation).unwrap())
    }

    #[test]
    fn test_adjust_moves_mislabelled_node() {
        let (fc, partition) = mislabelled(3);
        let consensus = adjust_partition(&fc.view(), &partition).unwrap();

        assert_eq!(consensus.adjusted_ids, array![0, 0, 1, 1, 1, 1]);
        assert_eq!(consensus.percent_agree, Array1::from_elem(6, 1.0));
        assert_eq!(consensus.partition.affiliation().ids(), &[0, 0, 1, 1, 1, 1]);
        assert_eq!(consensus.partition.boundaries().range(1).size, 4);
        assert_eq!(consensus.preferences.dim(), (6, 3));
    }

    #[test]
    fn test_adjust_keeps_singleton_network() {
        let ids = [0, 0, 1];
        let fc = Array3::from_shape_fn((3, 3, 2), |(i, j, _)| {
            if i == j {
                1.0
            } else if ids[i] == ids[j] {
                0.8
            } else {
                0.2
            }
        });
        let affiliation = NetworkAffiliation::new(ids.to_vec(), 2).unwrap();
        let partition = Partition::from_affiliation(affiliation).unwrap();

        let consensus = adjust_partition(&fc.view(), &partition).unwrap();
        assert_eq!(consensus.adjusted_ids, array![0, 0, 1]);
        assert_eq!(consensus.modal_networks, array![0, 0, 1]);
        assert_eq!(consensus.partition.affiliation(), partition.affiliation());
        assert_eq!(consensus.percent_agree, Array1::from_elem(3, 1.0));
    }

    #[test]
    fn test_adjust_rejects_empty_network() {
        // everything wired into one block: module 1 empties out
        let mut fc = Array3::from_elem((4, 4, 1), 0.5);
        for i in 0..4 {
            fc[[i, i, 0]] = 1.0;
        }
        fc[[0, 1, 0]] = 0.9;
        fc[[1, 0, 0]] = 0.9;
        fc[[2, 3, 0]] = 0.1;
        fc[[3, 2, 0]] = 0.1;
        let affiliation = NetworkAffiliation::new(vec![0, 0, 1, 1], 2).unwrap();
        let partition = Partition::from_affiliation(affiliation).unwrap();
        assert_eq!(
            adjust_partition(&fc.view(), &partition).unwrap_err(),
            ConnectivityError::Partition(PartitionError::EmptyNetwork { network: 1 })
        );
    }
}
