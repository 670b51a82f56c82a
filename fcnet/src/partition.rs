//! The partition of nodes into networks.
//!
//! A partition is described three ways, and the three must agree:
//! - a [`NetworkAffiliation`], one (zero-indexed) network id per node in
//!   acquisition order,
//! - a [`NodeOrder`] which sorts nodes into contiguous network blocks,
//! - [`PartitionBoundaries`], the `{start, end, size}` of each block once
//!   sorted.
//!
//! Network ids are zero-indexed everywhere in this crate. Files written
//! for the MATLAB-era toolboxes number networks from one, so conversion is
//! done once with [`NetworkAffiliation::from_one_indexed`] and
//! [`NetworkAffiliation::to_one_indexed`].

use std::ops::Range;

use itertools::Itertools;
use thiserror::Error;

use crate::order::NodeOrder;

/// Errors raised when a partition breaks one of its invariants.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PartitionError {
    #[error("Network {network} has no member nodes.")]
    EmptyNetwork { network: usize },
    #[error("Node {node} is assigned network {network}, but there are only {num_nets} networks.")]
    NetworkOutOfRange {
        node: usize,
        network: usize,
        num_nets: usize,
    },
    #[error("Node {node} has network id 0 in a one-indexed affiliation vector.")]
    ZeroNetworkId { node: usize },
    #[error("Network {network} does not start where the previous network ended.")]
    NotContiguous { network: usize },
    #[error("Network {network} has start {start}, end {end} but size {size}.")]
    BadSize {
        network: usize,
        start: usize,
        end: usize,
        size: usize,
    },
    #[error("Boundaries cover {covered} nodes, expected {nodes}.")]
    Coverage { covered: usize, nodes: usize },
    #[error("Node order is not a permutation.")]
    InvalidOrder,
    #[error("Node order has {order} entries but there are {nodes} nodes.")]
    OrderLength { order: usize, nodes: usize },
    #[error("Node order does not sort the affiliation vector into contiguous networks.")]
    UnsortedOrder,
    #[error("A partition needs at least one node.")]
    NoNodes,
}

/// The network each node belongs to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkAffiliation {
    ids: Vec<usize>,
    num_nets: usize,
}

impl NetworkAffiliation {
    /// Create an affiliation from zero-indexed ids. Every id in
    /// `0..num_nets` must be used at least once.
    pub fn new(ids: Vec<usize>, num_nets: usize) -> Result<Self, PartitionError> {
        if ids.is_empty() {
            return Err(PartitionError::NoNodes);
        }
        let mut counts = vec![0usize; num_nets];
        for (node, &network) in ids.iter().enumerate() {
            if network >= num_nets {
                return Err(PartitionError::NetworkOutOfRange {
                    node,
                    network,
                    num_nets,
                });
            }
            counts[network] += 1;
        }
        if let Some(network) = counts.iter().position(|&c| c == 0) {
            return Err(PartitionError::EmptyNetwork { network });
        }
        Ok(NetworkAffiliation { ids, num_nets })
    }

    /// Convert a one-indexed affiliation vector (networks numbered from 1,
    /// as in the Brain Connectivity Toolbox). The number of networks is the
    /// largest id.
    pub fn from_one_indexed(ids: &[usize]) -> Result<Self, PartitionError> {
        let zero_indexed = ids
            .iter()
            .enumerate()
            .map(|(node, &id)| {
                id.checked_sub(1)
                    .ok_or(PartitionError::ZeroNetworkId { node })
            })
            .collect::<Result<Vec<usize>, _>>()?;
        let num_nets = zero_indexed.iter().max().map_or(0, |m| m + 1);
        Self::new(zero_indexed, num_nets)
    }

    pub fn to_one_indexed(&self) -> Vec<usize> {
        self.ids.iter().map(|id| id + 1).collect()
    }

    pub fn ids(&self) -> &[usize] {
        &self.ids
    }

    pub fn num_nets(&self) -> usize {
        self.num_nets
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Nodes belonging to `network`, ascending.
    pub fn members(&self, network: usize) -> impl Iterator<Item = usize> + '_ {
        self.ids.iter().positions(move |&id| id == network)
    }
}

/// One contiguous block of sorted nodes. `end` is inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NetworkRange {
    pub start: usize,
    pub end: usize,
    pub size: usize,
}

impl NetworkRange {
    /// The half-open range for slicing.
    pub fn nodes(&self) -> Range<usize> {
        self.start..self.end + 1
    }
}

/// The ranges of each network in partition order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartitionBoundaries(Vec<NetworkRange>);

impl PartitionBoundaries {
    /// Validate boundaries supplied from elsewhere (e.g. a boundaries file).
    pub fn from_ranges(ranges: Vec<NetworkRange>, nodes: usize) -> Result<Self, PartitionError> {
        let mut expected_start = 0;
        for (network, range) in ranges.iter().enumerate() {
            if range.end < range.start || range.size != range.end - range.start + 1 {
                return Err(PartitionError::BadSize {
                    network,
                    start: range.start,
                    end: range.end,
                    size: range.size,
                });
            }
            if range.start != expected_start {
                return Err(PartitionError::NotContiguous { network });
            }
            expected_start = range.end + 1;
        }
        if expected_start != nodes {
            return Err(PartitionError::Coverage {
                covered: expected_start,
                nodes,
            });
        }
        Ok(PartitionBoundaries(ranges))
    }

    /// Rebuild ranges from network ids that are already in partition order
    /// (non-decreasing). Fails if any network in `0..num_nets` is empty.
    pub fn from_sorted_ids(sorted: &[usize], num_nets: usize) -> Result<Self, PartitionError> {
        if sorted.is_empty() {
            return Err(PartitionError::NoNodes);
        }
        if sorted.iter().tuple_windows().any(|(a, b)| a > b) {
            return Err(PartitionError::UnsortedOrder);
        }
        let mut ranges = Vec::with_capacity(num_nets);
        let mut runs = sorted.iter().dedup_with_count().peekable();
        let mut start = 0;
        for network in 0..num_nets {
            match runs.peek() {
                Some(&(size, &id)) if id == network => {
                    ranges.push(NetworkRange {
                        start,
                        end: start + size - 1,
                        size,
                    });
                    start += size;
                    runs.next();
                }
                Some(&(_, &id)) if id >= num_nets => {
                    return Err(PartitionError::NetworkOutOfRange {
                        node: start,
                        network: id,
                        num_nets,
                    })
                }
                _ => return Err(PartitionError::EmptyNetwork { network }),
            }
        }
        if let Some((_, &id)) = runs.next() {
            return Err(PartitionError::NetworkOutOfRange {
                node: start,
                network: id,
                num_nets,
            });
        }
        Ok(PartitionBoundaries(ranges))
    }

    pub fn num_nets(&self) -> usize {
        self.0.len()
    }

    pub fn num_nodes(&self) -> usize {
        self.0.last().map_or(0, |r| r.end + 1)
    }

    pub fn range(&self, network: usize) -> NetworkRange {
        self.0[network]
    }

    pub fn iter(&self) -> impl Iterator<Item = &NetworkRange> {
        self.0.iter()
    }

    /// The network id of every sorted node.
    pub fn sorted_ids(&self) -> Vec<usize> {
        self.0
            .iter()
            .enumerate()
            .flat_map(|(network, range)| std::iter::repeat(network).take(range.size))
            .collect()
    }
}

/// An affiliation together with the order and boundaries derived from it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Partition {
    affiliation: NetworkAffiliation,
    order: NodeOrder,
    boundaries: PartitionBoundaries,
}

impl Partition {
    /// Sort nodes by network id (stable, so nodes within a network keep
    /// their acquisition order) and record the run of each network.
    pub fn from_affiliation(affiliation: NetworkAffiliation) -> Result<Self, PartitionError> {
        let order = NodeOrder::sort_by_key(affiliation.ids());
        Self::new(affiliation, order)
    }

    /// Use a caller supplied order, checking it sorts the affiliation.
    pub fn new(affiliation: NetworkAffiliation, order: NodeOrder) -> Result<Self, PartitionError> {
        if order.len() != affiliation.len() {
            return Err(PartitionError::OrderLength {
                order: order.len(),
                nodes: affiliation.len(),
            });
        }
        let sorted: Vec<usize> = order
            .indices()
            .iter()
            .map(|&i| affiliation.ids()[i])
            .collect();
        let boundaries = PartitionBoundaries::from_sorted_ids(&sorted, affiliation.num_nets())?;
        Ok(Partition {
            affiliation,
            order,
            boundaries,
        })
    }

    /// Pair an order with externally supplied boundaries; the affiliation
    /// is derived from the boundaries.
    pub fn from_boundaries(
        boundaries: PartitionBoundaries,
        order: NodeOrder,
    ) -> Result<Self, PartitionError> {
        if order.len() != boundaries.num_nodes() {
            return Err(PartitionError::OrderLength {
                order: order.len(),
                nodes: boundaries.num_nodes(),
            });
        }
        let mut ids = vec![0; order.len()];
        for (sorted, network) in boundaries.sorted_ids().into_iter().enumerate() {
            ids[order.indices()[sorted]] = network;
        }
        let affiliation = NetworkAffiliation::new(ids, boundaries.num_nets())?;
        Ok(Partition {
            affiliation,
            order,
            boundaries,
        })
    }

    pub fn affiliation(&self) -> &NetworkAffiliation {
        &self.affiliation
    }

    pub fn order(&self) -> &NodeOrder {
        &self.order
    }

    pub fn boundaries(&self) -> &PartitionBoundaries {
        &self.boundaries
    }

    pub fn num_nets(&self) -> usize {
        self.affiliation.num_nets()
    }

    pub fn num_nodes(&self) -> usize {
        self.affiliation.len()
    }

    /// The affiliation of the nodes in partition order. This is what the
    /// metric formulas expect alongside a sorted matrix.
    pub fn sorted_affiliation(&self) -> NetworkAffiliation {
        NetworkAffiliation {
            ids: self.boundaries.sorted_ids(),
            num_nets: self.num_nets(),
        }
    }
}
