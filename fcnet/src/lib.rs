//! `fcnet` computes network partition metrics on brain functional
//! connectivity matrices: how well each node sits within the network a
//! partition assigns it to, and how it links the others.
//!
//! Connectivity is held in plain `ndarray` arrays indexed
//! `[node, node, task, subject]`, in acquisition order. A [`Partition`]
//! carries the node order which sorts nodes into network blocks.

/// Partitions of nodes into networks, and their errors.
pub mod partition;
pub use partition::{
    NetworkAffiliation, NetworkRange, Partition, PartitionBoundaries, PartitionError,
};

/// Permutations that sort nodes into network blocks.
pub mod order;
pub use order::NodeOrder;

/// Shape checks, diagonal masking and NaN-aware reductions.
pub mod connectivity;
pub use connectivity::{ConnectivityError, Sign};

/// Averaging node x node connectivity down to node x network.
pub mod cluster;
pub use cluster::Averaging;

/// The network each node connects to most strongly.
pub mod preference;

/// Network partition deviation and adherence, across task conditions
/// and subjects.
pub mod deviation;
pub use deviation::{deviation, Deviation, DeviationOptions};

/// Resting-state consensus adjustment of a partition.
pub mod consensus;
pub use consensus::{adjust_partition, ConsensusPartition};

/// Node centralities for the gateway coefficient.
pub mod centrality;
pub use centrality::{Betweenness, Centrality, NodeStrength};

pub mod participation;
pub use participation::participation_coefficient;

pub mod gateway;
pub use gateway::gateway_coefficient;

pub mod diversity;
pub use diversity::diversity_coefficient;

/// Global variability coefficient.
pub mod gvc;
pub use gvc::{gvc, gvc_by_network, NetworkGvc};

/// Reading matrices and affiliations from delimited text.
pub mod dsv;
pub use dsv::ReadDsvError;
