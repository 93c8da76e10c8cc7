use thiserror::Error;

/// Errors surfaced by `LocalAdjacency` and `DistributedGraph` (§7).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GraphError {
    #[error("node already exists in this adjacency structure")]
    NodeExists,
    #[error("node is missing from this adjacency structure")]
    NodeMissing,
    #[error("edge already exists")]
    EdgeExists,
    #[error("destination buffer undersized: need at least {need}, got {got}")]
    Undersized { need: usize, got: usize },
    #[error("graph is already finalized")]
    AlreadyFinalized,
    #[error("graph has not been finalized")]
    UnfinalisedGraph,
    #[error("ghost node {node} was claimed by {claimants} owning ranks (expected exactly one)")]
    OwnershipMismatch { node: String, claimants: usize },
    #[error("collective or transport error: {0}")]
    Comm(#[from] mesh_comm::MeshError),
    #[error("destination rank is absent from this call's participants")]
    NodeMissingDestination,
}
