use thiserror::Error;

/// Failure modes surfaced by every `Partitioner` back-end (§4.7).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PartitionerError {
    #[error("partition() called before initialise() set a part count")]
    PartsUnset,
    #[error("bad number of balancing constraints: {0}")]
    BadNCon(usize),
    #[error("communicator has {ranks} ranks, fewer than the {parts} requested parts")]
    UnderSizedCommunicator { ranks: usize, parts: usize },
    #[error("assignRankNodes() called before partition()")]
    NotPartitioned,
    #[error("partitioning backend failed: {0}")]
    BackendError(String),
    #[error("graph error: {0}")]
    Graph(#[from] mesh_graph::GraphError),
    #[error("collective or transport error: {0}")]
    Comm(#[from] mesh_comm::MeshError),
}
