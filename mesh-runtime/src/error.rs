use thiserror::Error;

/// Errors surfaced by configuration loading and the demo binary; the library crates underneath
/// keep their own error types rather than folding everything into one enum (§7's propagation
/// policy applies per-crate), so this one mostly just threads those through.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("failed to read host file: {0}")]
    Io(#[from] std::io::Error),
    #[error("bad host-file entry {0:?}: not a valid host:port address")]
    BadHostFile(String),
    #[error("graph error: {0}")]
    Graph(#[from] mesh_graph::GraphError),
    #[error("exchange error: {0}")]
    Exchange(#[from] mesh_exchange::ExchangeError),
    #[error("partitioner error: {0}")]
    Partitioner(#[from] mesh_partition::PartitionerError),
    #[error("transport error: {0}")]
    Net(#[from] mesh_net::MeshNetError),
}
