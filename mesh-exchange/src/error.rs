use thiserror::Error;

/// Errors surfaced by `ExchangePlan` construction and the two exchange variants (§7).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExchangeError {
    #[error("exchange ID {0} appears more than once in localToExchange")]
    DuplicateExchangeId(u64),
    #[error("index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("localToExchange must not be empty")]
    NullInput,
    #[error("collective or transport error: {0}")]
    Comm(#[from] mesh_comm::MeshError),
    #[error("graph error: {0}")]
    Graph(#[from] mesh_graph::GraphError),
    #[error("start() called again before a preceding stop()")]
    ExchangeInFlight,
    #[error("stop() called with no exchange in flight")]
    NoExchangeInFlight,
}
