pub mod distributed;
pub mod error;
pub mod local_adjacency;

pub use distributed::{DistributedGraph, ExchangeCsr, GlobalId, NodeClass};
pub use error::GraphError;
pub use local_adjacency::{LocalAdjacency, LocalIndex};
pub use mesh_comm::WireElement;
