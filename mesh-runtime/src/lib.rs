//! Facade crate tying `mesh-comm`, `mesh-graph`, `mesh-exchange` and `mesh-partition` together
//! behind one configuration surface (§10.4), plus the `mesh-demo` binary under `demos/` that
//! exercises a finalise-partition-exchange cycle end to end.

pub mod config;
pub mod error;
pub mod facade;

pub use config::{ExchangeStrategy, MeshConfig, MeshConfigBuilder, PartitionerKind};
pub use error::RuntimeError;
pub use facade::{AnyExchange, AnyPartitioner};

pub use mesh_comm::{Communicator, MeshError, ReduceOp, WireElement};
pub use mesh_exchange::{ExchangeError, ExchangeId, ExchangePlan, OneSidedExchange, TwoSidedExchange};
pub use mesh_graph::{DistributedGraph, ExchangeCsr, GlobalId, GraphError, NodeClass};
pub use mesh_net::{Channel, TcpMesh};
pub use mesh_partition::{
    DistributedPartitioner, MetisPartitioner, NaivePartitioner, Partitioner, PartitionerConfig,
    PartitionerError,
};
