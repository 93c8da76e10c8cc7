//! L0/L1 of the runtime: the [`Communicator`](communicator::Communicator) handle, the
//! [`TypeRegistry`](types::TypeRegistry) wire-descriptor cache, and the collective operations
//! built on top of both.

pub mod collectives;
pub mod communicator;
pub mod error;
pub mod types;

pub use collectives::ReduceOp;
pub use communicator::Communicator;
pub use error::MeshError;
pub use types::{FieldLayout, TypeRegistry, WireDescriptor, WireElement};
