//! L1: Collectives. Every function here takes a [`Communicator`](crate::communicator::Communicator)
//! and a payload element type `T: WireElement`, and fails with `EmptyPayload` when a buffer is
//! empty, `SizeMismatch` when buffer sizes disagree with the group size or with each other,
//! `UnregisteredType` when `T` has no descriptor, or `TransportError` when the message layer
//! fails.
//!
//! `primitives` holds the point-to-point building blocks every collective below is assembled
//! from; it is not part of the public surface.

mod primitives;
pub mod wire;

pub mod alltoall;
pub mod barrier;
pub mod broadcast;
pub mod gather;
pub mod reduce;
pub mod scatter;

pub use alltoall::{all_to_all, all_to_all_displaced, all_to_all_tagged, all_to_all_varying};
pub use barrier::barrier;
pub use broadcast::{broadcast, broadcast_into, broadcast_unsized};
pub use gather::{all_gather, all_gather_varying, gather, gather_unsized, gather_varying};
pub use reduce::{all_reduce, reduce, ReduceOp, Reducible};
pub use scatter::{scatter, scatter_tagged, scatter_varying};
