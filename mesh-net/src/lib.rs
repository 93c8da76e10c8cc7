//! The transport layer the mesh/graph runtime's `Communicator` wraps.
//!
//! This is the "message-passing primitives" collaborator that the rest of the workspace treats
//! as external (see the parent crate's design notes): point-to-point send/recv between ranks of a
//! process group, plus a loopback test harness for driving many ranks inside one process.

pub mod local;
pub mod tcp;

use async_trait::async_trait;
use auto_impl::auto_impl;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::bytes::Bytes;

pub use local::LocalTestMesh;
pub use tcp::{TcpMesh, TcpPeer};

/// A channel identifier used to keep logically distinct exchanges from interleaving on the same
/// pair of ranks (collectives, graph finalisation and exchange patterns each claim one).
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Channel {
    Collective = 0,
    Finalize = 1,
    Exchange = 2,
}

pub const CHANNEL_COUNT: usize = 3;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MeshNetError {
    #[error("transport error: {0}")]
    Generic(String),
    #[error("rank {rank} is not a member of this transport's process group")]
    UnknownRank { rank: u32 },
    #[error("transport is not connected to all peers yet")]
    NotConnected,
    #[error("peer {rank} closed its stream unexpectedly")]
    PeerClosed { rank: u32 },
    #[error("bad input: {0}")]
    BadInput(&'static str),
}

impl From<std::io::Error> for MeshNetError {
    fn from(e: std::io::Error) -> Self {
        MeshNetError::Generic(e.to_string())
    }
}

/// The minimal point-to-point contract `mesh-comm`'s collectives are built on top of.
///
/// Implementors represent one rank's view of an already-connected process group: `n_parties` and
/// `party_id` never change after construction, and `send_to`/`recv_from` may be called
/// concurrently from different logical channels (see [`Channel`]) without interfering with each
/// other.
#[async_trait]
#[auto_impl(&, &mut, Arc)]
pub trait Transport: Send + Sync {
    fn n_parties(&self) -> usize;
    fn party_id(&self) -> u32;
    fn is_root(&self) -> bool {
        self.party_id() == 0
    }

    /// Cumulative (bytes sent, bytes received) since construction. Diagnostic only.
    fn byte_counts(&self) -> (usize, usize);
    fn add_byte_counts(&self, sent: usize, received: usize);

    async fn send_to(&self, rank: u32, bytes: Bytes, ch: Channel) -> Result<(), MeshNetError>;
    async fn recv_from(&self, rank: u32, ch: Channel) -> Result<Bytes, MeshNetError>;
}
