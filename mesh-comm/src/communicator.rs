use std::sync::Arc;

use mesh_net::{Channel, Transport};

use crate::types::TypeRegistry;

/// L0: wraps a process group — size, rank, root rank, and the shared transport handle.
///
/// A default [`Communicator`] (via [`Communicator::single`]) represents a single-process group,
/// useful for unit tests of higher layers that don't want to stand up a [`mesh_net::LocalTestMesh`].
///
/// Cloning a `Communicator` duplicates the logical reference (bumps the `Arc` refcount onto the
/// same transport) rather than aliasing a raw handle — see the parent crate's design notes on
/// communicator duplication semantics.
#[derive(Clone)]
pub struct Communicator {
    transport: Arc<dyn Transport>,
    registry: Arc<TypeRegistry>,
    root: u32,
}

impl Communicator {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            registry: Arc::new(TypeRegistry::new()),
            root: 0,
        }
    }

    pub fn with_root(transport: Arc<dyn Transport>, root: u32) -> Self {
        Self {
            transport,
            registry: Arc::new(TypeRegistry::new()),
            root,
        }
    }

    /// Shares this communicator's transport and root rank with a caller-supplied type
    /// registry, rather than the default one populated with only the built-in primitives.
    pub fn with_registry(mut self, registry: Arc<TypeRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// A degenerate single-rank group, for testing collective-free code paths.
    pub fn single() -> Self {
        Self::new(Arc::new(SingleProcessTransport))
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// A cheap clone of this communicator (same transport and registry) with a different root
    /// rank — used by callers that need to rotate the root across a sequence of collectives
    /// (e.g. ghost-ownership discovery's per-rank broadcast rounds).
    pub fn with_rotated_root(&self, root: u32) -> Self {
        Self {
            transport: self.transport.clone(),
            registry: self.registry.clone(),
            root,
        }
    }

    pub fn size(&self) -> usize {
        self.transport.n_parties()
    }

    pub fn rank(&self) -> u32 {
        self.transport.party_id()
    }

    pub fn root_rank(&self) -> u32 {
        self.root
    }

    pub fn is_root(&self) -> bool {
        self.rank() == self.root
    }

    pub fn bytes_sent(&self) -> usize {
        self.transport.byte_counts().0
    }

    pub fn bytes_received(&self) -> usize {
        self.transport.byte_counts().1
    }

    pub(crate) fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Point-to-point send on a specific logical channel. Exposed beyond this crate so that
    /// higher layers (e.g. neighbour-exchange patterns) can drive non-blocking per-neighbour
    /// transfers on their own dedicated channel instead of going through a collective.
    pub async fn send_bytes(
        &self,
        rank: u32,
        bytes: tokio_util::bytes::Bytes,
        ch: Channel,
    ) -> Result<(), mesh_net::MeshNetError> {
        self.transport.send_to(rank, bytes, ch).await
    }

    /// Point-to-point receive on a specific logical channel. See [`Communicator::send_bytes`].
    pub async fn recv_bytes(
        &self,
        rank: u32,
        ch: Channel,
    ) -> Result<tokio_util::bytes::Bytes, mesh_net::MeshNetError> {
        self.transport.recv_from(rank, ch).await
    }
}

/// The transport behind [`Communicator::single`]. Every operation on it is unreachable in
/// practice because a single-rank group never needs to talk to a peer; collectives short-circuit
/// on `size() == 1` before ever calling into it.
struct SingleProcessTransport;

#[async_trait::async_trait]
impl Transport for SingleProcessTransport {
    fn n_parties(&self) -> usize {
        1
    }
    fn party_id(&self) -> u32 {
        0
    }
    fn byte_counts(&self) -> (usize, usize) {
        (0, 0)
    }
    fn add_byte_counts(&self, _sent: usize, _received: usize) {}
    async fn send_to(
        &self,
        _rank: u32,
        _bytes: tokio_util::bytes::Bytes,
        _ch: Channel,
    ) -> Result<(), mesh_net::MeshNetError> {
        unreachable!("single-process Communicator never sends")
    }
    async fn recv_from(
        &self,
        _rank: u32,
        _ch: Channel,
    ) -> Result<tokio_util::bytes::Bytes, mesh_net::MeshNetError> {
        unreachable!("single-process Communicator never receives")
    }
}
