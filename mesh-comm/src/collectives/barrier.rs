//! Blocks the calling rank until every rank in the group has entered. No data moves.
//!
//! Grounded on the teacher workspace's `MPCNet::broadcast` used degenerately with a unit
//! payload — a barrier is a broadcast-and-gather of nothing, so it is built directly on
//! [`super::primitives::gather_to_root`] and [`super::primitives::broadcast_from_root`].

use mesh_net::Channel;

use super::primitives::{broadcast_from_root, gather_to_root};
use crate::communicator::Communicator;
use crate::error::MeshError;

pub async fn barrier(comm: &Communicator) -> Result<(), MeshError> {
    if comm.size() == 1 {
        return Ok(());
    }
    let root = comm.root_rank();
    let empty: [u8; 0] = [];
    let _ = gather_to_root(comm, &empty, root, Channel::Collective).await?;
    let _ = broadcast_from_root(
        comm,
        if comm.rank() == root { Some(&empty) } else { None },
        root,
        Channel::Collective,
    )
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn single_rank_barrier_returns_immediately() {
        let comm = Communicator::single();
        barrier(&comm).await.unwrap();
    }

    #[tokio::test]
    async fn ring_barrier_releases_every_rank() {
        let mesh = mesh_net::LocalTestMesh::new(4).await.unwrap();
        mesh.run_all(|_rank, transport| async move {
            let comm = Communicator::new(std::sync::Arc::new(transport));
            barrier(&comm).await.unwrap();
        })
        .await;
    }
}
