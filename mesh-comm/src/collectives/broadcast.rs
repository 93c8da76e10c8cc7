//! §4.3 Broadcast: same-buffer, separate-buffers, and unknown-size variants.

use mesh_net::Channel;

use super::primitives::broadcast_from_root;
use crate::communicator::Communicator;
use crate::error::MeshError;
use crate::types::WireElement;

/// Same-buffer broadcast: root's buffer of `n` elements is replicated to every rank.
pub async fn broadcast<T: WireElement>(comm: &Communicator, buf: &[T]) -> Result<Vec<T>, MeshError> {
    if comm.is_root() && buf.is_empty() {
        return Err(MeshError::EmptyPayload);
    }
    if comm.size() == 1 {
        return Ok(buf.to_vec());
    }
    let root = comm.root_rank();
    let data = if comm.is_root() { Some(buf) } else { None };
    broadcast_from_root(comm, data, root, Channel::Collective).await
}

/// Separate-buffers broadcast: root's send buffer of `n_s` elements is copied into every
/// rank's receive buffer, which the caller must have sized `n_r >= n_s`. `recv_capacity` is
/// ignored on the root rank's own copy (root's send buffer becomes its receive buffer).
pub async fn broadcast_into<T: WireElement>(
    comm: &Communicator,
    send_buf: Option<&[T]>,
    recv_capacity: usize,
) -> Result<Vec<T>, MeshError> {
    let root = comm.root_rank();
    if comm.is_root() {
        let buf = send_buf.ok_or(MeshError::NotRoot)?;
        if buf.is_empty() {
            return Err(MeshError::EmptyPayload);
        }
        if buf.len() > recv_capacity {
            return Err(MeshError::SizeMismatch {
                detail: format!(
                    "broadcast_into: send buffer of {} exceeds receive capacity {}",
                    buf.len(),
                    recv_capacity
                ),
            });
        }
    }
    if comm.size() == 1 {
        return Ok(send_buf.ok_or(MeshError::NotRoot)?.to_vec());
    }
    broadcast_from_root(comm, send_buf, root, Channel::Collective).await
}

/// Unknown-size broadcast: root broadcasts its element count first, then the data itself.
/// Non-root ranks allocate their receive buffer from the announced count.
pub async fn broadcast_unsized<T: WireElement>(
    comm: &Communicator,
    send_buf: Option<&[T]>,
) -> Result<Vec<T>, MeshError> {
    if comm.size() == 1 {
        return Ok(send_buf.ok_or(MeshError::NotRoot)?.to_vec());
    }
    let root = comm.root_rank();
    let count = if comm.is_root() {
        let buf = send_buf.ok_or(MeshError::NotRoot)?;
        if buf.is_empty() {
            return Err(MeshError::EmptyPayload);
        }
        Some(vec![buf.len() as u64])
    } else {
        None
    };
    let counts = broadcast_from_root(comm, count.as_deref(), root, Channel::Collective).await?;
    if counts[0] == 0 {
        return Err(MeshError::EmptyPayload);
    }
    broadcast_from_root(comm, send_buf, root, Channel::Collective).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn single_rank_broadcast_is_identity() {
        let comm = Communicator::single();
        let out = broadcast(&comm, &[1u32, 2, 3]).await.unwrap();
        assert_eq!(out, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn every_rank_receives_roots_buffer() {
        let mesh = mesh_net::LocalTestMesh::new(3).await.unwrap();
        let results = mesh
            .run_all(|rank, transport| async move {
                let comm = Communicator::new(Arc::new(transport));
                let data = if rank == 0 { Some(vec![10u32, 20, 30]) } else { None };
                broadcast(&comm, data.as_deref().unwrap_or(&[])).await.unwrap()
            })
            .await;
        for r in results {
            assert_eq!(r, vec![10, 20, 30]);
        }
    }

    #[tokio::test]
    async fn unknown_size_broadcast_propagates_length() {
        let mesh = mesh_net::LocalTestMesh::new(3).await.unwrap();
        let results = mesh
            .run_all(|rank, transport| async move {
                let comm = Communicator::new(Arc::new(transport));
                let data = if rank == 0 { Some(vec![1u8, 2, 3, 4, 5]) } else { None };
                broadcast_unsized(&comm, data.as_deref()).await.unwrap()
            })
            .await;
        for r in results {
            assert_eq!(r, vec![1, 2, 3, 4, 5]);
        }
    }
}
