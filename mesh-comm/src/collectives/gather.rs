//! §4.3 Gather / AllGather: fixed chunk, variable chunk, and unknown-variable variants.

use mesh_net::Channel;

use super::primitives::{broadcast_from_root, gather_to_root};
use crate::communicator::Communicator;
use crate::error::MeshError;
use crate::types::WireElement;

fn validate_chunk<T>(local: &[T]) -> Result<(), MeshError> {
    if local.is_empty() {
        return Err(MeshError::EmptyPayload);
    }
    Ok(())
}

/// Fixed-chunk gather: every rank contributes exactly `local.len()` elements. Result is
/// concatenated in ascending rank order and left only on the sink (`None` everywhere else).
pub async fn gather<T: WireElement>(
    comm: &Communicator,
    local: &[T],
) -> Result<Option<Vec<T>>, MeshError> {
    validate_chunk(local)?;
    if comm.size() == 1 {
        return Ok(Some(local.to_vec()));
    }
    let root = comm.root_rank();
    let gathered = gather_to_root(comm, local, root, Channel::Collective).await?;
    Ok(gathered.map(|chunks| chunks.into_iter().flatten().collect()))
}

/// Fixed-chunk all-gather: as [`gather`], but the concatenated result is left on every rank.
pub async fn all_gather<T: WireElement>(comm: &Communicator, local: &[T]) -> Result<Vec<T>, MeshError> {
    validate_chunk(local)?;
    if comm.size() == 1 {
        return Ok(local.to_vec());
    }
    let root = comm.root_rank();
    let gathered = gather_to_root(comm, local, root, Channel::Collective).await?;
    let flat: Option<Vec<T>> = gathered.map(|chunks| chunks.into_iter().flatten().collect());
    let flat_ref = flat.as_deref();
    broadcast_from_root(comm, flat_ref, root, Channel::Collective).await
}

/// Variable-chunk gather: each rank contributes `local.len()` elements (which may differ per
/// rank); output concatenated in ascending rank order, left only on the sink.
pub async fn gather_varying<T: WireElement>(
    comm: &Communicator,
    local: &[T],
) -> Result<Option<Vec<T>>, MeshError> {
    if comm.size() == 1 {
        return Ok(Some(local.to_vec()));
    }
    let root = comm.root_rank();
    let gathered = gather_to_root(comm, local, root, Channel::Collective).await?;
    Ok(gathered.map(|chunks| chunks.into_iter().flatten().collect()))
}

/// All-gather variant of [`gather_varying`].
pub async fn all_gather_varying<T: WireElement>(
    comm: &Communicator,
    local: &[T],
) -> Result<Vec<T>, MeshError> {
    if comm.size() == 1 {
        return Ok(local.to_vec());
    }
    let root = comm.root_rank();
    let gathered = gather_to_root(comm, local, root, Channel::Collective).await?;
    let flat: Option<Vec<T>> = gathered.map(|chunks| chunks.into_iter().flatten().collect());
    let flat_ref = flat.as_deref();
    broadcast_from_root(comm, flat_ref, root, Channel::Collective).await
}

/// Unknown-variable gather: a preliminary fixed gather of each rank's element count, then the
/// variable gather itself. Left only on the sink.
pub async fn gather_unsized<T: WireElement>(
    comm: &Communicator,
    local: &[T],
) -> Result<Option<Vec<T>>, MeshError> {
    if comm.size() == 1 {
        return Ok(Some(local.to_vec()));
    }
    let root = comm.root_rank();
    let counts = gather(comm, &[local.len() as u64]).await?;
    if comm.is_root() {
        let counts = counts.expect("root always receives fixed-gather result");
        if counts.iter().all(|&c| c == 0) {
            return Err(MeshError::EmptyPayload);
        }
    }
    gather_varying(comm, local).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn fixed_gather_concatenates_in_rank_order() {
        let mesh = mesh_net::LocalTestMesh::new(3).await.unwrap();
        let results = mesh
            .run_all(|rank, transport| async move {
                let comm = Communicator::new(Arc::new(transport));
                gather(&comm, &[rank as u32, rank as u32 + 100]).await.unwrap()
            })
            .await;
        assert_eq!(results[0], Some(vec![0, 100, 1, 101, 2, 102]));
        assert!(results[1].is_none());
        assert!(results[2].is_none());
    }

    #[tokio::test]
    async fn all_gather_reaches_every_rank() {
        let mesh = mesh_net::LocalTestMesh::new(3).await.unwrap();
        let results = mesh
            .run_all(|rank, transport| async move {
                let comm = Communicator::new(Arc::new(transport));
                all_gather(&comm, &[rank as u32]).await.unwrap()
            })
            .await;
        for r in results {
            assert_eq!(r, vec![0, 1, 2]);
        }
    }

    #[tokio::test]
    async fn variable_gather_handles_uneven_chunks() {
        let mesh = mesh_net::LocalTestMesh::new(3).await.unwrap();
        let results = mesh
            .run_all(|rank, transport| async move {
                let comm = Communicator::new(Arc::new(transport));
                let local: Vec<u32> = (0..rank as u32 + 1).collect();
                gather_varying(&comm, &local).await.unwrap()
            })
            .await;
        assert_eq!(results[0], Some(vec![0, 0, 1, 0, 1, 2]));
    }
}
