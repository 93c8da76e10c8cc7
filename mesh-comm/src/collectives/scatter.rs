//! §4.3 Scatter: fixed chunk, variable chunk, and process-tagged variants.

use mesh_net::Channel;

use super::primitives::{personalized_all_to_all, scatter_from_root};
use crate::communicator::Communicator;
use crate::error::MeshError;
use crate::types::WireElement;

/// Fixed-chunk scatter: root's buffer of `chunk_len * comm.size()` elements is split into
/// equal slices, distributed in ascending rank order.
pub async fn scatter<T: WireElement>(
    comm: &Communicator,
    send_buf: Option<&[T]>,
    chunk_len: usize,
) -> Result<Vec<T>, MeshError> {
    if chunk_len == 0 {
        return Err(MeshError::EmptyPayload);
    }
    if comm.size() == 1 {
        let buf = send_buf.ok_or(MeshError::NotRoot)?;
        return Ok(buf.to_vec());
    }
    let root = comm.root_rank();
    let per_rank = if comm.is_root() {
        let buf = send_buf.ok_or(MeshError::NotRoot)?;
        if buf.len() != chunk_len * comm.size() {
            return Err(MeshError::SizeMismatch {
                detail: format!(
                    "scatter: expected {} elements ({} x {}), got {}",
                    chunk_len * comm.size(),
                    chunk_len,
                    comm.size(),
                    buf.len()
                ),
            });
        }
        Some(buf.chunks(chunk_len).map(|c| c.to_vec()).collect())
    } else {
        None
    };
    scatter_from_root(comm, per_rank, root, Channel::Collective).await
}

/// Variable-chunk scatter: per-rank chunk sizes are supplied by the caller (root) by the
/// shape of `per_rank`; a chunk of length zero is permitted and means "nothing for that rank".
pub async fn scatter_varying<T: WireElement>(
    comm: &Communicator,
    per_rank: Option<Vec<Vec<T>>>,
) -> Result<Vec<T>, MeshError> {
    if comm.size() == 1 {
        let mut per_rank = per_rank.ok_or(MeshError::NotRoot)?;
        return Ok(per_rank.pop().unwrap_or_default());
    }
    let root = comm.root_rank();
    scatter_from_root(comm, per_rank, root, Channel::Collective).await
}

/// Process-tagged scatter: root supplies `(element, destinationRank)` pairs in any order.
/// Pairs are stably grouped by destination (preserving intra-destination order), counts are
/// published via a fixed single-element all-to-all, and a variable scatter delivers the
/// grouped chunks. The result on rank r contains exactly the elements tagged for r, in the
/// order root listed them.
pub async fn scatter_tagged<T: WireElement>(
    comm: &Communicator,
    tagged: Option<Vec<(T, u32)>>,
) -> Result<Vec<T>, MeshError> {
    let size = comm.size();
    let root = comm.root_rank();
    if size == 1 {
        let tagged = tagged.ok_or(MeshError::NotRoot)?;
        return Ok(tagged.into_iter().map(|(e, _)| e).collect());
    }

    let grouped: Option<Vec<Vec<T>>> = if comm.is_root() {
        let tagged = tagged.ok_or(MeshError::NotRoot)?;
        let mut groups: Vec<Vec<T>> = vec![Vec::new(); size];
        for (element, dest) in tagged {
            let dest = dest as usize;
            if dest >= size {
                return Err(MeshError::SizeMismatch {
                    detail: format!("scatter_tagged: destination rank {dest} out of range"),
                });
            }
            groups[dest].push(element);
        }
        Some(groups)
    } else {
        None
    };

    // Publish per-rank counts so every rank can size its receive buffer ahead of the variable
    // scatter (mirrors the spec's fixed single-element all-to-all step).
    let counts_per_rank: Vec<Vec<u64>> = if let Some(groups) = &grouped {
        groups.iter().map(|g| vec![g.len() as u64]).collect()
    } else {
        vec![vec![0u64]; size]
    };
    let _ = personalized_all_to_all(comm, counts_per_rank, Channel::Collective).await?;

    scatter_from_root(comm, grouped, root, Channel::Collective).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn fixed_scatter_splits_in_rank_order() {
        let mesh = mesh_net::LocalTestMesh::new(3).await.unwrap();
        let results = mesh
            .run_all(|rank, transport| async move {
                let comm = Communicator::new(Arc::new(transport));
                let send = if rank == 0 { Some(vec![0u32, 1, 2, 3, 4, 5]) } else { None };
                scatter(&comm, send.as_deref(), 2).await.unwrap()
            })
            .await;
        assert_eq!(results[0], vec![0, 1]);
        assert_eq!(results[1], vec![2, 3]);
        assert_eq!(results[2], vec![4, 5]);
    }

    #[tokio::test]
    async fn tagged_scatter_routes_by_destination_in_order() {
        let mesh = mesh_net::LocalTestMesh::new(3).await.unwrap();
        let results = mesh
            .run_all(|rank, transport| async move {
                let comm = Communicator::new(Arc::new(transport));
                let tagged = if rank == 0 {
                    Some(vec![(10u32, 2), (11, 0), (12, 2), (13, 1)])
                } else {
                    None
                };
                scatter_tagged(&comm, tagged).await.unwrap()
            })
            .await;
        assert_eq!(results[0], vec![11]);
        assert_eq!(results[1], vec![13]);
        assert_eq!(results[2], vec![10, 12]);
    }
}
