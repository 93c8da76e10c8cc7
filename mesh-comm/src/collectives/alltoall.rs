//! §4.3 AllToAll: fixed chunk, variable (with optional explicit displacements), and
//! process-tagged variants.

use mesh_net::Channel;

use super::primitives::personalized_all_to_all;
use crate::communicator::Communicator;
use crate::error::MeshError;
use crate::types::WireElement;

/// Fixed-chunk all-to-all: rank i's send buffer is split into `comm.size()` equal chunks;
/// chunk `j` goes to rank j, and rank i receives one chunk from every rank, concatenated in
/// ascending sender order.
pub async fn all_to_all<T: WireElement>(comm: &Communicator, send_buf: &[T], chunk_len: usize) -> Result<Vec<T>, MeshError> {
    if chunk_len == 0 {
        return Err(MeshError::EmptyPayload);
    }
    let size = comm.size();
    if send_buf.len() != chunk_len * size {
        return Err(MeshError::SizeMismatch {
            detail: format!(
                "all_to_all: expected {} elements ({} x {}), got {}",
                chunk_len * size,
                chunk_len,
                size,
                send_buf.len()
            ),
        });
    }
    if size == 1 {
        return Ok(send_buf.to_vec());
    }
    let per_rank: Vec<Vec<T>> = send_buf.chunks(chunk_len).map(|c| c.to_vec()).collect();
    let received = personalized_all_to_all(comm, per_rank, Channel::Collective).await?;
    Ok(received.into_iter().flatten().collect())
}

/// Variable all-to-all: caller supplies `send_counts`, used to split `send_buf` into
/// per-destination chunks; displacements are computed internally (cumulative sum of counts).
/// Returns the concatenated receive buffer in ascending sender order.
pub async fn all_to_all_varying<T: WireElement>(
    comm: &Communicator,
    send_buf: &[T],
    send_counts: &[usize],
) -> Result<Vec<T>, MeshError> {
    let size = comm.size();
    if send_counts.len() != size {
        return Err(MeshError::SizeMismatch {
            detail: format!(
                "all_to_all_varying: expected {size} send counts, got {}",
                send_counts.len()
            ),
        });
    }
    let total: usize = send_counts.iter().sum();
    if send_buf.len() != total {
        return Err(MeshError::SizeMismatch {
            detail: format!(
                "all_to_all_varying: send counts sum to {total}, buffer has {}",
                send_buf.len()
            ),
        });
    }
    if size == 1 {
        return Ok(send_buf.to_vec());
    }
    let mut per_rank = Vec::with_capacity(size);
    let mut offset = 0;
    for &count in send_counts {
        per_rank.push(send_buf[offset..offset + count].to_vec());
        offset += count;
    }
    let received = personalized_all_to_all(comm, per_rank, Channel::Collective).await?;
    Ok(received.into_iter().flatten().collect())
}

/// Variable all-to-all with explicit displacements on both ends. The primitive verifies that
/// consecutive displacements equal cumulative counts (the caller may not leave gaps or
/// overlaps), then delegates to [`all_to_all_varying`] for the transfer itself.
pub async fn all_to_all_displaced<T: WireElement>(
    comm: &Communicator,
    send_buf: &[T],
    send_counts: &[usize],
    send_displs: &[usize],
) -> Result<Vec<T>, MeshError> {
    let size = comm.size();
    if send_displs.len() != size {
        return Err(MeshError::SizeMismatch {
            detail: format!(
                "all_to_all_displaced: expected {size} displacements, got {}",
                send_displs.len()
            ),
        });
    }
    let mut expected = 0usize;
    for (i, (&count, &displ)) in send_counts.iter().zip(send_displs.iter()).enumerate() {
        if displ != expected {
            return Err(MeshError::SizeMismatch {
                detail: format!(
                    "all_to_all_displaced: displacement[{i}] = {displ}, expected cumulative {expected}"
                ),
            });
        }
        expected += count;
    }
    all_to_all_varying(comm, send_buf, send_counts).await
}

/// Process-tagged all-to-all: every rank supplies `(element, destinationRank)` pairs; the
/// result on rank r is grouped by sender rank. Elements sharing sender and destination keep
/// their relative order from the sender's input.
pub async fn all_to_all_tagged<T: WireElement>(
    comm: &Communicator,
    tagged: Vec<(T, u32)>,
) -> Result<Vec<(T, u32)>, MeshError> {
    let size = comm.size();
    if size == 1 {
        return Ok(tagged.into_iter().map(|(e, d)| (e, d)).collect());
    }
    let mut groups: Vec<Vec<T>> = vec![Vec::new(); size];
    for (element, dest) in tagged {
        let dest = dest as usize;
        if dest >= size {
            return Err(MeshError::SizeMismatch {
                detail: format!("all_to_all_tagged: destination rank {dest} out of range"),
            });
        }
        groups[dest].push(element);
    }
    let received = personalized_all_to_all(comm, groups, Channel::Collective).await?;
    let mut result = Vec::new();
    for (sender, chunk) in received.into_iter().enumerate() {
        for element in chunk {
            result.push((element, sender as u32));
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn fixed_all_to_all_transposes_chunks() {
        let mesh = mesh_net::LocalTestMesh::new(3).await.unwrap();
        let results = mesh
            .run_all(|rank, transport| async move {
                let comm = Communicator::new(Arc::new(transport));
                let send: Vec<u32> = (0..3).map(|j| rank as u32 * 10 + j).collect();
                all_to_all(&comm, &send, 1).await.unwrap()
            })
            .await;
        assert_eq!(results[0], vec![0, 10, 20]);
        assert_eq!(results[1], vec![1, 11, 21]);
        assert_eq!(results[2], vec![2, 12, 22]);
    }

    #[tokio::test]
    async fn varying_all_to_all_respects_counts() {
        let mesh = mesh_net::LocalTestMesh::new(2).await.unwrap();
        let results = mesh
            .run_all(|rank, transport| async move {
                let comm = Communicator::new(Arc::new(transport));
                let (send, counts): (Vec<u32>, Vec<usize>) = if rank == 0 {
                    (vec![1, 2, 3], vec![1, 2])
                } else {
                    (vec![9], vec![0, 1])
                };
                all_to_all_varying(&comm, &send, &counts).await.unwrap()
            })
            .await;
        assert_eq!(results[0], vec![1]);
        assert_eq!(results[1], vec![2, 3, 9]);
    }
}
