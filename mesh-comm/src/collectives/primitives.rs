//! Three point-to-point building blocks every collective in this module is assembled from.
//!
//! Grounded on the teacher workspace's `MPCNet` trait defaults
//! (`worker_send_or_leader_receive` / `worker_receive_or_leader_send` /
//! `dynamic_worker_send_or_leader_receive`), generalised from a fixed leader (rank 0) to an
//! arbitrary root rank, and extended with a fully-personalised all-to-all primitive for the
//! process-tagged collectives.

use futures::stream::FuturesOrdered;
use futures::TryStreamExt;
use mesh_net::Channel;

use super::wire::{decode, encode, require_registered};
use crate::communicator::Communicator;
use crate::error::MeshError;
use crate::types::WireElement;

/// Every rank sends `local` to `root`. On `root`, returns `Some(data ordered by rank)`,
/// including root's own `local` at index `root`. On every other rank, returns `None`.
pub(crate) async fn gather_to_root<T: WireElement>(
    comm: &Communicator,
    local: &[T],
    root: u32,
    ch: Channel,
) -> Result<Option<Vec<Vec<T>>>, MeshError> {
    require_registered::<T>(comm.registry())?;
    let my_rank = comm.rank();
    if my_rank == root {
        let mut ordered: Vec<Vec<T>> = vec![Vec::new(); comm.size()];
        ordered[root as usize] = local.to_vec();

        let mut pending = FuturesOrdered::new();
        for rank in 0..comm.size() as u32 {
            if rank == root {
                continue;
            }
            pending.push_back(async move {
                let bytes = comm.recv_bytes(rank, ch).await?;
                Ok::<_, MeshError>((rank, decode::<T>(&bytes)?))
            });
        }
        let received: Vec<(u32, Vec<T>)> = pending.try_collect().await?;
        for (rank, data) in received {
            ordered[rank as usize] = data;
        }
        Ok(Some(ordered))
    } else {
        comm.send_bytes(root, encode(local)?, ch).await?;
        Ok(None)
    }
}

/// `root` broadcasts the same `data` to every rank (including copying it into its own result).
/// Non-root ranks pass `None` and receive root's data.
pub(crate) async fn broadcast_from_root<T: WireElement>(
    comm: &Communicator,
    data: Option<&[T]>,
    root: u32,
    ch: Channel,
) -> Result<Vec<T>, MeshError> {
    require_registered::<T>(comm.registry())?;
    let my_rank = comm.rank();
    if my_rank == root {
        let data = data.ok_or(MeshError::NotRoot)?;
        let bytes = encode(data)?;
        let mut pending = FuturesOrdered::new();
        for rank in 0..comm.size() as u32 {
            if rank == root {
                continue;
            }
            let bytes = bytes.clone();
            pending.push_back(async move { comm.send_bytes(rank, bytes, ch).await });
        }
        let _: Vec<()> = pending.try_collect().await?;
        Ok(data.to_vec())
    } else {
        let bytes = comm.recv_bytes(root, ch).await?;
        decode::<T>(&bytes)
    }
}

/// `root` sends a distinct payload to each rank (`per_rank[r]` goes to rank `r`, including
/// itself); every rank, including root, returns the payload addressed to it.
pub(crate) async fn scatter_from_root<T: WireElement>(
    comm: &Communicator,
    per_rank: Option<Vec<Vec<T>>>,
    root: u32,
    ch: Channel,
) -> Result<Vec<T>, MeshError> {
    require_registered::<T>(comm.registry())?;
    let my_rank = comm.rank();
    if my_rank == root {
        let mut per_rank = per_rank.ok_or(MeshError::NotRoot)?;
        if per_rank.len() != comm.size() {
            return Err(MeshError::SizeMismatch {
                detail: format!(
                    "scatter: expected {} per-rank chunks, got {}",
                    comm.size(),
                    per_rank.len()
                ),
            });
        }
        let own = std::mem::take(&mut per_rank[root as usize]);
        let mut pending = FuturesOrdered::new();
        for (rank, chunk) in per_rank.into_iter().enumerate() {
            if rank as u32 == root {
                continue;
            }
            let bytes = encode(&chunk)?;
            pending.push_back(async move { comm.send_bytes(rank as u32, bytes, ch).await });
        }
        let _: Vec<()> = pending.try_collect().await?;
        Ok(own)
    } else {
        let bytes = comm.recv_bytes(root, ch).await?;
        decode::<T>(&bytes)
    }
}

/// Every rank sends a distinct payload to every other rank (including itself, trivially) and
/// receives a distinct payload from every other rank. Used by the process-tagged and
/// displacement-free all-to-all collectives.
pub(crate) async fn personalized_all_to_all<T: WireElement>(
    comm: &Communicator,
    mut per_rank_send: Vec<Vec<T>>,
    ch: Channel,
) -> Result<Vec<Vec<T>>, MeshError> {
    require_registered::<T>(comm.registry())?;
    let my_rank = comm.rank();
    let n = comm.size();
    if per_rank_send.len() != n {
        return Err(MeshError::SizeMismatch {
            detail: format!("all-to-all: expected {n} per-rank chunks, got {}", per_rank_send.len()),
        });
    }
    let own = std::mem::take(&mut per_rank_send[my_rank as usize]);

    let mut sends = FuturesOrdered::new();
    for (rank, chunk) in per_rank_send.into_iter().enumerate() {
        if rank as u32 == my_rank {
            continue;
        }
        let bytes = encode(&chunk)?;
        sends.push_back(async move {
            comm.send_bytes(rank as u32, bytes, ch).await.map_err(MeshError::from)
        });
    }

    let mut recvs = FuturesOrdered::new();
    for rank in 0..n as u32 {
        if rank == my_rank {
            continue;
        }
        recvs.push_back(async move {
            let bytes = comm.recv_bytes(rank, ch).await?;
            Ok::<_, MeshError>((rank, decode::<T>(&bytes)?))
        });
    }

    let (_, received): ((), Vec<(u32, Vec<T>)>) =
        futures::try_join!(sends.try_collect::<Vec<()>>(), recvs.try_collect())?;

    let mut result = vec![Vec::new(); n];
    result[my_rank as usize] = own;
    for (rank, data) in received {
        result[rank as usize] = data;
    }
    Ok(result)
}
