//! §4.6 ExchangePattern: the communication-plan half, shared by both the two-sided and one-sided
//! transfer variants. Grounded on `original_source/include/comm/implementation/component/
//! ExchangePattern.cpp`/`.h`'s initialisation routine: sort the local send list by destination
//! rank, publish dense per-destination counts, then exchange the sorted adjacency itself.

use std::collections::HashMap;

use mesh_comm::collectives::{all_to_all, all_to_all_varying};
use mesh_comm::Communicator;

use crate::error::ExchangeError;

pub type ExchangeId = u64;

/// A compiled, reusable neighbour-exchange plan: which local slot each exchanged quantity lives
/// in, and the exact send/receive groupings (one group per neighbour rank) needed to move values
/// between ranks in a single round.
#[derive(Debug, Clone)]
pub struct ExchangePlan {
    local_to_exchange: Vec<ExchangeId>,
    exchange_to_local: HashMap<ExchangeId, usize>,

    send_proc: Vec<u32>,
    send_off: Vec<usize>,
    send_adj: Vec<ExchangeId>,

    recv_proc: Vec<u32>,
    recv_off: Vec<usize>,
    recv_adj: Vec<ExchangeId>,
}

impl ExchangePlan {
    /// `local_to_exchange[i]` names the exchange-wide identifier owned by local slot `i` (the
    /// order `pack`/`unpack` read and write local payload arrays in). `send_pairs` is this rank's
    /// full list of `(destination rank, exchange id)` obligations, in no particular order — for a
    /// pattern built off a finalised graph, this is the flattened send CSR.
    pub async fn build(
        comm: &Communicator,
        local_to_exchange: Vec<ExchangeId>,
        mut send_pairs: Vec<(u32, ExchangeId)>,
    ) -> Result<Self, ExchangeError> {
        if local_to_exchange.is_empty() {
            return Err(ExchangeError::NullInput);
        }
        let mut exchange_to_local = HashMap::with_capacity(local_to_exchange.len());
        for (slot, &id) in local_to_exchange.iter().enumerate() {
            if exchange_to_local.insert(id, slot).is_some() {
                return Err(ExchangeError::DuplicateExchangeId(id));
            }
        }

        // Step 1: stable sort send pairs by destination rank, preserving each destination's
        // internal ordering (the order neighbours already agree on, e.g. ascending global id).
        send_pairs.sort_by_key(|&(rank, _)| rank);

        let size = comm.size();
        let mut send_counts_dense = vec![0u64; size];
        for &(rank, _) in &send_pairs {
            send_counts_dense[rank as usize] += 1;
        }

        let mut send_proc = Vec::new();
        let mut send_off = vec![0usize];
        let mut send_adj = Vec::with_capacity(send_pairs.len());
        let mut i = 0;
        while i < send_pairs.len() {
            let rank = send_pairs[i].0;
            let mut j = i;
            while j < send_pairs.len() && send_pairs[j].0 == rank {
                send_adj.push(send_pairs[j].1);
                j += 1;
            }
            send_proc.push(rank);
            send_off.push(send_adj.len());
            i = j;
        }

        // Step 2: publish dense send counts, get back dense recv counts.
        let recv_counts_dense = all_to_all(comm, &send_counts_dense, 1).await?;

        // Step 3: exchange the sorted adjacency itself, using the dense send counts as the
        // per-destination split; the public collective flattens sender boundaries, so they are
        // recovered below using the recv counts just published.
        let send_counts_usize: Vec<usize> =
            send_counts_dense.iter().map(|&c| c as usize).collect();
        let flat_recv_adj = all_to_all_varying(comm, &send_adj, &send_counts_usize).await?;

        let mut recv_proc = Vec::new();
        let mut recv_off = Vec::new();
        let mut recv_adj = Vec::with_capacity(flat_recv_adj.len());
        let mut cursor = 0usize;
        recv_off.push(0);
        for rank in 0..size as u32 {
            let count = recv_counts_dense[rank as usize] as usize;
            if count > 0 {
                recv_proc.push(rank);
                recv_adj.extend_from_slice(&flat_recv_adj[cursor..cursor + count]);
                recv_off.push(recv_adj.len());
            }
            cursor += count;
        }

        Ok(Self {
            local_to_exchange,
            exchange_to_local,
            send_proc,
            send_off,
            send_adj,
            recv_proc,
            recv_off,
            recv_adj,
        })
    }

    pub fn local_slot_count(&self) -> usize {
        self.local_to_exchange.len()
    }

    pub fn local_to_exchange(&self) -> &[ExchangeId] {
        &self.local_to_exchange
    }

    pub fn local_slot_of(&self, id: ExchangeId) -> Result<usize, ExchangeError> {
        self.exchange_to_local
            .get(&id)
            .copied()
            .ok_or(ExchangeError::IndexOutOfRange { index: id as usize, len: self.local_to_exchange.len() })
    }

    pub fn send_neighbours(&self) -> &[u32] {
        &self.send_proc
    }

    pub fn recv_neighbours(&self) -> &[u32] {
        &self.recv_proc
    }

    /// The exchange ids this rank sends to the `i`-th send neighbour, in send order.
    pub fn send_group(&self, i: usize) -> &[ExchangeId] {
        &self.send_adj[self.send_off[i]..self.send_off[i + 1]]
    }

    /// The exchange ids this rank receives from the `i`-th recv neighbour, in receive order.
    pub fn recv_group(&self, i: usize) -> &[ExchangeId] {
        &self.recv_adj[self.recv_off[i]..self.recv_off[i + 1]]
    }

    pub fn send_group_count(&self) -> usize {
        self.send_proc.len()
    }

    pub fn recv_group_count(&self) -> usize {
        self.recv_proc.len()
    }

    /// Packs `local_values` (indexed by local slot) into one send buffer per send neighbour, in
    /// the order `send_neighbours()` reports them.
    pub fn pack<T: Clone>(&self, local_values: &[T]) -> Result<Vec<Vec<T>>, ExchangeError> {
        if local_values.len() != self.local_to_exchange.len() {
            return Err(ExchangeError::IndexOutOfRange {
                index: local_values.len(),
                len: self.local_to_exchange.len(),
            });
        }
        let mut out = Vec::with_capacity(self.send_proc.len());
        for i in 0..self.send_proc.len() {
            let mut buf = Vec::with_capacity(self.send_group(i).len());
            for &id in self.send_group(i) {
                let slot = self.local_slot_of(id)?;
                buf.push(local_values[slot].clone());
            }
            out.push(buf);
        }
        Ok(out)
    }

    /// Scatters one receive buffer per recv neighbour (in `recv_neighbours()` order) back into
    /// `local_values`, indexed by local slot.
    pub fn unpack<T: Clone>(
        &self,
        received: &[Vec<T>],
        local_values: &mut [T],
    ) -> Result<(), ExchangeError> {
        if received.len() != self.recv_proc.len() {
            return Err(ExchangeError::IndexOutOfRange {
                index: received.len(),
                len: self.recv_proc.len(),
            });
        }
        for (i, buf) in received.iter().enumerate() {
            let group = self.recv_group(i);
            if buf.len() != group.len() {
                return Err(ExchangeError::IndexOutOfRange { index: buf.len(), len: group.len() });
            }
            for (&id, value) in group.iter().zip(buf.iter()) {
                let slot = self.local_slot_of(id)?;
                local_values[slot] = value.clone();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn three_rank_ring_plan_matches_hand_derivation() {
        // Each rank owns one local id (10*rank) and sends it to its two ring neighbours; every
        // rank therefore also receives one id from each of its two ring neighbours.
        let mesh = mesh_net::LocalTestMesh::new(3).await.unwrap();
        let results = mesh
            .run_all(|rank, transport| async move {
                let comm = Communicator::new(Arc::new(transport));
                let me = rank as u32;
                let local_to_exchange = vec![10 * me as u64];
                let left = (me + 2) % 3;
                let right = (me + 1) % 3;
                let send_pairs = vec![(left, 10 * me as u64), (right, 10 * me as u64)];
                ExchangePlan::build(&comm, local_to_exchange, send_pairs).await.unwrap()
            })
            .await;

        for (rank, plan) in results.iter().enumerate() {
            let rank = rank as u32;
            assert_eq!(plan.send_group_count(), 2);
            assert_eq!(plan.recv_group_count(), 2);
            let mut received: Vec<u64> = plan
                .recv_neighbours()
                .iter()
                .enumerate()
                .flat_map(|(i, _)| plan.recv_group(i).to_vec())
                .collect();
            received.sort_unstable();
            let left = (rank + 2) % 3;
            let right = (rank + 1) % 3;
            let mut expected = vec![10 * left as u64, 10 * right as u64];
            expected.sort_unstable();
            assert_eq!(received, expected);
        }
    }

    #[tokio::test]
    async fn duplicate_local_id_is_rejected() {
        let comm = Communicator::single();
        let err = ExchangePlan::build(&comm, vec![1, 1], vec![]).await.unwrap_err();
        assert_eq!(err, ExchangeError::DuplicateExchangeId(1));
    }

    #[tokio::test]
    async fn empty_local_to_exchange_is_rejected() {
        let comm = Communicator::single();
        let err = ExchangePlan::build(&comm, vec![], vec![]).await.unwrap_err();
        assert_eq!(err, ExchangeError::NullInput);
    }
}
