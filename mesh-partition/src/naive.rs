//! Naive back-end (§4.7): no external library call, just contiguous global-ID ranges sized
//! `⌊N/P⌋` or `⌈N/P⌉`, the larger parts going to the lowest-numbered ranks. Grounded on
//! `original_source/include/partitioner/implementation/component/PartitionerNaive.h`/`.cpp`.

use std::hash::Hash;
use std::sync::Arc;

use async_trait::async_trait;
use mesh_comm::collectives::all_to_all_tagged;
use mesh_comm::{Communicator, WireElement};
use mesh_graph::{DistributedGraph, GlobalId};

use crate::config::PartitionerConfig;
use crate::error::PartitionerError;
use crate::Partitioner;

/// Per-part sizes for `total` nodes split across `n_parts`, remainder going to the
/// lowest-numbered parts one at a time. `bounds[p]..bounds[p+1]` is part `p`'s global-ID range.
pub(crate) fn naive_part_bounds(total: u64, n_parts: usize) -> Vec<u64> {
    let base = total / n_parts as u64;
    let remainder = total % n_parts as u64;
    let mut bounds = Vec::with_capacity(n_parts + 1);
    bounds.push(0u64);
    for p in 0..n_parts {
        let size = if (p as u64) < remainder { base + 1 } else { base };
        bounds.push(bounds[p] + size);
    }
    bounds
}

pub(crate) fn part_of(gid: GlobalId, bounds: &[u64]) -> usize {
    bounds.partition_point(|&b| b <= gid) - 1
}

pub struct NaivePartitioner<N> {
    graph: Arc<DistributedGraph<N>>,
    comm: Communicator,
    n_parts: Option<usize>,
    assignment: Option<Vec<(N, u32)>>,
}

impl<N> NaivePartitioner<N> {
    pub fn new(graph: Arc<DistributedGraph<N>>, comm: Communicator, _config: PartitionerConfig) -> Self {
        Self { graph, comm, n_parts: None, assignment: None }
    }
}

#[async_trait]
impl<N> Partitioner<N> for NaivePartitioner<N>
where
    N: Clone + Eq + Ord + Hash + WireElement,
{
    async fn initialise(&mut self, n_parts: usize) -> Result<(), PartitionerError> {
        let ranks = self.comm.size();
        if n_parts > ranks {
            return Err(PartitionerError::UnderSizedCommunicator { ranks, parts: n_parts });
        }
        self.n_parts = Some(n_parts);
        Ok(())
    }

    async fn partition(&mut self) -> Result<(), PartitionerError> {
        let n_parts = self.n_parts.ok_or(PartitionerError::PartsUnset)?;
        let total: u64 = self.graph.process_node_counts()?.iter().sum();
        let bounds = naive_part_bounds(total, n_parts);

        let mut assignment = Vec::new();
        for node in self.graph.get_local_nodes()? {
            let gid = self.graph.global_id_of(&node)?;
            let part = part_of(gid, &bounds) as u32;
            assignment.push((node, part));
        }
        self.assignment = Some(assignment);
        Ok(())
    }

    async fn assign_rank_nodes(mut self) -> Result<Vec<N>, PartitionerError> {
        let tagged = self.assignment.take().ok_or(PartitionerError::NotPartitioned)?;
        // Part `p` is destination rank `p` — the convention that makes `UnderSizedCommunicator`
        // a meaningful failure mode in the first place (see `initialise`).
        let received = all_to_all_tagged(&self.comm, tagged).await?;
        Ok(received.into_iter().map(|(node, _)| node).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ten_nodes_three_parts_matches_reference_split() {
        let bounds = naive_part_bounds(10, 3);
        let sizes: Vec<u64> = bounds.windows(2).map(|w| w[1] - w[0]).collect();
        assert_eq!(sizes, vec![4, 3, 3]);
    }

    #[test]
    fn part_of_respects_contiguous_ranges() {
        let bounds = naive_part_bounds(10, 3);
        assert_eq!(part_of(0, &bounds), 0);
        assert_eq!(part_of(3, &bounds), 0);
        assert_eq!(part_of(4, &bounds), 1);
        assert_eq!(part_of(6, &bounds), 1);
        assert_eq!(part_of(7, &bounds), 2);
        assert_eq!(part_of(9, &bounds), 2);
    }
}
