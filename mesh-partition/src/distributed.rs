//! Distributed ("Parmetis"-equivalent) back-end (§4.7): works in place over each rank's own
//! local CSR, without a global gather. No real Rust binding to a distributed graph partitioner
//! (ParMETIS) exists in the corpus and none is safely vendorable without fabricating a
//! dependency (see `DESIGN.md`), so this back-end is native: it starts from the same contiguous
//! global-ID split the naive back-end uses, then refines the part boundaries by local search,
//! using only topology each rank already knows (its own CSR plus the global IDs of its ghosts)
//! and a handful of `all_reduce` rounds to agree on each candidate boundary's total edge cut.
//! Grounded on `original_source/include/partitioner/implementation/component/
//! PartitionerParmetis.h`/`.cpp`'s interface shape (vertex distribution + local CSR in, new
//! owning rank out via process-tagged all-to-all), with the refinement loop itself being this
//! workspace's own addition in place of the vendored library call.

use std::hash::Hash;
use std::sync::Arc;

use async_trait::async_trait;
use mesh_comm::collectives::{all_reduce, all_to_all_tagged, ReduceOp};
use mesh_comm::{Communicator, WireElement};
use mesh_graph::DistributedGraph;

use crate::config::PartitionerConfig;
use crate::error::PartitionerError;
use crate::naive::{naive_part_bounds, part_of};
use crate::Partitioner;

const REFINEMENT_PASSES: u32 = 2;

pub struct DistributedPartitioner<N> {
    graph: Arc<DistributedGraph<N>>,
    comm: Communicator,
    n_parts: Option<usize>,
    assignment: Option<Vec<(N, u32)>>,
}

impl<N> DistributedPartitioner<N> {
    pub fn new(graph: Arc<DistributedGraph<N>>, comm: Communicator, _config: PartitionerConfig) -> Self {
        Self { graph, comm, n_parts: None, assignment: None }
    }
}

impl<N> DistributedPartitioner<N>
where
    N: Clone + Eq + Ord + Hash + WireElement,
{
    /// Directed edges `(u, v)` this rank contributes to the cut count: `u` is always one of this
    /// rank's own owned nodes, so every such edge is counted by exactly one rank regardless of
    /// whether `v` is local, a ghost, or owned by a third rank entirely.
    fn local_cut_contribution(&self, bounds: &[u64]) -> Result<u64, PartitionerError> {
        let csr = self.graph.local_csr()?;
        let n_edges = csr.get_edge_count();
        if n_edges == 0 {
            return Ok(0);
        }
        let filler = crate::any_known_node(&self.graph)?;
        let mut src = vec![filler.clone(); n_edges];
        let mut dst = vec![filler; n_edges];
        csr.get_edges(&mut src, &mut dst)?;

        let mut cut = 0u64;
        for (s, d) in src.iter().zip(dst.iter()) {
            if !self.graph.exists_local_node(s) {
                continue;
            }
            let gs = self.graph.global_id_of(s)?;
            let gd = self.graph.global_id_of(d)?;
            if part_of(gs, bounds) != part_of(gd, bounds) {
                cut += 1;
            }
        }
        Ok(cut)
    }

    async fn total_edge_cut(&self, bounds: &[u64]) -> Result<u64, PartitionerError> {
        let local = self.local_cut_contribution(bounds)?;
        Ok(all_reduce(&self.comm, &[local], ReduceOp::Sum).await?[0])
    }

    /// Local hill-climbing search: for each internal boundary, try nudging it by one global ID
    /// in either direction and keep whichever of {-1, 0, +1} yields the lowest total cut. Every
    /// rank evaluates the same candidates and reaches the same `all_reduce`d verdict, so no
    /// further coordination of the chosen boundary is needed.
    async fn refine_bounds(&self, mut bounds: Vec<u64>) -> Result<Vec<u64>, PartitionerError> {
        for _pass in 0..REFINEMENT_PASSES {
            for b in 1..bounds.len() - 1 {
                let lo = bounds[b - 1] + 1;
                let hi = bounds[b + 1].saturating_sub(1);
                if lo > hi {
                    continue;
                }
                let mut best = bounds[b];
                let mut best_cut = self.total_edge_cut(&bounds).await?;
                for candidate in [bounds[b].saturating_sub(1).max(lo), bounds[b], (bounds[b] + 1).min(hi)] {
                    if candidate == bounds[b] {
                        continue;
                    }
                    let mut trial = bounds.clone();
                    trial[b] = candidate;
                    let cut = self.total_edge_cut(&trial).await?;
                    if cut < best_cut {
                        best_cut = cut;
                        best = candidate;
                    }
                }
                bounds[b] = best;
            }
        }
        Ok(bounds)
    }
}

#[async_trait]
impl<N> Partitioner<N> for DistributedPartitioner<N>
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
        // The "vertexDistribution" input the original backend takes is exactly the prefix sum
        // over `processNodeCounts` already computed at finalisation.
        let total: u64 = self.graph.process_node_counts()?.iter().sum();
        let initial = naive_part_bounds(total, n_parts);
        let bounds = if n_parts > 1 { self.refine_bounds(initial).await? } else { initial };

        let mut assignment = Vec::new();
        for node in self.graph.get_local_nodes()? {
            let gid = self.graph.global_id_of(&node)?;
            assignment.push((node, part_of(gid, &bounds) as u32));
        }
        self.assignment = Some(assignment);
        Ok(())
    }

    async fn assign_rank_nodes(mut self) -> Result<Vec<N>, PartitionerError> {
        let tagged = self.assignment.take().ok_or(PartitionerError::NotPartitioned)?;
        let received = all_to_all_tagged(&self.comm, tagged).await?;
        Ok(received.into_iter().map(|(node, _)| node).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mesh_graph::DistributedGraph;

    /// A 9-node line graph split evenly across 3 ranks (3 nodes each) already has the minimum
    /// possible cut (one edge per internal boundary, same regardless of where the boundary
    /// falls), so refinement has nothing to improve on and the result should match the
    /// contiguous naive split exactly.
    #[tokio::test]
    async fn line_graph_nine_nodes_three_ranks_keeps_naive_split() {
        let mesh = mesh_net::LocalTestMesh::new(3).await.unwrap();
        let results = mesh
            .run_all(|rank, transport| async move {
                let comm = Communicator::new(Arc::new(transport));
                let mut g: DistributedGraph<u32> = DistributedGraph::new(comm.clone());

                let owned: [u32; 3] = [rank as u32 * 3, rank as u32 * 3 + 1, rank as u32 * 3 + 2];
                for n in owned {
                    g.add_local_node(n).unwrap();
                }
                g.add_edge(&owned[0], &owned[1]).unwrap();
                g.add_edge(&owned[1], &owned[2]).unwrap();
                if rank == 0 {
                    g.add_edge(&owned[2], &3).unwrap();
                } else if rank == 1 {
                    g.add_edge(&2, &owned[0]).unwrap();
                    g.add_edge(&owned[2], &6).unwrap();
                } else {
                    g.add_edge(&5, &owned[0]).unwrap();
                }

                g.finalize().await.unwrap();

                let graph = Arc::new(g);
                let mut partitioner = DistributedPartitioner::new(graph, comm, PartitionerConfig::default());
                partitioner.initialise(3).await.unwrap();
                partitioner.partition().await.unwrap();
                let mut owned_after = partitioner.assign_rank_nodes().await.unwrap();
                owned_after.sort();
                owned_after
            })
            .await;

        assert_eq!(results[0], vec![0, 1, 2]);
        assert_eq!(results[1], vec![3, 4, 5]);
        assert_eq!(results[2], vec![6, 7, 8]);
    }

    #[tokio::test]
    async fn undersized_communicator_is_rejected() {
        let mesh = mesh_net::LocalTestMesh::new(2).await.unwrap();
        let results = mesh
            .run_all(|rank, transport| async move {
                let comm = Communicator::new(Arc::new(transport));
                let mut g: DistributedGraph<u32> = DistributedGraph::new(comm.clone());
                if rank == 0 {
                    g.add_local_node(0).unwrap();
                }
                g.finalize().await.unwrap();
                let graph = Arc::new(g);
                let mut partitioner = DistributedPartitioner::new(graph, comm, PartitionerConfig::default());
                partitioner.initialise(5).await
            })
            .await;
        for r in results {
            assert_eq!(r, Err(PartitionerError::UnderSizedCommunicator { ranks: 2, parts: 5 }));
        }
    }
}
