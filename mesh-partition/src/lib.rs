//! §4.7 Partitioner facade: one interface, three interchangeable back-ends bound to a finalised
//! [`mesh_graph::DistributedGraph`] snapshot.

pub mod config;
pub mod distributed;
pub mod error;
pub mod naive;
pub mod serial;

pub use config::PartitionerConfig;
pub use distributed::DistributedPartitioner;
pub use error::PartitionerError;
pub use naive::NaivePartitioner;
pub use serial::MetisPartitioner;

use async_trait::async_trait;
use std::hash::Hash;

use mesh_comm::WireElement;
use mesh_graph::DistributedGraph;

/// Any node this rank already knows about, local or ghost, for back-ends that need a filler
/// value of type `N` to pre-fill `LocalAdjacency`'s slot-based `get_nodes`/`get_edges` output
/// before overwriting it (those APIs write into caller-owned slices rather than handing back
/// an iterator, since `N` carries no `Default` bound).
pub(crate) fn any_known_node<N>(graph: &DistributedGraph<N>) -> Result<N, PartitionerError>
where
    N: Clone + Eq + Ord + Hash + WireElement,
{
    if let Some(n) = graph.get_local_nodes()?.into_iter().next() {
        return Ok(n);
    }
    graph
        .get_ghost_nodes()?
        .into_iter()
        .next()
        .ok_or_else(|| PartitionerError::BackendError("rank knows no nodes to use as a CSR filler".into()))
}

/// `initialise` binds the desired part count (checked against the communicator's rank count);
/// `partition` computes, for each of this rank's locally-known nodes, which part it belongs to;
/// `assign_rank_nodes` is the collective redistribution step and consumes the partitioner,
/// returning the nodes this rank now owns under the new partitioning.
#[async_trait]
pub trait Partitioner<N> {
    async fn initialise(&mut self, n_parts: usize) -> Result<(), PartitionerError>;
    async fn partition(&mut self) -> Result<(), PartitionerError>;
    async fn assign_rank_nodes(self) -> Result<Vec<N>, PartitionerError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use mesh_comm::Communicator;
    use mesh_graph::DistributedGraph;
    use std::sync::Arc;

    #[tokio::test]
    async fn naive_partitioner_splits_ten_nodes_across_three_ranks() {
        let mesh = mesh_net::LocalTestMesh::new(3).await.unwrap();
        let results = mesh
            .run_all(|rank, transport| async move {
                let comm = Communicator::new(Arc::new(transport));
                let mut g: DistributedGraph<u32> = DistributedGraph::new(comm.clone());
                // 10 nodes total: rank 0 owns 4, rank 1 owns 3, rank 2 owns 3, matching the
                // reference split this scenario is checked against.
                let (start, count) = match rank {
                    0 => (0u32, 4u32),
                    1 => (4, 3),
                    _ => (7, 3),
                };
                for n in start..start + count {
                    g.add_local_node(n).unwrap();
                }
                g.finalize().await.unwrap();

                let graph = Arc::new(g);
                let mut partitioner = NaivePartitioner::new(graph, comm, PartitionerConfig::default());
                partitioner.initialise(3).await.unwrap();
                partitioner.partition().await.unwrap();
                let mut owned = partitioner.assign_rank_nodes().await.unwrap();
                owned.sort();
                owned
            })
            .await;

        assert_eq!(results[0], vec![0, 1, 2, 3]);
        assert_eq!(results[1], vec![4, 5, 6]);
        assert_eq!(results[2], vec![7, 8, 9]);
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
                let mut partitioner = NaivePartitioner::new(graph, comm, PartitionerConfig::default());
                partitioner.initialise(5).await
            })
            .await;
        for r in results {
            assert_eq!(r, Err(PartitionerError::UnderSizedCommunicator { ranks: 2, parts: 5 }));
        }
    }
}
