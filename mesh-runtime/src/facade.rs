//! Config-driven selection between partitioner back-ends and exchange-pattern variants.
//!
//! `Partitioner::assign_rank_nodes` consumes `self` by value, which rules out a `Box<dyn
//! Partitioner<N>>` (not dyn-compatible), so the choice is a plain enum dispatch instead — one
//! match arm per concrete back-end/variant, matching whichever [`PartitionerKind`] or
//! [`ExchangeStrategy`] a [`crate::MeshConfig`] names.

use std::hash::Hash;
use std::sync::Arc;

use mesh_comm::{Communicator, WireElement};
use mesh_exchange::{ExchangeError, ExchangePlan, OneSidedExchange, TwoSidedExchange};
use mesh_graph::DistributedGraph;
use mesh_partition::{
    DistributedPartitioner, MetisPartitioner, NaivePartitioner, Partitioner, PartitionerConfig,
    PartitionerError,
};

use crate::config::{ExchangeStrategy, PartitionerKind};

pub enum AnyPartitioner<N> {
    Naive(NaivePartitioner<N>),
    Metis(MetisPartitioner<N>),
    Distributed(DistributedPartitioner<N>),
}

impl<N> AnyPartitioner<N>
where
    N: Clone + Eq + Ord + Hash + WireElement,
{
    pub fn new(
        kind: PartitionerKind,
        graph: Arc<DistributedGraph<N>>,
        comm: Communicator,
        config: PartitionerConfig,
    ) -> Self {
        match kind {
            PartitionerKind::Naive => Self::Naive(NaivePartitioner::new(graph, comm, config)),
            PartitionerKind::Metis => Self::Metis(MetisPartitioner::new(graph, comm, config)),
            PartitionerKind::Distributed => {
                Self::Distributed(DistributedPartitioner::new(graph, comm, config))
            }
        }
    }

    pub async fn initialise(&mut self, n_parts: usize) -> Result<(), PartitionerError> {
        match self {
            Self::Naive(p) => p.initialise(n_parts).await,
            Self::Metis(p) => p.initialise(n_parts).await,
            Self::Distributed(p) => p.initialise(n_parts).await,
        }
    }

    pub async fn partition(&mut self) -> Result<(), PartitionerError> {
        match self {
            Self::Naive(p) => p.partition().await,
            Self::Metis(p) => p.partition().await,
            Self::Distributed(p) => p.partition().await,
        }
    }

    pub async fn assign_rank_nodes(self) -> Result<Vec<N>, PartitionerError> {
        match self {
            Self::Naive(p) => p.assign_rank_nodes().await,
            Self::Metis(p) => p.assign_rank_nodes().await,
            Self::Distributed(p) => p.assign_rank_nodes().await,
        }
    }
}

pub enum AnyExchange<T> {
    TwoSided(TwoSidedExchange<T>),
    OneSided(OneSidedExchange<T>),
}

impl<T: WireElement> AnyExchange<T> {
    pub fn new(strategy: ExchangeStrategy, comm: Communicator, plan: Arc<ExchangePlan>) -> Self {
        match strategy {
            ExchangeStrategy::TwoSided => Self::TwoSided(TwoSidedExchange::new(comm, plan)),
            ExchangeStrategy::OneSided => Self::OneSided(OneSidedExchange::new(comm, plan)),
        }
    }

    pub async fn start(&mut self, local_values: &[T]) -> Result<(), ExchangeError> {
        match self {
            Self::TwoSided(e) => e.start(local_values).await,
            Self::OneSided(e) => e.start(local_values).await,
        }
    }

    pub async fn stop(&mut self, local_values: &mut [T]) -> Result<(), ExchangeError> {
        match self {
            Self::TwoSided(e) => e.stop(local_values).await,
            Self::OneSided(e) => e.stop(local_values).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn any_partitioner_naive_matches_direct_naive_partitioner() {
        let mesh = mesh_net::LocalTestMesh::new(2).await.unwrap();
        let results = mesh
            .run_all(|rank, transport| async move {
                let comm = Communicator::new(Arc::new(transport));
                let mut g: DistributedGraph<u32> = DistributedGraph::new(comm.clone());
                let (start, count) = if rank == 0 { (0u32, 3u32) } else { (3, 3) };
                for n in start..start + count {
                    g.add_local_node(n).unwrap();
                }
                g.finalize().await.unwrap();

                let graph = Arc::new(g);
                let mut partitioner =
                    AnyPartitioner::new(PartitionerKind::Naive, graph, comm, PartitionerConfig::default());
                partitioner.initialise(2).await.unwrap();
                partitioner.partition().await.unwrap();
                let mut owned = partitioner.assign_rank_nodes().await.unwrap();
                owned.sort();
                owned
            })
            .await;

        assert_eq!(results[0], vec![0, 1, 2]);
        assert_eq!(results[1], vec![3, 4, 5]);
    }
}
