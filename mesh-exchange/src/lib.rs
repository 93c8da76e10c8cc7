//! §4.6 ExchangePattern: a precomputed neighbour-communication plan driven off a finalised
//! [`mesh_graph::DistributedGraph`], plus the two-sided and one-sided non-blocking transfer
//! variants built on top of it.

pub mod error;
pub mod one_sided;
pub mod plan;
pub mod two_sided;

pub use error::ExchangeError;
pub use one_sided::OneSidedExchange;
pub use plan::{ExchangeId, ExchangePlan};
pub use two_sided::TwoSidedExchange;

use mesh_comm::{Communicator, WireElement};
use mesh_graph::DistributedGraph;

/// Builds the `local_to_exchange`/send-pair inputs an [`ExchangePlan`] needs straight from a
/// finalised graph: local slots are this rank's owned nodes followed by its ghosts (the same
/// ordering [`DistributedGraph::get_local_nodes`]/`get_ghost_nodes` already expose), and the send
/// pairs come directly from the graph's send CSR. Corresponds to the original data structure's
/// `buildExchangePattern`, implemented here rather than on `DistributedGraph` itself so that
/// `mesh-graph` does not need to depend on `mesh-exchange`.
pub async fn build_exchange_plan<N>(
    comm: &Communicator,
    graph: &DistributedGraph<N>,
) -> Result<(ExchangePlan, Vec<N>), ExchangeError>
where
    N: Clone + Eq + Ord + std::hash::Hash + WireElement,
{
    let local = graph.get_local_nodes()?;
    let ghosts = graph.get_ghost_nodes()?;

    let mut local_to_exchange = Vec::with_capacity(local.len() + ghosts.len());
    for n in local.iter().chain(ghosts.iter()) {
        local_to_exchange.push(graph.global_id_of(n)?);
    }

    let send_csr = graph.send_csr()?;
    let mut send_pairs = Vec::new();
    for (i, &rank) in send_csr.rank.iter().enumerate() {
        for &gid in &send_csr.gid[send_csr.offset[i]..send_csr.offset[i + 1]] {
            send_pairs.push((rank, gid));
        }
    }

    let plan = ExchangePlan::build(comm, local_to_exchange, send_pairs).await?;
    let mut order = local;
    order.extend(ghosts);
    Ok((plan, order))
}
