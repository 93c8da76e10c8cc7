//! Demo binary: each rank builds its slice of a ring-connected graph, finalises it, partitions
//! it, then runs one ghost-value exchange round and logs what it received.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use log::info;
use rand::Rng;

use mesh_comm::Communicator;
use mesh_graph::DistributedGraph;
use mesh_net::TcpMesh;
use mesh_runtime::{AnyExchange, AnyPartitioner, ExchangeStrategy, MeshConfig, PartitionerKind};

#[derive(Parser)]
struct Cli {
    /// This process's rank.
    #[arg(long)]
    id: u32,
    /// Nodes owned by each rank.
    #[arg(long, default_value_t = 4)]
    width: u32,
    /// Parts to split the (post-exchange) graph into.
    #[arg(long, default_value_t = 0)]
    parts: usize,
    #[arg(long, value_enum, default_value = "two-sided")]
    strategy: StrategyArg,
    /// One `host:port` listen address per rank, in rank order.
    #[arg(value_name = "HOST_FILE")]
    host_file: PathBuf,
}

#[derive(Clone, clap::ValueEnum)]
enum StrategyArg {
    TwoSided,
    OneSided,
}

impl From<StrategyArg> for ExchangeStrategy {
    fn from(value: StrategyArg) -> Self {
        match value {
            StrategyArg::TwoSided => ExchangeStrategy::TwoSided,
            StrategyArg::OneSided => ExchangeStrategy::OneSided,
        }
    }
}

/// Builds this rank's slice of a ring: `width` owned nodes with contiguous global IDs, plus a
/// ghost of the first node belonging to the next rank around the ring (so every rank has
/// something to receive in the exchange round below).
fn build_ring_graph(comm: Communicator, rank: u32, n_ranks: u32, width: u32) -> DistributedGraph<u32> {
    let mut graph = DistributedGraph::new(comm);
    let base = rank * width;
    for n in base..base + width {
        graph.add_local_node(n).expect("fresh local node id");
    }
    let next_rank = (rank + 1) % n_ranks;
    let next_base = next_rank * width;
    if next_rank != rank {
        graph.add_ghost_node(next_base).expect("fresh ghost node id");
        graph
            .add_edge(&(base + width - 1), &next_base)
            .expect("owned tail to neighbour head");
    }
    graph
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let config = MeshConfig::from_host_file(&cli.host_file).expect("readable host file");
    let mut mesh = TcpMesh::from_addresses(cli.id, &config.listen_addresses);
    mesh.listen().await.expect("bind listen address");
    mesh.connect_all().await.expect("connect to every peer");
    let n_ranks = config.listen_addresses.len() as u32;

    let comm = Communicator::new(Arc::new(mesh));
    info!("rank {} connected to {} peers", cli.id, comm.size());

    let mut graph = build_ring_graph(comm.clone(), cli.id, n_ranks, cli.width);
    graph.finalize().await.expect("graph finalisation");
    info!(
        "rank {} finalised: {} local, {} ghost",
        cli.id,
        graph.get_local_nodes().unwrap().len(),
        graph.get_ghost_nodes().unwrap().len()
    );

    let n_parts = if cli.parts == 0 { comm.size() } else { cli.parts };
    let graph = Arc::new(graph);
    let mut partitioner =
        AnyPartitioner::new(PartitionerKind::Naive, graph.clone(), comm.clone(), Default::default());
    partitioner.initialise(n_parts).await.expect("initialise partitioner");
    partitioner.partition().await.expect("compute partition");
    let owned_after = partitioner.assign_rank_nodes().await.expect("redistribute nodes");
    info!("rank {} owns {} nodes after partitioning", cli.id, owned_after.len());

    let (plan, order) = mesh_exchange::build_exchange_plan(&comm, &graph)
        .await
        .expect("build exchange plan");
    let plan = Arc::new(plan);

    // `order` lists this rank's exchange slots in the same local-then-ghost order
    // `build_exchange_plan` used to build them: the first `local_len` are this rank's own
    // values to send out, the remainder are ghost slots waiting to be filled in.
    let local_len = graph.get_local_nodes().unwrap().len();
    let mut rng = rand::thread_rng();
    let mut values: Vec<u64> = (0..order.len())
        .map(|i| if i < local_len { rng.gen_range(0..1000) } else { 0 })
        .collect();

    let strategy: ExchangeStrategy = cli.strategy.into();
    let mut exchange = AnyExchange::new(strategy, comm, plan);
    exchange.start(&values).await.expect("start exchange");
    exchange.stop(&mut values).await.expect("stop exchange");

    info!("rank {} exchange round complete: {:?}", cli.id, values);
}
