//! §10.5 finalisation latency benchmark, as a function of rank count and ghost-node fraction.

use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use mesh_comm::Communicator;
use mesh_graph::DistributedGraph;
use mesh_net::LocalTestMesh;

const OWNED_PER_RANK: u32 = 64;

fn bench_finalize(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    for &ranks in &[2usize, 4, 8] {
        for &ghost_fraction in &[0.0f64, 0.25, 0.5] {
            let ghost_count = (OWNED_PER_RANK as f64 * ghost_fraction) as u32;
            c.bench_function(&format!("finalize/{ranks}_ranks/{ghost_fraction}_ghost"), |b| {
                b.iter(|| {
                    rt.block_on(async {
                        let mesh = LocalTestMesh::new(ranks).await.unwrap();
                        mesh.run_all(move |rank, transport| async move {
                            let comm = Communicator::new(Arc::new(transport));
                            let mut g: DistributedGraph<u32> = DistributedGraph::new(comm);

                            let base = rank * OWNED_PER_RANK;
                            for n in base..base + OWNED_PER_RANK {
                                g.add_local_node(n).unwrap();
                            }

                            // Ring topology: ghost the first `ghost_count` nodes of the next
                            // rank's block, with one edge each into the local block.
                            let next = (rank + 1) % ranks as u32;
                            if next != rank {
                                let next_base = next * OWNED_PER_RANK;
                                for n in next_base..next_base + ghost_count.min(OWNED_PER_RANK) {
                                    g.add_ghost_node(n).unwrap();
                                    g.add_edge(&base, &n).unwrap();
                                }
                            }

                            black_box(g.finalize().await.unwrap());
                        })
                        .await;
                    })
                })
            });
        }
    }
}

criterion_group!(benches, bench_finalize);
criterion_main!(benches);
