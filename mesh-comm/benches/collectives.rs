//! §10.5 collective throughput benchmarks, as a function of rank count.

use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use mesh_comm::collectives::{all_reduce, all_to_all, broadcast, ReduceOp};
use mesh_comm::Communicator;
use mesh_net::LocalTestMesh;

const PAYLOAD_LEN: usize = 1 << 12;

fn bench_all_to_all(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    for &ranks in &[2usize, 4, 8] {
        c.bench_function(&format!("all_to_all/{ranks}_ranks"), |b| {
            b.iter(|| {
                rt.block_on(async {
                    let mesh = LocalTestMesh::new(ranks).await.unwrap();
                    mesh.run_all(move |_rank, transport| async move {
                        let comm = Communicator::new(Arc::new(transport));
                        let payload: Vec<u32> = (0..PAYLOAD_LEN as u32).collect();
                        black_box(all_to_all(&comm, &payload, PAYLOAD_LEN / ranks).await.unwrap());
                    })
                    .await;
                })
            })
        });
    }
}

fn bench_broadcast(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    for &ranks in &[2usize, 4, 8] {
        c.bench_function(&format!("broadcast/{ranks}_ranks"), |b| {
            b.iter(|| {
                rt.block_on(async {
                    let mesh = LocalTestMesh::new(ranks).await.unwrap();
                    mesh.run_all(move |rank, transport| async move {
                        let comm = Communicator::new(Arc::new(transport));
                        let payload: Vec<u32> = (0..PAYLOAD_LEN as u32).collect();
                        let sent = if rank == comm.root_rank() { &payload[..] } else { &[] };
                        black_box(broadcast(&comm, sent).await.unwrap());
                    })
                    .await;
                })
            })
        });
    }
}

fn bench_all_reduce(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    for &ranks in &[2usize, 4, 8] {
        c.bench_function(&format!("all_reduce/{ranks}_ranks"), |b| {
            b.iter(|| {
                rt.block_on(async {
                    let mesh = LocalTestMesh::new(ranks).await.unwrap();
                    mesh.run_all(move |_rank, transport| async move {
                        let comm = Communicator::new(Arc::new(transport));
                        let payload: Vec<u64> = (0..256).collect();
                        black_box(all_reduce(&comm, &payload, ReduceOp::Sum).await.unwrap());
                    })
                    .await;
                })
            })
        });
    }
}

criterion_group!(benches, bench_all_to_all, bench_broadcast, bench_all_reduce);
criterion_main!(benches);
