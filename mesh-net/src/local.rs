//! A loopback-TCP harness that runs every simulated rank as its own `tokio` task in one process.
//!
//! Used by `mesh-comm`/`mesh-graph`/`mesh-exchange`'s own multi-rank tests, and by downstream
//! demos that want to exercise the whole stack without a real cluster.

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;

use futures::stream::{FuturesOrdered, FuturesUnordered};
use futures::{StreamExt, TryStreamExt};
use log::trace;
use tokio::net::TcpListener;

use crate::tcp::TcpMesh;
use crate::MeshNetError;

/// A set of `n_parties` [`TcpMesh`] transports, fully connected to each other over loopback.
pub struct LocalTestMesh {
    nodes: HashMap<u32, TcpMesh>,
}

impl LocalTestMesh {
    pub async fn new(n_parties: usize) -> Result<Self, MeshNetError> {
        let mut listeners = Vec::with_capacity(n_parties);
        let mut addrs: Vec<SocketAddr> = Vec::with_capacity(n_parties);
        for _ in 0..n_parties {
            let listener = TcpListener::bind("127.0.0.1:0").await?;
            addrs.push(listener.local_addr()?);
            listeners.push(listener);
        }

        let futures = FuturesUnordered::new();
        for (rank, listener) in listeners.into_iter().enumerate() {
            let addrs = addrs.clone();
            futures.push(Box::pin(async move {
                let mut mesh = TcpMesh::from_addresses(rank as u32, &addrs);
                // `TcpMesh::listen` would rebind; we already own the listener, so splice it in.
                mesh.set_listener(listener);
                mesh.connect_all().await?;
                Ok::<_, MeshNetError>((rank as u32, mesh))
            }));
        }
        let nodes: HashMap<u32, TcpMesh> = futures.try_collect().await?;
        trace!("LocalTestMesh: {} ranks connected", nodes.len());
        Ok(Self { nodes })
    }

    pub fn get(&self, rank: u32) -> &TcpMesh {
        &self.nodes[&rank]
    }

    pub fn n_parties(&self) -> usize {
        self.nodes.len()
    }

    /// Run `f` against each rank's transport concurrently, returning results ordered by rank.
    pub async fn run_all<F, K>(self, f: impl Fn(u32, TcpMesh) -> F + Send + Sync + Clone + 'static) -> Vec<K>
    where
        F: Future<Output = K> + Send,
        K: Send + 'static,
    {
        let mut ordered: Vec<(u32, TcpMesh)> = self.nodes.into_iter().collect();
        ordered.sort_by_key(|(rank, _)| *rank);

        let mut futs = FuturesOrdered::new();
        for (rank, mesh) in ordered {
            let f = f.clone();
            futs.push_back(tokio::spawn(async move { f(rank, mesh).await }));
        }
        futs.map(|r| r.expect("rank task panicked")).collect().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Channel, Transport};
    use tokio_util::bytes::Bytes;

    #[tokio::test]
    async fn ring_send_recv() {
        const N: usize = 4;
        let mesh = LocalTestMesh::new(N).await.unwrap();
        assert_eq!(mesh.n_parties(), N);

        let results = mesh
            .run_all(|rank, transport| async move {
                let next = (rank + 1) % N as u32;
                let prev = (rank + N as u32 - 1) % N as u32;
                transport
                    .send_to(next, Bytes::from(vec![rank as u8]), Channel::Collective)
                    .await
                    .unwrap();
                let got = transport.recv_from(prev, Channel::Collective).await.unwrap();
                got[0]
            })
            .await;

        for (rank, got) in results.into_iter().enumerate() {
            let expected_prev = ((rank + N - 1) % N) as u8;
            assert_eq!(got, expected_prev);
        }
    }
}
