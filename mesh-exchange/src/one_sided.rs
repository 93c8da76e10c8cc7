//! One-sided non-blocking neighbour exchange: conceptually, each rank opens an access epoch and
//! puts its outgoing values directly into its neighbours' exposed windows, without the target
//! posting a matching receive. Grounded on `original_source/include/comm/implementation/component/
//! ExchangePatternOneSidedNonBlocking.h`/`.cpp`.
//!
//! There is no passive remote-memory-write primitive over the TCP transport this runtime is
//! built on — a peer cannot land bytes in another rank's memory without that rank reading its
//! socket. This variant is therefore an honest approximation: the "window" is each rank's own
//! receive buffer, "exposing" it means posting the receives up front, and the put is an eager
//! send that the target's already-posted receive picks up. The two variants differ in *when*
//! the target commits to receiving (up front here, vs. matched per-call for the two-sided
//! variant) rather than in the number of network round-trips, which is the same for both on this
//! transport.

use std::sync::Arc;

use futures::stream::FuturesOrdered;
use futures::TryStreamExt;
use mesh_comm::collectives::wire::{decode, encode, require_registered};
use mesh_comm::{Communicator, WireElement};
use mesh_net::Channel;
use tokio::task::JoinHandle;

use crate::error::ExchangeError;
use crate::plan::ExchangePlan;

pub struct OneSidedExchange<T> {
    comm: Communicator,
    plan: Arc<ExchangePlan>,
    epoch: Option<Vec<JoinHandle<Result<(u32, Vec<T>), ExchangeError>>>>,
}

impl<T: WireElement> OneSidedExchange<T> {
    pub fn new(comm: Communicator, plan: Arc<ExchangePlan>) -> Self {
        Self { comm, plan, epoch: None }
    }

    pub fn plan(&self) -> &ExchangePlan {
        &self.plan
    }

    /// Opens this rank's exposure epoch (posts receives for every expected put) and its access
    /// epoch (puts `local_values`, packed per send neighbour, into each neighbour's window).
    pub async fn start(&mut self, local_values: &[T]) -> Result<(), ExchangeError> {
        if self.epoch.is_some() {
            return Err(ExchangeError::ExchangeInFlight);
        }
        require_registered::<T>(self.comm.registry())?;

        // Expose the window before issuing any puts, matching the spec's exposure-before-access
        // ordering even though on this transport it is just "post the receive early".
        let mut exposure = Vec::with_capacity(self.plan.recv_neighbours().len());
        for &rank in self.plan.recv_neighbours() {
            let comm = self.comm.clone();
            exposure.push(tokio::spawn(async move {
                let bytes = comm.recv_bytes(rank, Channel::Exchange).await.map_err(mesh_comm::MeshError::from)?;
                let data = decode::<T>(&bytes)?;
                Ok::<_, ExchangeError>((rank, data))
            }));
        }

        let packed = self.plan.pack(local_values)?;
        let mut puts = FuturesOrdered::new();
        for (i, &rank) in self.plan.send_neighbours().iter().enumerate() {
            let comm = self.comm.clone();
            let bytes = encode(&packed[i])?;
            puts.push_back(async move {
                comm.send_bytes(rank, bytes, Channel::Exchange).await.map_err(mesh_comm::MeshError::from)
            });
        }
        let _: Vec<()> = puts.try_collect().await?;

        self.epoch = Some(exposure);
        Ok(())
    }

    /// Closes the access/exposure epoch: waits for every put this rank's window was promised to
    /// have landed, and scatters them into `local_values`.
    pub async fn stop(&mut self, local_values: &mut [T]) -> Result<(), ExchangeError> {
        let exposure = self.epoch.take().ok_or(ExchangeError::NoExchangeInFlight)?;
        let mut ordered = Vec::with_capacity(exposure.len());
        for handle in exposure {
            let (rank, data) = handle.await.map_err(|_| ExchangeError::NoExchangeInFlight)??;
            ordered.push((rank, data));
        }
        let buffers: Vec<Vec<T>> = ordered.into_iter().map(|(_, data)| data).collect();
        self.plan.unpack(&buffers, local_values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn star_exchange_puts_hub_value_into_every_leaf_window() {
        let mesh = mesh_net::LocalTestMesh::new(4).await.unwrap();
        let results = mesh
            .run_all(|rank, transport| async move {
                let comm = Communicator::new(Arc::new(transport));
                let me = rank as u32;
                let (local_to_exchange, send_pairs, mut local_values) = if me == 0 {
                    (vec![0u64, 1, 2, 3], vec![(1u32, 0u64), (2, 0), (3, 0)], vec![100u64, 9999, 9999, 9999])
                } else {
                    (vec![me as u64, 0], vec![(0u32, me as u64)], vec![me as u64 * 100, 9999])
                };
                let plan = Arc::new(ExchangePlan::build(&comm, local_to_exchange, send_pairs).await.unwrap());
                let mut exchange = OneSidedExchange::<u64>::new(comm, plan);
                exchange.start(&local_values).await.unwrap();
                exchange.stop(&mut local_values).await.unwrap();
                local_values
            })
            .await;

        assert_eq!(results[0], vec![100, 100, 200, 300]);
        assert_eq!(results[1], vec![100, 100]);
        assert_eq!(results[2], vec![200, 100]);
        assert_eq!(results[3], vec![300, 100]);
    }
}
