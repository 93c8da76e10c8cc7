//! Two-sided non-blocking neighbour exchange: every neighbour send posts a non-blocking send,
//! every neighbour receive posts a matching non-blocking receive, and `stop` waits on all of
//! them. Grounded on `original_source/include/comm/implementation/component/
//! ExchangePatternTwoSidedNonBlocking.h`/`.cpp`.

use std::sync::Arc;

use futures::stream::FuturesOrdered;
use futures::TryStreamExt;
use mesh_comm::collectives::wire::{decode, encode, require_registered};
use mesh_comm::{Communicator, WireElement};
use mesh_net::Channel;
use tokio::task::JoinHandle;

use crate::error::ExchangeError;
use crate::plan::ExchangePlan;

/// Drives one send/receive round of `T` values over a [`ExchangePlan`] using point-to-point
/// non-blocking transfers on the dedicated exchange channel.
pub struct TwoSidedExchange<T> {
    comm: Communicator,
    plan: Arc<ExchangePlan>,
    in_flight: Option<Vec<JoinHandle<Result<(u32, Vec<T>), ExchangeError>>>>,
}

impl<T: WireElement> TwoSidedExchange<T> {
    pub fn new(comm: Communicator, plan: Arc<ExchangePlan>) -> Self {
        Self { comm, plan, in_flight: None }
    }

    pub fn plan(&self) -> &ExchangePlan {
        &self.plan
    }

    /// Posts one non-blocking send per send-neighbour and one non-blocking receive per
    /// recv-neighbour, then returns immediately. Call [`Self::stop`] to wait for completion and
    /// scatter the received values into `local_values`.
    pub async fn start(&mut self, local_values: &[T]) -> Result<(), ExchangeError> {
        if self.in_flight.is_some() {
            return Err(ExchangeError::ExchangeInFlight);
        }
        require_registered::<T>(self.comm.registry())?;

        let packed = self.plan.pack(local_values)?;
        let mut sends = FuturesOrdered::new();
        for (i, &rank) in self.plan.send_neighbours().iter().enumerate() {
            let comm = self.comm.clone();
            let bytes = encode(&packed[i])?;
            sends.push_back(async move {
                comm.send_bytes(rank, bytes, Channel::Exchange).await.map_err(mesh_comm::MeshError::from)
            });
        }

        let mut recvs = Vec::with_capacity(self.plan.recv_neighbours().len());
        for &rank in self.plan.recv_neighbours() {
            let comm = self.comm.clone();
            recvs.push(tokio::spawn(async move {
                let bytes = comm.recv_bytes(rank, Channel::Exchange).await.map_err(mesh_comm::MeshError::from)?;
                let data = decode::<T>(&bytes)?;
                Ok::<_, ExchangeError>((rank, data))
            }));
        }

        let _: Vec<()> = sends.try_collect().await?;
        self.in_flight = Some(recvs);
        Ok(())
    }

    /// Waits for every posted receive to complete and scatters the results into `local_values`,
    /// indexed by local slot. Errors with [`ExchangeError::NoExchangeInFlight`] if `start` was
    /// never called (or its result already consumed by a prior `stop`).
    pub async fn stop(&mut self, local_values: &mut [T]) -> Result<(), ExchangeError> {
        let recvs = self.in_flight.take().ok_or(ExchangeError::NoExchangeInFlight)?;
        let mut ordered = Vec::with_capacity(recvs.len());
        for handle in recvs {
            let (rank, data) = handle.await.map_err(|_| ExchangeError::NoExchangeInFlight)??;
            ordered.push((rank, data));
        }
        // recv_neighbours() is ascending by rank; the spawned handles were created in that same
        // order, so `ordered` already matches it.
        let buffers: Vec<Vec<T>> = ordered.into_iter().map(|(_, data)| data).collect();
        self.plan.unpack(&buffers, local_values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ring_exchange_fills_ghost_slots_from_neighbour_values() {
        let mesh = mesh_net::LocalTestMesh::new(3).await.unwrap();
        let results = mesh
            .run_all(|rank, transport| async move {
                let comm = Communicator::new(Arc::new(transport));
                let me = rank as u32;
                let left = (me + 2) % 3;
                let right = (me + 1) % 3;
                // Local slot 0 is this rank's own value; slots 1/2 are ghost mirrors of the
                // left/right neighbour's value.
                let local_to_exchange = vec![me as u64, left as u64, right as u64];
                let send_pairs = vec![(left, me as u64), (right, me as u64)];
                let plan = ExchangePlan::build(&comm, local_to_exchange, send_pairs).await.unwrap();
                let plan = Arc::new(plan);

                let mut local_values = vec![me as u64 * 100, 9999, 9999];
                let mut exchange = TwoSidedExchange::<u64>::new(comm, plan);
                exchange.start(&local_values).await.unwrap();
                exchange.stop(&mut local_values).await.unwrap();
                local_values
            })
            .await;

        for (rank, values) in results.iter().enumerate() {
            let me = rank as u32;
            let left = (me + 2) % 3;
            let right = (me + 1) % 3;
            assert_eq!(values[0], me as u64 * 100);
            assert_eq!(values[1], left as u64 * 100);
            assert_eq!(values[2], right as u64 * 100);
        }
    }
}
