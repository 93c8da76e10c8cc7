//! §4.3 Reduce / AllReduce: element-wise sum, product, min, max over equal-length buffers.

use mesh_net::Channel;

use super::primitives::{broadcast_from_root, gather_to_root};
use crate::communicator::Communicator;
use crate::error::MeshError;
use crate::types::WireElement;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceOp {
    Sum,
    Product,
    Min,
    Max,
}

/// Numeric primitives reducible via [`ReduceOp`]. For floating-point sum/product,
/// associativity is not guaranteed — the message layer's rank-ordering is accepted as-is.
pub trait Reducible: WireElement + Copy {
    fn reduce_identity(op: ReduceOp) -> Self;
    fn reduce_apply(op: ReduceOp, a: Self, b: Self) -> Self;
}

macro_rules! impl_reducible_int {
    ($t:ty) => {
        impl Reducible for $t {
            fn reduce_identity(op: ReduceOp) -> Self {
                match op {
                    ReduceOp::Sum => 0,
                    ReduceOp::Product => 1,
                    ReduceOp::Min => <$t>::MAX,
                    ReduceOp::Max => <$t>::MIN,
                }
            }
            fn reduce_apply(op: ReduceOp, a: Self, b: Self) -> Self {
                match op {
                    ReduceOp::Sum => a + b,
                    ReduceOp::Product => a * b,
                    ReduceOp::Min => a.min(b),
                    ReduceOp::Max => a.max(b),
                }
            }
        }
    };
}

macro_rules! impl_reducible_float {
    ($t:ty) => {
        impl Reducible for $t {
            fn reduce_identity(op: ReduceOp) -> Self {
                match op {
                    ReduceOp::Sum => 0.0,
                    ReduceOp::Product => 1.0,
                    ReduceOp::Min => <$t>::INFINITY,
                    ReduceOp::Max => <$t>::NEG_INFINITY,
                }
            }
            fn reduce_apply(op: ReduceOp, a: Self, b: Self) -> Self {
                match op {
                    ReduceOp::Sum => a + b,
                    ReduceOp::Product => a * b,
                    ReduceOp::Min => a.min(b),
                    ReduceOp::Max => a.max(b),
                }
            }
        }
    };
}

impl_reducible_int!(u8);
impl_reducible_int!(i8);
impl_reducible_int!(u16);
impl_reducible_int!(i16);
impl_reducible_int!(u32);
impl_reducible_int!(i32);
impl_reducible_int!(u64);
impl_reducible_int!(i64);
impl_reducible_int!(usize);
impl_reducible_float!(f32);
impl_reducible_float!(f64);

fn fold<T: Reducible>(op: ReduceOp, buffers: &[Vec<T>], len: usize) -> Vec<T> {
    let mut out = vec![T::reduce_identity(op); len];
    for buf in buffers {
        for (acc, v) in out.iter_mut().zip(buf.iter()) {
            *acc = T::reduce_apply(op, *acc, *v);
        }
    }
    out
}

/// Reduce: result lands only on the sink rank.
pub async fn reduce<T: Reducible>(
    comm: &Communicator,
    local: &[T],
    op: ReduceOp,
) -> Result<Option<Vec<T>>, MeshError> {
    if local.is_empty() {
        return Err(MeshError::EmptyPayload);
    }
    if comm.size() == 1 {
        return Ok(Some(local.to_vec()));
    }
    let root = comm.root_rank();
    let gathered = gather_to_root(comm, local, root, Channel::Collective).await?;
    Ok(gathered.map(|chunks| {
        for chunk in &chunks {
            debug_assert_eq!(chunk.len(), local.len(), "reduce: buffer length mismatch across ranks");
        }
        fold(op, &chunks, local.len())
    }))
}

/// AllReduce: result is replicated to every rank.
pub async fn all_reduce<T: Reducible>(comm: &Communicator, local: &[T], op: ReduceOp) -> Result<Vec<T>, MeshError> {
    if local.is_empty() {
        return Err(MeshError::EmptyPayload);
    }
    if comm.size() == 1 {
        return Ok(local.to_vec());
    }
    let root = comm.root_rank();
    let gathered = gather_to_root(comm, local, root, Channel::Collective).await?;
    let folded = gathered.map(|chunks| fold(op, &chunks, local.len()));
    let folded_ref = folded.as_deref();
    broadcast_from_root(comm, folded_ref, root, Channel::Collective).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn all_reduce_sum_matches_arithmetic_series() {
        let mesh = mesh_net::LocalTestMesh::new(4).await.unwrap();
        let results = mesh
            .run_all(|rank, transport| async move {
                let comm = Communicator::new(Arc::new(transport));
                all_reduce(&comm, &[rank as u64 + 1], ReduceOp::Sum).await.unwrap()
            })
            .await;
        for r in results {
            assert_eq!(r, vec![10]);
        }
    }

    #[tokio::test]
    async fn reduce_max_lands_only_on_root() {
        let mesh = mesh_net::LocalTestMesh::new(3).await.unwrap();
        let results = mesh
            .run_all(|rank, transport| async move {
                let comm = Communicator::new(Arc::new(transport));
                reduce(&comm, &[rank as i32 * 7], ReduceOp::Max).await.unwrap()
            })
            .await;
        assert_eq!(results[0], Some(vec![14]));
        assert!(results[1].is_none());
        assert!(results[2].is_none());
    }
}
