use crate::error::MeshError;
use crate::types::{TypeRegistry, WireElement};
use tokio_util::bytes::Bytes;

/// Checked against `T`'s registration once per call site; layers above `collectives` (e.g.
/// `mesh-exchange`'s point-to-point transfers) reuse this rather than duplicating the check.
pub fn require_registered<T: WireElement>(registry: &TypeRegistry) -> Result<(), MeshError> {
    registry.descriptor_for::<T>().map(|_| ())
}

pub fn encode<T: WireElement>(items: &[T]) -> Result<Bytes, MeshError> {
    Ok(Bytes::from(bincode::serialize(items)?))
}

pub fn decode<T: WireElement>(bytes: &Bytes) -> Result<Vec<T>, MeshError> {
    Ok(bincode::deserialize(bytes)?)
}
