use thiserror::Error;

/// Errors surfaced across the Communicator/TypeRegistry/Collectives API (§7).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MeshError {
    #[error("payload must contain at least one element")]
    EmptyPayload,
    #[error("buffer size mismatch: {detail}")]
    SizeMismatch { detail: String },
    #[error("element type `{0}` has no registered wire descriptor")]
    UnregisteredType(&'static str),
    #[error("index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("buffer undersized: need at least {need}, got {got}")]
    Undersized { need: usize, got: usize },
    #[error("transport error: {0}")]
    TransportError(String),
    #[error("wire encoding error: {0}")]
    EncodingError(String),
    #[error("this rank is not the collective's root")]
    NotRoot,
    #[error("fewer ranks ({ranks}) in the communicator than requested parts ({parts})")]
    UnderSizedCommunicator { ranks: usize, parts: usize },
}

impl From<mesh_net::MeshNetError> for MeshError {
    fn from(e: mesh_net::MeshNetError) -> Self {
        MeshError::TransportError(e.to_string())
    }
}

impl From<Box<bincode::ErrorKind>> for MeshError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        MeshError::EncodingError(e.to_string())
    }
}
