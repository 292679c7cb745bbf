//! Serialization of everything that crosses a boundary: log entries going into the replicated log,
//! snapshots, and REST bodies exchanged between router and log host.
mod json;

pub use json::CodecOptions;
pub use json::JsonCodec;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// WireCodec turns values into bytes and back. The replicated state only relies on this contract,
/// never on the concrete format.
pub trait WireCodec: Send + Sync {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Bytes, CodecError>;

    fn decode<T: DeserializeOwned + Serialize>(&self, bytes: &[u8]) -> Result<T, CodecError>;
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Failed to encode value: {0}")]
    Encode(serde_json::Error),
    #[error("Failed to decode value: {0}")]
    Decode(serde_json::Error),
    #[error("Unknown field '{0}'")]
    UnknownField(String),
}
