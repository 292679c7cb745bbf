use crate::network::{RestRequest, RestResponse};
use crate::types::ServerId;

/// Transport delivers a REST request to a server and returns its response. Any response counts as
/// delivered, whatever its status; errors are for requests that never got one.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, server: &ServerId, request: RestRequest) -> Result<RestResponse, TransportError>;
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Unknown server {0}")]
    UnknownServer(ServerId),
    #[error("Invalid address for server {0}")]
    InvalidAddress(ServerId),
    #[error("Request to {0} timed out")]
    Timeout(ServerId),
    #[error("RPC to {server} failed: {status}")]
    Rpc { server: ServerId, status: tonic::Status },
    #[error("Server {server} answered with invalid status {status}")]
    InvalidStatus { server: ServerId, status: u32 },
}
