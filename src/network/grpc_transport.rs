use crate::grpc::grpc_prototype_state_client::GrpcPrototypeStateClient;
use crate::grpc::{ProtoRestRequest, ProtoRestResponse, ProtoRestVerb};
use crate::network::{RestRequest, RestResponse, RestVerb, Transport, TransportError};
use crate::types::ServerId;
use bytes::Bytes;
use std::collections::HashMap;
use std::convert::TryFrom;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::Mutex;
use tonic::codegen::http::StatusCode;
use tonic::transport::{Channel, Endpoint};

/// GrpcTransport tunnels REST requests through the `GrpcPrototypeState` service of the target
/// server. Connections are established lazily and reused.
pub struct GrpcTransport {
    logger: slog::Logger,
    members: HashMap<ServerId, SocketAddr>,
    request_timeout: Duration,
    clients: Mutex<HashMap<ServerId, GrpcPrototypeStateClient<Channel>>>,
}

impl GrpcTransport {
    pub fn new(logger: slog::Logger, members: HashMap<ServerId, SocketAddr>, request_timeout: Duration) -> Self {
        GrpcTransport {
            logger,
            members,
            request_timeout,
            clients: Mutex::new(HashMap::new()),
        }
    }

    async fn client(&self, server: &ServerId) -> Result<GrpcPrototypeStateClient<Channel>, TransportError> {
        let mut clients = self.clients.lock().await;
        if let Some(client) = clients.get(server) {
            return Ok(client.clone());
        }

        let socket_addr = self
            .members
            .get(server)
            .ok_or_else(|| TransportError::UnknownServer(server.clone()))?;
        let url = format!("http://{}", socket_addr);
        slog::info!(self.logger, "Connecting to {} at {}", server, url);
        let channel = Endpoint::from_shared(url)
            .map_err(|_| TransportError::InvalidAddress(server.clone()))?
            .timeout(self.request_timeout)
            .connect_lazy()
            .map_err(|_| TransportError::InvalidAddress(server.clone()))?;

        let client = GrpcPrototypeStateClient::new(channel);
        clients.insert(server.clone(), client.clone());
        Ok(client)
    }

    fn convert_request(request: RestRequest) -> ProtoRestRequest {
        let verb = match request.verb {
            RestVerb::Get => ProtoRestVerb::Get,
            RestVerb::Post => ProtoRestVerb::Post,
            RestVerb::Delete => ProtoRestVerb::Delete,
        };

        ProtoRestRequest {
            verb: verb as i32,
            path: request.path,
            parameters: request.parameters.into_iter().collect(),
            body: request.body.to_vec(),
        }
    }

    fn convert_response(server: &ServerId, response: ProtoRestResponse) -> Result<RestResponse, TransportError> {
        let status = u16::try_from(response.status_code)
            .ok()
            .and_then(|code| StatusCode::from_u16(code).ok())
            .ok_or_else(|| TransportError::InvalidStatus {
                server: server.clone(),
                status: response.status_code,
            })?;

        Ok(RestResponse::new(status, Bytes::from(response.body)))
    }
}

#[async_trait::async_trait]
impl Transport for GrpcTransport {
    async fn send(&self, server: &ServerId, request: RestRequest) -> Result<RestResponse, TransportError> {
        let mut client = self.client(server).await?;

        slog::debug!(self.logger, "ClientWire - {} {:?}", server, request);
        let rpc_request = Self::convert_request(request);
        let rpc_result = tokio::time::timeout(self.request_timeout, client.execute(rpc_request))
            .await
            .map_err(|_| TransportError::Timeout(server.clone()))?;
        slog::debug!(self.logger, "ClientWire - {} {:?}", server, rpc_result);

        let rpc_response = rpc_result
            .map_err(|status| TransportError::Rpc {
                server: server.clone(),
                status,
            })?
            .into_inner();
        Self::convert_response(server, rpc_response)
    }
}
