use crate::grpc::grpc_prototype_state_server::{GrpcPrototypeState, GrpcPrototypeStateServer};
use crate::grpc::{ProtoRestRequest, ProtoRestResponse, ProtoRestVerb};
use crate::network::{RestRequest, RestResponse, RestVerb};
use crate::server::{RestHandler, RpcServerShutdownSignal};
use bytes::Bytes;
use std::net::SocketAddr;
use std::sync::Arc;
use tonic::transport::Server;
use tonic::{Request, Response, Status};

/// RpcServer is the type that implements the prototype state gRPC interface. It unwraps the
/// tunneled REST request and hands it to the `RestHandler`.
pub(crate) struct RpcServer {
    logger: slog::Logger,
    handler: Arc<RestHandler>,
}

impl RpcServer {
    pub(crate) fn new(logger: slog::Logger, handler: Arc<RestHandler>) -> Self {
        RpcServer { logger, handler }
    }

    pub(crate) async fn run(self, socket_addr: SocketAddr, shutdown_signal: RpcServerShutdownSignal) {
        let logger = self.logger.clone();
        slog::info!(logger, "Listening on '{:?}'", socket_addr);

        let result = Server::builder()
            .add_service(GrpcPrototypeStateServer::new(self))
            .serve_with_shutdown(socket_addr, shutdown_signal)
            .await;

        slog::info!(logger, "Server run() has exited: {:?}", result);
    }

    async fn handle_execute(&self, rpc_request: ProtoRestRequest) -> Result<ProtoRestResponse, Status> {
        let app_request = Self::convert_request(rpc_request)?;
        let app_response = self.handler.handle(app_request).await;
        Ok(Self::convert_response(app_response))
    }

    fn convert_request(rpc_request: ProtoRestRequest) -> Result<RestRequest, Status> {
        let verb = match ProtoRestVerb::from_i32(rpc_request.verb) {
            Some(ProtoRestVerb::Get) => RestVerb::Get,
            Some(ProtoRestVerb::Post) => RestVerb::Post,
            Some(ProtoRestVerb::Delete) => RestVerb::Delete,
            None => return Err(Status::invalid_argument("Unknown REST verb")),
        };

        Ok(RestRequest {
            verb,
            path: rpc_request.path,
            parameters: rpc_request.parameters.into_iter().collect(),
            body: Bytes::from(rpc_request.body),
        })
    }

    fn convert_response(app_response: RestResponse) -> ProtoRestResponse {
        ProtoRestResponse {
            status_code: app_response.status.as_u16() as u32,
            body: app_response.body.to_vec(),
        }
    }
}

#[async_trait::async_trait]
impl GrpcPrototypeState for RpcServer {
    async fn execute(
        &self,
        rpc_request_wrapped: Request<ProtoRestRequest>,
    ) -> Result<Response<ProtoRestResponse>, Status> {
        let rpc_request = rpc_request_wrapped.into_inner();

        slog::debug!(self.logger, "ServerWire - {:?}", rpc_request);
        let rpc_result = self.handle_execute(rpc_request).await;
        slog::debug!(self.logger, "ServerWire - {:?}", rpc_result);

        rpc_result.map(Response::new)
    }
}
