use crate::api::options::MethodsOptionsValidated;
use crate::api::{ForwardingMethods, LocalMethods, MethodsCreationError, MethodsOptions, PrototypeStateMethods};
use crate::codec::{CodecOptions, JsonCodec};
use crate::network::{LeaderResolver, Transport};
use crate::server::{self, RestHandler, RpcServer, RpcServerShutdownHandle};
use crate::state::PrototypeStateRegistry;
use std::convert::TryFrom;
use std::net::SocketAddr;
use std::sync::Arc;

/// ServerRole is the part a server plays in the cluster.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ServerRole {
    /// Hosts replicated logs and the states on top of them.
    LogHost,
    /// Hosts no logs; routes client requests to log hosts.
    Router,
    /// Cluster metadata keeper. Doesn't serve prototype states.
    Agent,
}

/// NodeContext carries the collaborators of this server. Which ones are needed depends on the
/// server's role: log hosts need the registry, routers need a leader resolver and a transport.
#[derive(Clone, Default)]
pub struct NodeContext {
    pub registry: Option<Arc<PrototypeStateRegistry>>,
    pub leader_resolver: Option<Arc<dyn LeaderResolver>>,
    pub transport: Option<Arc<dyn Transport>>,
}

pub struct MethodsConfig {
    pub role: ServerRole,
    pub logger: slog::Logger,
    pub options: MethodsOptions,
    pub context: NodeContext,
}

pub fn create_prototype_state_methods(config: MethodsConfig) -> Result<PrototypeStateMethods, MethodsCreationError> {
    let options = MethodsOptionsValidated::try_from(config.options)
        .map_err(|e| MethodsCreationError::IllegalOptions(e.to_string()))?;

    match config.role {
        ServerRole::LogHost => {
            let registry = config
                .context
                .registry
                .ok_or(MethodsCreationError::MissingCollaborator("replicated state registry"))?;

            Ok(PrototypeStateMethods::Local(LocalMethods::new(registry)))
        }
        ServerRole::Router => {
            let leader_resolver = config
                .context
                .leader_resolver
                .ok_or(MethodsCreationError::MissingCollaborator("leader resolver"))?;
            let transport = config
                .context
                .transport
                .ok_or(MethodsCreationError::MissingCollaborator("transport"))?;
            let logger = config.logger.new(slog::o!("Methods" => "Forwarding"));

            Ok(PrototypeStateMethods::Forwarding(ForwardingMethods::new(
                logger,
                options,
                leader_resolver,
                transport,
            )))
        }
        ServerRole::Agent => Err(MethodsCreationError::UnsupportedRole(config.role)),
    }
}

pub struct RestHandlerConfig {
    pub logger: slog::Logger,
    pub registry: Arc<PrototypeStateRegistry>,
    pub options: MethodsOptions,
}

/// create_rest_handler builds the REST surface of a log host, serving from its local leaders.
pub fn create_rest_handler(config: RestHandlerConfig) -> Result<Arc<RestHandler>, MethodsCreationError> {
    let options = MethodsOptionsValidated::try_from(config.options)
        .map_err(|e| MethodsCreationError::IllegalOptions(e.to_string()))?;
    let codec = JsonCodec::new(CodecOptions {
        tolerate_unknown_fields: options.tolerate_unknown_fields,
    });

    Ok(Arc::new(RestHandler::new(
        config.logger,
        LocalMethods::new(config.registry),
        &options,
        codec,
    )))
}

/// PrototypeStateServer serves a `RestHandler` over gRPC until it's shut down or dropped.
pub struct PrototypeStateServer {
    socket_addr: SocketAddr,
    shutdown_handle: RpcServerShutdownHandle,
}

impl PrototypeStateServer {
    pub fn socket_addr(&self) -> SocketAddr {
        self.socket_addr
    }

    pub fn shutdown(self) {
        self.shutdown_handle.shutdown();
    }
}

/// start_rpc_server starts serving `handler` on `socket_addr`. Must be called from within a tokio
/// runtime.
pub fn start_rpc_server(logger: slog::Logger, handler: Arc<RestHandler>, socket_addr: SocketAddr) -> PrototypeStateServer {
    let (shutdown_handle, shutdown_signal) = server::shutdown_signal();

    let rpc_server = RpcServer::new(logger, handler);
    tokio::spawn(rpc_server.run(socket_addr, shutdown_signal));

    PrototypeStateServer {
        socket_addr,
        shutdown_handle,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{InProcessTransport, StaticLeaderResolver};

    fn config(role: ServerRole, context: NodeContext) -> MethodsConfig {
        MethodsConfig {
            role,
            logger: slog::Logger::root(slog::Discard, slog::o!()),
            options: MethodsOptions::default(),
            context,
        }
    }

    #[test]
    fn role_selects_variant() {
        let registry = Arc::new(PrototypeStateRegistry::new(
            slog::Logger::root(slog::Discard, slog::o!()),
            JsonCodec::default(),
            None,
        ));
        let host_context = NodeContext {
            registry: Some(registry),
            ..NodeContext::default()
        };
        let router_context = NodeContext {
            leader_resolver: Some(Arc::new(StaticLeaderResolver::new())),
            transport: Some(Arc::new(InProcessTransport::new())),
            ..NodeContext::default()
        };

        assert!(matches!(
            create_prototype_state_methods(config(ServerRole::LogHost, host_context.clone())),
            Ok(PrototypeStateMethods::Local(_))
        ));
        assert!(matches!(
            create_prototype_state_methods(config(ServerRole::Router, router_context.clone())),
            Ok(PrototypeStateMethods::Forwarding(_))
        ));
        assert!(matches!(
            create_prototype_state_methods(config(ServerRole::Agent, host_context)),
            Err(MethodsCreationError::UnsupportedRole(ServerRole::Agent))
        ));
        assert!(matches!(
            create_prototype_state_methods(config(ServerRole::LogHost, router_context)),
            Err(MethodsCreationError::MissingCollaborator(_))
        ));

        let mut bad_options = config(ServerRole::Router, NodeContext::default());
        bad_options.options.url_prefix = Some("/".to_string());
        assert!(matches!(
            create_prototype_state_methods(bad_options),
            Err(MethodsCreationError::IllegalOptions(_))
        ));
    }
}
