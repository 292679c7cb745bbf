use prototype_state::{
    create_rest_handler, start_rpc_server, InMemoryLogOptions, InMemoryReplicatedLog, JsonCodec, LogId,
    MethodsOptions, PrototypeStateRegistry, RestHandlerConfig, ServerId,
};
use slog::Drain;
use std::error::Error;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

const DEFAULT_PORT: u16 = 8529;

/// Boots a single log host: one in-memory log led by this node, with a prototype state on top,
/// served until Ctrl-C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let port = match std::env::args().nth(1) {
        Some(port) => port.parse::<u16>()?,
        None => DEFAULT_PORT,
    };
    let server_id = ServerId::new(format!("node-{}", port));
    let logger = create_root_logger_for_stdout(&server_id);

    let log_id = LogId::new(1);
    let log = InMemoryReplicatedLog::create(
        logger.clone(),
        log_id,
        vec![server_id.clone()],
        InMemoryLogOptions::default(),
    )?;
    let participant = log
        .participant(&server_id)
        .ok_or("This server is not a participant of its own log")?;

    let registry = Arc::new(PrototypeStateRegistry::new(logger.clone(), JsonCodec::default(), None));
    registry.create_state(participant)?;
    let term = log.elect(&server_id).await?;
    slog::info!(logger, "Leading log {} in term {:?}", log_id, term);

    let handler = create_rest_handler(RestHandlerConfig {
        logger: logger.clone(),
        registry,
        options: MethodsOptions::default(),
    })?;
    let socket_addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    let server = start_rpc_server(logger.clone(), handler, socket_addr);

    tokio::signal::ctrl_c().await?;
    slog::info!(logger, "Shutting down");
    server.shutdown();

    Ok(())
}

fn create_root_logger_for_stdout(server_id: &ServerId) -> slog::Logger {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).use_file_location().build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();

    slog::Logger::root(drain, slog::o!("ServerId" => server_id.to_string()))
}
