mod rest_handler;
mod server;
mod shutdown;

pub use rest_handler::RestHandler;
pub(crate) use server::RpcServer;

pub(crate) use shutdown::shutdown_signal;
pub(crate) use shutdown::RpcServerShutdownHandle;
pub(crate) use shutdown::RpcServerShutdownSignal;
