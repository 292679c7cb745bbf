//! The client-facing entry point of prototype states, and how it's wired up per server role.
mod errors;
mod forwarding;
mod local;
mod methods;
mod options;
mod wire;
mod wiring;

pub use errors::MethodsCreationError;
pub use errors::MethodsError;
pub use forwarding::ForwardingMethods;
pub use local::LocalMethods;
pub use methods::PrototypeStateMethods;
pub use options::MethodsOptions;
pub use wiring::create_prototype_state_methods;
pub use wiring::create_rest_handler;
pub use wiring::start_rpc_server;
pub use wiring::MethodsConfig;
pub use wiring::NodeContext;
pub use wiring::PrototypeStateServer;
pub use wiring::RestHandlerConfig;
pub use wiring::ServerRole;

// So the REST surface speaks the same wire format as `ForwardingMethods`.
pub(crate) use options::MethodsOptionsValidated;
pub(crate) use wire::{operation_path, ErrorBody, IndexResult, ResultEnvelope, SnapshotEnvelope, WAIT_FOR_INDEX_PARAMETER};
