mod api;
mod codec;
mod commitlog;
mod network;
mod replicated_log;
mod server;
mod state;
mod types;
mod grpc {
    include!("../generated/prototype_state.rs");
}

pub use api::create_prototype_state_methods;
pub use api::create_rest_handler;
pub use api::start_rpc_server;
pub use api::ForwardingMethods;
pub use api::LocalMethods;
pub use api::MethodsConfig;
pub use api::MethodsCreationError;
pub use api::MethodsError;
pub use api::MethodsOptions;
pub use api::NodeContext;
pub use api::PrototypeStateMethods;
pub use api::PrototypeStateServer;
pub use api::RestHandlerConfig;
pub use api::ServerRole;
pub use codec::CodecError;
pub use codec::CodecOptions;
pub use codec::JsonCodec;
pub use codec::WireCodec;
pub use network::GrpcTransport;
pub use network::InProcessTransport;
pub use network::LeaderResolver;
pub use network::ResolveError;
pub use network::RestRequest;
pub use network::RestResponse;
pub use network::RestVerb;
pub use network::StaticLeaderResolver;
pub use network::Transport;
pub use network::TransportError;
pub use replicated_log::InMemoryLogCreationError;
pub use replicated_log::InMemoryLogOptions;
pub use replicated_log::InMemoryLogParticipant;
pub use replicated_log::InMemoryReplicatedLog;
pub use replicated_log::LogEntry;
pub use replicated_log::LogError;
pub use replicated_log::LogRole;
pub use replicated_log::LogRoleListener;
pub use replicated_log::ReplicatedLog;
pub use server::RestHandler;
pub use state::ApplyError;
pub use state::FollowerState;
pub use state::LeaderState;
pub use state::LeaderStateError;
pub use state::PrototypeLogEntry;
pub use state::PrototypeStateMachine;
pub use state::PrototypeStateRegistry;
pub use state::RegistryError;
pub use state::ReplicatedStateRegistry;
pub use state::ReplicatedStateRole;
pub use state::Snapshot;
pub use state::SnapshotSource;
pub use state::SnapshotSourceError;
pub use state::StateMachine;
pub use types::LogId;
pub use types::LogIndex;
pub use types::LogTerm;
pub use types::ServerId;

// `crate::{root_mod}` holds no code, only `mod` and `pub use` statements. No `mod` is `pub`;
// everything public is exported individually from here.
