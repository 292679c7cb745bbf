mod actor;
mod algorithms;
mod api;
mod in_memory;
mod log_entry;
mod role_listener;

pub use api::{LogEntry, LogError, LogRole, ReplicatedLog};
pub use in_memory::{InMemoryLogCreationError, InMemoryLogOptions, InMemoryLogParticipant, InMemoryReplicatedLog};
pub use role_listener::LogRoleListener;
