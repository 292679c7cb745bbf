mod applier;
mod follower_state;
mod leader_state;
mod prototype;
mod registry;
mod snapshot;
mod state_core;
mod state_machine;
mod stop_signal;

pub use follower_state::FollowerState;
pub use leader_state::{LeaderState, LeaderStateError};
pub use prototype::{PrototypeLogEntry, PrototypeStateMachine};
pub use registry::{PrototypeStateRegistry, RegistryError, ReplicatedStateRegistry, ReplicatedStateRole};
pub use snapshot::{Snapshot, SnapshotSource, SnapshotSourceError};
pub use state_machine::{ApplyError, StateMachine};
