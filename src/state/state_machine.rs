use crate::codec::CodecError;
use crate::types::LogIndex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;

/// StateMachine is the contract a replicated state implements. Implementations must be
/// deterministic: applying the same entries in the same order to the same starting state always
/// yields the same state.
pub trait StateMachine: Default + Send + Sync + 'static {
    type Entry: Serialize + DeserializeOwned + Debug + Send + Sync + 'static;
    type Snapshot: Serialize + DeserializeOwned + Clone + Debug + PartialEq + Send + Sync + 'static;

    /// apply folds `entry` into the state. An entry that fails must leave the state untouched.
    fn apply(&mut self, entry: Self::Entry) -> Result<(), ApplyError>;

    fn snapshot(&self) -> Self::Snapshot;

    fn install(&mut self, snapshot: Self::Snapshot);
}

/// ApplyError is fatal for the state instance that returns it. The instance must be rebuilt from a
/// snapshot rather than carry on.
#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    #[error("Expected entry {expected:?} next, got {actual:?}")]
    Gap { expected: LogIndex, actual: LogIndex },

    #[error("Snapshot at {snapshot:?} is older than applied index {applied:?}")]
    StaleSnapshot { applied: LogIndex, snapshot: LogIndex },

    #[error("Undecodable entry at {index:?}: {source}")]
    Decode { index: LogIndex, source: CodecError },

    #[error("Entry rejected by state machine: {0}")]
    Rejected(String),

    #[error("State failed after {applied:?} and awaits a snapshot")]
    AwaitingSnapshot { applied: LogIndex },
}
