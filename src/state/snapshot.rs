use crate::state::StateMachine;
use crate::types::{LogId, LogIndex};
use serde::{Deserialize, Serialize};

/// Snapshot is a full copy of a state, taken once `index` was applied.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot<T> {
    pub index: LogIndex,
    pub data: T,
}

/// SnapshotSource hands out snapshots of the current leader's state. Followers that fell behind
/// the retained log use it to catch up.
#[async_trait::async_trait]
pub trait SnapshotSource<S: StateMachine>: Send + Sync {
    /// acquire_snapshot returns a snapshot of the leader of `log_id` reflecting at least
    /// `wait_for_index`.
    async fn acquire_snapshot(
        &self,
        log_id: LogId,
        wait_for_index: LogIndex,
    ) -> Result<Snapshot<S::Snapshot>, SnapshotSourceError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotSourceError {
    #[error("No leader to take a snapshot from: {0}")]
    NoLeader(String),
    #[error("Snapshot transfer failed: {0}")]
    Transfer(String),
}
