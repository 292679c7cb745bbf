use crate::replicated_log::role_listener::LogRoleListener;
use crate::types::{LogId, LogIndex, LogTerm, ServerId};
use bytes::Bytes;
use std::io;

/// ReplicatedLog is the local participant's view of a replicated log. Ordering, durability,
/// leader election and commit tracking all happen behind this trait. The replicated state on top
/// only ever appends (as leader), waits for commits and reads committed entries.
#[async_trait::async_trait]
pub trait ReplicatedLog: Send + Sync {
    fn log_id(&self) -> LogId;

    /// role_listener returns a listener for this participant's role in the log.
    fn role_listener(&self) -> LogRoleListener;

    /// append enqueues `payload` as the next entry, on behalf of the leader of `term`. It returns
    /// as soon as the entry has a position; the entry is not necessarily committed yet.
    async fn append(&self, term: LogTerm, payload: Bytes) -> Result<LogIndex, LogError>;

    /// wait_for_commit resolves once the entry at `index` written in `term` is committed. It fails
    /// with `Resigned` if the log moves on to another term first, or if the entry at `index` turns
    /// out to be from a different term.
    async fn wait_for_commit(&self, term: LogTerm, index: LogIndex) -> Result<(), LogError>;

    /// read_committed returns committed entries starting at `from`, in index order. It waits until
    /// at least one such entry exists.
    async fn read_committed(&self, from: LogIndex) -> Result<Vec<LogEntry>, LogError>;
}

/// LogEntry is a committed entry as seen by readers of the log.
#[derive(Clone, Debug, PartialEq)]
pub struct LogEntry {
    pub index: LogIndex,
    pub term: LogTerm,
    /// `None` for entries the log writes for itself (e.g. the first entry of a new term).
    pub payload: Option<Bytes>,
}

/// LogRole is a participant's role in one log.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LogRole {
    Leader { term: LogTerm },
    Follower { term: LogTerm, leader: Option<ServerId> },
    /// The participant is no longer part of the log.
    Detached,
}

impl LogRole {
    pub fn term(&self) -> Option<LogTerm> {
        match self {
            LogRole::Leader { term } => Some(*term),
            LogRole::Follower { term, .. } => Some(*term),
            LogRole::Detached => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("Participant is not the leader of this log")]
    NotLeader,

    #[error("Leadership of the term was lost")]
    Resigned,

    #[error("Entries before {first_index:?} were released")]
    Compacted { first_index: LogIndex },

    #[error("Unknown participant {0:?}")]
    UnknownParticipant(ServerId),

    #[error("Log storage failure: {0}")]
    Storage(io::Error),

    // Log logic runs on a background task. This error is returned if the task has exited.
    #[error("Log task has exited")]
    ActorExited,
}
