use crate::api::{ForwardingMethods, LocalMethods, MethodsError};
use crate::state::{PrototypeStateMachine, Snapshot, SnapshotSource, SnapshotSourceError};
use crate::types::{LogId, LogIndex};
use std::collections::BTreeMap;

/// PrototypeStateMethods is the entry point for clients of prototype states. Which variant a
/// server uses is decided once, by its role: log hosts serve requests from their local leaders,
/// routers forward them to whichever server leads the log.
#[derive(Clone)]
pub enum PrototypeStateMethods {
    Local(LocalMethods),
    Forwarding(ForwardingMethods),
}

impl PrototypeStateMethods {
    /// insert writes `entries` and returns the index of the committed entry. To read the write
    /// back, pass that index to `get_snapshot`.
    pub async fn insert(&self, log_id: LogId, entries: BTreeMap<String, String>) -> Result<LogIndex, MethodsError> {
        match self {
            PrototypeStateMethods::Local(local) => local.insert(log_id, entries).await,
            PrototypeStateMethods::Forwarding(forwarding) => forwarding.insert(log_id, entries).await,
        }
    }

    pub async fn get(&self, log_id: LogId, key: &str) -> Result<Option<String>, MethodsError> {
        match self {
            PrototypeStateMethods::Local(local) => local.get(log_id, key).await,
            PrototypeStateMethods::Forwarding(forwarding) => forwarding.get(log_id, key).await,
        }
    }

    pub async fn get_many(&self, log_id: LogId, keys: &[String]) -> Result<BTreeMap<String, String>, MethodsError> {
        match self {
            PrototypeStateMethods::Local(local) => local.get_many(log_id, keys).await,
            PrototypeStateMethods::Forwarding(forwarding) => forwarding.get_many(log_id, keys).await,
        }
    }

    /// get_snapshot returns the whole state once the leader applied `wait_for_index`.
    pub async fn get_snapshot(
        &self,
        log_id: LogId,
        wait_for_index: LogIndex,
    ) -> Result<Snapshot<BTreeMap<String, String>>, MethodsError> {
        match self {
            PrototypeStateMethods::Local(local) => local.get_snapshot(log_id, wait_for_index).await,
            PrototypeStateMethods::Forwarding(forwarding) => forwarding.get_snapshot(log_id, wait_for_index).await,
        }
    }

    pub async fn remove(&self, log_id: LogId, key: &str) -> Result<LogIndex, MethodsError> {
        match self {
            PrototypeStateMethods::Local(local) => local.remove(log_id, key).await,
            PrototypeStateMethods::Forwarding(forwarding) => forwarding.remove(log_id, key).await,
        }
    }

    pub async fn remove_many(&self, log_id: LogId, keys: Vec<String>) -> Result<LogIndex, MethodsError> {
        match self {
            PrototypeStateMethods::Local(local) => local.remove_many(log_id, keys).await,
            PrototypeStateMethods::Forwarding(forwarding) => forwarding.remove_many(log_id, keys).await,
        }
    }
}

#[async_trait::async_trait]
impl SnapshotSource<PrototypeStateMachine> for PrototypeStateMethods {
    async fn acquire_snapshot(
        &self,
        log_id: LogId,
        wait_for_index: LogIndex,
    ) -> Result<Snapshot<BTreeMap<String, String>>, SnapshotSourceError> {
        self.get_snapshot(log_id, wait_for_index).await.map_err(|e| match e {
            MethodsError::StateNotFound(_)
            | MethodsError::NotLeader(_)
            | MethodsError::LeaderResigned(_)
            | MethodsError::LeaderUnresolvable { .. } => SnapshotSourceError::NoLeader(e.to_string()),
            _ => SnapshotSourceError::Transfer(e.to_string()),
        })
    }
}
