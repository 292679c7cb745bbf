use crate::api::MethodsError;
use crate::state::{LeaderState, PrototypeStateMachine, PrototypeStateRegistry, Snapshot};
use crate::types::{LogId, LogIndex};
use std::collections::BTreeMap;
use std::sync::Arc;

/// LocalMethods serves requests from the leader instances hosted on this server.
#[derive(Clone)]
pub struct LocalMethods {
    registry: Arc<PrototypeStateRegistry>,
}

impl LocalMethods {
    pub(crate) fn new(registry: Arc<PrototypeStateRegistry>) -> Self {
        LocalMethods { registry }
    }

    fn leader(&self, log_id: LogId) -> Result<Arc<LeaderState<PrototypeStateMachine>>, MethodsError> {
        Ok(self.registry.get_leader(log_id)?)
    }

    pub async fn insert(&self, log_id: LogId, entries: BTreeMap<String, String>) -> Result<LogIndex, MethodsError> {
        self.leader(log_id)?
            .insert(entries)
            .await
            .map_err(|e| MethodsError::from_leader_state(log_id, e))
    }

    pub async fn get(&self, log_id: LogId, key: &str) -> Result<Option<String>, MethodsError> {
        self.leader(log_id)?
            .get(key)
            .map_err(|e| MethodsError::from_leader_state(log_id, e))
    }

    pub async fn get_many(&self, log_id: LogId, keys: &[String]) -> Result<BTreeMap<String, String>, MethodsError> {
        self.leader(log_id)?
            .get_many(keys.iter().map(String::as_str))
            .map_err(|e| MethodsError::from_leader_state(log_id, e))
    }

    pub async fn get_snapshot(
        &self,
        log_id: LogId,
        wait_for_index: LogIndex,
    ) -> Result<Snapshot<BTreeMap<String, String>>, MethodsError> {
        self.leader(log_id)?
            .get_snapshot(wait_for_index)
            .await
            .map_err(|e| MethodsError::from_leader_state(log_id, e))
    }

    pub async fn remove(&self, log_id: LogId, key: &str) -> Result<LogIndex, MethodsError> {
        self.leader(log_id)?
            .remove(key)
            .await
            .map_err(|e| MethodsError::from_leader_state(log_id, e))
    }

    pub async fn remove_many(&self, log_id: LogId, keys: Vec<String>) -> Result<LogIndex, MethodsError> {
        self.leader(log_id)?
            .remove_many(keys)
            .await
            .map_err(|e| MethodsError::from_leader_state(log_id, e))
    }
}
