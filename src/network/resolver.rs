use crate::types::{LogId, ServerId};
use std::collections::HashMap;
use std::sync::RwLock;

/// LeaderResolver locates the server currently leading a log.
#[async_trait::async_trait]
pub trait LeaderResolver: Send + Sync {
    async fn resolve_leader(&self, log_id: LogId) -> Result<ServerId, ResolveError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("Leader of log {0:?} has resigned")]
    Resigned(LogId),
    #[error("Leader of log {0:?} is unknown")]
    Unknown(LogId),
}

#[derive(Clone, Debug)]
enum LeaderLocation {
    Known(ServerId),
    Resigned,
}

/// StaticLeaderResolver answers from a table maintained by whoever knows about leadership changes.
#[derive(Default)]
pub struct StaticLeaderResolver {
    leaders: RwLock<HashMap<LogId, LeaderLocation>>,
}

impl StaticLeaderResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_leader(&self, log_id: LogId, server: ServerId) {
        self.leaders
            .write()
            .expect("StaticLeaderResolver.set_leader() lock poison")
            .insert(log_id, LeaderLocation::Known(server));
    }

    pub fn mark_resigned(&self, log_id: LogId) {
        self.leaders
            .write()
            .expect("StaticLeaderResolver.mark_resigned() lock poison")
            .insert(log_id, LeaderLocation::Resigned);
    }
}

#[async_trait::async_trait]
impl LeaderResolver for StaticLeaderResolver {
    async fn resolve_leader(&self, log_id: LogId) -> Result<ServerId, ResolveError> {
        let location = self
            .leaders
            .read()
            .expect("StaticLeaderResolver.resolve_leader() lock poison")
            .get(&log_id)
            .cloned();

        match location {
            Some(LeaderLocation::Known(server)) => Ok(server),
            Some(LeaderLocation::Resigned) => Err(ResolveError::Resigned(log_id)),
            None => Err(ResolveError::Unknown(log_id)),
        }
    }
}
