use crate::codec::JsonCodec;
use crate::replicated_log::{LogRole, LogRoleListener, ReplicatedLog};
use crate::state::state_core::StateCore;
use crate::state::stop_signal::{self, StopCheck, Stopper};
use crate::state::{FollowerState, LeaderState, PrototypeStateMachine, SnapshotSource, StateMachine};
use crate::types::{LogId, LogIndex, LogTerm};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("No replicated state for log {0:?}")]
    StateNotFound(LogId),
    #[error("Not the leader of log {0:?}")]
    NotLeader(LogId),
    #[error("Replicated state for log {0:?} already exists")]
    AlreadyExists(LogId),
}

/// ReplicatedStateRole is the active state instance of one log on this node.
pub enum ReplicatedStateRole<S: StateMachine> {
    Leader(Arc<LeaderState<S>>),
    Follower(Arc<FollowerState<S>>),
}

impl<S: StateMachine> Clone for ReplicatedStateRole<S> {
    fn clone(&self) -> Self {
        match self {
            ReplicatedStateRole::Leader(leader) => ReplicatedStateRole::Leader(leader.clone()),
            ReplicatedStateRole::Follower(follower) => ReplicatedStateRole::Follower(follower.clone()),
        }
    }
}

impl<S: StateMachine> ReplicatedStateRole<S> {
    fn teardown(&self) {
        match self {
            ReplicatedStateRole::Leader(leader) => leader.resign(),
            ReplicatedStateRole::Follower(follower) => follower.stop(),
        }
    }

    fn snapshot(&self) -> (S::Snapshot, LogIndex) {
        let snapshot = match self {
            ReplicatedStateRole::Leader(leader) => leader.snapshot(),
            ReplicatedStateRole::Follower(follower) => follower.snapshot(),
        };

        (snapshot.data, snapshot.index)
    }

    fn is_failed(&self) -> bool {
        match self {
            ReplicatedStateRole::Leader(leader) => leader.is_failed(),
            ReplicatedStateRole::Follower(follower) => follower.is_failed(),
        }
    }

    fn leader_term(&self) -> Option<LogTerm> {
        match self {
            ReplicatedStateRole::Leader(leader) => Some(leader.term()),
            ReplicatedStateRole::Follower(_) => None,
        }
    }
}

pub type PrototypeStateRegistry = ReplicatedStateRegistry<PrototypeStateMachine>;

/// ReplicatedStateRegistry maps every log this node participates in to its active state
/// instance. A watcher task per log follows role changes of the log: it builds the instance for the
/// new role from the previous instance's state and swaps it in, then tears the previous one down.
/// Lookups see either the old or the new instance, never anything in between.
pub struct ReplicatedStateRegistry<S: StateMachine> {
    logger: slog::Logger,
    codec: JsonCodec,
    snapshot_source: Option<Arc<dyn SnapshotSource<S>>>,
    states: Arc<RwLock<HashMap<LogId, StateSlot<S>>>>,
}

struct StateSlot<S: StateMachine> {
    role: ReplicatedStateRole<S>,
    // Stops the role watcher when the slot goes away.
    _watcher: Stopper,
}

impl<S: StateMachine> ReplicatedStateRegistry<S> {
    pub fn new(
        logger: slog::Logger,
        codec: JsonCodec,
        snapshot_source: Option<Arc<dyn SnapshotSource<S>>>,
    ) -> Self {
        ReplicatedStateRegistry {
            logger,
            codec,
            snapshot_source,
            states: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// create_state hosts a new, empty replicated state on `log`, in whatever role this node
    /// currently has in the log. Must be called from within a tokio runtime.
    pub fn create_state(&self, log: Arc<dyn ReplicatedLog>) -> Result<(), RegistryError> {
        let log_id = log.log_id();
        let builder = RoleBuilder {
            logger: self.logger.new(slog::o!("LogId" => log_id.as_u64())),
            log,
            codec: self.codec,
            snapshot_source: self.snapshot_source.clone(),
        };

        let mut states = self.states.write().expect("Registry.create_state() lock poison");
        if states.contains_key(&log_id) {
            return Err(RegistryError::AlreadyExists(log_id));
        }

        let role_listener = builder.log.role_listener();
        let core = StateCore::new(S::default(), LogIndex::ZERO);
        let role = match builder.build(&role_listener.current(), core) {
            Some(role) => role,
            None => return Err(RegistryError::StateNotFound(log_id)),
        };
        let (stopper, stop_check) = stop_signal::new();
        states.insert(
            log_id,
            StateSlot {
                role,
                _watcher: stopper,
            },
        );
        drop(states);

        slog::info!(builder.logger, "Hosting replicated state");
        let watcher = RoleWatcher {
            states: self.states.clone(),
            builder,
            role_listener,
            stop_check,
        };
        tokio::spawn(watcher.run());

        Ok(())
    }

    /// drop_state stops hosting the state of `log_id`.
    pub fn drop_state(&self, log_id: LogId) -> Result<(), RegistryError> {
        let removed = self
            .states
            .write()
            .expect("Registry.drop_state() lock poison")
            .remove(&log_id)
            .ok_or(RegistryError::StateNotFound(log_id))?;

        removed.role.teardown();
        slog::info!(self.logger, "Dropped replicated state of {:?}", log_id);
        Ok(())
    }

    pub fn get(&self, log_id: LogId) -> Option<ReplicatedStateRole<S>> {
        self.states
            .read()
            .expect("Registry.get() lock poison")
            .get(&log_id)
            .map(|slot| slot.role.clone())
    }

    pub fn get_leader(&self, log_id: LogId) -> Result<Arc<LeaderState<S>>, RegistryError> {
        match self.get(log_id) {
            Some(ReplicatedStateRole::Leader(leader)) => Ok(leader),
            Some(ReplicatedStateRole::Follower(_)) => Err(RegistryError::NotLeader(log_id)),
            None => Err(RegistryError::StateNotFound(log_id)),
        }
    }

    pub fn get_follower(&self, log_id: LogId) -> Result<Arc<FollowerState<S>>, RegistryError> {
        match self.get(log_id) {
            Some(ReplicatedStateRole::Follower(follower)) => Ok(follower),
            Some(ReplicatedStateRole::Leader(_)) => Err(RegistryError::NotLeader(log_id)),
            None => Err(RegistryError::StateNotFound(log_id)),
        }
    }

    pub fn log_ids(&self) -> Vec<LogId> {
        self.states
            .read()
            .expect("Registry.log_ids() lock poison")
            .keys()
            .cloned()
            .collect()
    }
}

impl<S: StateMachine> Drop for ReplicatedStateRegistry<S> {
    fn drop(&mut self) {
        if let Ok(mut states) = self.states.write() {
            for (_, slot) in states.drain() {
                slot.role.teardown();
            }
        }
    }
}

struct RoleBuilder<S: StateMachine> {
    logger: slog::Logger,
    log: Arc<dyn ReplicatedLog>,
    codec: JsonCodec,
    snapshot_source: Option<Arc<dyn SnapshotSource<S>>>,
}

impl<S: StateMachine> RoleBuilder<S> {
    // None if the log role can't host a state.
    fn build(&self, log_role: &LogRole, core: StateCore<S>) -> Option<ReplicatedStateRole<S>> {
        match log_role {
            LogRole::Leader { term } => Some(ReplicatedStateRole::Leader(LeaderState::create(
                self.logger.clone(),
                self.log.clone(),
                *term,
                core,
                self.codec,
            ))),
            LogRole::Follower { .. } => Some(ReplicatedStateRole::Follower(FollowerState::create(
                self.logger.clone(),
                self.log.clone(),
                core,
                self.codec,
                self.snapshot_source.clone(),
            ))),
            LogRole::Detached => None,
        }
    }
}

struct RoleWatcher<S: StateMachine> {
    states: Arc<RwLock<HashMap<LogId, StateSlot<S>>>>,
    builder: RoleBuilder<S>,
    role_listener: LogRoleListener,
    stop_check: StopCheck,
}

impl<S: StateMachine> RoleWatcher<S> {
    async fn run(mut self) {
        let log_id = self.builder.log.log_id();

        loop {
            let mut stop_check = self.stop_check.clone();
            let log_role = tokio::select! {
                _ = stop_check.stopped() => return,
                log_role = self.role_listener.next() => log_role,
            };

            match log_role {
                Some(log_role) if log_role != LogRole::Detached => self.transition(log_id, log_role),
                _ => {
                    slog::info!(self.builder.logger, "Log detached, dropping replicated state");
                    let removed = self
                        .states
                        .write()
                        .expect("RoleWatcher lock poison")
                        .remove(&log_id);
                    if let Some(slot) = removed {
                        slot.role.teardown();
                    }
                    return;
                }
            }
        }
    }

    fn transition(&self, log_id: LogId, log_role: LogRole) {
        let mut states = self.states.write().expect("RoleWatcher.transition() lock poison");
        let slot = match states.get_mut(&log_id) {
            Some(slot) => slot,
            None => return,
        };

        let unchanged = match (&slot.role, &log_role) {
            (ReplicatedStateRole::Leader(leader), LogRole::Leader { term }) => leader.term() == *term,
            (ReplicatedStateRole::Follower(_), LogRole::Follower { .. }) => true,
            _ => false,
        };
        if unchanged {
            return;
        }

        // Everything applied was committed, so it's safe to carry over into the new role.
        let (snapshot, applied_index) = slot.role.snapshot();
        let core = StateCore::from_snapshot(snapshot, applied_index);
        if slot.role.is_failed() {
            core.fail();
        }
        if let Some(new_role) = self.builder.build(&log_role, core) {
            let old_role = std::mem::replace(&mut slot.role, new_role);
            drop(states);

            slog::info!(
                self.builder.logger,
                "Role change to {:?} at applied index {:?} (previous leader term {:?})",
                log_role,
                applied_index,
                old_role.leader_term()
            );
            old_role.teardown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replicated_log::{InMemoryLogOptions, InMemoryReplicatedLog};
    use crate::state::LeaderStateError;
    use crate::types::ServerId;
    use std::time::Duration;

    fn logger() -> slog::Logger {
        slog::Logger::root(slog::Discard, slog::o!())
    }

    fn registry() -> PrototypeStateRegistry {
        ReplicatedStateRegistry::new(logger(), JsonCodec::default(), None)
    }

    async fn wait_for_leader(registry: &PrototypeStateRegistry, log_id: LogId, term: LogTerm) -> Arc<LeaderState<PrototypeStateMachine>> {
        loop {
            if let Ok(leader) = registry.get_leader(log_id) {
                if leader.term() == term {
                    return leader;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn lookups_follow_log_roles() {
        let log_id = LogId::new(3);
        let servers: Vec<ServerId> = vec!["a".into(), "b".into()];
        let log = InMemoryReplicatedLog::create(logger(), log_id, servers, InMemoryLogOptions::default()).unwrap();
        let registry_a = registry();
        let registry_b = registry();
        registry_a.create_state(log.participant(&"a".into()).unwrap()).unwrap();
        registry_b.create_state(log.participant(&"b".into()).unwrap()).unwrap();

        assert!(matches!(registry_a.get_leader(log_id), Err(RegistryError::NotLeader(_))));
        assert!(matches!(
            registry_a.get_leader(LogId::new(99)),
            Err(RegistryError::StateNotFound(_))
        ));
        assert!(matches!(
            registry_a.create_state(log.participant(&"a".into()).unwrap()),
            Err(RegistryError::AlreadyExists(_))
        ));

        let term = log.elect(&"a".into()).await.unwrap();
        let leader = tokio::time::timeout(Duration::from_secs(5), wait_for_leader(&registry_a, log_id, term))
            .await
            .unwrap();
        let index = leader.insert(vec![("a", "1")]).await.unwrap();
        leader.get_snapshot(index).await.unwrap();

        // Leadership moves to b, which takes over the replicated state.
        let new_term = log.elect(&"b".into()).await.unwrap();
        let new_leader = tokio::time::timeout(Duration::from_secs(5), wait_for_leader(&registry_b, log_id, new_term))
            .await
            .unwrap();
        let snapshot = new_leader.get_snapshot(index).await.unwrap();
        assert_eq!(Some(&"1".to_string()), snapshot.data.get("a"));

        tokio::time::timeout(Duration::from_secs(5), async {
            while !leader.is_resigned() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert!(matches!(leader.get("a"), Err(LeaderStateError::LeaderResigned)));
        assert!(registry_a.get_follower(log_id).is_ok());
    }

    #[tokio::test]
    async fn leader_rehosted_on_compacted_log_resigns() {
        let log_id = LogId::new(5);
        let log = InMemoryReplicatedLog::create(logger(), log_id, vec!["a".into()], InMemoryLogOptions::default())
            .unwrap();
        let registry = registry();
        registry.create_state(log.participant(&"a".into()).unwrap()).unwrap();
        let term = log.elect(&"a".into()).await.unwrap();
        let leader = tokio::time::timeout(Duration::from_secs(5), wait_for_leader(&registry, log_id, term))
            .await
            .unwrap();

        let mut last = LogIndex::ZERO;
        for i in 0..5 {
            last = leader.insert(vec![(format!("k{}", i), "v")]).await.unwrap();
        }
        leader.get_snapshot(last).await.unwrap();
        log.compact(last).await.unwrap();

        // The new instance starts empty and can't replay what was compacted away.
        registry.drop_state(log_id).unwrap();
        registry.create_state(log.participant(&"a".into()).unwrap()).unwrap();
        let rehosted = registry.get_leader(log_id).unwrap();

        tokio::time::timeout(Duration::from_secs(5), async {
            while !rehosted.is_resigned() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert!(matches!(
            rehosted.insert(vec![("x", "1")]).await,
            Err(LeaderStateError::LeaderResigned)
        ));
        let waited = tokio::time::timeout(Duration::from_secs(2), rehosted.get_snapshot(last.next())).await;
        assert!(matches!(waited, Ok(Err(LeaderStateError::LeaderResigned))));
        assert!(matches!(rehosted.get("k0"), Err(LeaderStateError::LeaderResigned)));
    }

    #[tokio::test]
    async fn drop_state_tears_down_instance() {
        let log_id = LogId::new(4);
        let log = InMemoryReplicatedLog::create(logger(), log_id, vec!["a".into()], InMemoryLogOptions::default())
            .unwrap();
        let registry = registry();
        registry.create_state(log.participant(&"a".into()).unwrap()).unwrap();
        let term = log.elect(&"a".into()).await.unwrap();
        let leader = tokio::time::timeout(Duration::from_secs(5), wait_for_leader(&registry, log_id, term))
            .await
            .unwrap();

        registry.drop_state(log_id).unwrap();
        assert!(leader.is_resigned());
        assert!(registry.get(log_id).is_none());
        assert!(matches!(registry.drop_state(log_id), Err(RegistryError::StateNotFound(_))));
    }
}
