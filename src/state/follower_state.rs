use crate::codec::JsonCodec;
use crate::replicated_log::ReplicatedLog;
use crate::state::applier::Applier;
use crate::state::state_core::StateCore;
use crate::state::stop_signal::{self, StopCheck, Stopper};
use crate::state::{PrototypeStateMachine, Snapshot, SnapshotSource, StateMachine};
use crate::types::{LogId, LogIndex};
use std::collections::BTreeMap;
use std::sync::Arc;

/// FollowerState replays the committed entries of a log it doesn't lead. It never takes client
/// writes. Entries are applied only by its applier, strictly in log order; when the state fails
/// or falls behind a compaction it's reinitialized from a snapshot of the leader.
pub struct FollowerState<S: StateMachine> {
    logger: slog::Logger,
    log_id: LogId,
    core: Arc<StateCore<S>>,
    // Stops the applier when the follower is torn down.
    stopper: Stopper,
    stop_check: StopCheck,
}

impl<S: StateMachine> FollowerState<S> {
    pub(crate) fn create(
        logger: slog::Logger,
        log: Arc<dyn ReplicatedLog>,
        core: StateCore<S>,
        codec: JsonCodec,
        snapshot_source: Option<Arc<dyn SnapshotSource<S>>>,
    ) -> Arc<Self> {
        let logger = logger.new(slog::o!("Role" => "Follower"));
        let log_id = log.log_id();
        let core = Arc::new(core);
        let (stopper, stop_check) = stop_signal::new();

        let applier = Applier::new(
            logger.clone(),
            log,
            core.clone(),
            codec,
            snapshot_source,
            stop_check.clone(),
        );

        slog::info!(logger, "Following from applied index {:?}", core.applied_index());
        let follower = Arc::new(FollowerState {
            logger,
            log_id,
            core,
            stopper,
            stop_check,
        });

        let instance = Arc::downgrade(&follower);
        tokio::spawn(async move {
            applier.run().await;
            if let Some(follower) = instance.upgrade() {
                follower.stop();
            }
        });

        follower
    }

    pub fn log_id(&self) -> LogId {
        self.log_id
    }

    pub fn applied_index(&self) -> LogIndex {
        self.core.applied_index()
    }

    pub fn snapshot(&self) -> Snapshot<S::Snapshot> {
        let (data, index) = self.core.snapshot();

        Snapshot { index, data }
    }

    // The state awaits a snapshot and must not be trusted.
    pub(crate) fn is_failed(&self) -> bool {
        self.core.is_failed()
    }

    /// is_stopped tells whether the follower stopped following its log. Its state stays readable
    /// but no longer advances.
    pub fn is_stopped(&self) -> bool {
        self.stop_check.should_stop()
    }

    pub(crate) fn stop(&self) {
        if !self.is_stopped() {
            slog::info!(self.logger, "Stopping at applied index {:?}", self.core.applied_index());
            self.stopper.stop();
        }
    }
}

impl FollowerState<PrototypeStateMachine> {
    pub fn get(&self, key: &str) -> Option<String> {
        self.core.read(|machine| machine.get(key).cloned())
    }

    pub fn get_many<'a, I: IntoIterator<Item = &'a str>>(&self, keys: I) -> BTreeMap<String, String> {
        self.core.read(|machine| machine.get_many(keys))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replicated_log::{InMemoryLogOptions, InMemoryReplicatedLog};
    use crate::state::{ApplyError, LeaderState, PrototypeLogEntry, SnapshotSourceError};
    use crate::types::ServerId;
    use std::time::Duration;
    use tokio::sync::watch;

    fn logger() -> slog::Logger {
        slog::Logger::root(slog::Discard, slog::o!())
    }

    fn servers() -> Vec<ServerId> {
        vec!["a".into(), "b".into(), "c".into()]
    }

    struct LeaderSnapshots(Arc<LeaderState<PrototypeStateMachine>>);

    #[async_trait::async_trait]
    impl SnapshotSource<PrototypeStateMachine> for LeaderSnapshots {
        async fn acquire_snapshot(
            &self,
            _log_id: LogId,
            wait_for_index: LogIndex,
        ) -> Result<Snapshot<BTreeMap<String, String>>, SnapshotSourceError> {
            self.0
                .get_snapshot(wait_for_index)
                .await
                .map_err(|e| SnapshotSourceError::NoLeader(e.to_string()))
        }
    }

    async fn wait_for_applied(follower: &FollowerState<PrototypeStateMachine>, index: LogIndex) {
        let mut applied = follower.core.applied_listener();
        while *applied.borrow() < index {
            applied.changed().await.unwrap();
        }
    }

    #[tokio::test]
    async fn follower_replays_committed_entries() {
        let log = InMemoryReplicatedLog::create(logger(), LogId::new(1), servers(), InMemoryLogOptions::default())
            .unwrap();
        let term = log.elect(&"a".into()).await.unwrap();
        let leader = LeaderState::create(
            logger(),
            log.participant(&"a".into()).unwrap(),
            term,
            StateCore::new(PrototypeStateMachine::default(), LogIndex::ZERO),
            JsonCodec::default(),
        );
        let follower = FollowerState::create(
            logger(),
            log.participant(&"b".into()).unwrap(),
            StateCore::new(PrototypeStateMachine::default(), LogIndex::ZERO),
            JsonCodec::default(),
            None,
        );

        leader.insert(vec![("a", "1"), ("b", "2")]).await.unwrap();
        let index = leader.remove("a").await.unwrap();

        tokio::time::timeout(Duration::from_secs(5), wait_for_applied(&follower, index))
            .await
            .unwrap();
        assert_eq!(None, follower.get("a"));
        assert_eq!(Some("2".to_string()), follower.get("b"));
    }

    #[tokio::test]
    async fn follower_catches_up_from_snapshot_after_compaction() {
        let log = InMemoryReplicatedLog::create(logger(), LogId::new(1), servers(), InMemoryLogOptions::default())
            .unwrap();
        let term = log.elect(&"a".into()).await.unwrap();
        let leader = LeaderState::create(
            logger(),
            log.participant(&"a".into()).unwrap(),
            term,
            StateCore::new(PrototypeStateMachine::default(), LogIndex::ZERO),
            JsonCodec::default(),
        );

        let mut last = LogIndex::ZERO;
        for i in 0..10 {
            last = leader.insert(vec![(format!("k{}", i), "v")]).await.unwrap();
        }
        leader.get_snapshot(last).await.unwrap();
        log.compact(last).await.unwrap();

        let follower = FollowerState::create(
            logger(),
            log.participant(&"c".into()).unwrap(),
            StateCore::new(PrototypeStateMachine::default(), LogIndex::ZERO),
            JsonCodec::default(),
            Some(Arc::new(LeaderSnapshots(leader.clone()))),
        );
        let index = leader.insert(vec![("after", "compaction")]).await.unwrap();

        tokio::time::timeout(Duration::from_secs(5), wait_for_applied(&follower, index))
            .await
            .unwrap();
        assert_eq!(11, follower.snapshot().data.len());
        assert_eq!(Some("compaction".to_string()), follower.get("after"));
    }

    /// GatedSnapshots hands out leader snapshots only once its gate opens.
    struct GatedSnapshots {
        leader: LeaderSnapshots,
        gate: watch::Receiver<bool>,
    }

    #[async_trait::async_trait]
    impl SnapshotSource<PrototypeStateMachine> for GatedSnapshots {
        async fn acquire_snapshot(
            &self,
            log_id: LogId,
            wait_for_index: LogIndex,
        ) -> Result<Snapshot<BTreeMap<String, String>>, SnapshotSourceError> {
            let mut gate = self.gate.clone();
            while !*gate.borrow() {
                if gate.changed().await.is_err() {
                    return Err(SnapshotSourceError::NoLeader("gate closed".to_string()));
                }
            }

            self.leader.acquire_snapshot(log_id, wait_for_index).await
        }
    }

    #[tokio::test]
    async fn gap_fails_follower_until_snapshot_restores_it() {
        let log = InMemoryReplicatedLog::create(logger(), LogId::new(1), servers(), InMemoryLogOptions::default())
            .unwrap();
        let term = log.elect(&"a".into()).await.unwrap();
        let leader = LeaderState::create(
            logger(),
            log.participant(&"a".into()).unwrap(),
            term,
            StateCore::new(PrototypeStateMachine::default(), LogIndex::ZERO),
            JsonCodec::default(),
        );
        let (open_gate, gate) = watch::channel(false);
        let follower = FollowerState::create(
            logger(),
            log.participant(&"b".into()).unwrap(),
            StateCore::new(PrototypeStateMachine::default(), LogIndex::ZERO),
            JsonCodec::default(),
            Some(Arc::new(GatedSnapshots {
                leader: LeaderSnapshots(leader.clone()),
                gate,
            })),
        );

        let fake = PrototypeLogEntry::insert(vec![("fake", "1")]);
        assert!(matches!(
            follower.core.apply_entries(LogIndex::new(5), vec![Some(fake.clone())]),
            Err(ApplyError::Gap { .. })
        ));
        let next = follower.applied_index().next();
        assert!(matches!(
            follower.core.apply_entries(next, vec![Some(fake)]),
            Err(ApplyError::AwaitingSnapshot { .. })
        ));

        leader.insert(vec![("real", "1")]).await.unwrap();
        let index = leader.insert(vec![("later", "1")]).await.unwrap();
        // Nothing is applied while the follower waits for its snapshot.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(follower.applied_index() < index);
        assert_eq!(None, follower.get("real"));

        open_gate.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), wait_for_applied(&follower, index))
            .await
            .unwrap();
        let expected = leader.get_snapshot(index).await.unwrap().data;
        assert_eq!(expected, follower.snapshot().data);
        assert_eq!(None, follower.get("fake"));
        assert!(!follower.is_stopped());
    }

    #[tokio::test]
    async fn follower_without_snapshot_source_stops_after_compaction() {
        let log = InMemoryReplicatedLog::create(logger(), LogId::new(1), servers(), InMemoryLogOptions::default())
            .unwrap();
        let term = log.elect(&"a".into()).await.unwrap();
        let leader = LeaderState::create(
            logger(),
            log.participant(&"a".into()).unwrap(),
            term,
            StateCore::new(PrototypeStateMachine::default(), LogIndex::ZERO),
            JsonCodec::default(),
        );
        let index = leader.insert(vec![("a", "1")]).await.unwrap();
        leader.get_snapshot(index).await.unwrap();
        log.compact(index).await.unwrap();

        let follower = FollowerState::create(
            logger(),
            log.participant(&"c".into()).unwrap(),
            StateCore::new(PrototypeStateMachine::default(), LogIndex::ZERO),
            JsonCodec::default(),
            None,
        );

        tokio::time::timeout(Duration::from_secs(5), async {
            while !follower.is_stopped() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(LogIndex::ZERO, follower.applied_index());
        assert_eq!(None, follower.get("a"));
    }
}
