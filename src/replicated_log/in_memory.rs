use crate::commitlog::{Index, InMemoryLog, Log};
use crate::replicated_log::actor::{self, LogActorClient};
use crate::replicated_log::algorithms::{self, ParticipantAck};
use crate::replicated_log::log_entry::StoredEntry;
use crate::replicated_log::role_listener::{self, LogRoleListener, LogRoleNotifier};
use crate::replicated_log::{LogEntry, LogError, LogRole, ReplicatedLog};
use crate::types::{LogId, LogIndex, LogTerm, ServerId};
use bytes::Bytes;
use std::cmp;
use std::collections::HashMap;
use std::convert::TryFrom;
use std::io;
use std::sync::Arc;
use tokio::sync::watch;

const MAX_READ_BATCH: u64 = 1000;

#[derive(Clone, Default)]
pub struct InMemoryLogOptions {
    /// Number of participants (leader included) that must acknowledge an entry before it is
    /// committed. Defaults to a majority of the participants.
    pub write_concern: Option<usize>,
}

struct InMemoryLogOptionsValidated {
    write_concern: usize,
}

impl InMemoryLogOptionsValidated {
    fn validate(&self, num_participants: usize) -> Result<(), String> {
        if self.write_concern == 0 {
            return Err("Write concern must be at least 1".to_string());
        }
        if self.write_concern > num_participants {
            return Err(format!(
                "Write concern {} is larger than the number of participants {}",
                self.write_concern, num_participants
            ));
        }

        Ok(())
    }
}

impl TryFrom<(InMemoryLogOptions, usize)> for InMemoryLogOptionsValidated {
    type Error = String;

    fn try_from((options, num_participants): (InMemoryLogOptions, usize)) -> Result<Self, Self::Error> {
        let values = InMemoryLogOptionsValidated {
            write_concern: options.write_concern.unwrap_or(num_participants / 2 + 1),
        };

        values.validate(num_participants)?;
        Ok(values)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InMemoryLogCreationError {
    #[error("A log needs at least one participant")]
    NoParticipants,
    #[error("Illegal options for configuring log: {0}")]
    IllegalOptions(String),
    #[error("Log initialization failure")]
    LogInitialization(io::Error),
}

/// InMemoryReplicatedLog is a replicated log whose participants all live in this process. Every
/// participant gets its own `ReplicatedLog` handle via `participant()`. Leader election, failures
/// and compaction are driven explicitly through this handle.
///
/// Must be created from within a tokio runtime.
pub struct InMemoryReplicatedLog {
    log_id: LogId,
    actor_client: LogActorClient,
    commit_listener: watch::Receiver<LogIndex>,
    role_listeners: HashMap<ServerId, LogRoleListener>,
}

impl InMemoryReplicatedLog {
    pub fn create(
        logger: slog::Logger,
        log_id: LogId,
        participants: Vec<ServerId>,
        options: InMemoryLogOptions,
    ) -> Result<Self, InMemoryLogCreationError> {
        if participants.is_empty() {
            return Err(InMemoryLogCreationError::NoParticipants);
        }
        let options = InMemoryLogOptionsValidated::try_from((options, participants.len()))
            .map_err(InMemoryLogCreationError::IllegalOptions)?;

        let logger = logger.new(slog::o!("LogId" => log_id.as_u64()));
        let log = InMemoryLog::create().map_err(InMemoryLogCreationError::LogInitialization)?;
        let (commit_notifier, commit_listener) = watch::channel(LogIndex::ZERO);

        let mut participant_states = HashMap::with_capacity(participants.len());
        let mut role_listeners = HashMap::with_capacity(participants.len());
        for participant in participants {
            let (notifier, listener) = role_listener::new(LogRole::Follower {
                term: LogTerm::default(),
                leader: None,
            });
            participant_states.insert(participant.clone(), ParticipantState::new(notifier));
            role_listeners.insert(participant, listener);
        }

        let core = LogCore {
            logger,
            log,
            last_entry: None,
            term: LogTerm::default(),
            leader: None,
            participants: participant_states,
            write_concern: options.write_concern,
            commit_index: LogIndex::ZERO,
            commit_notifier,
        };

        let (actor_client, log_actor) = actor::create(32, core);
        tokio::spawn(log_actor.run_event_loop());

        Ok(InMemoryReplicatedLog {
            log_id,
            actor_client,
            commit_listener,
            role_listeners,
        })
    }

    pub fn log_id(&self) -> LogId {
        self.log_id
    }

    /// participant returns the log as seen by `participant`.
    pub fn participant(&self, participant: &ServerId) -> Option<Arc<InMemoryLogParticipant>> {
        self.role_listeners.get(participant).map(|role_listener| {
            Arc::new(InMemoryLogParticipant {
                log_id: self.log_id,
                me: participant.clone(),
                actor_client: self.actor_client.clone(),
                commit_listener: self.commit_listener.clone(),
                role_listener: role_listener.clone(),
            })
        })
    }

    pub fn commit_index(&self) -> LogIndex {
        *self.commit_listener.borrow()
    }

    /// elect starts a new term led by `leader`. Uncommitted entries of previous terms are dropped.
    pub async fn elect(&self, leader: &ServerId) -> Result<LogTerm, LogError> {
        self.actor_client.elect(leader.clone()).await
    }

    /// resign starts a new term without a leader.
    pub async fn resign(&self) -> Result<LogTerm, LogError> {
        self.actor_client.resign().await
    }

    /// A failed participant stops acknowledging entries until it's marked healthy again, at which
    /// point it catches up with the leader.
    pub async fn set_participant_failed(&self, participant: &ServerId, failed: bool) -> Result<(), LogError> {
        self.actor_client.set_participant_failed(participant.clone(), failed).await
    }

    /// detach removes `participant` from the log for good.
    pub async fn detach(&self, participant: &ServerId) -> Result<(), LogError> {
        self.actor_client.detach(participant.clone()).await
    }

    /// compact releases committed entries up to `up_to` (the latest committed entry is always
    /// retained). Returns the new first index of the log.
    pub async fn compact(&self, up_to: LogIndex) -> Result<LogIndex, LogError> {
        self.actor_client.compact(up_to).await
    }
}

/// InMemoryLogParticipant is one participant's `ReplicatedLog` handle on an `InMemoryReplicatedLog`.
pub struct InMemoryLogParticipant {
    log_id: LogId,
    me: ServerId,
    actor_client: LogActorClient,
    commit_listener: watch::Receiver<LogIndex>,
    role_listener: LogRoleListener,
}

#[async_trait::async_trait]
impl ReplicatedLog for InMemoryLogParticipant {
    fn log_id(&self) -> LogId {
        self.log_id
    }

    fn role_listener(&self) -> LogRoleListener {
        self.role_listener.clone()
    }

    async fn append(&self, term: LogTerm, payload: Bytes) -> Result<LogIndex, LogError> {
        self.actor_client.append(self.me.clone(), term, payload).await
    }

    async fn wait_for_commit(&self, term: LogTerm, index: LogIndex) -> Result<(), LogError> {
        let mut commit = self.commit_listener.clone();
        let mut roles = self.role_listener.clone();

        loop {
            if *commit.borrow() >= index {
                return match self.actor_client.term_at(index).await? {
                    Some(entry_term) if entry_term == term => Ok(()),
                    Some(_) => Err(LogError::Resigned),
                    // Committed, then released by compaction.
                    None => Ok(()),
                };
            }

            if roles.current().term() != Some(term) {
                return Err(LogError::Resigned);
            }

            tokio::select! {
                changed = commit.changed() => changed.map_err(|_| LogError::ActorExited)?,
                role = roles.next() => {
                    if role.is_none() {
                        return Err(LogError::ActorExited);
                    }
                }
            }
        }
    }

    async fn read_committed(&self, from: LogIndex) -> Result<Vec<LogEntry>, LogError> {
        let mut commit = self.commit_listener.clone();

        loop {
            let entries = self.actor_client.read_committed(from).await?;
            if !entries.is_empty() {
                return Ok(entries);
            }

            commit.changed().await.map_err(|_| LogError::ActorExited)?;
        }
    }
}

struct ParticipantState {
    failed: bool,
    detached: bool,
    last_acked: Option<(LogTerm, LogIndex)>,
    role_notifier: LogRoleNotifier,
}

impl ParticipantState {
    fn new(role_notifier: LogRoleNotifier) -> Self {
        ParticipantState {
            failed: false,
            detached: false,
            last_acked: None,
            role_notifier,
        }
    }

    fn is_healthy(&self) -> bool {
        !self.failed && !self.detached
    }
}

/// LogCore holds all state of an in-memory replicated log. Only `LogActor` touches it.
///
/// Replication is instantaneous: every healthy participant acknowledges an entry as soon as the
/// leader appends it. What remains to be modeled is who counts towards the write concern.
pub(crate) struct LogCore {
    logger: slog::Logger,
    log: InMemoryLog<StoredEntry>,
    // (term, index) of the last entry in the log. It must be updated with every append/truncate.
    last_entry: Option<(LogTerm, LogIndex)>,

    term: LogTerm,
    leader: Option<ServerId>,
    participants: HashMap<ServerId, ParticipantState>,
    write_concern: usize,

    // Index of highest log entry known to be committed. Never decreases.
    commit_index: LogIndex,
    commit_notifier: watch::Sender<LogIndex>,
}

impl LogCore {
    pub(crate) fn logger(&self) -> &slog::Logger {
        &self.logger
    }

    pub(crate) fn append(&mut self, from: &ServerId, term: LogTerm, payload: Bytes) -> Result<LogIndex, LogError> {
        if term < self.term {
            return Err(LogError::Resigned);
        }
        if term != self.term || self.leader.as_ref() != Some(from) {
            return Err(LogError::NotLeader);
        }

        let index = self.append_entry(StoredEntry {
            term,
            payload: Some(payload),
        })?;
        self.update_commit_index();

        Ok(index)
    }

    fn append_entry(&mut self, entry: StoredEntry) -> Result<LogIndex, LogError> {
        let term = entry.term;
        let index = self.log.append(entry).map_err(LogError::Storage)?.as_log_index();
        // Only update state after log action completes.
        self.last_entry = Some((term, index));
        self.acknowledge_on_healthy_participants();

        Ok(index)
    }

    fn leader_is_healthy(&self) -> bool {
        self.leader
            .as_ref()
            .and_then(|leader| self.participants.get(leader))
            .map_or(false, |p| p.is_healthy())
    }

    // Entries only flow out of a healthy leader.
    fn acknowledge_on_healthy_participants(&mut self) {
        if !self.leader_is_healthy() {
            let last_entry = self.last_entry;
            if let Some(leader) = self.leader.as_ref() {
                if let Some(participant) = self.participants.get_mut(leader) {
                    participant.last_acked = last_entry;
                }
            }
            return;
        }

        let last_entry = self.last_entry;
        for participant in self.participants.values_mut().filter(|p| p.is_healthy()) {
            participant.last_acked = last_entry;
        }
    }

    fn update_commit_index(&mut self) {
        if self.leader.is_none() {
            return;
        }
        let spearhead = match self.last_entry {
            Some(spearhead) => spearhead,
            None => return,
        };

        let acks: Vec<ParticipantAck> = self
            .participants
            .values()
            .filter(|p| !p.detached)
            .map(|p| ParticipantAck {
                failed: p.failed,
                last_acked: p.last_acked,
            })
            .collect();

        let new_commit_index =
            algorithms::calculate_commit_index(&acks, self.write_concern, self.commit_index, spearhead);
        if new_commit_index > self.commit_index {
            slog::debug!(self.logger, "Commit index {:?} -> {:?}", self.commit_index, new_commit_index);
            self.commit_index = new_commit_index;
            let _ = self.commit_notifier.send(new_commit_index);
        }
    }

    pub(crate) fn read_committed(&self, from: LogIndex) -> Result<Vec<LogEntry>, LogError> {
        let from = cmp::max(from, LogIndex::new(1));
        let first_index = self.log.first_index().as_log_index();
        if from < first_index {
            return Err(LogError::Compacted { first_index });
        }
        if from > self.commit_index {
            return Ok(Vec::new());
        }

        let until = cmp::min(self.commit_index.as_u64(), from.as_u64() + MAX_READ_BATCH - 1);
        let mut entries = Vec::with_capacity((until - from.as_u64() + 1) as usize);
        for i in from.as_u64()..=until {
            let stored = self
                .log
                .read(Index::new(i))
                .map_err(LogError::Storage)?
                .ok_or_else(|| LogError::Compacted { first_index })?;
            entries.push(LogEntry {
                index: LogIndex::new(i),
                term: stored.term,
                payload: stored.payload,
            });
        }

        Ok(entries)
    }

    pub(crate) fn term_at(&self, index: LogIndex) -> Result<Option<LogTerm>, LogError> {
        match Index::from_log_index(index) {
            None => Ok(None),
            Some(index) => Ok(self.log.read(index).map_err(LogError::Storage)?.map(|e| e.term)),
        }
    }

    pub(crate) fn elect(&mut self, leader: ServerId) -> Result<LogTerm, LogError> {
        match self.participants.get(&leader) {
            Some(p) if !p.detached => {}
            _ => return Err(LogError::UnknownParticipant(leader)),
        }

        self.term.incr();
        self.leader = Some(leader);
        slog::info!(self.logger, "Term {:?} starts with leader {:?}", self.term, self.leader);

        self.truncate_uncommitted()?;
        // The first entry of a term lets the new leader commit whatever previous terms left behind.
        self.append_entry(StoredEntry {
            term: self.term,
            payload: None,
        })?;
        self.notify_roles();
        self.update_commit_index();

        Ok(self.term)
    }

    fn truncate_uncommitted(&mut self) -> Result<(), LogError> {
        let last_index = self.last_entry.map(|(_, index)| index).unwrap_or(LogIndex::ZERO);
        if last_index <= self.commit_index {
            return Ok(());
        }

        slog::info!(
            self.logger,
            "Dropping uncommitted entries {:?}..={:?}",
            self.commit_index.next(),
            last_index
        );
        self.log.truncate(Index::new(self.commit_index.as_u64() + 1));
        self.last_entry = match Index::from_log_index(self.commit_index) {
            None => None,
            Some(index) => self
                .log
                .read(index)
                .map_err(LogError::Storage)?
                .map(|entry| (entry.term, self.commit_index)),
        };

        let last_entry = self.last_entry;
        let commit_index = self.commit_index;
        for participant in self.participants.values_mut() {
            if matches!(participant.last_acked, Some((_, acked)) if acked > commit_index) {
                participant.last_acked = last_entry;
            }
        }

        Ok(())
    }

    pub(crate) fn resign(&mut self) -> LogTerm {
        self.term.incr();
        slog::info!(self.logger, "Leader {:?} resigned, term {:?} has no leader", self.leader, self.term);
        self.leader = None;
        self.notify_roles();

        self.term
    }

    fn notify_roles(&self) {
        for (id, participant) in self.participants.iter().filter(|(_, p)| !p.detached) {
            let role = if self.leader.as_ref() == Some(id) {
                LogRole::Leader { term: self.term }
            } else {
                LogRole::Follower {
                    term: self.term,
                    leader: self.leader.clone(),
                }
            };
            participant.role_notifier.notify_new_role(role);
        }
    }

    pub(crate) fn set_participant_failed(&mut self, id: &ServerId, failed: bool) -> Result<(), LogError> {
        let last_entry = self.last_entry;
        let leader_is_healthy = self.leader_is_healthy();
        let participant = self
            .participants
            .get_mut(id)
            .ok_or_else(|| LogError::UnknownParticipant(id.clone()))?;

        participant.failed = failed;
        if participant.is_healthy() && leader_is_healthy {
            // Catch up with the leader.
            participant.last_acked = last_entry;
        }
        slog::info!(self.logger, "Participant {:?} failed: {}", id, failed);

        self.update_commit_index();
        Ok(())
    }

    pub(crate) fn detach(&mut self, id: &ServerId) -> Result<(), LogError> {
        let participant = self
            .participants
            .get_mut(id)
            .ok_or_else(|| LogError::UnknownParticipant(id.clone()))?;
        if participant.detached {
            return Ok(());
        }

        participant.detached = true;
        participant.role_notifier.notify_new_role(LogRole::Detached);
        slog::info!(self.logger, "Participant {:?} detached", id);

        if self.leader.as_ref() == Some(id) {
            self.resign();
        }

        Ok(())
    }

    pub(crate) fn compact(&mut self, up_to: LogIndex) -> Result<LogIndex, LogError> {
        let limit = cmp::min(up_to, self.commit_index.saturating_prev());
        if let Some(index) = Index::from_log_index(limit) {
            self.log.compact(index);
            slog::info!(self.logger, "Compacted log up to {:?}", limit);
        }

        Ok(self.log.first_index().as_log_index())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn logger() -> slog::Logger {
        slog::Logger::root(slog::Discard, slog::o!())
    }

    fn servers() -> Vec<ServerId> {
        vec!["a".into(), "b".into(), "c".into()]
    }

    fn create_log() -> InMemoryReplicatedLog {
        InMemoryReplicatedLog::create(logger(), LogId::new(1), servers(), InMemoryLogOptions::default()).unwrap()
    }

    #[test]
    fn options_validation() {
        let too_large = InMemoryLogOptions {
            write_concern: Some(4),
        };
        assert!(InMemoryLogOptionsValidated::try_from((too_large, 3)).is_err());

        let zero = InMemoryLogOptions {
            write_concern: Some(0),
        };
        assert!(InMemoryLogOptionsValidated::try_from((zero, 3)).is_err());

        let defaulted = InMemoryLogOptionsValidated::try_from((InMemoryLogOptions::default(), 5)).unwrap();
        assert_eq!(3, defaulted.write_concern);
    }

    #[tokio::test]
    async fn only_the_leader_appends() {
        let log = create_log();
        let term = log.elect(&"a".into()).await.unwrap();

        let leader = log.participant(&"a".into()).unwrap();
        let follower = log.participant(&"b".into()).unwrap();
        assert_eq!(LogRole::Leader { term }, leader.role_listener().current());
        assert_eq!(
            LogRole::Follower {
                term,
                leader: Some("a".into())
            },
            follower.role_listener().current()
        );

        // Index 1 is the first entry of the term.
        let index = leader.append(term, Bytes::from_static(b"x")).await.unwrap();
        assert_eq!(LogIndex::new(2), index);
        leader.wait_for_commit(term, index).await.unwrap();

        assert!(matches!(
            follower.append(term, Bytes::from_static(b"y")).await,
            Err(LogError::NotLeader)
        ));
    }

    #[tokio::test]
    async fn commit_waits_for_write_concern() {
        let log = create_log();
        let term = log.elect(&"a".into()).await.unwrap();
        let leader = log.participant(&"a".into()).unwrap();

        log.set_participant_failed(&"b".into(), true).await.unwrap();
        log.set_participant_failed(&"c".into(), true).await.unwrap();
        let index = leader.append(term, Bytes::from_static(b"x")).await.unwrap();

        let pending = tokio::time::timeout(Duration::from_millis(50), leader.wait_for_commit(term, index)).await;
        assert!(pending.is_err(), "Entry must not commit without a quorum");

        log.set_participant_failed(&"c".into(), false).await.unwrap();
        leader.wait_for_commit(term, index).await.unwrap();
        assert_eq!(index, log.commit_index());
    }

    #[tokio::test]
    async fn new_term_drops_uncommitted_entries_and_releases_waiters() {
        let log = create_log();
        let term = log.elect(&"a".into()).await.unwrap();
        let old_leader = log.participant(&"a".into()).unwrap();
        log.set_participant_failed(&"b".into(), true).await.unwrap();
        log.set_participant_failed(&"c".into(), true).await.unwrap();
        let index = old_leader.append(term, Bytes::from_static(b"lost")).await.unwrap();
        let waiter = {
            let old_leader = old_leader.clone();
            tokio::spawn(async move { old_leader.wait_for_commit(term, index).await })
        };

        // The entry only lives on a, so it must not reach b and c when they recover.
        log.set_participant_failed(&"a".into(), true).await.unwrap();
        log.set_participant_failed(&"b".into(), false).await.unwrap();
        log.set_participant_failed(&"c".into(), false).await.unwrap();
        let new_term = log.elect(&"b".into()).await.unwrap();
        assert!(new_term > term);

        assert!(matches!(waiter.await.unwrap(), Err(LogError::Resigned)));
        assert!(matches!(
            old_leader.append(term, Bytes::from_static(b"late")).await,
            Err(LogError::Resigned)
        ));
    }

    #[tokio::test]
    async fn read_committed_in_order_and_compaction() {
        let log = create_log();
        let term = log.elect(&"a".into()).await.unwrap();
        let leader = log.participant(&"a".into()).unwrap();
        let follower = log.participant(&"b".into()).unwrap();

        let mut last = LogIndex::ZERO;
        for i in 0..5u8 {
            last = leader.append(term, Bytes::from(vec![i])).await.unwrap();
        }
        leader.wait_for_commit(term, last).await.unwrap();

        let entries = follower.read_committed(LogIndex::new(1)).await.unwrap();
        assert_eq!(6, entries.len());
        assert!(entries[0].payload.is_none());
        for (i, entry) in entries.iter().enumerate() {
            assert_eq!(LogIndex::new(i as u64 + 1), entry.index);
        }
        assert_eq!(Some(Bytes::from(vec![4u8])), entries[5].payload);

        let first_index = log.compact(LogIndex::new(3)).await.unwrap();
        assert_eq!(LogIndex::new(4), first_index);
        match follower.read_committed(LogIndex::new(2)).await {
            Err(LogError::Compacted { first_index }) => assert_eq!(LogIndex::new(4), first_index),
            other => panic!("Unexpected read result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn read_committed_waits_for_new_commits() {
        let log = create_log();
        let term = log.elect(&"a".into()).await.unwrap();
        let leader = log.participant(&"a".into()).unwrap();
        let follower = log.participant(&"c".into()).unwrap();

        let (started_tx, started_rx) = tokio::sync::oneshot::channel();
        let reader = tokio::spawn(async move {
            let _ = started_tx.send(());
            follower.read_committed(LogIndex::new(2)).await
        });
        started_rx.await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        leader.append(term, Bytes::from_static(b"x")).await.unwrap();
        let entries = reader.await.unwrap().unwrap();
        assert_eq!(LogIndex::new(2), entries[0].index);
    }
}
