use crate::codec::{CodecError, JsonCodec, WireCodec};
use crate::replicated_log::{LogError, ReplicatedLog};
use crate::state::applier::Applier;
use crate::state::state_core::StateCore;
use crate::state::stop_signal::{self, StopCheck, Stopper};
use crate::state::{PrototypeLogEntry, PrototypeStateMachine, Snapshot, StateMachine};
use crate::types::{LogId, LogIndex, LogTerm};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum LeaderStateError {
    #[error("Leadership was lost")]
    LeaderResigned,
    #[error("Appending to the log failed: {0}")]
    LogAppendFailed(LogError),
    #[error("Failed to encode entry: {0}")]
    Encode(CodecError),
}

impl From<LogError> for LeaderStateError {
    fn from(e: LogError) -> Self {
        match e {
            // The log rejects the term we were elected in; somebody else leads now.
            LogError::NotLeader | LogError::Resigned => LeaderStateError::LeaderResigned,
            _ => LeaderStateError::LogAppendFailed(e),
        }
    }
}

/// LeaderState owns the authoritative state of a log for one term in which this node leads.
///
/// Writes are appended to the log and acknowledged once committed. They are applied to the local
/// state asynchronously afterwards, so a writer that wants to read its own write uses
/// `get_snapshot()` with the returned index. Once resigned, every operation fails with
/// `LeaderResigned`, including those already waiting. A leader whose state fails resigns as well.
pub struct LeaderState<S: StateMachine> {
    logger: slog::Logger,
    log: Arc<dyn ReplicatedLog>,
    term: LogTerm,
    core: Arc<StateCore<S>>,
    codec: JsonCodec,
    stopper: Stopper,
    stop_check: StopCheck,
}

impl<S: StateMachine> LeaderState<S> {
    /// create starts leading `log` in `term` with `core` as the state applied so far.
    pub(crate) fn create(
        logger: slog::Logger,
        log: Arc<dyn ReplicatedLog>,
        term: LogTerm,
        core: StateCore<S>,
        codec: JsonCodec,
    ) -> Arc<Self> {
        let logger = logger.new(slog::o!("Role" => "Leader", "Term" => term.as_u64()));
        let core = Arc::new(core);
        let (stopper, stop_check) = stop_signal::new();

        // The leader has nobody to take a snapshot from, so its applier only returns when the
        // state can't go on. The leader resigns then.
        let applier = Applier::new(
            logger.clone(),
            log.clone(),
            core.clone(),
            codec,
            None,
            stop_check.clone(),
        );

        slog::info!(logger, "Leading from applied index {:?}", core.applied_index());
        let leader = Arc::new(LeaderState {
            logger,
            log,
            term,
            core,
            codec,
            stopper,
            stop_check,
        });

        let instance = Arc::downgrade(&leader);
        tokio::spawn(async move {
            applier.run().await;
            if let Some(leader) = instance.upgrade() {
                if !leader.is_resigned() {
                    slog::crit!(leader.logger, "State can't be applied any further");
                    leader.resign();
                }
            }
        });

        leader
    }

    pub fn log_id(&self) -> LogId {
        self.log.log_id()
    }

    pub fn term(&self) -> LogTerm {
        self.term
    }

    pub fn applied_index(&self) -> LogIndex {
        self.core.applied_index()
    }

    pub fn is_resigned(&self) -> bool {
        self.stop_check.should_stop()
    }

    // The state awaits a snapshot and must not be trusted.
    pub(crate) fn is_failed(&self) -> bool {
        self.core.is_failed()
    }

    /// resign tears this instance down and releases everybody waiting on it.
    pub(crate) fn resign(&self) {
        if !self.is_resigned() {
            slog::info!(self.logger, "Resigning");
            self.stopper.stop();
        }
    }

    fn check_leadership(&self) -> Result<(), LeaderStateError> {
        if self.is_resigned() {
            Err(LeaderStateError::LeaderResigned)
        } else {
            Ok(())
        }
    }

    /// append_entry appends `entry` and waits until it's committed.
    pub async fn append_entry(&self, entry: &S::Entry) -> Result<LogIndex, LeaderStateError> {
        self.check_leadership()?;
        let payload = self.codec.encode(entry).map_err(LeaderStateError::Encode)?;

        let mut stop_check = self.stop_check.clone();
        let index = tokio::select! {
            _ = stop_check.stopped() => return Err(LeaderStateError::LeaderResigned),
            appended = self.log.append(self.term, payload) => appended?,
        };

        tokio::select! {
            _ = stop_check.stopped() => {
                slog::warn!(self.logger, "Resigned while waiting for commit of {:?}", index);
                Err(LeaderStateError::LeaderResigned)
            }
            committed = self.log.wait_for_commit(self.term, index) => {
                committed?;
                Ok(index)
            }
        }
    }

    /// get_snapshot waits until everything up to `wait_for_index` is applied and returns a copy of
    /// the state.
    pub async fn get_snapshot(&self, wait_for_index: LogIndex) -> Result<Snapshot<S::Snapshot>, LeaderStateError> {
        let mut applied = self.core.applied_listener();
        let mut stop_check = self.stop_check.clone();

        loop {
            self.check_leadership()?;
            if *applied.borrow() >= wait_for_index {
                break;
            }

            tokio::select! {
                _ = stop_check.stopped() => {
                    slog::warn!(self.logger, "Resigned while waiting for {:?} to be applied", wait_for_index);
                    return Err(LeaderStateError::LeaderResigned);
                }
                changed = applied.changed() => {
                    if changed.is_err() {
                        return Err(LeaderStateError::LeaderResigned);
                    }
                }
            }
        }

        Ok(self.snapshot())
    }

    /// snapshot copies the state as currently applied, without waiting.
    pub fn snapshot(&self) -> Snapshot<S::Snapshot> {
        let (data, index) = self.core.snapshot();

        Snapshot { index, data }
    }
}

impl LeaderState<PrototypeStateMachine> {
    /// insert writes `entries`; if a key repeats, the last value wins.
    pub async fn insert<I, K, V>(&self, entries: I) -> Result<LogIndex, LeaderStateError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.append_entry(&PrototypeLogEntry::insert(entries)).await
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, LeaderStateError> {
        self.check_leadership()?;

        Ok(self.core.read(|machine| machine.get(key).cloned()))
    }

    /// get_many returns the values of all present keys among `keys`.
    pub fn get_many<'a, I: IntoIterator<Item = &'a str>>(
        &self,
        keys: I,
    ) -> Result<BTreeMap<String, String>, LeaderStateError> {
        self.check_leadership()?;

        Ok(self.core.read(|machine| machine.get_many(keys)))
    }

    pub async fn remove(&self, key: &str) -> Result<LogIndex, LeaderStateError> {
        self.remove_many(vec![key]).await
    }

    /// remove_many removes `keys`. Absent keys are no error.
    pub async fn remove_many<I, K>(&self, keys: I) -> Result<LogIndex, LeaderStateError>
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.append_entry(&PrototypeLogEntry::remove(keys)).await
    }
}
