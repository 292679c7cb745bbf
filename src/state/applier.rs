use crate::codec::{JsonCodec, WireCodec};
use crate::replicated_log::{LogEntry, LogError, ReplicatedLog};
use crate::state::state_core::StateCore;
use crate::state::stop_signal::StopCheck;
use crate::state::{ApplyError, SnapshotSource, StateMachine};
use crate::types::LogIndex;
use std::sync::Arc;
use std::time::Duration;

const CATCH_UP_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Applier feeds committed entries of a log into a state, strictly in index order. It runs as a
/// task until its `StopCheck` fires or the log goes away.
///
/// When the log no longer has the entries the state needs next, or the state fails, the state is
/// reinitialized from a snapshot provided by the `SnapshotSource`. Without a source, the applier
/// gives up and returns.
pub(crate) struct Applier<S: StateMachine> {
    logger: slog::Logger,
    log: Arc<dyn ReplicatedLog>,
    core: Arc<StateCore<S>>,
    codec: JsonCodec,
    snapshot_source: Option<Arc<dyn SnapshotSource<S>>>,
    stop_check: StopCheck,
}

impl<S: StateMachine> Applier<S> {
    pub(crate) fn new(
        logger: slog::Logger,
        log: Arc<dyn ReplicatedLog>,
        core: Arc<StateCore<S>>,
        codec: JsonCodec,
        snapshot_source: Option<Arc<dyn SnapshotSource<S>>>,
        stop_check: StopCheck,
    ) -> Self {
        Applier {
            logger,
            log,
            core,
            codec,
            snapshot_source,
            stop_check,
        }
    }

    /// run applies until stopped. It returns early if the state can't continue, in which case the
    /// owner has to tear the instance down.
    pub(crate) async fn run(self) {
        slog::info!(self.logger, "Applier starting after {:?}", self.core.applied_index());

        loop {
            let from = self.core.applied_index().next();
            let mut stop_check = self.stop_check.clone();
            let read = tokio::select! {
                _ = stop_check.stopped() => break,
                _ = self.core.failed() => None,
                read = self.log.read_committed(from) => Some(read),
            };

            let catch_up_index = match read {
                None => {
                    slog::warn!(self.logger, "State failed after {:?}", self.core.applied_index());
                    from
                }
                Some(Ok(entries)) => match self.apply(entries) {
                    Ok(_) => continue,
                    Err(e) => {
                        slog::error!(self.logger, "Failed to apply entries from {:?}: {}", from, e);
                        match e {
                            ApplyError::Decode { index, .. } => index,
                            _ => self.core.applied_index().next(),
                        }
                    }
                },
                Some(Err(LogError::Compacted { first_index })) => {
                    slog::info!(
                        self.logger,
                        "Entries from {:?} were compacted, log starts at {:?}",
                        from,
                        first_index
                    );
                    first_index.saturating_prev()
                }
                Some(Err(e)) => {
                    slog::warn!(self.logger, "Log unavailable: {}", e);
                    break;
                }
            };

            if !self.catch_up(catch_up_index).await {
                break;
            }
        }

        slog::info!(self.logger, "Applier stopped at {:?}", self.core.applied_index());
    }

    fn apply(&self, entries: Vec<LogEntry>) -> Result<LogIndex, ApplyError> {
        let start_index = match entries.first() {
            Some(entry) => entry.index,
            None => return Ok(self.core.applied_index()),
        };

        let decoded = entries
            .into_iter()
            .map(|entry| {
                let index = entry.index;
                match entry.payload {
                    None => Ok(None),
                    Some(payload) => self
                        .codec
                        .decode(&payload)
                        .map(Some)
                        .map_err(|source| ApplyError::Decode { index, source }),
                }
            })
            .collect::<Result<Vec<_>, _>>();

        match decoded {
            Ok(decoded) => self.core.apply_entries(start_index, decoded),
            Err(e) => {
                self.core.fail();
                Err(e)
            }
        }
    }

    // Returns false if the applier should stop.
    async fn catch_up(&self, wait_for_index: LogIndex) -> bool {
        let snapshot_source = match &self.snapshot_source {
            Some(snapshot_source) => snapshot_source.clone(),
            None => {
                slog::crit!(self.logger, "State can't continue and has no snapshot source to recover from");
                return false;
            }
        };

        loop {
            let mut stop_check = self.stop_check.clone();
            let acquired = tokio::select! {
                _ = stop_check.stopped() => return false,
                acquired = snapshot_source.acquire_snapshot(self.log.log_id(), wait_for_index) => acquired,
            };

            match acquired {
                Ok(snapshot) => {
                    let index = snapshot.index;
                    match self.core.install(snapshot.data, index) {
                        Ok(_) => {
                            slog::info!(self.logger, "Installed snapshot at {:?}", index);
                            return true;
                        }
                        Err(e) => slog::warn!(self.logger, "Discarding snapshot: {}", e),
                    }
                }
                Err(e) => slog::warn!(self.logger, "Failed to acquire snapshot: {}", e),
            }

            tokio::select! {
                _ = stop_check.stopped() => return false,
                _ = tokio::time::sleep(CATCH_UP_RETRY_DELAY) => {}
            }
        }
    }
}
