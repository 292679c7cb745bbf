use crate::state::{ApplyError, StateMachine};
use crate::types::LogIndex;
use std::sync::RwLock;
use tokio::sync::watch;

/// StateCore guards a state machine and the index of the last entry applied to it. Every entry is
/// applied under the write lock, so readers see either none or all of its effects.
///
/// A gap or a rejected entry fails the core: it keeps what was applied so far, refuses further
/// entries, and waits for a snapshot to be installed.
pub(crate) struct StateCore<S: StateMachine> {
    inner: RwLock<Inner<S>>,
    applied_notifier: watch::Sender<LogIndex>,
    // Held so notifications never go to a channel without receivers.
    applied_listener: watch::Receiver<LogIndex>,
    failure_notifier: watch::Sender<bool>,
    failure_listener: watch::Receiver<bool>,
}

struct Inner<S> {
    machine: S,
    applied_index: LogIndex,
    failed: bool,
}

impl<S: StateMachine> StateCore<S> {
    pub(crate) fn new(machine: S, applied_index: LogIndex) -> Self {
        let (applied_notifier, applied_listener) = watch::channel(applied_index);
        let (failure_notifier, failure_listener) = watch::channel(false);

        StateCore {
            inner: RwLock::new(Inner {
                machine,
                applied_index,
                failed: false,
            }),
            applied_notifier,
            applied_listener,
            failure_notifier,
            failure_listener,
        }
    }

    /// from_snapshot builds a core whose state is `snapshot`, applied up to `applied_index`.
    pub(crate) fn from_snapshot(snapshot: S::Snapshot, applied_index: LogIndex) -> Self {
        let mut machine = S::default();
        machine.install(snapshot);

        Self::new(machine, applied_index)
    }

    pub(crate) fn applied_index(&self) -> LogIndex {
        self.inner.read().expect("StateCore.applied_index() lock poison").applied_index
    }

    pub(crate) fn applied_listener(&self) -> watch::Receiver<LogIndex> {
        self.applied_listener.clone()
    }

    pub(crate) fn is_failed(&self) -> bool {
        self.inner.read().expect("StateCore.is_failed() lock poison").failed
    }

    /// fail marks the state as no longer trustworthy until a snapshot is installed.
    pub(crate) fn fail(&self) {
        let mut inner = self.inner.write().expect("StateCore.fail() lock poison");
        Self::mark_failed(&mut inner, &self.failure_notifier);
    }

    /// failed resolves once the core has failed.
    pub(crate) async fn failed(&self) {
        let mut listener = self.failure_listener.clone();
        loop {
            let failed = *listener.borrow();
            if failed || listener.changed().await.is_err() {
                return;
            }
        }
    }

    /// apply_entries applies `entries` in order, the first one being the entry at `start_index`.
    /// `None` marks a position that holds no state machine entry; it only advances the applied
    /// index.
    ///
    /// Entries are applied one by one and the applied index follows each of them, so if the state
    /// machine rejects one the state reflects exactly the entries before it. The core fails then,
    /// as it does on a gap.
    pub(crate) fn apply_entries(
        &self,
        start_index: LogIndex,
        entries: Vec<Option<S::Entry>>,
    ) -> Result<LogIndex, ApplyError> {
        let mut inner = self.inner.write().expect("StateCore.apply_entries() lock poison");
        if inner.failed {
            return Err(ApplyError::AwaitingSnapshot {
                applied: inner.applied_index,
            });
        }

        let expected = inner.applied_index.next();
        if start_index != expected {
            Self::mark_failed(&mut inner, &self.failure_notifier);
            return Err(ApplyError::Gap {
                expected,
                actual: start_index,
            });
        }

        let mut result = Ok(());
        for entry in entries {
            let index = inner.applied_index.next();
            if let Some(entry) = entry {
                if let Err(e) = inner.machine.apply(entry) {
                    Self::mark_failed(&mut inner, &self.failure_notifier);
                    result = Err(e);
                    break;
                }
            }
            inner.applied_index = index;
        }

        let applied_index = inner.applied_index;
        drop(inner);
        let _ = self.applied_notifier.send(applied_index);

        result.map(|_| applied_index)
    }

    /// install replaces the whole state and clears a failure. The applied index never moves
    /// backwards, so a snapshot older than what's already applied is rejected.
    pub(crate) fn install(&self, snapshot: S::Snapshot, at_index: LogIndex) -> Result<(), ApplyError> {
        let mut inner = self.inner.write().expect("StateCore.install() lock poison");
        if at_index < inner.applied_index {
            return Err(ApplyError::StaleSnapshot {
                applied: inner.applied_index,
                snapshot: at_index,
            });
        }

        inner.machine.install(snapshot);
        inner.applied_index = at_index;
        inner.failed = false;
        let _ = self.failure_notifier.send(false);
        drop(inner);
        let _ = self.applied_notifier.send(at_index);

        Ok(())
    }

    /// snapshot copies the state together with the index it reflects.
    pub(crate) fn snapshot(&self) -> (S::Snapshot, LogIndex) {
        let inner = self.inner.read().expect("StateCore.snapshot() lock poison");

        (inner.machine.snapshot(), inner.applied_index)
    }

    pub(crate) fn read<R, F: FnOnce(&S) -> R>(&self, f: F) -> R {
        let inner = self.inner.read().expect("StateCore.read() lock poison");

        f(&inner.machine)
    }

    // Failure changes are sent under the write lock, so the listener never trails the flag.
    fn mark_failed(inner: &mut Inner<S>, failure_notifier: &watch::Sender<bool>) {
        inner.failed = true;
        let _ = failure_notifier.send(true);
    }
}
