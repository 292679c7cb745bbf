use crate::replicated_log::in_memory::LogCore;
use crate::replicated_log::{LogEntry, LogError};
use crate::types::{LogIndex, LogTerm, ServerId};
use bytes::Bytes;
use std::fmt::Debug;
use tokio::sync::{mpsc, oneshot};

pub(super) fn create(buffer_size: usize, core: LogCore) -> (LogActorClient, LogActor) {
    let (tx, rx) = mpsc::channel(buffer_size);
    let client = LogActorClient { sender: tx };
    let actor = LogActor { receiver: rx, core };

    (client, actor)
}

#[derive(Debug)]
enum Event {
    // Leader: append locally, let healthy participants acknowledge, recompute commit index.
    // Anybody else: reject.
    Append(ServerId, LogTerm, Bytes, Callback<LogIndex>),

    ReadCommitted(LogIndex, Callback<Vec<LogEntry>>),

    // Term of the entry at the given index, if it's still around.
    TermAt(LogIndex, Callback<Option<LogTerm>>),

    // Start a new term led by the given participant.
    Elect(ServerId, Callback<LogTerm>),

    // Start a new term without a leader.
    Resign(Callback<LogTerm>),

    SetParticipantFailed(ServerId, bool, Callback<()>),

    Detach(ServerId, Callback<()>),

    Compact(LogIndex, Callback<LogIndex>),
}

#[derive(Debug)]
struct Callback<O: Debug>(oneshot::Sender<Result<O, LogError>>);

impl<O: Debug> Callback<O> {
    fn send(self, message: Result<O, LogError>) {
        let _ = self.0.send(message);
    }
}

#[derive(Clone)]
pub(crate) struct LogActorClient {
    sender: mpsc::Sender<Event>,
}

impl LogActorClient {
    pub(crate) async fn append(&self, from: ServerId, term: LogTerm, payload: Bytes) -> Result<LogIndex, LogError> {
        self.call(|cb| Event::Append(from, term, payload, cb)).await
    }

    pub(crate) async fn read_committed(&self, from: LogIndex) -> Result<Vec<LogEntry>, LogError> {
        self.call(|cb| Event::ReadCommitted(from, cb)).await
    }

    pub(crate) async fn term_at(&self, index: LogIndex) -> Result<Option<LogTerm>, LogError> {
        self.call(|cb| Event::TermAt(index, cb)).await
    }

    pub(crate) async fn elect(&self, leader: ServerId) -> Result<LogTerm, LogError> {
        self.call(|cb| Event::Elect(leader, cb)).await
    }

    pub(crate) async fn resign(&self) -> Result<LogTerm, LogError> {
        self.call(Event::Resign).await
    }

    pub(crate) async fn set_participant_failed(&self, participant: ServerId, failed: bool) -> Result<(), LogError> {
        self.call(|cb| Event::SetParticipantFailed(participant, failed, cb)).await
    }

    pub(crate) async fn detach(&self, participant: ServerId) -> Result<(), LogError> {
        self.call(|cb| Event::Detach(participant, cb)).await
    }

    pub(crate) async fn compact(&self, up_to: LogIndex) -> Result<LogIndex, LogError> {
        self.call(|cb| Event::Compact(up_to, cb)).await
    }

    async fn call<O, F>(&self, event_fn: F) -> Result<O, LogError>
    where
        O: Debug,
        F: FnOnce(Callback<O>) -> Event,
    {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(event_fn(Callback(tx)))
            .await
            .map_err(|_| LogError::ActorExited)?;

        rx.await.map_err(|_| LogError::ActorExited)?
    }
}

/// LogActor owns the log state and serializes every operation on it.
pub(super) struct LogActor {
    receiver: mpsc::Receiver<Event>,
    core: LogCore,
}

impl LogActor {
    pub(super) async fn run_event_loop(mut self) {
        while let Some(event) = self.receiver.recv().await {
            self.handle_event(event);
        }
        slog::info!(self.core.logger(), "Log event loop has exited");
    }

    // This must NOT be async. Any long running work must be spawned on another task
    // and/or come as a callback to this actor.
    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Append(from, term, payload, callback) => {
                callback.send(self.core.append(&from, term, payload));
            }
            Event::ReadCommitted(from, callback) => {
                callback.send(self.core.read_committed(from));
            }
            Event::TermAt(index, callback) => {
                callback.send(self.core.term_at(index));
            }
            Event::Elect(leader, callback) => {
                callback.send(self.core.elect(leader));
            }
            Event::Resign(callback) => {
                callback.send(Ok(self.core.resign()));
            }
            Event::SetParticipantFailed(participant, failed, callback) => {
                callback.send(self.core.set_participant_failed(&participant, failed));
            }
            Event::Detach(participant, callback) => {
                callback.send(self.core.detach(&participant));
            }
            Event::Compact(up_to, callback) => {
                callback.send(self.core.compact(up_to));
            }
        }
    }
}
