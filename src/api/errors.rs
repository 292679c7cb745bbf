use crate::state::{LeaderStateError, RegistryError};
use crate::types::{LogId, ServerId};
use tonic::codegen::http::StatusCode;

/// MethodsError is what callers of `PrototypeStateMethods` get back. Nothing is retried
/// internally: a caller seeing `LeaderResigned` decides itself whether to resolve the new leader
/// and try again.
#[derive(Debug, thiserror::Error)]
pub enum MethodsError {
    #[error("No replicated state for log {0:?} on this server")]
    StateNotFound(LogId),

    #[error("This server is not the leader of log {0:?}")]
    NotLeader(LogId),

    /// Leadership was lost during or just before the operation. A write may or may not have been
    /// committed.
    #[error("Leader of log {0:?} resigned")]
    LeaderResigned(LogId),

    #[error("Appending to log {log_id:?} failed: {message}")]
    LogAppendFailed { log_id: LogId, message: String },

    /// The remote server could not be reached, or answered with a failure.
    #[error("Request to {server} failed with status {status:?} ({error_kind:?}): {message}")]
    RemoteRequestFailed {
        server: ServerId,
        status: Option<u16>,
        error_kind: Option<String>,
        message: String,
    },

    #[error("Malformed response from {server}: {message}")]
    MalformedResponse { server: ServerId, message: String },

    #[error("Cannot locate leader of log {log_id:?}: {message}")]
    LeaderUnresolvable { log_id: LogId, message: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl MethodsError {
    /// kind names the error variant on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            MethodsError::StateNotFound(_) => "StateNotFound",
            MethodsError::NotLeader(_) => "NotLeader",
            MethodsError::LeaderResigned(_) => "LeaderResigned",
            MethodsError::LogAppendFailed { .. } => "LogAppendFailed",
            MethodsError::RemoteRequestFailed { .. } => "RemoteRequestFailed",
            MethodsError::MalformedResponse { .. } => "MalformedResponse",
            MethodsError::LeaderUnresolvable { .. } => "LeaderUnresolvable",
            MethodsError::InvalidRequest(_) => "InvalidRequest",
        }
    }

    pub(crate) fn status_code(&self) -> StatusCode {
        match self {
            MethodsError::StateNotFound(_) => StatusCode::NOT_FOUND,
            MethodsError::NotLeader(_) | MethodsError::LeaderResigned(_) => StatusCode::SERVICE_UNAVAILABLE,
            MethodsError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            MethodsError::LeaderUnresolvable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            MethodsError::RemoteRequestFailed { .. } | MethodsError::MalformedResponse { .. } => {
                StatusCode::BAD_GATEWAY
            }
            MethodsError::LogAppendFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub(crate) fn from_leader_state(log_id: LogId, e: LeaderStateError) -> Self {
        match e {
            LeaderStateError::LeaderResigned => MethodsError::LeaderResigned(log_id),
            LeaderStateError::LogAppendFailed(e) => MethodsError::LogAppendFailed {
                log_id,
                message: e.to_string(),
            },
            LeaderStateError::Encode(e) => MethodsError::LogAppendFailed {
                log_id,
                message: e.to_string(),
            },
        }
    }
}

impl From<RegistryError> for MethodsError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::StateNotFound(log_id) => MethodsError::StateNotFound(log_id),
            RegistryError::NotLeader(log_id) => MethodsError::NotLeader(log_id),
            RegistryError::AlreadyExists(log_id) => {
                MethodsError::InvalidRequest(format!("Replicated state for {:?} already exists", log_id))
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MethodsCreationError {
    #[error("Illegal options for configuring methods: {0}")]
    IllegalOptions(String),
    #[error("Prototype state methods are not available on {0:?} servers")]
    UnsupportedRole(crate::api::ServerRole),
    #[error("Missing {0} for the configured server role")]
    MissingCollaborator(&'static str),
}
