use crate::types::LogIndex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// Bodies exchanged between `ForwardingMethods` and `RestHandler`.

pub(crate) const WAIT_FOR_INDEX_PARAMETER: &str = "waitForIndex";

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ResultEnvelope<T> {
    pub result: T,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct IndexResult {
    pub index: LogIndex,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct SnapshotEnvelope {
    pub result: BTreeMap<String, String>,
    // Applied index the snapshot reflects. Older servers don't send it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<LogIndex>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ErrorBody {
    pub error: bool,
    pub code: u16,
    #[serde(rename = "errorKind", default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(rename = "errorMessage", default)]
    pub error_message: String,
}

/// Path of an operation on a log, relative to the server root.
pub(crate) fn operation_path(url_prefix: &str, log_id: crate::types::LogId, operation: &str) -> String {
    format!("{}/{}/{}", url_prefix, log_id, operation)
}
