use crate::api::options::MethodsOptionsValidated;
use crate::api::wire::{self, ErrorBody, IndexResult, ResultEnvelope, SnapshotEnvelope};
use crate::api::MethodsError;
use crate::codec::{CodecOptions, JsonCodec, WireCodec};
use crate::network::{encode_path_segment, LeaderResolver, ResolveError, RestRequest, RestResponse, RestVerb, Transport};
use crate::state::Snapshot;
use crate::types::{LogId, LogIndex, ServerId};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tonic::codegen::http::StatusCode;

/// ForwardingMethods sends every request to the server leading the log, once. Leader resolution
/// happens per request; failures are reported, never retried.
#[derive(Clone)]
pub struct ForwardingMethods {
    logger: slog::Logger,
    options: MethodsOptionsValidated,
    codec: JsonCodec,
    leader_resolver: Arc<dyn LeaderResolver>,
    transport: Arc<dyn Transport>,
}

impl ForwardingMethods {
    pub(crate) fn new(
        logger: slog::Logger,
        options: MethodsOptionsValidated,
        leader_resolver: Arc<dyn LeaderResolver>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let codec = JsonCodec::new(CodecOptions {
            tolerate_unknown_fields: options.tolerate_unknown_fields,
        });

        ForwardingMethods {
            logger,
            options,
            codec,
            leader_resolver,
            transport,
        }
    }

    pub async fn insert(&self, log_id: LogId, entries: BTreeMap<String, String>) -> Result<LogIndex, MethodsError> {
        let body = self.encode_body(&entries)?;
        let request = RestRequest::new(RestVerb::Post, self.path(log_id, "insert")).with_body(body);

        self.send_for_index(log_id, request).await
    }

    /// get returns `None` if the leader doesn't know `key`.
    pub async fn get(&self, log_id: LogId, key: &str) -> Result<Option<String>, MethodsError> {
        let request = RestRequest::new(RestVerb::Get, self.entry_path(log_id, key));

        let server = self.resolve(log_id).await?;
        let response = self.send(&server, request).await?;
        if response.status == StatusCode::NOT_FOUND && response.body.is_empty() {
            return Ok(None);
        }
        let envelope: ResultEnvelope<BTreeMap<String, String>> = self.decode_success(&server, response)?;

        let mut result = envelope.result;
        match (result.len(), result.remove(key)) {
            (1, Some(value)) => Ok(Some(value)),
            _ => Err(MethodsError::MalformedResponse {
                server,
                message: format!("Expected exactly the requested key '{}' in result", key),
            }),
        }
    }

    /// get_many returns the present keys among `keys`.
    pub async fn get_many(&self, log_id: LogId, keys: &[String]) -> Result<BTreeMap<String, String>, MethodsError> {
        let body = self.encode_body(&keys)?;
        let request = RestRequest::new(RestVerb::Post, self.path(log_id, "multi-get")).with_body(body);

        let server = self.resolve(log_id).await?;
        let response = self.send(&server, request).await?;
        let envelope: ResultEnvelope<BTreeMap<String, String>> = self.decode_success(&server, response)?;

        Ok(envelope.result)
    }

    pub async fn get_snapshot(
        &self,
        log_id: LogId,
        wait_for_index: LogIndex,
    ) -> Result<Snapshot<BTreeMap<String, String>>, MethodsError> {
        let request = RestRequest::new(RestVerb::Get, self.path(log_id, "snapshot"))
            .with_parameter(wire::WAIT_FOR_INDEX_PARAMETER, wait_for_index);

        let server = self.resolve(log_id).await?;
        let response = self.send(&server, request).await?;
        let envelope: SnapshotEnvelope = self.decode_success(&server, response)?;

        Ok(Snapshot {
            index: envelope.index.unwrap_or(wait_for_index),
            data: envelope.result,
        })
    }

    pub async fn remove(&self, log_id: LogId, key: &str) -> Result<LogIndex, MethodsError> {
        let request = RestRequest::new(RestVerb::Delete, self.entry_path(log_id, key));

        self.send_for_index(log_id, request).await
    }

    pub async fn remove_many(&self, log_id: LogId, keys: Vec<String>) -> Result<LogIndex, MethodsError> {
        let body = self.encode_body(&keys)?;
        let request = RestRequest::new(RestVerb::Delete, self.path(log_id, "multi-remove")).with_body(body);

        self.send_for_index(log_id, request).await
    }

    fn path(&self, log_id: LogId, operation: &str) -> String {
        wire::operation_path(&self.options.url_prefix, log_id, operation)
    }

    fn entry_path(&self, log_id: LogId, key: &str) -> String {
        self.path(log_id, &format!("entry/{}", encode_path_segment(key)))
    }

    fn encode_body<T: Serialize>(&self, body: &T) -> Result<bytes::Bytes, MethodsError> {
        self.codec
            .encode(body)
            .map_err(|e| MethodsError::InvalidRequest(e.to_string()))
    }

    async fn resolve(&self, log_id: LogId) -> Result<ServerId, MethodsError> {
        self.leader_resolver.resolve_leader(log_id).await.map_err(|e| match e {
            ResolveError::Resigned(log_id) => MethodsError::LeaderResigned(log_id),
            ResolveError::Unknown(log_id) => MethodsError::LeaderUnresolvable {
                log_id,
                message: e.to_string(),
            },
        })
    }

    async fn send(&self, server: &ServerId, request: RestRequest) -> Result<RestResponse, MethodsError> {
        let result = tokio::time::timeout(self.options.request_timeout, self.transport.send(server, request)).await;

        match result {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => {
                slog::warn!(self.logger, "Request to {} failed: {}", server, e);
                Err(MethodsError::RemoteRequestFailed {
                    server: server.clone(),
                    status: None,
                    error_kind: None,
                    message: e.to_string(),
                })
            }
            Err(_) => {
                slog::warn!(self.logger, "Request to {} timed out", server);
                Err(MethodsError::RemoteRequestFailed {
                    server: server.clone(),
                    status: None,
                    error_kind: None,
                    message: format!("No response within {:?}", self.options.request_timeout),
                })
            }
        }
    }

    async fn send_for_index(&self, log_id: LogId, request: RestRequest) -> Result<LogIndex, MethodsError> {
        let server = self.resolve(log_id).await?;
        let response = self.send(&server, request).await?;
        let envelope: ResultEnvelope<IndexResult> = self.decode_success(&server, response)?;

        Ok(envelope.result.index)
    }

    fn decode_success<T: DeserializeOwned + Serialize>(
        &self,
        server: &ServerId,
        response: RestResponse,
    ) -> Result<T, MethodsError> {
        if !response.is_success() {
            return Err(Self::remote_failure(server, response));
        }

        self.codec
            .decode(&response.body)
            .map_err(|e| MethodsError::MalformedResponse {
                server: server.clone(),
                message: e.to_string(),
            })
    }

    fn remote_failure(server: &ServerId, response: RestResponse) -> MethodsError {
        // Error bodies are decoded leniently; whatever the remote reports is surfaced.
        let body: Option<ErrorBody> = JsonCodec::default().decode(&response.body).ok();
        let (error_kind, message) = match body {
            Some(body) => (body.error_kind, body.error_message),
            None => (None, String::from_utf8_lossy(&response.body).into_owned()),
        };

        MethodsError::RemoteRequestFailed {
            server: server.clone(),
            status: Some(response.status.as_u16()),
            error_kind,
            message,
        }
    }
}
