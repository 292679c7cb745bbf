use crate::api::{
    ErrorBody, IndexResult, LocalMethods, MethodsError, MethodsOptionsValidated, ResultEnvelope, SnapshotEnvelope,
    WAIT_FOR_INDEX_PARAMETER,
};
use crate::codec::{JsonCodec, WireCodec};
use crate::network::{decode_path_segment, RestRequest, RestResponse, RestVerb};
use crate::types::{LogId, LogIndex};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use tonic::codegen::http::StatusCode;

/// RestHandler is the REST surface of a log host:
///
/// | verb   | path                               | body             |
/// |--------|------------------------------------|------------------|
/// | POST   | `<prefix>/<log>/insert`            | `{key: value}`   |
/// | GET    | `<prefix>/<log>/entry/<key>`       |                  |
/// | POST   | `<prefix>/<log>/multi-get`         | `[key]`          |
/// | GET    | `<prefix>/<log>/snapshot?waitForIndex=N` |            |
/// | DELETE | `<prefix>/<log>/entry/<key>`       |                  |
/// | DELETE | `<prefix>/<log>/multi-remove`      | `[key]`          |
///
/// Successful responses wrap their payload in `{"result": ...}`. Reading an absent key answers 404
/// without a body; every other failure carries an error body.
pub struct RestHandler {
    logger: slog::Logger,
    methods: LocalMethods,
    url_prefix: Vec<String>,
    codec: JsonCodec,
}

#[derive(Debug, PartialEq)]
enum Route {
    Insert,
    GetEntry(String),
    MultiGet,
    Snapshot,
    RemoveEntry(String),
    MultiRemove,
}

#[derive(Debug)]
enum RouteError {
    NotFound(String),
    MethodNotAllowed(RestVerb, String),
    BadRequest(String),
}

impl RestHandler {
    pub(crate) fn new(
        logger: slog::Logger,
        methods: LocalMethods,
        options: &MethodsOptionsValidated,
        codec: JsonCodec,
    ) -> Self {
        RestHandler {
            logger,
            methods,
            url_prefix: options.url_prefix_segments().into_iter().map(String::from).collect(),
            codec,
        }
    }

    pub async fn handle(&self, request: RestRequest) -> RestResponse {
        let (log_id, route) = match self.route(&request) {
            Ok(routed) => routed,
            Err(e) => {
                slog::debug!(self.logger, "Rejected {:?}: {:?}", request, e);
                return self.route_error_response(e);
            }
        };

        match self.dispatch(log_id, route, request).await {
            Ok(response) => response,
            Err(e) => {
                slog::debug!(self.logger, "Request on {:?} failed: {}", log_id, e);
                self.error_response(e.status_code(), e.kind(), e.to_string())
            }
        }
    }

    fn route(&self, request: &RestRequest) -> Result<(LogId, Route), RouteError> {
        let segments: Vec<&str> = request.path.trim_start_matches('/').split('/').collect();
        let not_found = || RouteError::NotFound(request.path.clone());

        if segments.len() <= self.url_prefix.len() || segments[..self.url_prefix.len()] != self.url_prefix[..] {
            return Err(not_found());
        }
        let segments = &segments[self.url_prefix.len()..];
        let log_id = segments[0]
            .parse::<LogId>()
            .map_err(|_| RouteError::BadRequest(format!("Invalid log id '{}'", segments[0])))?;

        let verb = request.verb;
        let route = match (&segments[1..], verb) {
            (["insert"], RestVerb::Post) => Route::Insert,
            (["entry", key], RestVerb::Get) => Route::GetEntry(Self::decode_key(key)?),
            (["entry", key], RestVerb::Delete) => Route::RemoveEntry(Self::decode_key(key)?),
            (["multi-get"], RestVerb::Post) => Route::MultiGet,
            (["snapshot"], RestVerb::Get) => Route::Snapshot,
            (["multi-remove"], RestVerb::Delete) => Route::MultiRemove,
            (["insert"], _) | (["entry", _], _) | (["multi-get"], _) | (["snapshot"], _) | (["multi-remove"], _) => {
                return Err(RouteError::MethodNotAllowed(verb, request.path.clone()))
            }
            _ => return Err(not_found()),
        };

        Ok((log_id, route))
    }

    fn decode_key(key: &str) -> Result<String, RouteError> {
        decode_path_segment(key).ok_or_else(|| RouteError::BadRequest(format!("Invalid key '{}'", key)))
    }

    async fn dispatch(&self, log_id: LogId, route: Route, request: RestRequest) -> Result<RestResponse, MethodsError> {
        match route {
            Route::Insert => {
                let entries: BTreeMap<String, String> = self.decode_body(&request.body)?;
                let index = self.methods.insert(log_id, entries).await?;
                Ok(self.index_response(index))
            }
            Route::GetEntry(key) => match self.methods.get(log_id, &key).await? {
                Some(value) => {
                    let mut result = BTreeMap::new();
                    result.insert(key, value);
                    Ok(self.json_response(&ResultEnvelope { result }))
                }
                None => Ok(RestResponse::new(StatusCode::NOT_FOUND, Bytes::new())),
            },
            Route::MultiGet => {
                let keys: Vec<String> = self.decode_body(&request.body)?;
                let result = self.methods.get_many(log_id, &keys).await?;
                Ok(self.json_response(&ResultEnvelope { result }))
            }
            Route::Snapshot => {
                let wait_for_index = match request.parameters.get(WAIT_FOR_INDEX_PARAMETER) {
                    None => LogIndex::ZERO,
                    Some(value) => value.parse::<u64>().map(LogIndex::new).map_err(|_| {
                        MethodsError::InvalidRequest(format!("Invalid {} '{}'", WAIT_FOR_INDEX_PARAMETER, value))
                    })?,
                };
                let snapshot = self.methods.get_snapshot(log_id, wait_for_index).await?;
                Ok(self.json_response(&SnapshotEnvelope {
                    result: snapshot.data,
                    index: Some(snapshot.index),
                }))
            }
            Route::RemoveEntry(key) => {
                let index = self.methods.remove(log_id, &key).await?;
                Ok(self.index_response(index))
            }
            Route::MultiRemove => {
                let keys: Vec<String> = self.decode_body(&request.body)?;
                let index = self.methods.remove_many(log_id, keys).await?;
                Ok(self.index_response(index))
            }
        }
    }

    fn decode_body<T: DeserializeOwned + Serialize>(&self, body: &[u8]) -> Result<T, MethodsError> {
        self.codec
            .decode(body)
            .map_err(|e| MethodsError::InvalidRequest(format!("Invalid body: {}", e)))
    }

    fn index_response(&self, index: LogIndex) -> RestResponse {
        self.json_response(&ResultEnvelope {
            result: IndexResult { index },
        })
    }

    fn json_response<T: Serialize>(&self, body: &T) -> RestResponse {
        match self.codec.encode(body) {
            Ok(body) => RestResponse::new(StatusCode::OK, body),
            Err(e) => {
                slog::error!(self.logger, "Failed to encode response: {}", e);
                RestResponse::new(StatusCode::INTERNAL_SERVER_ERROR, Bytes::new())
            }
        }
    }

    fn error_response(&self, status: StatusCode, kind: &str, message: String) -> RestResponse {
        let body = ErrorBody {
            error: true,
            code: status.as_u16(),
            error_kind: Some(kind.to_string()),
            error_message: message,
        };

        match self.codec.encode(&body) {
            Ok(body) => RestResponse::new(status, body),
            Err(_) => RestResponse::new(status, Bytes::new()),
        }
    }

    fn route_error_response(&self, e: RouteError) -> RestResponse {
        match e {
            RouteError::NotFound(path) => self.error_response(
                StatusCode::NOT_FOUND,
                "RouteNotFound",
                format!("Unknown path '{}'", path),
            ),
            RouteError::MethodNotAllowed(verb, path) => self.error_response(
                StatusCode::METHOD_NOT_ALLOWED,
                "MethodNotAllowed",
                format!("{:?} not allowed on '{}'", verb, path),
            ),
            RouteError::BadRequest(message) => self.error_response(StatusCode::BAD_REQUEST, "InvalidRequest", message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::encode_path_segment;
    use crate::replicated_log::{InMemoryLogOptions, InMemoryReplicatedLog};
    use crate::state::PrototypeStateRegistry;
    use crate::types::ServerId;
    use serde_json::{json, Value};
    use std::convert::TryFrom;
    use std::sync::Arc;
    use std::time::Duration;

    fn logger() -> slog::Logger {
        slog::Logger::root(slog::Discard, slog::o!())
    }

    fn handler(registry: Arc<PrototypeStateRegistry>) -> RestHandler {
        let options = MethodsOptionsValidated::try_from(crate::api::MethodsOptions::default()).unwrap();
        RestHandler::new(logger(), LocalMethods::new(registry), &options, JsonCodec::default())
    }

    fn body_json(response: &RestResponse) -> Value {
        serde_json::from_slice(&response.body).unwrap()
    }

    async fn hosted_leader(log_id: LogId) -> (InMemoryReplicatedLog, Arc<PrototypeStateRegistry>) {
        let me = ServerId::from("me");
        let log = InMemoryReplicatedLog::create(logger(), log_id, vec![me.clone()], InMemoryLogOptions::default())
            .unwrap();
        let registry = Arc::new(PrototypeStateRegistry::new(logger(), JsonCodec::default(), None));
        registry.create_state(log.participant(&me).unwrap()).unwrap();
        log.elect(&me).await.unwrap();

        tokio::time::timeout(Duration::from_secs(5), async {
            while registry.get_leader(log_id).is_err() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        (log, registry)
    }

    #[test]
    fn routing_table() {
        let registry = Arc::new(PrototypeStateRegistry::new(logger(), JsonCodec::default(), None));
        let handler = handler(registry);
        let route = |verb, path: &str| handler.route(&RestRequest::new(verb, path));

        let cases = vec![
            (RestVerb::Post, "_api/prototype-state/5/insert", Some(Route::Insert)),
            (RestVerb::Get, "/_api/prototype-state/5/entry/k", Some(Route::GetEntry("k".into()))),
            (RestVerb::Get, "_api/prototype-state/5/entry/a%2Fb", Some(Route::GetEntry("a/b".into()))),
            (RestVerb::Delete, "_api/prototype-state/5/entry/k", Some(Route::RemoveEntry("k".into()))),
            (RestVerb::Post, "_api/prototype-state/5/multi-get", Some(Route::MultiGet)),
            (RestVerb::Get, "_api/prototype-state/5/snapshot", Some(Route::Snapshot)),
            (RestVerb::Delete, "_api/prototype-state/5/multi-remove", Some(Route::MultiRemove)),
            (RestVerb::Get, "_api/prototype-state/5/insert", None),
            (RestVerb::Get, "_api/other/5/insert", None),
            (RestVerb::Get, "_api/prototype-state/5/entry", None),
        ];
        for (verb, path, expected) in cases {
            match (route(verb, path), expected) {
                (Ok((log_id, route)), Some(expected)) => {
                    assert_eq!(LogId::new(5), log_id);
                    assert_eq!(expected, route, "{}", path);
                }
                (Err(_), None) => {}
                (result, expected) => panic!("{:?} {}: got {:?}, expected {:?}", verb, path, result, expected),
            }
        }

        assert!(matches!(
            route(RestVerb::Get, "_api/prototype-state/5/insert"),
            Err(RouteError::MethodNotAllowed(..))
        ));
        assert!(matches!(
            route(RestVerb::Get, "_api/prototype-state/x/snapshot"),
            Err(RouteError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn serves_leader_operations() {
        let log_id = LogId::new(5);
        let (_log, registry) = hosted_leader(log_id).await;
        let handler = handler(registry);

        let insert = RestRequest::new(RestVerb::Post, "_api/prototype-state/5/insert")
            .with_body(Bytes::from_static(br#"{"a":"1","b":"2"}"#));
        let response = handler.handle(insert).await;
        assert_eq!(StatusCode::OK, response.status);
        let index = body_json(&response)["result"]["index"].as_u64().unwrap();

        let snapshot = RestRequest::new(RestVerb::Get, "_api/prototype-state/5/snapshot")
            .with_parameter("waitForIndex", index);
        let response = handler.handle(snapshot).await;
        assert_eq!(json!({"result": {"a": "1", "b": "2"}, "index": index}), body_json(&response));

        let response = handler
            .handle(RestRequest::new(RestVerb::Get, "_api/prototype-state/5/entry/a"))
            .await;
        assert_eq!(json!({"result": {"a": "1"}}), body_json(&response));

        let response = handler
            .handle(RestRequest::new(RestVerb::Get, "_api/prototype-state/5/entry/zzz"))
            .await;
        assert_eq!(StatusCode::NOT_FOUND, response.status);
        assert!(response.body.is_empty());

        let multi_get = RestRequest::new(RestVerb::Post, "_api/prototype-state/5/multi-get")
            .with_body(Bytes::from_static(br#"["a","zzz"]"#));
        assert_eq!(json!({"result": {"a": "1"}}), body_json(&handler.handle(multi_get).await));

        let multi_remove = RestRequest::new(RestVerb::Delete, "_api/prototype-state/5/multi-remove")
            .with_body(Bytes::from_static(br#"["a","zzz"]"#));
        let response = handler.handle(multi_remove).await;
        assert!(body_json(&response)["result"]["index"].as_u64().unwrap() > index);
    }

    #[tokio::test]
    async fn failures_carry_error_body() {
        let log_id = LogId::new(5);
        let (_log, registry) = hosted_leader(log_id).await;
        let handler = handler(registry);

        let response = handler
            .handle(RestRequest::new(RestVerb::Get, "_api/prototype-state/6/entry/a"))
            .await;
        assert_eq!(StatusCode::NOT_FOUND, response.status);
        let body = body_json(&response);
        assert_eq!(json!(true), body["error"]);
        assert_eq!(json!(404), body["code"]);
        assert_eq!(json!("StateNotFound"), body["errorKind"]);

        let bad_body = RestRequest::new(RestVerb::Post, "_api/prototype-state/5/insert")
            .with_body(Bytes::from_static(b"[1, 2]"));
        let response = handler.handle(bad_body).await;
        assert_eq!(StatusCode::BAD_REQUEST, response.status);
        assert_eq!(json!("InvalidRequest"), body_json(&response)["errorKind"]);

        let bad_index = RestRequest::new(RestVerb::Get, "_api/prototype-state/5/snapshot")
            .with_parameter("waitForIndex", "soon");
        assert_eq!(StatusCode::BAD_REQUEST, handler.handle(bad_index).await.status);

        let wrong_verb = RestRequest::new(RestVerb::Delete, "_api/prototype-state/5/snapshot");
        let response = handler.handle(wrong_verb).await;
        assert_eq!(StatusCode::METHOD_NOT_ALLOWED, response.status);
        let body = body_json(&response);
        assert_eq!(json!(405), body["code"]);
        assert_eq!(json!("MethodNotAllowed"), body["errorKind"]);

        let unknown = RestRequest::new(RestVerb::Get, "_api/prototype-state/5/nothing-here");
        let response = handler.handle(unknown).await;
        assert_eq!(StatusCode::NOT_FOUND, response.status);
        let body = body_json(&response);
        assert_eq!(json!(true), body["error"]);
        assert_eq!(json!("RouteNotFound"), body["errorKind"]);

        let bad_key = RestRequest::new(RestVerb::Get, "_api/prototype-state/5/entry/%+1");
        let response = handler.handle(bad_key).await;
        assert_eq!(StatusCode::BAD_REQUEST, response.status);
        assert_eq!(json!("InvalidRequest"), body_json(&response)["errorKind"]);
    }

    #[tokio::test]
    async fn keys_with_reserved_characters() {
        let log_id = LogId::new(5);
        let (_log, registry) = hosted_leader(log_id).await;
        let handler = handler(registry);

        let insert = RestRequest::new(RestVerb::Post, "_api/prototype-state/5/insert")
            .with_body(Bytes::from_static(br#"{"a/b %c?d":"1","100%":"2"}"#));
        let index = body_json(&handler.handle(insert).await)["result"]["index"].as_u64().unwrap();
        let snapshot = RestRequest::new(RestVerb::Get, "_api/prototype-state/5/snapshot")
            .with_parameter("waitForIndex", index);
        assert_eq!(StatusCode::OK, handler.handle(snapshot).await.status);

        let path = format!("_api/prototype-state/5/entry/{}", encode_path_segment("a/b %c?d"));
        let response = handler.handle(RestRequest::new(RestVerb::Get, &path)).await;
        assert_eq!(json!({"result": {"a/b %c?d": "1"}}), body_json(&response));

        let response = handler
            .handle(RestRequest::new(RestVerb::Get, "_api/prototype-state/5/entry/100%25"))
            .await;
        assert_eq!(json!({"result": {"100%": "2"}}), body_json(&response));

        let response = handler.handle(RestRequest::new(RestVerb::Delete, &path)).await;
        assert_eq!(StatusCode::OK, response.status);
        let removed_at = body_json(&response)["result"]["index"].as_u64().unwrap();
        let snapshot = RestRequest::new(RestVerb::Get, "_api/prototype-state/5/snapshot")
            .with_parameter("waitForIndex", removed_at);
        assert_eq!(json!({"result": {"100%": "2"}, "index": removed_at}), body_json(&handler.handle(snapshot).await));
    }
}
