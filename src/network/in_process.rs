use crate::network::{RestRequest, RestResponse, Transport, TransportError};
use crate::server::RestHandler;
use crate::types::ServerId;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// InProcessTransport delivers requests straight to the `RestHandler` of servers living in the
/// same process.
#[derive(Default)]
pub struct InProcessTransport {
    handlers: RwLock<HashMap<ServerId, Arc<RestHandler>>>,
}

impl InProcessTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, server: ServerId, handler: Arc<RestHandler>) {
        self.handlers
            .write()
            .expect("InProcessTransport.register() lock poison")
            .insert(server, handler);
    }

    pub fn unregister(&self, server: &ServerId) {
        self.handlers
            .write()
            .expect("InProcessTransport.unregister() lock poison")
            .remove(server);
    }
}

#[async_trait::async_trait]
impl Transport for InProcessTransport {
    async fn send(&self, server: &ServerId, request: RestRequest) -> Result<RestResponse, TransportError> {
        let handler = self
            .handlers
            .read()
            .expect("InProcessTransport.send() lock poison")
            .get(server)
            .cloned()
            .ok_or_else(|| TransportError::UnknownServer(server.clone()))?;

        Ok(handler.handle(request).await)
    }
}
