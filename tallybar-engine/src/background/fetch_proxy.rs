//! Fetch proxy.
//!
//! Answers `FETCH` messages by performing the request on the privileged
//! side. Contexts without network access build their clients on a
//! [`MessageTransport`](tallybar_fetch::MessageTransport) pointed at the
//! router, so their requests end up here.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tallybar_fetch::{FETCH_MESSAGE, FetchEnvelope, FetchRequest, Transport};
use tracing::{debug, instrument};

use super::{BackgroundModule, Cleanup};
use crate::error::EngineError;
use crate::router::MessageRouter;

/// Registers the `FETCH` handler.
#[derive(Clone)]
pub struct FetchProxyModule {
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for FetchProxyModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchProxyModule").finish_non_exhaustive()
    }
}

impl FetchProxyModule {
    /// Creates the module over the privileged transport.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Performs one proxied request.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidMessage`] if `payload` is not a request.
    /// Transport failures are reported inside the envelope.
    #[instrument(skip(self, payload))]
    pub async fn proxy(&self, payload: Value) -> Result<Value, EngineError> {
        let request: FetchRequest = serde_json::from_value(payload)
            .map_err(|e| EngineError::InvalidMessage(e.to_string()))?;
        debug!(url = %request.url, method = ?request.method, "Proxying request");

        let envelope = FetchEnvelope::from_result(self.transport.send(request).await);
        serde_json::to_value(envelope).map_err(|e| EngineError::InvalidMessage(e.to_string()))
    }
}

#[async_trait]
impl BackgroundModule for FetchProxyModule {
    fn name(&self) -> &'static str {
        "fetch-proxy"
    }

    async fn init(&self, router: &Arc<MessageRouter>) -> Result<Cleanup, EngineError> {
        let module = self.clone();
        router.register(FETCH_MESSAGE, move |payload| {
            let module = module.clone();
            async move { module.proxy(payload).await }
        });

        let router = Arc::clone(router);
        Ok(Box::new(move || {
            router.unregister(FETCH_MESSAGE);
        }))
    }
}
