//! Scripted transport for driver tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tallybar_fetch::{ApiClient, FetchError, FetchRequest, Payload, RateLimiter, RetryPolicy, Transport};
use url::Url;

/// Answers requests by path; a path with several queued responses answers
/// them in order and repeats the last one.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<String, Vec<Result<Value, u16>>>>,
    requests: Mutex<Vec<FetchRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn on(&self, path: &str, body: Value) -> &Self {
        self.routes
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push(Ok(body));
        self
    }

    pub fn fail(&self, path: &str, status: u16) -> &Self {
        self.routes
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push(Err(status));
        self
    }

    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn query(request: &FetchRequest, key: &str) -> Option<String> {
        Url::parse(&request.url)
            .ok()?
            .query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    pub fn client(self: &Arc<Self>) -> ApiClient {
        ApiClient::new(
            "https://api.example",
            Arc::clone(self) as Arc<dyn Transport>,
            Arc::new(RateLimiter::new(1000)),
        )
        .with_retry(RetryPolicy::no_retry())
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: FetchRequest) -> Result<Payload, FetchError> {
        let path = Url::parse(&request.url)
            .map(|u| u.path().to_string())
            .unwrap_or_default();
        self.requests.lock().unwrap().push(request);

        let response = {
            let mut routes = self.routes.lock().unwrap();
            let queue = routes.get_mut(&path);
            match queue {
                Some(queue) if queue.len() > 1 => Some(queue.remove(0)),
                Some(queue) => queue.first().cloned(),
                None => None,
            }
        };

        match response {
            Some(Ok(body)) => Ok(Payload::Json(body)),
            Some(Err(status)) => Err(FetchError::Transport {
                status: Some(status),
                message: format!("status {status}"),
                body: None,
            }),
            None => Err(FetchError::Transport {
                status: Some(404),
                message: format!("no route for {path}"),
                body: None,
            }),
        }
    }
}
