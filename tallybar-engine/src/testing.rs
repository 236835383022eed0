//! Test doubles shared by engine tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tallybar_core::{PlatformType, Tenant};
use tallybar_fetch::{FetchContext, FetchError, FetchRequest, FetchSettings, Payload, RetryPolicy, Transport};
use tallybar_store::{Config, MemoryKeyValueStore, SharedKeyValueStore};
use url::Url;

use crate::background::badge::BadgeSink;
use crate::context::AppContext;
use crate::notify::{Notification, Notifier};

#[derive(Clone)]
enum Route {
    Json(Value),
    Status(u16),
    Hang,
}

/// Answers requests by path. A path with several queued responses answers
/// them in order and then repeats the last one.
#[derive(Default)]
pub struct MockPlatform {
    routes: Mutex<HashMap<String, Vec<Route>>>,
    requests: Mutex<Vec<FetchRequest>>,
}

impl MockPlatform {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push(&self, path: &str, route: Route) -> &Self {
        self.routes
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push(route);
        self
    }

    pub fn on(&self, path: &str, body: Value) -> &Self {
        self.push(path, Route::Json(body))
    }

    pub fn fail(&self, path: &str, status: u16) -> &Self {
        self.push(path, Route::Status(status))
    }

    /// Never answers.
    pub fn hang(&self, path: &str) -> &Self {
        self.push(path, Route::Hang)
    }

    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self, path: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| Url::parse(&r.url).is_ok_and(|u| u.path() == path))
            .count()
    }

    pub fn query(request: &FetchRequest, key: &str) -> Option<String> {
        Url::parse(&request.url)
            .ok()?
            .query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }
}

#[async_trait]
impl Transport for MockPlatform {
    async fn send(&self, request: FetchRequest) -> Result<Payload, FetchError> {
        let path = Url::parse(&request.url)
            .map(|u| u.path().to_string())
            .unwrap_or_default();
        self.requests.lock().unwrap().push(request);

        let route = {
            let mut routes = self.routes.lock().unwrap();
            match routes.get_mut(&path) {
                Some(queue) if queue.len() > 1 => Some(queue.remove(0)),
                Some(queue) => queue.first().cloned(),
                None => None,
            }
        };

        match route {
            Some(Route::Json(body)) => Ok(Payload::Json(body)),
            Some(Route::Status(status)) => Err(FetchError::Transport {
                status: Some(status),
                message: format!("status {status}"),
                body: None,
            }),
            Some(Route::Hang) => std::future::pending().await,
            None => Err(FetchError::Transport {
                status: Some(404),
                message: format!("no route for {path}"),
                body: None,
            }),
        }
    }
}

fn settings() -> FetchSettings {
    FetchSettings {
        default_qps: 1000,
        ..FetchSettings::default()
    }
    .with_retry(RetryPolicy::no_retry())
}

/// A context over `platform` with in-memory stores, hydrated.
pub async fn context(platform: &Arc<MockPlatform>) -> AppContext {
    context_with(platform, Config::default()).await
}

pub async fn context_with(platform: &Arc<MockPlatform>, config: Config) -> AppContext {
    let transport = Arc::clone(platform) as Arc<dyn Transport>;
    let durable: SharedKeyValueStore = Arc::new(MemoryKeyValueStore::new());
    let session: SharedKeyValueStore = Arc::new(MemoryKeyValueStore::new());
    let ctx = AppContext::new(
        config,
        FetchContext::with_transport(transport, settings()),
        &durable,
        &session,
    );
    ctx.stores.tenants.wait_ready().await;
    ctx.stores.balances.wait_ready().await;
    ctx.stores.costs.wait_ready().await;
    ctx.stores.tokens.wait_ready().await;
    ctx.stores.tenant_info.wait_ready().await;
    ctx.stores.settings.wait_ready().await;
    ctx.stores.analytics.wait_ready().await;
    ctx
}

/// Registers a new-api tenant named `name`.
pub async fn add_tenant(ctx: &AppContext, name: &str) -> Tenant {
    let tenant = Tenant::new(
        name,
        format!("https://{name}.example"),
        "sk-test",
        PlatformType::NewApi,
    )
    .with_user_id("1");
    ctx.stores.tenants.add(tenant).await.unwrap()
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: &Notification) {
        self.sent.lock().unwrap().push(notification.clone());
    }
}

/// Badge sink remembering the last text (`None` when cleared).
#[derive(Default)]
pub struct RecordingBadge {
    text: Mutex<Option<String>>,
    updates: Mutex<usize>,
}

impl RecordingBadge {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn text(&self) -> Option<String> {
        self.text.lock().unwrap().clone()
    }

    pub fn updates(&self) -> usize {
        *self.updates.lock().unwrap()
    }
}

impl BadgeSink for RecordingBadge {
    fn set_text(&self, text: &str) {
        *self.text.lock().unwrap() = Some(text.to_string());
        *self.updates.lock().unwrap() += 1;
    }

    fn clear(&self) {
        *self.text.lock().unwrap() = None;
        *self.updates.lock().unwrap() += 1;
    }
}
