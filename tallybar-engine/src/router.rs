//! Message router.
//!
//! Maps inbound message types to async handlers. Other execution contexts
//! reach the router through a [`RouterChannel`], which forwards messages to a
//! single listener task started by [`MessageRouter::init`]. Handlers run
//! concurrently; each message gets exactly one answer.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use async_trait::async_trait;
use serde_json::{Value, json};
use tallybar_fetch::{Message, MessageChannel};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, warn};

use crate::error::EngineError;

pub use tallybar_fetch::FETCH_MESSAGE;

/// Runs the usage alert check for the tenant in the payload.
pub const CHECK_USAGE_ALERT: &str = "CHECK_USAGE_ALERT";

/// Forces a badge recompute.
pub const UPDATE_BADGE: &str = "UPDATE_BADGE";

const CHANNEL_CAPACITY: usize = 64;

/// Boxed handler future.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Value, EngineError>> + Send>>;

type Handler = Arc<dyn Fn(Value) -> HandlerFuture + Send + Sync>;

struct Envelope {
    message: Message,
    reply: oneshot::Sender<Option<Value>>,
}

/// Dispatches messages by type.
#[derive(Default)]
pub struct MessageRouter {
    handlers: RwLock<HashMap<String, Handler>>,
    listener: Mutex<Option<mpsc::Sender<Envelope>>>,
}

impl std::fmt::Debug for MessageRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageRouter")
            .field("types", &self.types())
            .field("listening", &self.is_listening())
            .finish()
    }
}

impl MessageRouter {
    /// Creates a router with no handlers.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers `handler` for messages of type `kind`, replacing any
    /// previous handler.
    pub fn register<F, Fut>(&self, kind: &str, handler: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, EngineError>> + Send + 'static,
    {
        let handler: Handler = Arc::new(move |payload| -> HandlerFuture { Box::pin(handler(payload)) });
        let replaced = self
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(kind.to_string(), handler)
            .is_some();
        if replaced {
            warn!(kind, "Replaced message handler");
        } else {
            debug!(kind, "Registered message handler");
        }
    }

    /// Removes the handler for `kind`. Returns true if one was registered.
    pub fn unregister(&self, kind: &str) -> bool {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(kind)
            .is_some()
    }

    /// Registered message types, sorted.
    pub fn types(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        types.sort();
        types
    }

    /// Runs the handler for `message`.
    ///
    /// Returns `None` if no handler claims the type. Handler errors are
    /// answered with `{success: false, error}`.
    pub async fn dispatch(&self, message: Message) -> Option<Value> {
        let handler = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&message.kind)
            .cloned();

        let Some(handler) = handler else {
            trace!(kind = %message.kind, "No handler for message");
            return None;
        };

        match handler(message.payload).await {
            Ok(value) => Some(value),
            Err(e) => {
                if !e.is_silent() {
                    warn!(kind = %message.kind, error = %e, "Message handler failed");
                }
                let error = e.user_message().unwrap_or_else(|| e.to_string());
                Some(json!({"success": false, "error": error}))
            }
        }
    }

    /// Starts the listener task. Calling it again is a no-op that returns
    /// false.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn init(self: &Arc<Self>) -> bool {
        let mut listener = self.listener.lock().unwrap_or_else(PoisonError::into_inner);
        if listener.is_some() {
            return false;
        }

        let (tx, mut rx) = mpsc::channel::<Envelope>(CHANNEL_CAPACITY);
        *listener = Some(tx);

        let router: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                let Some(router) = router.upgrade() else {
                    break;
                };
                tokio::spawn(async move {
                    let answer = router.dispatch(envelope.message).await;
                    // the requester may have given up
                    let _ = envelope.reply.send(answer);
                });
            }
            debug!("Message listener stopped");
        });

        debug!("Message listener started");
        true
    }

    /// Returns true once [`MessageRouter::init`] has run.
    pub fn is_listening(&self) -> bool {
        self.listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Returns a channel into the listener, or `None` before
    /// [`MessageRouter::init`].
    pub fn connect(&self) -> Option<RouterChannel> {
        self.listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .map(|tx| RouterChannel { tx })
    }
}

#[async_trait]
impl MessageChannel for MessageRouter {
    async fn request(&self, message: Message) -> Option<Value> {
        self.dispatch(message).await
    }
}

/// Sending side of the router's listener.
#[derive(Clone)]
pub struct RouterChannel {
    tx: mpsc::Sender<Envelope>,
}

impl std::fmt::Debug for RouterChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterChannel")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

#[async_trait]
impl MessageChannel for RouterChannel {
    async fn request(&self, message: Message) -> Option<Value> {
        let (reply, answer) = oneshot::channel();
        if self.tx.send(Envelope { message, reply }).await.is_err() {
            debug!("Message listener is gone");
            return None;
        }
        answer.await.ok().flatten()
    }
}
