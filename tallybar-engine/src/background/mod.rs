//! Background modules.
//!
//! Each module is initialized once per privileged context. `init` wires the
//! module's timers, store observers and message handlers and returns a
//! [`Cleanup`] that tears them down again. [`ModuleRegistry`] starts a list
//! of modules and owns their cleanups.

pub mod badge;
pub mod fetch_proxy;
pub mod registry;
pub mod tenant_watch;
pub mod usage_alert;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::error::EngineError;
use crate::router::MessageRouter;

pub use badge::{BadgeModule, BadgeSink, LogBadge, format_badge};
pub use fetch_proxy::FetchProxyModule;
pub use registry::ModuleRegistry;
pub use tenant_watch::TenantWatchModule;
pub use usage_alert::{UsageAlertModule, UsageReport};

/// Tears down what a module's `init` set up.
pub type Cleanup = Box<dyn FnOnce() + Send>;

/// An independently initialized background unit.
#[async_trait]
pub trait BackgroundModule: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Starts the module.
    ///
    /// # Errors
    ///
    /// Returns an error if the module cannot start; modules started before
    /// it are cleaned up by the registry.
    async fn init(&self, router: &Arc<MessageRouter>) -> Result<Cleanup, EngineError>;
}

/// Skips a run while the previous one is still in flight.
#[derive(Debug, Clone, Default)]
pub(crate) struct RunGuard {
    running: Arc<AtomicBool>,
}

/// Releases a [`RunGuard`] when dropped.
pub(crate) struct RunPermit {
    running: Arc<AtomicBool>,
}

impl RunGuard {
    /// Returns a permit, or `None` if a run is in flight.
    pub(crate) fn try_start(&self) -> Option<RunPermit> {
        if self.running.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(RunPermit {
            running: Arc::clone(&self.running),
        })
    }
}

impl Drop for RunPermit {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}
