// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `TallyBar` Engine
//!
//! Coordination layer of `TallyBar`: orchestrators that run
//! fetch → normalize → store for each data domain, the analytics builder,
//! the message router and the background modules (usage alerts, badge,
//! tenant watch, fetch proxy).
//!
//! Everything hangs off an [`AppContext`], which owns the configuration,
//! the per-tenant client cache and the stores of one execution context.
//!
//! ## Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use tallybar_engine::{AppContext, MessageRouter, ModuleRegistry};
//! use tallybar_engine::background::{BadgeModule, FetchProxyModule, LogBadge, TenantWatchModule, UsageAlertModule};
//! use tallybar_engine::notify::DesktopNotifier;
//!
//! let ctx = AppContext::open(Config::load()?)?;
//! let router = MessageRouter::new();
//! router.init();
//! let registry = ModuleRegistry::init_all(&router, &[
//!     Arc::new(FetchProxyModule::new(ctx.transport())),
//!     Arc::new(TenantWatchModule::new(ctx.clone())),
//!     Arc::new(UsageAlertModule::new(ctx.clone(), Arc::new(DesktopNotifier))),
//!     Arc::new(BadgeModule::new(ctx.clone(), Arc::new(LogBadge))),
//! ]).await?;
//! ```

pub mod analytics;
pub mod background;
pub mod context;
pub mod error;
pub mod notify;
pub mod orchestrators;
pub mod refresh;
pub mod router;

pub use background::{BackgroundModule, Cleanup, ModuleRegistry};
pub use context::AppContext;
pub use error::EngineError;
pub use notify::{DesktopNotifier, LogNotifier, Notification, Notifier};
pub use orchestrators::{
    AnalyticsOrchestrator, BalanceOrchestrator, CostOrchestrator, TenantInfoOrchestrator,
    TokenOrchestrator,
};
pub use refresh::{RefreshCoordinator, TenantRefresh};
pub use router::{CHECK_USAGE_ALERT, FETCH_MESSAGE, MessageRouter, RouterChannel, UPDATE_BADGE};

#[cfg(test)]
mod testing;
