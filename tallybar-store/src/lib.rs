// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `TallyBar` Store
//!
//! State management for the `TallyBar` application.
//!
//! This crate provides:
//!
//! - **Key-value backends**: [`FileKeyValueStore`] (durable) and
//!   [`MemoryKeyValueStore`] (session), behind [`KeyValueStore`]
//! - **Persisted stores**: [`PersistedStore`], a state container mirrored
//!   into one key, with hydration and cross-instance sync
//! - **Domain stores**: tenants, balances, costs, tokens, tenant info,
//!   settings and the analytics view
//! - **Config**: JSON configuration for the request stack and timers
//!
//! ## Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use tallybar_store::{FileKeyValueStore, MemoryKeyValueStore, SharedKeyValueStore, Stores};
//!
//! let durable: SharedKeyValueStore = Arc::new(FileKeyValueStore::open_default());
//! let session: SharedKeyValueStore = Arc::new(MemoryKeyValueStore::new());
//! let stores = Stores::open(&durable, &session);
//!
//! stores.tenants.wait_ready().await;
//! let mut rx = stores.balances.subscribe();
//! while rx.changed().await.is_ok() {
//!     println!("Balances updated!");
//! }
//! ```

pub mod config;
pub mod error;
pub mod kv;
pub mod persisted;
pub mod persistence;
pub mod stores;

pub use config::{AnalyticsConfig, Config, GeneralConfig, NetworkConfig};
pub use error::StoreError;
pub use kv::{
    FileKeyValueStore, KeyValueStore, KeyWatch, KvChange, MemoryKeyValueStore,
    SharedKeyValueStore, UpdateFn, WatchEvent,
};
pub use persisted::{PersistedStore, StoreState, Subscription};
pub use persistence::{default_config_dir, default_config_path, default_data_dir};
pub use stores::{
    AnalyticsState, AnalyticsStore, BadgeConfig, BalanceState, BalanceStore, CachedSnapshot,
    CostState, CostStore, ExperimentalFlags, Settings, SettingsStore, Stores, TenantInfoState,
    TenantInfoStore, TenantScoped, TenantState, TenantStore, TokenState, TokenStore,
    UsageAlertConfig,
};
