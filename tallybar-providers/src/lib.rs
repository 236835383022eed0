// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # TallyBar Providers
//!
//! Billing platform drivers for TallyBar.
//!
//! Each platform module pairs a raw service (endpoints, auth, pagination)
//! with an adapter that normalizes raw payloads into the core models. The
//! [`PlatformDriver`] trait joins the two; [`DriverRegistry`] maps a
//! [`PlatformType`](tallybar_core::PlatformType) to its driver.
//!
//! ## Supported Platforms
//!
//! | Platform | Auth | Costs | Token pages |
//! |----------|------|-------|-------------|
//! | new-api | Bearer + `New-Api-User` | `/api/data/self` (timestamps) | `p`, `size` |
//! | one-api | Bearer | `/api/log/self` (paged log) | `p`, `size` |
//! | one-hub | Bearer | `/api/user/dashboard` (dates) | `page`, `size` |
//! | Veloera | Session cookie + `Veloera-User` | `/api/data/self` (timestamps) | `p`, `page_size` |
//!
//! ## Usage
//!
//! ```ignore
//! use tallybar_fetch::{FetchContext, FetchSettings};
//! use tallybar_providers::{ClientManager, DriverRegistry};
//!
//! let clients = ClientManager::new(FetchContext::http(FetchSettings::default())?);
//! let client = clients.client_for(&tenant);
//! let balance = DriverRegistry::for_tenant(&tenant).fetch_balance(&client).await?;
//! ```

pub mod client_manager;
pub mod driver;
pub mod raw;
pub mod registry;
pub mod window;

// Platform modules (alphabetical)
pub mod newapi;
pub mod oneapi;
pub mod onehub;
pub mod veloera;

pub use client_manager::ClientManager;
pub use driver::{DEFAULT_TOKEN_PAGE_SIZE, PlatformDriver};
pub use registry::DriverRegistry;
pub use window::{date_range, timestamp_range};

pub use newapi::NewApiDriver;
pub use oneapi::OneApiDriver;
pub use onehub::OneHubDriver;
pub use veloera::VeloeraDriver;

#[cfg(test)]
mod testing;

#[cfg(test)]
mod adapter_edge_tests;
