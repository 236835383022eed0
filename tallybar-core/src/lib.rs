// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `TallyBar` Core
//!
//! Core types, models, and conversions for the `TallyBar` application.
//!
//! This crate provides the foundational abstractions used across all other
//! `TallyBar` crates, including:
//!
//! - Domain models (tenants, platforms, balances, costs, tokens)
//! - Analytics view models (summary, series, model and endpoint breakdowns)
//! - Quota/currency conversion helpers
//! - Tenant sorting
//! - Error types
//!
//! ## Key Types
//!
//! ### Tenant Types
//! - [`Tenant`] - One configured account on one billing platform
//! - [`PlatformType`] - Which billing platform a tenant lives on
//!
//! ### Usage Types
//! - [`Balance`] - Remaining/consumed quota
//! - [`Cost`] - Per-model (and optionally per-bucket) cost entry
//! - [`Period`] - Lookback window (1d, 7d, 14d, 30d)
//! - [`Token`] / [`TokenGroup`] - API keys and their pricing groups
//! - [`TenantInfo`] - Display/credit-unit information
//!
//! ### Analytics
//! - [`AnalyticsSnapshot`] - Summary + series + breakdowns, never partially defined
//! - [`AnalyticsStatus`] - Loading state of the analytics view

pub mod currency;
pub mod error;
pub mod models;
pub mod sort;

// Re-export error types
pub use error::CoreError;

// Re-export all model types
pub use models::{
    // Tenant types
    PlatformType,
    Tenant,
    TenantId,
    // Usage types
    Balance,
    Cost,
    Period,
    Token,
    TokenGroup,
    TokenGroups,
    // Tenant info
    TenantInfo,
    DEFAULT_CREDIT_UNIT,
    // Analytics
    AnalyticsSnapshot,
    AnalyticsStatus,
    EndpointUsage,
    ModelUsage,
    UsagePoint,
    UsageSummary,
};

pub use currency::{currency_to_quota, format_quota, quota_to_currency};
pub use sort::{SortDirection, SortField, TenantSortConfig, sort_tenants};
