//! Domain models for TallyBar.
//!
//! ## Submodules
//!
//! - [`tenant`] - Tenant accounts and platform types
//! - [`usage`] - Balance, cost and period types
//! - [`token`] - API tokens and token groups
//! - [`tenant_info`] - Platform display/credit-unit information
//! - [`analytics`] - Derived analytics view models

pub mod analytics;
pub mod tenant;
pub mod tenant_info;
pub mod token;
pub mod usage;

pub use analytics::{
    AnalyticsSnapshot, AnalyticsStatus, EndpointUsage, ModelUsage, UsagePoint, UsageSummary,
};
pub use tenant::{PlatformType, Tenant, TenantId};
pub use tenant_info::{DEFAULT_CREDIT_UNIT, TenantInfo};
pub use token::{Token, TokenGroup, TokenGroups};
pub use usage::{Balance, Cost, Period};
