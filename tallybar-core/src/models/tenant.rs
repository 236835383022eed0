//! Tenant-related types.
//!
//! This module contains types related to configured accounts:
//! - [`Tenant`] - One account on one billing platform
//! - [`PlatformType`] - Enum of supported billing platforms

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::CoreError;

/// Stable, opaque tenant identifier.
pub type TenantId = String;

// ============================================================================
// Platform Type
// ============================================================================

/// Supported billing platforms.
///
/// Every orchestrator dispatches on this enum with an exhaustive `match`, so
/// adding a platform is a compile error until every dispatch site handles it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlatformType {
    /// new-api (primary platform). Bearer token + `New-Api-User` header.
    #[default]
    NewApi,
    /// one-api. Bearer token, paginated usage logs.
    OneApi,
    /// one-hub. Bearer token, calendar-date dashboard.
    OneHub,
    /// Veloera. Cookie session + `Veloera-User` header.
    Veloera,
}

impl PlatformType {
    /// Returns the display name for this platform.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::NewApi => "New API",
            Self::OneApi => "One API",
            Self::OneHub => "One Hub",
            Self::Veloera => "Veloera",
        }
    }

    /// Returns the CLI/storage name for this platform.
    pub fn cli_name(&self) -> &'static str {
        match self {
            Self::NewApi => "newapi",
            Self::OneApi => "oneapi",
            Self::OneHub => "onehub",
            Self::Veloera => "veloera",
        }
    }

    /// Returns all supported platforms.
    pub fn all() -> &'static [PlatformType] {
        &[Self::NewApi, Self::OneApi, Self::OneHub, Self::Veloera]
    }
}

impl fmt::Display for PlatformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.cli_name())
    }
}

impl FromStr for PlatformType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase().replace(['-', '_', ' '], "");
        Self::all()
            .iter()
            .copied()
            .find(|p| p.cli_name() == needle)
            .ok_or_else(|| CoreError::UnsupportedPlatform(s.to_string()))
    }
}

// ============================================================================
// Tenant
// ============================================================================

static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// One configured account on one billing platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    /// Stable identifier.
    pub id: TenantId,
    /// User-facing name.
    pub name: String,
    /// Platform base URL.
    pub url: String,
    /// Secret credential (access token or session cookie).
    pub token: String,
    /// Platform-specific user id.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Which platform this tenant lives on. `None` means the primary platform.
    #[serde(default)]
    pub platform_type: Option<PlatformType>,
}

impl Tenant {
    /// Creates a tenant with a freshly generated id.
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        token: impl Into<String>,
        platform_type: PlatformType,
    ) -> Self {
        let seq = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self {
            id: format!("{:x}{:04x}", Utc::now().timestamp_millis(), seq & 0xffff),
            name: name.into(),
            url: url.into(),
            token: token.into(),
            user_id: None,
            platform_type: Some(platform_type),
        }
    }

    /// Sets the platform user id.
    #[must_use]
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Returns the effective platform, defaulting to the primary one.
    pub fn platform(&self) -> PlatformType {
        self.platform_type.unwrap_or_default()
    }

    /// Returns the base URL without trailing slashes.
    pub fn base_url(&self) -> &str {
        self.url.trim().trim_end_matches('/')
    }

    /// Returns the key used for the `(url, user_id)` uniqueness invariant.
    pub fn dedup_key(&self) -> (String, String) {
        (
            self.base_url().to_ascii_lowercase(),
            self.user_id.clone().unwrap_or_default(),
        )
    }

    /// Validates user-provided fields.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] for an empty name or credential or
    /// a URL that is not absolute http(s).
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.name.trim().is_empty() {
            return Err(CoreError::InvalidConfig("tenant name is empty".to_string()));
        }
        if self.token.trim().is_empty() {
            return Err(CoreError::InvalidConfig("tenant token is empty".to_string()));
        }
        let parsed = Url::parse(self.base_url())
            .map_err(|e| CoreError::InvalidConfig(format!("invalid url {}: {e}", self.url)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(CoreError::InvalidConfig(format!(
                "unsupported url scheme: {}",
                parsed.scheme()
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
