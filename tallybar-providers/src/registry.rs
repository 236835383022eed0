//! Driver registry.
//!
//! Maps every [`PlatformType`] to its driver. Drivers are stateless, so the
//! registry hands out `'static` references.

use tallybar_core::{PlatformType, Tenant};
use tallybar_fetch::FetchError;

use crate::driver::PlatformDriver;
use crate::newapi::NewApiDriver;
use crate::oneapi::OneApiDriver;
use crate::onehub::OneHubDriver;
use crate::veloera::VeloeraDriver;

// ============================================================================
// Static Drivers
// ============================================================================

static NEW_API: NewApiDriver = NewApiDriver;
static ONE_API: OneApiDriver = OneApiDriver;
static ONE_HUB: OneHubDriver = OneHubDriver;
static VELOERA: VeloeraDriver = VeloeraDriver;

// ============================================================================
// Driver Registry
// ============================================================================

/// Lookup of platform drivers.
pub struct DriverRegistry;

impl DriverRegistry {
    /// Returns the driver for `platform`.
    pub fn get(platform: PlatformType) -> &'static dyn PlatformDriver {
        match platform {
            PlatformType::NewApi => &NEW_API,
            PlatformType::OneApi => &ONE_API,
            PlatformType::OneHub => &ONE_HUB,
            PlatformType::Veloera => &VELOERA,
        }
    }

    /// Returns the driver for `tenant`'s platform (new-api when unset).
    pub fn for_tenant(tenant: &Tenant) -> &'static dyn PlatformDriver {
        Self::get(tenant.platform())
    }

    /// Looks up a driver by platform name.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::PlatformNotSupported`] for unknown names.
    pub fn parse(name: &str) -> Result<&'static dyn PlatformDriver, FetchError> {
        name.parse::<PlatformType>()
            .map(Self::get)
            .map_err(|_| FetchError::PlatformNotSupported(name.to_string()))
    }

    /// Returns every registered driver.
    pub fn all() -> Vec<&'static dyn PlatformDriver> {
        PlatformType::all().iter().copied().map(Self::get).collect()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_platform_has_driver() {
        for platform in PlatformType::all() {
            assert_eq!(DriverRegistry::get(*platform).platform(), *platform);
        }
        assert_eq!(DriverRegistry::all().len(), PlatformType::all().len());
    }

    #[test]
    fn test_unset_platform_is_newapi() {
        let mut tenant = Tenant::new("t", "https://x.example", "k", PlatformType::OneHub);
        tenant.platform_type = None;
        assert_eq!(DriverRegistry::for_tenant(&tenant).platform(), PlatformType::NewApi);
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            DriverRegistry::parse("veloera").unwrap().platform(),
            PlatformType::Veloera
        );
        assert!(matches!(
            DriverRegistry::parse("sub2api"),
            Err(FetchError::PlatformNotSupported(name)) if name == "sub2api"
        ));
    }
}
