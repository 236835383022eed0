//! Module registry.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{BackgroundModule, Cleanup};
use crate::error::EngineError;
use crate::router::MessageRouter;

/// Owns the cleanups of started modules. Dropping the registry runs them in
/// reverse start order.
pub struct ModuleRegistry {
    cleanups: Vec<(&'static str, Cleanup)>,
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("modules", &self.names())
            .finish()
    }
}

impl ModuleRegistry {
    /// Starts `modules` in order.
    ///
    /// # Errors
    ///
    /// Returns the first module's error. Modules already started are cleaned
    /// up in reverse order before returning.
    pub async fn init_all(
        router: &Arc<MessageRouter>,
        modules: &[Arc<dyn BackgroundModule>],
    ) -> Result<Self, EngineError> {
        let mut registry = Self {
            cleanups: Vec::with_capacity(modules.len()),
        };

        for module in modules {
            match module.init(router).await {
                Ok(cleanup) => {
                    debug!(module = module.name(), "Module started");
                    registry.cleanups.push((module.name(), cleanup));
                }
                Err(e) => {
                    warn!(module = module.name(), error = %e, "Module failed to start");
                    registry.run_cleanups();
                    return Err(e);
                }
            }
        }

        info!(modules = ?registry.names(), "Background modules started");
        Ok(registry)
    }

    /// Names of the started modules in start order.
    pub fn names(&self) -> Vec<&'static str> {
        self.cleanups.iter().map(|(name, _)| *name).collect()
    }

    /// Stops every module.
    pub fn shutdown(mut self) {
        self.run_cleanups();
        info!("Background modules stopped");
    }

    fn run_cleanups(&mut self) {
        while let Some((name, cleanup)) = self.cleanups.pop() {
            debug!(module = name, "Stopping module");
            cleanup();
        }
    }
}

impl Drop for ModuleRegistry {
    fn drop(&mut self) {
        self.run_cleanups();
    }
}
