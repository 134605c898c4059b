use std::sync::{Arc, RwLock};

use crate::ProjectConfig;

/// `ConfigurationStore` provides a `Sync` storage for the active [`ProjectConfig`] that allows
/// concurrent access for readers and writers.
///
/// `ProjectConfig` itself is immutable and can only be replaced completely. Readers get a
/// snapshot that is not affected by later writes.
pub struct ConfigurationStore {
    configuration: RwLock<Arc<ProjectConfig>>,
}

impl ConfigurationStore {
    pub fn new(configuration: Arc<ProjectConfig>) -> Self {
        Self {
            configuration: RwLock::new(configuration),
        }
    }

    pub fn get_configuration(&self) -> Arc<ProjectConfig> {
        // The lock is poisoned only if a writer panicked while holding it. Replacing an Arc cannot
        // leave the slot half-written, so the value is still usable.
        let configuration = self
            .configuration
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        configuration.clone()
    }

    /// Set new configuration, returning the previous one.
    pub fn set_configuration(&self, configuration: Arc<ProjectConfig>) -> Arc<ProjectConfig> {
        let mut configuration_slot = self
            .configuration
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::replace(&mut configuration_slot, configuration)
    }
}
