use std::{collections::HashSet, sync::RwLock};

/// Records which (user, experiment, variation) impressions have already been dispatched.
///
/// The cache lives for the lifetime of a [`Client`](crate::Client) and is cleared explicitly. It
/// holds no expiration policy of its own.
#[derive(Debug, Default)]
pub struct ExposureCache {
    exposures: RwLock<HashSet<Exposure>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Exposure {
    user_id: String,
    experiment_id: String,
    variation_id: String,
}

impl Exposure {
    fn new(user_id: &str, experiment_id: &str, variation_id: &str) -> Self {
        Exposure {
            user_id: user_id.to_owned(),
            experiment_id: experiment_id.to_owned(),
            variation_id: variation_id.to_owned(),
        }
    }
}

impl ExposureCache {
    pub fn new() -> Self {
        ExposureCache::default()
    }

    /// Record an exposure. Returns `true` if it was not recorded before.
    pub fn record(&self, user_id: &str, experiment_id: &str, variation_id: &str) -> bool {
        let exposure = Exposure::new(user_id, experiment_id, variation_id);
        self.exposures
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(exposure)
    }

    pub fn contains(&self, user_id: &str, experiment_id: &str, variation_id: &str) -> bool {
        let exposure = Exposure::new(user_id, experiment_id, variation_id);
        self.exposures
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(&exposure)
    }

    pub fn len(&self) -> usize {
        self.exposures
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget all recorded exposures.
    pub fn clear(&self) {
        self.exposures
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }
}
