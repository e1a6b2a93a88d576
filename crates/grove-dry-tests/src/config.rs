// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-memory config store fake.

use grove_app_core::config::{ConfigError, ConfigStore};
use grove_app_core::{GroveSettings, SETTINGS_KEY};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// [`ConfigStore`] over a shared map, with call counters and failure switches.
///
/// # Example
///
/// ```
/// use grove_dry_tests::InMemoryConfigStore;
/// use grove_app_core::{ConfigService, GroveSettings, SETTINGS_KEY};
///
/// let store = InMemoryConfigStore::new();
/// let service = ConfigService::new(store.clone());
///
/// service.save(SETTINGS_KEY, &GroveSettings::default()).unwrap();
/// assert!(store.contains_key(SETTINGS_KEY));
/// assert_eq!(store.save_count(), 1);
/// ```
#[derive(Clone, Default)]
pub struct InMemoryConfigStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    data: HashMap<String, Vec<u8>>,
    load_count: usize,
    save_count: usize,
    fail_on_load: bool,
    fail_on_save: bool,
}

impl InMemoryConfigStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store holding `json` under `key`, verbatim.
    pub fn with_json(key: &str, json: &str) -> Self {
        let store = Self::new();
        store
            .lock()
            .data
            .insert(key.to_string(), json.as_bytes().to_vec());
        store
    }

    /// Store holding `settings` under [`SETTINGS_KEY`].
    pub fn with_settings(settings: &GroveSettings) -> Self {
        let store = Self::new();
        let bytes = serde_json::to_vec(settings).unwrap_or_default();
        store.lock().data.insert(SETTINGS_KEY.to_string(), bytes);
        store
    }

    /// Make every `load_raw` fail.
    pub fn set_fail_on_load(&self, fail: bool) {
        self.lock().fail_on_load = fail;
    }

    /// Make every `save_raw` fail.
    pub fn set_fail_on_save(&self, fail: bool) {
        self.lock().fail_on_save = fail;
    }

    /// `load_raw` calls so far, failed ones included.
    pub fn load_count(&self) -> usize {
        self.lock().load_count
    }

    /// `save_raw` calls so far, failed ones included.
    pub fn save_count(&self) -> usize {
        self.lock().save_count
    }

    /// Whether `key` holds a document.
    pub fn contains_key(&self, key: &str) -> bool {
        self.lock().data.contains_key(key)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ConfigStore for InMemoryConfigStore {
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError> {
        let mut inner = self.lock();
        inner.load_count += 1;
        if inner.fail_on_load {
            return Err(ConfigError::Other("simulated load failure".into()));
        }
        inner.data.get(key).cloned().ok_or(ConfigError::NotFound)
    }

    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
        let mut inner = self.lock();
        inner.save_count += 1;
        if inner.fail_on_save {
            return Err(ConfigError::Other("simulated save failure".into()));
        }
        inner.data.insert(key.to_string(), data.to_vec());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use grove_app_core::ConfigService;

    #[test]
    fn settings_fixture_loads_back() {
        let mut settings = GroveSettings::default();
        settings.gremlin.server = "localhost".into();
        let svc = ConfigService::new(InMemoryConfigStore::with_settings(&settings));
        let loaded: Option<GroveSettings> = svc.load(SETTINGS_KEY).unwrap();
        assert_eq!(loaded, Some(settings));
        assert_eq!(svc.store().load_count(), 1);
    }

    #[test]
    fn failure_switches() {
        let store = InMemoryConfigStore::with_json("k", "{}");
        store.set_fail_on_load(true);
        assert!(matches!(store.load_raw("k"), Err(ConfigError::Other(_))));
        store.set_fail_on_save(true);
        assert!(matches!(store.save_raw("k", b"1"), Err(ConfigError::Other(_))));
        assert_eq!((store.load_count(), store.save_count()), (1, 1));
    }
}
