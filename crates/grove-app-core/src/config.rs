// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Config storage port and the JSON service layered over it.

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Storage port for raw JSON documents keyed by logical name (`appsettings`).
pub trait ConfigStore {
    /// Load the raw document for `key`; [`ConfigError::NotFound`] when absent.
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError>;
    /// Persist the raw document for `key`.
    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError>;
}

/// Config storage or decoding failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No document stored under the key.
    #[error("not found")]
    NotFound,
    /// Reading or writing the backing storage failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// The document is not valid JSON for the requested type.
    #[error("malformed config: {0}")]
    Serde(#[from] serde_json::Error),
    /// Adapter-specific failure.
    #[error("other: {0}")]
    Other(String),
}

/// Typed access to documents held by a [`ConfigStore`].
pub struct ConfigService<S> {
    store: S,
}

impl<S> ConfigService<S> {
    /// Wrap `store`.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The wrapped store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Unwrap into the store.
    pub fn into_inner(self) -> S {
        self.store
    }
}

impl<S: ConfigStore> ConfigService<S> {
    /// Decode the document under `key`. Missing or empty documents are `Ok(None)`.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        match self.store.load_raw(key) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(None),
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(ConfigError::NotFound) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Like [`ConfigService::load`], falling back to `T::default()`.
    pub fn load_or_default<T>(&self, key: &str) -> Result<T, ConfigError>
    where
        T: DeserializeOwned + Default,
    {
        Ok(self.load(key)?.unwrap_or_default())
    }

    /// Encode `value` as pretty JSON and store it under `key`.
    pub fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<(), ConfigError> {
        let data = serde_json::to_vec_pretty(value)?;
        self.store.save_raw(key, &data)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MapStore(RefCell<HashMap<String, Vec<u8>>>);

    impl ConfigStore for MapStore {
        fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError> {
            self.0.borrow().get(key).cloned().ok_or(ConfigError::NotFound)
        }

        fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
            self.0.borrow_mut().insert(key.to_string(), data.to_vec());
            Ok(())
        }
    }

    #[test]
    fn missing_and_blank_documents_load_as_none() {
        let svc = ConfigService::new(MapStore::default());
        assert_eq!(svc.load::<u32>("absent").unwrap(), None);
        svc.store().save_raw("blank", b"  \n").unwrap();
        assert_eq!(svc.load::<u32>("blank").unwrap(), None);
        assert_eq!(svc.load_or_default::<u32>("blank").unwrap(), 0);
    }

    #[test]
    fn malformed_document_is_an_error() {
        let svc = ConfigService::new(MapStore::default());
        svc.store().save_raw("bad", b"{").unwrap();
        assert!(matches!(svc.load::<u32>("bad"), Err(ConfigError::Serde(_))));
    }

    #[test]
    fn save_then_load() {
        let svc = ConfigService::new(MapStore::default());
        svc.save("n", &vec![1, 2, 3]).unwrap();
        assert_eq!(svc.load::<Vec<u8>>("n").unwrap(), Some(vec![1, 2, 3]));
    }
}
