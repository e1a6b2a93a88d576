// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-memory collection provisioner.

use async_trait::async_trait;
use grove_client::{CollectionDescriptor, CollectionSpec, ProvisionError, Provisioner};
use grove_proto::ServiceError;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct Inner {
    databases: HashSet<String>,
    collections: HashMap<(String, String), CollectionDescriptor>,
    creates: usize,
    racer: Option<CollectionDescriptor>,
    unavailable: Option<ServiceError>,
}

/// [`Provisioner`] over a shared map of databases and collections.
#[derive(Clone, Default)]
pub struct InMemoryProvisioner {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryProvisioner {
    /// Store with no databases.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an existing collection (and its database).
    pub fn with_collection(self, descriptor: CollectionDescriptor) -> Self {
        {
            let mut inner = self.lock();
            inner.databases.insert(descriptor.database.clone());
            inner.collections.insert(
                (descriptor.database.clone(), descriptor.collection.clone()),
                descriptor,
            );
        }
        self
    }

    /// Simulate a concurrent creator: the next create finds `descriptor`
    /// already in place and fails with [`ProvisionError::AlreadyExists`].
    pub fn race_create(&self, descriptor: CollectionDescriptor) {
        self.lock().racer = Some(descriptor);
    }

    /// Fail every call with `error` until cleared with `None`.
    pub fn set_unavailable(&self, error: Option<ServiceError>) {
        self.lock().unavailable = error;
    }

    /// Successful `create_collection` calls.
    pub fn create_count(&self) -> usize {
        self.lock().creates
    }

    /// Stored collection, if any.
    pub fn collection(&self, database: &str, collection: &str) -> Option<CollectionDescriptor> {
        self.lock()
            .collections
            .get(&(database.to_string(), collection.to_string()))
            .cloned()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check(inner: &Inner) -> Result<(), ProvisionError> {
        match &inner.unavailable {
            Some(err) => Err(ProvisionError::Service(err.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Provisioner for InMemoryProvisioner {
    async fn read_collection(
        &self,
        database: &str,
        collection: &str,
    ) -> Result<Option<CollectionDescriptor>, ProvisionError> {
        let inner = self.lock();
        Self::check(&inner)?;
        Ok(inner
            .collections
            .get(&(database.to_string(), collection.to_string()))
            .cloned())
    }

    async fn ensure_database(&self, database: &str) -> Result<(), ProvisionError> {
        let mut inner = self.lock();
        Self::check(&inner)?;
        inner.databases.insert(database.to_string());
        Ok(())
    }

    async fn create_collection(
        &self,
        spec: &CollectionSpec,
    ) -> Result<CollectionDescriptor, ProvisionError> {
        let mut inner = self.lock();
        Self::check(&inner)?;
        if !inner.databases.contains(&spec.database) {
            return Err(ProvisionError::Service(ServiceError::new(
                grove_proto::StatusCategory::NotFound,
                format!("database {} does not exist", spec.database),
            )));
        }
        let key = (spec.database.clone(), spec.collection.clone());
        if let Some(racer) = inner.racer.take() {
            inner.collections.insert(key.clone(), racer);
        }
        if inner.collections.contains_key(&key) {
            return Err(ProvisionError::AlreadyExists {
                resource: format!("/dbs/{}/colls/{}", spec.database, spec.collection),
            });
        }
        let created = CollectionDescriptor {
            database: spec.database.clone(),
            collection: spec.collection.clone(),
            partition_key_path: spec.partition_key.path(),
            throughput: Some(spec.throughput),
        };
        inner.collections.insert(key, created.clone());
        inner.creates += 1;
        Ok(created)
    }
}
