// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Collection provisioning at startup.

use async_trait::async_trait;
use grove_proto::ServiceError;
use grove_query::PartitionKeyDescriptor;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument, warn};

/// The collection a program wants to run against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSpec {
    /// Database id.
    pub database: String,
    /// Collection id.
    pub collection: String,
    /// Partition key (or unpartitioned).
    pub partition_key: PartitionKeyDescriptor,
    /// Provisioned throughput (request units per second).
    pub throughput: u32,
}

/// A collection as it exists in the store. Immutable once read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionDescriptor {
    /// Database id.
    pub database: String,
    /// Collection id.
    pub collection: String,
    /// Partition key path (`/firstName`), if partitioned.
    pub partition_key_path: Option<String>,
    /// Throughput, when the store reports it.
    pub throughput: Option<u32>,
}

impl CollectionDescriptor {
    /// Partition key described by this collection.
    pub fn partition_key(&self) -> PartitionKeyDescriptor {
        self.partition_key_path
            .as_deref()
            .map_or_else(PartitionKeyDescriptor::unpartitioned, PartitionKeyDescriptor::from_path)
    }
}

/// Provisioning failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProvisionError {
    /// A create request hit an existing resource.
    #[error("{resource} already exists")]
    AlreadyExists {
        /// Resource that already exists.
        resource: String,
    },
    /// The existing collection does not match configuration.
    #[error("collection conflict: {reason}")]
    Conflict {
        /// What does not match.
        reason: String,
    },
    /// The store could not be reached or refused the request.
    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// Port to the document store's management API.
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Read a collection; `Ok(None)` when it (or its database) does not exist.
    async fn read_collection(
        &self,
        database: &str,
        collection: &str,
    ) -> Result<Option<CollectionDescriptor>, ProvisionError>;

    /// Create the database unless it exists.
    async fn ensure_database(&self, database: &str) -> Result<(), ProvisionError>;

    /// Create the collection; [`ProvisionError::AlreadyExists`] if it exists.
    async fn create_collection(
        &self,
        spec: &CollectionSpec,
    ) -> Result<CollectionDescriptor, ProvisionError>;
}

/// Make sure the collection described by `spec` exists and matches it.
///
/// Creates the database and collection when absent. A concurrent creator is
/// tolerated by re-reading after a create conflict. An existing collection
/// whose partitioning differs from `spec` fails with
/// [`ProvisionError::Conflict`].
#[instrument(skip_all, fields(database = %spec.database, collection = %spec.collection))]
pub async fn ensure_collection<P>(
    provisioner: &P,
    spec: &CollectionSpec,
) -> Result<CollectionDescriptor, ProvisionError>
where
    P: Provisioner + ?Sized,
{
    if let Some(existing) = provisioner
        .read_collection(&spec.database, &spec.collection)
        .await?
    {
        validate(&existing, spec)?;
        info!("collection exists");
        return Ok(existing);
    }

    provisioner.ensure_database(&spec.database).await?;
    match provisioner.create_collection(spec).await {
        Ok(created) => {
            info!(partition_key = ?created.partition_key_path, "collection created");
            Ok(created)
        }
        Err(ProvisionError::AlreadyExists { .. }) => {
            warn!("collection created concurrently, re-reading");
            let existing = provisioner
                .read_collection(&spec.database, &spec.collection)
                .await?
                .ok_or_else(|| ProvisionError::Conflict {
                    reason: "collection reported as existing but cannot be read".into(),
                })?;
            validate(&existing, spec)?;
            Ok(existing)
        }
        Err(err) => Err(err),
    }
}

fn validate(existing: &CollectionDescriptor, spec: &CollectionSpec) -> Result<(), ProvisionError> {
    let wanted = spec.partition_key.path();
    match (&existing.partition_key_path, &wanted) {
        (None, None) => Ok(()),
        (Some(have), Some(want)) if have == want => Ok(()),
        (None, Some(want)) => Err(ProvisionError::Conflict {
            reason: format!("existing collection is unpartitioned, configuration expects {want}"),
        }),
        (Some(have), None) => Err(ProvisionError::Conflict {
            reason: format!("existing collection is partitioned by {have}, configuration expects none"),
        }),
        (Some(have), Some(want)) => Err(ProvisionError::Conflict {
            reason: format!("existing collection is partitioned by {have}, configuration expects {want}"),
        }),
    }
}
