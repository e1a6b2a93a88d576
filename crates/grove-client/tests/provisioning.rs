// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
#![allow(clippy::expect_used, clippy::unwrap_used)]

use grove_client::{ensure_collection, CollectionDescriptor, CollectionSpec, ProvisionError};
use grove_dry_tests::InMemoryProvisioner;
use grove_proto::ServiceError;
use grove_query::PartitionKeyDescriptor;

fn spec() -> CollectionSpec {
    CollectionSpec {
        database: "graphdb".into(),
        collection: "Persons".into(),
        partition_key: PartitionKeyDescriptor::partitioned("firstName"),
        throughput: 400,
    }
}

fn existing(path: Option<&str>) -> CollectionDescriptor {
    CollectionDescriptor {
        database: "graphdb".into(),
        collection: "Persons".into(),
        partition_key_path: path.map(str::to_string),
        throughput: Some(1000),
    }
}

#[tokio::test]
async fn creates_database_and_collection_when_absent() {
    let store = InMemoryProvisioner::new();
    let created = ensure_collection(&store, &spec()).await.unwrap();
    assert_eq!(created.partition_key_path.as_deref(), Some("/firstName"));
    assert_eq!(created.throughput, Some(400));
    assert_eq!(store.create_count(), 1);
    assert_eq!(store.collection("graphdb", "Persons"), Some(created));
}

#[tokio::test]
async fn matching_collection_is_reused() {
    let store = InMemoryProvisioner::new().with_collection(existing(Some("/firstName")));
    let found = ensure_collection(&store, &spec()).await.unwrap();
    assert_eq!(found.throughput, Some(1000));
    assert_eq!(store.create_count(), 0);
}

#[tokio::test]
async fn mismatched_partitioning_fails_fast() {
    for path in [None, Some("/lastName")] {
        let store = InMemoryProvisioner::new().with_collection(existing(path));
        let err = ensure_collection(&store, &spec()).await.unwrap_err();
        assert!(matches!(err, ProvisionError::Conflict { .. }), "{path:?}");
    }
}

#[tokio::test]
async fn concurrent_creator_is_tolerated() {
    let store = InMemoryProvisioner::new();
    store.race_create(existing(Some("/firstName")));
    let found = ensure_collection(&store, &spec()).await.unwrap();
    assert_eq!(found.throughput, Some(1000));
    assert_eq!(store.create_count(), 0);
}

#[tokio::test]
async fn concurrent_creator_with_other_key_conflicts() {
    let store = InMemoryProvisioner::new();
    store.race_create(existing(None));
    assert!(matches!(
        ensure_collection(&store, &spec()).await,
        Err(ProvisionError::Conflict { .. })
    ));
}

#[tokio::test]
async fn unavailable_store_is_reported() {
    let store = InMemoryProvisioner::new();
    store.set_unavailable(Some(ServiceError::transport("connection refused")));
    assert!(matches!(
        ensure_collection(&store, &spec()).await,
        Err(ProvisionError::Service(_))
    ));
}

#[tokio::test]
async fn unpartitioned_collection_is_created_without_key() {
    let store = InMemoryProvisioner::new();
    let flat = CollectionSpec {
        partition_key: PartitionKeyDescriptor::unpartitioned(),
        ..spec()
    };
    let created = ensure_collection(&store, &flat).await.unwrap();
    assert_eq!(created.partition_key_path, None);
    assert!(!created.partition_key().is_partitioned());
}
