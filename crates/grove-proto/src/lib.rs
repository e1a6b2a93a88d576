// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Data model shared between the Grove router, the submission engine and the
//! service adapters: result values, physical requests, status categories and
//! the Gremlin wire envelopes.

pub mod gremlin;
mod status;
mod value;

use grove_query::{PartitionValue, SortKey, TraversalQuery};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

pub use status::{ServiceError, StatusCategory};
pub use value::{decode_record, Value};

/// Restriction of a physical request to one logical partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PartitionScope {
    /// Partition key property name.
    pub key: String,
    /// Partition key value.
    pub value: PartitionValue,
}

impl PartitionScope {
    /// Build a scope.
    pub fn new(key: impl Into<String>, value: PartitionValue) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// One unit of work sent to the backing service.
#[derive(Debug, Clone)]
pub struct PhysicalRequest {
    /// Correlation id (also the Gremlin `requestId`).
    pub correlation_id: Uuid,
    /// Text actually sent on the wire (may carry a rewritten scope).
    pub gremlin: String,
    /// The compiled logical query this request belongs to.
    pub query: Arc<TraversalQuery>,
    /// Partition this request is restricted to, if any.
    pub scope: Option<PartitionScope>,
}

impl PhysicalRequest {
    /// Build a request with a fresh correlation id.
    pub fn new(gremlin: String, query: Arc<TraversalQuery>, scope: Option<PartitionScope>) -> Self {
        Self {
            correlation_id: Uuid::new_v4(),
            gremlin,
            query,
            scope,
        }
    }

    /// Partition value this request targets, if scoped.
    pub fn partition(&self) -> Option<&PartitionValue> {
        self.scope.as_ref().map(|s| &s.value)
    }
}

/// A record returned by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ResultRecord(Value);

impl ResultRecord {
    /// Wrap a decoded value.
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Borrow the value.
    pub fn value(&self) -> &Value {
        &self.0
    }

    /// Take the value.
    pub fn into_value(self) -> Value {
        self.0
    }

    /// Look up a property on an element, a `valueMap()` entry, or a plain map.
    ///
    /// `id` and `label` resolve to the element's own id and label. Multi-valued
    /// properties yield their first value.
    pub fn property(&self, name: &str) -> Option<&Value> {
        let direct = self.0.get(name);
        let nested = self.0.get("properties").and_then(|props| props.get(name));
        match (name, direct, nested) {
            ("id" | "label", Some(v), _) | (_, _, Some(v)) | (_, Some(v), None) => {
                Some(v.first_value())
            }
            _ => None,
        }
    }

    /// The value compared for `key` during a sorted merge.
    pub fn sort_value(&self, key: &SortKey) -> Value {
        match &key.property {
            None => self.0.clone(),
            Some(name) => self.property(name).cloned().unwrap_or(Value::Null),
        }
    }

    /// Integer payload of a `count()` record.
    pub fn as_count(&self) -> Option<i64> {
        self.0.as_i64()
    }

    /// Canonical JSON text, used as a dedupe key.
    pub fn canonical_json(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_default()
    }
}

impl From<Value> for ResultRecord {
    fn from(value: Value) -> Self {
        Self(value)
    }
}
