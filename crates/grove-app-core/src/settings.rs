// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Settings schema for the Grove console programs.
//!
//! Stored as camelCase JSON under [`SETTINGS_KEY`]:
//!
//! ```json
//! {
//!   "gremlin": { "server": "example.gremlin.cosmos.azure.com", "port": 443, "enableSsl": true, "authKey": "..." },
//!   "collection": { "database": "graphdb", "collection": "Persons", "partitionKey": "firstName", "partitioned": true },
//!   "engine": { "maxRetries": 3, "backoffBaseMs": 200 },
//!   "knownPartitions": ["Thomas", "Mary", "Ben", "Robin"]
//! }
//! ```
//!
//! Every section is optional; missing fields take their defaults.

use grove_query::{PartitionKeyDescriptor, PartitionValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Key under which the settings document is stored.
pub const SETTINGS_KEY: &str = "appsettings";

/// Settings that cannot be used to start a program.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    /// A required value is absent or empty.
    #[error("missing required setting `{0}`")]
    Missing(&'static str),
    /// A value is present but unusable.
    #[error("invalid setting `{field}`: {reason}")]
    Invalid {
        /// Offending setting.
        field: &'static str,
        /// Why it is unusable.
        reason: String,
    },
}

/// Complete settings document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GroveSettings {
    /// Gremlin endpoint.
    pub gremlin: GremlinSettings,
    /// Target collection.
    pub collection: CollectionSettings,
    /// Submission engine tuning.
    pub engine: EngineSettings,
    /// Partition values known up front; fan-out reads go to each of them.
    pub known_partitions: Vec<PartitionValue>,
}

/// Gremlin endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GremlinSettings {
    /// Host name of the Gremlin endpoint.
    pub server: String,
    /// TCP port.
    pub port: u16,
    /// Use `wss://` rather than `ws://`.
    pub enable_ssl: bool,
    /// Account key used for SASL and REST signing.
    pub auth_key: String,
    /// WebSocket path.
    pub path: String,
}

impl Default for GremlinSettings {
    fn default() -> Self {
        Self {
            server: String::new(),
            port: 8182,
            enable_ssl: true,
            auth_key: String::new(),
            path: "/gremlin".into(),
        }
    }
}

impl GremlinSettings {
    /// WebSocket URL built from the endpoint fields.
    pub fn url(&self) -> String {
        let scheme = if self.enable_ssl { "wss" } else { "ws" };
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };
        format!("{scheme}://{}:{}{path}", self.server, self.port)
    }
}

/// Target database and collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CollectionSettings {
    /// Management endpoint (`https://<account>.documents.azure.com:443/`).
    pub document_endpoint: String,
    /// Database id.
    pub database: String,
    /// Collection id.
    pub collection: String,
    /// Partition key property name (without the leading `/`).
    pub partition_key: Option<String>,
    /// Whether the collection is partitioned.
    pub partitioned: bool,
    /// Throughput for a newly created collection.
    pub throughput: u32,
}

impl Default for CollectionSettings {
    fn default() -> Self {
        Self {
            document_endpoint: String::new(),
            database: "graphdb".into(),
            collection: "Persons".into(),
            partition_key: None,
            partitioned: false,
            throughput: 400,
        }
    }
}

impl CollectionSettings {
    /// Partition key descriptor for this collection.
    pub fn partition_key_descriptor(&self) -> PartitionKeyDescriptor {
        match (&self.partition_key, self.partitioned) {
            (Some(key), true) => PartitionKeyDescriptor::partitioned(key),
            _ => PartitionKeyDescriptor::unpartitioned(),
        }
    }

    /// Resource link used as the SASL user name (`/dbs/<db>/colls/<coll>`).
    pub fn resource_link(&self) -> String {
        format!("/dbs/{}/colls/{}", self.database, self.collection)
    }
}

/// Submission engine tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineSettings {
    /// Retries after the first attempt for transient failures.
    pub max_retries: u32,
    /// First backoff delay in milliseconds.
    pub backoff_base_ms: u64,
    /// Concurrent request cap; defaults to the known partition count.
    pub worker_cap: Option<usize>,
    /// Idle connections kept open.
    pub pool_size: usize,
    /// Per-attempt timeout in milliseconds.
    pub request_timeout_ms: u64,
    /// Grace period for in-flight calls after cancellation, in milliseconds.
    pub cancel_grace_ms: u64,
    /// Drop duplicate records across fan-out streams.
    pub dedupe: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base_ms: 200,
            worker_cap: None,
            pool_size: 8,
            request_timeout_ms: 30_000,
            cancel_grace_ms: 2_000,
            dedupe: false,
        }
    }
}

impl EngineSettings {
    /// First backoff delay.
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    /// Per-attempt timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Cancellation grace period.
    pub fn cancel_grace(&self) -> Duration {
        Duration::from_millis(self.cancel_grace_ms)
    }
}

impl GroveSettings {
    /// Check that the settings can start a program.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.gremlin.server.trim().is_empty() {
            return Err(SettingsError::Missing("gremlin.server"));
        }
        if self.gremlin.auth_key.trim().is_empty() {
            return Err(SettingsError::Missing("gremlin.authKey"));
        }
        if self.gremlin.port == 0 {
            return Err(SettingsError::Invalid {
                field: "gremlin.port",
                reason: "port must be non-zero".into(),
            });
        }
        let key_missing = self
            .collection
            .partition_key
            .as_deref()
            .is_none_or(|k| k.trim().trim_start_matches('/').is_empty());
        if self.collection.partitioned && key_missing {
            return Err(SettingsError::Invalid {
                field: "collection.partitionKey",
                reason: "a partitioned collection needs a partition key".into(),
            });
        }
        if self.engine.pool_size == 0 {
            return Err(SettingsError::Invalid {
                field: "engine.poolSize",
                reason: "pool must hold at least one connection".into(),
            });
        }
        if self.engine.worker_cap == Some(0) {
            return Err(SettingsError::Invalid {
                field: "engine.workerCap",
                reason: "worker cap must be at least one".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    fn valid() -> GroveSettings {
        let mut s = GroveSettings::default();
        s.gremlin.server = "localhost".into();
        s.gremlin.auth_key = "key".into();
        s
    }

    #[test]
    fn parses_camel_case_with_defaults() {
        let s: GroveSettings = serde_json::from_str(
            r#"{
                "gremlin": { "server": "h", "port": 443, "authKey": "k" },
                "collection": { "partitionKey": "firstName", "partitioned": true },
                "engine": { "backoffBaseMs": 50, "workerCap": 2 },
                "knownPartitions": ["Thomas", 7]
            }"#,
        )
        .unwrap();
        assert_eq!(s.gremlin.port, 443);
        assert!(s.gremlin.enable_ssl);
        assert_eq!(s.collection.database, "graphdb");
        assert_eq!(s.engine.max_retries, 3);
        assert_eq!(s.engine.backoff_base(), Duration::from_millis(50));
        assert_eq!(s.engine.worker_cap, Some(2));
        assert_eq!(
            s.known_partitions,
            vec![PartitionValue::from("Thomas"), PartitionValue::Int(7)]
        );
        assert_eq!(
            s.collection.partition_key_descriptor().key(),
            Some("firstName")
        );
        assert!(s.validate().is_ok());
    }

    #[test]
    fn endpoint_and_key_are_required() {
        let mut s = valid();
        s.gremlin.server = " ".into();
        assert_eq!(s.validate(), Err(SettingsError::Missing("gremlin.server")));
        let mut s = valid();
        s.gremlin.auth_key.clear();
        assert_eq!(s.validate(), Err(SettingsError::Missing("gremlin.authKey")));
    }

    #[test]
    fn partitioned_collection_needs_a_key() {
        let mut s = valid();
        s.collection.partitioned = true;
        assert!(matches!(
            s.validate(),
            Err(SettingsError::Invalid { field: "collection.partitionKey", .. })
        ));
        s.collection.partition_key = Some("/".into());
        assert!(s.validate().is_err());
        s.collection.partition_key = Some("/firstName".into());
        assert!(s.validate().is_ok());
    }

    #[test]
    fn unpartitioned_flag_ignores_key() {
        let mut s = valid();
        s.collection.partition_key = Some("firstName".into());
        assert!(!s.collection.partition_key_descriptor().is_partitioned());
    }

    #[test]
    fn url_and_resource_link() {
        let mut s = valid();
        s.gremlin.port = 443;
        assert_eq!(s.gremlin.url(), "wss://localhost:443/gremlin");
        s.gremlin.enable_ssl = false;
        s.gremlin.path = "/".into();
        assert_eq!(s.gremlin.url(), "ws://localhost:443/");
        assert_eq!(s.collection.resource_link(), "/dbs/graphdb/colls/Persons");
    }
}
