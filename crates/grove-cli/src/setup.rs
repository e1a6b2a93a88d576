// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Settings loading and the translation from settings to client types.

use crate::cases::{DEMO_PARTITIONS, DEMO_PARTITION_KEY};
use anyhow::{Context, Result};
use grove_app_core::{ConfigService, ConfigStore, EngineSettings, GroveSettings, SETTINGS_KEY};
use grove_client::{CollectionSpec, EngineConfig};
use grove_config_fs::FsConfigStore;
use grove_query::PartitionValue;
use std::path::Path;
use tracing::debug;

/// Values given on the command line, applied over the stored settings.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// Gremlin host name.
    pub endpoint: Option<String>,
    /// Gremlin port.
    pub port: Option<u16>,
    /// Account key.
    pub auth_key: Option<String>,
    /// Management endpoint.
    pub document_endpoint: Option<String>,
}

impl Overrides {
    /// Apply every value that was given.
    pub fn apply(&self, settings: &mut GroveSettings) {
        if let Some(endpoint) = &self.endpoint {
            settings.gremlin.server.clone_from(endpoint);
        }
        if let Some(port) = self.port {
            settings.gremlin.port = port;
        }
        if let Some(key) = &self.auth_key {
            settings.gremlin.auth_key.clone_from(key);
        }
        if let Some(endpoint) = &self.document_endpoint {
            settings.collection.document_endpoint.clone_from(endpoint);
        }
    }
}

/// Store holding `appsettings.json`.
///
/// `dir` wins when given; otherwise the working directory is used if it
/// holds a settings file, else the per-user config directory.
pub fn settings_store(dir: Option<&Path>) -> Result<FsConfigStore> {
    if let Some(dir) = dir {
        return Ok(FsConfigStore::at(dir));
    }
    let cwd = std::env::current_dir().context("reading working directory")?;
    let local = FsConfigStore::at(&cwd);
    if local.path_for(SETTINGS_KEY).is_file() {
        return Ok(local);
    }
    FsConfigStore::new().context("locating config directory")
}

/// Load settings from `store`, apply `overrides`, shape them for the
/// program with `profile` and validate the result.
pub fn load_settings<S: ConfigStore>(
    store: S,
    overrides: &Overrides,
    profile: fn(GroveSettings) -> GroveSettings,
) -> Result<GroveSettings> {
    let service = ConfigService::new(store);
    let mut settings: GroveSettings = service
        .load_or_default(SETTINGS_KEY)
        .context("loading settings")?;
    overrides.apply(&mut settings);
    let settings = profile(settings);
    settings.validate().context("invalid settings")?;
    debug!(url = %settings.gremlin.url(), "settings loaded");
    Ok(settings)
}

/// Settings for the get-started walkthrough: always an unpartitioned collection.
pub fn get_started_settings(mut settings: GroveSettings) -> GroveSettings {
    settings.collection.partitioned = false;
    settings
}

/// Settings for the partitioned walkthrough: partitioned, keyed by
/// `firstName` unless a key is configured.
pub fn partitioned_settings(mut settings: GroveSettings) -> GroveSettings {
    settings.collection.partitioned = true;
    let key_missing = settings
        .collection
        .partition_key
        .as_deref()
        .is_none_or(|k| k.trim().trim_start_matches('/').is_empty());
    if key_missing {
        settings.collection.partition_key = Some(DEMO_PARTITION_KEY.to_string());
    }
    settings
}

/// Partitions the walkthrough writes plus any configured ones, without repeats.
pub fn seed_partitions(settings: &GroveSettings) -> Vec<PartitionValue> {
    let mut seed = settings.known_partitions.clone();
    for name in DEMO_PARTITIONS {
        let value = PartitionValue::from(name);
        if !seed.contains(&value) {
            seed.push(value);
        }
    }
    seed
}

/// Collection the program expects to exist.
pub fn collection_spec(settings: &GroveSettings) -> CollectionSpec {
    CollectionSpec {
        database: settings.collection.database.clone(),
        collection: settings.collection.collection.clone(),
        partition_key: settings.collection.partition_key_descriptor(),
        throughput: settings.collection.throughput,
    }
}

/// Engine tuning from its settings section.
pub fn engine_config(engine: &EngineSettings) -> EngineConfig {
    EngineConfig {
        max_retries: engine.max_retries,
        backoff_base: engine.backoff_base(),
        worker_cap: engine.worker_cap,
        pool_size: engine.pool_size,
        request_timeout: engine.request_timeout(),
        cancel_grace: engine.cancel_grace(),
    }
}
