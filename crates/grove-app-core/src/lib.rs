// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared application services for Grove tools (config storage, settings).
//! Keeps the console programs thin and storage-agnostic.

pub mod config;
pub mod settings;

pub use config::{ConfigError, ConfigService, ConfigStore};
pub use settings::{
    CollectionSettings, EngineSettings, GremlinSettings, GroveSettings, SettingsError,
    SETTINGS_KEY,
};
