// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared test doubles for Grove crates.
#![forbid(unsafe_code)]
//!
//! Nothing here touches the network or the filesystem.
//!
//! # Modules
//!
//! - [`config`] - In-memory config store fake
//! - [`provision`] - In-memory collection provisioner
//! - [`service`] - Scripted graph service with per-partition replies, failures and delays

pub mod config;
pub mod provision;
pub mod service;

pub use config::InMemoryConfigStore;
pub use provision::InMemoryProvisioner;
pub use service::{record, Call, Reply, ScriptedConnection, ScriptedService};
