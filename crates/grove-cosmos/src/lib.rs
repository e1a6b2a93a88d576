// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Adapters from Grove's ports to a graph-capable document store.
//!
//! - [`ws`]: [`GremlinWsService`], the Gremlin WebSocket protocol behind
//!   `grove_client::GraphService`.
//! - [`rest`]: [`CosmosRestProvisioner`], the management REST API behind
//!   `grove_client::Provisioner`.

pub mod rest;
pub mod ws;

pub use rest::{CosmosRestProvisioner, MasterKey};
pub use ws::{GremlinConnection, GremlinEndpoint, GremlinWsService};

use thiserror::Error;

/// Adapter construction failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterError {
    /// The account key is not valid base64.
    #[error("invalid account key: {0}")]
    InvalidKey(String),
    /// The endpoint is not a valid URL.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
    /// The HTTP client could not be built.
    #[error("http client: {0}")]
    Http(String),
}
