// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Partition-aware submission engine and result aggregator for Grove.
//!
//! [`GraphClient`] ties the pieces together: the query is compiled, routed to
//! one or more physical requests, dispatched concurrently over pooled
//! connections with retries, and merged into a single [`ResultStream`].
//! Service adapters plug in through [`GraphService`]; collection setup goes
//! through [`Provisioner`] and [`ensure_collection`].

pub mod aggregate;
mod backoff;
mod cancel;
mod catalog;
mod client;
pub mod engine;
mod error;
mod pool;
pub mod provision;
mod service;

pub use aggregate::{aggregate, MergePolicy, ResultStream};
pub use backoff::Backoff;
pub use cancel::CancelToken;
pub use catalog::PartitionCatalog;
pub use client::GraphClient;
pub use engine::{EngineConfig, StreamEvent, SubmissionEngine};
pub use error::GroveError;
pub use pool::ConnectionPool;
pub use provision::{
    ensure_collection, CollectionDescriptor, CollectionSpec, ProvisionError, Provisioner,
};
pub use service::GraphService;
