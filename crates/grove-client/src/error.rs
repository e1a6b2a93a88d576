// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Top-level error for a logical query.

use crate::provision::ProvisionError;
use grove_proto::ServiceError;
use grove_query::CompileError;
use grove_route::RoutingError;
use thiserror::Error;

/// Why a logical query (or startup provisioning) failed.
///
/// Compile and routing errors are returned before anything is sent. Service
/// errors arrive as the terminal item of a result stream, after any records
/// that were already received.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GroveError {
    /// The query text was rejected by the compiler.
    #[error("compile error: {0}")]
    Compile(#[from] CompileError),
    /// The query could not be routed.
    #[error("routing error: {0}")]
    Routing(#[from] RoutingError),
    /// The service failed permanently, or transiently after retries ran out.
    #[error("service error: {0}")]
    Service(#[from] ServiceError),
    /// Collection provisioning failed.
    #[error("provisioning error: {0}")]
    Provision(#[from] ProvisionError),
    /// The caller cancelled the batch.
    #[error("query cancelled")]
    Cancelled,
}

impl GroveError {
    /// Whether the failure came from a transient service condition.
    pub fn is_transient(&self) -> bool {
        matches!(self, GroveError::Service(err) if err.is_transient())
    }
}
