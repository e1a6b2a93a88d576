// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Port to the backing graph service.

use async_trait::async_trait;
use grove_proto::{PhysicalRequest, ResultRecord, ServiceError};

/// A graph service reachable over pooled connections.
///
/// `execute` returns every record of one physical request in the order the
/// service produced them, or a structured error. Adapters translate their
/// transport failures into [`ServiceError`]s whose category decides retries.
#[async_trait]
pub trait GraphService: Send + Sync + 'static {
    /// One open connection (authenticated and ready for requests).
    type Connection: Send + 'static;

    /// Open a new connection.
    async fn connect(&self) -> Result<Self::Connection, ServiceError>;

    /// Run one physical request on `conn`.
    async fn execute(
        &self,
        conn: &mut Self::Connection,
        request: &PhysicalRequest,
    ) -> Result<Vec<ResultRecord>, ServiceError>;
}
