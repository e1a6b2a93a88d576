// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Connection pool.
//!
//! Connections are acquired per attempt. A healthy connection goes back to
//! the idle list; one that failed at the transport level is dropped.

use crate::service::GraphService;
use grove_proto::ServiceError;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Pool of idle connections to one service.
pub struct ConnectionPool<S: GraphService> {
    service: Arc<S>,
    idle: Mutex<Vec<S::Connection>>,
    max_idle: usize,
}

impl<S: GraphService> ConnectionPool<S> {
    /// Create a pool that keeps at most `max_idle` idle connections.
    pub fn new(service: Arc<S>, max_idle: usize) -> Self {
        Self {
            service,
            idle: Mutex::new(Vec::new()),
            max_idle: max_idle.max(1),
        }
    }

    /// The service behind this pool.
    pub fn service(&self) -> &Arc<S> {
        &self.service
    }

    /// Take an idle connection or open a new one.
    pub async fn acquire(&self) -> Result<S::Connection, ServiceError> {
        if let Some(conn) = self.idle.lock().await.pop() {
            return Ok(conn);
        }
        debug!("opening new connection");
        self.service.connect().await
    }

    /// Return a healthy connection.
    pub async fn release(&self, conn: S::Connection) {
        let mut idle = self.idle.lock().await;
        if idle.len() < self.max_idle {
            idle.push(conn);
        }
    }

    /// Drop a connection that must not be reused.
    pub fn discard(&self, conn: S::Connection) {
        debug!("discarding failed connection");
        drop(conn);
    }

    /// Number of idle connections.
    pub async fn idle_len(&self) -> usize {
        self.idle.lock().await.len()
    }
}
