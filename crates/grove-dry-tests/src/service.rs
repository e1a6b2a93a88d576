// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Scripted graph service.
//!
//! Replies are scripted per partition scope: every physical request scoped to
//! a partition value (or unscoped, `None`) first consumes queued replies, then
//! falls back to a responder (when one is set) or that scope's steady reply.
//! A responder computes the reply from the request itself, which lets a test
//! stand up a small graph that answers whatever traversal it receives.
//! Every call is logged with the (Tokio) instant it started so tests can
//! check backoff timing.

use async_trait::async_trait;
use grove_client::GraphService;
use grove_proto::{PhysicalRequest, ResultRecord, ServiceError, Value};
use grove_query::PartitionValue;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

/// Build a record from JSON (GraphSON wrappers are unwrapped).
pub fn record(json: serde_json::Value) -> ResultRecord {
    ResultRecord::new(Value::from_json(&json))
}

/// What one call returns.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Succeed with these records.
    Records(Vec<ResultRecord>),
    /// Fail with this error.
    Error(ServiceError),
    /// Never answer.
    Pending,
}

/// One logged `execute` call.
#[derive(Debug, Clone)]
pub struct Call {
    /// Correlation id of the physical request.
    pub correlation_id: Uuid,
    /// Partition the request was scoped to.
    pub partition: Option<PartitionValue>,
    /// Wire text sent.
    pub gremlin: String,
    /// When the call started.
    pub at: Instant,
}

#[derive(Debug, Clone)]
struct Script {
    queued: VecDeque<Reply>,
    steady: Reply,
    delay: Duration,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            queued: VecDeque::new(),
            steady: Reply::Records(Vec::new()),
            delay: Duration::ZERO,
        }
    }
}

type Responder = Arc<dyn Fn(&PhysicalRequest) -> Reply + Send + Sync>;

#[derive(Default)]
struct Inner {
    scripts: HashMap<Option<PartitionValue>, Script>,
    responder: Option<Responder>,
    calls: Vec<Call>,
    connects: usize,
    connect_failures: VecDeque<ServiceError>,
}

/// [`GraphService`] whose replies are set up by the test.
///
/// Clones share state, so a test keeps one handle for assertions and hands
/// another to the client.
#[derive(Clone, Default)]
pub struct ScriptedService {
    inner: Arc<Mutex<Inner>>,
}

impl ScriptedService {
    /// Service that answers every request with no records.
    pub fn new() -> Self {
        Self::default()
    }

    /// Steady reply for requests scoped to `partition`.
    pub fn reply(&self, partition: Option<PartitionValue>, records: Vec<ResultRecord>) -> &Self {
        self.lock().scripts.entry(partition).or_default().steady = Reply::Records(records);
        self
    }

    /// Steady failure for requests scoped to `partition`.
    pub fn fail(&self, partition: Option<PartitionValue>, error: ServiceError) -> &Self {
        self.lock().scripts.entry(partition).or_default().steady = Reply::Error(error);
        self
    }

    /// Requests scoped to `partition` never answer.
    pub fn hang(&self, partition: Option<PartitionValue>) -> &Self {
        self.lock().scripts.entry(partition).or_default().steady = Reply::Pending;
        self
    }

    /// Queue one-shot replies consumed before the steady reply.
    pub fn queue(&self, partition: Option<PartitionValue>, replies: Vec<Reply>) -> &Self {
        self.lock()
            .scripts
            .entry(partition)
            .or_default()
            .queued
            .extend(replies);
        self
    }

    /// Delay every reply for `partition`.
    pub fn delay(&self, partition: Option<PartitionValue>, delay: Duration) -> &Self {
        self.lock().scripts.entry(partition).or_default().delay = delay;
        self
    }

    /// Compute replies from the request instead of the steady reply.
    /// Queued replies still come first.
    pub fn answer_with<F>(&self, responder: F) -> &Self
    where
        F: Fn(&PhysicalRequest) -> Reply + Send + Sync + 'static,
    {
        self.lock().responder = Some(Arc::new(responder));
        self
    }

    /// Fail the next `connect` calls with these errors.
    pub fn fail_connects(&self, errors: Vec<ServiceError>) -> &Self {
        self.lock().connect_failures.extend(errors);
        self
    }

    /// Every call so far, in start order.
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Calls scoped to `partition`.
    pub fn calls_for(&self, partition: Option<&PartitionValue>) -> Vec<Call> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.partition.as_ref() == partition)
            .cloned()
            .collect()
    }

    /// Connections opened so far.
    pub fn connects(&self) -> usize {
        self.lock().connects
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Connection handle; carries its sequence number.
#[derive(Debug)]
pub struct ScriptedConnection(pub usize);

#[async_trait]
impl GraphService for ScriptedService {
    type Connection = ScriptedConnection;

    async fn connect(&self) -> Result<ScriptedConnection, ServiceError> {
        let mut inner = self.lock();
        if let Some(err) = inner.connect_failures.pop_front() {
            return Err(err);
        }
        inner.connects += 1;
        Ok(ScriptedConnection(inner.connects))
    }

    async fn execute(
        &self,
        _conn: &mut ScriptedConnection,
        request: &PhysicalRequest,
    ) -> Result<Vec<ResultRecord>, ServiceError> {
        let partition = request.partition().cloned();
        let (reply, delay) = {
            let mut inner = self.lock();
            inner.calls.push(Call {
                correlation_id: request.correlation_id,
                partition: partition.clone(),
                gremlin: request.gremlin.clone(),
                at: Instant::now(),
            });
            let responder = inner.responder.clone();
            let script = inner.scripts.entry(partition).or_default();
            let reply = match (script.queued.pop_front(), responder) {
                (Some(queued), _) => queued,
                (None, Some(respond)) => respond(request),
                (None, None) => script.steady.clone(),
            };
            (reply, script.delay)
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match reply {
            Reply::Records(records) => Ok(records),
            Reply::Error(err) => Err(err),
            Reply::Pending => std::future::pending().await,
        }
    }
}
