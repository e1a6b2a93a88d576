// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Submission engine: concurrent dispatch with retries and cancellation.
//!
//! Every physical request of a batch becomes one task. Tasks are gated by a
//! semaphore sized to the fan-out width (capped by configuration) and push
//! their outcome into a single tagged channel read by the aggregator. Each
//! request produces exactly one terminal event, so the aggregator can always
//! tell when the batch is over.

use crate::aggregate::{aggregate, MergePolicy, ResultStream};
use crate::backoff::Backoff;
use crate::cancel::CancelToken;
use crate::catalog::PartitionCatalog;
use crate::pool::ConnectionPool;
use crate::service::GraphService;
use grove_proto::{PhysicalRequest, ResultRecord, ServiceError};
use grove_query::ast::StepKind;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

/// Tuning for the submission engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Retries after the first attempt for transient failures.
    pub max_retries: u32,
    /// First backoff delay; doubles per retry.
    pub backoff_base: Duration,
    /// Upper bound on concurrent requests; `None` means the known partition count.
    pub worker_cap: Option<usize>,
    /// Idle connections kept per pool.
    pub pool_size: usize,
    /// Per-attempt timeout.
    pub request_timeout: Duration,
    /// How long an in-flight call may keep running after cancellation.
    pub cancel_grace: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base: Duration::from_millis(200),
            worker_cap: None,
            pool_size: 8,
            request_timeout: Duration::from_secs(30),
            cancel_grace: Duration::from_secs(2),
        }
    }
}

/// What one request stream reports to the aggregator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Records, in service order.
    Records(Vec<ResultRecord>),
    /// The request finished successfully.
    Done,
    /// The request failed (permanently, or after exhausting retries).
    Failed(ServiceError),
    /// The request was cancelled before finishing.
    Cancelled,
}

/// Dispatches physical requests to a [`GraphService`].
pub struct SubmissionEngine<S: GraphService> {
    pool: Arc<ConnectionPool<S>>,
    config: EngineConfig,
    catalog: Arc<PartitionCatalog>,
}

impl<S: GraphService> SubmissionEngine<S> {
    /// Build an engine over `service`.
    pub fn new(service: S, config: EngineConfig, catalog: Arc<PartitionCatalog>) -> Self {
        let pool = Arc::new(ConnectionPool::new(Arc::new(service), config.pool_size));
        Self {
            pool,
            config,
            catalog,
        }
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Connection pool.
    pub fn pool(&self) -> &Arc<ConnectionPool<S>> {
        &self.pool
    }

    /// Concurrency for a batch of `width` requests.
    pub fn worker_count(&self, width: usize) -> usize {
        let cap = self
            .config
            .worker_cap
            .unwrap_or_else(|| self.catalog.len().max(1));
        width.min(cap).max(1)
    }

    /// Submit `requests` and merge their results according to `policy`.
    pub fn submit(
        &self,
        requests: Vec<PhysicalRequest>,
        policy: MergePolicy,
        cancel: CancelToken,
    ) -> ResultStream {
        let streams = requests.len();
        let events = self.dispatch(requests, cancel.clone());
        aggregate(events, streams, policy, cancel)
    }

    /// Start every request and return the tagged event channel.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn dispatch(
        &self,
        requests: Vec<PhysicalRequest>,
        cancel: CancelToken,
    ) -> mpsc::Receiver<(usize, StreamEvent)> {
        let width = requests.len();
        let (tx, rx) = mpsc::channel(width.max(1) * 4);
        let workers = self.worker_count(width);
        info!(requests = width, workers, "dispatching batch");

        let permits = Arc::new(Semaphore::new(workers));
        let mut tasks = JoinSet::new();
        for (idx, request) in requests.into_iter().enumerate() {
            let worker = Worker {
                pool: Arc::clone(&self.pool),
                config: self.config.clone(),
                catalog: Arc::clone(&self.catalog),
                cancel: cancel.clone(),
            };
            let permits = Arc::clone(&permits);
            let tx = tx.clone();
            tasks.spawn(async move {
                let outcome = worker.run(idx, &request, &permits).await;
                let (records, terminal) = match outcome {
                    Outcome::Done(records) => (Some(records), StreamEvent::Done),
                    Outcome::Failed(err) => (None, StreamEvent::Failed(err)),
                    Outcome::Cancelled => (None, StreamEvent::Cancelled),
                };
                if let Some(records) = records {
                    let _ = tx.send((idx, StreamEvent::Records(records))).await;
                }
                let _ = tx.send((idx, terminal)).await;
            });
        }
        drop(tx);
        tokio::spawn(async move {
            while let Some(joined) = tasks.join_next().await {
                if let Err(err) = joined {
                    warn!(error = %err, "request task aborted");
                }
            }
        });
        rx
    }
}

enum Outcome {
    Done(Vec<ResultRecord>),
    Failed(ServiceError),
    Cancelled,
}

struct Worker<S: GraphService> {
    pool: Arc<ConnectionPool<S>>,
    config: EngineConfig,
    catalog: Arc<PartitionCatalog>,
    cancel: CancelToken,
}

impl<S: GraphService> Worker<S> {
    #[instrument(
        name = "request",
        skip_all,
        fields(idx = idx, correlation_id = %request.correlation_id, partition = ?request.partition())
    )]
    async fn run(&self, idx: usize, request: &PhysicalRequest, permits: &Semaphore) -> Outcome {
        let _permit = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Outcome::Cancelled,
            permit = permits.acquire() => match permit {
                Ok(permit) => permit,
                Err(_) => return Outcome::Cancelled,
            },
        };

        let backoff = Backoff::new(self.config.backoff_base);
        let mut retry = 0u32;
        loop {
            if self.cancel.is_cancelled() {
                return Outcome::Cancelled;
            }
            debug!(attempt = retry + 1, "submitting");
            match self.attempt(request).await {
                Attempt::Ok(records) => {
                    self.learn_partition(request);
                    return Outcome::Done(records);
                }
                Attempt::Abandoned => {
                    warn!("in-flight request abandoned after cancellation");
                    return Outcome::Cancelled;
                }
                Attempt::Err(err) if err.is_transient() && retry < self.config.max_retries => {
                    let delay = backoff.delay(retry, err.retry_after);
                    warn!(error = %err, retry = retry + 1, ?delay, "transient failure, retrying");
                    tokio::select! {
                        biased;
                        () = self.cancel.cancelled() => return Outcome::Cancelled,
                        () = tokio::time::sleep(delay) => {}
                    }
                    retry += 1;
                }
                Attempt::Err(err) => {
                    warn!(error = %err, attempts = retry + 1, "request failed");
                    return Outcome::Failed(err);
                }
            }
        }
    }

    /// One attempt on a freshly acquired connection.
    async fn attempt(&self, request: &PhysicalRequest) -> Attempt {
        let mut conn = match self.pool.acquire().await {
            Ok(conn) => conn,
            Err(err) => return Attempt::Err(err),
        };
        let service = Arc::clone(self.pool.service());
        let timeout = self.config.request_timeout;
        let result = {
            let call = async {
                match tokio::time::timeout(timeout, service.execute(&mut conn, request)).await {
                    Ok(result) => result,
                    Err(_) => Err(ServiceError::timeout(format!(
                        "no response within {}ms",
                        timeout.as_millis()
                    ))),
                }
            };
            tokio::pin!(call);
            tokio::select! {
                biased;
                result = &mut call => Some(result),
                () = self.cancel.cancelled() => {
                    tokio::time::timeout(self.config.cancel_grace, &mut call).await.ok()
                }
            }
        };
        match result {
            Some(Ok(records)) => {
                self.pool.release(conn).await;
                Attempt::Ok(records)
            }
            Some(Err(err)) => {
                if err.poisons_connection() {
                    self.pool.discard(conn);
                } else {
                    self.pool.release(conn).await;
                }
                Attempt::Err(err)
            }
            None => {
                self.pool.discard(conn);
                Attempt::Abandoned
            }
        }
    }

    fn learn_partition(&self, request: &PhysicalRequest) {
        let adds_vertex = request
            .query
            .traversal()
            .steps
            .first()
            .is_some_and(|s| s.kind == StepKind::AddV);
        if let (true, Some(value)) = (adds_vertex, request.partition()) {
            self.catalog.learn(value.clone());
        }
    }
}

enum Attempt {
    Ok(Vec<ResultRecord>),
    Err(ServiceError),
    Abandoned,
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use grove_query::{compile, PartitionKeyDescriptor};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Flaky {
        failures: AtomicUsize,
        connects: AtomicUsize,
    }

    #[async_trait]
    impl GraphService for Flaky {
        type Connection = ();

        async fn connect(&self) -> Result<(), ServiceError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn execute(
            &self,
            _conn: &mut (),
            _request: &PhysicalRequest,
        ) -> Result<Vec<ResultRecord>, ServiceError> {
            if self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(ServiceError::transport("reset"));
            }
            Ok(vec![ResultRecord::new(grove_proto::Value::Int(1))])
        }
    }

    fn request() -> PhysicalRequest {
        let q = compile("g.V().count()", &PartitionKeyDescriptor::unpartitioned()).unwrap();
        PhysicalRequest::new(q.text().to_string(), Arc::new(q), None)
    }

    #[tokio::test(start_paused = true)]
    async fn transport_failures_discard_connections() {
        let engine = SubmissionEngine::new(
            Flaky {
                failures: AtomicUsize::new(2),
                connects: AtomicUsize::new(0),
            },
            EngineConfig::default(),
            Arc::new(PartitionCatalog::default()),
        );
        let mut rx = engine.dispatch(vec![request()], CancelToken::new());
        assert!(matches!(rx.recv().await, Some((0, StreamEvent::Records(r))) if r.len() == 1));
        assert_eq!(rx.recv().await, Some((0, StreamEvent::Done)));
        // two poisoned connections plus the one that succeeded
        assert_eq!(engine.pool().service().connects.load(Ordering::SeqCst), 3);
        assert_eq!(engine.pool().idle_len().await, 1);
    }

    #[test]
    fn worker_count_defaults_to_catalog_size() {
        let catalog = Arc::new(PartitionCatalog::new(
            ["A", "B", "C"].map(grove_query::PartitionValue::from),
        ));
        let engine = SubmissionEngine::new(
            Flaky {
                failures: AtomicUsize::new(0),
                connects: AtomicUsize::new(0),
            },
            EngineConfig::default(),
            catalog,
        );
        assert_eq!(engine.worker_count(10), 3);
        assert_eq!(engine.worker_count(1), 1);
        assert_eq!(engine.worker_count(0), 1);
    }
}
