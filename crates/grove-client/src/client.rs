// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! `GraphClient`: compile, route, submit and aggregate in one call.

use crate::aggregate::{MergePolicy, ResultStream};
use crate::cancel::CancelToken;
use crate::catalog::PartitionCatalog;
use crate::engine::{EngineConfig, SubmissionEngine};
use crate::error::GroveError;
use crate::service::GraphService;
use grove_proto::ResultRecord;
use grove_query::{compile, PartitionKeyDescriptor, TraversalQuery};
use grove_route::{route, RoutePlan};
use std::sync::Arc;
use tracing::{info, instrument};

/// Partition-aware client for one collection.
pub struct GraphClient<S: GraphService> {
    engine: SubmissionEngine<S>,
    partition_key: PartitionKeyDescriptor,
    catalog: Arc<PartitionCatalog>,
    dedupe: bool,
}

impl<S: GraphService> GraphClient<S> {
    /// Build a client for a collection partitioned as `partition_key`.
    pub fn new(
        service: S,
        partition_key: PartitionKeyDescriptor,
        catalog: Arc<PartitionCatalog>,
        config: EngineConfig,
    ) -> Self {
        Self {
            engine: SubmissionEngine::new(service, config, Arc::clone(&catalog)),
            partition_key,
            catalog,
            dedupe: false,
        }
    }

    /// Drop duplicate records across fan-out streams.
    pub fn with_dedupe(mut self, dedupe: bool) -> Self {
        self.dedupe = dedupe;
        self
    }

    /// Partition key of the target collection.
    pub fn partition_key(&self) -> &PartitionKeyDescriptor {
        &self.partition_key
    }

    /// Known partitions.
    pub fn catalog(&self) -> &Arc<PartitionCatalog> {
        &self.catalog
    }

    /// Submission engine.
    pub fn engine(&self) -> &SubmissionEngine<S> {
        &self.engine
    }

    /// Compile and route without submitting.
    pub fn plan(&self, text: &str) -> Result<(Arc<TraversalQuery>, RoutePlan), GroveError> {
        let query = Arc::new(compile(text, &self.partition_key)?);
        let plan = route(&query, &self.partition_key, &self.catalog.snapshot())?;
        Ok((query, plan))
    }

    /// Run `text`, returning the lazy merged result stream.
    ///
    /// Compile and routing errors are returned immediately and nothing is sent.
    pub fn execute(&self, text: &str) -> Result<ResultStream, GroveError> {
        self.execute_with_cancel(text, CancelToken::new())
    }

    /// Like [`GraphClient::execute`], cancellable through `cancel`.
    #[instrument(skip(self, cancel))]
    pub fn execute_with_cancel(
        &self,
        text: &str,
        cancel: CancelToken,
    ) -> Result<ResultStream, GroveError> {
        let (query, plan) = self.plan(text)?;
        info!(kind = ?plan.kind, requests = plan.requests.len(), "submitting query");
        let policy = MergePolicy::for_query(&query, self.dedupe).skipping(plan.offset);
        Ok(self.engine.submit(plan.requests, policy, cancel))
    }

    /// Run `text` and collect every record.
    pub async fn collect(&self, text: &str) -> Result<Vec<ResultRecord>, GroveError> {
        self.execute(text)?.collect().await
    }
}
