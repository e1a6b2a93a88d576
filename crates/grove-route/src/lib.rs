// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Partition router.
//!
//! Decides, per compiled query, which logical partitions must see it and
//! assembles one [`PhysicalRequest`] per target:
//!
//! * unpartitioned collection: one unscoped request;
//! * point lookup: the query names exactly one partition (a composite id, an
//!   equality filter on the key, or an add-vertex assigning the key);
//! * targeted: the query names several partitions (`within`, several ids);
//! * scoped: the query carries its own `PartitionStrategy`;
//! * fan-out: nothing names a partition, so every known partition is asked.
//!
//! Targeted and fan-out requests narrow only the start step with
//! `has(<key>, <value>)`; a query that walks edges still reaches neighbours
//! stored in other partitions. Only an explicit strategy scopes every step.
//! When several requests share a trailing `range(lo, hi)`, each asks for
//! `range(0, hi)` and the plan's offset tells the merge to skip `lo`.
//!
//! Id-based evidence wins over filter-based evidence when both are present.
//! Routing is pure; no I/O happens here.

use grove_proto::{PartitionScope, PhysicalRequest};
use grove_query::{
    PartitionKeyDescriptor, PartitionStrategy, PartitionValue, TraversalQuery,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Why a query could not be routed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    /// A fan-out on a partitioned collection with an empty partition catalog.
    #[error("no known partitions for collection partitioned by `{key}`")]
    NoKnownPartitions {
        /// Partition key property name.
        key: String,
    },
}

/// How a query was classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    /// Collection is not partitioned.
    Unpartitioned,
    /// Exactly one partition, named by the query.
    PointLookup,
    /// Several partitions, each named by the query.
    Targeted,
    /// The query carries an explicit `PartitionStrategy`.
    Scoped,
    /// Broadcast to every known partition.
    FanOut,
}

/// Routing decision plus the requests that carry it out.
#[derive(Debug, Clone)]
pub struct RoutePlan {
    /// Classification.
    pub kind: RouteKind,
    /// Requests in partition order.
    pub requests: Vec<PhysicalRequest>,
    /// Merged records to drop before yielding. Non-zero when every request
    /// fetches a trailing `range(lo, hi)` from zero and the merge skips `lo`.
    pub offset: usize,
}

impl RoutePlan {
    /// Whether results from several requests must be merged.
    pub fn requires_merge(&self) -> bool {
        self.requests.len() > 1
    }
}

/// Route `query` for a collection described by `pk` with `known` partitions.
pub fn route(
    query: &Arc<TraversalQuery>,
    pk: &PartitionKeyDescriptor,
    known: &[PartitionValue],
) -> Result<RoutePlan, RoutingError> {
    let Some(key) = pk.key() else {
        return Ok(RoutePlan {
            kind: RouteKind::Unpartitioned,
            requests: vec![PhysicalRequest::new(
                query.text().to_string(),
                Arc::clone(query),
                None,
            )],
            offset: 0,
        });
    };
    let plan = Router { query, key }.plan(known)?;
    debug!(
        kind = ?plan.kind,
        requests = plan.requests.len(),
        query = query.text(),
        "routed query"
    );
    Ok(plan)
}

struct Router<'a> {
    query: &'a Arc<TraversalQuery>,
    key: &'a str,
}

impl Router<'_> {
    fn plan(&self, known: &[PartitionValue]) -> Result<RoutePlan, RoutingError> {
        let evidence = self.query.evidence();

        if let Some(strategy) = self.query.traversal().strategy() {
            if strategy.partition_key.is_some() && !evidence.strategy_values.is_empty() {
                return Ok(self.scoped(strategy));
            }
        }

        // id beats property filter
        let named = if evidence.id_values.is_empty() {
            &evidence.filter_values
        } else {
            &evidence.id_values
        };
        match named.as_slice() {
            [value] => return Ok(self.point(value.clone())),
            [] => {}
            values => {
                return Ok(RoutePlan {
                    kind: RouteKind::Targeted,
                    requests: values.iter().map(|v| self.start_scoped(v)).collect(),
                    offset: self.query.result_offset(),
                })
            }
        }

        let starts_with_add_v = self
            .query
            .traversal()
            .steps
            .first()
            .is_some_and(|s| s.kind == grove_query::ast::StepKind::AddV);
        if starts_with_add_v {
            if let Some(value) = evidence.assigned_values.first() {
                return Ok(self.point(value.clone()));
            }
        }

        if known.is_empty() {
            return Err(RoutingError::NoKnownPartitions {
                key: self.key.to_string(),
            });
        }
        Ok(RoutePlan {
            kind: RouteKind::FanOut,
            requests: known.iter().map(|v| self.start_scoped(v)).collect(),
            offset: self.query.result_offset(),
        })
    }

    fn scope(&self, value: PartitionValue) -> Option<PartitionScope> {
        Some(PartitionScope::new(self.key, value))
    }

    /// Sent as written; the query already pins its partition.
    fn point(&self, value: PartitionValue) -> RoutePlan {
        RoutePlan {
            kind: RouteKind::PointLookup,
            requests: vec![PhysicalRequest::new(
                self.query.text().to_string(),
                Arc::clone(self.query),
                self.scope(value),
            )],
            offset: 0,
        }
    }

    /// One request per read partition of an explicit strategy.
    fn scoped(&self, strategy: &PartitionStrategy) -> RoutePlan {
        let reads: Vec<PartitionValue> = strategy
            .read_partitions
            .iter()
            .filter_map(PartitionValue::from_literal)
            .collect();
        let offset = if reads.len() > 1 {
            self.query.result_offset()
        } else {
            0
        };
        let requests = match reads.as_slice() {
            [] => {
                // write-only strategy: the write partition is the target
                let target = strategy
                    .write_partition
                    .as_ref()
                    .and_then(PartitionValue::from_literal);
                vec![PhysicalRequest::new(
                    self.query.text().to_string(),
                    Arc::clone(self.query),
                    target.and_then(|v| self.scope(v)),
                )]
            }
            [single] => vec![PhysicalRequest::new(
                self.query.text().to_string(),
                Arc::clone(self.query),
                self.scope(single.clone()),
            )],
            many => many
                .iter()
                .map(|v| self.strategy_scoped(v, strategy.write_partition.clone()))
                .collect(),
        };
        RoutePlan {
            kind: RouteKind::Scoped,
            requests,
            offset,
        }
    }

    /// Narrow the start step to one partition. Later steps stay unscoped so
    /// navigation can cross into other partitions.
    fn start_scoped(&self, value: &PartitionValue) -> PhysicalRequest {
        let traversal = self.query.traversal().with_range_from_zero();
        match traversal.with_start_filter(self.key, value.to_literal()) {
            Some(narrowed) => PhysicalRequest::new(
                narrowed.to_string(),
                Arc::clone(self.query),
                self.scope(value.clone()),
            ),
            // no V/E start to narrow
            None => self.strategy_scoped(value, None),
        }
    }

    /// Attach a single-partition read strategy to the whole traversal.
    fn strategy_scoped(
        &self,
        value: &PartitionValue,
        write_partition: Option<grove_query::ast::Literal>,
    ) -> PhysicalRequest {
        let strategy = PartitionStrategy {
            partition_key: Some(self.key.to_string()),
            read_partitions: vec![value.to_literal()],
            write_partition,
        };
        let gremlin = self
            .query
            .traversal()
            .with_range_from_zero()
            .with_strategy(strategy)
            .to_string();
        PhysicalRequest::new(gremlin, Arc::clone(self.query), self.scope(value.clone()))
    }
}
