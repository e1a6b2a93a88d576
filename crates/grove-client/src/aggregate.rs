// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Result aggregator.
//!
//! Consumes the engine's tagged event channel and exposes one lazy,
//! non-restartable [`ResultStream`]. Merge state lives entirely on the
//! consumer's task:
//!
//! * first-come: records are yielded in arrival order;
//! * sorted: k-way merge over per-stream buffers, ties broken by stream index;
//! * count: per-stream counts are summed into a single record.
//!
//! A skip drops the first merged records, as `range(lo, hi)` does when every
//! partition was asked from zero. A trailing limit truncates the merged
//! output after that; dedupe (off by default) drops
//! records whose canonical JSON was already yielded. When a request fails
//! permanently the batch is cancelled, already received records are flushed,
//! and the error is yielded last.

use crate::cancel::CancelToken;
use crate::engine::StreamEvent;
use crate::error::GroveError;
use grove_proto::{ResultRecord, Value};
use grove_query::{OrderSpec, SortDirection, TraversalQuery};
use std::cmp::Ordering;
use std::collections::{HashSet, VecDeque};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// How per-request streams are combined.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MergePolicy {
    /// Sort keys for a k-way merge; `None` yields records first-come.
    pub order: Option<OrderSpec>,
    /// Sum per-stream counts instead of concatenating.
    pub count: bool,
    /// Drop this many merged records before yielding any.
    pub skip: usize,
    /// Truncate merged output to this many records.
    pub limit: Option<usize>,
    /// Drop records already yielded.
    pub dedupe: bool,
}

impl MergePolicy {
    /// Policy implied by a compiled query.
    pub fn for_query(query: &TraversalQuery, dedupe: bool) -> Self {
        Self {
            order: query.order_spec(),
            count: query.is_count(),
            skip: 0,
            limit: query.result_limit(),
            dedupe,
        }
    }

    /// The same policy, dropping the first `skip` merged records.
    #[must_use]
    pub fn skipping(self, skip: usize) -> Self {
        Self { skip, ..self }
    }
}

/// Merge the tagged events of `streams` request streams into one sequence.
pub fn aggregate(
    events: mpsc::Receiver<(usize, StreamEvent)>,
    streams: usize,
    policy: MergePolicy,
    cancel: CancelToken,
) -> ResultStream {
    ResultStream {
        events,
        buffers: vec![VecDeque::new(); streams],
        arrivals: VecDeque::new(),
        done: vec![false; streams],
        policy,
        cancel,
        skipped: 0,
        emitted: 0,
        seen: HashSet::new(),
        count_sum: 0,
        failure: None,
        cancelled: false,
        finished: false,
    }
}

/// Lazy merged result sequence for one logical query.
///
/// Yields `Ok` records and, if the query did not complete, one terminal
/// `Err` after every record that was received. Dropping the stream cancels
/// the batch.
pub struct ResultStream {
    events: mpsc::Receiver<(usize, StreamEvent)>,
    buffers: Vec<VecDeque<ResultRecord>>,
    arrivals: VecDeque<ResultRecord>,
    done: Vec<bool>,
    policy: MergePolicy,
    cancel: CancelToken,
    skipped: usize,
    emitted: usize,
    seen: HashSet<String>,
    count_sum: i64,
    failure: Option<GroveError>,
    cancelled: bool,
    finished: bool,
}

impl ResultStream {
    /// Cancel the batch. Records already received are still yielded, then
    /// [`GroveError::Cancelled`].
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// The batch's cancellation token.
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Next record, the terminal error, or `None` once the stream is over.
    pub async fn next(&mut self) -> Option<Result<ResultRecord, GroveError>> {
        loop {
            if self.finished {
                return None;
            }
            if self.policy.limit.is_some_and(|limit| self.emitted >= limit) {
                debug!(emitted = self.emitted, "limit reached, cancelling rest of batch");
                self.cancel.cancel();
                self.finished = true;
                return None;
            }
            let all_done = self.done.iter().all(|d| *d);

            if !self.policy.count {
                if let Some(record) = self.pop_ready(all_done) {
                    if self.policy.dedupe && !self.seen.insert(record.canonical_json()) {
                        continue;
                    }
                    if self.skipped < self.policy.skip {
                        self.skipped += 1;
                        continue;
                    }
                    self.emitted += 1;
                    return Some(Ok(record));
                }
            }

            if all_done {
                self.finished = true;
                if let Some(err) = self.failure.take() {
                    return Some(Err(err));
                }
                if self.cancelled {
                    return Some(Err(GroveError::Cancelled));
                }
                if self.policy.count {
                    return Some(Ok(ResultRecord::new(Value::Int(self.count_sum))));
                }
                return None;
            }

            match self.events.recv().await {
                Some((idx, event)) => self.apply(idx, event),
                None => {
                    // every sender is gone; nothing more can arrive
                    for done in &mut self.done {
                        *done = true;
                    }
                }
            }
        }
    }

    /// Drain the whole stream into a vector, stopping at the first error.
    pub async fn collect(mut self) -> Result<Vec<ResultRecord>, GroveError> {
        let mut out = Vec::new();
        while let Some(item) = self.next().await {
            out.push(item?);
        }
        Ok(out)
    }

    fn apply(&mut self, idx: usize, event: StreamEvent) {
        let Some(done) = self.done.get_mut(idx) else {
            warn!(idx, "event for unknown stream");
            return;
        };
        match event {
            StreamEvent::Records(records) => {
                if self.policy.count {
                    for record in &records {
                        match record.as_count() {
                            Some(n) => self.count_sum += n,
                            None => warn!(idx, "non-numeric record in count result"),
                        }
                    }
                } else if self.policy.order.is_some() {
                    self.buffers[idx].extend(records);
                } else {
                    self.arrivals.extend(records);
                }
            }
            StreamEvent::Done => *done = true,
            StreamEvent::Failed(err) => {
                *done = true;
                if self.failure.is_none() {
                    self.failure = Some(GroveError::Service(err));
                    self.cancel.cancel();
                }
            }
            StreamEvent::Cancelled => {
                *done = true;
                self.cancelled = true;
            }
        }
    }

    /// Next record that may be yielded without violating the merge order.
    fn pop_ready(&mut self, all_done: bool) -> Option<ResultRecord> {
        let Some(order) = &self.policy.order else {
            return self.arrivals.pop_front();
        };
        // a live stream with an empty buffer may still produce a smaller head
        let blocked = self
            .buffers
            .iter()
            .zip(&self.done)
            .any(|(buffer, done)| buffer.is_empty() && !done);
        if blocked && !all_done {
            return None;
        }
        let mut best: Option<usize> = None;
        for (idx, buffer) in self.buffers.iter().enumerate() {
            let Some(head) = buffer.front() else {
                continue;
            };
            let better = match best.and_then(|b| self.buffers[b].front()) {
                None => true,
                Some(current) => compare(order, head, current) == Ordering::Less,
            };
            if better {
                best = Some(idx);
            }
        }
        best.and_then(|idx| self.buffers[idx].pop_front())
    }
}

impl Drop for ResultStream {
    fn drop(&mut self) {
        if !self.finished {
            self.cancel.cancel();
        }
    }
}

fn compare(order: &OrderSpec, a: &ResultRecord, b: &ResultRecord) -> Ordering {
    for key in &order.keys {
        let ord = a.sort_value(key).cmp(&b.sort_value(key));
        let ord = match key.direction {
            SortDirection::Ascending => ord,
            SortDirection::Descending => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use grove_proto::ServiceError;
    use grove_query::SortKey;

    fn rec(n: i64) -> ResultRecord {
        ResultRecord::new(Value::Int(n))
    }

    fn ints(records: &[ResultRecord]) -> Vec<i64> {
        records.iter().filter_map(ResultRecord::as_count).collect()
    }

    fn ascending() -> MergePolicy {
        MergePolicy {
            order: Some(OrderSpec {
                keys: vec![SortKey {
                    property: None,
                    direction: SortDirection::Ascending,
                }],
            }),
            ..MergePolicy::default()
        }
    }

    async fn feed(
        streams: usize,
        policy: MergePolicy,
        events: Vec<(usize, StreamEvent)>,
    ) -> Vec<Result<ResultRecord, GroveError>> {
        let (tx, rx) = mpsc::channel(events.len().max(1));
        for event in events {
            tx.send(event).await.unwrap();
        }
        drop(tx);
        let mut stream = aggregate(rx, streams, policy, CancelToken::new());
        let mut out = Vec::new();
        while let Some(item) = stream.next().await {
            out.push(item);
        }
        out
    }

    #[tokio::test]
    async fn sorted_merge_interleaves_streams() {
        let out = feed(
            2,
            ascending(),
            vec![
                (0, StreamEvent::Records(vec![rec(1), rec(4), rec(6)])),
                (1, StreamEvent::Records(vec![rec(2), rec(3), rec(7)])),
                (0, StreamEvent::Done),
                (1, StreamEvent::Done),
            ],
        )
        .await;
        let records: Vec<_> = out.into_iter().map(Result::unwrap).collect();
        assert_eq!(ints(&records), vec![1, 2, 3, 4, 6, 7]);
    }

    #[tokio::test]
    async fn count_sums_streams() {
        let out = feed(
            3,
            MergePolicy {
                count: true,
                ..MergePolicy::default()
            },
            vec![
                (0, StreamEvent::Records(vec![rec(2)])),
                (0, StreamEvent::Done),
                (2, StreamEvent::Records(vec![rec(5)])),
                (2, StreamEvent::Done),
                (1, StreamEvent::Records(vec![rec(0)])),
                (1, StreamEvent::Done),
            ],
        )
        .await;
        assert_eq!(out, vec![Ok(rec(7))]);
    }

    #[tokio::test]
    async fn limit_and_dedupe() {
        let out = feed(
            2,
            MergePolicy {
                limit: Some(3),
                dedupe: true,
                ..MergePolicy::default()
            },
            vec![
                (0, StreamEvent::Records(vec![rec(1), rec(1), rec(2)])),
                (1, StreamEvent::Records(vec![rec(2), rec(3), rec(4)])),
                (0, StreamEvent::Done),
                (1, StreamEvent::Done),
            ],
        )
        .await;
        let records: Vec<_> = out.into_iter().map(Result::unwrap).collect();
        assert_eq!(ints(&records), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn skip_applies_to_the_merged_order() {
        let out = feed(
            2,
            MergePolicy {
                limit: Some(3),
                ..ascending()
            }
            .skipping(2),
            vec![
                (0, StreamEvent::Records(vec![rec(1), rec(4), rec(5)])),
                (1, StreamEvent::Records(vec![rec(2), rec(3), rec(6)])),
                (0, StreamEvent::Done),
                (1, StreamEvent::Done),
            ],
        )
        .await;
        let records: Vec<_> = out.into_iter().map(Result::unwrap).collect();
        assert_eq!(ints(&records), vec![3, 4, 5]);
    }

    #[tokio::test]
    async fn failure_flushes_then_reports() {
        let out = feed(
            2,
            MergePolicy::default(),
            vec![
                (0, StreamEvent::Records(vec![rec(1)])),
                (0, StreamEvent::Done),
                (1, StreamEvent::Failed(ServiceError::new(
                    grove_proto::StatusCategory::BadRequest,
                    "bad",
                ))),
            ],
        )
        .await;
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], Ok(rec(1)));
        assert!(matches!(&out[1], Err(GroveError::Service(e)) if !e.is_transient()));
    }

    #[tokio::test]
    async fn closed_channel_never_hangs() {
        let out = feed(3, ascending(), vec![(1, StreamEvent::Records(vec![rec(9)]))]).await;
        assert_eq!(out, vec![Ok(rec(9))]);
    }
}
