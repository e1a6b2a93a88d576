// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Where a traversal states its partition key value.
//!
//! The compiler uses this to reject mutations that cannot be placed; the
//! router uses it to decide between a point lookup and a fan-out. Both read
//! the same [`PartitionEvidence`] so they can never disagree.

use crate::ast::{Arg, Literal, PartitionValue, Predicate, PredicateOp, Step, StepKind, Traversal};
use crate::error::CompileError;

/// Partition key values a traversal names, grouped by how it names them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PartitionEvidence {
    /// Values encoded in composite ids: `g.V(['Thomas', 'thomas'])`.
    pub id_values: Vec<PartitionValue>,
    /// Values from equality filters in the leading filter block:
    /// `has('firstName', 'Thomas')`, `has('firstName', within(...))`.
    pub filter_values: Vec<PartitionValue>,
    /// Values assigned by `addV(...).property(key, value)`.
    pub assigned_values: Vec<PartitionValue>,
    /// Values named by an attached `PartitionStrategy`.
    pub strategy_values: Vec<PartitionValue>,
}

impl PartitionEvidence {
    /// True when the traversal names no partition value at all.
    pub fn is_empty(&self) -> bool {
        self.id_values.is_empty()
            && self.filter_values.is_empty()
            && self.assigned_values.is_empty()
            && self.strategy_values.is_empty()
    }
}

/// Collect partition evidence for `key` from `traversal`.
///
/// Fails when a strategy names another key or when the key is assigned a
/// value that cannot address a partition.
pub fn partition_evidence(
    traversal: &Traversal,
    key: &str,
) -> Result<PartitionEvidence, CompileError> {
    let mut evidence = PartitionEvidence::default();

    if let Some(strategy) = traversal.strategy() {
        match strategy.partition_key.as_deref() {
            Some(found) if found != key => {
                return Err(CompileError::PartitionKeyMismatch {
                    expected: key.to_string(),
                    found: found.to_string(),
                });
            }
            Some(_) => {
                for lit in strategy
                    .read_partitions
                    .iter()
                    .chain(strategy.write_partition.iter())
                {
                    push_unique(&mut evidence.strategy_values, to_value(lit, key)?);
                }
            }
            None => {}
        }
    }

    let Some(first) = traversal.steps.first() else {
        return Ok(evidence);
    };

    if first.kind == StepKind::V {
        for arg in &first.args {
            if let Arg::List(items) = arg {
                // [partitionKeyValue, id]
                if let [pk, _id] = items.as_slice() {
                    push_unique(&mut evidence.id_values, to_value(pk, key)?);
                }
            }
        }
        for step in traversal.steps[1..]
            .iter()
            .take_while(|s| s.kind.is_filter())
        {
            for value in equality_values(step, key)? {
                push_unique(&mut evidence.filter_values, value);
            }
        }
    }

    let mut in_add_v = false;
    for step in &traversal.steps {
        match step.kind {
            StepKind::AddV => in_add_v = true,
            StepKind::Property if in_add_v => {
                if let [Arg::Literal(Literal::String(k)), Arg::Literal(v)] = step.args.as_slice() {
                    if k == key {
                        push_unique(&mut evidence.assigned_values, to_value(v, key)?);
                    }
                }
            }
            _ => in_add_v = false,
        }
    }

    Ok(evidence)
}

/// Reject mutating traversals that cannot be placed in a partition.
///
/// * every `addV` must be followed by `property(key, value)` unless a
///   strategy supplies a write partition;
/// * `addE` and `drop` must start from vertices whose partition is named by a
///   composite id, a leading equality filter or a strategy.
pub fn check_partition_key(traversal: &Traversal, key: &str) -> Result<(), CompileError> {
    if !traversal.is_mutating() {
        // Still surface strategy mismatches and float keys for reads.
        partition_evidence(traversal, key)?;
        return Ok(());
    }
    let evidence = partition_evidence(traversal, key)?;
    let write_partition = traversal
        .strategy()
        .and_then(|s| s.write_partition.as_ref())
        .is_some();
    let missing = || CompileError::MissingPartitionKey {
        key: key.to_string(),
    };

    let steps = &traversal.steps;
    for (idx, step) in steps.iter().enumerate() {
        match step.kind {
            StepKind::AddV => {
                let assigned = steps[idx + 1..]
                    .iter()
                    .take_while(|s| s.kind == StepKind::Property)
                    .any(|s| assigns_key(s, key));
                if !assigned && !write_partition {
                    return Err(missing());
                }
            }
            StepKind::AddE | StepKind::Drop => {
                let located = !evidence.id_values.is_empty()
                    || !evidence.filter_values.is_empty()
                    || !evidence.strategy_values.is_empty()
                    || (steps[0].kind == StepKind::AddV && !evidence.assigned_values.is_empty());
                if !located {
                    return Err(missing());
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn assigns_key(step: &Step, key: &str) -> bool {
    matches!(step.args.as_slice(), [Arg::Literal(Literal::String(k)), Arg::Literal(_)] if k == key)
}

/// Values of an equality filter on `key`, or nothing for any other step.
fn equality_values(step: &Step, key: &str) -> Result<Vec<PartitionValue>, CompileError> {
    if step.kind != StepKind::Has {
        return Ok(Vec::new());
    }
    let (k, v) = match step.args.as_slice() {
        [Arg::Literal(Literal::String(k)), v] | [_, Arg::Literal(Literal::String(k)), v] => (k, v),
        _ => return Ok(Vec::new()),
    };
    if k != key {
        return Ok(Vec::new());
    }
    match v {
        Arg::Literal(lit) => Ok(vec![to_value(lit, key)?]),
        Arg::Predicate(Predicate {
            op: PredicateOp::Eq | PredicateOp::Within,
            values,
        }) => values.iter().map(|lit| to_value(lit, key)).collect(),
        _ => Ok(Vec::new()),
    }
}

fn to_value(lit: &Literal, key: &str) -> Result<PartitionValue, CompileError> {
    PartitionValue::from_literal(lit).ok_or_else(|| CompileError::InvalidPartitionValue {
        key: key.to_string(),
    })
}

fn push_unique(values: &mut Vec<PartitionValue>, value: PartitionValue) {
    if !values.contains(&value) {
        values.push(value);
    }
}
