// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! What the result stream of a traversal looks like: ordered, counted,
//! truncated, or a property map.

use crate::ast::{Arg, Literal, StepKind, Symbol, Traversal};

/// Sort direction of one `by` modulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending (`incr`, `asc`).
    Ascending,
    /// Descending (`decr`, `desc`).
    Descending,
}

/// One sort key: a property name (or the record itself when `None`) and a direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    /// Property to compare; `None` compares the whole record value.
    pub property: Option<String>,
    /// Direction.
    pub direction: SortDirection,
}

/// The ordering a traversal guarantees on its output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSpec {
    /// Keys compared lexicographically.
    pub keys: Vec<SortKey>,
}

/// How individual result records are shaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultShape {
    /// `valueMap()` output: maps whose values are multi-valued property lists.
    PropertyMap,
    /// Anything else (elements, scalars, paths).
    Plain,
}

/// The ordering the final output of `traversal` is guaranteed to have.
///
/// Returns `None` when there is no `order()` step, when it shuffles, when a
/// `by` modulator uses a traversal, or when steps after the order block could
/// reshape records in a way the merge cannot follow.
pub fn order_spec(traversal: &Traversal) -> Option<OrderSpec> {
    let steps = &traversal.steps;
    let order_idx = steps.iter().rposition(|s| s.kind == StepKind::Order)?;
    let mut keys = Vec::new();
    let mut idx = order_idx + 1;
    while let Some(step) = steps.get(idx).filter(|s| s.kind == StepKind::By) {
        keys.push(sort_key(&step.args)?);
        idx += 1;
    }
    if keys.is_empty() {
        keys.push(SortKey {
            property: None,
            direction: SortDirection::Ascending,
        });
    }

    for step in &steps[idx..] {
        match step.kind {
            StepKind::Limit | StepKind::Range | StepKind::Dedup => {}
            StepKind::Values => {
                // values('k') keeps order only when it projects the sort key
                let [Arg::Literal(Literal::String(projected))] = step.args.as_slice() else {
                    return None;
                };
                if keys
                    .iter()
                    .any(|k| k.property.as_deref().is_some_and(|p| p != projected))
                {
                    return None;
                }
                for key in &mut keys {
                    key.property = None;
                }
            }
            _ => return None,
        }
    }
    Some(OrderSpec { keys })
}

fn sort_key(args: &[Arg]) -> Option<SortKey> {
    let direction = |sym: Option<&Arg>| match sym {
        None | Some(Arg::Symbol(Symbol::Asc)) => Some(SortDirection::Ascending),
        Some(Arg::Symbol(Symbol::Desc)) => Some(SortDirection::Descending),
        _ => None,
    };
    match args {
        [] => Some(SortKey {
            property: None,
            direction: SortDirection::Ascending,
        }),
        [Arg::Symbol(Symbol::Asc | Symbol::Desc)] => Some(SortKey {
            property: None,
            direction: direction(args.first())?,
        }),
        [Arg::Literal(Literal::String(p)), rest @ ..] if rest.len() <= 1 => Some(SortKey {
            property: Some(p.clone()),
            direction: direction(rest.first())?,
        }),
        [Arg::Symbol(Symbol::Id), rest @ ..] if rest.len() <= 1 => Some(SortKey {
            property: Some("id".into()),
            direction: direction(rest.first())?,
        }),
        [Arg::Symbol(Symbol::Label), rest @ ..] if rest.len() <= 1 => Some(SortKey {
            property: Some("label".into()),
            direction: direction(rest.first())?,
        }),
        _ => None,
    }
}

/// True when the traversal ends in `count()`.
pub fn is_count(traversal: &Traversal) -> bool {
    traversal
        .steps
        .last()
        .is_some_and(|s| s.kind == StepKind::Count)
}

/// Upper bound on the number of records the traversal returns, taken from a
/// trailing `limit(n)` or a bounded `range(lo, hi)`.
pub fn result_limit(traversal: &Traversal) -> Option<usize> {
    let last = traversal.steps.last()?;
    match (last.kind, last.args.as_slice()) {
        (StepKind::Limit, [Arg::Literal(Literal::Int(n))]) => usize::try_from(*n).ok(),
        (StepKind::Range, [Arg::Literal(Literal::Int(lo)), Arg::Literal(Literal::Int(hi))]) => {
            usize::try_from(hi.checked_sub(*lo)?).ok()
        }
        _ => None,
    }
}

/// Records a trailing `range(lo, hi)` skips before its window opens.
pub fn result_offset(traversal: &Traversal) -> usize {
    match traversal.steps.last() {
        Some(step) if step.kind == StepKind::Range => match step.args.as_slice() {
            [Arg::Literal(Literal::Int(lo)), _] => usize::try_from(*lo).unwrap_or(0),
            _ => 0,
        },
        _ => 0,
    }
}

/// Shape of individual records.
pub fn result_shape(traversal: &Traversal) -> ResultShape {
    match traversal.steps.last() {
        Some(step) if step.kind == StepKind::ValueMap => ResultShape::PropertyMap,
        _ => ResultShape::Plain,
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn spec(text: &str) -> Option<OrderSpec> {
        order_spec(&parse(text).unwrap())
    }

    #[test]
    fn order_by_property_descending() {
        assert_eq!(
            spec("g.V().hasLabel('person').order().by('firstName', decr)"),
            Some(OrderSpec {
                keys: vec![SortKey {
                    property: Some("firstName".into()),
                    direction: SortDirection::Descending,
                }]
            })
        );
    }

    #[test]
    fn bare_order_sorts_on_value() {
        assert_eq!(
            spec("g.V().values('age').order()"),
            Some(OrderSpec {
                keys: vec![SortKey {
                    property: None,
                    direction: SortDirection::Ascending,
                }]
            })
        );
    }

    #[test]
    fn projection_of_sort_key_keeps_order() {
        let s = spec("g.V().order().by('firstName').values('firstName')").unwrap();
        assert_eq!(s.keys[0].property, None);
        assert!(spec("g.V().order().by('firstName').values('age')").is_none());
    }

    #[test]
    fn navigation_after_order_drops_guarantee() {
        assert!(spec("g.V().order().by('firstName').out('knows')").is_none());
        assert!(spec("g.V().order().by(shuffle)").is_none());
        assert!(spec("g.V().out('knows')").is_none());
    }

    #[test]
    fn count_limit_and_shape() {
        assert!(is_count(&parse("g.E().count()").unwrap()));
        assert!(!is_count(&parse("g.V().count().is(3)").unwrap()));
        assert_eq!(
            result_limit(&parse("g.V().order().by('age').limit(2)").unwrap()),
            Some(2)
        );
        assert_eq!(result_limit(&parse("g.V().range(1, 3)").unwrap()), Some(2));
        assert_eq!(result_limit(&parse("g.V().range(2, -1)").unwrap()), None);
        assert_eq!(result_offset(&parse("g.V().range(2, -1)").unwrap()), 2);
        assert_eq!(result_offset(&parse("g.V().range(1, 3).count()").unwrap()), 0);
        assert_eq!(
            result_shape(&parse("g.V().valueMap()").unwrap()),
            ResultShape::PropertyMap
        );
    }
}
