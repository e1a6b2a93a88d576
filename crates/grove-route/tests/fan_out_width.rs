// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(missing_docs)]
#![allow(clippy::expect_used, clippy::unwrap_used)]
//! Fan-out width and point-lookup properties over generated catalogs.

use grove_query::{compile, PartitionKeyDescriptor, PartitionValue};
use grove_route::{route, RouteKind};
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::sync::Arc;

const UNSCOPED: &[&str] = &[
    "g.V('thomas')",
    "g.V().has('id','thomas')",
    "g.V().count()",
    "g.E().count()",
    "g.V().hasLabel('person').has('age', gt(40))",
    "g.V().hasLabel('person').order().by('firstName', decr)",
    "g.V('thomas').out('knows').hasLabel('person').out('knows').hasLabel('person')",
];

fn catalog() -> impl Strategy<Value = Vec<PartitionValue>> {
    prop::collection::btree_set("[A-Z][a-z]{1,6}", 1..12)
        .prop_map(|set: BTreeSet<String>| set.into_iter().map(PartitionValue::String).collect())
}

proptest! {
    #[test]
    fn unscoped_reads_hit_every_known_partition_once(
        known in catalog(),
        idx in 0..UNSCOPED.len(),
    ) {
        let pk = PartitionKeyDescriptor::partitioned("firstName");
        let q = Arc::new(compile(UNSCOPED[idx], &pk).unwrap());
        let plan = route(&q, &pk, &known).unwrap();
        prop_assert_eq!(plan.kind, RouteKind::FanOut);
        prop_assert_eq!(plan.requests.len(), known.len());
        let targets: Vec<_> = plan.requests.iter().filter_map(|r| r.partition().cloned()).collect();
        prop_assert_eq!(targets, known);
        for request in &plan.requests {
            let value = request.partition().unwrap();
            prop_assert!(!request.gremlin.contains("withStrategies"));
            let start_filter = format!(").has('firstName', '{value}')");
            prop_assert!(request.gremlin.contains(&start_filter), "{}", request.gremlin);
        }
    }

    #[test]
    fn point_lookups_emit_one_scoped_request(
        known in catalog(),
        value in "[A-Z][a-z]{1,6}",
    ) {
        let pk = PartitionKeyDescriptor::partitioned("firstName");
        let text = format!("g.V().has('id','x').has('firstName','{value}')");
        let q = Arc::new(compile(&text, &pk).unwrap());
        let plan = route(&q, &pk, &known).unwrap();
        prop_assert_eq!(plan.kind, RouteKind::PointLookup);
        prop_assert_eq!(plan.requests.len(), 1);
        prop_assert_eq!(plan.requests[0].partition(), Some(&PartitionValue::String(value)));
    }
}

#[test]
fn scenario_from_the_partitioned_sample() {
    let pk = PartitionKeyDescriptor::partitioned("firstName");
    let known: Vec<_> = ["Thomas", "Mary", "Ben", "Robin"]
        .into_iter()
        .map(PartitionValue::from)
        .collect();
    let cases = [
        ("g.V('thomas')", RouteKind::FanOut, 4),
        ("g.V('thomas').has('firstName', 'Thomas')", RouteKind::PointLookup, 1),
        ("g.V().has('id','thomas').has('firstName', 'Thomas')", RouteKind::PointLookup, 1),
        (
            "g.withStrategies(PartitionStrategy.build().partitionKey('firstName').readPartitions('Thomas').create()).V('thomas')",
            RouteKind::Scoped,
            1,
        ),
        ("g.V(['Thomas','thomas']).addE('knows').to(g.V(['Mary','mary']))", RouteKind::PointLookup, 1),
        ("g.V(['Ben','ben']).in('knows').hasLabel('person')", RouteKind::PointLookup, 1),
        ("g.V().count()", RouteKind::FanOut, 4),
    ];
    for (text, kind, width) in cases {
        let q = Arc::new(compile(text, &pk).unwrap());
        let plan = route(&q, &pk, &known).unwrap();
        assert_eq!(plan.kind, kind, "{text}");
        assert_eq!(plan.requests.len(), width, "{text}");
    }
}
