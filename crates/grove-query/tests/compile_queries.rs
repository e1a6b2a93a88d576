// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(missing_docs)]
#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
//! Compiles the console programs' query lists and checks structural properties.

use grove_query::{compile, parse, CompileError, PartitionKeyDescriptor, PartitionValue};
use proptest::prelude::*;

const GET_STARTED: &[&str] = &[
    "g.V().drop()",
    "g.addV('person').property('id', 'thomas').property('firstName', 'Thomas').property('age', 44)",
    "g.addV('person').property('id', 'mary').property('firstName', 'Mary').property('lastName', 'Andersen').property('age', 39)",
    "g.V().has('id','thomas').addE('knows').to(g.V().has('id','mary'))",
    "g.V().has('id','thomas').property('age', 44)",
    "g.V().count()",
    "g.V().hasLabel('person').has('age', gt(40))",
    "g.V().hasLabel('person').values('firstName')",
    "g.V().hasLabel('person').order().by('firstName', decr)",
    "g.V().has('id','thomas').out('knows').hasLabel('person').out('knows').hasLabel('person')",
    "g.V().has('id','thomas').repeat(out()).until(has('id', 'robin')).path()",
    "g.V().has('id','thomas').outE('knows').where(inV().has('id', 'mary')).drop()",
    "g.E().count()",
    "g.V().has('id','thomas').drop()",
    "g.addV('person').property('id', 'thomas').property('firstName', 'Thomas').property('age', 44).valueMap()",
];

const PARTITIONED: &[&str] = &[
    "g.addV('person').property('id', 'thomas').property('firstName', 'Thomas').property('age', 44)",
    "g.V('thomas')",
    "g.V('thomas').has('firstName', 'Thomas')",
    "g.V().has('id','thomas').has('firstName', 'Thomas')",
    "g.withStrategies(PartitionStrategy.build().partitionKey('firstName').readPartitions('Thomas').create()).V('thomas')",
    "g.V(['Thomas','thomas']).addE('knows').to(g.V(['Mary','mary']))",
    "g.V(['Thomas','thomas']).property('age', 44)",
    "g.V(['Ben','ben']).in('knows').hasLabel('person')",
    "g.V('thomas').out('knows').hasLabel('person').out('knows').hasLabel('person')",
    "g.V('thomas').repeat(out()).until(has('id', 'robin')).path()",
    "g.V(['Thomas','thomas']).drop()",
];

#[test]
fn get_started_queries_compile_unpartitioned() {
    let pk = PartitionKeyDescriptor::unpartitioned();
    for text in GET_STARTED {
        compile(text, &pk).unwrap_or_else(|e| panic!("{text}: {e}"));
    }
}

#[test]
fn partitioned_queries_compile() {
    let pk = PartitionKeyDescriptor::partitioned("firstName");
    for text in PARTITIONED {
        compile(text, &pk).unwrap_or_else(|e| panic!("{text}: {e}"));
    }
}

#[test]
fn add_vertex_without_partition_key_is_rejected() {
    let pk = PartitionKeyDescriptor::partitioned("firstName");
    let err = compile(
        "g.addV('person').property('id', 'thomas').property('age', 44)",
        &pk,
    )
    .unwrap_err();
    assert!(matches!(err, CompileError::MissingPartitionKey { ref key } if key == "firstName"));
    assert!(err.to_string().contains("firstName"));
}

#[test]
fn composite_id_evidence_is_exposed() {
    let pk = PartitionKeyDescriptor::partitioned("firstName");
    let q = compile("g.V(['Ben','ben']).in('knows').hasLabel('person')", &pk).unwrap();
    assert_eq!(q.evidence().id_values, vec![PartitionValue::from("Ben")]);
}

#[test]
fn canonical_text_is_a_fixed_point() {
    for text in GET_STARTED.iter().chain(PARTITIONED) {
        let once = parse(text).unwrap().to_string();
        let twice = parse(&once).unwrap().to_string();
        assert_eq!(once, twice, "{text}");
    }
}

fn name() -> impl Strategy<Value = String> {
    "[a-z][a-zA-Z]{0,7}"
}

fn literal() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z ']{0,8}".prop_map(|s| format!("'{}'", s.replace('\'', "\\'"))),
        (-1000i64..1000).prop_map(|n| n.to_string()),
        any::<bool>().prop_map(|b| b.to_string()),
    ]
}

fn step() -> impl Strategy<Value = String> {
    prop_oneof![
        (name(), literal()).prop_map(|(k, v)| format!("has('{k}', {v})")),
        name().prop_map(|l| format!("hasLabel('{l}')")),
        name().prop_map(|l| format!("out('{l}')")),
        name().prop_map(|l| format!("in('{l}')")),
        name().prop_map(|k| format!("values('{k}')")),
        (name(), literal()).prop_map(|(k, v)| format!("has('{k}', within({v}, {v}))")),
        (0i64..50).prop_map(|n| format!("limit({n})")),
        Just("dedup()".to_string()),
        Just("count()".to_string()),
        Just("valueMap()".to_string()),
        name().prop_map(|k| format!("order().by('{k}', decr)")),
        name().prop_map(|l| format!("repeat(out('{l}')).times(2)")),
    ]
}

fn query() -> impl Strategy<Value = String> {
    prop::collection::vec(step(), 0..6).prop_map(|steps| {
        let mut text = String::from("g.V()");
        for step in steps {
            text.push('.');
            text.push_str(&step);
        }
        text
    })
}

proptest! {
    #[test]
    fn compiling_twice_is_structurally_equal(text in query()) {
        let pk = PartitionKeyDescriptor::partitioned("firstName");
        let a = compile(&text, &pk);
        let b = compile(&text, &pk);
        prop_assert_eq!(a, b);
    }

    #[test]
    fn rendered_text_reparses_to_the_same_tree(text in query()) {
        let tree = parse(&text).unwrap();
        prop_assert_eq!(parse(&tree.to_string()).unwrap(), tree);
    }
}
