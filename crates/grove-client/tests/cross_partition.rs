// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
#![allow(clippy::expect_used, clippy::unwrap_used)]

//! Fan-out reads against a small graph spread over several partitions. The
//! service evaluates exactly the traversal it receives, honouring any
//! `PartitionStrategy` on every step the way the server does.

use grove_client::{EngineConfig, GraphClient, PartitionCatalog};
use grove_dry_tests::{record, Reply, ScriptedService};
use grove_proto::{ServiceError, StatusCategory, Value};
use grove_query::ast::{Arg, StepKind};
use grove_query::{parse, PartitionKeyDescriptor, PartitionValue};
use serde_json::json;
use std::sync::Arc;

struct Person {
    id: &'static str,
    first_name: &'static str,
    knows: &'static [&'static str],
}

// each person lives in the partition named by its firstName
const GRAPH: &[Person] = &[
    Person { id: "thomas", first_name: "Thomas", knows: &["mary", "ben"] },
    Person { id: "mary", first_name: "Mary", knows: &[] },
    Person { id: "ben", first_name: "Ben", knows: &["robin"] },
    Person { id: "robin", first_name: "Robin", knows: &[] },
];

fn unsupported(what: String) -> Reply {
    Reply::Error(ServiceError::new(StatusCategory::BadRequest, what))
}

fn evaluate(gremlin: &str) -> Reply {
    let Ok(traversal) = parse(gremlin) else {
        return unsupported(format!("unparsable {gremlin}"));
    };
    let readable: Option<Vec<String>> = traversal.strategy().map(|s| {
        s.read_partitions
            .iter()
            .filter_map(|lit| lit.as_str().map(str::to_string))
            .collect()
    });
    let visible = |p: &Person| readable.as_ref().is_none_or(|r| r.iter().any(|v| v == p.first_name));

    let mut current: Vec<&Person> = Vec::new();
    for step in &traversal.steps {
        let args: Vec<&str> = step.args.iter().filter_map(Arg::as_str).collect();
        current = match (step.kind, args.as_slice()) {
            (StepKind::V, ids) => GRAPH
                .iter()
                .filter(|&p| visible(p) && (ids.is_empty() || ids.contains(&p.id)))
                .collect(),
            (StepKind::Has, ["firstName", value]) => {
                current.into_iter().filter(|p| p.first_name == *value).collect()
            }
            (StepKind::Has, ["id", value]) => current.into_iter().filter(|p| p.id == *value).collect(),
            (StepKind::HasLabel, ["person"]) => current,
            (StepKind::Out, ["knows"]) => current
                .iter()
                .flat_map(|p| p.knows.iter())
                .filter_map(|id| GRAPH.iter().find(|q| q.id == *id))
                .filter(|&q| visible(q))
                .collect(),
            (kind, args) => return unsupported(format!("{kind:?}{args:?}")),
        };
    }
    Reply::Records(
        current
            .iter()
            .map(|p| record(json!({"id": p.id, "firstName": p.first_name})))
            .collect(),
    )
}

fn client(service: &ScriptedService) -> GraphClient<ScriptedService> {
    service.answer_with(|request| evaluate(&request.gremlin));
    GraphClient::new(
        service.clone(),
        PartitionKeyDescriptor::partitioned("firstName"),
        Arc::new(PartitionCatalog::new(
            GRAPH.iter().map(|p| PartitionValue::from(p.first_name)),
        )),
        EngineConfig::default(),
    )
}

async fn ids(client: &GraphClient<ScriptedService>, text: &str) -> Vec<String> {
    let mut ids: Vec<String> = client
        .collect(text)
        .await
        .unwrap()
        .iter()
        .filter_map(|r| r.property("id").and_then(Value::as_str).map(str::to_string))
        .collect();
    ids.sort();
    ids
}

#[tokio::test]
async fn out_step_reaches_neighbours_in_other_partitions() {
    let service = ScriptedService::new();
    let client = client(&service);

    let found = ids(&client, "g.V('thomas').out('knows').hasLabel('person')").await;
    assert_eq!(found, ["ben", "mary"]);
    assert_eq!(service.calls().len(), GRAPH.len());
}

#[tokio::test]
async fn two_hops_cross_two_partition_boundaries() {
    let service = ScriptedService::new();
    let client = client(&service);

    let found = ids(
        &client,
        "g.V('thomas').out('knows').hasLabel('person').out('knows').hasLabel('person')",
    )
    .await;
    assert_eq!(found, ["robin"]);
}

#[tokio::test]
async fn each_start_vertex_is_read_from_one_partition_only() {
    let service = ScriptedService::new();
    let client = client(&service);

    // one copy of thomas, not one per partition
    assert_eq!(ids(&client, "g.V('thomas')").await, ["thomas"]);
    assert_eq!(ids(&client, "g.V()").await, ["ben", "mary", "robin", "thomas"]);
}

#[tokio::test]
async fn explicit_strategy_still_confines_every_step() {
    let service = ScriptedService::new();
    let client = client(&service);

    let text = "g.withStrategies(PartitionStrategy.build().partitionKey('firstName').readPartitions('Thomas').create()).V('thomas').out('knows')";
    assert!(ids(&client, text).await.is_empty());
    assert_eq!(service.calls().len(), 1);
    assert_eq!(service.calls()[0].gremlin, text);
}
