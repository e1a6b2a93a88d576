// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The query walkthroughs run by the console programs.

use grove_query::PartitionValue;

/// How a case is expected to end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    /// Runs and prints its records.
    Success,
    /// Rejected before submission for lacking the partition key.
    MissingPartitionKey,
}

/// One named query of a walkthrough.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryCase {
    /// Label printed before the query.
    pub name: String,
    /// Gremlin text.
    pub text: String,
    /// Expected outcome.
    pub expect: Expect,
}

impl QueryCase {
    fn ok(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            expect: Expect::Success,
        }
    }
}

const ADD_THOMAS: &str =
    "g.addV('person').property('id', 'thomas').property('firstName', 'Thomas').property('age', 44)";

const GET_STARTED: &[(&str, &str)] = &[
    ("Cleanup", "g.V().drop()"),
    ("AddVertex 1", ADD_THOMAS),
    ("AddVertex 2", "g.addV('person').property('id', 'mary').property('firstName', 'Mary').property('lastName', 'Andersen').property('age', 39)"),
    ("AddVertex 3", "g.addV('person').property('id', 'ben').property('firstName', 'Ben').property('lastName', 'Miller')"),
    ("AddVertex 4", "g.addV('person').property('id', 'robin').property('firstName', 'Robin').property('lastName', 'Wakefield')"),
    ("AddEdge 1", "g.V().has('id','thomas').addE('knows').to(g.V().has('id','mary'))"),
    ("AddEdge 2", "g.V().has('id','thomas').addE('knows').to(g.V().has('id','ben'))"),
    ("AddEdge 3", "g.V().has('id','ben').addE('knows').to(g.V().has('id','robin'))"),
    ("UpdateVertex", "g.V().has('id','thomas').property('age', 44)"),
    ("CountVertices", "g.V().count()"),
    ("Filter Range", "g.V().hasLabel('person').has('age', gt(40))"),
    ("Project", "g.V().hasLabel('person').values('firstName')"),
    ("Sort", "g.V().hasLabel('person').order().by('firstName', decr)"),
    ("Traverse", "g.V().has('id','thomas').out('knows').hasLabel('person')"),
    ("Traverse 2x", "g.V().has('id','thomas').out('knows').hasLabel('person').out('knows').hasLabel('person')"),
    ("Loop", "g.V().has('id','thomas').repeat(out()).until(has('id', 'robin')).path()"),
    ("DropEdge", "g.V().has('id','thomas').outE('knows').where(inV().has('id', 'mary')).drop()"),
    ("CountEdges", "g.E().count()"),
    ("DropVertex", "g.V().has('id','thomas').drop()"),
];

/// Partition values the partitioned walkthrough writes.
pub const DEMO_PARTITIONS: [&str; 4] = ["Thomas", "Mary", "Ben", "Robin"];

/// Partition key the partitioned walkthrough is written against.
pub const DEMO_PARTITION_KEY: &str = "firstName";

/// Non-partitioned walkthrough, ending with an add-vertex that returns its `valueMap()`.
pub fn get_started() -> Vec<QueryCase> {
    let mut cases: Vec<_> = GET_STARTED
        .iter()
        .map(|(name, text)| QueryCase::ok(*name, *text))
        .collect();
    cases.push(QueryCase::ok(
        "Add Vertex with valueMap",
        format!("{ADD_THOMAS}.valueMap()"),
    ));
    cases
}

/// Partition-aware walkthrough.
///
/// Whole-graph drops are issued once per partition in `known`, each scoped
/// with a `PartitionStrategy`, since an unscoped drop cannot name its
/// partition.
pub fn partitioned(key: &str, known: &[PartitionValue]) -> Vec<QueryCase> {
    let scoped_drops = |label: &str| -> Vec<QueryCase> {
        known
            .iter()
            .map(|value| {
                QueryCase::ok(
                    format!("{label} {value}"),
                    format!(
                        "g.withStrategies(PartitionStrategy.build().partitionKey('{key}').readPartitions({}).create()).V().drop()",
                        value.to_literal()
                    ),
                )
            })
            .collect()
    };

    let mut cases = scoped_drops("Cleanup");
    cases.push(QueryCase {
        name: "Failed AddVertex 1".into(),
        text: "g.addV('person').property('id', 'thomas').property('age', 44)".into(),
        expect: Expect::MissingPartitionKey,
    });
    cases.extend(
        [
            ("AddVertex 1", ADD_THOMAS.to_string()),
            ("AddVertex 2", "g.addV('person').property('id', 'mary').property('firstName', 'Mary').property('lastName', 'Andersen').property('age', 39)".into()),
            ("AddVertex 3", "g.addV('person').property('id', 'ben').property('firstName', 'Ben').property('lastName', 'Miller')".into()),
            ("AddVertex 4", "g.addV('person').property('id', 'robin').property('firstName', 'Robin').property('lastName', 'Wakefield')".into()),
            ("Fetch Node 1", "g.V('thomas')".into()),
            ("Fetch Node 2", "g.V('thomas').has('firstName', 'Thomas')".into()),
            ("Fetch Node 3", "g.V().has('id','thomas').has('firstName', 'Thomas')".into()),
            ("Fetch Node 4", format!("g.withStrategies(PartitionStrategy.build().partitionKey('{key}').readPartitions('Thomas').create()).V('thomas')")),
            ("AddEdge 1", "g.V(['Thomas','thomas']).addE('knows').to(g.V(['Mary','mary']))".into()),
            ("AddEdge 2", "g.V(['Thomas','thomas']).addE('knows').to(g.V(['Ben','ben']))".into()),
            ("AddEdge 3", "g.V(['Ben','ben']).addE('knows').to(g.V(['Robin','robin']))".into()),
            ("UpdateVertex", "g.V(['Thomas','thomas']).property('age', 44)".into()),
            ("CountVertices", "g.V().count()".into()),
            ("Filter Range", "g.V().hasLabel('person').has('age', gt(40))".into()),
            ("Project", "g.V().hasLabel('person').values('firstName')".into()),
            ("Sort", "g.V().hasLabel('person').order().by('firstName', decr)".into()),
            ("Traverse OUT", "g.V(['Thomas','thomas']).out('knows').hasLabel('person')".into()),
            ("Traverse IN", "g.V(['Ben','ben']).in('knows').hasLabel('person')".into()),
            ("Traverse 2x", "g.V('thomas').out('knows').hasLabel('person').out('knows').hasLabel('person')".into()),
            ("Loop", "g.V('thomas').repeat(out()).until(has('id', 'robin')).path()".into()),
            ("DropEdge", "g.V(['Thomas','thomas']).outE('knows').where(inV().has('id', 'mary')).drop()".into()),
            ("CountEdges", "g.E().count()".into()),
            ("DropVertex", "g.V(['Thomas','thomas']).drop()".into()),
        ]
        .into_iter()
        .map(|(name, text)| QueryCase::ok(name, text)),
    );
    cases.extend(scoped_drops("DropGraph"));
    cases
}
