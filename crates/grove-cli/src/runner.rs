// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Runs a walkthrough against a [`GraphClient`] and prints every record.

use crate::cases::{Expect, QueryCase};
use anyhow::{bail, Context, Result};
use grove_client::{GraphClient, GraphService, GroveError};
use grove_query::CompileError;
use std::io::Write;
use tracing::{info, warn};

/// Printed when a mutating query is rejected for lacking the partition key.
pub const MISSING_KEY_MESSAGE: &str = "Add Vertex failed, as partition key property was not specified while adding a vertex to a partitioned graph.";

/// Run every case in order, writing results to `out`.
///
/// Each case prints `Running <name>: <query>`, then one tab-indented JSON
/// line per record, then a blank line. Stops at the first unexpected outcome.
pub async fn run_cases<S, W>(client: &GraphClient<S>, cases: &[QueryCase], out: &mut W) -> Result<()>
where
    S: GraphService,
    W: Write + Send,
{
    for case in cases {
        writeln!(out, "Running {}: {}", case.name, case.text)?;
        match (client.collect(&case.text).await, case.expect) {
            (Ok(records), Expect::Success) => {
                info!(case = %case.name, records = records.len(), "case finished");
                for record in &records {
                    writeln!(out, "\t {}", serde_json::to_string(record.value())?)?;
                }
            }
            (Err(GroveError::Compile(CompileError::MissingPartitionKey { .. })), Expect::MissingPartitionKey) => {
                warn!(case = %case.name, "rejected without partition key");
                writeln!(out, "{MISSING_KEY_MESSAGE}")?;
            }
            (Ok(_), Expect::MissingPartitionKey) => {
                bail!("{} was expected to fail without a partition key but succeeded", case.name)
            }
            (Err(err), _) => return Err(err).with_context(|| format!("{} failed", case.name)),
        }
        writeln!(out)?;
    }
    Ok(())
}
