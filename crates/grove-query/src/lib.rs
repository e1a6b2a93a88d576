// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Gremlin traversal compiler for Grove.
//!
//! Turns query text into a [`TraversalQuery`]: a parsed op sequence plus the
//! facts the router and aggregator need (partition evidence, ordering,
//! count/limit shape). Compilation is pure; nothing here touches the network.
//!
//! ```
//! use grove_query::{compile, PartitionKeyDescriptor};
//!
//! let pk = PartitionKeyDescriptor::partitioned("firstName");
//! let q = compile("g.V().has('firstName', 'Thomas').out('knows')", &pk).unwrap();
//! assert!(!q.evidence().filter_values.is_empty());
//! ```

pub mod ast;
mod error;
pub mod evidence;
mod lexer;
mod parser;
mod render;
pub mod shape;

use serde::{Deserialize, Serialize};

pub use ast::{PartitionStrategy, PartitionValue, Traversal};
pub use error::CompileError;
pub use evidence::PartitionEvidence;
pub use parser::parse;
pub use shape::{OrderSpec, ResultShape, SortDirection, SortKey};

/// The partition key of the target collection: absent for unpartitioned
/// collections, otherwise a single top-level property name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartitionKeyDescriptor {
    key: Option<String>,
}

impl PartitionKeyDescriptor {
    /// Descriptor for an unpartitioned collection.
    pub fn unpartitioned() -> Self {
        Self { key: None }
    }

    /// Descriptor for a collection partitioned on `key` (without the leading `/`).
    pub fn partitioned(key: impl Into<String>) -> Self {
        let key = key.into();
        let key = key.trim_start_matches('/').to_string();
        Self { key: Some(key) }
    }

    /// Parse a store path such as `/firstName`; an empty path means unpartitioned.
    pub fn from_path(path: &str) -> Self {
        let key = path.trim_start_matches('/');
        if key.is_empty() {
            Self::unpartitioned()
        } else {
            Self::partitioned(key)
        }
    }

    /// Property name, if partitioned.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Whether the collection is partitioned.
    pub fn is_partitioned(&self) -> bool {
        self.key.is_some()
    }

    /// Store path form (`/firstName`), if partitioned.
    pub fn path(&self) -> Option<String> {
        self.key.as_ref().map(|k| format!("/{k}"))
    }
}

/// A compiled traversal: the original text plus its parsed form and the
/// partition evidence found for the collection's key.
#[derive(Debug, Clone, PartialEq)]
pub struct TraversalQuery {
    text: String,
    traversal: Traversal,
    evidence: PartitionEvidence,
}

impl TraversalQuery {
    /// The source text as submitted.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Parsed traversal.
    pub fn traversal(&self) -> &Traversal {
        &self.traversal
    }

    /// Partition values named by the traversal (empty when unpartitioned).
    pub fn evidence(&self) -> &PartitionEvidence {
        &self.evidence
    }

    /// Whether the traversal creates or removes elements.
    pub fn is_mutating(&self) -> bool {
        self.traversal.is_mutating()
    }

    /// Guaranteed output ordering, if any.
    pub fn order_spec(&self) -> Option<OrderSpec> {
        shape::order_spec(&self.traversal)
    }

    /// Whether the traversal ends in `count()`.
    pub fn is_count(&self) -> bool {
        shape::is_count(&self.traversal)
    }

    /// Trailing `limit`/`range` bound.
    pub fn result_limit(&self) -> Option<usize> {
        shape::result_limit(&self.traversal)
    }

    /// Records skipped by a trailing `range(lo, hi)`.
    pub fn result_offset(&self) -> usize {
        shape::result_offset(&self.traversal)
    }

    /// Record shape.
    pub fn result_shape(&self) -> ResultShape {
        shape::result_shape(&self.traversal)
    }

    /// Canonical Gremlin text for the traversal.
    pub fn canonical_text(&self) -> String {
        self.traversal.to_string()
    }
}

/// Compile `text` against a collection whose partition key is `pk`.
///
/// Syntax errors carry the byte offset of the offending token. On a
/// partitioned collection, mutations that cannot be placed are rejected with
/// [`CompileError::MissingPartitionKey`].
pub fn compile(text: &str, pk: &PartitionKeyDescriptor) -> Result<TraversalQuery, CompileError> {
    let traversal = parse(text)?;
    let evidence = match pk.key() {
        Some(key) => {
            evidence::check_partition_key(&traversal, key)?;
            evidence::partition_evidence(&traversal, key)?
        }
        None => PartitionEvidence::default(),
    };
    Ok(TraversalQuery {
        text: text.to_string(),
        traversal,
        evidence,
    })
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_paths() {
        assert_eq!(
            PartitionKeyDescriptor::from_path("/firstName").key(),
            Some("firstName")
        );
        assert!(!PartitionKeyDescriptor::from_path("").is_partitioned());
        assert_eq!(
            PartitionKeyDescriptor::partitioned("firstName").path().as_deref(),
            Some("/firstName")
        );
    }

    #[test]
    fn unpartitioned_collection_accepts_unscoped_mutation() {
        let q = compile("g.V().drop()", &PartitionKeyDescriptor::unpartitioned()).unwrap();
        assert!(q.is_mutating());
        assert!(q.evidence().is_empty());
    }

    #[test]
    fn partitioned_collection_rejects_unscoped_mutation() {
        let err = compile(
            "g.addV('person').property('id', 'x')",
            &PartitionKeyDescriptor::partitioned("firstName"),
        )
        .unwrap_err();
        assert_eq!(
            err,
            CompileError::MissingPartitionKey {
                key: "firstName".into()
            }
        );
    }
}
