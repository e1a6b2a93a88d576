// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Known partition values of the target collection.

use grove_query::PartitionValue;
use std::sync::{PoisonError, RwLock};
use tracing::info;

/// The partition values fan-out queries are sent to.
///
/// Seeded from configuration and extended whenever an add-vertex scoped to a
/// new value succeeds. Values keep their insertion order.
#[derive(Debug, Default)]
pub struct PartitionCatalog {
    values: RwLock<Vec<PartitionValue>>,
}

impl PartitionCatalog {
    /// Catalog seeded with `values` (duplicates dropped).
    pub fn new(values: impl IntoIterator<Item = PartitionValue>) -> Self {
        let catalog = Self::default();
        for value in values {
            catalog.learn(value);
        }
        catalog
    }

    /// Record a value; returns `true` if it was new.
    pub fn learn(&self, value: PartitionValue) -> bool {
        let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
        if values.contains(&value) {
            return false;
        }
        info!(partition = %value, "learned partition");
        values.push(value);
        true
    }

    /// Snapshot of the known values.
    pub fn snapshot(&self) -> Vec<PartitionValue> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of known values.
    pub fn len(&self) -> usize {
        self.values.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether no value is known.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn learn_deduplicates_and_keeps_order() {
        let catalog = PartitionCatalog::new(["Thomas", "Mary", "Thomas"].map(PartitionValue::from));
        assert_eq!(catalog.len(), 2);
        assert!(catalog.learn(PartitionValue::from("Ben")));
        assert!(!catalog.learn(PartitionValue::from("Mary")));
        assert_eq!(
            catalog.snapshot(),
            ["Thomas", "Mary", "Ben"].map(PartitionValue::from).to_vec()
        );
    }
}
