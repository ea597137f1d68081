/// Ordered record store keyed by car ID
///
/// Uses Rust's `BTreeMap` as the balanced tree: O(log n) upsert and
/// ascending traversal in key order. There is no delete operation.

use crate::types::{CarRecord, QueryError};
use std::collections::BTreeMap;
use std::ops::ControlFlow;

#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    tree: BTreeMap<i32, CarRecord>,
}

impl RecordStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace by ID. Returns the record that was replaced, if any;
    /// the count only grows for new IDs.
    pub fn upsert(&mut self, record: CarRecord) -> Option<CarRecord> {
        self.tree.insert(record.id, record)
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.tree.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: i32) -> Option<&CarRecord> {
        self.tree.get(&id)
    }

    /// Visit records in strictly increasing ID order.
    ///
    /// Stops as soon as the visitor breaks; returns the break value in that case.
    pub fn ascend<B, F>(&self, mut visitor: F) -> ControlFlow<B>
    where
        F: FnMut(&CarRecord) -> ControlFlow<B>,
    {
        for record in self.tree.values() {
            visitor(record)?;
        }
        ControlFlow::Continue(())
    }

    /// Flat copy of the store in ascending ID order
    ///
    /// Allocation is fallible so a huge store reports `OutOfMemory`
    /// instead of aborting the process.
    pub fn snapshot(&self) -> Result<Vec<CarRecord>, QueryError> {
        let mut records = Vec::new();
        records.try_reserve_exact(self.tree.len())?;
        records.extend(self.tree.values().cloned());
        Ok(records)
    }
}

impl FromIterator<CarRecord> for RecordStore {
    fn from_iter<I: IntoIterator<Item = CarRecord>>(iter: I) -> Self {
        let mut store = Self::new();
        store.extend(iter);
        store
    }
}

impl Extend<CarRecord> for RecordStore {
    fn extend<I: IntoIterator<Item = CarRecord>>(&mut self, iter: I) {
        for record in iter {
            self.upsert(record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn car(id: i32, model: &str) -> CarRecord {
        CarRecord::new(id, model, 2020, "Red", 1000 + id, "Dealer")
    }

    #[test]
    fn test_ascend_is_strictly_increasing() {
        let store: RecordStore = [42, 7, 19, -3, 100, 8]
            .into_iter()
            .map(|id| car(id, "M"))
            .collect();

        let mut seen = Vec::new();
        let flow: ControlFlow<()> = store.ascend(|r| {
            seen.push(r.id);
            ControlFlow::Continue(())
        });

        assert!(flow.is_continue());
        assert_eq!(seen, vec![-3, 7, 8, 19, 42, 100]);
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_upsert_replaces_without_growing() {
        let mut store = RecordStore::new();
        assert!(store.upsert(car(1, "Civic")).is_none());
        assert!(store.upsert(car(2, "Camry")).is_none());
        assert_eq!(store.count(), 2);

        let replaced = store.upsert(car(1, "Accord"));
        assert_eq!(replaced.map(|r| r.model), Some("Civic".to_string()));
        assert_eq!(store.count(), 2);
        assert_eq!(store.get(1).map(|r| r.model.as_str()), Some("Accord"));
    }

    #[test]
    fn test_count_matches_distinct_ids() {
        let ids = [5, 3, 5, 9, 3, 1, 9, 9];
        let store: RecordStore = ids.into_iter().map(|id| car(id, "M")).collect();
        assert_eq!(store.count(), 4);
    }

    #[test]
    fn test_ascend_stops_early() {
        let store: RecordStore = (1..=10).map(|id| car(id, "M")).collect();
        let mut visited = 0;
        let flow = store.ascend(|r| {
            visited += 1;
            if r.id == 4 {
                ControlFlow::Break(r.id)
            } else {
                ControlFlow::Continue(())
            }
        });
        assert_eq!(flow, ControlFlow::Break(4));
        assert_eq!(visited, 4);
    }

    #[test]
    fn test_snapshot_is_ascending_copy() {
        let store: RecordStore = [3, 1, 2].into_iter().map(|id| car(id, "M")).collect();
        let snapshot = store.snapshot().unwrap();
        let ids: Vec<i32> = snapshot.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
