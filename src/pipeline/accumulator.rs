//! Ordered, duplicate-free record accumulator.

use std::collections::HashSet;

use crate::models::{Harvested, ItemId, StoredRecord};

/// Records of one run in processing order, unique by item id.
#[derive(Debug, Clone)]
pub struct Accumulator<T> {
    records: Vec<StoredRecord<T>>,
    ids: HashSet<ItemId>,
}

impl<T: Harvested> Default for Accumulator<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            ids: HashSet::new(),
        }
    }
}

impl<T: Harvested> Accumulator<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from checkpointed records, dropping later duplicates.
    pub fn from_records(records: Vec<StoredRecord<T>>) -> Self {
        let mut acc = Self::new();
        for record in records {
            acc.push(record);
        }
        acc
    }

    /// Append unless the id is already present. Returns whether it was added.
    pub fn push(&mut self, record: StoredRecord<T>) -> bool {
        if !self.ids.insert(record.item_id().to_string()) {
            return false;
        }
        self.records.push(record);
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[StoredRecord<T>] {
        &self.records
    }

    pub fn into_records(self) -> Vec<StoredRecord<T>> {
        self.records
    }
}
