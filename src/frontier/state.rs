//! The set of item ids seen so far.

use std::collections::HashSet;

use crate::models::ItemId;

/// Monotonically growing id set that remembers insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrontierState {
    order: Vec<ItemId>,
    seen: HashSet<ItemId>,
    /// Size at the start of the current round.
    round_start: usize,
}

impl FrontierState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from previously saved ids; duplicates are dropped.
    pub fn from_ids<I>(ids: I) -> Self
    where
        I: IntoIterator<Item = ItemId>,
    {
        let mut state = Self::new();
        state.insert_all(ids);
        state.round_start = state.len();
        state
    }

    /// Add ids, returning how many were new.
    pub fn insert_all<I>(&mut self, ids: I) -> usize
    where
        I: IntoIterator<Item = ItemId>,
    {
        let before = self.order.len();
        for id in ids {
            if self.seen.insert(id.clone()) {
                self.order.push(id);
            }
        }
        self.order.len() - before
    }

    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// All ids in insertion order.
    pub fn ids(&self) -> &[ItemId] {
        &self.order
    }

    /// Ids added at or after position `cursor`.
    pub fn since(&self, cursor: usize) -> &[ItemId] {
        &self.order[cursor.min(self.order.len())..]
    }

    /// Mark the start of a round.
    pub fn begin_round(&mut self) {
        self.round_start = self.order.len();
    }

    pub fn round_start(&self) -> usize {
        self.round_start
    }

    /// Ids added since [`begin_round`](Self::begin_round).
    pub fn round_delta(&self) -> &[ItemId] {
        self.since(self.round_start)
    }

    /// Ids to persist, leaving out ones whose processing has not started.
    pub fn snapshot_excluding(&self, outstanding: &[ItemId]) -> Vec<ItemId> {
        if outstanding.is_empty() {
            return self.order.clone();
        }
        let skip: HashSet<&str> = outstanding.iter().map(String::as_str).collect();
        self.order
            .iter()
            .filter(|id| !skip.contains(id.as_str()))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(items: &[&str]) -> Vec<ItemId> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_insert_all_counts_new_only() {
        let mut state = FrontierState::new();
        assert_eq!(state.insert_all(ids(&["A1", "A2", "A1"])), 2);
        assert_eq!(state.insert_all(ids(&["A2", "A3"])), 1);
        assert_eq!(state.insert_all(ids(&["A1"])), 0);
        assert_eq!(state.ids(), &ids(&["A1", "A2", "A3"])[..]);
    }

    #[test]
    fn test_round_delta() {
        let mut state = FrontierState::from_ids(ids(&["1", "2"]));
        assert_eq!(state.round_start(), 2);
        state.begin_round();
        state.insert_all(ids(&["2", "3", "4"]));
        assert_eq!(state.round_delta(), &ids(&["3", "4"])[..]);
        state.begin_round();
        assert!(state.round_delta().is_empty());
    }

    #[test]
    fn test_since_clamps() {
        let state = FrontierState::from_ids(ids(&["1"]));
        assert!(state.since(5).is_empty());
        assert_eq!(state.since(0), &ids(&["1"])[..]);
    }

    #[test]
    fn test_snapshot_excluding() {
        let state = FrontierState::from_ids(ids(&["1", "2", "3", "4"]));
        assert_eq!(state.snapshot_excluding(&ids(&["3", "4"])), ids(&["1", "2"]));
        assert_eq!(state.snapshot_excluding(&[]), ids(&["1", "2", "3", "4"]));
    }
}
