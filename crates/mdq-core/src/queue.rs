//! Pending-task queue ordered by priority, FIFO within a priority tier.

use std::collections::VecDeque;

use crate::model::{Priority, TaskId};

/// Ordered list of task ids waiting for a slot.
///
/// Entries are kept sorted by descending priority; a new id goes after the last
/// entry with priority >= its own, so equal priorities keep insertion order.
#[derive(Debug, Default, Clone)]
pub struct PriorityQueue {
    entries: VecDeque<(TaskId, Priority)>,
}

impl PriorityQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `id` at its priority position. No-op if `id` is already queued.
    /// Returns true if the id was inserted.
    pub fn insert(&mut self, id: &str, priority: Priority) -> bool {
        if self.contains(id) {
            return false;
        }
        let pos = self
            .entries
            .iter()
            .position(|(_, p)| *p < priority)
            .unwrap_or(self.entries.len());
        self.entries.insert(pos, (id.to_string(), priority));
        true
    }

    /// Remove and return the highest-priority, earliest-inserted id.
    pub fn pop_next(&mut self) -> Option<TaskId> {
        self.entries.pop_front().map(|(id, _)| id)
    }

    /// Remove and return the first id accepted by `eligible`, keeping the order of the rest.
    pub fn pop_first_where(&mut self, mut eligible: impl FnMut(&str) -> bool) -> Option<TaskId> {
        let pos = self.entries.iter().position(|(id, _)| eligible(id))?;
        self.entries.remove(pos).map(|(id, _)| id)
    }

    /// Remove `id` wherever it is. Returns true if it was present.
    pub fn remove(&mut self, id: &str) -> bool {
        match self.entries.iter().position(|(e, _)| e == id) {
            Some(pos) => {
                self.entries.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|(e, _)| e == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ids in admission order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(id, _)| id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(q: &mut PriorityQueue) -> Vec<String> {
        std::iter::from_fn(|| q.pop_next()).collect()
    }

    #[test]
    fn higher_priority_first_fifo_within_tier() {
        let mut q = PriorityQueue::new();
        q.insert("n1", Priority::Normal);
        q.insert("h1", Priority::High);
        q.insert("n2", Priority::Normal);
        q.insert("l1", Priority::Low);
        q.insert("u1", Priority::Urgent);
        q.insert("h2", Priority::High);
        assert_eq!(drain(&mut q), ["u1", "h1", "h2", "n1", "n2", "l1"]);
    }

    #[test]
    fn duplicate_insert_is_noop() {
        let mut q = PriorityQueue::new();
        assert!(q.insert("a", Priority::Low));
        assert!(!q.insert("a", Priority::Urgent));
        assert_eq!(q.len(), 1);
        assert_eq!(q.pop_next().as_deref(), Some("a"));
        assert!(q.is_empty());
    }

    #[test]
    fn remove_anywhere_and_absent() {
        let mut q = PriorityQueue::new();
        q.insert("a", Priority::Normal);
        q.insert("b", Priority::Normal);
        q.insert("c", Priority::Normal);
        assert!(q.remove("b"));
        assert!(!q.remove("b"));
        assert!(!q.remove("zzz"));
        assert_eq!(q.iter().collect::<Vec<_>>(), ["a", "c"]);
    }

    #[test]
    fn pop_first_where_skips_ineligible() {
        let mut q = PriorityQueue::new();
        q.insert("a", Priority::High);
        q.insert("b", Priority::Normal);
        q.insert("c", Priority::Normal);
        assert_eq!(q.pop_first_where(|id| id != "a").as_deref(), Some("b"));
        assert_eq!(q.iter().collect::<Vec<_>>(), ["a", "c"]);
        assert_eq!(q.pop_first_where(|_| false), None);
    }

    #[test]
    fn pop_empty() {
        let mut q = PriorityQueue::new();
        assert_eq!(q.pop_next(), None);
    }
}
