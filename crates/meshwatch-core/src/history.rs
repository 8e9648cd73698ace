//! Bounded FIFO of recent messages.

use std::collections::VecDeque;

use meshwatch_types::{MessageId, MessageRecord};

/// Default number of messages retained.
pub const MAX_MESSAGES: usize = 50;

/// Insertion-ordered ring of the most recent messages.
///
/// Appending to a full ring evicts the oldest entry first.
#[derive(Debug, Clone)]
pub struct HistoryRing {
    entries: VecDeque<MessageRecord>,
    capacity: usize,
}

impl HistoryRing {
    /// Create a ring holding at most `capacity` messages (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a message. Returns the evicted message, if the ring was full.
    pub fn append(&mut self, message: MessageRecord) -> Option<MessageRecord> {
        let evicted = if self.entries.len() >= self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(message);
        evicted
    }

    /// Messages in order, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &MessageRecord> {
        self.entries.iter()
    }

    /// Copy of the contents, oldest first.
    pub fn snapshot(&self) -> Vec<MessageRecord> {
        self.entries.iter().cloned().collect()
    }

    /// Remove the first message with `id`. Returns it, or `None` when no
    /// message has that id.
    pub fn delete_by_id(&mut self, id: MessageId) -> Option<MessageRecord> {
        let index = self.entries.iter().position(|m| m.id == Some(id))?;
        self.entries.remove(index)
    }

    /// Drop every message. Returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.entries.len();
        self.entries.clear();
        removed
    }

    /// Number of stored messages.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the ring is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of stored messages.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for HistoryRing {
    fn default() -> Self {
        Self::with_capacity(MAX_MESSAGES)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn numbered(n: usize) -> MessageRecord {
        MessageRecord {
            id: Some(MessageId::new()),
            body: Some(format!("message {n}")),
            ..MessageRecord::empty(String::from("t"))
        }
    }

    fn bodies(ring: &HistoryRing) -> Vec<String> {
        ring.iter().filter_map(|m| m.body.clone()).collect()
    }

    #[test]
    fn fifty_first_append_evicts_oldest() {
        let mut ring = HistoryRing::default();
        for n in 0..=MAX_MESSAGES {
            ring.append(numbered(n));
        }

        assert_eq!(ring.len(), MAX_MESSAGES);
        let expected: Vec<String> = (1..=MAX_MESSAGES).map(|n| format!("message {n}")).collect();
        assert_eq!(bodies(&ring), expected);
    }

    #[test]
    fn never_exceeds_capacity() {
        let mut ring = HistoryRing::with_capacity(3);
        for n in 0..500 {
            ring.append(numbered(n));
            assert!(ring.len() <= 3);
        }
        assert_eq!(bodies(&ring), ["message 497", "message 498", "message 499"]);
    }

    #[test]
    fn append_reports_eviction() {
        let mut ring = HistoryRing::with_capacity(1);
        assert!(ring.append(numbered(0)).is_none());
        let evicted = ring.append(numbered(1)).unwrap();
        assert_eq!(evicted.body.as_deref(), Some("message 0"));
    }

    #[test]
    fn delete_unknown_id_leaves_ring_unchanged() {
        let mut ring = HistoryRing::default();
        ring.append(numbered(0));
        ring.append(numbered(1));
        let before = ring.snapshot();

        assert!(ring.delete_by_id(MessageId::new()).is_none());
        assert_eq!(ring.snapshot(), before);
    }

    #[test]
    fn delete_known_id_removes_only_that_message() {
        let mut ring = HistoryRing::default();
        let target = numbered(1);
        let id = target.id.unwrap();
        ring.append(numbered(0));
        ring.append(target);
        ring.append(numbered(2));

        assert!(ring.delete_by_id(id).is_some());
        assert_eq!(bodies(&ring), ["message 0", "message 2"]);
    }

    #[test]
    fn clear_reports_count() {
        let mut ring = HistoryRing::default();
        ring.append(numbered(0));
        ring.append(numbered(1));
        assert_eq!(ring.clear(), 2);
        assert!(ring.is_empty());
    }
}
