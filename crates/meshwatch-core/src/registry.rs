//! Subscriber registry with admission control.
//!
//! Tracks which subscribers are currently connected and refuses new ones
//! once the configured limit is reached. A refused subscriber leaves the
//! registry untouched.

use std::collections::BTreeSet;

/// Default maximum number of concurrent subscribers.
pub const MAX_SUBSCRIBERS: usize = 100;

/// Handle for an admitted subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(u64);

impl core::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Returned when a subscriber cannot be admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AdmissionError {
    /// The registry already holds the maximum number of subscribers.
    #[error("subscriber limit reached ({limit})")]
    AtCapacity {
        /// The configured limit.
        limit: usize,
    },
}

/// Set of connected subscribers.
#[derive(Debug, Clone)]
pub struct SubscriberRegistry {
    active: BTreeSet<SubscriberId>,
    next_id: u64,
    capacity: usize,
}

impl SubscriberRegistry {
    /// Create a registry admitting at most `capacity` subscribers.
    pub const fn with_capacity(capacity: usize) -> Self {
        Self {
            active: BTreeSet::new(),
            next_id: 0,
            capacity,
        }
    }

    /// Admit a new subscriber.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::AtCapacity`] when the limit is reached.
    pub fn admit(&mut self) -> Result<SubscriberId, AdmissionError> {
        if self.active.len() >= self.capacity {
            return Err(AdmissionError::AtCapacity {
                limit: self.capacity,
            });
        }
        let id = SubscriberId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.active.insert(id);
        Ok(id)
    }

    /// Deregister a subscriber. Returns `false` if it was not registered.
    pub fn release(&mut self, id: SubscriberId) -> bool {
        self.active.remove(&id)
    }

    /// Whether `id` is currently registered.
    pub fn contains(&self, id: SubscriberId) -> bool {
        self.active.contains(&id)
    }

    /// Number of connected subscribers.
    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// Whether no subscriber is connected.
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Whether the next admission would be refused.
    pub fn is_full(&self) -> bool {
        self.active.len() >= self.capacity
    }

    /// The admission limit.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::with_capacity(MAX_SUBSCRIBERS)
    }
}
