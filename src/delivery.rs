//! Per-message delivery attempt tracking.
//!
//! Attempt counts are kept in a concurrent map of per-entry atomic
//! counters, so concurrent receivers on the same entity never contend on
//! a global lock. State for a message id is dropped on terminal
//! disposition via [`DeliveryTracker::forget`], which bounds memory to
//! the in-flight working set.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Classification of a single delivery attempt.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum DeliveryOutcome {
    /// First hand-off of this message
    FirstDelivery,
    /// A repeat attempt within the configured maximum
    Redeliver,
    /// The attempt pushed the count past the maximum; the message must
    /// be dead-lettered instead of delivered
    DeadLetter,
}

/// Tracks delivery attempts per message id.
///
/// An id that has never been seen is simply at count zero; recording an
/// attempt for it lazily initializes the entry. None of the operations
/// here can fail.
pub struct DeliveryTracker {
    attempts: papaya::HashMap<String, Arc<AtomicU32>>,
    max_delivery_count: u32,
}

impl DeliveryTracker {
    /// `max_delivery_count` must already be validated non-zero by the
    /// entity options layer.
    pub fn new(max_delivery_count: u32) -> Self {
        Self {
            attempts: papaya::HashMap::new(),
            max_delivery_count,
        }
    }

    pub fn max_delivery_count(&self) -> u32 {
        self.max_delivery_count
    }

    /// Record one delivery attempt for `message_id` and classify it.
    ///
    /// The count becomes 1 on the first attempt after creation or after
    /// a [`DeliveryTracker::forget`]. The outcome is `DeadLetter` iff
    /// the new count exceeds the configured maximum.
    pub fn record_attempt(&self, message_id: &str) -> DeliveryOutcome {
        let counter = {
            let attempts = self.attempts.pin();
            attempts
                .get_or_insert_with(message_id.to_owned(), || Arc::new(AtomicU32::new(0)))
                .clone()
        };

        let count = counter.fetch_add(1, Ordering::SeqCst) + 1;

        if count > self.max_delivery_count {
            DeliveryOutcome::DeadLetter
        } else if count == 1 {
            DeliveryOutcome::FirstDelivery
        } else {
            DeliveryOutcome::Redeliver
        }
    }

    /// Current attempt count for `message_id`; zero for unknown ids.
    pub fn attempts(&self, message_id: &str) -> u32 {
        self.attempts
            .pin()
            .get(message_id)
            .map(|counter| counter.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Drop tracking state on terminal disposition (ack or dead-letter).
    ///
    /// A subsequent [`DeliveryTracker::record_attempt`] for the same id
    /// starts over at count 1.
    pub fn forget(&self, message_id: &str) {
        self.attempts.pin().remove(message_id);
    }
}
