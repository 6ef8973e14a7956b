//! In-memory message storage for a single queue or subscription.
//!
//! Three buckets: ready (FIFO), in-flight (handed to a receiver, awaiting
//! settlement), and the dead-letter sub-queue. All state is volatile and
//! lost on drop. Locks are held only for the individual bucket operation,
//! never across an await point.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

use crate::message::Message;

/// A message in the dead-letter sub-queue, with its disposition record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLettered {
    pub message: Message,
    pub reason: String,
    pub dead_lettered_at: DateTime<Utc>,
}

/// Bucket sizes at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub ready: usize,
    pub in_flight: usize,
    pub dead_lettered: usize,
}

pub(crate) struct MessageStore {
    ready: Mutex<VecDeque<Message>>,
    in_flight: Mutex<HashMap<String, Message>>,
    dead: Mutex<Vec<DeadLettered>>,
    notify: Notify,
}

impl MessageStore {
    pub(crate) fn new() -> Self {
        Self {
            ready: Mutex::new(VecDeque::new()),
            in_flight: Mutex::new(HashMap::new()),
            dead: Mutex::new(Vec::new()),
            notify: Notify::new(),
        }
    }

    pub(crate) fn push_ready(&self, message: Message) {
        self.ready.lock().expect("ready bucket poisoned").push_back(message);
        self.notify.notify_one();
    }

    /// Requeue at the head so an abandoned message is redelivered before
    /// newer traffic.
    pub(crate) fn push_front(&self, message: Message) {
        self.ready.lock().expect("ready bucket poisoned").push_front(message);
        self.notify.notify_one();
    }

    pub(crate) fn pop_ready(&self) -> Option<Message> {
        self.ready.lock().expect("ready bucket poisoned").pop_front()
    }

    /// Park a delivered message until the receiver settles it.
    pub(crate) fn hold(&self, message: Message) {
        self.in_flight
            .lock()
            .expect("in-flight bucket poisoned")
            .insert(message.message_id.clone(), message);
    }

    /// Take a message out of the in-flight bucket, if it is there.
    pub(crate) fn settle(&self, message_id: &str) -> Option<Message> {
        self.in_flight
            .lock()
            .expect("in-flight bucket poisoned")
            .remove(message_id)
    }

    pub(crate) fn push_dead(&self, message: Message, reason: String, now: DateTime<Utc>) {
        self.dead.lock().expect("dead-letter bucket poisoned").push(DeadLettered {
            message,
            reason,
            dead_lettered_at: now,
        });
    }

    /// Snapshot of the dead-letter sub-queue for inspection.
    pub(crate) fn dead_letters(&self) -> Vec<DeadLettered> {
        self.dead.lock().expect("dead-letter bucket poisoned").clone()
    }

    pub(crate) fn stats(&self) -> StoreStats {
        StoreStats {
            ready: self.ready.lock().expect("ready bucket poisoned").len(),
            in_flight: self
                .in_flight
                .lock()
                .expect("in-flight bucket poisoned")
                .len(),
            dead_lettered: self.dead.lock().expect("dead-letter bucket poisoned").len(),
        }
    }

    /// Resolves when a message may have become ready since the last poll.
    pub(crate) async fn ready_signal(&self) {
        self.notify.notified().await;
    }
}
