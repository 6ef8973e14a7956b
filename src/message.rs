//! Message types and delivery metadata.
//!
//! Messages are the unit of data flowing through queues and topic
//! subscriptions. Each message carries a unique ID, an optional set of
//! correlation properties used for subscription routing, a body, and
//! arbitrary key-value application properties.
//!
//! # Message Lifecycle
//!
//! 1. A sender builds a message and hands it to a queue or topic
//! 2. The engine stamps `enqueued_at` (and `expires_at` when the entity
//!    has a default TTL) at send time
//! 3. Each hand-off to a receiver bumps `delivery_count`
//! 4. The message is destroyed on acknowledgment, or moved to the
//!    dead-letter sub-queue on terminal failure

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A message in the queue/subscription system.
///
/// The seven optional correlation properties mirror the fields a
/// correlation filter can constrain; a property left `None` simply never
/// satisfies a constrained filter field and imposes nothing otherwise.
///
/// `message_id` is unique per send. Senders that do not supply one get a
/// generated v4 UUID from the builder default.
#[derive(Debug, Clone, Serialize, Deserialize, bon::Builder)]
#[builder(on(String, into))]
#[serde(default)]
pub struct Message {
    /// Unique identifier for the message
    #[builder(default = uuid::Uuid::new_v4().to_string())]
    pub message_id: String,

    /// MIME content type of the body
    pub content_type: Option<String>,
    /// Application-defined correlation identifier
    pub correlation_id: Option<String>,
    /// Application-defined subject (label)
    pub subject: Option<String>,
    /// Address to reply to
    pub reply_to: Option<String>,
    /// Session to reply to
    pub reply_to_session_id: Option<String>,
    /// Session this message belongs to
    pub session_id: Option<String>,
    /// Intended destination address
    pub send_to: Option<String>,

    /// The message content
    #[builder(default)]
    pub body: String,

    /// Arbitrary key-value pairs associated with the message
    #[builder(default)]
    pub kv: HashMap<String, String>,

    /// Timestamp stamped by the engine when the message was accepted
    /// onto an entity
    #[builder(skip)]
    pub enqueued_at: Option<DateTime<Utc>>,

    /// Absolute expiry; past this instant the message is subject to the
    /// owning entity's expiration policy
    pub expires_at: Option<DateTime<Utc>>,

    /// Number of delivery attempts made; never decreases
    #[builder(skip)]
    pub delivery_count: u32,
}

impl Message {
    /// Whether the message's time-to-live has elapsed at `now`.
    ///
    /// Messages without an `expires_at` never expire.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

impl Default for Message {
    fn default() -> Self {
        Self::builder().build()
    }
}
