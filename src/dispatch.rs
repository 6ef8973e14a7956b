//! Dispatch: the per-message decision path for queues and subscriptions.
//!
//! Every message handed to a receiver goes `Received -> Evaluating ->
//! {Accepted, Redelivered, DeadLettered}`. Evaluation consults the rule
//! table first (an empty table is default pass-through; a populated table
//! with no match skips the message on this entity), then the delivery
//! tracker, which may override the outcome with dead-lettering.
//!
//! Expiry is an orthogonal policy checked before anything else: an
//! expired message never consumes a delivery attempt, and whether it is
//! dead-lettered or dropped depends only on the entity's
//! `dead_lettering_on_message_expiration` flag.

use std::sync::RwLock;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::delivery::{DeliveryOutcome, DeliveryTracker};
use crate::error::Error;
use crate::message::Message;
use crate::rule::{Rule, RuleAction, RuleTable};
use crate::store::{DeadLettered, MessageStore, StoreStats};

/// Why a message was moved to the dead-letter sub-queue.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum DeadLetterReason {
    MaxDeliveryExceeded,
    Expired,
}

/// Terminal decision for one pass of a message through the dispatcher.
#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    /// Hand the message to the receiver.
    Accepted {
        message: Message,
        delivery: DeliveryOutcome,
        /// Name of the matched rule; `None` for pass-through entities.
        rule: Option<String>,
    },
    /// No rule matched on a filtered entity; not delivered here. Routing
    /// the message elsewhere is the transport's concern.
    Skipped { message: Message },
    /// Move to the dead-letter sub-queue. Irreversible through this
    /// component.
    DeadLettered {
        message: Message,
        reason: DeadLetterReason,
    },
    /// TTL elapsed with expiration dead-lettering disabled; dropped.
    Expired { message: Message },
}

/// A message as handed to the worker's receive path.
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    pub message: Message,
    /// `FirstDelivery` or `Redeliver`; `DeadLetter` never reaches a
    /// receiver.
    pub delivery: DeliveryOutcome,
}

enum MatchDecision {
    PassThrough,
    NoMatch,
    Rule {
        name: String,
        action: Option<RuleAction>,
    },
}

/// Composes the rule table, the delivery tracker, and the expiry policy
/// into one decision per message.
///
/// The rule table is read-mostly: dispatch takes the read side, and
/// reconfiguration replaces the table wholesale through the write side
/// while the entity is quiesced.
pub struct Dispatcher {
    rules: RwLock<RuleTable>,
    tracker: DeliveryTracker,
    dead_letter_on_expiration: bool,
}

impl Dispatcher {
    pub fn new(
        rules: RuleTable,
        max_delivery_count: u32,
        dead_letter_on_expiration: bool,
    ) -> Self {
        Self {
            rules: RwLock::new(rules),
            tracker: DeliveryTracker::new(max_delivery_count),
            dead_letter_on_expiration,
        }
    }

    /// Run one message through the state machine.
    pub fn dispatch(&self, mut message: Message, now: DateTime<Utc>) -> DispatchOutcome {
        if message.is_expired(now) {
            self.tracker.forget(&message.message_id);
            if self.dead_letter_on_expiration {
                return DispatchOutcome::DeadLettered {
                    message,
                    reason: DeadLetterReason::Expired,
                };
            }
            return DispatchOutcome::Expired { message };
        }

        let matched = {
            let rules = self.rules.read().expect("rule table poisoned");
            if rules.is_empty() {
                MatchDecision::PassThrough
            } else {
                match rules.evaluate(&message) {
                    Some(rule) => MatchDecision::Rule {
                        name: rule.name.clone(),
                        action: rule.action.clone(),
                    },
                    None => MatchDecision::NoMatch,
                }
            }
        };

        let (rule, action) = match matched {
            MatchDecision::NoMatch => return DispatchOutcome::Skipped { message },
            MatchDecision::PassThrough => (None, None),
            MatchDecision::Rule { name, action } => (Some(name), action),
        };

        if let Some(action) = action {
            for (key, value) in action.set_properties {
                message.kv.insert(key, value);
            }
        }

        match self.tracker.record_attempt(&message.message_id) {
            DeliveryOutcome::DeadLetter => {
                self.tracker.forget(&message.message_id);
                DispatchOutcome::DeadLettered {
                    message,
                    reason: DeadLetterReason::MaxDeliveryExceeded,
                }
            }
            delivery => {
                message.delivery_count = self.tracker.attempts(&message.message_id);
                DispatchOutcome::Accepted {
                    message,
                    delivery,
                    rule,
                }
            }
        }
    }

    /// Snapshot of the attached rules.
    pub fn rules(&self) -> RuleTable {
        self.rules.read().expect("rule table poisoned").clone()
    }

    /// Swap the whole rule table. Callers quiesce dispatch around this.
    pub fn replace_rules(&self, table: RuleTable) {
        *self.rules.write().expect("rule table poisoned") = table;
    }

    pub fn add_rule(&self, rule: Rule) -> Result<(), Error> {
        self.rules.write().expect("rule table poisoned").add(rule)
    }

    pub fn remove_rule(&self, name: &str) -> Result<Rule, Error> {
        self.rules.write().expect("rule table poisoned").remove(name)
    }

    pub fn max_delivery_count(&self) -> u32 {
        self.tracker.max_delivery_count()
    }

    pub(crate) fn forget(&self, message_id: &str) {
        self.tracker.forget(message_id);
    }

    pub(crate) fn attempts(&self, message_id: &str) -> u32 {
        self.tracker.attempts(message_id)
    }
}

/// The runtime shared by queues and subscriptions: a message store fed
/// through a dispatcher, plus the settlement surface for receivers.
pub(crate) struct Channel {
    entity: String,
    dispatcher: Dispatcher,
    store: MessageStore,
    default_ttl: Option<TimeDelta>,
}

impl Channel {
    pub(crate) fn new(
        entity: String,
        dispatcher: Dispatcher,
        default_ttl: Option<TimeDelta>,
    ) -> Self {
        Self {
            entity,
            dispatcher,
            store: MessageStore::new(),
            default_ttl,
        }
    }

    pub(crate) fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Accept a message onto the ready bucket, stamping enqueue time and
    /// the entity default TTL when the sender set none.
    pub(crate) fn offer(&self, mut message: Message) -> String {
        let now = Utc::now();
        message.enqueued_at = Some(now);
        if message.expires_at.is_none() {
            if let Some(ttl) = self.default_ttl {
                message.expires_at = Some(now + ttl);
            }
        }

        let message_id = message.message_id.clone();
        debug!(entity = %self.entity, message_id = %message_id, "message enqueued");
        self.store.push_ready(message);
        message_id
    }

    /// Pull the next deliverable message, draining skipped, expired and
    /// dead-lettered ones along the way.
    pub(crate) fn try_receive(&self) -> Option<ReceivedMessage> {
        loop {
            let message = self.store.pop_ready()?;
            match self.dispatcher.dispatch(message, Utc::now()) {
                DispatchOutcome::Accepted {
                    message,
                    delivery,
                    rule,
                } => {
                    debug!(
                        entity = %self.entity,
                        message_id = %message.message_id,
                        %delivery,
                        rule = rule.as_deref().unwrap_or("<pass-through>"),
                        "message accepted"
                    );
                    self.store.hold(message.clone());
                    return Some(ReceivedMessage { message, delivery });
                }
                DispatchOutcome::Skipped { message } => {
                    debug!(
                        entity = %self.entity,
                        message_id = %message.message_id,
                        "no rule matched; message skipped"
                    );
                }
                DispatchOutcome::DeadLettered { message, reason } => {
                    warn!(
                        entity = %self.entity,
                        message_id = %message.message_id,
                        %reason,
                        "message dead-lettered"
                    );
                    self.store.push_dead(message, reason.to_string(), Utc::now());
                }
                DispatchOutcome::Expired { message } => {
                    debug!(
                        entity = %self.entity,
                        message_id = %message.message_id,
                        "expired message dropped"
                    );
                }
            }
        }
    }

    /// Like [`Channel::try_receive`], waiting up to `wait` for a message
    /// to arrive.
    pub(crate) async fn receive(&self, wait: Duration) -> Option<ReceivedMessage> {
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            if let Some(received) = self.try_receive() {
                return Some(received);
            }
            if tokio::time::timeout_at(deadline, self.store.ready_signal())
                .await
                .is_err()
            {
                // One last poll so a message that raced the deadline is
                // not left behind for no waiter.
                return self.try_receive();
            }
        }
    }

    /// Terminal success: destroy the message and its tracking state.
    pub(crate) fn ack(&self, message_id: &str) -> Result<(), Error> {
        self.store
            .settle(message_id)
            .ok_or_else(|| Error::message_not_in_flight(message_id))?;
        self.dispatcher.forget(message_id);
        debug!(entity = %self.entity, message_id, "message acknowledged");
        Ok(())
    }

    /// Return an unsettled message to the head of the ready bucket; its
    /// next hand-off counts as a redelivery.
    pub(crate) fn abandon(&self, message_id: &str) -> Result<(), Error> {
        let message = self
            .store
            .settle(message_id)
            .ok_or_else(|| Error::message_not_in_flight(message_id))?;
        debug!(entity = %self.entity, message_id, "message abandoned; requeued");
        self.store.push_front(message);
        Ok(())
    }

    /// Explicit terminal failure requested by the receiver.
    pub(crate) fn dead_letter(
        &self,
        message_id: &str,
        reason: impl Into<String>,
    ) -> Result<(), Error> {
        let message = self
            .store
            .settle(message_id)
            .ok_or_else(|| Error::message_not_in_flight(message_id))?;
        self.dispatcher.forget(message_id);
        let reason = reason.into();
        warn!(entity = %self.entity, message_id, %reason, "message dead-lettered by receiver");
        self.store.push_dead(message, reason, Utc::now());
        Ok(())
    }

    pub(crate) fn dead_letters(&self) -> Vec<DeadLettered> {
        self.store.dead_letters()
    }

    pub(crate) fn stats(&self) -> StoreStats {
        self.store.stats()
    }
}
