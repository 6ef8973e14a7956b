//! Queues: named point-to-point entities with no rule table.
//!
//! A queue dispatches every message pass-through; it shares the delivery
//! tracking, expiry and dead-lettering behavior of subscriptions.

use std::time::Duration;

use chrono::TimeDelta;

use crate::config::DEFAULT_MAX_DELIVERY_COUNT;
use crate::dispatch::{Channel, Dispatcher, ReceivedMessage};
use crate::error::Error;
use crate::message::Message;
use crate::provision::{ProvisionState, ProvisioningStatus};
use crate::rule::RuleTable;
use crate::store::{DeadLettered, StoreStats};

#[derive(Debug, Clone, bon::Builder)]
#[builder(on(String, into))]
pub struct QueueOptions {
    /// Platform-facing name, distinct from the resource name
    pub display_name: Option<String>,

    /// Delivery attempts allowed before a message is dead-lettered.
    /// Must be positive; validated at creation.
    #[builder(default = DEFAULT_MAX_DELIVERY_COUNT)]
    pub max_delivery_count: u32,

    /// Dead-letter (rather than drop) messages whose TTL elapses
    #[builder(default)]
    pub dead_lettering_on_message_expiration: bool,

    /// Applied to messages sent without an explicit expiry
    pub default_message_time_to_live: Option<TimeDelta>,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl QueueOptions {
    pub(crate) fn validate(&self) -> Result<(), Error> {
        if self.max_delivery_count == 0 {
            return Err(Error::invalid_parameter(
                "max_delivery_count must be positive",
            ));
        }
        Ok(())
    }
}

pub struct Queue {
    name: String,
    options: QueueOptions,
    channel: Channel,
    provision: ProvisionState,
}

impl Queue {
    pub(crate) fn new(name: String, options: QueueOptions) -> Result<Self, Error> {
        options.validate()?;

        let dispatcher = Dispatcher::new(
            RuleTable::new(),
            options.max_delivery_count,
            options.dead_lettering_on_message_expiration,
        );
        let channel = Channel::new(
            format!("queue/{name}"),
            dispatcher,
            options.default_message_time_to_live,
        );

        Ok(Self {
            name,
            options,
            channel,
            provision: ProvisionState::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn display_name(&self) -> Option<&str> {
        self.options.display_name.as_deref()
    }

    pub fn options(&self) -> &QueueOptions {
        &self.options
    }

    pub fn status(&self) -> ProvisioningStatus {
        self.provision.status()
    }

    /// Dependency-wait contract: resolves once the queue is usable.
    pub async fn provisioned(&self) {
        self.provision.provisioned().await;
    }

    pub(crate) fn provision_state(&self) -> &ProvisionState {
        &self.provision
    }

    /// Enqueue a message, returning its id.
    pub fn send(&self, message: Message) -> String {
        self.channel.offer(message)
    }

    pub fn try_receive(&self) -> Option<ReceivedMessage> {
        self.channel.try_receive()
    }

    /// Receive, waiting up to `wait` for a message to become available.
    pub async fn receive(&self, wait: Duration) -> Option<ReceivedMessage> {
        self.channel.receive(wait).await
    }

    pub fn ack(&self, message_id: &str) -> Result<(), Error> {
        self.channel.ack(message_id)
    }

    pub fn abandon(&self, message_id: &str) -> Result<(), Error> {
        self.channel.abandon(message_id)
    }

    pub fn dead_letter(&self, message_id: &str, reason: impl Into<String>) -> Result<(), Error> {
        self.channel.dead_letter(message_id, reason)
    }

    pub fn dead_letters(&self) -> Vec<DeadLettered> {
        self.channel.dead_letters()
    }

    pub fn stats(&self) -> StoreStats {
        self.channel.stats()
    }
}
