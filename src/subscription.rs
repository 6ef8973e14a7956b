//! Subscriptions: independently filtered views over a topic's stream.
//!
//! Each subscription owns a rule table (frozen after setup; replaced
//! wholesale to reconfigure) and the same receive/settlement surface as
//! a queue.

use std::time::Duration;

use chrono::TimeDelta;

use crate::config::DEFAULT_MAX_DELIVERY_COUNT;
use crate::dispatch::{Channel, Dispatcher, ReceivedMessage};
use crate::error::Error;
use crate::message::Message;
use crate::provision::{ProvisionState, ProvisioningStatus};
use crate::rule::{Rule, RuleTable};
use crate::store::{DeadLettered, StoreStats};

#[derive(Debug, Clone, bon::Builder)]
pub struct SubscriptionOptions {
    /// Delivery attempts allowed before a message is dead-lettered.
    /// Must be positive; validated at creation.
    #[builder(default = DEFAULT_MAX_DELIVERY_COUNT)]
    pub max_delivery_count: u32,

    /// Dead-letter (rather than drop) messages whose TTL elapses
    #[builder(default)]
    pub dead_lettering_on_message_expiration: bool,

    /// Applied to messages published without an explicit expiry
    pub default_message_time_to_live: Option<TimeDelta>,

    /// Rules attached at setup. Duplicate names fail creation.
    #[builder(default)]
    pub rules: Vec<Rule>,
}

impl Default for SubscriptionOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

pub struct Subscription {
    name: String,
    topic: String,
    channel: Channel,
    provision: ProvisionState,
}

impl Subscription {
    pub(crate) fn new(
        topic: &str,
        name: String,
        options: SubscriptionOptions,
    ) -> Result<Self, Error> {
        if options.max_delivery_count == 0 {
            return Err(Error::invalid_parameter(
                "max_delivery_count must be positive",
            ));
        }
        let rules = RuleTable::with_rules(options.rules)?;

        let dispatcher = Dispatcher::new(
            rules,
            options.max_delivery_count,
            options.dead_lettering_on_message_expiration,
        );
        let channel = Channel::new(
            format!("topic/{topic}/{name}"),
            dispatcher,
            options.default_message_time_to_live,
        );

        Ok(Self {
            name,
            topic: topic.to_owned(),
            channel,
            provision: ProvisionState::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn max_delivery_count(&self) -> u32 {
        self.channel.dispatcher().max_delivery_count()
    }

    pub fn status(&self) -> ProvisioningStatus {
        self.provision.status()
    }

    /// Dependency-wait contract: resolves once the subscription is
    /// usable.
    pub async fn provisioned(&self) {
        self.provision.provisioned().await;
    }

    pub(crate) fn provision_state(&self) -> &ProvisionState {
        &self.provision
    }

    /// Snapshot of the attached rules.
    pub fn rules(&self) -> RuleTable {
        self.channel.dispatcher().rules()
    }

    /// Attach a rule. Setup-time operation.
    pub fn add_rule(&self, rule: Rule) -> Result<(), Error> {
        self.channel.dispatcher().add_rule(rule)
    }

    /// Detach a rule by name. Setup-time operation.
    pub fn remove_rule(&self, name: &str) -> Result<Rule, Error> {
        self.channel.dispatcher().remove_rule(name)
    }

    /// Replace the whole rule table while the subscription is quiesced.
    pub fn replace_rules(&self, rules: RuleTable) {
        self.channel.dispatcher().replace_rules(rules);
    }

    /// Accept a fanned-out copy of a published message.
    pub(crate) fn offer(&self, message: Message) -> String {
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
