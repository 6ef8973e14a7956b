//! Environment configuration and declarative topology.
//!
//! Runtime settings come from `SIFTMQ_`-prefixed environment variables.
//! The messaging topology (queues, topics, subscriptions and their
//! rules) can additionally be declared in a JSON file and applied in one
//! pass at service construction; entities report `Provisioned` only once
//! the whole topology has been applied.

use serde::{Deserialize, Serialize};

use crate::filter::CorrelationFilter;
use crate::queue::QueueOptions;
use crate::rule::{Rule, RuleAction};
use crate::subscription::SubscriptionOptions;

/// Delivery attempts allowed before dead-lettering, unless overridden
/// per entity or via `SIFTMQ_DEFAULT_MAX_DELIVERY_COUNT`.
pub const DEFAULT_MAX_DELIVERY_COUNT: u32 = 10;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub topology_path: Option<String>,
    pub default_max_delivery_count: Option<u32>,
}

impl Config {
    pub fn load() -> eyre::Result<Self> {
        Ok(envy::prefixed("SIFTMQ_").from_env::<Self>()?)
    }

    pub fn default_max_delivery_count(&self) -> u32 {
        self.default_max_delivery_count
            .unwrap_or(DEFAULT_MAX_DELIVERY_COUNT)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            topology_path: None,
            default_max_delivery_count: None,
        }
    }
}

/// Declarative description of every entity the service should own.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Topology {
    #[serde(default)]
    pub queues: Vec<QueueSpec>,
    #[serde(default)]
    pub topics: Vec<TopicSpec>,
}

impl Topology {
    pub fn from_json(json: &str) -> eyre::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: &str) -> eyre::Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSpec {
    pub name: String,
    pub display_name: Option<String>,
    #[serde(default)]
    pub dead_lettering_on_message_expiration: bool,
    pub max_delivery_count: Option<u32>,
    pub default_message_ttl_secs: Option<u64>,
}

impl QueueSpec {
    pub(crate) fn queue_options(&self, config: &Config) -> QueueOptions {
        QueueOptions {
            display_name: self.display_name.clone(),
            max_delivery_count: self
                .max_delivery_count
                .unwrap_or_else(|| config.default_max_delivery_count()),
            dead_lettering_on_message_expiration: self.dead_lettering_on_message_expiration,
            default_message_time_to_live: self
                .default_message_ttl_secs
                .map(|secs| chrono::TimeDelta::seconds(secs as i64)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicSpec {
    pub name: String,
    pub display_name: Option<String>,
    #[serde(default)]
    pub subscriptions: Vec<SubscriptionSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionSpec {
    pub name: String,
    pub max_delivery_count: Option<u32>,
    #[serde(default)]
    pub dead_lettering_on_message_expiration: bool,
    pub default_message_ttl_secs: Option<u64>,
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
}

impl SubscriptionSpec {
    pub(crate) fn subscription_options(&self, config: &Config) -> SubscriptionOptions {
        SubscriptionOptions {
            max_delivery_count: self
                .max_delivery_count
                .unwrap_or_else(|| config.default_max_delivery_count()),
            dead_lettering_on_message_expiration: self.dead_lettering_on_message_expiration,
            default_message_time_to_live: self
                .default_message_ttl_secs
                .map(|secs| chrono::TimeDelta::seconds(secs as i64)),
            rules: self.rules.iter().map(RuleSpec::rule).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSpec {
    pub name: String,
    #[serde(default)]
    pub filter: CorrelationFilter,
    pub action: Option<RuleAction>,
}

impl RuleSpec {
    fn rule(&self) -> Rule {
        Rule {
            name: self.name.clone(),
            filter: self.filter.clone(),
            action: self.action.clone(),
        }
    }
}
