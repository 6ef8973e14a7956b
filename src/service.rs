//! The service facade: explicit, shared ownership of every entity.
//!
//! There is no process-global configuration; a [`Service`] is the one
//! object holding the queue and topic registries, constructed from a
//! [`Config`] and passed to whoever needs it.

use std::sync::Arc;

use tracing::info;

use crate::config::{Config, Topology};
use crate::error::Error;
use crate::message::Message;
use crate::queue::{Queue, QueueOptions};
use crate::subscription::{Subscription, SubscriptionOptions};
use crate::topic::Topic;

pub struct Service {
    config: Config,
    queues: papaya::HashMap<String, Arc<Queue>>,
    topics: papaya::HashMap<String, Arc<Topic>>,
}

impl Service {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            queues: papaya::HashMap::new(),
            topics: papaya::HashMap::new(),
        }
    }

    /// Build a service from configuration, applying the declared
    /// topology (if any) before returning.
    pub fn with_config(config: Config) -> eyre::Result<Self> {
        let service = Self {
            config,
            queues: papaya::HashMap::new(),
            topics: papaya::HashMap::new(),
        };

        if let Some(path) = service.config.topology_path.clone() {
            let topology = Topology::from_path(&path)?;
            service.apply_topology(&topology)?;
        }

        Ok(service)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Create a queue and mark it provisioned.
    pub fn create_queue(
        &self,
        name: &str,
        options: QueueOptions,
    ) -> Result<Arc<Queue>, Error> {
        let queue = self.create_queue_pending(name, options)?;
        queue.provision_state().mark_provisioned();
        info!(queue = name, "queue provisioned");
        Ok(queue)
    }

    fn create_queue_pending(
        &self,
        name: &str,
        options: QueueOptions,
    ) -> Result<Arc<Queue>, Error> {
        let queues = self.queues.pin();
        if queues.contains_key(name) {
            return Err(Error::already_exists(format!("queue {name}")));
        }

        let queue = Arc::new(Queue::new(name.to_owned(), options)?);
        queues.insert(name.to_owned(), queue.clone());
        Ok(queue)
    }

    pub fn queue(&self, name: &str) -> Result<Arc<Queue>, Error> {
        self.queues
            .pin()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::queue_not_found(name))
    }

    pub fn delete_queue(&self, name: &str) -> Result<(), Error> {
        if self.queues.pin().remove(name).is_none() {
            return Err(Error::queue_not_found(name));
        }
        info!(queue = name, "queue deleted");
        Ok(())
    }

    pub fn list_queues(&self) -> Vec<String> {
        let guard = self.queues.guard();
        let mut names: Vec<String> = self
            .queues
            .iter(&guard)
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Create a topic and mark it provisioned.
    pub fn create_topic(
        &self,
        name: &str,
        display_name: Option<String>,
    ) -> Result<Arc<Topic>, Error> {
        let topic = self.create_topic_pending(name, display_name)?;
        topic.provision_state().mark_provisioned();
        info!(topic = name, "topic provisioned");
        Ok(topic)
    }

    fn create_topic_pending(
        &self,
        name: &str,
        display_name: Option<String>,
    ) -> Result<Arc<Topic>, Error> {
        let topics = self.topics.pin();
        if topics.contains_key(name) {
            return Err(Error::already_exists(format!("topic {name}")));
        }

        let topic = Arc::new(Topic::new(name.to_owned(), display_name));
        topics.insert(name.to_owned(), topic.clone());
        Ok(topic)
    }

    pub fn topic(&self, name: &str) -> Result<Arc<Topic>, Error> {
        self.topics
            .pin()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::topic_not_found(name))
    }

    pub fn delete_topic(&self, name: &str) -> Result<(), Error> {
        if self.topics.pin().remove(name).is_none() {
            return Err(Error::topic_not_found(name));
        }
        info!(topic = name, "topic deleted");
        Ok(())
    }

    pub fn list_topics(&self) -> Vec<String> {
        let guard = self.topics.guard();
        let mut names: Vec<String> = self
            .topics
            .iter(&guard)
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Create a subscription on an existing topic and mark it
    /// provisioned.
    pub fn create_subscription(
        &self,
        topic: &str,
        name: &str,
        options: SubscriptionOptions,
    ) -> Result<Arc<Subscription>, Error> {
        self.topic(topic)?.create_subscription(name, options)
    }

    pub fn subscription(&self, topic: &str, name: &str) -> Result<Arc<Subscription>, Error> {
        self.topic(topic)?.subscription(name)
    }

    /// Enqueue onto a named queue, returning the message id.
    pub fn send_to_queue(&self, queue: &str, message: Message) -> Result<String, Error> {
        Ok(self.queue(queue)?.send(message))
    }

    /// Publish to a named topic, returning how many subscriptions were
    /// offered a copy.
    pub fn publish(&self, topic: &str, message: Message) -> Result<usize, Error> {
        Ok(self.topic(topic)?.publish(message))
    }

    /// Apply a declarative topology in one pass. Everything is created
    /// in `Provisioning`; entities flip to `Provisioned` together once
    /// the whole topology validated, so a waiting worker never observes
    /// a half-applied setup.
    pub fn apply_topology(&self, topology: &Topology) -> Result<(), Error> {
        let mut queues = Vec::new();
        let mut topics = Vec::new();
        let mut subscriptions = Vec::new();

        for spec in &topology.queues {
            queues.push(self.create_queue_pending(&spec.name, spec.queue_options(&self.config))?);
        }
        for spec in &topology.topics {
            let topic = self.create_topic_pending(&spec.name, spec.display_name.clone())?;
            for sub_spec in &spec.subscriptions {
                subscriptions.push(topic.create_subscription_pending(
                    &sub_spec.name,
                    sub_spec.subscription_options(&self.config),
                )?);
            }
            topics.push(topic);
        }

        for queue in &queues {
            queue.provision_state().mark_provisioned();
        }
        for subscription in &subscriptions {
            subscription.provision_state().mark_provisioned();
        }
        for topic in &topics {
            topic.provision_state().mark_provisioned();
        }

        info!(
            queues = queues.len(),
            topics = topics.len(),
            subscriptions = subscriptions.len(),
            "topology applied"
        );
        Ok(())
    }
}

impl Default for Service {
    fn default() -> Self {
        Self::new()
    }
}
