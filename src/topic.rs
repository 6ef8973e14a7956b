//! Topics: named fan-out points owning their subscriptions.

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::Error;
use crate::message::Message;
use crate::provision::{ProvisionState, ProvisioningStatus};
use crate::subscription::{Subscription, SubscriptionOptions};

pub struct Topic {
    name: String,
    display_name: Option<String>,
    subscriptions: papaya::HashMap<String, Arc<Subscription>>,
    provision: ProvisionState,
}

impl Topic {
    pub(crate) fn new(name: String, display_name: Option<String>) -> Self {
        Self {
            name,
            display_name,
            subscriptions: papaya::HashMap::new(),
            provision: ProvisionState::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    pub fn status(&self) -> ProvisioningStatus {
        self.provision.status()
    }

    /// Dependency-wait contract: resolves once the topic is usable.
    pub async fn provisioned(&self) {
        self.provision.provisioned().await;
    }

    pub(crate) fn provision_state(&self) -> &ProvisionState {
        &self.provision
    }

    /// Create a subscription and mark it provisioned.
    pub fn create_subscription(
        &self,
        name: &str,
        options: SubscriptionOptions,
    ) -> Result<Arc<Subscription>, Error> {
        let subscription = self.create_subscription_pending(name, options)?;
        subscription.provision_state().mark_provisioned();
        info!(topic = %self.name, subscription = name, "subscription provisioned");
        Ok(subscription)
    }

    /// Create a subscription leaving it in `Provisioning`; declarative
    /// topology setup marks everything at the end of the apply pass.
    pub(crate) fn create_subscription_pending(
        &self,
        name: &str,
        options: SubscriptionOptions,
    ) -> Result<Arc<Subscription>, Error> {
        let subscriptions = self.subscriptions.pin();
        if subscriptions.contains_key(name) {
            return Err(Error::already_exists(format!(
                "subscription {name} on topic {}",
                self.name
            )));
        }

        let subscription = Arc::new(Subscription::new(&self.name, name.to_owned(), options)?);
        subscriptions.insert(name.to_owned(), subscription.clone());
        Ok(subscription)
    }

    pub fn subscription(&self, name: &str) -> Result<Arc<Subscription>, Error> {
        self.subscriptions
            .pin()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::subscription_not_found(name, &self.name))
    }

    pub fn delete_subscription(&self, name: &str) -> Result<(), Error> {
        let subscriptions = self.subscriptions.pin();
        if subscriptions.remove(name).is_none() {
            return Err(Error::subscription_not_found(name, &self.name));
        }
        info!(topic = %self.name, subscription = name, "subscription deleted");
        Ok(())
    }

    pub fn list_subscriptions(&self) -> Vec<String> {
        let guard = self.subscriptions.guard();
        let mut names: Vec<String> = self
            .subscriptions
            .iter(&guard)
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Fan a message out to every subscription, returning how many
    /// copies were offered.
    ///
    /// Each subscription gets its own copy with the same message id;
    /// delivery state is tracked per subscription.
    pub fn publish(&self, message: Message) -> usize {
        let guard = self.subscriptions.guard();
        let mut offered = 0;
        for (_, subscription) in self.subscriptions.iter(&guard) {
            subscription.offer(message.clone());
            offered += 1;
        }
        debug!(
            topic = %self.name,
            message_id = %message.message_id,
            subscriptions = offered,
            "message published"
        );
        offered
    }
}
