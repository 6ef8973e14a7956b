//! Provisioning status for queues, topics and subscriptions.
//!
//! Entities are created in `Provisioning` and flip to `Provisioned` once
//! setup-time validation has passed (for declarative topologies, once the
//! whole topology has been applied). Workers use
//! [`ProvisionState::provisioned`] as the dependency-wait contract: do
//! not start receiving before the entities you reference report ready.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ProvisioningStatus {
    Provisioning,
    Provisioned,
}

/// Publishes an entity's provisioning status over a watch channel.
pub struct ProvisionState {
    tx: watch::Sender<ProvisioningStatus>,
}

impl ProvisionState {
    pub(crate) fn new() -> Self {
        let (tx, _) = watch::channel(ProvisioningStatus::Provisioning);
        Self { tx }
    }

    pub(crate) fn mark_provisioned(&self) {
        self.tx.send_replace(ProvisioningStatus::Provisioned);
    }

    pub fn status(&self) -> ProvisioningStatus {
        *self.tx.borrow()
    }

    /// Resolves once the entity reports `Provisioned`.
    pub async fn provisioned(&self) {
        let mut rx = self.tx.subscribe();
        while *rx.borrow_and_update() != ProvisioningStatus::Provisioned {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn starts_provisioning_and_flips_once() {
        let state = ProvisionState::new();
        assert_eq!(state.status(), ProvisioningStatus::Provisioning);

        state.mark_provisioned();
        assert_eq!(state.status(), ProvisioningStatus::Provisioned);
        // Immediate resolution once already provisioned.
        state.provisioned().await;
    }

    #[tokio::test]
    async fn waiters_are_released_on_transition() {
        let state = std::sync::Arc::new(ProvisionState::new());

        let waiter = {
            let state = state.clone();
            tokio::spawn(async move { state.provisioned().await })
        };

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        state.mark_provisioned();
        waiter.await.unwrap();
    }
}
