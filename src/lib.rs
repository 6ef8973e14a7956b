//! Embeddable topic/subscription message engine with correlation-filter
//! routing and dead-lettering.
//!
//! The engine is in-memory and in-process: transport, persistence and
//! credentials belong to the surrounding platform. A [`service::Service`]
//! owns named queues and topics; subscriptions filter a topic's stream
//! through ordered correlation-filter rules, and every entity tracks
//! per-message delivery attempts, dead-lettering a message once its
//! count exceeds the configured maximum or (optionally) once its TTL
//! elapses.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{util::SubscriberInitExt, EnvFilter, FmtSubscriber};

pub mod config;
pub mod delivery;
pub mod dispatch;
pub mod error;
pub mod filter;
pub mod message;
pub mod provision;
pub mod queue;
pub mod rule;
pub mod service;
pub mod store;
pub mod subscription;
pub mod topic;

/// Install the global tracing subscriber: pretty output in debug builds,
/// JSON in release, filtered via the `SIFTMQ_LOG` env var (INFO by
/// default).
pub fn init_tracing() -> eyre::Result<()> {
    #[cfg(debug_assertions)]
    FmtSubscriber::builder()
        .pretty()
        .with_env_filter(
            EnvFilter::builder()
                .with_env_var("SIFTMQ_LOG")
                .with_default_directive(LevelFilter::INFO.into())
                .from_env()?,
        )
        .finish()
        .try_init()?;

    #[cfg(not(debug_assertions))]
    FmtSubscriber::builder()
        .json()
        .with_env_filter(
            EnvFilter::builder()
                .with_env_var("SIFTMQ_LOG")
                .with_default_directive(LevelFilter::INFO.into())
                .from_env()?,
        )
        .finish()
        .try_init()?;

    Ok(())
}
