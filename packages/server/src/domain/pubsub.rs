//! Pub/sub transport traits.
//!
//! A transport moves envelopes between every process subscribed to a channel.
//! Implementations must keep per-publisher order within a channel and allow
//! any number of independent processes to subscribe to the same channel.

use std::sync::Arc;

use async_trait::async_trait;

use super::{entity::MessageEnvelope, error::PubSubError, value_object::ChannelName};

/// Callback invoked for every envelope delivered through a subscription
#[cfg_attr(test, mockall::automock)]
pub trait EnvelopeHandler: Send + Sync {
    fn handle(&self, channel: &ChannelName, envelope: MessageEnvelope);
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PubSubTransport: Send + Sync {
    /// Start delivering envelopes published on `channel` to `handler`.
    ///
    /// Envelopes published after this returns are guaranteed to reach the
    /// handler. Subscribing to an already-subscribed channel replaces nothing
    /// and returns `Ok`.
    async fn subscribe(
        &self,
        channel: &ChannelName,
        handler: Arc<dyn EnvelopeHandler>,
    ) -> Result<(), PubSubError>;

    /// Stop delivering envelopes for `channel` to this process
    async fn unsubscribe(&self, channel: &ChannelName) -> Result<(), PubSubError>;

    /// Publish without waiting for delivery
    async fn publish(
        &self,
        channel: &ChannelName,
        envelope: MessageEnvelope,
    ) -> Result<(), PubSubError>;
}
