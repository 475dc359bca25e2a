//! Room Broadcaster
//!
//! Every chat message goes through the room's pub/sub channel, including
//! delivery back to the sender and to members on the same process. Each
//! process subscribed to the channel fans the envelope out to its own local
//! members through [`RoomFanout`].
//!
//! The set of channels this process is subscribed to is owned by
//! [`RoomBroadcaster`]: empty on construction, grown by
//! [`RoomBroadcaster::ensure_subscribed`], shrunk by
//! [`RoomBroadcaster::release_if_unused`] and emptied by
//! [`RoomBroadcaster::shutdown`].
//!
//! Each channel has its own lock, held across the transport call. Rooms never
//! wait on each other; joins and leaves of the same room are serialised.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::{
    domain::{
        ChannelName, ConnectionId, ConnectionRegistry, EnvelopeHandler, MessageEnvelope,
        PubSubError, PubSubTransport, RoomId,
    },
    infrastructure::dto::websocket::OutboundChatMessage,
};

/// Outcome of pushing one envelope to the local members of a room
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: Vec<ConnectionId>,
    /// Connections whose outbound queue was already closed
    pub failed: Vec<ConnectionId>,
}

/// Subscription handler pushing envelopes to local members
pub struct RoomFanout {
    registry: Arc<dyn ConnectionRegistry>,
    channel_prefix: String,
}

impl RoomFanout {
    pub fn new(registry: Arc<dyn ConnectionRegistry>, channel_prefix: impl Into<String>) -> Self {
        Self {
            registry,
            channel_prefix: channel_prefix.into(),
        }
    }

    /// Push `envelope` to every local member of its room.
    ///
    /// A failed push is recorded and logged; the remaining members still
    /// receive the message.
    pub fn deliver(&self, envelope: &MessageEnvelope) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        let payload = match serde_json::to_string(&OutboundChatMessage::from(envelope)) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!("Failed to serialize outbound message: {}", e);
                return report;
            }
        };

        // Snapshot first: no registry lock is held while pushing.
        for (connection_id, outbox) in self.registry.outboxes_of(envelope.room()) {
            if outbox.send(payload.clone()).is_ok() {
                report.delivered.push(connection_id);
            } else {
                tracing::warn!(
                    "Failed to push message to connection '{}' in room '{}'",
                    connection_id,
                    envelope.room()
                );
                report.failed.push(connection_id);
            }
        }
        report
    }
}

impl EnvelopeHandler for RoomFanout {
    fn handle(&self, channel: &ChannelName, envelope: MessageEnvelope) {
        let expected = ChannelName::for_room(&self.channel_prefix, envelope.room());
        if &expected != channel {
            tracing::warn!(
                "Dropping envelope for room '{}' received on channel '{}'",
                envelope.room(),
                channel
            );
            return;
        }
        let report = self.deliver(&envelope);
        tracing::debug!(
            "Delivered message from '{}' in room '{}' to {} connection(s), {} failed",
            envelope.sender_display_name(),
            envelope.room(),
            report.delivered.len(),
            report.failed.len()
        );
    }
}

/// Per-channel subscription flag. `true` once the transport confirmed the subscribe.
type SubscriptionSlot = Arc<Mutex<bool>>;

/// Publishes envelopes and manages this process's channel subscriptions.
pub struct RoomBroadcaster {
    transport: Arc<dyn PubSubTransport>,
    registry: Arc<dyn ConnectionRegistry>,
    fanout: Arc<RoomFanout>,
    channel_prefix: String,
    subscriptions: DashMap<ChannelName, SubscriptionSlot>,
}

impl RoomBroadcaster {
    pub fn new(
        transport: Arc<dyn PubSubTransport>,
        registry: Arc<dyn ConnectionRegistry>,
        channel_prefix: impl Into<String>,
    ) -> Self {
        let channel_prefix = channel_prefix.into();
        let fanout = Arc::new(RoomFanout::new(registry.clone(), channel_prefix.clone()));
        Self {
            transport,
            registry,
            fanout,
            channel_prefix,
            subscriptions: DashMap::new(),
        }
    }

    /// Channel a room is published on
    pub fn channel_for(&self, room_id: &RoomId) -> ChannelName {
        ChannelName::for_room(&self.channel_prefix, room_id)
    }

    /// Publish to the envelope's room channel without waiting for delivery
    pub async fn publish(&self, envelope: MessageEnvelope) -> Result<(), PubSubError> {
        let channel = self.channel_for(envelope.room());
        self.transport.publish(&channel, envelope).await
    }

    /// Subscribe this process to the room's channel unless it already is
    pub async fn ensure_subscribed(&self, room_id: &RoomId) -> Result<(), PubSubError> {
        let channel = self.channel_for(room_id);
        let slot = self.slot(&channel);
        let mut subscribed = slot.lock().await;
        if *subscribed {
            return Ok(());
        }
        if let Err(e) = self.transport.subscribe(&channel, self.fanout.clone()).await {
            drop(subscribed);
            self.forget_slot(&channel, &slot);
            return Err(e);
        }
        *subscribed = true;
        tracing::info!("Subscribed to channel '{}'", channel);
        Ok(())
    }

    /// Unsubscribe from the room's channel if no local member is left.
    ///
    /// Membership is checked under the channel's lock, so a join racing with
    /// this call either keeps the subscription or re-subscribes after it.
    /// The channel stays subscribed when the transport fails to unsubscribe.
    /// Returns whether an unsubscribe happened.
    pub async fn release_if_unused(&self, room_id: &RoomId) -> Result<bool, PubSubError> {
        let channel = self.channel_for(room_id);
        let Some(slot) = self.existing_slot(&channel) else {
            return Ok(false);
        };
        let mut subscribed = slot.lock().await;
        if !*subscribed || !self.registry.members_of(room_id).is_empty() {
            return Ok(false);
        }
        self.transport.unsubscribe(&channel).await?;
        *subscribed = false;
        drop(subscribed);
        self.forget_slot(&channel, &slot);
        tracing::info!("Unsubscribed from channel '{}'", channel);
        Ok(true)
    }

    pub async fn is_subscribed(&self, room_id: &RoomId) -> bool {
        match self.existing_slot(&self.channel_for(room_id)) {
            Some(slot) => *slot.lock().await,
            None => false,
        }
    }

    pub async fn subscription_count(&self) -> usize {
        let mut count = 0;
        for (_, slot) in self.slots() {
            if *slot.lock().await {
                count += 1;
            }
        }
        count
    }

    /// Unsubscribe from every channel. Called once at process shutdown.
    pub async fn shutdown(&self) {
        for (channel, slot) in self.slots() {
            let mut subscribed = slot.lock().await;
            if !*subscribed {
                continue;
            }
            match self.transport.unsubscribe(&channel).await {
                Ok(()) => *subscribed = false,
                Err(e) => tracing::warn!("Failed to unsubscribe from '{}': {}", channel, e),
            }
            drop(subscribed);
            self.forget_slot(&channel, &slot);
        }
        tracing::info!("All channel subscriptions released");
    }

    fn slot(&self, channel: &ChannelName) -> SubscriptionSlot {
        self.subscriptions
            .entry(channel.clone())
            .or_default()
            .clone()
    }

    fn existing_slot(&self, channel: &ChannelName) -> Option<SubscriptionSlot> {
        self.subscriptions.get(channel).map(|slot| slot.clone())
    }

    fn slots(&self) -> Vec<(ChannelName, SubscriptionSlot)> {
        self.subscriptions
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Drop an unsubscribed slot nobody else is waiting on.
    ///
    /// Slots are only cloned under the map's shard lock, so the reference
    /// count checked here cannot grow while `remove_if` holds that lock.
    fn forget_slot(&self, channel: &ChannelName, slot: &SubscriptionSlot) {
        self.subscriptions.remove_if(channel, |_, current| {
            Arc::ptr_eq(current, slot)
                && Arc::strong_count(current) == 2
                && current.try_lock().is_ok_and(|subscribed| !*subscribed)
        });
    }
}
