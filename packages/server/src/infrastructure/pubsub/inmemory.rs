//! In-memory pub/sub broker.
//!
//! `InMemoryBroker` plays the role of the shared broker: every subscription
//! gets its own unbounded queue, registered under the channel name. Each
//! server process gets its own `InMemoryChannelLayer` on top of a clone of the
//! broker, so several "processes" can share one broker inside a single test
//! binary.
//!
//! Publishing pushes the envelope onto every subscription queue of the channel
//! while holding that channel's entry, so all subscribers see one order and
//! per-publisher order is kept. Queues never evict: a slow subscriber falls
//! behind but still receives every envelope.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::{
    sync::{Mutex, mpsc},
    task::JoinHandle,
};

use crate::domain::{ChannelName, EnvelopeHandler, MessageEnvelope, PubSubError, PubSubTransport};

type SubscriptionId = u64;

struct Subscriber {
    id: SubscriptionId,
    queue: mpsc::UnboundedSender<MessageEnvelope>,
}

#[derive(Default)]
struct BrokerInner {
    channels: DashMap<String, Vec<Subscriber>>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

/// Shared broker. Cloning yields another handle to the same broker.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    inner: Arc<BrokerInner>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the broker unreachable: publishes and new subscriptions fail
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
    }

    /// Make a closed broker reachable again
    pub fn reopen(&self) {
        self.inner.closed.store(false, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Number of live subscriptions on `channel` across all processes
    pub fn subscriber_count(&self, channel: &ChannelName) -> usize {
        self.inner
            .channels
            .get(channel.as_str())
            .map(|subscribers| subscribers.len())
            .unwrap_or(0)
    }

    fn ensure_open(&self) -> Result<(), PubSubError> {
        if self.is_closed() {
            return Err(PubSubError::Unavailable("broker is closed".to_string()));
        }
        Ok(())
    }

    fn subscribe(
        &self,
        channel: &ChannelName,
    ) -> Result<(SubscriptionId, mpsc::UnboundedReceiver<MessageEnvelope>), PubSubError> {
        self.ensure_open()?;
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (queue, receiver) = mpsc::unbounded_channel();
        self.inner
            .channels
            .entry(channel.as_str().to_string())
            .or_default()
            .push(Subscriber { id, queue });
        Ok((id, receiver))
    }

    /// Returns the number of subscriptions the envelope was queued for
    fn publish(
        &self,
        channel: &ChannelName,
        envelope: MessageEnvelope,
    ) -> Result<usize, PubSubError> {
        self.ensure_open()?;
        let Some(mut subscribers) = self.inner.channels.get_mut(channel.as_str()) else {
            return Ok(0);
        };
        // A closed queue belongs to a subscription torn down without release.
        subscribers.retain(|s| s.queue.send(envelope.clone()).is_ok());
        Ok(subscribers.len())
    }

    /// Remove one subscription and drop the channel once nobody is left
    fn release(&self, channel: &ChannelName, id: SubscriptionId) {
        if let Some(mut subscribers) = self.inner.channels.get_mut(channel.as_str()) {
            subscribers.retain(|s| s.id != id);
        }
        self.inner
            .channels
            .remove_if(channel.as_str(), |_, subscribers| subscribers.is_empty());
    }
}

struct Subscription {
    id: SubscriptionId,
    task: JoinHandle<()>,
}

/// One process's view of the broker.
pub struct InMemoryChannelLayer {
    broker: InMemoryBroker,
    subscriptions: Mutex<HashMap<ChannelName, Subscription>>,
}

impl InMemoryChannelLayer {
    pub fn new(broker: InMemoryBroker) -> Self {
        Self {
            broker,
            subscriptions: Mutex::new(HashMap::new()),
        }
    }
}

async fn pump(
    channel: ChannelName,
    mut receiver: mpsc::UnboundedReceiver<MessageEnvelope>,
    handler: Arc<dyn EnvelopeHandler>,
) {
    while let Some(envelope) = receiver.recv().await {
        handler.handle(&channel, envelope);
    }
    tracing::debug!("Channel '{}' closed", channel);
}

#[async_trait]
impl PubSubTransport for InMemoryChannelLayer {
    async fn subscribe(
        &self,
        channel: &ChannelName,
        handler: Arc<dyn EnvelopeHandler>,
    ) -> Result<(), PubSubError> {
        let mut subscriptions = self.subscriptions.lock().await;
        if subscriptions.contains_key(channel) {
            return Ok(());
        }
        let (id, receiver) = self.broker.subscribe(channel)?;
        let task = tokio::spawn(pump(channel.clone(), receiver, handler));
        subscriptions.insert(channel.clone(), Subscription { id, task });
        tracing::debug!("Subscribed to channel '{}'", channel);
        Ok(())
    }

    async fn unsubscribe(&self, channel: &ChannelName) -> Result<(), PubSubError> {
        let subscription = self
            .subscriptions
            .lock()
            .await
            .remove(channel)
            .ok_or_else(|| PubSubError::NotSubscribed(channel.to_string()))?;
        self.broker.release(channel, subscription.id);
        subscription.task.abort();
        let _ = subscription.task.await;
        tracing::debug!("Unsubscribed from channel '{}'", channel);
        Ok(())
    }

    async fn publish(
        &self,
        channel: &ChannelName,
        envelope: MessageEnvelope,
    ) -> Result<(), PubSubError> {
        let queued = self.broker.publish(channel, envelope)?;
        tracing::trace!("Published to '{}' ({} subscribers)", channel, queued);
        Ok(())
    }
}

impl Drop for InMemoryChannelLayer {
    fn drop(&mut self) {
        for (channel, subscription) in self.subscriptions.get_mut().drain() {
            self.broker.release(&channel, subscription.id);
            subscription.task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DisplayName, MessageContent, RoomId};
    use std::time::Duration;
    use tokio::sync::mpsc;

    /// Forwards every delivered envelope into a channel
    struct Collect(mpsc::UnboundedSender<(ChannelName, MessageEnvelope)>);

    impl EnvelopeHandler for Collect {
        fn handle(&self, channel: &ChannelName, envelope: MessageEnvelope) {
            let _ = self.0.send((channel.clone(), envelope));
        }
    }

    fn collector() -> (
        Arc<dyn EnvelopeHandler>,
        mpsc::UnboundedReceiver<(ChannelName, MessageEnvelope)>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Collect(tx)), rx)
    }

    fn channel(room: &str) -> ChannelName {
        ChannelName::for_room("chat_", &RoomId::new(room.to_string()).unwrap())
    }

    fn envelope(room: &str, text: &str) -> MessageEnvelope {
        MessageEnvelope::chat_message(
            RoomId::new(room.to_string()).unwrap(),
            MessageContent::new(text.to_string()).unwrap(),
            DisplayName::new("alice".to_string()).unwrap(),
        )
    }

    async fn recv(
        rx: &mut mpsc::UnboundedReceiver<(ChannelName, MessageEnvelope)>,
    ) -> Option<(ChannelName, MessageEnvelope)> {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .ok()
            .flatten()
    }

    #[tokio::test]
    async fn test_publish_reaches_every_process() {
        // テスト項目: 同じチャンネルを購読する全プロセスに配信される
        // given (前提条件): 同じブローカーを共有する 2 プロセス
        let broker = InMemoryBroker::new();
        let node_a = InMemoryChannelLayer::new(broker.clone());
        let node_b = InMemoryChannelLayer::new(broker.clone());
        let (handler_a, mut rx_a) = collector();
        let (handler_b, mut rx_b) = collector();
        node_a.subscribe(&channel("lobby"), handler_a).await.unwrap();
        node_b.subscribe(&channel("lobby"), handler_b).await.unwrap();

        // when (操作): プロセス A から publish
        node_a
            .publish(&channel("lobby"), envelope("lobby", "hi"))
            .await
            .unwrap();

        // then (期待する結果): 送信元の A 自身にも B にも届く
        let (ch_a, env_a) = recv(&mut rx_a).await.unwrap();
        let (_, env_b) = recv(&mut rx_b).await.unwrap();
        assert_eq!(ch_a, channel("lobby"));
        assert_eq!(env_a.text().as_str(), "hi");
        assert_eq!(env_b.text().as_str(), "hi");
        assert_eq!(broker.subscriber_count(&channel("lobby")), 2);
    }

    #[tokio::test]
    async fn test_publish_preserves_order_per_publisher() {
        // テスト項目: 1 publisher のメッセージは publish 順に届く
        // given (前提条件):
        let node = InMemoryChannelLayer::new(InMemoryBroker::new());
        let (handler, mut rx) = collector();
        node.subscribe(&channel("lobby"), handler).await.unwrap();

        // when (操作):
        for i in 0..20 {
            node.publish(&channel("lobby"), envelope("lobby", &format!("m{i}")))
                .await
                .unwrap();
        }

        // then (期待する結果):
        for i in 0..20 {
            let (_, env) = recv(&mut rx).await.unwrap();
            assert_eq!(env.text().as_str(), format!("m{i}"));
        }
    }

    #[tokio::test]
    async fn test_channels_are_isolated() {
        // テスト項目: 別チャンネルへの publish は届かない
        // given (前提条件):
        let node = InMemoryChannelLayer::new(InMemoryBroker::new());
        let (handler, mut rx) = collector();
        node.subscribe(&channel("a"), handler).await.unwrap();

        // when (操作):
        node.publish(&channel("b"), envelope("b", "hi")).await.unwrap();

        // then (期待する結果):
        assert!(recv(&mut rx).await.is_none());
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery_and_releases_channel() {
        // テスト項目: unsubscribe 後は配信されず、購読者が 0 ならチャンネルが解放される
        // given (前提条件):
        let broker = InMemoryBroker::new();
        let node = InMemoryChannelLayer::new(broker.clone());
        let (handler, mut rx) = collector();
        node.subscribe(&channel("lobby"), handler).await.unwrap();

        // when (操作):
        node.unsubscribe(&channel("lobby")).await.unwrap();
        node.publish(&channel("lobby"), envelope("lobby", "hi"))
            .await
            .unwrap();

        // then (期待する結果):
        assert!(recv(&mut rx).await.is_none());
        assert_eq!(broker.subscriber_count(&channel("lobby")), 0);
    }

    #[tokio::test]
    async fn test_unsubscribe_unknown_channel_fails() {
        // テスト項目: 購読していないチャンネルの unsubscribe は NotSubscribed
        // given (前提条件):
        let node = InMemoryChannelLayer::new(InMemoryBroker::new());

        // when (操作):
        let result = node.unsubscribe(&channel("lobby")).await;

        // then (期待する結果):
        assert_eq!(
            result.unwrap_err(),
            PubSubError::NotSubscribed("chat_lobby".to_string())
        );
    }

    #[tokio::test]
    async fn test_subscribe_twice_keeps_single_subscription() {
        // テスト項目: 2 回 subscribe しても購読は 1 つで、配信も 1 回
        // given (前提条件):
        let broker = InMemoryBroker::new();
        let node = InMemoryChannelLayer::new(broker.clone());
        let (handler, mut rx) = collector();

        // when (操作):
        node.subscribe(&channel("lobby"), handler.clone()).await.unwrap();
        node.subscribe(&channel("lobby"), handler).await.unwrap();
        node.publish(&channel("lobby"), envelope("lobby", "hi"))
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(broker.subscriber_count(&channel("lobby")), 1);
        assert!(recv(&mut rx).await.is_some());
        assert!(recv(&mut rx).await.is_none());
    }

    #[tokio::test]
    async fn test_closed_broker_rejects_publish_and_subscribe() {
        // テスト項目: ブローカー停止中は publish / subscribe が Unavailable になる
        // given (前提条件):
        let broker = InMemoryBroker::new();
        let node = InMemoryChannelLayer::new(broker.clone());
        broker.close();

        // when (操作):
        let published = node.publish(&channel("lobby"), envelope("lobby", "hi")).await;
        let (handler, _rx) = collector();
        let subscribed = node.subscribe(&channel("lobby"), handler).await;

        // then (期待する結果):
        assert!(matches!(published, Err(PubSubError::Unavailable(_))));
        assert!(matches!(subscribed, Err(PubSubError::Unavailable(_))));

        // 再開後は publish できる
        broker.reopen();
        assert!(
            node.publish(&channel("lobby"), envelope("lobby", "hi"))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_backlog_is_delivered_without_loss() {
        // テスト項目: 購読側が追いつく前に大量に publish されても全件が順番通りに届く
        // given (前提条件):
        let node = InMemoryChannelLayer::new(InMemoryBroker::new());
        let (handler, mut rx) = collector();
        node.subscribe(&channel("lobby"), handler).await.unwrap();

        // when (操作): 配信タスクに制御を渡さずに連続で publish
        for i in 0..5000 {
            node.publish(&channel("lobby"), envelope("lobby", &format!("m{i}")))
                .await
                .unwrap();
        }

        // then (期待する結果):
        for i in 0..5000 {
            let (_, env) = recv(&mut rx).await.unwrap();
            assert_eq!(env.text().as_str(), format!("m{i}"));
        }
        assert!(recv(&mut rx).await.is_none());
    }

    #[tokio::test]
    async fn test_dropped_layer_releases_its_subscriptions() {
        // テスト項目: プロセス（ChannelLayer）が破棄されると購読がブローカーから外れる
        // given (前提条件):
        let broker = InMemoryBroker::new();
        let node = InMemoryChannelLayer::new(broker.clone());
        let (handler, _rx) = collector();
        node.subscribe(&channel("lobby"), handler).await.unwrap();
        assert_eq!(broker.subscriber_count(&channel("lobby")), 1);

        // when (操作):
        drop(node);

        // then (期待する結果):
        assert_eq!(broker.subscriber_count(&channel("lobby")), 0);
    }
}
