//! Server state shared by all handlers.

use serde::Deserialize;
use std::sync::Arc;

use crate::{
    domain::{ConnectionRegistry, IdentityResolver, PubSubTransport},
    infrastructure::{
        identity::QueryIdentityResolver,
        pubsub::{InMemoryBroker, InMemoryChannelLayer},
        repository::InMemoryConnectionRegistry,
    },
    usecase::RoomBroadcaster,
};

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    /// Identity claimed by the client, handed to the identity resolver
    pub username: Option<String>,
}

/// Shared application state, one per server process
pub struct AppState {
    /// Local room membership
    pub registry: Arc<dyn ConnectionRegistry>,
    /// Publishing and this process's channel subscriptions
    pub broadcaster: Arc<RoomBroadcaster>,
    /// Identity collaborator
    pub identity: Arc<dyn IdentityResolver>,
}

impl AppState {
    pub fn new(
        registry: Arc<dyn ConnectionRegistry>,
        transport: Arc<dyn PubSubTransport>,
        identity: Arc<dyn IdentityResolver>,
        channel_prefix: &str,
    ) -> Self {
        let broadcaster = Arc::new(RoomBroadcaster::new(
            transport,
            registry.clone(),
            channel_prefix,
        ));
        Self {
            registry,
            broadcaster,
            identity,
        }
    }

    /// State for one process attached to `broker`, with query-string identities
    pub fn in_memory(broker: InMemoryBroker, channel_prefix: &str) -> Self {
        Self::new(
            Arc::new(InMemoryConnectionRegistry::new()),
            Arc::new(InMemoryChannelLayer::new(broker)),
            Arc::new(QueryIdentityResolver),
            channel_prefix,
        )
    }
}
