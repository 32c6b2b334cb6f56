use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::model::Event;

const CHANNEL_CAPACITY: usize = 256;

/// Broadcast hub for committed scheduling events, one channel per provider.
/// Embedders subscribe to push calendar updates to connected clients.
pub struct NotifyHub {
    channels: DashMap<String, broadcast::Sender<Event>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to events for a provider. Creates the channel if needed.
    pub fn subscribe(&self, provider_id: &str) -> broadcast::Receiver<Event> {
        let sender = self
            .channels
            .entry(provider_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Publish a committed event. No-op if nobody is listening.
    pub fn send(&self, provider_id: &str, event: &Event) {
        if let Some(sender) = self.channels.get(provider_id) {
            let _ = sender.send(event.clone());
        }
    }

    pub fn remove(&self, provider_id: &str) {
        self.channels.remove(provider_id);
    }
}
