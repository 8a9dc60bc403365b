//! Resource subscription bookkeeping (§4.5): the server tracks which
//! subscribers are watching which resource URIs and fans out
//! `notifications/resources/updated`; the client tracks which URIs it has
//! subscribed to and routes incoming update notifications to a caller-owned
//! sink.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use tokio::sync::mpsc;

/// Server-side subscription table: resource URI to the set of subscriber ids
/// currently watching it. Subscriber identity is opaque to this module — a
/// connection id, a session id, whatever the embedding server uses.
#[derive(Default)]
pub struct SubscriptionRegistry {
    by_uri: Mutex<HashMap<String, HashSet<String>>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `subscriber` wants updates for `uri`.
    pub fn subscribe(&self, uri: &str, subscriber: &str) {
        self.by_uri
            .lock()
            .unwrap()
            .entry(uri.to_string())
            .or_default()
            .insert(subscriber.to_string());
    }

    /// Stops `subscriber` from watching `uri`. A no-op if it wasn't watching.
    pub fn unsubscribe(&self, uri: &str, subscriber: &str) {
        let mut guard = self.by_uri.lock().unwrap();
        if let Some(subscribers) = guard.get_mut(uri) {
            subscribers.remove(subscriber);
            if subscribers.is_empty() {
                guard.remove(uri);
            }
        }
    }

    /// Drops every subscription held by `subscriber`, e.g. on disconnect.
    pub fn remove_subscriber(&self, subscriber: &str) {
        let mut guard = self.by_uri.lock().unwrap();
        guard.retain(|_, subscribers| {
            subscribers.remove(subscriber);
            !subscribers.is_empty()
        });
    }

    /// A point-in-time snapshot of who is watching `uri`, taken under the
    /// lock and then released before the caller fans out notifications —
    /// per §5's "never hold a lock across an await" discipline.
    pub fn subscribers_of(&self, uri: &str) -> Vec<String> {
        self.by_uri
            .lock()
            .unwrap()
            .get(uri)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_subscribed(&self, uri: &str, subscriber: &str) -> bool {
        self.by_uri
            .lock()
            .unwrap()
            .get(uri)
            .is_some_and(|set| set.contains(subscriber))
    }
}

/// Client-side subscription table: resource URI to the channel an update
/// notification for that URI is relayed to.
#[derive(Default)]
pub struct SubscriptionSinks {
    sinks: Mutex<HashMap<String, mpsc::UnboundedSender<ResourceUpdate>>>,
}

/// A `notifications/resources/updated` payload relayed to a subscriber.
#[derive(Debug, Clone)]
pub struct ResourceUpdate {
    pub uri: String,
}

impl SubscriptionSinks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `sink` to receive updates for `uri`, replacing any prior
    /// sink for the same URI.
    pub fn register(&self, uri: impl Into<String>, sink: mpsc::UnboundedSender<ResourceUpdate>) {
        self.sinks.lock().unwrap().insert(uri.into(), sink);
    }

    pub fn unregister(&self, uri: &str) {
        self.sinks.lock().unwrap().remove(uri);
    }

    /// Delivers an update to the registered sink for `uri`, if any. Silently
    /// drops updates for URIs the caller never subscribed to (the server may
    /// be slow to observe an `unsubscribe`) and updates whose receiver has
    /// since been dropped.
    pub fn deliver(&self, uri: &str) {
        let sink = self.sinks.lock().unwrap().get(uri).cloned();
        if let Some(sink) = sink {
            let _ = sink.send(ResourceUpdate {
                uri: uri.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_tracks_multiple_subscribers_per_uri() {
        let reg = SubscriptionRegistry::new();
        reg.subscribe("file:///a", "conn-1");
        reg.subscribe("file:///a", "conn-2");
        let mut subs = reg.subscribers_of("file:///a");
        subs.sort();
        assert_eq!(subs, vec!["conn-1".to_string(), "conn-2".to_string()]);
    }

    #[test]
    fn unsubscribe_removes_only_that_subscriber() {
        let reg = SubscriptionRegistry::new();
        reg.subscribe("file:///a", "conn-1");
        reg.subscribe("file:///a", "conn-2");
        reg.unsubscribe("file:///a", "conn-1");
        assert_eq!(reg.subscribers_of("file:///a"), vec!["conn-2".to_string()]);
    }

    #[test]
    fn remove_subscriber_clears_every_uri_it_watched() {
        let reg = SubscriptionRegistry::new();
        reg.subscribe("file:///a", "conn-1");
        reg.subscribe("file:///b", "conn-1");
        reg.remove_subscriber("conn-1");
        assert!(reg.subscribers_of("file:///a").is_empty());
        assert!(reg.subscribers_of("file:///b").is_empty());
    }

    #[tokio::test]
    async fn client_sink_receives_delivered_updates() {
        let sinks = SubscriptionSinks::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        sinks.register("file:///a", tx);
        sinks.deliver("file:///a");
        let update = rx.recv().await.unwrap();
        assert_eq!(update.uri, "file:///a");
    }

    #[tokio::test]
    async fn delivery_to_an_unregistered_uri_is_a_silent_no_op() {
        let sinks = SubscriptionSinks::new();
        sinks.deliver("file:///unknown");
    }
}
