use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::Value;

pub type Callback = Arc<dyn Fn(&Value) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

impl ListenerId {
    fn next() -> Self {
        ListenerId(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

struct Listener {
    id: ListenerId,
    event: String,
    callback: Callback,
}

/// Named event listeners. Listeners registered while the namespace is not yet
/// connected are parked and become active when the connect packet arrives.
#[derive(Default)]
pub struct Subscriptions {
    connected: bool,
    active: HashMap<String, Vec<Listener>>,
    deferred: Vec<Listener>,
}

impl Subscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn register(&mut self, event: &str, callback: Callback) -> ListenerId {
        let listener = Listener { id: ListenerId::next(), event: event.to_string(), callback };
        let id = listener.id;

        if self.connected {
            self.activate(listener);
        } else {
            tracing::debug!(event, "deferring listener until connected");
            self.deferred.push(listener);
        }
        id
    }

    /// Namespace connected: apply every parked listener.
    pub fn mark_connected(&mut self) {
        self.connected = true;
        let deferred = std::mem::take(&mut self.deferred);
        for listener in deferred {
            self.activate(listener);
        }
    }

    /// Transport lost. Active listeners stay registered for the next connect.
    pub fn mark_disconnected(&mut self) {
        self.connected = false;
    }

    /// Remove every listener for `event`. Returns how many were removed.
    pub fn remove_event(&mut self, event: &str) -> usize {
        let active = self.active.remove(event).map(|l| l.len()).unwrap_or(0);
        let before = self.deferred.len();
        self.deferred.retain(|l| l.event != event);
        active + (before - self.deferred.len())
    }

    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.deferred.len();
        self.deferred.retain(|l| l.id != id);
        if self.deferred.len() != before {
            return true;
        }

        for listeners in self.active.values_mut() {
            if let Some(pos) = listeners.iter().position(|l| l.id == id) {
                listeners.remove(pos);
                return true;
            }
        }
        false
    }

    /// Callbacks currently listening for `event`. The caller invokes them
    /// after releasing whatever lock guards this set.
    pub fn callbacks(&self, event: &str) -> Vec<Callback> {
        self.active
            .get(event)
            .map(|listeners| listeners.iter().map(|l| l.callback.clone()).collect())
            .unwrap_or_default()
    }

    pub fn listener_count(&self, event: &str) -> usize {
        let active = self.active.get(event).map(Vec::len).unwrap_or(0);
        active + self.deferred.iter().filter(|l| l.event == event).count()
    }

    fn activate(&mut self, listener: Listener) {
        self.active.entry(listener.event.clone()).or_default().push(listener);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn counting() -> (Callback, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let callback: Callback = Arc::new(move |_: &Value| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (callback, hits)
    }

    fn fire(subs: &Subscriptions, event: &str) {
        for callback in subs.callbacks(event) {
            callback(&json!({}));
        }
    }

    #[test]
    fn test_listener_registered_before_connect_is_applied_on_connect() {
        let mut subs = Subscriptions::new();
        let (callback, hits) = counting();
        subs.register("newNotification", callback);

        fire(&subs, "newNotification");
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        subs.mark_connected();
        fire(&subs, "newNotification");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_remove_event_covers_active_and_deferred() {
        let mut subs = Subscriptions::new();
        let (a, _) = counting();
        let (b, _) = counting();
        let (c, _) = counting();

        subs.register("newMessage", a);
        subs.mark_connected();
        subs.mark_disconnected();
        subs.register("newMessage", b);
        subs.register("newNotification", c);

        assert_eq!(subs.listener_count("newMessage"), 2);
        assert_eq!(subs.remove_event("newMessage"), 2);
        assert_eq!(subs.listener_count("newMessage"), 0);
        assert_eq!(subs.listener_count("newNotification"), 1);
    }

    #[test]
    fn test_remove_single_listener() {
        let mut subs = Subscriptions::new();
        subs.mark_connected();
        let (a, a_hits) = counting();
        let (b, b_hits) = counting();
        let first = subs.register("newMessage", a);
        subs.register("newMessage", b);

        assert!(subs.remove(first));
        assert!(!subs.remove(first));
        fire(&subs, "newMessage");

        assert_eq!(a_hits.load(Ordering::SeqCst), 0);
        assert_eq!(b_hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_listeners_survive_reconnect() {
        let mut subs = Subscriptions::new();
        let (callback, hits) = counting();
        subs.mark_connected();
        subs.register("newMessage", callback);

        subs.mark_disconnected();
        subs.mark_connected();
        fire(&subs, "newMessage");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
