//! Synchronous change notification.
//!
//! A [`Notifier`] owns one event queue per subscribed listener. Publishing an
//! event clones it into every queue; each listener drains its own queue when
//! it is ready to react. Nothing is delivered asynchronously and nothing is
//! lost when a listener is slow to drain.

use slotmap::{SlotMap, new_key_type};
use std::collections::VecDeque;

new_key_type! {
    /// Handle for a listener subscribed to a [`Notifier`].
    pub struct ListenerId;
}

#[derive(Debug, Clone)]
pub struct Notifier<E> {
    queues: SlotMap<ListenerId, VecDeque<E>>,
}

impl<E> Default for Notifier<E> {
    fn default() -> Self {
        Self {
            queues: SlotMap::with_key(),
        }
    }
}

impl<E: Clone> Notifier<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new listener. Only events published after this call are queued.
    pub fn subscribe(&mut self) -> ListenerId {
        self.queues.insert(VecDeque::new())
    }

    /// Drop a listener and any events still queued for it.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.queues.remove(id).is_some()
    }

    pub fn is_subscribed(&self, id: ListenerId) -> bool {
        self.queues.contains_key(id)
    }

    pub fn listener_count(&self) -> usize {
        self.queues.len()
    }

    pub fn notify(&mut self, event: E) {
        for queue in self.queues.values_mut() {
            queue.push_back(event.clone());
        }
    }

    /// Take every event queued for `id`, oldest first.
    pub fn drain(&mut self, id: ListenerId) -> Vec<E> {
        self.queues
            .get_mut(id)
            .map(|queue| queue.drain(..).collect())
            .unwrap_or_default()
    }

    pub fn pending(&self, id: ListenerId) -> usize {
        self.queues.get(id).map_or(0, VecDeque::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_listener_gets_a_copy() {
        let mut n = Notifier::new();
        let a = n.subscribe();
        n.notify(1);
        let b = n.subscribe();
        n.notify(2);

        assert_eq!(n.pending(a), 2);
        assert_eq!(n.drain(a), vec![1, 2]);
        assert_eq!(n.drain(b), vec![2]);
        assert_eq!(n.pending(a), 0);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let mut n = Notifier::new();
        let a = n.subscribe();
        assert!(n.unsubscribe(a));
        n.notify("x");
        assert!(!n.is_subscribed(a));
        assert!(n.drain(a).is_empty());
        assert!(!n.unsubscribe(a));
        assert_eq!(n.listener_count(), 0);
    }
}
