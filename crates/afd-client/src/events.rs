//! Observer registration for client events.
//!
//! Observers are plain closures. [`Observers::subscribe`] returns a
//! [`Subscription`]; dropping it (or calling
//! [`unsubscribe`](Subscription::unsubscribe)) removes the observer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use afd_core::AfdError;
use afd_core::handshake::ServerInfo;
use afd_core::protocol::Response;
use afd_core::types::Tool;

use crate::state::ConnectionState;

/// Events emitted by a [`ConnectionManager`](crate::ConnectionManager).
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// The state changed.
    StateChange {
        /// Previous state.
        from: ConnectionState,
        /// New state.
        to: ConnectionState,
    },
    /// The handshake completed.
    Connected(ServerInfo),
    /// The connection went away, manually or not.
    Disconnected,
    /// A reconnect attempt was scheduled.
    Reconnecting {
        /// 1-based attempt number.
        attempt: u32,
        /// Configured maximum.
        max: u32,
    },
    /// Connecting failed, the transport reported an error, or reconnection
    /// gave up.
    Error(Arc<AfdError>),
    /// A response was delivered by the transport's message channel.
    Message(Response),
    /// The cached tool list was refreshed.
    ToolsChanged(Vec<Tool>),
}

impl ClientEvent {
    /// Event name as used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::StateChange { .. } => "stateChange",
            Self::Connected(_) => "connected",
            Self::Disconnected => "disconnected",
            Self::Reconnecting { .. } => "reconnecting",
            Self::Error(_) => "error",
            Self::Message(_) => "message",
            Self::ToolsChanged(_) => "toolsChanged",
        }
    }

    pub(crate) fn tools_changed(tools: &[Tool]) -> Self {
        Self::ToolsChanged(tools.to_vec())
    }
}

type Observer<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct ObserverList<E> {
    next_id: AtomicU64,
    entries: Mutex<Vec<(u64, Observer<E>)>>,
}

/// A list of observers for events of type `E`.
pub struct Observers<E> {
    list: Arc<ObserverList<E>>,
}

impl<E: 'static> Observers<E> {
    /// Create an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self {
            list: Arc::new(ObserverList {
                next_id: AtomicU64::new(1),
                entries: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Register an observer.
    #[must_use = "dropping the subscription unsubscribes the observer"]
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = self.list.next_id.fetch_add(1, Ordering::Relaxed);
        self.list
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(observer)));

        let list: Weak<ObserverList<E>> = Arc::downgrade(&self.list);
        Subscription {
            remove: Some(Box::new(move || {
                if let Some(list) = list.upgrade() {
                    list.entries
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .retain(|(entry, _)| *entry != id);
                }
            })),
        }
    }

    /// Deliver `event` to every observer, in registration order.
    pub fn emit(&self, event: &E) {
        // Snapshot so observers may subscribe or unsubscribe while handling.
        let observers: Vec<Observer<E>> = self
            .list
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();
        for observer in observers {
            observer(event);
        }
    }

    /// Number of registered observers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.list
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no observer is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E: 'static> Default for Observers<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> std::fmt::Debug for Observers<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self
            .list
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        f.debug_struct("Observers").field("count", &count).finish()
    }
}

/// Handle returned by [`Observers::subscribe`].
///
/// The observer stays registered for as long as this handle lives.
pub struct Subscription {
    remove: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Remove the observer now.
    pub fn unsubscribe(mut self) {
        self.run();
    }

    /// Keep the observer registered for the lifetime of the list.
    pub fn detach(mut self) {
        self.remove = None;
    }

    fn run(&mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.remove.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_emit_reaches_subscribers_in_order() {
        let observers = Observers::<u32>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let a = Arc::clone(&seen);
        let _first = observers.subscribe(move |e| a.lock().unwrap().push(("first", *e)));
        let b = Arc::clone(&seen);
        let _second = observers.subscribe(move |e| b.lock().unwrap().push(("second", *e)));

        observers.emit(&7);
        assert_eq!(*seen.lock().unwrap(), vec![("first", 7), ("second", 7)]);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let observers = Observers::<()>::new();
        let count = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&count);
        let subscription = observers.subscribe(move |()| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        observers.emit(&());
        drop(subscription);
        observers.emit(&());

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(observers.is_empty());
    }

    #[test]
    fn test_explicit_unsubscribe_and_detach() {
        let observers = Observers::<()>::new();
        observers.subscribe(|()| {}).unsubscribe();
        assert!(observers.is_empty());

        observers.subscribe(|()| {}).detach();
        assert_eq!(observers.len(), 1);
    }

    #[test]
    fn test_event_names() {
        assert_eq!(ClientEvent::Disconnected.name(), "disconnected");
        assert_eq!(
            ClientEvent::Reconnecting { attempt: 1, max: 5 }.name(),
            "reconnecting"
        );
    }
}
