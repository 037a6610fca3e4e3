//! In-process typed pub/sub between the transport and UI consumers.
//!
//! Handlers are keyed by [`EventKind`] and run in registration order.
//! Registering returns a [`Subscription`] token; removal goes through the
//! token, never through handler identity.

use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::domain::{EventKind, ReceivedEnvelope};

/// What a handler receives.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatched {
    /// The transport connected.
    Connected,
    /// The transport disconnected.
    Disconnected {
        /// Transport-provided reason.
        reason: String,
    },
    /// A connection attempt failed.
    ConnectError {
        /// Rendered error.
        error: String,
    },
    /// A domain event arrived from the server.
    Event(ReceivedEnvelope),
}

impl Dispatched {
    /// The kind this item is dispatched under.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Connected => EventKind::Connect,
            Self::Disconnected { .. } => EventKind::Disconnect,
            Self::ConnectError { .. } => EventKind::ConnectError,
            Self::Event(received) => received.kind().clone(),
        }
    }
}

type Handler = Arc<dyn Fn(&Dispatched) -> anyhow::Result<()> + Send + Sync>;

/// Token identifying one registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subscription {
    id: u64,
    kind: EventKind,
}

impl Subscription {
    /// The kind this registration listens to.
    #[must_use]
    pub const fn kind(&self) -> &EventKind {
        &self.kind
    }
}

/// Handler registry keyed by event kind.
#[derive(Default)]
pub struct Dispatcher {
    handlers: Mutex<HashMap<EventKind, Vec<(u64, Handler)>>>,
    next_id: AtomicU64,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let map = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
        let counts: HashMap<&str, usize> = map.iter().map(|(k, v)| (k.as_str(), v.len())).collect();
        f.debug_struct("Dispatcher").field("handlers", &counts).finish()
    }
}

impl Dispatcher {
    /// Creates an empty dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `handler` to the list for `kind`.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&Dispatched) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut map = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
        map.entry(kind.clone())
            .or_default()
            .push((id, Arc::new(handler)));
        Subscription { id, kind }
    }

    /// Removes one registration. Returns `false` if it was already gone.
    pub fn off(&self, subscription: &Subscription) -> bool {
        let mut map = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(list) = map.get_mut(&subscription.kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|(id, _)| *id != subscription.id);
        let removed = list.len() != before;
        if list.is_empty() {
            map.remove(&subscription.kind);
        }
        removed
    }

    /// Removes every handler for `kind`, returning how many were removed.
    pub fn off_all(&self, kind: &EventKind) -> usize {
        let mut map = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
        map.remove(kind).map_or(0, |list| list.len())
    }

    /// Removes every handler for every kind.
    pub fn clear(&self) {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Number of handlers registered for `kind`.
    #[must_use]
    pub fn handler_count(&self, kind: &EventKind) -> usize {
        let map = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
        map.get(kind).map_or(0, Vec::len)
    }

    /// Invokes every handler registered for the item's kind, in
    /// registration order. A handler that errors or panics is logged and
    /// skipped. Returns the number of handlers that completed successfully.
    pub fn dispatch(&self, item: &Dispatched) -> usize {
        let kind = item.kind();
        let snapshot: Vec<Handler> = {
            let map = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
            match map.get(&kind) {
                Some(list) => list.iter().map(|(_, h)| Arc::clone(h)).collect(),
                None => return 0,
            }
        };

        let mut ok = 0;
        for (index, handler) in snapshot.iter().enumerate() {
            match catch_unwind(AssertUnwindSafe(|| handler(item))) {
                Ok(Ok(())) => ok += 1,
                Ok(Err(e)) => {
                    tracing::warn!(event_type = %kind, handler = index, error = %e, "event handler failed");
                }
                Err(_) => {
                    tracing::error!(event_type = %kind, handler = index, "event handler panicked");
                }
            }
        }
        ok
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::domain::Envelope;

    fn order_event() -> Dispatched {
        let Ok(env) = Envelope::from_parts(
            EventKind::OrderStatusUpdated,
            json!({"orderId": "O1", "message": "Shipped"}),
        ) else {
            panic!("bad envelope");
        };
        Dispatched::Event(ReceivedEnvelope::stamp(env))
    }

    #[test]
    fn handlers_run_once_in_registration_order() {
        let dispatcher = Dispatcher::new();
        let calls = Arc::new(Mutex::new(Vec::new()));
        for n in 0..4 {
            let calls = Arc::clone(&calls);
            dispatcher.on(EventKind::OrderStatusUpdated, move |_| {
                calls.lock().unwrap_or_else(PoisonError::into_inner).push(n);
                Ok(())
            });
        }

        assert_eq!(dispatcher.dispatch(&order_event()), 4);
        let calls = calls.lock().unwrap_or_else(PoisonError::into_inner);
        assert_eq!(*calls, vec![0, 1, 2, 3]);
    }

    #[test]
    fn handler_receives_payload() {
        let dispatcher = Dispatcher::new();
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        dispatcher.on(EventKind::OrderStatusUpdated, move |item| {
            *sink.lock().unwrap_or_else(PoisonError::into_inner) = Some(item.clone());
            Ok(())
        });

        let event = order_event();
        dispatcher.dispatch(&event);
        assert_eq!(*seen.lock().unwrap_or_else(PoisonError::into_inner), Some(event));
    }

    #[test]
    fn failing_handlers_do_not_stop_the_rest() {
        let dispatcher = Dispatcher::new();
        let reached = Arc::new(AtomicU64::new(0));

        dispatcher.on(EventKind::OrderStatusUpdated, |_| anyhow::bail!("boom"));
        dispatcher.on(EventKind::OrderStatusUpdated, |_| panic!("handler panic"));
        let counter = Arc::clone(&reached);
        dispatcher.on(EventKind::OrderStatusUpdated, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert_eq!(dispatcher.dispatch(&order_event()), 1);
        assert_eq!(reached.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn off_removes_only_that_registration() {
        let dispatcher = Dispatcher::new();
        let hits = Arc::new(AtomicU64::new(0));

        let first = {
            let hits = Arc::clone(&hits);
            dispatcher.on(EventKind::OrderStatusUpdated, move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        };
        let hits2 = Arc::clone(&hits);
        dispatcher.on(EventKind::OrderStatusUpdated, move |_| {
            hits2.fetch_add(10, Ordering::SeqCst);
            Ok(())
        });

        assert!(dispatcher.off(&first));
        assert!(!dispatcher.off(&first));
        dispatcher.dispatch(&order_event());
        assert_eq!(hits.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn off_all_and_clear() {
        let dispatcher = Dispatcher::new();
        dispatcher.on(EventKind::Connect, |_| Ok(()));
        dispatcher.on(EventKind::Connect, |_| Ok(()));
        dispatcher.on(EventKind::Disconnect, |_| Ok(()));

        assert_eq!(dispatcher.off_all(&EventKind::Connect), 2);
        assert_eq!(dispatcher.handler_count(&EventKind::Connect), 0);
        assert_eq!(dispatcher.handler_count(&EventKind::Disconnect), 1);

        dispatcher.clear();
        assert_eq!(
            dispatcher.dispatch(&Dispatched::Disconnected {
                reason: "bye".to_string()
            }),
            0
        );
    }

    #[test]
    fn unknown_kind_is_a_no_op() {
        let dispatcher = Dispatcher::new();
        assert_eq!(dispatcher.dispatch(&Dispatched::Connected), 0);
    }

    #[test]
    fn handler_may_register_during_dispatch() {
        let dispatcher = Arc::new(Dispatcher::new());
        let inner = Arc::clone(&dispatcher);
        dispatcher.on(EventKind::Connect, move |_| {
            inner.on(EventKind::Disconnect, |_| Ok(()));
            Ok(())
        });

        assert_eq!(dispatcher.dispatch(&Dispatched::Connected), 1);
        assert_eq!(dispatcher.handler_count(&EventKind::Disconnect), 1);
    }
}
