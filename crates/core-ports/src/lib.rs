//! Synchronous observer ports.
//!
//! A port is the publisher end of an in-thread publish-subscribe pair: the
//! automaton owns one port per event type and pushes payloads into it; any
//! number of consumers (renderer, test harness, logging taps) register
//! handlers without the automaton knowing who is listening.
//!
//! Delivery contract:
//! * Notification runs synchronously on the caller's stack, in subscription
//!   order for multicast ports. Handlers must not block indefinitely.
//! * `notify` takes `&mut self`, so a handler can never reach back into the
//!   port that is currently notifying it — reentrant subscribe/unsubscribe
//!   is rejected by the borrow checker instead of by a runtime check.
//!   Subscription changes happen between notifications.
//! * Handlers are owned by the port (`Box<dyn NotifyHandler<E>>`). Dropping
//!   the port drops its handlers; a handler is detached by `unsubscribe`
//!   with the `SubscriptionId` returned at registration.
//!
//! Payloads are passed by shared reference and are only valid for the
//! duration of the call; a handler that wants to retain data must copy it
//! into its own storage.

use std::fmt;

use thiserror::Error;
use tracing::trace;

/// Handle identifying one subscription on one port.
///
/// Ids are unique per port instance and never reused, so a stale handle
/// passed to `unsubscribe` is a no-op rather than a mis-detach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

/// Capability trait for the consumer end of a port.
///
/// Implemented automatically for any `FnMut(&E)` closure; implement it by
/// hand when the observer carries state it wants to expose by name.
pub trait NotifyHandler<E> {
    fn on_notify(&mut self, event: &E);
}

impl<E, F> NotifyHandler<E> for F
where
    F: FnMut(&E),
{
    fn on_notify(&mut self, event: &E) {
        self(event)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PortError {
    /// A unicast port refused a second subscriber. The existing subscriber
    /// keeps the port; detach it first to re-target.
    #[error("port already has a subscriber")]
    AlreadySubscribed,
}

struct Subscriber<E> {
    id: SubscriptionId,
    handler: Box<dyn NotifyHandler<E>>,
}

/// One-to-many port. Subscribers are notified in subscription order.
pub struct MulticastPort<E> {
    subscribers: Vec<Subscriber<E>>,
    next_id: u64,
}

impl<E> Default for MulticastPort<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> MulticastPort<E> {
    pub fn new() -> Self {
        Self {
            subscribers: Vec::new(),
            next_id: 0,
        }
    }

    /// Attach a handler; it stays attached until `unsubscribe` or the port
    /// is dropped.
    pub fn subscribe(&mut self, handler: impl NotifyHandler<E> + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push(Subscriber {
            id,
            handler: Box::new(handler),
        });
        trace!(target: "ports", %id, subscribers = self.subscribers.len(), "subscribe");
        id
    }

    /// Detach one subscription. Returns false if the id was never attached
    /// here or was already detached.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|s| s.id != id);
        let removed = self.subscribers.len() != before;
        if removed {
            trace!(target: "ports", %id, subscribers = self.subscribers.len(), "unsubscribe");
        }
        removed
    }

    /// Deliver `event` to every subscriber, in subscription order, on the
    /// caller's stack.
    pub fn notify(&mut self, event: &E) {
        for sub in &mut self.subscribers {
            sub.handler.on_notify(event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

/// One-to-one port for control-style inputs (a pattern sink, a text sink).
///
/// A second `subscribe` while a subscriber is attached fails with
/// [`PortError::AlreadySubscribed`]; re-targeting requires an explicit
/// `detach` first.
pub struct UnicastPort<E> {
    slot: Option<Subscriber<E>>,
    next_id: u64,
}

impl<E> Default for UnicastPort<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> UnicastPort<E> {
    pub fn new() -> Self {
        Self {
            slot: None,
            next_id: 0,
        }
    }

    pub fn subscribe(
        &mut self,
        handler: impl NotifyHandler<E> + 'static,
    ) -> Result<SubscriptionId, PortError> {
        if self.slot.is_some() {
            return Err(PortError::AlreadySubscribed);
        }
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.slot = Some(Subscriber {
            id,
            handler: Box::new(handler),
        });
        trace!(target: "ports", %id, "subscribe unicast");
        Ok(id)
    }

    /// Detach the subscription identified by `id`. A stale id is a no-op.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        match &self.slot {
            Some(s) if s.id == id => {
                self.slot = None;
                trace!(target: "ports", %id, "unsubscribe unicast");
                true
            }
            _ => false,
        }
    }

    /// Detach whatever subscriber is attached, if any.
    pub fn detach(&mut self) -> bool {
        self.slot.take().is_some()
    }

    pub fn notify(&mut self, event: &E) {
        if let Some(sub) = &mut self.slot {
            sub.handler.on_notify(event);
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.slot.is_some()
    }
}

/// Zero-payload specialization for events that carry no data
/// ("build requested", "reset requested").
pub struct SignalPort {
    inner: MulticastPort<()>,
}

impl Default for SignalPort {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalPort {
    pub fn new() -> Self {
        Self {
            inner: MulticastPort::new(),
        }
    }

    pub fn subscribe(&mut self, mut handler: impl FnMut() + 'static) -> SubscriptionId {
        self.inner.subscribe(move |_: &()| handler())
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.inner.unsubscribe(id)
    }

    pub fn notify(&mut self) {
        self.inner.notify(&());
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscriber_count()
    }
}
