#![forbid(unsafe_code)]

//! Typed publish/subscribe channel with re-entrancy-safe delivery.
//!
//! # Design
//!
//! [`EventChannel<T>`] keeps its listeners in shared, reference-counted
//! storage (`Rc<RefCell<..>>`). Cloning a channel creates another handle to
//! the same listeners. The interior borrow is never held while a listener
//! runs, so listeners may subscribe, cancel, publish or dispose freely.
//!
//! # Delivery
//!
//! ```text
//! publish(a)                     pending queue
//! ├─ L1(a) ── publish(b) ──────► [(L1,b), (L2,b)]
//! ├─ L2(a)
//! └─ drain ─► L1(b), L2(b)       []
//! ```
//!
//! 1. `publish` snapshots the active listeners and invokes them in
//!    registration order. Listeners added during the pass are not included.
//! 2. A `publish` issued while a pass is running is not delivered inline:
//!    the listeners active at that moment are paired with the payload and
//!    queued.
//! 3. After its own pass, the outermost `publish` drains the queue front to
//!    back until it is empty, including entries queued while draining.
//! 4. A panicking listener is isolated: the failure is logged, the
//!    remaining listeners still run, and `publish` returns normally.
//!
//! # Failure Modes
//!
//! - **Disposal mid-pass**: no further listener is invoked and the pending
//!   queue is dropped.
//! - **Cancelled while queued**: a queued entry captured its listener when
//!   the nested publish was issued and is still delivered.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, error, trace};

use crate::error::{ListenerError, ListenerOrigin, MockError, run_isolated};
use crate::registry::{ChannelProbe, ChannelRegistry};
use crate::subscription::{Subscription, SubscriptionBag};

type Listener<T> = Rc<dyn Fn(&T)>;

/// Shared interior for [`EventChannel<T>`].
struct ChannelInner<T> {
    listeners: Vec<(u64, Listener<T>)>,
    next_id: u64,
    disposed: bool,
    delivering: bool,
    /// Deferred deliveries from re-entrant publishes, oldest first.
    pending: VecDeque<(Listener<T>, Rc<T>)>,
    name: Option<String>,
    registry: Option<ChannelRegistry>,
}

impl<T> ChannelProbe for RefCell<ChannelInner<T>> {
    fn probe_name(&self) -> Option<String> {
        self.try_borrow().ok().and_then(|inner| inner.name.clone())
    }

    fn probe_listener_count(&self) -> usize {
        self.try_borrow().map_or(0, |inner| inner.listeners.len())
    }

    fn probe_disposed(&self) -> bool {
        self.try_borrow().is_ok_and(|inner| inner.disposed)
    }
}

/// A typed event emitter.
///
/// # Invariants
///
/// 1. Each `publish` reaches every listener active when it was issued,
///    exactly once, and no other listener.
/// 2. Two payloads are never delivered nested on the call stack.
/// 3. After `dispose`, nothing is delivered and `subscribe` fails.
pub struct EventChannel<T> {
    inner: Rc<RefCell<ChannelInner<T>>>,
}

// Manual Clone: shares the same Rc.
impl<T> Clone for EventChannel<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for EventChannel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("EventChannel")
            .field("name", &inner.name)
            .field("listener_count", &inner.listeners.len())
            .field("disposed", &inner.disposed)
            .field("delivering", &inner.delivering)
            .field("pending", &inner.pending.len())
            .finish()
    }
}

impl<T: 'static> Default for EventChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> EventChannel<T> {
    /// Create an unnamed channel with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(ChannelInner {
                listeners: Vec::new(),
                next_id: 0,
                disposed: false,
                delivering: false,
                pending: VecDeque::new(),
                name: None,
                registry: None,
            })),
        }
    }

    /// Create a channel with a diagnostic name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        let channel = Self::new();
        channel.inner.borrow_mut().name = Some(name.into());
        channel
    }

    /// Report this channel to `registry`.
    #[must_use]
    pub fn with_registry(self, registry: &ChannelRegistry) -> Self {
        let weak: Weak<RefCell<ChannelInner<T>>> = Rc::downgrade(&self.inner);
        registry.register(weak);
        self.inner.borrow_mut().registry = Some(registry.clone());
        self
    }

    /// Diagnostic name, if any.
    #[must_use]
    pub fn name(&self) -> Option<String> {
        self.inner.borrow().name.clone()
    }

    /// Subscription-only view of this channel.
    #[must_use]
    pub fn event(&self) -> Event<T> {
        Event {
            channel: self.clone(),
        }
    }

    /// Register `listener`.
    ///
    /// Fails with [`MockError::IllegalState`] once the channel is disposed.
    pub fn subscribe(&self, listener: impl Fn(&T) + 'static) -> Result<Subscription, MockError> {
        self.register(Rc::new(listener))
    }

    /// Register `listener` bound to `context`; the context is passed back on
    /// every delivery.
    pub fn subscribe_bound<C: 'static>(
        &self,
        context: Rc<C>,
        listener: impl Fn(&C, &T) + 'static,
    ) -> Result<Subscription, MockError> {
        self.subscribe(move |payload| listener(&context, payload))
    }

    /// Register `listener` and also park a clone of the handle in `bag`.
    pub fn subscribe_into(
        &self,
        listener: impl Fn(&T) + 'static,
        bag: &mut SubscriptionBag,
    ) -> Result<Subscription, MockError> {
        let subscription = self.subscribe(listener)?;
        bag.push(subscription.clone());
        Ok(subscription)
    }

    fn register(&self, listener: Listener<T>) -> Result<Subscription, MockError> {
        let id = {
            let mut inner = self.inner.borrow_mut();
            if inner.disposed {
                return Err(MockError::IllegalState("event channel has been disposed"));
            }
            let id = inner.next_id;
            inner.next_id += 1;
            inner.listeners.push((id, listener));
            id
        };

        let weak = Rc::downgrade(&self.inner);
        Ok(Subscription::new(move || {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            let removed = {
                let mut inner = shared.borrow_mut();
                if inner.disposed {
                    return;
                }
                inner
                    .listeners
                    .iter()
                    .position(|(lid, _)| *lid == id)
                    .map(|idx| inner.listeners.remove(idx))
            };
            // Drop the callback outside the borrow; its captures may touch
            // this channel.
            drop(removed);
        }))
    }

    /// Deliver `payload` to every listener active right now.
    ///
    /// No-op on a disposed channel. See the module docs for the re-entrancy
    /// rule.
    pub fn publish(&self, payload: T) {
        let payload = Rc::new(payload);
        let snapshot: Vec<Listener<T>> = {
            let mut inner = self.inner.borrow_mut();
            if inner.disposed {
                trace!(channel = ?inner.name, "publish on disposed channel ignored");
                return;
            }
            let snapshot: Vec<Listener<T>> =
                inner.listeners.iter().map(|(_, l)| Rc::clone(l)).collect();
            if inner.delivering {
                inner
                    .pending
                    .extend(snapshot.into_iter().map(|l| (l, Rc::clone(&payload))));
                debug!(
                    channel = ?inner.name,
                    pending = inner.pending.len(),
                    "re-entrant publish queued"
                );
                return;
            }
            inner.delivering = true;
            snapshot
        };

        for listener in &snapshot {
            if self.is_disposed() {
                break;
            }
            self.deliver(listener, &payload);
        }
        self.drain_pending();

        self.inner.borrow_mut().delivering = false;
    }

    /// Alias for [`publish`](Self::publish).
    pub fn fire(&self, payload: T) {
        self.publish(payload);
    }

    fn drain_pending(&self) {
        loop {
            let next = {
                let mut inner = self.inner.borrow_mut();
                if inner.disposed {
                    inner.pending.clear();
                    None
                } else {
                    inner.pending.pop_front()
                }
            };
            let Some((listener, payload)) = next else {
                break;
            };
            self.deliver(&listener, &payload);
        }
    }

    fn deliver(&self, listener: &Listener<T>, payload: &T) {
        let Err(message) = run_isolated(|| listener(payload)) else {
            return;
        };
        let (name, registry) = {
            let inner = self.inner.borrow();
            (inner.name.clone(), inner.registry.clone())
        };
        let failure = ListenerError::new(ListenerOrigin::Channel, name, message);
        error!(error = %failure, "listener failed; continuing delivery");
        if let Some(registry) = registry {
            registry.record_failure();
        }
    }

    /// Drop all listeners and any queued deliveries; further publishes are
    /// ignored and further subscribes fail. Idempotent.
    pub fn dispose(&self) {
        let (listeners, pending) = {
            let mut inner = self.inner.borrow_mut();
            if inner.disposed {
                return;
            }
            inner.disposed = true;
            inner.registry = None;
            (
                std::mem::take(&mut inner.listeners),
                std::mem::take(&mut inner.pending),
            )
        };
        debug!(
            channel = ?self.name(),
            listeners = listeners.len(),
            dropped_pending = pending.len(),
            "channel disposed"
        );
    }

    /// Whether [`dispose`](Self::dispose) has been called.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.borrow().disposed
    }

    /// Whether a delivery pass is currently running.
    #[must_use]
    pub fn is_delivering(&self) -> bool {
        self.inner.borrow().delivering
    }

    /// Number of active listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.borrow().listeners.len()
    }

    /// Number of queued re-entrant deliveries not yet run.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.inner.borrow().pending.len()
    }
}

/// Subscription rights to an [`EventChannel`] without publish rights.
pub struct Event<T> {
    channel: EventChannel<T>,
}

impl<T> Clone for Event<T> {
    fn clone(&self) -> Self {
        Self {
            channel: self.channel.clone(),
        }
    }
}

impl<T> fmt::Debug for Event<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Event").field(&self.channel).finish()
    }
}

impl<T: 'static> Event<T> {
    /// See [`EventChannel::subscribe`].
    pub fn subscribe(&self, listener: impl Fn(&T) + 'static) -> Result<Subscription, MockError> {
        self.channel.subscribe(listener)
    }

    /// See [`EventChannel::subscribe_bound`].
    pub fn subscribe_bound<C: 'static>(
        &self,
        context: Rc<C>,
        listener: impl Fn(&C, &T) + 'static,
    ) -> Result<Subscription, MockError> {
        self.channel.subscribe_bound(context, listener)
    }

    /// See [`EventChannel::subscribe_into`].
    pub fn subscribe_into(
        &self,
        listener: impl Fn(&T) + 'static,
        bag: &mut SubscriptionBag,
    ) -> Result<Subscription, MockError> {
        self.channel.subscribe_into(listener, bag)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
