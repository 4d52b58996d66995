#![forbid(unsafe_code)]

//! Cancellation handles for channel listeners and store subscribers.
//!
//! Unlike an RAII guard, dropping a [`Subscription`] does nothing: the
//! registration stays live until [`Subscription::cancel`] is called or the
//! owning channel is disposed. Clones share the same registration, which is
//! what lets a handle be returned to the caller and also parked in a
//! [`SubscriptionBag`] for bulk cleanup.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

type CancelFn = Box<dyn FnOnce()>;

/// Handle that removes one listener registration when cancelled.
#[derive(Clone)]
pub struct Subscription {
    cancel: Rc<RefCell<Option<CancelFn>>>,
}

impl Subscription {
    pub(crate) fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Rc::new(RefCell::new(Some(Box::new(cancel)))),
        }
    }

    /// A handle that is already cancelled. Cancelling it is a no-op.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            cancel: Rc::new(RefCell::new(None)),
        }
    }

    /// Remove the registration. Idempotent; also a no-op when the owning
    /// channel has been disposed or dropped.
    pub fn cancel(&self) {
        let cancel = self.cancel.borrow_mut().take();
        if let Some(cancel) = cancel {
            cancel();
        }
    }

    /// Whether `cancel` has not yet been called on this handle (or a clone).
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.cancel.borrow().is_some()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Caller-owned collection of subscriptions cancelled together.
#[derive(Debug, Default)]
pub struct SubscriptionBag {
    items: Vec<Subscription>,
}

impl SubscriptionBag {
    /// Create an empty bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Park a handle for later bulk cancellation.
    pub fn push(&mut self, subscription: Subscription) {
        self.items.push(subscription);
    }

    /// Number of handles held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the bag holds no handles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Cancel every held handle in insertion order and empty the bag.
    pub fn dispose(&mut self) {
        for subscription in self.items.drain(..) {
            subscription.cancel();
        }
    }
}

impl Extend<Subscription> for SubscriptionBag {
    fn extend<I: IntoIterator<Item = Subscription>>(&mut self, iter: I) {
        self.items.extend(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn cancel_runs_once() {
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let sub = Subscription::new(move || h.set(h.get() + 1));
        assert!(sub.is_active());

        sub.cancel();
        sub.cancel();
        assert_eq!(hits.get(), 1);
        assert!(!sub.is_active());
    }

    #[test]
    fn clones_share_registration() {
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let sub = Subscription::new(move || h.set(h.get() + 1));
        let other = sub.clone();

        other.cancel();
        assert!(!sub.is_active());
        sub.cancel();
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn drop_does_not_cancel() {
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        drop(Subscription::new(move || h.set(h.get() + 1)));
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn bag_disposes_all() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut bag = SubscriptionBag::new();
        for i in 0..3 {
            let o = Rc::clone(&order);
            bag.push(Subscription::new(move || o.borrow_mut().push(i)));
        }
        assert_eq!(bag.len(), 3);

        bag.dispose();
        assert!(bag.is_empty());
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn empty_handle_is_inert() {
        let sub = Subscription::empty();
        assert!(!sub.is_active());
        sub.cancel();
    }
}
