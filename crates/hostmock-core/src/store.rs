#![forbid(unsafe_code)]

//! Versioned state container with bounded history and change subscribers.
//!
//! # Design
//!
//! [`ObservableStore<T>`] wraps the current value, a FIFO-bounded history of
//! snapshots and a subscriber list in shared, reference-counted storage
//! (`Rc<RefCell<..>>`). Every mutation goes through [`update`]:
//!
//! 1. The updater receives a [`Snapshot`] of the current value.
//! 2. Its result, an [`Update`], either replaces the value or merges a
//!    field patch onto it.
//! 3. The new value is appended to history (oldest entry evicted over
//!    capacity) and the version is bumped.
//! 4. Subscribers registered when notification starts are called in
//!    registration order with `(&new, &previous)` before `update` returns.
//!
//! # Failure Modes
//!
//! - **Panicking subscriber**: caught and logged; the remaining subscribers
//!   are still notified and `update` returns normally.
//! - **Nested update**: an updater or subscriber calling `update` on the same
//!   store recurses synchronously. The interior borrow is never held across
//!   user callbacks, so this does not panic, but nothing bounds the
//!   recursion either.
//!
//! [`update`]: ObservableStore::update

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::rc::Rc;
use std::time::SystemTime;

use serde_json::{Map, Value};
use tracing::{debug, error};

use crate::error::{ListenerError, ListenerOrigin, run_isolated};
use crate::snapshot::Snapshot;
use crate::subscription::Subscription;

/// History capacity used by [`ObservableStore::new`].
pub const DEFAULT_HISTORY_CAPACITY: usize = 10;

/// A value that can live in an [`ObservableStore`].
///
/// `Patch` is the partial form accepted by [`Update::Merge`]: applying it
/// overwrites only the fields it names.
pub trait StoreValue: Snapshot + 'static {
    /// Partial update shape.
    type Patch;

    /// Overwrite the fields named by `patch`, leaving the rest untouched.
    fn apply_patch(&mut self, patch: Self::Patch);
}

/// Result of an updater: a full replacement or a field patch.
pub enum Update<T: StoreValue> {
    /// Discard the current value.
    Replace(T),
    /// Shallow-merge onto the current value.
    Merge(T::Patch),
}

impl<T> fmt::Debug for Update<T>
where
    T: StoreValue + fmt::Debug,
    T::Patch: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Replace(v) => f.debug_tuple("Replace").field(v).finish(),
            Self::Merge(p) => f.debug_tuple("Merge").field(p).finish(),
        }
    }
}

impl Update<Value> {
    /// Classify a dynamic value: a JSON object is a field patch, anything
    /// else (arrays, scalars, null) replaces the current value.
    #[must_use]
    pub fn infer(value: Value) -> Self {
        match value {
            Value::Object(fields) => Self::Merge(fields),
            other => Self::Replace(other),
        }
    }
}

impl From<Value> for Update<Value> {
    fn from(value: Value) -> Self {
        Self::infer(value)
    }
}

impl StoreValue for Value {
    type Patch = Map<String, Value>;

    /// Object fields are overwritten key by key. A non-object current value
    /// becomes the patch object.
    fn apply_patch(&mut self, patch: Self::Patch) {
        match self {
            Value::Object(fields) => fields.extend(patch),
            other => *other = Value::Object(patch),
        }
    }
}

impl<V: Snapshot + 'static> StoreValue for BTreeMap<String, V> {
    type Patch = BTreeMap<String, V>;

    fn apply_patch(&mut self, patch: Self::Patch) {
        self.extend(patch);
    }
}

/// Scalars and sequences have no fields; a patch replaces them whole.
macro_rules! store_value_by_replace {
    ($($ty:ty),* $(,)?) => {
        $(
            impl StoreValue for $ty {
                type Patch = $ty;

                fn apply_patch(&mut self, patch: Self::Patch) {
                    *self = patch;
                }
            }

            impl From<$ty> for Update<$ty> {
                fn from(value: $ty) -> Self {
                    Self::Replace(value)
                }
            }
        )*
    };
}

store_value_by_replace!(bool, i32, i64, u32, u64, usize, f64, String);

impl<T: Snapshot + 'static> StoreValue for Vec<T> {
    type Patch = Vec<T>;

    fn apply_patch(&mut self, patch: Self::Patch) {
        *self = patch;
    }
}

impl<T: Snapshot + 'static> From<Vec<T>> for Update<Vec<T>> {
    fn from(value: Vec<T>) -> Self {
        Self::Replace(value)
    }
}

/// One recorded state.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry<T> {
    /// Snapshot of the value after the update.
    pub value: T,
    /// Wall-clock time the entry was recorded.
    pub timestamp: SystemTime,
    /// Store version the entry corresponds to (0 = construction).
    pub version: u64,
}

impl<T: Snapshot> Snapshot for HistoryEntry<T> {
    fn snapshot(&self) -> Self {
        Self {
            value: self.value.snapshot(),
            timestamp: self.timestamp,
            version: self.version,
        }
    }
}

type Subscriber<T> = Rc<dyn Fn(&T, &T)>;

/// Shared interior for [`ObservableStore<T>`].
struct StoreInner<T> {
    value: T,
    /// Construction-time value, kept outside the bounded history so `reset`
    /// survives eviction.
    initial: T,
    history: VecDeque<HistoryEntry<T>>,
    capacity: usize,
    version: u64,
    subscribers: Vec<(u64, Subscriber<T>)>,
    next_id: u64,
    name: Option<String>,
}

/// A shared, versioned state container.
///
/// Cloning an `ObservableStore` creates a new handle to the **same** state,
/// history and subscribers.
///
/// # Invariants
///
/// 1. `history().len() <= capacity()`; the oldest entry is evicted first.
/// 2. Each `update` appends exactly one history entry, bumps `version` by 1
///    and notifies each current subscriber exactly once.
/// 3. `reset` restores the construction-time value through `update`.
pub struct ObservableStore<T> {
    inner: Rc<RefCell<StoreInner<T>>>,
}

// Manual Clone: shares the same Rc.
impl<T> Clone for ObservableStore<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for ObservableStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("ObservableStore")
            .field("name", &inner.name)
            .field("value", &inner.value)
            .field("version", &inner.version)
            .field("history_len", &inner.history.len())
            .field("capacity", &inner.capacity)
            .field("subscriber_count", &inner.subscribers.len())
            .finish()
    }
}

impl<T: StoreValue> ObservableStore<T> {
    /// Create a store holding `initial` with the default history capacity.
    #[must_use]
    pub fn new(initial: T) -> Self {
        Self::with_capacity(initial, DEFAULT_HISTORY_CAPACITY)
    }

    /// Create a store holding `initial` that keeps at most `capacity` history
    /// entries. A capacity of 0 keeps no history.
    #[must_use]
    pub fn with_capacity(initial: T, capacity: usize) -> Self {
        let mut history = VecDeque::with_capacity(capacity.min(64));
        if capacity > 0 {
            history.push_back(HistoryEntry {
                value: initial.snapshot(),
                timestamp: SystemTime::now(),
                version: 0,
            });
        }
        Self {
            inner: Rc::new(RefCell::new(StoreInner {
                value: initial.snapshot(),
                initial,
                history,
                capacity,
                version: 0,
                subscribers: Vec::new(),
                next_id: 0,
                name: None,
            })),
        }
    }

    /// Attach a diagnostic name.
    #[must_use]
    pub fn named(self, name: impl Into<String>) -> Self {
        self.inner.borrow_mut().name = Some(name.into());
        self
    }

    /// Diagnostic name, if any.
    #[must_use]
    pub fn name(&self) -> Option<String> {
        self.inner.borrow().name.clone()
    }

    /// Snapshot of the current value.
    #[must_use]
    pub fn current(&self) -> T {
        self.inner.borrow().value.snapshot()
    }

    /// Access the current value by reference without copying.
    ///
    /// The closure must not call `update` on this store.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.borrow().value)
    }

    /// Apply `updater` to a copy of the current value, record the result and
    /// notify subscribers.
    pub fn update<U>(&self, updater: impl FnOnce(T) -> U)
    where
        U: Into<Update<T>>,
    {
        let draft = self.inner.borrow().value.snapshot();
        let change = updater(draft).into();

        let (current, previous, subscribers) = {
            let mut inner = self.inner.borrow_mut();
            let next = match change {
                Update::Replace(value) => value,
                Update::Merge(patch) => {
                    let mut merged = inner.value.snapshot();
                    merged.apply_patch(patch);
                    merged
                }
            };
            let previous = std::mem::replace(&mut inner.value, next);
            inner.version += 1;

            if inner.capacity > 0 {
                let entry = HistoryEntry {
                    value: inner.value.snapshot(),
                    timestamp: SystemTime::now(),
                    version: inner.version,
                };
                inner.history.push_back(entry);
                while inner.history.len() > inner.capacity {
                    inner.history.pop_front();
                }
            }

            debug!(
                store = ?inner.name,
                version = inner.version,
                history_len = inner.history.len(),
                subscribers = inner.subscribers.len(),
                "store updated"
            );

            let subscribers: Vec<(u64, Subscriber<T>)> = inner
                .subscribers
                .iter()
                .map(|(id, s)| (*id, Rc::clone(s)))
                .collect();
            (inner.value.snapshot(), previous, subscribers)
        };

        self.notify(&current, &previous, &subscribers);
    }

    /// Shorthand for an update that replaces the value outright.
    pub fn replace(&self, value: T) {
        self.update(move |_| Update::Replace(value));
    }

    fn notify(&self, current: &T, previous: &T, subscribers: &[(u64, Subscriber<T>)]) {
        for (id, subscriber) in subscribers {
            // Skip subscribers cancelled earlier in this pass.
            if !self.is_subscribed(*id) {
                continue;
            }
            if let Err(message) = run_isolated(|| subscriber(current, previous)) {
                let failure = ListenerError::new(ListenerOrigin::Store, self.name(), message);
                error!(error = %failure, "subscriber failed; continuing notification");
            }
        }
    }

    fn is_subscribed(&self, id: u64) -> bool {
        self.inner
            .borrow()
            .subscribers
            .iter()
            .any(|(sid, _)| *sid == id)
    }

    /// Register a change subscriber receiving `(&new, &previous)`.
    pub fn subscribe(&self, callback: impl Fn(&T, &T) + 'static) -> Subscription {
        let id = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.subscribers.push((id, Rc::new(callback)));
            id
        };

        let weak = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            let removed = {
                let mut inner = shared.borrow_mut();
                inner
                    .subscribers
                    .iter()
                    .position(|(sid, _)| *sid == id)
                    .map(|idx| inner.subscribers.remove(idx))
            };
            drop(removed);
        })
    }

    /// Copy of the recorded history, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<HistoryEntry<T>> {
        self.inner
            .borrow()
            .history
            .iter()
            .map(Snapshot::snapshot)
            .collect()
    }

    /// Restore the construction-time value via a normal update.
    pub fn reset(&self) {
        let initial = self.inner.borrow().initial.snapshot();
        self.update(move |_| Update::Replace(initial));
    }

    /// Number of updates applied since construction.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }

    /// Maximum number of retained history entries.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.borrow().capacity
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().subscribers.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
