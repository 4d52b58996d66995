#![forbid(unsafe_code)]

//! Core: event channels and observable stores for host API test doubles.
//!
//! # Role in hostmock
//! Every mocked namespace is built from two primitives defined here:
//!
//! - [`EventChannel`]: typed publish/subscribe with explicit disposal and
//!   re-entrancy-safe delivery (nested publishes are queued, never nested on
//!   the call stack).
//! - [`ObservableStore`]: versioned state with a FIFO-bounded history,
//!   synchronous `(new, previous)` notifications and reset-to-initial.
//!
//! Supporting pieces:
//!
//! - [`Snapshot`]: explicit structural deep copy used at every store write
//!   boundary.
//! - [`Subscription`] / [`SubscriptionBag`]: explicit cancellation handles.
//! - [`ChannelRegistry`]: injectable channel diagnostics.
//! - [`bridge`]: store-to-channel forwarding.
//!
//! # Execution model
//! Strictly single-threaded. Both primitives use `Rc<RefCell<..>>` interiors
//! and are `!Send`; all delivery runs to completion on the caller's stack.
//!
//! # Example
//!
//! ```
//! use hostmock_core::{EventChannel, ObservableStore, bridge};
//! use serde_json::{Value, json};
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let window = ObservableStore::new(json!({"focused": true}));
//! let on_focus: EventChannel<bool> = EventChannel::named("onDidChangeWindowState");
//! bridge::forward_field(&window, &on_focus, |w: &Value| w["focused"] == json!(true));
//!
//! let last = Rc::new(Cell::new(true));
//! let sink = Rc::clone(&last);
//! on_focus.subscribe(move |f| sink.set(*f)).unwrap();
//!
//! window.update(|_| json!({"focused": false}));
//! assert!(!last.get());
//! ```

pub mod bridge;
pub mod channel;
pub mod error;
pub mod registry;
pub mod snapshot;
pub mod store;
pub mod subscription;

pub use channel::{Event, EventChannel};
pub use error::{ListenerError, ListenerOrigin, MockError};
pub use registry::ChannelRegistry;
pub use snapshot::Snapshot;
pub use store::{DEFAULT_HISTORY_CAPACITY, HistoryEntry, ObservableStore, StoreValue, Update};
pub use subscription::{Subscription, SubscriptionBag};
