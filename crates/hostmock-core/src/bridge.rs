#![forbid(unsafe_code)]

//! Turning store transitions into channel publications.
//!
//! Mocked namespaces keep their state in an [`ObservableStore`] and expose
//! `onDid*`-style notifications as [`EventChannel`]s. The helpers here wire
//! the two together with a plain store subscription; the channel itself
//! never learns about the store.

use crate::channel::EventChannel;
use crate::store::{ObservableStore, StoreValue};
use crate::subscription::Subscription;

/// Publish `select(new, previous)` on `channel` after every store update
/// for which it returns `Some`.
pub fn forward_transitions<T, U, F>(
    store: &ObservableStore<T>,
    channel: &EventChannel<U>,
    select: F,
) -> Subscription
where
    T: StoreValue,
    U: 'static,
    F: Fn(&T, &T) -> Option<U> + 'static,
{
    let channel = channel.clone();
    store.subscribe(move |next, previous| {
        if let Some(event) = select(next, previous) {
            channel.publish(event);
        }
    })
}

/// Publish the projected field whenever it differs between the previous and
/// new state.
pub fn forward_field<T, U, F>(
    store: &ObservableStore<T>,
    channel: &EventChannel<U>,
    project: F,
) -> Subscription
where
    T: StoreValue,
    U: PartialEq + 'static,
    F: Fn(&T) -> U + 'static,
{
    forward_transitions(store, channel, move |next, previous| {
        let value = project(next);
        (value != project(previous)).then_some(value)
    })
}
