#![forbid(unsafe_code)]

//! Opt-in diagnostics over a group of event channels.
//!
//! A [`ChannelRegistry`] is an ordinary value passed to the channels that
//! should report to it; there is no process-wide instance. Channels are held
//! weakly, so registering never extends a channel's lifetime, and dropped or
//! disposed channels fall out of every count.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

/// Read-only view of a registered channel.
pub(crate) trait ChannelProbe {
    fn probe_name(&self) -> Option<String>;
    fn probe_listener_count(&self) -> usize;
    fn probe_disposed(&self) -> bool;
}

#[derive(Default)]
struct RegistryInner {
    channels: Vec<Weak<dyn ChannelProbe>>,
    listener_failures: u64,
}

impl RegistryInner {
    fn prune(&mut self) {
        self.channels
            .retain(|w| w.upgrade().is_some_and(|probe| !probe.probe_disposed()));
    }
}

/// Shared handle to a diagnostic registry. Clones observe the same registry.
#[derive(Clone, Default)]
pub struct ChannelRegistry {
    inner: Rc<RefCell<RegistryInner>>,
}

impl ChannelRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&self, probe: Weak<dyn ChannelProbe>) {
        let mut inner = self.inner.borrow_mut();
        inner.prune();
        inner.channels.push(probe);
    }

    pub(crate) fn record_failure(&self) {
        self.inner.borrow_mut().listener_failures += 1;
    }

    /// Number of registered channels that are neither disposed nor dropped.
    #[must_use]
    pub fn count(&self) -> usize {
        let mut inner = self.inner.borrow_mut();
        inner.prune();
        inner.channels.len()
    }

    /// Listener counts per live channel, keyed by channel name.
    ///
    /// Unnamed channels are reported under `"anonymous"`; channels sharing a
    /// name have their counts summed.
    #[must_use]
    pub fn listener_counts(&self) -> BTreeMap<String, usize> {
        let mut inner = self.inner.borrow_mut();
        inner.prune();
        let mut counts = BTreeMap::new();
        for probe in inner.channels.iter().filter_map(Weak::upgrade) {
            let name = probe.probe_name().unwrap_or_else(|| "anonymous".to_string());
            *counts.entry(name).or_insert(0) += probe.probe_listener_count();
        }
        counts
    }

    /// Total listener panics isolated by registered channels.
    #[must_use]
    pub fn listener_failures(&self) -> u64 {
        self.inner.borrow().listener_failures
    }
}

impl fmt::Debug for ChannelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("ChannelRegistry")
            .field("tracked", &inner.channels.len())
            .field("listener_failures", &inner.listener_failures)
            .finish()
    }
}
