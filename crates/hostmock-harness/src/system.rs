#![forbid(unsafe_code)]

//! Call interception, recording, metrics and replay.
//!
//! A [`MockSystem`] is the hub mocked namespaces route their calls through.
//! It owns the named stores those namespaces keep their state in, records
//! calls while recording is on, and announces every call on
//! [`MockSystem::on_call`].
//!
//! # Design
//! The handle is a cheap `Rc` clone; every clone drives the same system.
//! Construction is explicit from a [`MockConfig`], so two tests never share
//! a system unless they share the handle.
//!
//! # Invariants
//! 1. No internal borrow is held while a call implementation runs or while
//!    a channel delivers, so implementations and listeners may re-enter the
//!    system freely.
//! 2. A call is recorded, measured and published whether it succeeds or
//!    fails; the implementation's error is handed back unchanged.
//! 3. `dispose` leaves the system usable: the call and replay channels are
//!    replaced by fresh ones.
//!
//! # Failure Modes
//! - `replay` with playback disabled: [`MockError::PlaybackDisabled`].
//! - `replay` with a speed that is not a positive number:
//!   [`MockError::InvalidArgument`].

use crate::config::MockConfig;
use hostmock_core::{
    ChannelRegistry, Event, EventChannel, MockError, ObservableStore, StoreValue, Subscription,
    SubscriptionBag,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::mem;
use std::rc::Rc;
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, error, info};

/// How a mocked call ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CallOutcome {
    /// The implementation returned this (serialized) value.
    Returned(Value),
    /// The implementation failed with this message.
    Failed(String),
}

/// One intercepted call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockCall {
    /// Fully qualified `namespace.method`.
    pub method: String,
    pub args: Value,
    pub outcome: CallOutcome,
    /// Wall-clock time the call finished.
    pub timestamp: SystemTime,
    /// Time spent including the configured delay.
    pub duration: Duration,
}

impl MockCall {
    /// Whether the call failed.
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self.outcome, CallOutcome::Failed(_))
    }

    /// Whether this call belongs to `namespace`.
    #[must_use]
    pub fn in_namespace(&self, namespace: &str) -> bool {
        self.method
            .strip_prefix(namespace)
            .is_some_and(|rest| rest.starts_with('.'))
    }
}

/// Aggregated timings for one `namespace.method`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CallMetrics {
    pub count: u64,
    pub errors: u64,
    pub total: Duration,
    pub max: Duration,
}

impl CallMetrics {
    fn record(&mut self, duration: Duration, failed: bool) {
        self.count += 1;
        if failed {
            self.errors += 1;
        }
        self.total += duration;
        self.max = self.max.max(duration);
    }

    /// Mean call duration, zero when nothing was recorded.
    #[must_use]
    pub fn mean(&self) -> Duration {
        u32::try_from(self.count)
            .ok()
            .filter(|n| *n > 0)
            .map_or(Duration::ZERO, |n| self.total / n)
    }
}

struct SystemInner {
    config: MockConfig,
    recording: bool,
    calls: Vec<MockCall>,
    metrics: BTreeMap<String, CallMetrics>,
    stores: HashMap<String, Box<dyn Any>>,
    tracked: SubscriptionBag,
    registry: ChannelRegistry,
    on_call: EventChannel<MockCall>,
    on_replay: EventChannel<MockCall>,
}

fn call_channel(registry: &ChannelRegistry) -> EventChannel<MockCall> {
    EventChannel::named("onDidMockCall").with_registry(registry)
}

fn replay_channel(registry: &ChannelRegistry) -> EventChannel<MockCall> {
    EventChannel::named("onDidReplayCall").with_registry(registry)
}

/// Shared handle to a mock system.
pub struct MockSystem {
    inner: Rc<RefCell<SystemInner>>,
}

// Manual Clone: shares the same Rc.
impl Clone for MockSystem {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl Default for MockSystem {
    fn default() -> Self {
        Self::new(MockConfig::default())
    }
}

impl fmt::Debug for MockSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("MockSystem")
            .field("recording", &inner.recording)
            .field("calls", &inner.calls.len())
            .field("stores", &inner.stores.len())
            .field("tracked", &inner.tracked.len())
            .finish()
    }
}

impl MockSystem {
    /// Create a system driven by `config`.
    #[must_use]
    pub fn new(config: MockConfig) -> Self {
        let registry = ChannelRegistry::new();
        let on_call = call_channel(&registry);
        let on_replay = replay_channel(&registry);
        Self {
            inner: Rc::new(RefCell::new(SystemInner {
                config,
                recording: false,
                calls: Vec::new(),
                metrics: BTreeMap::new(),
                stores: HashMap::new(),
                tracked: SubscriptionBag::new(),
                registry,
                on_call,
                on_replay,
            })),
        }
    }

    /// Copy of the active configuration.
    #[must_use]
    pub fn config(&self) -> MockConfig {
        self.inner.borrow().config.clone()
    }

    /// Adjust the active configuration in place.
    pub fn configure(&self, f: impl FnOnce(&mut MockConfig)) {
        f(&mut self.inner.borrow_mut().config);
    }

    /// Registry every system-owned channel reports to.
    #[must_use]
    pub fn registry(&self) -> ChannelRegistry {
        self.inner.borrow().registry.clone()
    }

    /// Create a named store with the default history capacity.
    ///
    /// With state management enabled the store is retained under `name`
    /// (replacing any earlier store of that name) and can be looked up with
    /// [`MockSystem::store`].
    pub fn create_store<T: StoreValue>(&self, name: &str, initial: T) -> ObservableStore<T> {
        let store = ObservableStore::new(initial).named(name);
        let replaced = {
            let mut inner = self.inner.borrow_mut();
            if inner.config.features.enable_state_management {
                inner.stores.insert(name.to_string(), Box::new(store.clone()))
            } else {
                debug!(store = name, "state management disabled; store not retained");
                None
            }
        };
        drop(replaced);
        store
    }

    /// Look up a retained store. `None` if absent or of another type.
    #[must_use]
    pub fn store<T: StoreValue>(&self, name: &str) -> Option<ObservableStore<T>> {
        self.inner
            .borrow()
            .stores
            .get(name)
            .and_then(|any| any.downcast_ref::<ObservableStore<T>>())
            .cloned()
    }

    /// Run a mocked call through logging, delay, recording, publication and
    /// metrics, returning the implementation's result unchanged.
    pub fn mock_call<R, E>(
        &self,
        namespace: &str,
        method: &str,
        args: Value,
        implementation: impl FnOnce() -> Result<R, E>,
    ) -> Result<R, E>
    where
        R: Serialize,
        E: fmt::Display,
    {
        let start = Instant::now();
        let qualified = format!("{namespace}.{method}");
        let (log_call, delay, break_on_error) = {
            let inner = self.inner.borrow();
            let config = &inner.config;
            (
                config.debug.logs_namespace(namespace),
                config.behavior.async_delay(),
                config.debug.break_on_error,
            )
        };

        if log_call {
            info!(namespace, method, args = %args, "mock call");
        }
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        let result = implementation();
        let outcome = match &result {
            Ok(value) => CallOutcome::Returned(serde_json::to_value(value).unwrap_or(Value::Null)),
            Err(err) => CallOutcome::Failed(err.to_string()),
        };
        let call = MockCall {
            method: qualified,
            args,
            outcome,
            timestamp: SystemTime::now(),
            duration: start.elapsed(),
        };

        let on_call = {
            let mut inner = self.inner.borrow_mut();
            if inner.recording && inner.config.features.enable_call_recording {
                inner.calls.push(call.clone());
            }
            if inner.config.features.enable_metrics {
                inner
                    .metrics
                    .entry(call.method.clone())
                    .or_default()
                    .record(call.duration, call.is_error());
            }
            inner.on_call.clone()
        };

        if let CallOutcome::Failed(message) = &call.outcome {
            if break_on_error {
                error!(method = %call.method, error = %message, "mock call failed");
            } else if log_call {
                debug!(method = %call.method, error = %message, "mock call failed");
            }
        }
        on_call.publish(call);
        result
    }

    /// Clear recorded calls and start recording.
    pub fn start_recording(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.recording = true;
        inner.calls.clear();
    }

    /// Stop recording and return the calls recorded so far.
    ///
    /// The recorded calls are kept until the next `start_recording`.
    pub fn stop_recording(&self) -> Vec<MockCall> {
        let mut inner = self.inner.borrow_mut();
        inner.recording = false;
        inner.calls.clone()
    }

    /// Calls recorded so far, without touching the recording state.
    #[must_use]
    pub fn recorded_calls(&self) -> Vec<MockCall> {
        self.inner.borrow().calls.clone()
    }

    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.inner.borrow().recording
    }

    /// Per-method metrics, keyed by `namespace.method`.
    #[must_use]
    pub fn metrics(&self) -> BTreeMap<String, CallMetrics> {
        self.inner.borrow().metrics.clone()
    }

    /// Notifications for every mocked call.
    #[must_use]
    pub fn on_call(&self) -> Event<MockCall> {
        self.inner.borrow().on_call.event()
    }

    /// Notifications for every replayed call.
    #[must_use]
    pub fn on_replay(&self) -> Event<MockCall> {
        self.inner.borrow().on_replay.event()
    }

    /// Re-announce `calls` on [`MockSystem::on_replay`], pacing them by their
    /// recorded timestamps divided by `speed`. Returns the number replayed.
    pub fn replay(&self, calls: &[MockCall], speed: f64) -> Result<usize, MockError> {
        let channel = {
            let inner = self.inner.borrow();
            if !inner.config.features.enable_playback {
                return Err(MockError::PlaybackDisabled);
            }
            inner.on_replay.clone()
        };
        if !(speed.is_finite() && speed > 0.0) {
            return Err(MockError::InvalidArgument(format!(
                "replay speed must be a positive number, got {speed}"
            )));
        }

        for (idx, call) in calls.iter().enumerate() {
            info!(method = %call.method, args = %call.args, "replaying call");
            channel.publish(call.clone());
            if let Some(next) = calls.get(idx + 1) {
                let gap = next
                    .timestamp
                    .duration_since(call.timestamp)
                    .unwrap_or(Duration::ZERO);
                let paced = Duration::try_from_secs_f64(gap.as_secs_f64() / speed).unwrap_or(gap);
                if !paced.is_zero() {
                    std::thread::sleep(paced);
                }
            }
        }
        Ok(calls.len())
    }

    /// Keep `subscription` alive until [`MockSystem::dispose`].
    pub fn track(&self, subscription: Subscription) {
        self.inner.borrow_mut().tracked.push(subscription);
    }

    /// Number of tracked subscriptions.
    #[must_use]
    pub fn tracked_len(&self) -> usize {
        self.inner.borrow().tracked.len()
    }

    /// Cancel tracked subscriptions, retire the system channels, forget
    /// stores and clear recorded calls and metrics.
    pub fn dispose(&self) {
        let (mut tracked, stores, on_call, on_replay) = {
            let mut inner = self.inner.borrow_mut();
            let registry = inner.registry.clone();
            inner.calls.clear();
            inner.metrics.clear();
            (
                mem::take(&mut inner.tracked),
                mem::take(&mut inner.stores),
                mem::replace(&mut inner.on_call, call_channel(&registry)),
                mem::replace(&mut inner.on_replay, replay_channel(&registry)),
            )
        };
        let cancelled = tracked.len();
        tracked.dispose();
        on_call.dispose();
        on_replay.dispose();
        debug!(subscriptions = cancelled, stores = stores.len(), "mock system disposed");
        drop(stores);
    }
}
