#![forbid(unsafe_code)]

//! Per-test driver around a [`MockSystem`].
//!
//! A [`TestHarness`] gives each test a clean recording window, call-count
//! expectations and a typed slot for canned user input.
//!
//! # Invariants
//! Expectations and history queries only read the recording; calls recorded
//! before an `expect_called` are still visible afterwards.

use crate::system::{MockCall, MockSystem};
use hostmock_core::{MockError, Subscription, SubscriptionBag};
use std::any::Any;
use std::time::Duration;
use tracing::debug;

/// Environment variable enabling the teardown summary.
pub const DEBUG_ENV: &str = "HOSTMOCK_DEBUG";

/// Test driver owning a mock system handle.
#[derive(Debug)]
pub struct TestHarness {
    system: MockSystem,
    subscriptions: SubscriptionBag,
    user_input: Option<Box<dyn Any>>,
}

impl TestHarness {
    /// Wrap `system`.
    #[must_use]
    pub fn new(system: MockSystem) -> Self {
        Self {
            system,
            subscriptions: SubscriptionBag::new(),
            user_input: None,
        }
    }

    /// The wrapped system.
    #[must_use]
    pub fn system(&self) -> &MockSystem {
        &self.system
    }

    /// Reset the system and open a fresh recording window.
    pub fn setup(&mut self) {
        self.system.dispose();
        self.system.start_recording();
    }

    /// Close the recording window, cancel tracked subscriptions and return
    /// the recorded calls.
    pub fn teardown(&mut self) -> Vec<MockCall> {
        let history = self.system.stop_recording();
        self.subscriptions.dispose();
        self.user_input = None;
        if std::env::var_os(DEBUG_ENV).is_some() {
            debug!(calls = history.len(), "recorded calls");
        }
        history
    }

    /// Cancel `subscription` at teardown.
    pub fn track(&mut self, subscription: Subscription) {
        self.subscriptions.push(subscription);
    }

    /// Check that `namespace.method` was called, exactly `times` times when
    /// given, at least once otherwise.
    pub fn expect_called(
        &self,
        namespace: &str,
        method: &str,
        times: Option<usize>,
    ) -> Result<(), MockError> {
        let qualified = format!("{namespace}.{method}");
        let count = self
            .system
            .recorded_calls()
            .iter()
            .filter(|c| c.method == qualified)
            .count();

        match times {
            Some(expected) if count != expected => Err(MockError::Expectation(format!(
                "expected {qualified} to be called {expected} times, but it was called {count} times"
            ))),
            None if count == 0 => Err(MockError::Expectation(format!(
                "expected {qualified} to be called, but it was not"
            ))),
            _ => Ok(()),
        }
    }

    /// Recorded calls, optionally narrowed.
    ///
    /// With both filters the method must match `namespace.method` exactly;
    /// with only a namespace every call in it matches; with only a method
    /// every namespace's `method` matches.
    #[must_use]
    pub fn call_history(&self, namespace: Option<&str>, method: Option<&str>) -> Vec<MockCall> {
        let calls = self.system.recorded_calls();
        match (namespace, method) {
            (Some(ns), Some(m)) => {
                let qualified = format!("{ns}.{m}");
                calls.into_iter().filter(|c| c.method == qualified).collect()
            }
            (Some(ns), None) => calls.into_iter().filter(|c| c.in_namespace(ns)).collect(),
            (None, Some(m)) => calls
                .into_iter()
                .filter(|c| c.method.rsplit_once('.').is_some_and(|(_, name)| name == m))
                .collect(),
            (None, None) => calls,
        }
    }

    /// Stage the answer to the next user prompt.
    pub fn mock_user_input<T: 'static>(&mut self, value: T) {
        self.user_input = Some(Box::new(value));
    }

    /// Take the staged answer if it has type `T`. A value of another type
    /// stays staged.
    pub fn take_user_input<T: 'static>(&mut self) -> Option<T> {
        let staged = self.user_input.take()?;
        match staged.downcast::<T>() {
            Ok(value) => Some(*value),
            Err(other) => {
                self.user_input = Some(other);
                None
            }
        }
    }

    /// Block the current thread for `delay`.
    pub fn simulate_delay(&self, delay: Duration) {
        std::thread::sleep(delay);
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new(MockSystem::default())
    }
}
