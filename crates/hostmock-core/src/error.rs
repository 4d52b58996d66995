#![forbid(unsafe_code)]

//! Error taxonomy shared by the core primitives and the harness.
//!
//! Only [`MockError`] is ever returned to callers. [`ListenerError`] describes
//! a listener or subscriber that panicked during delivery; it is logged and
//! counted, never propagated out of `publish` or `update`.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};

/// Failures surfaced by mock primitives and the harness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockError {
    /// The operation is not allowed in the object's current lifecycle state
    /// (e.g. subscribing to a disposed channel).
    IllegalState(&'static str),
    /// A replay was requested while playback is turned off.
    PlaybackDisabled,
    /// An argument was outside its accepted range.
    InvalidArgument(String),
    /// A configuration document could not be parsed or merged.
    Config(String),
    /// A recorded-call expectation did not hold.
    Expectation(String),
}

impl std::fmt::Display for MockError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IllegalState(msg) => write!(f, "illegal state: {}", msg),
            Self::PlaybackDisabled => write!(f, "playback is not enabled"),
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            Self::Config(msg) => write!(f, "config error: {}", msg),
            Self::Expectation(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for MockError {}

/// Which primitive a failing callback was registered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerOrigin {
    /// A listener on an `EventChannel`.
    Channel,
    /// A subscriber on an `ObservableStore`.
    Store,
}

impl std::fmt::Display for ListenerOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Channel => f.write_str("channel"),
            Self::Store => f.write_str("store"),
        }
    }
}

/// A callback that panicked while being notified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerError {
    /// Primitive the callback was registered on.
    pub origin: ListenerOrigin,
    /// Name of the channel or store, if it has one.
    pub source_name: Option<String>,
    /// Panic message, or `"unknown panic"` for non-string payloads.
    pub message: String,
}

impl ListenerError {
    pub(crate) fn new(origin: ListenerOrigin, source_name: Option<String>, message: String) -> Self {
        Self {
            origin,
            source_name,
            message,
        }
    }
}

impl std::fmt::Display for ListenerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} `{}` listener panicked: {}",
            self.origin,
            self.source_name.as_deref().unwrap_or("anonymous"),
            self.message
        )
    }
}

impl std::error::Error for ListenerError {}

/// Run a user callback behind a panic boundary, returning the panic message
/// on failure.
pub(crate) fn run_isolated(f: impl FnOnce()) -> Result<(), String> {
    catch_unwind(AssertUnwindSafe(f)).map_err(|payload| panic_message(payload.as_ref()))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
