#![forbid(unsafe_code)]

//! Harness: mock system, configuration and per-test driver.
//!
//! # Role in hostmock
//! `hostmock-core` provides the event and state primitives; this crate is
//! what a test suite talks to.
//!
//! - [`MockConfig`]: serde-backed configuration with section-wise merging.
//! - [`MockSystem`]: call interception, recording, metrics and replay, plus
//!   the named stores mocked namespaces keep their state in.
//! - [`TestHarness`]: per-test setup/teardown and call expectations.
//! - [`logging`]: `tracing-subscriber` installation.
//!
//! # Example
//!
//! ```
//! use hostmock_harness::{MockConfig, MockSystem, TestHarness};
//! use serde_json::json;
//!
//! let mut harness = TestHarness::new(MockSystem::new(MockConfig::default()));
//! harness.setup();
//!
//! let answer: Result<&str, String> = harness.system().mock_call(
//!     "window",
//!     "showInformationMessage",
//!     json!(["Saved"]),
//!     || Ok("OK"),
//! );
//! assert_eq!(answer, Ok("OK"));
//! harness
//!     .expect_called("window", "showInformationMessage", Some(1))
//!     .unwrap();
//! assert_eq!(harness.teardown().len(), 1);
//! ```

pub mod config;
pub mod harness;
pub mod logging;
pub mod system;

pub use config::{BehaviorConfig, DebugConfig, FeatureConfig, LogLevel, MockConfig, MockDataConfig};
pub use harness::TestHarness;
pub use logging::init_tracing;
pub use system::{CallMetrics, CallOutcome, MockCall, MockSystem};
