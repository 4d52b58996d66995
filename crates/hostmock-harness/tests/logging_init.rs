use hostmock_harness::config::{DebugConfig, LogLevel};
use hostmock_harness::init_tracing;

#[test]
fn installs_once() {
    let debug = DebugConfig {
        log_level: LogLevel::Debug,
        ..DebugConfig::default()
    };
    assert!(init_tracing(&debug));
    assert!(!init_tracing(&debug));
    tracing::debug!("subscriber installed");
}
