#![forbid(unsafe_code)]

//! Mock configuration.
//!
//! A [`MockConfig`] is a plain value handed to [`crate::MockSystem::new`];
//! there is no process-wide config manager. Documents use camelCase keys so
//! fixtures written for the JavaScript host load unchanged.
//!
//! # Merging
//! [`MockConfig::load_json`] merges a partial document section by section:
//! every section present in the document is shallow-merged field by field
//! over the current values, absent sections are left untouched. Nested maps
//! such as `mockData.userSettings` are replaced, not merged.
//!
//! # Failure Modes
//! Malformed JSON, a non-object document, or a field of the wrong type all
//! surface as [`MockError::Config`]; the config is left unchanged.

use hostmock_core::MockError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// Legacy field names accepted in documents: `(section, legacy, current)`.
const LEGACY_KEYS: &[(&str, &str, &str)] = &[("behavior", "asyncDelay", "asyncDelayMs")];

/// Verbosity of mock call logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// No logging at all.
    None,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
}

impl LogLevel {
    /// The `tracing-subscriber` filter directive for this level.
    #[must_use]
    pub const fn as_directive(self) -> &'static str {
        match self {
            Self::None => "off",
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
        }
    }
}

/// How mocked calls behave.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BehaviorConfig {
    /// Blocking delay applied before every mocked call, in milliseconds.
    #[serde(alias = "asyncDelay")]
    pub async_delay_ms: u64,
    /// Whether unimplemented host APIs fail instead of returning a stub.
    pub throw_on_unimplemented: bool,
    /// Whether mocked APIs validate their arguments.
    pub validate_inputs: bool,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            async_delay_ms: 0,
            throw_on_unimplemented: false,
            validate_inputs: true,
        }
    }
}

impl BehaviorConfig {
    /// Configured per-call delay.
    #[must_use]
    pub fn async_delay(&self) -> Duration {
        Duration::from_millis(self.async_delay_ms)
    }
}

/// Feature switches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FeatureConfig {
    pub enable_state_management: bool,
    pub enable_call_recording: bool,
    pub enable_metrics: bool,
    pub enable_mock_persistence: bool,
    pub enable_playback: bool,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            enable_state_management: true,
            enable_call_recording: true,
            enable_metrics: false,
            enable_mock_persistence: false,
            enable_playback: false,
        }
    }
}

/// Seed data for mocked namespaces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MockDataConfig {
    pub workspace_folders: Vec<String>,
    pub active_extensions: Vec<String>,
    pub user_settings: Map<String, Value>,
}

impl Default for MockDataConfig {
    fn default() -> Self {
        Self {
            workspace_folders: vec!["/mock/workspace".to_string()],
            active_extensions: Vec::new(),
            user_settings: Map::new(),
        }
    }
}

/// Diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DebugConfig {
    pub log_level: LogLevel,
    /// Restrict logging to these call namespaces. Empty means all.
    pub log_namespaces: Vec<String>,
    /// Whether a failed mocked call should be logged at error level.
    pub break_on_error: bool,
}

impl DebugConfig {
    /// Whether calls in `namespace` should be logged.
    #[must_use]
    pub fn logs_namespace(&self, namespace: &str) -> bool {
        self.log_level != LogLevel::None
            && (self.log_namespaces.is_empty() || self.log_namespaces.iter().any(|n| n == namespace))
    }
}

/// Complete mock configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MockConfig {
    pub behavior: BehaviorConfig,
    pub features: FeatureConfig,
    pub mock_data: MockDataConfig,
    pub debug: DebugConfig,
}

impl MockConfig {
    /// Parse a (possibly partial) document; missing fields take defaults.
    pub fn from_json(document: &str) -> Result<Self, MockError> {
        serde_json::from_str(document).map_err(|e| MockError::Config(e.to_string()))
    }

    /// Merge a partial document over the current values, section by section.
    pub fn load_json(&mut self, document: &str) -> Result<(), MockError> {
        let patch: Value =
            serde_json::from_str(document).map_err(|e| MockError::Config(e.to_string()))?;
        let Value::Object(patch) = patch else {
            return Err(MockError::Config("document must be a JSON object".to_string()));
        };

        let mut merged = serde_json::to_value(&*self).map_err(|e| MockError::Config(e.to_string()))?;
        if let Value::Object(sections) = &mut merged {
            for (key, value) in patch {
                match (sections.get_mut(&key), value) {
                    (Some(Value::Object(current)), Value::Object(mut fields)) => {
                        for (section, legacy, field) in LEGACY_KEYS {
                            if *section == key {
                                if let Some(v) = fields.remove(*legacy) {
                                    fields.insert((*field).to_string(), v);
                                }
                            }
                        }
                        current.extend(fields);
                    }
                    (Some(slot), other) => *slot = other,
                    (None, _) => {}
                }
            }
        }

        *self = serde_json::from_value(merged).map_err(|e| MockError::Config(e.to_string()))?;
        Ok(())
    }

    /// Restore every section to its default.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Set the per-call delay.
    #[must_use]
    pub fn with_async_delay(mut self, delay: Duration) -> Self {
        self.behavior.async_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Enable or disable per-method metrics.
    #[must_use]
    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.features.enable_metrics = enabled;
        self
    }

    /// Enable or disable replay.
    #[must_use]
    pub fn with_playback(mut self, enabled: bool) -> Self {
        self.features.enable_playback = enabled;
        self
    }

    /// Enable or disable call recording.
    #[must_use]
    pub fn with_call_recording(mut self, enabled: bool) -> Self {
        self.features.enable_call_recording = enabled;
        self
    }

    /// Set the log level.
    #[must_use]
    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.debug.log_level = level;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_match_host_fixture() {
        let config = MockConfig::default();
        assert_eq!(config.behavior.async_delay_ms, 0);
        assert!(config.behavior.validate_inputs);
        assert!(!config.behavior.throw_on_unimplemented);
        assert!(config.features.enable_state_management);
        assert!(config.features.enable_call_recording);
        assert!(!config.features.enable_metrics);
        assert!(!config.features.enable_playback);
        assert_eq!(config.mock_data.workspace_folders, vec!["/mock/workspace"]);
        assert_eq!(config.debug.log_level, LogLevel::Info);
    }

    #[test]
    fn partial_document_fills_defaults() {
        let config = MockConfig::from_json(r#"{"features": {"enableMetrics": true}}"#).unwrap();
        assert!(config.features.enable_metrics);
        assert!(config.features.enable_call_recording);
        assert_eq!(config.behavior, BehaviorConfig::default());
    }

    #[test]
    fn legacy_delay_key_is_accepted() {
        let config = MockConfig::from_json(r#"{"behavior": {"asyncDelay": 25}}"#).unwrap();
        assert_eq!(config.behavior.async_delay(), Duration::from_millis(25));
    }

    #[test]
    fn legacy_delay_key_merges() {
        let mut config = MockConfig::default();
        config.load_json(r#"{"behavior": {"asyncDelay": 10}}"#).unwrap();
        assert_eq!(config.behavior.async_delay_ms, 10);
    }

    #[test]
    fn load_merges_section_wise() {
        let mut config = MockConfig::default()
            .with_metrics(true)
            .with_log_level(LogLevel::Debug);
        config
            .load_json(
                r#"{
                    "features": {"enablePlayback": true},
                    "mockData": {"userSettings": {"editor.tabSize": 2}}
                }"#,
            )
            .unwrap();

        assert!(config.features.enable_playback);
        assert!(config.features.enable_metrics, "untouched field kept");
        assert_eq!(config.debug.log_level, LogLevel::Debug, "absent section kept");
        assert_eq!(config.mock_data.workspace_folders, vec!["/mock/workspace"]);
        assert_eq!(config.mock_data.user_settings.get("editor.tabSize"), Some(&json!(2)));
    }

    #[test]
    fn invalid_documents_leave_config_unchanged() {
        let mut config = MockConfig::default().with_playback(true);
        let before = config.clone();

        for doc in ["not json", "[1, 2]", r#"{"debug": {"logLevel": "loud"}}"#] {
            let err = config.load_json(doc).unwrap_err();
            assert!(matches!(err, MockError::Config(_)), "{doc}: {err}");
        }
        assert_eq!(config, before);
    }

    #[test]
    fn reset_restores_defaults() {
        let mut config = MockConfig::default().with_playback(true).with_metrics(true);
        config.reset();
        assert_eq!(config, MockConfig::default());
    }

    #[test]
    fn namespace_filter() {
        let mut debug = DebugConfig::default();
        assert!(debug.logs_namespace("window"));
        debug.log_namespaces = vec!["workspace".into()];
        assert!(!debug.logs_namespace("window"));
        assert!(debug.logs_namespace("workspace"));
        debug.log_level = LogLevel::None;
        assert!(!debug.logs_namespace("workspace"));
    }

    #[test]
    fn log_level_serializes_lowercase() {
        assert_eq!(serde_json::to_value(LogLevel::Warn).unwrap(), json!("warn"));
        assert_eq!(LogLevel::None.as_directive(), "off");
    }
}
