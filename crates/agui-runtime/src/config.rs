//! Global settings and the per-endpoint execution policy resolver.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default request body ceiling (10 MiB).
pub const DEFAULT_MAX_CONTENT_LENGTH: u64 = 10 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{setting} must be one of: {expected}; got {value:?}")]
    InvalidPolicy {
        setting: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("unknown {kind} backend: {key:?}")]
    UnknownBackend { kind: &'static str, key: String },

    #[error("invalid setting {setting}: {reason}")]
    Invalid {
        setting: &'static str,
        reason: String,
    },

    #[error("failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Static bearer token accepted by the `bearer` auth backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthToken {
    pub token: String,
    pub principal: String,
    /// Path prefixes this token may call. Empty means every path.
    #[serde(default)]
    pub allowed_paths: Vec<String>,
}

/// Global settings namespace. Every key is optional in the source document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Settings {
    /// Registry key of the auth backend, `None` disables authentication.
    pub auth_backend: Option<String>,
    /// Registry key of the stream encoder.
    pub event_encoder: String,
    /// Registry key of the state backend, `None` disables load/save.
    pub state_backend: Option<String>,
    /// Directory used by the `file` state backend.
    pub state_dir: PathBuf,
    pub auth_tokens: Vec<AuthToken>,
    pub require_authentication: bool,
    /// `None` allows every origin.
    pub allowed_origins: Option<Vec<String>>,
    /// Seconds, 0 disables.
    pub sse_keepalive_interval: u64,
    /// Seconds, 0 disables.
    pub sse_timeout: u64,
    pub emit_run_lifecycle_events: bool,
    /// `"auto"`, `"safe"` or `"full"`.
    pub error_detail_policy: String,
    /// `"always"`, `"on_snapshot"` or `"disabled"`.
    pub state_save_policy: String,
    /// `None` disables the size check.
    pub max_content_length: Option<u64>,
    pub debug: bool,
    #[serde(flatten, skip_serializing)]
    pub unknown: BTreeMap<String, Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auth_backend: None,
            event_encoder: "sse".to_string(),
            state_backend: None,
            state_dir: PathBuf::from("./state"),
            auth_tokens: Vec::new(),
            require_authentication: false,
            allowed_origins: None,
            sse_keepalive_interval: 30,
            sse_timeout: 300,
            emit_run_lifecycle_events: true,
            error_detail_policy: "safe".to_string(),
            state_save_policy: "always".to_string(),
            max_content_length: Some(DEFAULT_MAX_CONTENT_LENGTH),
            debug: false,
            unknown: BTreeMap::new(),
        }
    }
}

impl Settings {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Keys present in the source document that no setting recognizes.
    pub fn unknown_keys(&self) -> impl Iterator<Item = &str> {
        self.unknown.keys().map(String::as_str)
    }

    /// Resolve the allow-list, letting an endpoint override the global one.
    pub fn resolve_allowed_origins(
        &self,
        endpoint_origins: Option<&[String]>,
    ) -> Result<Option<Vec<String>>, ConfigError> {
        let Some(origins) = endpoint_origins.or(self.allowed_origins.as_deref()) else {
            return Ok(None);
        };
        if let Some(bad) = origins.iter().find(|o| o.trim().is_empty()) {
            return Err(ConfigError::Invalid {
                setting: "ALLOWED_ORIGINS",
                reason: format!("origin entries must be non-empty, got {bad:?}"),
            });
        }
        Ok(Some(origins.to_vec()))
    }
}

/// How much of an internal error a client may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorDetail {
    /// Generic message only.
    Safe,
    /// Error text as raised.
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateSavePolicy {
    Always,
    /// Persist only when the run emitted a `STATE_SNAPSHOT`.
    OnSnapshot,
    Disabled,
}

impl FromStr for StateSavePolicy {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "always" => Ok(Self::Always),
            "on_snapshot" => Ok(Self::OnSnapshot),
            "disabled" => Ok(Self::Disabled),
            other => Err(ConfigError::InvalidPolicy {
                setting: "STATE_SAVE_POLICY",
                value: other.to_string(),
                expected: r#""always", "on_snapshot", "disabled""#,
            }),
        }
    }
}

/// Resolve the error detail policy; `"auto"` follows the debug flag.
pub fn resolve_error_policy(
    policy: Option<&str>,
    settings: &Settings,
) -> Result<ErrorDetail, ConfigError> {
    let configured = policy
        .filter(|p| !p.is_empty())
        .unwrap_or(settings.error_detail_policy.as_str());
    match configured {
        "auto" if settings.debug => Ok(ErrorDetail::Full),
        "auto" | "safe" => Ok(ErrorDetail::Safe),
        "full" => Ok(ErrorDetail::Full),
        other => Err(ConfigError::InvalidPolicy {
            setting: "ERROR_DETAIL_POLICY",
            value: other.to_string(),
            expected: r#""auto", "safe", "full""#,
        }),
    }
}

pub fn resolve_state_save_policy(
    policy: Option<&str>,
    settings: &Settings,
) -> Result<StateSavePolicy, ConfigError> {
    policy
        .filter(|p| !p.is_empty())
        .unwrap_or(settings.state_save_policy.as_str())
        .parse()
}

/// Per-endpoint overrides; `None` falls back to [`Settings`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOverrides {
    pub emit_run_lifecycle_events: Option<bool>,
    pub error_detail_policy: Option<String>,
    pub state_save_policy: Option<String>,
}

impl ExecutionOverrides {
    #[must_use]
    pub fn with_lifecycle_events(mut self, emit: bool) -> Self {
        self.emit_run_lifecycle_events = Some(emit);
        self
    }

    #[must_use]
    pub fn with_error_detail_policy(mut self, policy: impl Into<String>) -> Self {
        self.error_detail_policy = Some(policy.into());
        self
    }

    #[must_use]
    pub fn with_state_save_policy(mut self, policy: impl Into<String>) -> Self {
        self.state_save_policy = Some(policy.into());
        self
    }
}

/// Resolved policy for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionConfig {
    /// Zero disables keepalive packets.
    pub keepalive_interval: Duration,
    /// Zero disables the overall deadline.
    pub timeout: Duration,
    pub emit_run_lifecycle_events: bool,
    pub error_detail: ErrorDetail,
    pub state_save_policy: StateSavePolicy,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            keepalive_interval: Duration::from_secs(30),
            timeout: Duration::from_secs(300),
            emit_run_lifecycle_events: true,
            error_detail: ErrorDetail::Safe,
            state_save_policy: StateSavePolicy::Always,
        }
    }
}

impl ExecutionConfig {
    pub fn resolve(
        settings: &Settings,
        overrides: &ExecutionOverrides,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            keepalive_interval: Duration::from_secs(settings.sse_keepalive_interval),
            timeout: Duration::from_secs(settings.sse_timeout),
            emit_run_lifecycle_events: overrides
                .emit_run_lifecycle_events
                .unwrap_or(settings.emit_run_lifecycle_events),
            error_detail: resolve_error_policy(
                overrides.error_detail_policy.as_deref(),
                settings,
            )?,
            state_save_policy: resolve_state_save_policy(
                overrides.state_save_policy.as_deref(),
                settings,
            )?,
        })
    }

    #[must_use]
    pub fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_lifecycle_events(mut self, emit: bool) -> Self {
        self.emit_run_lifecycle_events = emit;
        self
    }

    #[must_use]
    pub fn with_error_detail(mut self, detail: ErrorDetail) -> Self {
        self.error_detail = detail;
        self
    }

    #[must_use]
    pub fn with_state_save_policy(mut self, policy: StateSavePolicy) -> Self {
        self.state_save_policy = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn debug_settings(debug: bool) -> Settings {
        Settings {
            debug,
            ..Settings::default()
        }
    }

    #[test]
    fn error_policy_resolution_is_stable() {
        for debug in [false, true] {
            let settings = debug_settings(debug);
            for _ in 0..3 {
                assert_eq!(
                    resolve_error_policy(Some("safe"), &settings).unwrap(),
                    ErrorDetail::Safe
                );
                assert_eq!(
                    resolve_error_policy(Some("full"), &settings).unwrap(),
                    ErrorDetail::Full
                );
            }
        }
        assert_eq!(
            resolve_error_policy(Some("auto"), &debug_settings(false)).unwrap(),
            ErrorDetail::Safe
        );
        assert_eq!(
            resolve_error_policy(Some("auto"), &debug_settings(true)).unwrap(),
            ErrorDetail::Full
        );
    }

    #[test]
    fn error_policy_falls_back_to_settings() {
        let settings = Settings {
            error_detail_policy: "full".into(),
            ..Settings::default()
        };
        assert_eq!(
            resolve_error_policy(None, &settings).unwrap(),
            ErrorDetail::Full
        );
        assert_eq!(
            resolve_error_policy(Some(""), &settings).unwrap(),
            ErrorDetail::Full
        );
    }

    #[test]
    fn invalid_error_policy_is_a_config_error() {
        let err = resolve_error_policy(Some("verbose"), &Settings::default()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidPolicy {
                setting: "ERROR_DETAIL_POLICY",
                ..
            }
        ));
    }

    #[test]
    fn state_save_policy_accepts_only_known_values() {
        let settings = Settings::default();
        assert_eq!(
            resolve_state_save_policy(None, &settings).unwrap(),
            StateSavePolicy::Always
        );
        assert_eq!(
            resolve_state_save_policy(Some("on_snapshot"), &settings).unwrap(),
            StateSavePolicy::OnSnapshot
        );
        assert_eq!(
            resolve_state_save_policy(Some("disabled"), &settings).unwrap(),
            StateSavePolicy::Disabled
        );
        assert!(resolve_state_save_policy(Some("sometimes"), &settings).is_err());
    }

    #[test]
    fn resolve_applies_overrides_over_settings() {
        let settings = Settings {
            sse_keepalive_interval: 0,
            sse_timeout: 5,
            emit_run_lifecycle_events: true,
            ..Settings::default()
        };
        let overrides = ExecutionOverrides::default()
            .with_lifecycle_events(false)
            .with_error_detail_policy("full")
            .with_state_save_policy("on_snapshot");
        let config = ExecutionConfig::resolve(&settings, &overrides).unwrap();
        assert_eq!(config.keepalive_interval, Duration::ZERO);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert!(!config.emit_run_lifecycle_events);
        assert_eq!(config.error_detail, ErrorDetail::Full);
        assert_eq!(config.state_save_policy, StateSavePolicy::OnSnapshot);
    }

    #[test]
    fn settings_document_uses_upper_case_keys_and_keeps_unknown_ones() {
        let settings = Settings::from_json_str(
            r#"{
                "SSE_TIMEOUT": 1,
                "SSE_KEEPALIVE_INTERVAL": 0,
                "ALLOWED_ORIGINS": ["https://app.example"],
                "MAX_CONTENT_LENGTH": null,
                "SSE_TIMEOUTT": 3
            }"#,
        )
        .unwrap();
        assert_eq!(settings.sse_timeout, 1);
        assert_eq!(settings.sse_keepalive_interval, 0);
        assert_eq!(settings.max_content_length, None);
        assert_eq!(settings.state_save_policy, "always");
        assert_eq!(settings.unknown_keys().collect::<Vec<_>>(), vec!["SSE_TIMEOUTT"]);
    }

    #[test]
    fn malformed_allow_list_fails_to_parse() {
        assert!(Settings::from_json_str(r#"{"ALLOWED_ORIGINS": "https://a"}"#).is_err());
    }

    #[test]
    fn endpoint_origins_override_global_allow_list() {
        let settings = Settings {
            allowed_origins: Some(vec!["https://global".into()]),
            ..Settings::default()
        };
        let endpoint = vec!["https://endpoint".to_string()];
        assert_eq!(
            settings.resolve_allowed_origins(Some(&endpoint)).unwrap(),
            Some(endpoint.clone())
        );
        assert_eq!(
            settings.resolve_allowed_origins(None).unwrap(),
            Some(vec!["https://global".to_string()])
        );
        assert!(settings
            .resolve_allowed_origins(Some(&[" ".to_string()]))
            .is_err());
    }
}
