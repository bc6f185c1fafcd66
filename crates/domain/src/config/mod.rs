mod llm;
mod memory;
mod orchestrator;
mod sessions;

pub use llm::*;
pub use memory::*;
pub use orchestrator::*;
pub use sessions::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.orchestrator.max_cached_agents == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "orchestrator.max_cached_agents".into(),
                message: "must be greater than 0".into(),
            });
        }

        if self.orchestrator.request_timeout_ms == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "orchestrator.request_timeout_ms".into(),
                message: "must be greater than 0".into(),
            });
        }

        if self.orchestrator.agent_history_cap == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "orchestrator.agent_history_cap".into(),
                message: "must be greater than 0".into(),
            });
        }

        if self.memory.backend == MemoryBackend::Rest {
            if self.memory.base_url.is_empty() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: "memory.base_url".into(),
                    message: "base_url is required when backend = \"rest\"".into(),
                });
            } else if !self.memory.base_url.starts_with("http://")
                && !self.memory.base_url.starts_with("https://")
            {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: "memory.base_url".into(),
                    message: format!(
                        "base_url must start with http:// or https:// (got \"{}\")",
                        self.memory.base_url
                    ),
                });
            }
        }

        if self.memory.remember_queue_cap == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "memory.remember_queue_cap".into(),
                message: "must be greater than 0".into(),
            });
        }

        if self.memory.remember_workers == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "memory.remember_workers".into(),
                message: "must be greater than 0".into(),
            });
        }

        if self.memory.recall_budget_ms == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "memory.recall_budget_ms".into(),
                message: "recall budget of 0 disables memory recall entirely".into(),
            });
        }

        if self.llm.provider == LlmProviderKind::OpenaiCompat {
            if self.llm.base_url.is_empty() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: "llm.base_url".into(),
                    message: "base_url is required when provider = \"openai_compat\"".into(),
                });
            } else if !self.llm.base_url.starts_with("http://")
                && !self.llm.base_url.starts_with("https://")
            {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: "llm.base_url".into(),
                    message: format!(
                        "base_url must start with http:// or https:// (got \"{}\")",
                        self.llm.base_url
                    ),
                });
            }
        }

        if self.llm.provider == LlmProviderKind::Scripted {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "llm.provider".into(),
                message: "scripted provider is deterministic and offline (dev/test only)".into(),
            });
        }

        errors
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    /// Helper: find the first issue matching a field prefix.
    fn find_issue<'a>(issues: &'a [ConfigError], field_prefix: &str) -> Option<&'a ConfigError> {
        issues.iter().find(|e| e.field.starts_with(field_prefix))
    }

    #[test]
    fn default_config_has_no_errors() {
        let issues = Config::default().validate();
        let errors: Vec<_> = issues
            .iter()
            .filter(|e| e.severity == ConfigSeverity::Error)
            .collect();
        assert!(errors.is_empty(), "expected no errors, got: {errors:?}");
    }

    #[test]
    fn defaults_match_documented_values() {
        let cfg = Config::default();
        assert_eq!(cfg.orchestrator.max_cached_agents, 3);
        assert_eq!(cfg.orchestrator.agent_idle_minutes, 30);
        assert_eq!(cfg.orchestrator.request_timeout_ms, 30_000);
        assert_eq!(cfg.orchestrator.tool_timeout_ms, 30_000);
        assert_eq!(cfg.orchestrator.handoff_timeout_ms, 5_000);
        assert_eq!(cfg.orchestrator.fallback_strategy, FallbackStrategy::Sequential);
        assert!(cfg.orchestrator.enable_state_sharing);
        assert_eq!(cfg.orchestrator.agent_history_cap, 50);
        assert_eq!(cfg.memory.recall_budget_ms, 2_000);
        assert!(!cfg.sessions.cross_session_memory_default);
        assert!(!cfg.sessions.agent_lock_default);
    }

    #[test]
    fn zero_cache_capacity_is_error() {
        let mut cfg = Config::default();
        cfg.orchestrator.max_cached_agents = 0;
        let issues = cfg.validate();
        let issue = find_issue(&issues, "orchestrator.max_cached_agents")
            .expect("expected max_cached_agents error");
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn rest_memory_requires_base_url() {
        let mut cfg = Config::default();
        cfg.memory.backend = MemoryBackend::Rest;
        let issues = cfg.validate();
        let issue =
            find_issue(&issues, "memory.base_url").expect("expected memory.base_url error");
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn rest_memory_rejects_bad_scheme() {
        let mut cfg = Config::default();
        cfg.memory.backend = MemoryBackend::Rest;
        cfg.memory.base_url = "ftp://memory.local".into();
        let issues = cfg.validate();
        let issue = find_issue(&issues, "memory.base_url").expect("expected scheme error");
        assert!(issue.message.contains("http://"));
    }

    #[test]
    fn rest_memory_with_https_passes() {
        let mut cfg = Config::default();
        cfg.memory.backend = MemoryBackend::Rest;
        cfg.memory.base_url = "https://memory.example.com".into();
        let issues = cfg.validate();
        assert!(find_issue(&issues, "memory.base_url").is_none());
    }

    #[test]
    fn openai_compat_requires_base_url() {
        let mut cfg = Config::default();
        cfg.llm.provider = LlmProviderKind::OpenaiCompat;
        let issues = cfg.validate();
        let issue = find_issue(&issues, "llm.base_url").expect("expected llm.base_url error");
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn scripted_provider_is_warning_only() {
        let issues = Config::default().validate();
        let issue = find_issue(&issues, "llm.provider").expect("expected scripted warning");
        assert_eq!(issue.severity, ConfigSeverity::Warning);
    }

    #[test]
    fn zero_recall_budget_is_warning() {
        let mut cfg = Config::default();
        cfg.memory.recall_budget_ms = 0;
        let issues = cfg.validate();
        let issue = find_issue(&issues, "memory.recall_budget_ms").expect("expected warning");
        assert_eq!(issue.severity, ConfigSeverity::Warning);
    }

    #[test]
    fn config_parses_from_toml() {
        let toml_src = r#"
            [orchestrator]
            max_cached_agents = 5
            fallback_strategy = "parallel"

            [memory]
            backend = "rest"
            base_url = "http://localhost:7700"
            remember_queue_cap = 64

            [sessions]
            state_path = "/tmp/chatsg"
            agent_lock_default = true

            [llm]
            provider = "openai_compat"
            base_url = "http://localhost:11434/v1"
            model = "llama3.1"
        "#;
        let cfg: Config = toml::from_str(toml_src).unwrap();
        assert_eq!(cfg.orchestrator.max_cached_agents, 5);
        assert_eq!(cfg.orchestrator.fallback_strategy, FallbackStrategy::Parallel);
        assert_eq!(cfg.memory.backend, MemoryBackend::Rest);
        assert_eq!(cfg.memory.remember_queue_cap, 64);
        assert!(cfg.sessions.agent_lock_default);
        assert_eq!(cfg.llm.model, "llama3.1");
        // Unspecified fields fall back to defaults.
        assert_eq!(cfg.orchestrator.request_timeout_ms, 30_000);
    }

    #[test]
    fn config_error_display_format() {
        let err = ConfigError {
            severity: ConfigSeverity::Error,
            field: "memory.base_url".into(),
            message: "base_url is required".into(),
        };
        assert_eq!(format!("{err}"), "[ERROR] memory.base_url: base_url is required");
    }
}
