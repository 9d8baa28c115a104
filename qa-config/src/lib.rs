//! ABOUTME: Layered configuration for the civic QA router core
//! ABOUTME: Defaults, then an optional TOML file, then `QA_*` environment variables

use qa_core::PipelineError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Per-operation LLM Gateway temperatures, each constrained to `[0.0, 0.3]`
/// by `spec.md` §4.1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayTemperatures {
    pub plan_reuse: f32,
    pub classify_mode: f32,
    pub draft_query: f32,
    pub draft_sql_answer: f32,
    pub draft_rag_answer: f32,
    pub merge_answers: f32,
}

impl Default for GatewayTemperatures {
    fn default() -> Self {
        Self {
            plan_reuse: 0.0,
            classify_mode: 0.0,
            draft_query: 0.1,
            draft_sql_answer: 0.2,
            draft_rag_answer: 0.2,
            merge_answers: 0.2,
        }
    }
}

impl GatewayTemperatures {
    fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("plan_reuse", self.plan_reuse),
            ("classify_mode", self.classify_mode),
            ("draft_query", self.draft_query),
            ("draft_sql_answer", self.draft_sql_answer),
            ("draft_rag_answer", self.draft_rag_answer),
            ("merge_answers", self.merge_answers),
        ] {
            if !(0.0..=0.3).contains(&value) {
                return Err(ConfigError::OutOfRange {
                    field: format!("llm_temperature.{name}"),
                    value: value.into(),
                    min: 0.0,
                    max: 0.3,
                });
            }
        }
        Ok(())
    }
}

/// The recognised options table of `spec.md` §6, nothing more.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    pub k_default: usize,
    pub k_max: usize,
    pub row_limit: usize,
    pub max_distance: f32,
    pub idle_ttl_minutes: u64,
    pub max_sessions: usize,
    pub turn_deadline_seconds: u64,
    pub history_window: usize,
    pub llm_model_id: String,
    pub llm_temperature: GatewayTemperatures,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            k_default: 5,
            k_max: 10,
            row_limit: 500,
            max_distance: 0.9,
            idle_ttl_minutes: 60,
            max_sessions: 100,
            turn_deadline_seconds: 30,
            history_window: 10,
            llm_model_id: "default".to_string(),
            llm_temperature: GatewayTemperatures::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: String,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("{field} must be >= {min_field} ({min_value}), got {value}")]
    BelowFloor {
        field: String,
        value: usize,
        min_field: String,
        min_value: usize,
    },
}

impl From<ConfigError> for PipelineError {
    fn from(err: ConfigError) -> Self {
        PipelineError::Configuration {
            message: err.to_string(),
        }
    }
}

impl RouterConfig {
    /// Loads defaults, overlays an optional TOML file, then overlays
    /// `QA_*`-prefixed environment variables, mirroring the teacher's
    /// layered `llmspell-config::env` approach but scoped to this crate's
    /// flat option set.
    pub fn load(toml_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = toml_path {
            let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.display().to_string(),
                source,
            })?;
            let from_file: Self = toml::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;
            config = from_file;
        }

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        apply_usize_env("QA_K_DEFAULT", &mut self.k_default);
        apply_usize_env("QA_K_MAX", &mut self.k_max);
        apply_usize_env("QA_ROW_LIMIT", &mut self.row_limit);
        apply_f32_env("QA_MAX_DISTANCE", &mut self.max_distance);
        apply_u64_env("QA_IDLE_TTL_MINUTES", &mut self.idle_ttl_minutes);
        apply_usize_env("QA_MAX_SESSIONS", &mut self.max_sessions);
        apply_u64_env("QA_TURN_DEADLINE_SECONDS", &mut self.turn_deadline_seconds);
        apply_usize_env("QA_HISTORY_WINDOW", &mut self.history_window);
        if let Ok(value) = std::env::var("QA_LLM_MODEL_ID") {
            self.llm_model_id = value;
        }
    }

    /// Validates the invariants the rest of the core relies on without
    /// re-checking: `k_max >= k_default`, per-operation temperatures in
    /// `[0.0, 0.3]`, and nonzero capacity/deadline fields.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.k_max < self.k_default {
            return Err(ConfigError::BelowFloor {
                field: "k_max".to_string(),
                value: self.k_max,
                min_field: "k_default".to_string(),
                min_value: self.k_default,
            });
        }
        if !(0.0..=1.0).contains(&self.max_distance) {
            return Err(ConfigError::OutOfRange {
                field: "max_distance".to_string(),
                value: self.max_distance.into(),
                min: 0.0,
                max: 1.0,
            });
        }
        if self.max_sessions == 0 {
            return Err(ConfigError::BelowFloor {
                field: "max_sessions".to_string(),
                value: 0,
                min_field: "1".to_string(),
                min_value: 1,
            });
        }
        if self.turn_deadline_seconds == 0 {
            return Err(ConfigError::BelowFloor {
                field: "turn_deadline_seconds".to_string(),
                value: 0,
                min_field: "1".to_string(),
                min_value: 1,
            });
        }
        self.llm_temperature.validate()
    }

    /// Clamps a caller-supplied `k` to `k_max`, silently, per the
    /// boundary behavior in `spec.md` §8.
    #[must_use]
    pub fn clamp_k(&self, requested: Option<usize>) -> usize {
        requested.unwrap_or(self.k_default).min(self.k_max)
    }
}

fn apply_usize_env(key: &str, target: &mut usize) {
    if let Ok(value) = std::env::var(key) {
        if let Ok(parsed) = value.parse() {
            *target = parsed;
        } else {
            tracing::warn!(key, value, "ignoring unparseable environment override");
        }
    }
}

fn apply_u64_env(key: &str, target: &mut u64) {
    if let Ok(value) = std::env::var(key) {
        if let Ok(parsed) = value.parse() {
            *target = parsed;
        } else {
            tracing::warn!(key, value, "ignoring unparseable environment override");
        }
    }
}

fn apply_f32_env(key: &str, target: &mut f32) {
    if let Ok(value) = std::env::var(key) {
        if let Ok(parsed) = value.parse() {
            *target = parsed;
        } else {
            tracing::warn!(key, value, "ignoring unparseable environment override");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_table() {
        let config = RouterConfig::default();
        assert_eq!(config.k_default, 5);
        assert_eq!(config.k_max, 10);
        assert_eq!(config.row_limit, 500);
        assert!((config.max_distance - 0.9).abs() < f32::EPSILON);
        assert_eq!(config.idle_ttl_minutes, 60);
        assert_eq!(config.max_sessions, 100);
        assert_eq!(config.turn_deadline_seconds, 30);
        assert_eq!(config.history_window, 10);
        config.validate().expect("defaults must validate");
    }

    #[test]
    fn clamp_k_respects_max_and_default() {
        let config = RouterConfig::default();
        assert_eq!(config.clamp_k(None), 5);
        assert_eq!(config.clamp_k(Some(3)), 3);
        assert_eq!(config.clamp_k(Some(999)), 10);
    }

    #[test]
    fn validate_rejects_k_max_below_k_default() {
        let config = RouterConfig {
            k_default: 10,
            k_max: 5,
            ..RouterConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::BelowFloor { .. })
        ));
    }

    #[test]
    fn validate_rejects_out_of_range_temperature() {
        let config = RouterConfig {
            llm_temperature: GatewayTemperatures {
                merge_answers: 0.9,
                ..GatewayTemperatures::default()
            },
            ..RouterConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { .. })
        ));
    }

    #[test]
    fn load_overlays_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("router.toml");
        std::fs::write(&path, "k_default = 3\nmax_sessions = 50\n").unwrap();

        let config = RouterConfig::load(Some(&path)).expect("should load");
        assert_eq!(config.k_default, 3);
        assert_eq!(config.max_sessions, 50);
        // Unset fields keep their defaults.
        assert_eq!(config.row_limit, 500);
    }
}
