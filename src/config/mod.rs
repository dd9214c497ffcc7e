/// Configuration management for the actorflow server
///
/// Handles server configuration, the flow definitions directory and the
/// execution defaults applied to every run.

use crate::runtime::context::{ErrorHandling, ExecutionSettings};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Flow definitions storage
    pub flows: FlowsConfig,
    /// Execution defaults
    pub execution: ExecutionConfig,
    /// Log filter directive used when RUST_LOG is unset (e.g. "info", "actorflow=debug")
    pub log_level: String,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Server port number
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowsConfig {
    /// Directory holding one `<id>.json` file per flow (default: "flows")
    pub definitions_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Mode used for flows that don't choose one themselves
    pub error_handling: ErrorHandling,
    /// Upper bound for external commands without their own timeout, 0 means none
    pub command_timeout_ms: Option<u64>,
}

impl Config {
    /// Settings handed to the execution engine
    pub fn execution_settings(&self) -> ExecutionSettings {
        ExecutionSettings {
            command_timeout: self
                .execution
                .command_timeout_ms
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis),
        }
    }
}

impl Default for Config {
    /// Default configuration with ENV_VAR support for k8s/container deployment
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: std::env::var("ACTORFLOW_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: std::env::var("ACTORFLOW_PORT")
                    .unwrap_or_else(|_| "3004".to_string())
                    .parse()
                    .unwrap_or(3004),
            },
            flows: FlowsConfig {
                definitions_dir: std::env::var("ACTORFLOW_FLOWS_DIR")
                    .unwrap_or_else(|_| "flows".to_string()),
            },
            execution: ExecutionConfig {
                error_handling: std::env::var("ACTORFLOW_ERROR_HANDLING")
                    .ok()
                    .and_then(|mode| mode.parse().ok())
                    .unwrap_or_default(),
                command_timeout_ms: std::env::var("ACTORFLOW_COMMAND_TIMEOUT_MS")
                    .ok()
                    .and_then(|ms| ms.parse().ok())
                    .filter(|ms: &u64| *ms > 0),
            },
            log_level: std::env::var("ACTORFLOW_LOG").unwrap_or_else(|_| "info".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_settings_follow_timeout() {
        let mut config = Config::default();
        config.execution.command_timeout_ms = Some(1500);
        assert_eq!(
            config.execution_settings().command_timeout,
            Some(Duration::from_millis(1500))
        );

        config.execution.command_timeout_ms = None;
        assert_eq!(config.execution_settings().command_timeout, None);
    }

    #[test]
    fn zero_timeout_means_no_timeout() {
        let mut config = Config::default();
        config.execution.command_timeout_ms = Some(0);
        assert_eq!(config.execution_settings().command_timeout, None);
    }

    #[test]
    fn config_serializes_error_mode_in_snake_case() {
        let mut config = Config::default();
        config.execution.error_handling = ErrorHandling::ActorsAlwaysStopOnError;
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["execution"]["error_handling"], "actors_always_stop_on_error");
    }
}
