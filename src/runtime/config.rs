//! Worker and dispatch configuration.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Environment variable naming the deployment environment.
pub const ENV_VAR: &str = "APP_ENV";

/// Deployment environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Testing,
    Upstream,
    Production,
}

impl Environment {
    /// Read [`ENV_VAR`]. Unset means development.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var(ENV_VAR) {
            Ok(value) => value.parse(),
            Err(_) => {
                warn!("{} is not set, assuming development", ENV_VAR);
                Ok(Environment::Development)
            }
        }
    }

    /// Production hides failure diagnostics from clients.
    pub fn is_production(&self) -> bool {
        *self == Environment::Production
    }

    pub fn is_development(&self) -> bool {
        *self == Environment::Development
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Testing => "testing",
            Environment::Upstream => "upstream",
            Environment::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" => Ok(Environment::Development),
            "testing" => Ok(Environment::Testing),
            "upstream" => Ok(Environment::Upstream),
            "production" => Ok(Environment::Production),
            _ => Err(ConfigError::UnknownEnvironment(s.to_string())),
        }
    }
}

/// Settings the coordinator needs for every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchConfig {
    pub environment: Environment,
    /// Cookie carrying the session id.
    pub session_cookie: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            session_cookie: "sid".to_string(),
        }
    }
}

impl DispatchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    pub fn session_cookie(mut self, name: impl Into<String>) -> Self {
        self.session_cookie = name.into();
        self
    }
}

/// Configuration for the worker server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Number of worker threads, each with its own coordinator.
    pub workers: usize,
    /// Maximum request body size in bytes.
    pub max_body_size: usize,
    pub dispatch: DispatchConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::for_environment(Environment::default())
    }
}

impl ServerConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults for `environment`: production runs one worker per CPU, others two.
    pub fn for_environment(environment: Environment) -> Self {
        let workers = if environment.is_production() {
            std::thread::available_parallelism().map_or(1, |n| n.get())
        } else {
            2
        };
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            workers,
            max_body_size: 10 * 1024 * 1024, // 10MB
            dispatch: DispatchConfig::new().environment(environment),
        }
    }

    /// Set the host address.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn max_body_size(mut self, bytes: usize) -> Self {
        self.max_body_size = bytes;
        self
    }

    pub fn dispatch(mut self, dispatch: DispatchConfig) -> Self {
        self.dispatch = dispatch;
        self
    }

    /// Get the bind address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_parse() {
        assert_eq!("production".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!(" Testing ".parse::<Environment>().unwrap(), Environment::Testing);
        assert!(matches!(
            "staging".parse::<Environment>(),
            Err(ConfigError::UnknownEnvironment(_))
        ));
    }

    #[test]
    fn test_environment_flags() {
        assert!(Environment::Production.is_production());
        assert!(!Environment::Upstream.is_production());
        assert!(Environment::Development.is_development());
        assert_eq!(Environment::Upstream.to_string(), "upstream");
    }

    #[test]
    fn test_worker_defaults() {
        assert_eq!(ServerConfig::for_environment(Environment::Testing).workers, 2);
        assert!(ServerConfig::for_environment(Environment::Production).workers >= 1);
        assert_eq!(ServerConfig::new().workers(0).workers, 1);
    }

    #[test]
    fn test_builder() {
        let config = ServerConfig::new()
            .host("0.0.0.0")
            .port(9000)
            .dispatch(DispatchConfig::new().session_cookie("app_sid"));
        assert_eq!(config.bind_addr(), "0.0.0.0:9000");
        assert_eq!(config.dispatch.session_cookie, "app_sid");
        assert_eq!(config.dispatch.environment, Environment::Development);
    }

    #[test]
    fn test_dispatch_config_serde() {
        let config: DispatchConfig =
            serde_json::from_str(r#"{"environment":"production","session_cookie":"sid"}"#).unwrap();
        assert!(config.environment.is_production());
    }
}
