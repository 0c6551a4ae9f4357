use serde::{Deserialize, Serialize};
use std::env;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub auth: AuthConfig,
    /// Username ensured to exist as staff on boot
    pub bootstrap_admin: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(skip_serializing)]
    pub jwt_secret: String,
}

impl Config {
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = lookup("JWT_SECRET").unwrap_or_default();
        if jwt_secret.trim().is_empty() {
            return Err(AppError::Configuration("JWT_SECRET must be set".to_string()));
        }

        Ok(Self {
            database: DatabaseConfig {
                url: lookup("DATABASE_URL").unwrap_or_else(|| "sqlite:data/blog.db".to_string()),
                max_connections: lookup("DATABASE_MAX_CONNECTIONS")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(5),
            },
            server: ServerConfig {
                host: lookup("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: lookup("SERVER_PORT")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(3000),
            },
            auth: AuthConfig { jwt_secret },
            bootstrap_admin: lookup("BOOTSTRAP_ADMIN")
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty()),
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> AppResult<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[("JWT_SECRET", "s3cret")]).unwrap();
        assert_eq!(config.database.url, "sqlite:data/blog.db");
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.server_address(), "0.0.0.0:3000");
        assert!(config.bootstrap_admin.is_none());
    }

    #[test]
    fn test_missing_secret_is_configuration_error() {
        assert!(matches!(config_from(&[]), Err(AppError::Configuration(_))));
        assert!(matches!(config_from(&[("JWT_SECRET", "  ")]), Err(AppError::Configuration(_))));
    }

    #[test]
    fn test_overrides_and_bad_numbers() {
        let config = config_from(&[
            ("JWT_SECRET", "s3cret"),
            ("SERVER_HOST", "127.0.0.1"),
            ("SERVER_PORT", "not-a-port"),
            ("DATABASE_MAX_CONNECTIONS", "12"),
            ("BOOTSTRAP_ADMIN", " root "),
        ])
        .unwrap();
        assert_eq!(config.server_address(), "127.0.0.1:3000");
        assert_eq!(config.database.max_connections, 12);
        assert_eq!(config.bootstrap_admin.as_deref(), Some("root"));
    }
}
