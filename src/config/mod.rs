use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::access::PageBounds;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    /// Path segment all resource routes are mounted under.
    pub api_path: String,
    pub min_page_size: i64,
    pub max_page_size: i64,
    pub request_timeout_secs: u64,
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
    /// Directory served for paths no other route matches.
    pub static_dir: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub store: StoreKind,
    #[serde(skip_serializing)]
    pub url: String,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Jwt,
    Oidc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub provider: ProviderKind,
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub oidc_issuer_url: String,
    pub oidc_client_id: String,
    #[serde(skip_serializing)]
    pub oidc_client_secret: String,
    pub validation_timeout_secs: u64,
    pub role_permissions_file: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
    pub format: LogFormat,
}

impl ServerConfig {
    pub fn page_bounds(&self) -> PageBounds {
        PageBounds::new(self.min_page_size, self.max_page_size)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// `/{api_path}` with surrounding slashes normalised; empty path mounts at the root.
    pub fn api_prefix(&self) -> String {
        let trimmed = self.api_path.trim_matches('/');
        if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{}", trimmed)
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Ok(v) = env::var("RESPITE_PORT").or_else(|_| env::var("PORT")) {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }
        if let Ok(v) = env::var("RESPITE_API_PATH") {
            self.server.api_path = v;
        }
        if let Ok(v) = env::var("RESPITE_MIN_PAGE_SIZE") {
            self.server.min_page_size = v.parse().unwrap_or(self.server.min_page_size);
        }
        if let Ok(v) = env::var("RESPITE_MAX_PAGE_SIZE") {
            self.server.max_page_size = v.parse().unwrap_or(self.server.max_page_size);
        }
        if let Ok(v) = env::var("RESPITE_REQUEST_TIMEOUT_SECS") {
            self.server.request_timeout_secs = v.parse().unwrap_or(self.server.request_timeout_secs);
        }
        if let Ok(v) = env::var("RESPITE_ENABLE_CORS") {
            self.server.enable_cors = v.parse().unwrap_or(self.server.enable_cors);
        }
        if let Ok(v) = env::var("RESPITE_CORS_ORIGINS") {
            self.server.cors_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Ok(v) = env::var("RESPITE_STATIC_DIR") {
            self.server.static_dir = Some(v).filter(|s| !s.is_empty());
        }

        // Database overrides
        if let Ok(v) = env::var("RESPITE_STORE") {
            self.database.store = match v.to_ascii_lowercase().as_str() {
                "memory" => StoreKind::Memory,
                "postgres" | "postgresql" => StoreKind::Postgres,
                _ => self.database.store,
            };
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = v;
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        // Auth overrides
        if let Ok(v) = env::var("RESPITE_AUTH_PROVIDER") {
            self.auth.provider = match v.to_ascii_lowercase().as_str() {
                "oidc" | "keycloak" => ProviderKind::Oidc,
                "jwt" => ProviderKind::Jwt,
                _ => self.auth.provider,
            };
        }
        if let Ok(v) = env::var("RESPITE_JWT_SECRET") {
            self.auth.jwt_secret = v;
        }
        if let Ok(v) = env::var("OIDC_ISSUER_URL") {
            self.auth.oidc_issuer_url = v;
        }
        if let Ok(v) = env::var("OIDC_CLIENT_ID") {
            self.auth.oidc_client_id = v;
        }
        if let Ok(v) = env::var("OIDC_CLIENT_SECRET") {
            self.auth.oidc_client_secret = v;
        }
        if let Ok(v) = env::var("RESPITE_VALIDATION_TIMEOUT_SECS") {
            self.auth.validation_timeout_secs = v.parse().unwrap_or(self.auth.validation_timeout_secs);
        }
        if let Ok(v) = env::var("RESPITE_ROLE_PERMISSIONS_FILE") {
            self.auth.role_permissions_file = Some(v).filter(|s| !s.is_empty());
        }

        // Logging overrides
        if let Ok(v) = env::var("RESPITE_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Ok(v) = env::var("RESPITE_LOG_FORMAT") {
            self.logging.format = match v.to_ascii_lowercase().as_str() {
                "json" => LogFormat::Json,
                "text" => LogFormat::Text,
                _ => self.logging.format,
            };
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                port: 8080,
                api_path: "api".to_string(),
                min_page_size: PageBounds::DEFAULT_MIN,
                max_page_size: PageBounds::DEFAULT_MAX,
                request_timeout_secs: 30,
                enable_cors: true,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
                static_dir: Some("public".to_string()),
            },
            database: DatabaseConfig {
                store: StoreKind::Memory,
                url: String::new(),
                max_connections: 10,
                connection_timeout: 30,
            },
            auth: AuthConfig {
                provider: ProviderKind::Jwt,
                jwt_secret: "respite-development-secret".to_string(),
                oidc_issuer_url: String::new(),
                oidc_client_id: String::new(),
                oidc_client_secret: String::new(),
                validation_timeout_secs: 10,
                role_permissions_file: None,
            },
            logging: LoggingConfig {
                level: "debug".to_string(),
                format: LogFormat::Text,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                port: 8080,
                api_path: "api".to_string(),
                min_page_size: PageBounds::DEFAULT_MIN,
                max_page_size: PageBounds::DEFAULT_MAX,
                request_timeout_secs: 15,
                enable_cors: true,
                cors_origins: vec!["https://staging.example.com".to_string()],
                static_dir: Some("public".to_string()),
            },
            database: DatabaseConfig {
                store: StoreKind::Postgres,
                url: String::new(),
                max_connections: 20,
                connection_timeout: 10,
            },
            auth: AuthConfig {
                provider: ProviderKind::Oidc,
                jwt_secret: String::new(),
                oidc_issuer_url: String::new(),
                oidc_client_id: String::new(),
                oidc_client_secret: String::new(),
                validation_timeout_secs: 5,
                role_permissions_file: None,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: LogFormat::Json,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                port: 8080,
                api_path: "api".to_string(),
                min_page_size: PageBounds::DEFAULT_MIN,
                max_page_size: PageBounds::DEFAULT_MAX,
                request_timeout_secs: 10,
                enable_cors: true,
                cors_origins: vec!["https://app.example.com".to_string()],
                static_dir: Some("public".to_string()),
            },
            database: DatabaseConfig {
                store: StoreKind::Postgres,
                url: String::new(),
                max_connections: 50,
                connection_timeout: 5,
            },
            auth: AuthConfig {
                provider: ProviderKind::Oidc,
                jwt_secret: String::new(),
                oidc_issuer_url: String::new(),
                oidc_client_id: String::new(),
                oidc_client_secret: String::new(),
                validation_timeout_secs: 5,
                role_permissions_file: None,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: LogFormat::Json,
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.database.store, StoreKind::Memory);
        assert_eq!(config.auth.provider, ProviderKind::Jwt);
        assert_eq!(config.server.api_prefix(), "/api");
        assert_eq!(config.server.static_dir.as_deref(), Some("public"));
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert_eq!(config.database.store, StoreKind::Postgres);
        assert_eq!(config.auth.provider, ProviderKind::Oidc);
        assert!(config.auth.jwt_secret.is_empty());
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn page_bounds_follow_server_config() {
        let mut config = AppConfig::development();
        config.server.min_page_size = 5;
        config.server.max_page_size = 2;
        let bounds = config.server.page_bounds();
        assert_eq!((bounds.min(), bounds.max()), (5, 5));
    }

    #[test]
    fn api_prefix_normalises_slashes() {
        let mut config = AppConfig::development().server;
        config.api_path = "/v1/".to_string();
        assert_eq!(config.api_prefix(), "/v1");
        config.api_path = String::new();
        assert_eq!(config.api_prefix(), "");
    }

    #[test]
    fn secrets_are_not_serialized() {
        let value = serde_json::to_value(AppConfig::development()).unwrap();
        assert!(value["auth"].get("jwt_secret").is_none());
        assert!(value["database"].get("url").is_none());
    }
}
