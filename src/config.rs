//! Configuration module
//!
//! Loads configuration from environment variables.

use std::env;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL for the unprivileged role
    pub database_url: String,

    /// Database connection URL for the privileged (service) role
    pub database_admin_url: String,

    /// Maximum database connections per pool
    pub database_max_connections: u32,

    /// Base URL of the hosted auth service (without `/auth/v1`)
    pub auth_url: String,

    /// Public (anon) key sent to the auth service
    pub auth_anon_key: String,

    /// Public site URL, used for OAuth and password reset redirects
    pub site_url: String,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Environment (development, production)
    pub environment: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::MissingEnv("DATABASE_URL"))?;

        let database_admin_url =
            lookup("DATABASE_ADMIN_URL").unwrap_or_else(|| database_url.clone());

        let database_max_connections = lookup("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|| "10".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("DATABASE_MAX_CONNECTIONS"))?;

        let auth_url = lookup("AUTH_URL")
            .ok_or(ConfigError::MissingEnv("AUTH_URL"))?
            .trim_end_matches('/')
            .to_string();

        let auth_anon_key = lookup("AUTH_ANON_KEY").ok_or(ConfigError::MissingEnv("AUTH_ANON_KEY"))?;

        let site_url = lookup("SITE_URL")
            .unwrap_or_else(|| "http://localhost:3000".to_string())
            .trim_end_matches('/')
            .to_string();

        let host = lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string());

        let port = lookup("PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("PORT"))?;

        let environment = lookup("ENVIRONMENT").unwrap_or_else(|| "development".to_string());

        Ok(Self {
            database_url,
            database_admin_url,
            database_max_connections,
            auth_url,
            auth_anon_key,
            site_url,
            host,
            port,
            environment,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Where the OAuth provider sends the user after login
    pub fn oauth_redirect_url(&self) -> String {
        format!("{}/dashboard", self.site_url)
    }

    /// Where the password recovery email points to
    pub fn password_reset_redirect_url(&self) -> String {
        format!("{}/auth/redefinir-senha", self.site_url)
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}
