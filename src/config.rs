//! Configuration management

use std::{env, path::Path};

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Config {
    /// Environment files to load before processing config.
    /// Paths support ~ expansion. Loaded in order, later files override earlier.
    /// Variables are set into the process environment for `${VAR}` resolution.
    #[serde(default)]
    pub env_files: Vec<String>,
    /// Server configuration
    pub server: ServerConfig,
    /// Authentication configuration (Descope + first-party sessions)
    pub auth: AuthConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Cross-origin policy configuration
    pub cors: CorsConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Descope project identifier. Used to derive the default JWKS URL.
    pub descope_project_id: String,

    /// Explicit JWKS URL override. When unset, derived from the project id.
    /// Supports `${VAR}` expansion.
    #[serde(default)]
    pub jwks_url: Option<String>,

    /// Secret used to sign first-party session credentials (HS256).
    /// Supports `${VAR}` expansion; never log this value.
    pub session_secret: String,

    /// Session credential lifetime in seconds (default 24 h).
    pub session_ttl_secs: u64,

    /// Signing-key cache freshness window in seconds (default 1 h).
    pub jwks_ttl_secs: u64,

    /// Timeout for a JWKS fetch in seconds (default 10 s).
    pub jwks_fetch_timeout_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            descope_project_id: String::new(),
            jwks_url: None,
            session_secret: String::new(),
            session_ttl_secs: 86_400,
            jwks_ttl_secs: 3_600,
            jwks_fetch_timeout_secs: 10,
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Postgres connection string. Supports `${VAR}` expansion.
    pub url: String,
    /// Maximum pool connections
    pub max_connections: u32,
    /// Timeout in seconds for acquiring a pooled connection
    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 5,
            acquire_timeout_secs: 5,
        }
    }
}

/// Cross-origin policy configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CorsConfig {
    /// Allow-listed frontend origins. Each entry may itself be a
    /// comma-separated list (so a single env var can carry several).
    pub allowed_origins: Vec<String>,
}

impl CorsConfig {
    /// Flatten the configured origins, splitting comma-separated entries.
    #[must_use]
    pub fn resolved_origins(&self) -> Vec<String> {
        self.allowed_origins
            .iter()
            .flat_map(|entry| entry.split(','))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl Config {
    /// Load configuration from file and environment
    ///
    /// # Errors
    ///
    /// Returns an error if the config file does not exist or cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        // Load from file if provided
        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        // Merge environment variables (SSO_GATEWAY_ prefix)
        figment = figment.merge(Env::prefixed("SSO_GATEWAY_").split("__"));

        let mut config: Self = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;

        // Load env files into process environment (before env var expansion)
        config.load_env_files();

        // Expand ${VAR} in secret-bearing values
        config.expand_env_vars();

        Ok(config)
    }

    /// Fail fast on missing required settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming every missing value.
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();

        if self.database.url.is_empty() {
            missing.push("database.url");
        }
        if self.auth.descope_project_id.is_empty() {
            missing.push("auth.descope_project_id");
        }
        if self.auth.session_secret.is_empty() {
            missing.push("auth.session_secret");
        }
        if self.cors.resolved_origins().is_empty() {
            missing.push("cors.allowed_origins");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::Config(format!(
                "Missing required configuration: {}",
                missing.join(", ")
            )))
        }
    }

    /// Load environment files into the process environment.
    /// Supports ~ expansion. Files that don't exist are silently skipped.
    fn load_env_files(&self) {
        for path_str in &self.env_files {
            let expanded = if path_str.starts_with('~') {
                if let Some(home) = dirs::home_dir() {
                    path_str.replacen('~', &home.display().to_string(), 1)
                } else {
                    path_str.clone()
                }
            } else {
                path_str.clone()
            };

            let path = Path::new(&expanded);
            if path.exists() {
                match dotenvy::from_path(path) {
                    Ok(()) => {
                        tracing::info!("Loaded env file: {expanded}");
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load env file {expanded}: {e}");
                    }
                }
            } else {
                tracing::debug!("Env file not found (skipped): {expanded}");
            }
        }
    }

    /// Expand ${VAR} and ${VAR:-default} patterns in config values
    fn expand_env_vars(&mut self) {
        // Pattern: ${VAR} or ${VAR:-default}
        let Ok(re) = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}") else {
            return;
        };

        self.database.url = Self::expand_string(&re, &self.database.url);
        self.auth.session_secret = Self::expand_string(&re, &self.auth.session_secret);
        if let Some(url) = &self.auth.jwks_url {
            self.auth.jwks_url = Some(Self::expand_string(&re, url));
        }
        for origin in &mut self.cors.allowed_origins {
            *origin = Self::expand_string(&re, origin);
        }
    }

    /// Expand environment variables in a string
    fn expand_string(re: &Regex, value: &str) -> String {
        re.replace_all(value, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default = caps.get(2).map_or("", |m| m.as_str());
            env::var(var_name).unwrap_or_else(|_| default.to_string())
        })
        .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn complete_config() -> Config {
        let mut config = Config::default();
        config.database.url = "postgres://localhost/app".to_string();
        config.auth.descope_project_id = "P2abc".to_string();
        config.auth.session_secret = "secret".to_string();
        config.cors.allowed_origins = vec!["http://localhost:3000".to_string()];
        config
    }

    #[test]
    fn validate_accepts_complete_config() {
        // GIVEN: a config with every required value set
        let config = complete_config();

        // THEN: validation passes
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_names_every_missing_value() {
        // GIVEN: an empty config
        let config = Config::default();

        // WHEN: validated
        let err = config.validate().unwrap_err().to_string();

        // THEN: each missing key is named
        assert!(err.contains("database.url"));
        assert!(err.contains("auth.descope_project_id"));
        assert!(err.contains("auth.session_secret"));
        assert!(err.contains("cors.allowed_origins"));
    }

    #[test]
    fn resolved_origins_splits_comma_separated_entries() {
        // GIVEN: one entry carrying two origins
        let cors = CorsConfig {
            allowed_origins: vec![
                "http://localhost:3000, http://localhost:5173".to_string(),
                "https://app.example.com".to_string(),
            ],
        };

        // WHEN: resolved
        let origins = cors.resolved_origins();

        // THEN: three distinct origins
        assert_eq!(
            origins,
            vec![
                "http://localhost:3000",
                "http://localhost:5173",
                "https://app.example.com"
            ]
        );
    }

    #[test]
    fn test_load_env_files_sets_env_vars() {
        let dir = tempfile::tempdir().unwrap();
        let env_path = dir.path().join("test.env");
        let mut f = std::fs::File::create(&env_path).unwrap();
        writeln!(f, "SSO_GW_TEST_KEY_A=hello_from_env_file").unwrap();
        writeln!(f, "SSO_GW_TEST_KEY_B=42").unwrap();
        drop(f);

        let config = Config {
            env_files: vec![env_path.to_string_lossy().to_string()],
            ..Default::default()
        };
        config.load_env_files();

        assert_eq!(env::var("SSO_GW_TEST_KEY_A").unwrap(), "hello_from_env_file");
        assert_eq!(env::var("SSO_GW_TEST_KEY_B").unwrap(), "42");

        // Note: env::remove_var is unsafe in edition 2024 and lib forbids unsafe.
        // Test keys use unique SSO_GW_TEST_ prefix so won't conflict.
    }

    #[test]
    fn test_load_env_files_skips_missing() {
        let config = Config {
            env_files: vec!["/nonexistent/path/.env".to_string()],
            ..Default::default()
        };
        // Should not panic
        config.load_env_files();
    }

    #[test]
    fn test_config_deserialized_from_yaml() {
        let yaml = r#"
server:
  host: "0.0.0.0"
  port: 5000
auth:
  descope_project_id: "P2abc123"
  session_secret: "${APP_SECRET_KEY}"
database:
  url: "${NEON_DB_URL}"
cors:
  allowed_origins:
    - "http://localhost:3000"
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.auth.descope_project_id, "P2abc123");
        assert_eq!(config.auth.session_ttl_secs, 86_400);
        assert_eq!(config.cors.allowed_origins.len(), 1);
    }
}
