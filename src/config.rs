// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.

use std::env;

/// Application id used when neither the environment nor the build provides one.
pub const DEFAULT_APP_ID: &str = "default-app-id";

/// Settings injected into the sync repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryConfig {
    /// Application id, the first scoping segment of every collection path
    pub app_id: String,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            app_id: DEFAULT_APP_ID.to_string(),
        }
    }
}

/// Credentials and endpoints for the Firebase backend.
#[derive(Debug, Clone)]
pub struct FirebaseConfig {
    /// Web API key of the Firebase project
    pub api_key: String,
    /// GCP/Firebase project ID
    pub project_id: String,
}

/// Application configuration, loaded once at startup.
///
/// The `Default` value (default app id, offline) is meant for tests.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub repository: RepositoryConfig,
    /// Firebase backend; `None` runs against the in-memory store
    pub firebase: Option<FirebaseConfig>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// `FIREBASE_API_KEY` and `FIREBASE_PROJECT_ID` must be set together;
    /// with neither set the application runs offline.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let repository = RepositoryConfig {
            app_id: resolve_app_id(env::var("WORKOUT_APP_ID").ok()),
        };

        let api_key = non_empty_var("FIREBASE_API_KEY");
        let project_id = non_empty_var("FIREBASE_PROJECT_ID");

        let firebase = match (api_key, project_id) {
            (Some(api_key), Some(project_id)) => Some(FirebaseConfig {
                api_key,
                project_id,
            }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing("FIREBASE_PROJECT_ID")),
            (None, Some(_)) => return Err(ConfigError::Missing("FIREBASE_API_KEY")),
        };

        Ok(Self {
            repository,
            firebase,
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Pick the application id: runtime value, then build-time value, then the default.
fn resolve_app_id(runtime: Option<String>) -> String {
    runtime
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| option_env!("WORKOUT_APP_ID").map(str::to_string))
        .unwrap_or_else(|| DEFAULT_APP_ID.to_string())
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_id_prefers_runtime_value() {
        assert_eq!(resolve_app_id(Some("my-app".to_string())), "my-app");
    }

    #[test]
    fn test_app_id_blank_runtime_value_falls_back() {
        let expected = option_env!("WORKOUT_APP_ID").unwrap_or(DEFAULT_APP_ID);
        assert_eq!(resolve_app_id(Some("   ".to_string())), expected);
        assert_eq!(resolve_app_id(None), expected);
    }

    #[test]
    fn test_default_config_is_offline() {
        let config = Config::default();
        assert!(config.firebase.is_none());
        assert_eq!(config.repository.app_id, DEFAULT_APP_ID);
    }
}
