//! Pluggable secret retrieval.
//!
//! The endpoint URL and credential material live in an external secret
//! store; the engine resolves them once per run through this trait. The
//! environment-variable provider is the default backend.

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

/// Errors returned by secret provider operations.
#[derive(Debug, Error)]
pub enum SecretError {
    /// Secret not found in provider (missing or empty).
    #[error("secret not found: '{name}'")]
    NotFound { name: String },

    /// Provider is unreachable.
    #[error("secret provider unavailable: {detail}")]
    ProviderUnavailable { detail: String },

    /// Secret value is malformed (wrong format, corrupt).
    #[error("invalid secret value for '{name}': {detail}")]
    InvalidValue { name: String, detail: String },
}

/// A resolved secret.
#[derive(Clone)]
pub struct SecretValue {
    /// Logical name the secret was requested under.
    pub name: String,
    value: Vec<u8>,
}

impl SecretValue {
    /// Wrap a resolved secret value.
    #[must_use]
    pub fn new(name: impl Into<String>, value: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    /// The secret as UTF-8 text.
    pub fn as_str(&self) -> Result<&str, SecretError> {
        std::str::from_utf8(&self.value).map_err(|_| SecretError::InvalidValue {
            name: self.name.clone(),
            detail: "not valid UTF-8".to_string(),
        })
    }
}

impl std::fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print secret material.
        f.debug_struct("SecretValue")
            .field("name", &self.name)
            .field("value", &"<redacted>")
            .finish()
    }
}

/// Abstraction over secret storage backends.
#[async_trait]
pub trait SecretProvider: Send + Sync {
    /// Retrieve a secret by logical name.
    async fn get_secret(&self, name: &str) -> Result<SecretValue, SecretError>;

    /// Identify the backing provider, for logs.
    fn provider_type(&self) -> &'static str;
}

/// Secret provider that reads secrets from environment variables.
///
/// Logical names map to env var names via explicit `mappings`, or by
/// uppercasing the logical name when no mapping exists.
#[derive(Debug, Default)]
pub struct EnvSecretProvider {
    mappings: HashMap<String, String>,
}

impl EnvSecretProvider {
    /// Create a provider with explicit logical-name mappings.
    #[must_use]
    pub fn new(mappings: HashMap<String, String>) -> Self {
        Self { mappings }
    }

    fn resolve_env_var_name(&self, logical_name: &str) -> String {
        self.mappings
            .get(logical_name)
            .cloned()
            .unwrap_or_else(|| logical_name.to_uppercase())
    }
}

#[async_trait]
impl SecretProvider for EnvSecretProvider {
    async fn get_secret(&self, name: &str) -> Result<SecretValue, SecretError> {
        let env_var = self.resolve_env_var_name(name);

        match std::env::var(&env_var) {
            Ok(value) if !value.is_empty() => {
                tracing::debug!(
                    secret_name = name,
                    env_var = %env_var,
                    "Secret loaded from environment variable"
                );
                Ok(SecretValue::new(name, value.into_bytes()))
            }
            // Empty value treated as not found.
            Ok(_) | Err(_) => Err(SecretError::NotFound {
                name: name.to_string(),
            }),
        }
    }

    fn provider_type(&self) -> &'static str {
        "env"
    }
}

/// Static provider for tests: secrets seeded in memory.
#[derive(Debug, Default)]
pub struct StaticSecretProvider {
    secrets: HashMap<String, String>,
}

impl StaticSecretProvider {
    /// Create an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a secret.
    #[must_use]
    pub fn with_secret(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.insert(name.into(), value.into());
        self
    }
}

#[async_trait]
impl SecretProvider for StaticSecretProvider {
    async fn get_secret(&self, name: &str) -> Result<SecretValue, SecretError> {
        match self.secrets.get(name) {
            Some(value) if !value.is_empty() => {
                Ok(SecretValue::new(name, value.clone().into_bytes()))
            }
            _ => Err(SecretError::NotFound {
                name: name.to_string(),
            }),
        }
    }

    fn provider_type(&self) -> &'static str {
        "static"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_env_provider_reads_existing_var() {
        std::env::set_var("COHORT_TEST_SECRET_A", "feed-endpoint-url");
        let provider = EnvSecretProvider::default();
        let secret = provider.get_secret("cohort_test_secret_a").await.unwrap();
        assert_eq!(secret.as_str().unwrap(), "feed-endpoint-url");
        std::env::remove_var("COHORT_TEST_SECRET_A");
    }

    #[tokio::test]
    async fn test_env_provider_missing_is_not_found() {
        std::env::remove_var("COHORT_TEST_SECRET_MISSING");
        let provider = EnvSecretProvider::default();
        let err = provider
            .get_secret("cohort_test_secret_missing")
            .await
            .unwrap_err();
        assert!(matches!(err, SecretError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_env_provider_empty_is_not_found() {
        std::env::set_var("COHORT_TEST_SECRET_EMPTY", "");
        let provider = EnvSecretProvider::default();
        let err = provider
            .get_secret("cohort_test_secret_empty")
            .await
            .unwrap_err();
        assert!(matches!(err, SecretError::NotFound { .. }));
        std::env::remove_var("COHORT_TEST_SECRET_EMPTY");
    }

    #[tokio::test]
    async fn test_env_provider_explicit_mapping() {
        std::env::set_var("LEGACY_KEY_NAME", "mapped-value");
        let mut mappings = HashMap::new();
        mappings.insert("endpoint".to_string(), "LEGACY_KEY_NAME".to_string());
        let provider = EnvSecretProvider::new(mappings);
        let secret = provider.get_secret("endpoint").await.unwrap();
        assert_eq!(secret.as_str().unwrap(), "mapped-value");
        std::env::remove_var("LEGACY_KEY_NAME");
    }

    #[test]
    fn test_secret_value_debug_redacts() {
        let secret = SecretValue::new("endpoint", b"hunter2".to_vec());
        let debug = format!("{secret:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }

    #[tokio::test]
    async fn test_static_provider() {
        let provider = StaticSecretProvider::new().with_secret("endpoint", "https://lms.example");
        let secret = provider.get_secret("endpoint").await.unwrap();
        assert_eq!(secret.as_str().unwrap(), "https://lms.example");
        assert!(provider.get_secret("other").await.is_err());
    }
}
