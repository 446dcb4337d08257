//! Feed client configuration.
//!
//! Immutable configuration value object, validated at construction.
//! One auth mode per deployment; the feed shape and the
//! malformed-payload policy are deployment parameters rather than
//! separate code paths.

use serde::{Deserialize, Serialize};

use crate::error::{FeedError, FeedResult};

/// Authentication mode for the feed endpoint.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum FeedAuth {
    /// No authentication.
    None,
    /// HTTP basic auth.
    Basic { username: String, password: String },
    /// Pre-resolved bearer secret.
    Bearer { token: String },
    /// Public/private application key pair sent as headers.
    KeyPair { app_id: String, app_key: String },
}

impl std::fmt::Debug for FeedAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Credential material stays out of logs.
        match self {
            FeedAuth::None => write!(f, "None"),
            FeedAuth::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            FeedAuth::Bearer { .. } => f
                .debug_struct("Bearer")
                .field("token", &"<redacted>")
                .finish(),
            FeedAuth::KeyPair { app_id, .. } => f
                .debug_struct("KeyPair")
                .field("app_id", app_id)
                .field("app_key", &"<redacted>")
                .finish(),
        }
    }
}

/// Known feed payload shapes.
///
/// The feed changed shape across LMS API revisions; both variants are
/// normalized to the canonical [`cohort_core::RosterEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedSchema {
    /// Array (possibly of pages) of objects with `username`, `user_id`,
    /// `display_name`, `first_name`, `last_name`, `role.id`.
    PagedObjects,
    /// Flat objects with `Email`, `OrgDefinedId`, `Identifier`,
    /// `Username`, `RoleId`.
    FlatRecords,
}

/// Configuration for the roster feed client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Endpoint base URL (scheme + host + optional path prefix).
    pub base_url: String,
    /// API version path segment.
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Authentication mode.
    #[serde(default = "default_auth")]
    pub auth: FeedAuth,
    /// Payload shape this deployment's feed produces.
    #[serde(default = "default_schema")]
    pub schema: FeedSchema,
    /// Treat a malformed/non-array body as an empty roster instead of a
    /// permanent fetch error. An empty roster unenrolls everyone under
    /// the OU, so enabling this trades safety against a parsing glitch
    /// for tolerance of sloppy upstream payloads. Off by default.
    #[serde(default)]
    pub empty_on_malformed: bool,
    /// TCP connect timeout.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Whole-request timeout.
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,
    /// Verify TLS certificates.
    #[serde(default = "default_verify_tls")]
    pub verify_tls: bool,
    /// Backoff schedule between retry attempts, in seconds. The number
    /// of attempts is one more than the number of delays.
    #[serde(default = "default_retry_delays_secs")]
    pub retry_delays_secs: Vec<u64>,
}

fn default_api_version() -> String {
    "v1".to_string()
}

fn default_auth() -> FeedAuth {
    FeedAuth::None
}

fn default_schema() -> FeedSchema {
    FeedSchema::PagedObjects
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_read_timeout_secs() -> u64 {
    30
}

fn default_verify_tls() -> bool {
    true
}

fn default_retry_delays_secs() -> Vec<u64> {
    vec![30, 120]
}

impl FeedConfig {
    /// Create a configuration with defaults for everything but the URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_version: default_api_version(),
            auth: default_auth(),
            schema: default_schema(),
            empty_on_malformed: false,
            connect_timeout_secs: default_connect_timeout_secs(),
            read_timeout_secs: default_read_timeout_secs(),
            verify_tls: default_verify_tls(),
            retry_delays_secs: default_retry_delays_secs(),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> FeedResult<()> {
        let url = url::Url::parse(&self.base_url)
            .map_err(|e| FeedError::invalid_config(format!("base_url: {e}")))?;

        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(FeedError::invalid_config(format!(
                    "unsupported scheme: {other}"
                )));
            }
        }

        if self.api_version.is_empty() {
            return Err(FeedError::invalid_config("api_version must not be empty"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: FeedConfig =
            serde_json::from_str(r#"{"base_url": "https://lms.example.edu/d2l/api"}"#).unwrap();
        assert_eq!(config.api_version, "v1");
        assert_eq!(config.schema, FeedSchema::PagedObjects);
        assert!(!config.empty_on_malformed);
        assert_eq!(config.retry_delays_secs, vec![30, 120]);
        assert!(config.verify_tls);
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_scheme() {
        let config = FeedConfig::new("ftp://lms.example.edu");
        assert!(matches!(
            config.validate(),
            Err(FeedError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_garbage_url() {
        let config = FeedConfig::new("not a url");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_auth_debug_redacts_credentials() {
        let auth = FeedAuth::Basic {
            username: "svc-lms".to_string(),
            password: "hunter2".to_string(),
        };
        let debug = format!("{auth:?}");
        assert!(debug.contains("svc-lms"));
        assert!(!debug.contains("hunter2"));

        let auth = FeedAuth::Bearer {
            token: "sekrit-token".to_string(),
        };
        assert!(!format!("{auth:?}").contains("sekrit-token"));

        let auth = FeedAuth::KeyPair {
            app_id: "app-1".to_string(),
            app_key: "key-material".to_string(),
        };
        let debug = format!("{auth:?}");
        assert!(debug.contains("app-1"));
        assert!(!debug.contains("key-material"));
    }

    #[test]
    fn test_auth_mode_deserializes_tagged() {
        let auth: FeedAuth = serde_json::from_str(
            r#"{"mode": "basic", "username": "svc", "password": "pw"}"#,
        )
        .unwrap();
        assert!(matches!(auth, FeedAuth::Basic { .. }));
    }
}
