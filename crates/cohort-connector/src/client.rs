//! Roster feed client.
//!
//! Fetches one organizational unit's classlist from the external LMS
//! HTTP API and normalizes it into canonical roster entries. Transport
//! failures are classified and retried on the fixed backoff schedule;
//! the caller always gets a `Result`, never a panic, so one OU's outage
//! can be skipped while the rest of the sync continues.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use cohort_core::{OrgUnitId, RosterEntry};

use crate::config::{FeedAuth, FeedConfig};
use crate::error::{FeedError, FeedResult};
use crate::retry::RetrySchedule;
use crate::schema::parse_roster;

/// Source of roster snapshots, as consumed by the sync orchestrator.
///
/// The orchestrator only ever sees this seam; tests substitute scripted
/// sources and the production implementation is [`RosterFeedClient`].
#[async_trait]
pub trait RosterSource: Send + Sync {
    /// Fetch the current roster for one OU.
    async fn fetch_roster(&self, ou: &OrgUnitId) -> FeedResult<Vec<RosterEntry>>;
}

/// HTTP client for the LMS classlist feed.
pub struct RosterFeedClient {
    config: FeedConfig,
    client: Client,
    retry: RetrySchedule,
}

impl std::fmt::Debug for RosterFeedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RosterFeedClient")
            .field("base_url", &self.config.base_url)
            .field("api_version", &self.config.api_version)
            .field("schema", &self.config.schema)
            .finish()
    }
}

impl RosterFeedClient {
    /// Create a client from validated configuration.
    pub fn new(config: FeedConfig) -> FeedResult<Self> {
        config.validate()?;

        let mut builder = Client::builder()
            .timeout(Duration::from_secs(config.read_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs));

        if !config.verify_tls {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder
            .build()
            .map_err(|e| FeedError::invalid_config(format!("failed to build HTTP client: {e}")))?;

        let retry = RetrySchedule::from_secs(&config.retry_delays_secs);

        Ok(Self {
            config,
            client,
            retry,
        })
    }

    /// The classlist URL for one OU.
    fn classlist_url(&self, ou: &OrgUnitId) -> String {
        format!(
            "{}/{}/{}/classlist/paged",
            self.config.base_url.trim_end_matches('/'),
            self.config.api_version,
            ou
        )
    }

    fn apply_auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.auth {
            FeedAuth::None => builder,
            FeedAuth::Basic { username, password } => {
                builder.basic_auth(username, Some(password))
            }
            FeedAuth::Bearer { token } => builder.bearer_auth(token),
            FeedAuth::KeyPair { app_id, app_key } => builder
                .header("X-App-Id", app_id)
                .header("X-App-Key", app_key),
        }
    }

    /// One fetch attempt, no retries.
    async fn fetch_once(&self, ou: &OrgUnitId) -> FeedResult<Vec<RosterEntry>> {
        let url = self.classlist_url(ou);
        debug!(ou = %ou, url = %url, "Fetching classlist");

        let request = self
            .apply_auth(self.client.get(&url))
            .query(&[("_format", "json")]);

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                FeedError::Timeout {
                    timeout_secs: self.config.read_timeout_secs,
                }
            } else {
                FeedError::connection(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status));
        }

        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(e) => return self.malformed(ou, format!("body is not JSON: {e}")),
        };

        match parse_roster(&body, self.config.schema) {
            Ok(entries) => {
                debug!(ou = %ou, entries = entries.len(), "Classlist fetched");
                Ok(entries)
            }
            Err(FeedError::MalformedPayload { detail }) => self.malformed(ou, detail),
            Err(other) => Err(other),
        }
    }

    /// Apply the malformed-payload policy.
    fn malformed(&self, ou: &OrgUnitId, detail: String) -> FeedResult<Vec<RosterEntry>> {
        if self.config.empty_on_malformed {
            warn!(
                ou = %ou,
                detail = %detail,
                "Malformed feed payload treated as empty roster"
            );
            Ok(Vec::new())
        } else {
            Err(FeedError::MalformedPayload { detail })
        }
    }
}

fn classify_status(status: StatusCode) -> FeedError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => FeedError::RateLimited,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FeedError::AuthRejected {
            status: status.as_u16(),
        },
        s if s.is_server_error() => FeedError::Upstream {
            status: s.as_u16(),
        },
        s => FeedError::Rejected {
            status: s.as_u16(),
        },
    }
}

#[async_trait]
impl RosterSource for RosterFeedClient {
    async fn fetch_roster(&self, ou: &OrgUnitId) -> FeedResult<Vec<RosterEntry>> {
        self.retry.execute(|| self.fetch_once(ou)).await
    }
}
