//! LMS roster feed connector.
//!
//! HTTP client for the external classlist API: authentication modes,
//! feed-shape normalization, and a fixed-backoff retry policy with
//! transient/permanent error classification. The sync orchestrator
//! consumes the [`RosterSource`] trait; everything else here exists to
//! implement it against a real LMS deployment.

pub mod client;
pub mod config;
pub mod error;
pub mod retry;
pub mod schema;

pub use client::{RosterFeedClient, RosterSource};
pub use config::{FeedAuth, FeedConfig, FeedSchema};
pub use error::{FeedError, FeedResult};
pub use retry::RetrySchedule;
pub use schema::parse_roster;
