//! Feed-shape adapters.
//!
//! Normalizes the two known feed payload shapes into the canonical
//! [`RosterEntry`]. The feed changed shape between LMS API revisions;
//! which adapter applies is deployment configuration, not content
//! sniffing.

use serde_json::Value;
use tracing::warn;

use cohort_core::RosterEntry;

use crate::config::FeedSchema;
use crate::error::{FeedError, FeedResult};

/// Parse a decoded feed body into roster entries.
///
/// A non-array top level is a [`FeedError::MalformedPayload`]; the
/// caller decides whether that becomes an empty roster (per the
/// `empty_on_malformed` policy). Individual entries missing a username
/// are skipped with a warning rather than failing the whole page.
pub fn parse_roster(body: &Value, schema: FeedSchema) -> FeedResult<Vec<RosterEntry>> {
    let rows = body
        .as_array()
        .ok_or_else(|| FeedError::malformed("top-level value is not an array"))?;

    let mut entries = Vec::new();
    for row in rows {
        match row {
            // PagedObjects payloads may nest pages as inner arrays.
            Value::Array(page) if schema == FeedSchema::PagedObjects => {
                for item in page {
                    push_entry(&mut entries, item, schema);
                }
            }
            _ => push_entry(&mut entries, row, schema),
        }
    }
    Ok(entries)
}

fn push_entry(entries: &mut Vec<RosterEntry>, item: &Value, schema: FeedSchema) {
    match parse_entry(item, schema) {
        Some(entry) => entries.push(entry),
        None => {
            warn!(schema = ?schema, "Skipping feed row without a usable username");
        }
    }
}

fn parse_entry(item: &Value, schema: FeedSchema) -> Option<RosterEntry> {
    match schema {
        FeedSchema::PagedObjects => {
            let username = non_empty_str(item.get("username")?)?;
            Some(RosterEntry {
                external_id: item
                    .get("user_id")
                    .map(id_to_string)
                    .unwrap_or_default(),
                username,
                email: item.get("email").and_then(non_empty_str),
                display_name: item.get("display_name").and_then(non_empty_str),
                first_name: item.get("first_name").and_then(non_empty_str),
                last_name: item.get("last_name").and_then(non_empty_str),
                role_id: item.get("role").and_then(|r| r.get("id")).and_then(to_i64)?,
            })
        }
        FeedSchema::FlatRecords => {
            let username = non_empty_str(item.get("Username")?)?;
            Some(RosterEntry {
                external_id: item
                    .get("Identifier")
                    .map(id_to_string)
                    .unwrap_or_default(),
                username,
                email: item.get("Email").and_then(non_empty_str),
                display_name: item.get("DisplayName").and_then(non_empty_str),
                first_name: item.get("FirstName").and_then(non_empty_str),
                last_name: item.get("LastName").and_then(non_empty_str),
                role_id: item.get("RoleId").and_then(to_i64)?,
            })
        }
    }
}

fn non_empty_str(value: &Value) -> Option<String> {
    value
        .as_str()
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

/// Role codes arrive as numbers in some revisions and numeric strings
/// in others.
fn to_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn id_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
