//! Manual roster snapshot parsing.
//!
//! Operators can paste a roster dump (the flat-record feed shape,
//! carrying `OrgDefinedId` per row) to correct membership state without
//! waiting for the next scheduled run. Unlike the live feed adapters,
//! parsing here is strict: the payload is human-supplied, so a malformed
//! record is rejected with its index rather than silently skipped.

use serde_json::Value;
use std::collections::HashMap;

use cohort_core::{OrgUnitId, RosterEntry};

use crate::error::{SyncError, SyncResult};

/// Parse a flat-record roster dump and bucket entries by OU.
pub fn parse_snapshot(json: &str) -> SyncResult<HashMap<OrgUnitId, Vec<RosterEntry>>> {
    let body: Value = serde_json::from_str(json)
        .map_err(|e| SyncError::snapshot(format!("not valid JSON: {e}")))?;

    let records = body
        .as_array()
        .ok_or_else(|| SyncError::snapshot("top level is not an array"))?;

    let mut buckets: HashMap<OrgUnitId, Vec<RosterEntry>> = HashMap::new();
    for (index, record) in records.iter().enumerate() {
        let (ou, entry) = parse_record(record)
            .map_err(|detail| SyncError::snapshot(format!("record {index}: {detail}")))?;
        buckets.entry(ou).or_default().push(entry);
    }

    Ok(buckets)
}

fn parse_record(record: &Value) -> Result<(OrgUnitId, RosterEntry), String> {
    let obj = record.as_object().ok_or("not an object")?;

    let username = obj
        .get("Username")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or("missing Username")?;
    let org_unit = obj
        .get("OrgDefinedId")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or("missing OrgDefinedId")?;
    let role_id = obj
        .get("RoleId")
        .and_then(to_i64)
        .ok_or("missing or non-numeric RoleId")?;

    let entry = RosterEntry {
        external_id: obj
            .get("Identifier")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        username: username.to_string(),
        email: obj
            .get("Email")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        display_name: None,
        first_name: None,
        last_name: None,
        role_id,
    };

    Ok((OrgUnitId::new(org_unit), entry))
}

/// Role codes arrive as JSON numbers or numeric strings depending on the
/// export tool.
fn to_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
