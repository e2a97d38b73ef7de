use chrono::{DateTime, Local, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::TimeZone;

pub const UNKNOWN: &str = "Unknown";

/// One page of the Graph `auditLogs/signIns` feed. Unknown fields are
/// ignored; a missing `value` key means an empty batch.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SignInBatch {
    #[serde(default)]
    pub value: Vec<RawEvent>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    pub user_principal_name: Option<String>,
    pub status: Option<SignInStatus>,
    pub created_date_time: Option<String>,
    pub ip_address: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SignInStatus {
    pub error_code: Option<i64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NormalizedEvent {
    pub identity: String,
    pub is_failure: bool,
    pub local_hour: Option<u32>,
    pub timestamp: Option<String>,
    pub source_address: String,
}

impl NormalizedEvent {
    /// A timestamp was present but did not parse as RFC 3339.
    pub fn timestamp_unparsed(&self) -> bool {
        self.timestamp.is_some() && self.local_hour.is_none()
    }
}

/// Flatten one raw sign-in record. Never fails: absent identity and source
/// address become "Unknown", an absent error code counts as success, and an
/// absent or unparseable timestamp leaves `local_hour` empty so the event is
/// simply never classified as off-hours.
pub fn normalize(raw: &RawEvent, tz: TimeZone) -> NormalizedEvent {
    let identity = raw.user_principal_name.clone().unwrap_or_else(|| UNKNOWN.to_string());
    let source_address = raw.ip_address.clone().unwrap_or_else(|| UNKNOWN.to_string());
    let error_code = raw.status.as_ref().and_then(|s| s.error_code).unwrap_or(0);
    // Graph emits "" for some deleted records; treat it the same as absent.
    let timestamp = raw.created_date_time.clone().filter(|s| !s.is_empty());
    let local_hour = timestamp
        .as_deref()
        .and_then(parse_signin_time)
        .map(|dt| hour_in_zone(dt, tz));
    NormalizedEvent { identity, is_failure: error_code != 0, local_hour, timestamp, source_address }
}

/// RFC 3339 parse; a trailing "Z" is the same as "+00:00".
pub fn parse_signin_time(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.with_timezone(&Utc))
}

/// Hour of day in the selected zone. `Local` depends on the machine's
/// configured time zone, matching the original triage tool; pass `Utc` for a
/// portable classification.
fn hour_in_zone(dt: DateTime<Utc>, tz: TimeZone) -> u32 {
    match tz {
        TimeZone::Local => dt.with_timezone(&Local).hour(),
        TimeZone::Utc => dt.hour(),
    }
}
