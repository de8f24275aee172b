use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S"];

/// One bookable appointment as returned by the scheduler `slots` endpoint. Only
/// `startTimestamp` is relied upon; the rest is kept for logging.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub start_timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_ind: Option<bool>,
}

impl Slot {
    pub fn starting_at(start_timestamp: impl Into<String>) -> Self {
        Self {
            start_timestamp: start_timestamp.into(),
            location_id: None,
            end_timestamp: None,
            active: None,
            duration: None,
            remote_ind: None,
        }
    }

    /// The `YYYY-MM-DD` part of the start timestamp.
    pub fn appointment_date(&self) -> &str {
        self.start_timestamp
            .split_once('T')
            .map_or(self.start_timestamp.as_str(), |(date, _)| date)
    }

    /// Start time as a local wall-clock value, if the timestamp is in a known format.
    pub fn starts_at(&self) -> Option<NaiveDateTime> {
        TIMESTAMP_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(&self.start_timestamp, fmt).ok())
    }

    /// Whether the slot falls strictly before `target_date`. Both sides are ISO dates, so
    /// lexicographic order is calendar order.
    pub fn is_before(&self, target_date: &str) -> bool {
        self.appointment_date() < target_date
    }
}
