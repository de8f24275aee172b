use crate::error::LocationParseError;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use tracing::{debug, error, warn};

/// A location to watch, with the latest appointment date that is still acceptable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationTarget {
    pub id: String,
    pub name: String,
    /// ISO `YYYY-MM-DD`; passed through unvalidated.
    pub target_date: String,
}

impl Display for LocationTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

impl LocationTarget {
    pub fn parse_entry(entry: &str) -> Result<Self, LocationParseError> {
        let fields = entry.split(':').map(str::trim).collect::<Vec<_>>();
        match fields.as_slice() {
            [id, name, target_date] => Ok(Self {
                id: (*id).to_owned(),
                name: (*name).to_owned(),
                target_date: (*target_date).to_owned(),
            }),
            _ => Err(LocationParseError::FieldCount {
                entry: entry.to_owned(),
                found: fields.len(),
            }),
        }
    }
}

#[derive(Debug, Default)]
pub struct ParsedLocations {
    pub targets: Vec<LocationTarget>,
    pub rejected: Vec<LocationParseError>,
}

/// Parses `id:name:targetDate` entries separated by commas. Malformed entries are logged
/// and dropped; an empty input is logged as a configuration error and yields no targets.
pub fn parse_locations(raw: &str) -> ParsedLocations {
    let mut parsed = ParsedLocations::default();
    if raw.trim().is_empty() {
        error!("no locations configured; expected comma-separated id:name:targetDate entries");
        return parsed;
    }

    for entry in raw.split(',') {
        match LocationTarget::parse_entry(entry.trim()) {
            Ok(target) => {
                debug!(location = %target, target_date = %target.target_date, "parsed location");
                parsed.targets.push(target);
            }
            Err(e) => {
                warn!(error = %e, "skipping malformed location entry");
                parsed.rejected.push(e);
            }
        }
    }

    parsed
}
