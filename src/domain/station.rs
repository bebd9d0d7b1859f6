use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type StationId = i64;

/// A fuel station. `code_1c` is the external accounting code the 1C
/// integration resolves stations by; the admin UI resolves by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Station {
    pub id: StationId,
    pub name: String,
    pub code_1c: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// How a caller identifies the station in a refuel request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StationRef {
    /// External accounting code (`code_1c`).
    Code(String),
    /// Exact display name match.
    Name(String),
}

impl StationRef {
    /// Build a station reference from the two optional request fields.
    /// The accounting code wins when both are present. Returns `None` when
    /// neither carries a non-blank value.
    pub fn from_parts(code_1c: Option<&str>, station_name: Option<&str>) -> Option<Self> {
        if let Some(code) = code_1c.map(str::trim).filter(|c| !c.is_empty()) {
            return Some(StationRef::Code(code.to_string()));
        }
        station_name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(|n| StationRef::Name(n.to_string()))
    }

    /// The raw reference string, for error messages.
    pub fn reference(&self) -> &str {
        match self {
            StationRef::Code(code) => code,
            StationRef::Name(name) => name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_takes_precedence_over_name() {
        let station = StationRef::from_parts(Some("ST-01"), Some("Central"));
        assert_eq!(station, Some(StationRef::Code("ST-01".into())));
    }

    #[test]
    fn blank_parts_yield_none() {
        assert_eq!(StationRef::from_parts(None, None), None);
        assert_eq!(StationRef::from_parts(Some("  "), Some("")), None);
    }

    #[test]
    fn falls_back_to_name() {
        let station = StationRef::from_parts(Some(""), Some(" Central "));
        assert_eq!(station, Some(StationRef::Name("Central".into())));
    }
}
