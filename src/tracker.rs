use std::fmt;

use chrono::{DateTime, Utc};
use serde_derive::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}, {:.6}", self.latitude, self.longitude)
    }
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TrackerStatus {
    Active,
    #[default]
    Inactive,
    Warning,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub driver_id: String,
    pub driver_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryBand {
    Critical,
    Low,
    Medium,
    High,
}

impl BatteryBand {
    pub fn from_level(level: u8) -> Self {
        match level {
            0..=15 => BatteryBand::Critical,
            16..=30 => BatteryBand::Low,
            31..=70 => BatteryBand::Medium,
            _ => BatteryBand::High,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tracker {
    pub id: String,
    pub name: String,
    pub location: Option<Location>,
    pub assignment: Option<Assignment>,
    pub status: TrackerStatus,
    /// Percent, 0-100.
    pub battery_level: u8,
    pub last_updated: Option<String>,
}

impl Tracker {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Tracker {
            id: id.into(),
            name: name.into(),
            location: None,
            assignment: None,
            status: TrackerStatus::default(),
            battery_level: 0,
            last_updated: None,
        }
    }

    pub fn with_location(mut self, latitude: f64, longitude: f64) -> Self {
        self.location = Some(Location {
            latitude,
            longitude,
        });
        self
    }

    pub fn battery_band(&self) -> BatteryBand {
        BatteryBand::from_level(self.battery_level)
    }

    /// Case-insensitive match on the display name.
    pub fn matches(&self, term: &str) -> bool {
        self.name.to_lowercase().contains(&term.to_lowercase())
    }

    /// Age of `last_updated` relative to `now`, e.g. "5 min ago".
    pub fn last_seen(&self, now: DateTime<Utc>) -> String {
        let Some(raw) = self.last_updated.as_deref() else {
            return "Never".to_string();
        };
        let Ok(updated) = DateTime::parse_from_rfc3339(raw) else {
            return raw.to_string();
        };
        let minutes = (now - updated.with_timezone(&Utc)).num_minutes().max(0);
        match minutes {
            0 => "Just now".to_string(),
            1..=59 => format!("{minutes} min ago"),
            60..=119 => "1 hour ago".to_string(),
            120..=1439 => format!("{} hours ago", minutes / 60),
            _ => updated.format("%d %b %Y").to_string(),
        }
    }
}

impl fmt::Display for Tracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)?;
        if let Some(assignment) = &self.assignment {
            write!(f, " -> {}", assignment.driver_name)?;
        }
        match &self.location {
            Some(location) => write!(f, " @ {location}"),
            None => write!(f, " @ unknown"),
        }
    }
}
