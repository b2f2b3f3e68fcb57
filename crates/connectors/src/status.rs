//! Observation results and retained history entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Maximum number of snapshots a connector retains
pub const MAX_SNAPSHOTS: usize = 5;

/// Observed state of a target
///
/// Discriminants match the ordinals of previously persisted data; they carry
/// no ranking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObservationState {
    #[default]
    Unknown = 0,
    Unstable = 1,
    Failure = 2,
    Success = 3,
    Running = 4,
}

impl ObservationState {
    /// Ordinal used by persisted data
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    /// Inverse of [`ordinal`](Self::ordinal)
    pub fn from_ordinal(ordinal: u8) -> Option<Self> {
        match ordinal {
            0 => Some(Self::Unknown),
            1 => Some(Self::Unstable),
            2 => Some(Self::Failure),
            3 => Some(Self::Success),
            4 => Some(Self::Running),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Unstable => "unstable",
            Self::Failure => "failure",
            Self::Success => "success",
            Self::Running => "running",
        }
    }
}

impl fmt::Display for ObservationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observation result
///
/// Created fresh on every poll and not mutated once handed to a connector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    pub name: String,
    pub detail: String,
    /// Observation time (UTC); informational only
    pub time: DateTime<Utc>,
    pub state: ObservationState,
    /// Remote build identity; `None` when the target has no builds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_number: Option<u64>,
    pub building: bool,
    /// Marks a status that must never be snapshotted
    #[serde(default)]
    pub invalid_build: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
}

impl Status {
    /// Create a status observed now
    pub fn new(name: impl Into<String>, state: ObservationState) -> Self {
        Self {
            name: name.into(),
            detail: String::new(),
            time: Utc::now(),
            state,
            build_number: None,
            building: state == ObservationState::Running,
            invalid_build: false,
            properties: BTreeMap::new(),
        }
    }

    /// Status for a target whose state cannot currently be determined
    pub fn unknown(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(name, ObservationState::Unknown).with_detail(detail)
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }

    pub fn with_build(mut self, build_number: u64, building: bool) -> Self {
        self.build_number = Some(build_number);
        self.building = building;
        self
    }

    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = time;
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn invalid(mut self) -> Self {
        self.invalid_build = true;
        self
    }

    /// True when the observed build has finished
    pub fn is_completed(&self) -> bool {
        self.state != ObservationState::Running && !self.building
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}

/// A retained historical status
///
/// `age` is the position in the history, `0` being the newest entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub status: Status,
    pub age: usize,
}
