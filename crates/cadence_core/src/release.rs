use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CadenceError;

/// Bulk-scheduling presets used when a whole course is put on a drip schedule.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ReleaseTemplate {
    #[serde(rename = "immediate")]
    Immediate,
    #[serde(rename = "daily")]
    Daily,
    #[serde(rename = "every3days")]
    Every3Days,
    #[serde(rename = "weekly")]
    Weekly,
    #[serde(rename = "biweekly")]
    Biweekly,
}

impl ReleaseTemplate {
    pub const ALL: [ReleaseTemplate; 5] = [
        Self::Immediate,
        Self::Daily,
        Self::Every3Days,
        Self::Weekly,
        Self::Biweekly,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Self::Immediate => "immediate",
            Self::Daily => "daily",
            Self::Every3Days => "every3days",
            Self::Weekly => "weekly",
            Self::Biweekly => "biweekly",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Immediate => "All at once",
            Self::Daily => "One per day",
            Self::Every3Days => "Every 3 days",
            Self::Weekly => "Weekly",
            Self::Biweekly => "Every 2 weeks",
        }
    }

    /// Days between consecutive items; zero releases everything together.
    pub fn interval_days(self) -> u32 {
        match self {
            Self::Immediate => 0,
            Self::Daily => 1,
            Self::Every3Days => 3,
            Self::Weekly => 7,
            Self::Biweekly => 14,
        }
    }

    /// Drip delay for the item at zero-based position `index`.
    pub fn delay_for_index(self, index: u32) -> u32 {
        index.saturating_mul(self.interval_days())
    }
}

impl fmt::Display for ReleaseTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ReleaseTemplate {
    type Err = CadenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Self::ALL
            .into_iter()
            .find(|template| template.id() == needle)
            .ok_or_else(|| CadenceError::UnknownTemplate(s.to_string()))
    }
}

pub fn release_delay_for_index(template: ReleaseTemplate, index: u32) -> u32 {
    template.delay_for_index(index)
}
