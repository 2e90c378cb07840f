use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::CadenceError;

/// Sort key for tasks without a day period; larger than every table index.
pub const ANYTIME_SORT_ORDER: u32 = 999;

const ANYTIME_LABEL: &str = "Anytime";

const CLOCK_FORMATS: [&str; 2] = ["%H:%M", "%H:%M:%S"];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TimePeriod {
    StartOfDay,
    Morning,
    Afternoon,
    Evening,
    Night,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimePeriodConfig {
    pub id: TimePeriod,
    pub label: &'static str,
    pub emoji: &'static str,
    /// Inclusive start hour.
    pub start_hour: u32,
    /// Exclusive end hour; 24 closes the day.
    pub end_hour: u32,
    pub reminder_hour: u32,
}

/// Fixed period table. Position is the sort priority.
pub static TIME_PERIODS: [TimePeriodConfig; 5] = [
    TimePeriodConfig {
        id: TimePeriod::StartOfDay,
        label: "Start of Day",
        emoji: "🌅",
        start_hour: 6,
        end_hour: 9,
        reminder_hour: 7,
    },
    TimePeriodConfig {
        id: TimePeriod::Morning,
        label: "Morning",
        emoji: "☀️",
        start_hour: 9,
        end_hour: 12,
        reminder_hour: 9,
    },
    TimePeriodConfig {
        id: TimePeriod::Afternoon,
        label: "Afternoon",
        emoji: "🌤️",
        start_hour: 12,
        end_hour: 17,
        reminder_hour: 12,
    },
    TimePeriodConfig {
        id: TimePeriod::Evening,
        label: "Evening",
        emoji: "🌆",
        start_hour: 17,
        end_hour: 21,
        reminder_hour: 18,
    },
    TimePeriodConfig {
        id: TimePeriod::Night,
        label: "Night",
        emoji: "🌙",
        start_hour: 21,
        end_hour: 24,
        reminder_hour: 21,
    },
];

impl TimePeriod {
    pub const ALL: [TimePeriod; 5] = [
        Self::StartOfDay,
        Self::Morning,
        Self::Afternoon,
        Self::Evening,
        Self::Night,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Self::StartOfDay => "start_of_day",
            Self::Morning => "morning",
            Self::Afternoon => "afternoon",
            Self::Evening => "evening",
            Self::Night => "night",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        let needle = id.trim();
        Self::ALL.into_iter().find(|period| period.id() == needle)
    }

    pub fn config(self) -> &'static TimePeriodConfig {
        &TIME_PERIODS[self.sort_order() as usize]
    }

    pub fn sort_order(self) -> u32 {
        match self {
            Self::StartOfDay => 0,
            Self::Morning => 1,
            Self::Afternoon => 2,
            Self::Evening => 3,
            Self::Night => 4,
        }
    }
}

impl fmt::Display for TimePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for TimePeriod {
    type Err = CadenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_id(s).ok_or_else(|| CadenceError::UnknownPeriod(s.to_string()))
    }
}

impl TimePeriodConfig {
    pub fn contains(&self, time: NaiveTime) -> bool {
        (self.start_hour..self.end_hour).contains(&time.hour())
    }

    /// Default reminder as `HH:mm`.
    pub fn default_reminder(&self) -> String {
        format!("{:02}:00", self.reminder_hour)
    }

    pub fn default_reminder_time(&self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.reminder_hour, 0, 0).unwrap_or(NaiveTime::MIN)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SchedulingMode {
    Anytime,
    PartOfDay,
    SpecificTime,
}

impl SchedulingMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Anytime => "anytime",
            Self::PartOfDay => "part_of_day",
            Self::SpecificTime => "specific_time",
        }
    }
}

/// Time-of-day preference as stored on a task record.
///
/// The two fields are expected to be mutually exclusive. When both are set
/// the period wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSchedulingPreference {
    #[serde(default)]
    pub time_period_id: Option<String>,
    #[serde(default)]
    pub scheduled_clock_time: Option<String>,
}

impl TimeSchedulingPreference {
    pub fn anytime() -> Self {
        Self::default()
    }

    pub fn part_of_day(period: TimePeriod) -> Self {
        Self {
            time_period_id: Some(period.id().to_string()),
            scheduled_clock_time: None,
        }
    }

    pub fn at(clock_time: impl Into<String>) -> Self {
        Self {
            time_period_id: None,
            scheduled_clock_time: Some(clock_time.into()),
        }
    }

    pub fn period_id(&self) -> Option<&str> {
        non_blank(&self.time_period_id)
    }

    pub fn clock_time(&self) -> Option<&str> {
        non_blank(&self.scheduled_clock_time)
    }

    pub fn period(&self) -> Option<TimePeriod> {
        self.period_id().and_then(TimePeriod::from_id)
    }

    pub fn parsed_clock_time(&self) -> Option<NaiveTime> {
        self.clock_time()
            .and_then(|raw| parse_clock_time(raw).ok())
    }

    pub fn mode(&self) -> SchedulingMode {
        classify_mode(self)
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

pub fn classify_mode(pref: &TimeSchedulingPreference) -> SchedulingMode {
    if pref.period_id().is_some() {
        SchedulingMode::PartOfDay
    } else if pref.clock_time().is_some() {
        SchedulingMode::SpecificTime
    } else {
        SchedulingMode::Anytime
    }
}

pub fn lookup_period(id: &str) -> Option<&'static TimePeriodConfig> {
    TimePeriod::from_id(id).map(TimePeriod::config)
}

/// Display label for a task's timing: the period label, a 12-hour clock time
/// or `Anytime`. Unknown period ids fall through to the clock time.
pub fn format_label(pref: &TimeSchedulingPreference, with_emoji: bool) -> String {
    if let Some(config) = pref.period().map(TimePeriod::config) {
        return if with_emoji {
            format!("{} {}", config.emoji, config.label)
        } else {
            config.label.to_string()
        };
    }
    if let Some(time) = pref.parsed_clock_time() {
        return format_clock_time(time);
    }
    ANYTIME_LABEL.to_string()
}

/// `h:mm AM|PM`, with midnight and noon shown as 12.
pub fn format_clock_time(time: NaiveTime) -> String {
    let (is_pm, hour) = time.hour12();
    let suffix = if is_pm { "PM" } else { "AM" };
    format!("{}:{:02} {}", hour, time.minute(), suffix)
}

/// Abbreviated range such as `9am - 12pm`.
pub fn format_range(period: &TimePeriodConfig) -> String {
    format!(
        "{} - {}",
        format_hour_short(period.start_hour),
        format_hour_short(period.end_hour)
    )
}

fn format_hour_short(hour: u32) -> String {
    match hour % 24 {
        0 => "12am".to_string(),
        12 => "12pm".to_string(),
        h if h < 12 => format!("{h}am"),
        h => format!("{}pm", h - 12),
    }
}

pub fn sort_order(time_period_id: Option<&str>) -> u32 {
    time_period_id
        .and_then(TimePeriod::from_id)
        .map_or(ANYTIME_SORT_ORDER, TimePeriod::sort_order)
}

pub fn default_reminder_time(time_period_id: Option<&str>) -> Option<String> {
    time_period_id
        .and_then(lookup_period)
        .map(TimePeriodConfig::default_reminder)
}

/// Period whose half-open range contains `time`. Early hours before the
/// first period belong to none.
pub fn period_for_time(time: NaiveTime) -> Option<TimePeriod> {
    TIME_PERIODS
        .iter()
        .find(|config| config.contains(time))
        .map(|config| config.id)
}

pub fn parse_clock_time(raw: &str) -> Result<NaiveTime, CadenceError> {
    let trimmed = raw.trim();
    CLOCK_FORMATS
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(trimmed, format).ok())
        .ok_or_else(|| CadenceError::InvalidClockTime(raw.to_string()))
}

/// Ordering for task lists: period order, then clock time, anytime last.
pub fn compare_preferences(a: &TimeSchedulingPreference, b: &TimeSchedulingPreference) -> Ordering {
    let key = |pref: &TimeSchedulingPreference| {
        let time = pref.parsed_clock_time();
        (sort_order(pref.period_id()), time.is_none(), time)
    };
    key(a).cmp(&key(b))
}
