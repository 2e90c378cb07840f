use chrono::{
    DateTime, Days, Duration, FixedOffset, LocalResult, NaiveDate, NaiveDateTime, NaiveTime,
    TimeZone,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::CadenceError;

const MINUTES_PER_DAY: i64 = 24 * 60;

const LOCAL_TIMESTAMP_FORMATS: [&str; 3] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

/// Reference point a cohort's drip schedule is computed from.
///
/// Upstream records mix calendar dates and timestamps. Any input containing a
/// literal `T` is read as a timestamp, everything else as a calendar date that
/// starts at local midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CohortAnchor {
    Date(NaiveDate),
    /// Timestamp without an offset, read as wall-clock time in the caller's zone.
    Local(NaiveDateTime),
    Instant(DateTime<FixedOffset>),
}

impl CohortAnchor {
    pub fn parse(raw: &str) -> Result<Self, CadenceError> {
        let trimmed = raw.trim();
        let invalid = || CadenceError::InvalidAnchor(raw.to_string());

        if trimmed.contains('T') {
            if let Ok(instant) = DateTime::parse_from_rfc3339(trimmed) {
                return Ok(Self::Instant(instant));
            }
            return LOCAL_TIMESTAMP_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
                .map(Self::Local)
                .ok_or_else(invalid);
        }

        NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
            .map(Self::Date)
            .map_err(|_| invalid())
    }

    /// Wall-clock start of the anchor in `tz`.
    pub fn local_start<Tz: TimeZone>(&self, tz: &Tz) -> NaiveDateTime {
        match self {
            Self::Date(date) => date.and_time(NaiveTime::MIN),
            Self::Local(local) => *local,
            Self::Instant(instant) => instant.with_timezone(tz).naive_local(),
        }
    }

    /// Unlock instant for release wave `drip_delay_days`.
    ///
    /// Wave 1 unlocks exactly at the anchor, wave N at N-1 days after it. The
    /// cohort offset shifts every wave by the same number of calendar days.
    /// Returns `None` when the shift overflows or the shifted date leaves
    /// chrono's range.
    pub fn release_instant<Tz: TimeZone>(
        &self,
        drip_delay_days: u32,
        cohort_offset_days: i64,
        tz: &Tz,
    ) -> Option<DateTime<Tz>> {
        let shift = i64::from(drip_delay_days)
            .checked_sub(1)?
            .checked_add(cohort_offset_days)?;
        let local = shift_days(self.local_start(tz), shift)?;
        Some(localize(tz, local))
    }
}

/// Outcome of a single availability check. Recomputed on every call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    pub is_available: bool,
    pub available_at: Option<DateTime<FixedOffset>>,
    pub countdown_label: Option<String>,
}

impl Availability {
    fn unlocked() -> Self {
        Self {
            is_available: true,
            available_at: None,
            countdown_label: None,
        }
    }
}

/// Drip configuration of one content item within a cohort.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseRule {
    pub drip_delay_days: u32,
    pub cohort_anchor_date: Option<String>,
    #[serde(default)]
    pub cohort_offset_days: i64,
}

impl ReleaseRule {
    pub fn evaluate<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Availability {
        compute_availability(
            self.drip_delay_days,
            self.cohort_anchor_date.as_deref(),
            self.cohort_offset_days,
            now,
        )
    }
}

/// Decide whether content released on wave `drip_delay_days` is open at `now`.
///
/// Never fails: a zero delay, a missing anchor and an unparseable anchor all
/// resolve to "available" so drip configuration can never lock content away.
pub fn compute_availability<Tz: TimeZone>(
    drip_delay_days: u32,
    cohort_anchor_date: Option<&str>,
    cohort_offset_days: i64,
    now: &DateTime<Tz>,
) -> Availability {
    if drip_delay_days == 0 {
        return Availability::unlocked();
    }
    let Some(raw) = cohort_anchor_date.filter(|raw| !raw.trim().is_empty()) else {
        return Availability::unlocked();
    };
    let anchor = match CohortAnchor::parse(raw) {
        Ok(anchor) => anchor,
        Err(err) => {
            warn!(%err, "cohort anchor unreadable, releasing content");
            return Availability::unlocked();
        }
    };
    availability_for_anchor(&anchor, drip_delay_days, cohort_offset_days, now)
}

/// Same as [`compute_availability`] for an anchor that is already parsed.
pub fn availability_for_anchor<Tz: TimeZone>(
    anchor: &CohortAnchor,
    drip_delay_days: u32,
    cohort_offset_days: i64,
    now: &DateTime<Tz>,
) -> Availability {
    if drip_delay_days == 0 {
        return Availability::unlocked();
    }
    let Some(available_at) =
        anchor.release_instant(drip_delay_days, cohort_offset_days, &now.timezone())
    else {
        warn!(
            drip_delay_days,
            cohort_offset_days, "release date out of range, releasing content"
        );
        return Availability::unlocked();
    };

    let is_available = *now >= available_at;
    let countdown_label = if is_available {
        None
    } else {
        let remaining = available_at.clone().signed_duration_since(now.clone());
        Some(countdown_label(remaining))
    };
    debug!(drip_delay_days, cohort_offset_days, is_available, "drip availability");

    Availability {
        is_available,
        available_at: Some(available_at.fixed_offset()),
        countdown_label,
    }
}

/// Render the time left until release.
///
/// Only whole minutes count; the coarsest non-zero unit wins and finer units
/// are dropped once more than one day or hour remains.
pub fn countdown_label(remaining: Duration) -> String {
    let total_minutes = remaining.num_minutes().max(0);
    let days = total_minutes / MINUTES_PER_DAY;
    let hours = (total_minutes % MINUTES_PER_DAY) / 60;
    let minutes = total_minutes % 60;

    match (days, hours, minutes) {
        (d, _, _) if d > 1 => format!("Available in {d} days"),
        (1, h, _) if h > 0 => format!("Available in 1 day, {h}h"),
        (1, _, _) => "Available in 1 day".to_string(),
        (0, h, _) if h > 1 => format!("Available in {h} hours"),
        (0, 1, m) if m > 0 => format!("Available in 1h {m}m"),
        (0, 1, _) => "Available in 1 hour".to_string(),
        (0, 0, m) if m > 0 => format!("Available in {m} minutes"),
        _ => "Available soon".to_string(),
    }
}

fn shift_days(start: NaiveDateTime, days: i64) -> Option<NaiveDateTime> {
    let magnitude = Days::new(days.unsigned_abs());
    if days >= 0 {
        start.checked_add_days(magnitude)
    } else {
        start.checked_sub_days(magnitude)
    }
}

pub(crate) fn localize<Tz: TimeZone>(tz: &Tz, local: NaiveDateTime) -> DateTime<Tz> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(instant) => instant,
        LocalResult::Ambiguous(earliest, _) => earliest,
        // Wall-clock time skipped by a forward transition.
        LocalResult::None => local
            .checked_add_signed(Duration::hours(1))
            .and_then(|later| tz.from_local_datetime(&later).earliest())
            .unwrap_or_else(|| tz.from_utc_datetime(&local)),
    }
}
