use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    drip::localize,
    notifications::{NotificationRequest, NotificationSink},
    time_period::{format_label, TimeSchedulingPreference},
};

/// Task as seen by the reminder planner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledTask {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub preference: TimeSchedulingPreference,
}

/// Clock time a task should ping at: its explicit clock time, else the
/// period's default reminder, else nothing for anytime tasks.
pub fn reminder_time(pref: &TimeSchedulingPreference) -> Option<NaiveTime> {
    pref.parsed_clock_time()
        .or_else(|| pref.period().map(|period| period.config().default_reminder_time()))
}

pub fn reminder_at<Tz: TimeZone>(
    pref: &TimeSchedulingPreference,
    date: NaiveDate,
    tz: &Tz,
) -> Option<DateTime<Tz>> {
    reminder_time(pref).map(|time| localize(tz, date.and_time(time)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderPlanner {
    lead_time: Duration,
}

impl Default for ReminderPlanner {
    fn default() -> Self {
        Self {
            lead_time: Duration::zero(),
        }
    }
}

impl ReminderPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire reminders this long before the task's slot.
    pub fn with_lead_time(mut self, lead_time: Duration) -> Self {
        self.lead_time = lead_time.max(Duration::zero());
        self
    }

    /// Reminders for `date`, skipping anytime tasks and slots already past at `now`.
    pub fn plan<Tz: TimeZone>(
        &self,
        tasks: &[ScheduledTask],
        date: NaiveDate,
        now: &DateTime<Tz>,
    ) -> Vec<NotificationRequest> {
        let tz = now.timezone();
        let mut requests: Vec<NotificationRequest> = tasks
            .iter()
            .filter_map(|task| {
                let slot = reminder_at(&task.preference, date, &tz)?;
                let fire_at = slot - self.lead_time;
                if fire_at <= *now {
                    debug!(task_id = %task.id, "reminder slot already passed");
                    return None;
                }
                Some(NotificationRequest {
                    key: reminder_key(&task.id, date),
                    title: task.title.clone(),
                    body: format_label(&task.preference, true),
                    scheduled_for: fire_at.with_timezone(&Utc),
                })
            })
            .collect();
        requests.sort_by(|a, b| {
            a.scheduled_for
                .cmp(&b.scheduled_for)
                .then_with(|| a.key.cmp(&b.key))
        });
        requests
    }

    /// Plan and hand every reminder to `sink`. Returns how many were scheduled.
    pub fn dispatch<Tz: TimeZone>(
        &self,
        sink: &dyn NotificationSink,
        tasks: &[ScheduledTask],
        date: NaiveDate,
        now: &DateTime<Tz>,
    ) -> usize {
        let requests = self.plan(tasks, date, now);
        let count = requests.len();
        for request in requests {
            sink.cancel(&request.key);
            sink.schedule(request);
        }
        debug!(count, %date, "reminders dispatched");
        count
    }
}

pub fn reminder_key(task_id: &str, date: NaiveDate) -> String {
    format!("task:{}:{}", task_id, date.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time_period::TimePeriod;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        scheduled: Mutex<Vec<NotificationRequest>>,
        cancelled: Mutex<Vec<String>>,
    }

    impl NotificationSink for RecordingSink {
        fn schedule(&self, notification: NotificationRequest) {
            self.scheduled.lock().push(notification);
        }

        fn cancel(&self, key: &str) {
            self.cancelled.lock().push(key.to_string());
        }
    }

    fn task(id: &str, preference: TimeSchedulingPreference) -> ScheduledTask {
        ScheduledTask {
            id: id.to_string(),
            title: format!("Task {id}"),
            preference,
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
    }

    #[test]
    fn reminder_time_falls_back_to_the_period_default() {
        let evening = TimeSchedulingPreference::part_of_day(TimePeriod::Evening);
        assert_eq!(reminder_time(&evening), NaiveTime::from_hms_opt(18, 0, 0));
        assert_eq!(
            reminder_time(&TimeSchedulingPreference::at("07:30")),
            NaiveTime::from_hms_opt(7, 30, 0)
        );
        assert_eq!(reminder_time(&TimeSchedulingPreference::anytime()), None);
    }

    #[test]
    fn explicit_clock_time_beats_the_period_default() {
        let both = TimeSchedulingPreference {
            time_period_id: Some("morning".into()),
            scheduled_clock_time: Some("10:30".into()),
        };
        assert_eq!(reminder_time(&both), NaiveTime::from_hms_opt(10, 30, 0));

        let unreadable_clock = TimeSchedulingPreference {
            time_period_id: Some("morning".into()),
            scheduled_clock_time: Some("half past ten".into()),
        };
        assert_eq!(reminder_time(&unreadable_clock), NaiveTime::from_hms_opt(9, 0, 0));
    }

    #[test]
    fn plans_future_reminders_in_order() {
        let now = Utc.with_ymd_and_hms(2025, 3, 14, 8, 0, 0).unwrap();
        let tasks = vec![
            task("journal", TimeSchedulingPreference::part_of_day(TimePeriod::Night)),
            task("stretch", TimeSchedulingPreference::part_of_day(TimePeriod::StartOfDay)),
            task("call", TimeSchedulingPreference::at("10:45")),
            task("read", TimeSchedulingPreference::anytime()),
        ];

        let requests = ReminderPlanner::new().plan(&tasks, date(), &now);
        let keys: Vec<&str> = requests.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["task:call:2025-03-14", "task:journal:2025-03-14"]);
        assert_eq!(requests[0].body, "10:45 AM");
        assert_eq!(requests[1].body, "🌙 Night");
        assert_eq!(
            requests[1].scheduled_for,
            Utc.with_ymd_and_hms(2025, 3, 14, 21, 0, 0).unwrap()
        );
    }

    #[test]
    fn lead_time_moves_reminders_earlier() {
        let now = Utc.with_ymd_and_hms(2025, 3, 14, 8, 0, 0).unwrap();
        let tasks = vec![task("call", TimeSchedulingPreference::at("10:45"))];
        let requests = ReminderPlanner::new()
            .with_lead_time(Duration::minutes(15))
            .plan(&tasks, date(), &now);
        assert_eq!(
            requests[0].scheduled_for,
            Utc.with_ymd_and_hms(2025, 3, 14, 10, 30, 0).unwrap()
        );
    }

    #[test]
    fn dispatch_replaces_existing_reminders() {
        let sink = RecordingSink::default();
        let now = Utc.with_ymd_and_hms(2025, 3, 13, 20, 0, 0).unwrap();
        let tasks = vec![
            task("a", TimeSchedulingPreference::part_of_day(TimePeriod::Morning)),
            task("b", TimeSchedulingPreference::at("13:00")),
        ];
        let count = ReminderPlanner::new().dispatch(&sink, &tasks, date(), &now);
        assert_eq!(count, 2);
        assert_eq!(sink.scheduled.lock().len(), 2);
        assert_eq!(
            *sink.cancelled.lock(),
            vec!["task:a:2025-03-14".to_string(), "task:b:2025-03-14".to_string()]
        );
    }
}
