use std::collections::HashSet;

use anyhow::{anyhow, Result};
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::{
    drip::{availability_for_anchor, compute_availability, Availability, CohortAnchor},
    notifications::{NotificationRequest, NotificationSink},
    release::ReleaseTemplate,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: String,
    pub title: String,
    pub drip_delay_days: u32,
}

impl ContentItem {
    pub fn new(id: impl Into<String>, title: impl Into<String>, drip_delay_days: u32) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            drip_delay_days,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRelease {
    pub item: ContentItem,
    pub availability: Availability,
}

/// Drip schedule of one cohort: a shared anchor and offset applied to every
/// content item.
pub struct ReleaseService {
    anchor_raw: Option<String>,
    anchor: Option<CohortAnchor>,
    offset_days: i64,
    items: RwLock<Vec<ContentItem>>,
    notification_sink: Option<Box<dyn NotificationSink>>,
}

pub struct ReleaseServiceBuilder {
    anchor: Option<String>,
    offset_days: i64,
    items: Vec<ContentItem>,
    notification_sink: Option<Box<dyn NotificationSink>>,
}

impl Default for ReleaseServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReleaseServiceBuilder {
    pub fn new() -> Self {
        Self {
            anchor: None,
            offset_days: 0,
            items: Vec::new(),
            notification_sink: None,
        }
    }

    pub fn anchor(mut self, anchor: impl Into<String>) -> Self {
        self.anchor = Some(anchor.into());
        self
    }

    pub fn offset_days(mut self, offset_days: i64) -> Self {
        self.offset_days = offset_days;
        self
    }

    pub fn add_item(mut self, item: ContentItem) -> Self {
        self.items.push(item);
        self
    }

    pub fn with_notification_sink(mut self, sink: Box<dyn NotificationSink>) -> Self {
        self.notification_sink = Some(sink);
        self
    }

    pub fn build(self) -> Result<ReleaseService> {
        let mut seen = HashSet::new();
        for item in &self.items {
            anyhow::ensure!(
                seen.insert(item.id.as_str()),
                "duplicate content item `{}`",
                item.id
            );
        }

        let anchor_raw = self.anchor.filter(|raw| !raw.trim().is_empty());
        let anchor = match anchor_raw.as_deref().map(CohortAnchor::parse) {
            Some(Ok(anchor)) => Some(anchor),
            Some(Err(err)) => {
                warn!(%err, "cohort anchor unreadable, every item will be open");
                None
            }
            None => None,
        };

        Ok(ReleaseService {
            anchor_raw,
            anchor,
            offset_days: self.offset_days,
            items: RwLock::new(self.items),
            notification_sink: self.notification_sink,
        })
    }
}

impl ReleaseService {
    pub fn builder() -> ReleaseServiceBuilder {
        ReleaseServiceBuilder::new()
    }

    pub fn anchor(&self) -> Option<&str> {
        self.anchor_raw.as_deref()
    }

    pub fn offset_days(&self) -> i64 {
        self.offset_days
    }

    pub fn items(&self) -> Vec<ContentItem> {
        self.items.read().clone()
    }

    pub fn add_item(&self, item: ContentItem) -> Result<()> {
        let mut items = self.items.write();
        if items.iter().any(|existing| existing.id == item.id) {
            return Err(anyhow!("duplicate content item `{}`", item.id));
        }
        items.push(item);
        Ok(())
    }

    /// Append `titles` with delays from `template`, counting positions from zero.
    #[instrument(skip(self, titles))]
    pub fn plan_items(&self, template: ReleaseTemplate, titles: &[&str]) -> Result<Vec<ContentItem>> {
        let mut items = self.items.write();
        let base = items.len();
        let mut planned = Vec::with_capacity(titles.len());
        for (index, title) in titles.iter().enumerate() {
            let id = format!("item-{}", base + index + 1);
            anyhow::ensure!(
                !items.iter().any(|existing| existing.id == id),
                "duplicate content item `{}`",
                id
            );
            let position = u32::try_from(index)?;
            planned.push(ContentItem::new(id, *title, template.delay_for_index(position)));
        }
        items.extend(planned.iter().cloned());
        debug!(count = planned.len(), "planned content items");
        Ok(planned)
    }

    pub fn availability<Tz: TimeZone>(&self, item_id: &str, now: &DateTime<Tz>) -> Result<Availability> {
        let items = self.items.read();
        let item = items
            .iter()
            .find(|item| item.id == item_id)
            .ok_or_else(|| anyhow!("unknown content item `{}`", item_id))?;
        Ok(self.evaluate(item.drip_delay_days, now))
    }

    /// Every item with its availability, earliest unlock first. Items with no
    /// unlock boundary lead; ties fall back to delay and id.
    pub fn snapshot<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Vec<ContentRelease> {
        let mut releases: Vec<ContentRelease> = self
            .items
            .read()
            .iter()
            .map(|item| ContentRelease {
                availability: self.evaluate(item.drip_delay_days, now),
                item: item.clone(),
            })
            .collect();
        releases.sort_by(|a, b| {
            a.availability
                .available_at
                .cmp(&b.availability.available_at)
                .then_with(|| a.item.drip_delay_days.cmp(&b.item.drip_delay_days))
                .then_with(|| a.item.id.cmp(&b.item.id))
        });
        releases
    }

    pub fn next_unlock<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Option<ContentRelease> {
        self.snapshot(now)
            .into_iter()
            .find(|release| !release.availability.is_available)
    }

    /// Queue one notification per locked item at its unlock instant.
    pub fn schedule_unlock_notifications<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> usize {
        let Some(sink) = &self.notification_sink else {
            debug!("no notification sink configured");
            return 0;
        };
        let mut scheduled = 0;
        for release in self.snapshot(now) {
            if release.availability.is_available {
                continue;
            }
            let Some(at) = release.availability.available_at else {
                continue;
            };
            let key = unlock_key(&release.item.id);
            sink.cancel(&key);
            sink.schedule(NotificationRequest {
                key,
                title: "New content unlocked".to_string(),
                body: release.item.title.clone(),
                scheduled_for: at.with_timezone(&Utc),
            });
            scheduled += 1;
        }
        debug!(scheduled, "unlock notifications queued");
        scheduled
    }

    fn evaluate<Tz: TimeZone>(&self, drip_delay_days: u32, now: &DateTime<Tz>) -> Availability {
        match &self.anchor {
            Some(anchor) => availability_for_anchor(anchor, drip_delay_days, self.offset_days, now),
            None => compute_availability(drip_delay_days, None, self.offset_days, now),
        }
    }
}

pub fn unlock_key(item_id: &str) -> String {
    format!("unlock:{item_id}")
}
