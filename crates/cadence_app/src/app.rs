use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::{Context, Result};
use cadence_core::{
    calendar_sync::CalendarSyncLedger,
    service::ContentRelease,
    time_period::{format_range, TIME_PERIODS},
    ReleaseService, ReleaseTemplate,
};
use chrono::{DateTime, Local, TimeZone};
use serde::Serialize;
use tracing::{info, warn};

/// Upper bound for `CADENCE_ITEM_COUNT`.
pub const MAX_ITEM_COUNT: usize = 1_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub(crate) anchor: Option<String>,
    pub(crate) offset_days: i64,
    pub(crate) template: ReleaseTemplate,
    pub(crate) item_count: usize,
    pub(crate) output: OutputFormat,
    pub(crate) ledger_path: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(anchor) = lookup("CADENCE_ANCHOR_DATE") {
            let anchor = anchor.trim();
            if !anchor.is_empty() {
                config.anchor = Some(anchor.to_string());
            }
        }
        if let Some(offset) = lookup("CADENCE_OFFSET_DAYS") {
            match offset.trim().parse::<i64>() {
                Ok(value) => config.offset_days = value,
                Err(err) => warn!(%offset, %err, "ignoring CADENCE_OFFSET_DAYS"),
            }
        }
        if let Some(template) = lookup("CADENCE_TEMPLATE") {
            match template.parse::<ReleaseTemplate>() {
                Ok(value) => config.template = value,
                Err(err) => warn!(%err, "ignoring CADENCE_TEMPLATE"),
            }
        }
        if let Some(count) = lookup("CADENCE_ITEM_COUNT") {
            match count.trim().parse::<usize>() {
                Ok(value) if value > MAX_ITEM_COUNT => {
                    warn!(%count, max = MAX_ITEM_COUNT, "capping CADENCE_ITEM_COUNT");
                    config.item_count = MAX_ITEM_COUNT;
                }
                Ok(value) if value > 0 => config.item_count = value,
                _ => warn!(%count, "ignoring CADENCE_ITEM_COUNT"),
            }
        }
        if let Some(path) = lookup("CADENCE_LEDGER_PATH") {
            let path = path.trim();
            if !path.is_empty() {
                config.ledger_path = Some(PathBuf::from(path));
            }
        }
        if let Some(output) = lookup("CADENCE_OUTPUT") {
            if output.trim().eq_ignore_ascii_case("json") {
                config.output = OutputFormat::Json;
            }
        }
        config
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            anchor: None,
            offset_days: 0,
            template: ReleaseTemplate::Weekly,
            item_count: 8,
            output: OutputFormat::Text,
            ledger_path: None,
        }
    }
}

#[derive(Serialize)]
struct Report<'a> {
    anchor: Option<&'a str>,
    offset_days: i64,
    template: ReleaseTemplate,
    releases: &'a [ContentRelease],
    #[serde(skip_serializing_if = "Option::is_none")]
    ledger_entries: Option<usize>,
}

pub fn run(config: AppConfig) -> Result<()> {
    let report = render_report(&config, &Local::now())?;
    println!("{report}");
    Ok(())
}

pub fn render_report<Tz: TimeZone>(config: &AppConfig, now: &DateTime<Tz>) -> Result<String> {
    info!(
        anchor = ?config.anchor,
        offset_days = config.offset_days,
        template = %config.template,
        items = config.item_count,
        "building release report"
    );
    let mut builder = ReleaseService::builder().offset_days(config.offset_days);
    if let Some(anchor) = &config.anchor {
        builder = builder.anchor(anchor.clone());
    }
    let service = builder
        .build()
        .context("failed to initialize release service")?;

    let titles: Vec<String> = (1..=config.item_count)
        .map(|n| format!("Lesson {n}"))
        .collect();
    let title_refs: Vec<&str> = titles.iter().map(String::as_str).collect();
    service.plan_items(config.template, &title_refs)?;
    let releases = service.snapshot(now);

    let ledger_entries = match &config.ledger_path {
        Some(path) => {
            let ledger = CalendarSyncLedger::load(path)
                .with_context(|| format!("failed to load calendar ledger {}", path.display()))?;
            Some(ledger.len())
        }
        None => None,
    };

    match config.output {
        OutputFormat::Json => {
            let report = Report {
                anchor: service.anchor(),
                offset_days: service.offset_days(),
                template: config.template,
                releases: &releases,
                ledger_entries,
            };
            Ok(serde_json::to_string_pretty(&report)?)
        }
        OutputFormat::Text => Ok(render_text(config, &releases, ledger_entries)),
    }
}

fn render_text(
    config: &AppConfig,
    releases: &[ContentRelease],
    ledger_entries: Option<usize>,
) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Template: {} ({})",
        config.template.label(),
        config.template
    );
    let _ = writeln!(
        out,
        "Anchor: {} | offset {} day(s)",
        config.anchor.as_deref().unwrap_or("none"),
        config.offset_days
    );
    for release in releases {
        let status = match &release.availability.countdown_label {
            Some(label) => label.as_str(),
            None => "Available",
        };
        let when = release
            .availability
            .available_at
            .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "  {:<10} wave {:>3}  {:<16}  {}",
            release.item.title, release.item.drip_delay_days, when, status
        );
    }
    if let Some(entries) = ledger_entries {
        let _ = writeln!(out, "Calendar ledger: {entries} synced task(s)");
    }
    let _ = writeln!(out, "Day periods:");
    for period in TIME_PERIODS.iter() {
        let _ = writeln!(
            out,
            "  {} {:<12} {}",
            period.emoji,
            period.label,
            format_range(period)
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> AppConfig {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn reads_configuration_with_fallbacks() {
        let config = config_from(&[
            ("CADENCE_ANCHOR_DATE", "2024-01-10"),
            ("CADENCE_OFFSET_DAYS", "-2"),
            ("CADENCE_TEMPLATE", "biweekly"),
            ("CADENCE_ITEM_COUNT", "0"),
            ("CADENCE_OUTPUT", "JSON"),
            ("CADENCE_LEDGER_PATH", "/var/lib/cadence/calendar.json"),
        ]);
        assert_eq!(config.anchor.as_deref(), Some("2024-01-10"));
        assert_eq!(config.offset_days, -2);
        assert_eq!(config.template, ReleaseTemplate::Biweekly);
        assert_eq!(config.item_count, 8);
        assert_eq!(config.output, OutputFormat::Json);
        assert_eq!(
            config.ledger_path,
            Some(PathBuf::from("/var/lib/cadence/calendar.json"))
        );

        let fallback = config_from(&[("CADENCE_TEMPLATE", "hourly"), ("CADENCE_OFFSET_DAYS", "x")]);
        assert_eq!(fallback.template, ReleaseTemplate::Weekly);
        assert_eq!(fallback.offset_days, 0);
        assert_eq!(fallback.ledger_path, None);

        let capped = config_from(&[("CADENCE_ITEM_COUNT", "18446744073709551615")]);
        assert_eq!(capped.item_count, MAX_ITEM_COUNT);
        let blank_ledger = config_from(&[("CADENCE_LEDGER_PATH", "  ")]);
        assert_eq!(blank_ledger.ledger_path, None);
    }

    #[test]
    fn reports_calendar_ledger_entries() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("calendar.json");
        let ledger = CalendarSyncLedger::new();
        let day = chrono::NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        ledger.mark_synced(day, "walk");
        ledger.mark_synced(day, "journal");
        ledger.save(&path).expect("save ledger");

        let config = config_from(&[
            ("CADENCE_ITEM_COUNT", "1"),
            ("CADENCE_LEDGER_PATH", path.to_str().unwrap()),
        ]);
        let now = Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap();
        let report = render_report(&config, &now).unwrap();
        assert!(report.contains("Calendar ledger: 2 synced task(s)"));

        let missing = config_from(&[(
            "CADENCE_LEDGER_PATH",
            temp.path().join("absent.json").to_str().unwrap(),
        )]);
        assert!(render_report(&missing, &now)
            .unwrap()
            .contains("Calendar ledger: 0 synced task(s)"));

        std::fs::write(&path, "{ broken").expect("corrupt ledger");
        let err = render_report(&config, &now).unwrap_err();
        assert!(err.to_string().contains("failed to load calendar ledger"));
    }

    #[test]
    fn renders_text_report() {
        let config = config_from(&[
            ("CADENCE_ANCHOR_DATE", "2024-01-10"),
            ("CADENCE_TEMPLATE", "daily"),
            ("CADENCE_ITEM_COUNT", "3"),
        ]);
        let now = Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap();
        let report = render_report(&config, &now).unwrap();
        assert!(report.contains("Template: One per day (daily)"));
        assert!(report.contains("Available in 12 hours"));
        assert!(report.contains("9pm - 12am"));
    }

    #[test]
    fn renders_json_report() {
        let config = config_from(&[("CADENCE_ITEM_COUNT", "2"), ("CADENCE_OUTPUT", "json")]);
        let now = Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap();
        let report = render_report(&config, &now).unwrap();
        let value: serde_json::Value = serde_json::from_str(&report).unwrap();
        assert_eq!(value["template"], "weekly");
        assert_eq!(value["releases"].as_array().map(Vec::len), Some(2));
        assert_eq!(value["releases"][1]["availability"]["is_available"], true);
    }
}
