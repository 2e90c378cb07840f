use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

const LEDGER_VERSION: u32 = 1;
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Remembers which tasks were already pushed to the device calendar on which
/// day, so a re-sync only exports what is new.
#[derive(Debug, Default)]
pub struct CalendarSyncLedger {
    entries: RwLock<BTreeMap<NaiveDate, BTreeSet<String>>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct LedgerFile {
    version: u32,
    synced: BTreeMap<String, BTreeSet<String>>,
}

impl CalendarSyncLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when the task was not yet recorded for `date`.
    pub fn mark_synced(&self, date: NaiveDate, task_id: &str) -> bool {
        self.entries
            .write()
            .entry(date)
            .or_default()
            .insert(task_id.to_string())
    }

    pub fn is_synced(&self, date: NaiveDate, task_id: &str) -> bool {
        self.entries
            .read()
            .get(&date)
            .is_some_and(|ids| ids.contains(task_id))
    }

    /// Ids from `task_ids` that still need exporting for `date`, in input order.
    pub fn unsynced<'a>(
        &self,
        date: NaiveDate,
        task_ids: impl IntoIterator<Item = &'a str>,
    ) -> Vec<String> {
        let entries = self.entries.read();
        let synced = entries.get(&date);
        task_ids
            .into_iter()
            .filter(|id| !synced.is_some_and(|ids| ids.contains(*id)))
            .map(str::to_string)
            .collect()
    }

    pub fn forget(&self, date: NaiveDate, task_id: &str) -> bool {
        let mut entries = self.entries.write();
        let Some(ids) = entries.get_mut(&date) else {
            return false;
        };
        let removed = ids.remove(task_id);
        if ids.is_empty() {
            entries.remove(&date);
        }
        removed
    }

    /// Drop every day before `cutoff`. Returns the number of days removed.
    pub fn prune_before(&self, cutoff: NaiveDate) -> usize {
        let mut entries = self.entries.write();
        let kept = entries.split_off(&cutoff);
        let removed = entries.len();
        *entries = kept;
        removed
    }

    /// Total (date, task) pairs recorded.
    pub fn len(&self) -> usize {
        self.entries.read().values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Load a ledger from disk. A missing file yields an empty ledger.
    #[instrument]
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("no ledger on disk, starting empty");
            return Ok(Self::new());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read ledger {}", path.display()))?;
        let file: LedgerFile = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse ledger {}", path.display()))?;
        anyhow::ensure!(
            file.version == LEDGER_VERSION,
            "unsupported ledger version {} in {}",
            file.version,
            path.display()
        );

        let mut entries = BTreeMap::new();
        for (day, ids) in file.synced {
            let date = NaiveDate::parse_from_str(&day, DATE_FORMAT)
                .with_context(|| format!("invalid ledger date `{day}`"))?;
            entries.insert(date, ids);
        }
        Ok(Self {
            entries: RwLock::new(entries),
        })
    }

    #[instrument(skip(self))]
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
        }
        let file = LedgerFile {
            version: LEDGER_VERSION,
            synced: self
                .entries
                .read()
                .iter()
                .map(|(date, ids)| (date.format(DATE_FORMAT).to_string(), ids.clone()))
                .collect(),
        };
        let payload = serde_json::to_string_pretty(&file)?;
        fs::write(path, payload)
            .with_context(|| format!("failed to write ledger {}", path.display()))?;
        Ok(())
    }
}
