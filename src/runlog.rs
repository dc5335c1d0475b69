use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDate};
use serde::Serialize;

use crate::categorizer::{Action, ProcessResult, Reason, Summary, TransactionChanges};
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WriteOutcome {
    NotWritten,
    Written,
    Failed { error: String },
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct RunMode {
    pub rename_only: bool,
    pub tags_only: bool,
    pub force: bool,
    pub cross_invoice: bool,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunSource {
    Account { start: NaiveDate, end: NaiveDate },
    Invoice { card_id: i64, invoice_id: i64 },
}

#[derive(Debug, Serialize)]
pub struct RunLogEntry<'a> {
    pub id: i64,
    pub date: NaiveDate,
    pub description: &'a str,
    pub amount_cents: i64,
    pub action: Action,
    pub reason: Option<Reason>,
    pub changes: Option<&'a TransactionChanges>,
    pub outcome: &'a WriteOutcome,
}

/// Record of one `categorize` run, written as pretty JSON.
#[derive(Debug, Serialize)]
pub struct RunLog<'a> {
    pub started_at: DateTime<Local>,
    pub dry_run: bool,
    pub mode: RunMode,
    pub source: RunSource,
    pub summary: &'a Summary,
    pub entries: Vec<RunLogEntry<'a>>,
}

impl<'a> RunLog<'a> {
    pub fn new(
        started_at: DateTime<Local>,
        dry_run: bool,
        mode: RunMode,
        source: RunSource,
        summary: &'a Summary,
        results: &'a [ProcessResult<'a>],
        outcomes: &'a [WriteOutcome],
    ) -> Self {
        let entries = results
            .iter()
            .zip(outcomes)
            .map(|(r, outcome)| RunLogEntry {
                id: r.transaction.id,
                date: r.transaction.date,
                description: &r.transaction.description,
                amount_cents: r.transaction.amount_cents,
                action: r.action,
                reason: r.reason,
                changes: r.changes.as_ref(),
                outcome,
            })
            .collect();
        Self {
            started_at,
            dry_run,
            mode,
            source,
            summary,
            entries,
        }
    }

    pub fn file_name(&self) -> String {
        format!("run-{}.json", self.started_at.format("%Y%m%d-%H%M%S"))
    }

    /// Write into `dir`, creating it if needed. Returns the file path.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name());
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, format!("{json}\n"))?;
        Ok(path)
    }
}
