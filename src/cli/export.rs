use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::categorizer::ProcessResult;
use crate::config::CategoryTable;
use crate::error::Result;
use crate::fmt::decimal;

const HEADER: [&str; 11] = [
    "id",
    "date",
    "description",
    "amount",
    "action",
    "reason",
    "category_id",
    "category",
    "new_description",
    "tags",
    "current_tags",
];

/// Where `--csv` without a value writes to.
pub fn default_export_path(exports_dir: &Path, started_at: DateTime<Local>) -> PathBuf {
    exports_dir.join(format!(
        "categorize-{}.csv",
        started_at.format("%Y%m%d-%H%M%S")
    ))
}

/// One row per result, skips included. Amounts are plain decimals so the
/// file loads cleanly into a spreadsheet.
pub fn write_results_csv(
    path: &Path,
    results: &[ProcessResult<'_>],
    categories: &CategoryTable,
) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(HEADER)?;

    for r in results {
        let txn = r.transaction;
        let changes = r.changes.as_ref();
        let category_id = changes.and_then(|c| c.category_id);
        wtr.write_record([
            txn.id.to_string(),
            txn.date.to_string(),
            txn.description.clone(),
            decimal(txn.amount_cents),
            r.action.to_string(),
            r.reason.map(|x| x.to_string()).unwrap_or_default(),
            category_id.map(|id| id.to_string()).unwrap_or_default(),
            category_id
                .and_then(|id| categories.name_for(id))
                .unwrap_or_default()
                .to_string(),
            changes
                .and_then(|c| c.description.clone())
                .unwrap_or_default(),
            changes
                .and_then(|c| c.tags.as_ref())
                .map(|tags| tags.join(";"))
                .unwrap_or_default(),
            txn.tag_names().join(";"),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}
