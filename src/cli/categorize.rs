use chrono::{Datelike, Local, Months, NaiveDate};
use colored::{ColoredString, Colorize};
use comfy_table::{Cell, Table};

use crate::categorizer::{
    process_batch, Action, InstallmentContext, ProcessOptions, ProcessResult, Summary,
    TransactionChanges,
};
use crate::cli::{export, CategorizeArgs, Context};
use crate::client::Client;
use crate::config::CategoryTable;
use crate::error::{AppError, Result};
use crate::fmt::{money, truncate};
use crate::installments::InstallmentCache;
use crate::models::{Invoice, Transaction};
use crate::runlog::{RunLog, RunMode, RunSource, WriteOutcome};

pub fn run(ctx: &Context, args: &CategorizeArgs) -> Result<()> {
    let started_at = Local::now();
    let config = ctx.config()?;
    let client = ctx.client()?;
    let batch = fetch(&client, args, started_at.date_naive())?;
    let transactions = batch.transactions();
    let source = batch.source();
    println!("Fetched {} transactions", transactions.len());

    let cross_invoice = !args.same_batch && !args.rename_only && !args.tags_only;
    let mut cache = InstallmentCache::new();
    let installments = match &batch {
        Batch::Invoice { card_id, invoice } if cross_invoice => {
            let loaded = cache.hydrate(&client, *card_id, invoice)?;
            tracing::info!(card_id, invoices = loaded, "loaded installment history");
            InstallmentContext::CrossInvoice {
                cache: &cache,
                card_id: *card_id,
            }
        }
        _ => InstallmentContext::SameBatch,
    };

    let options = ProcessOptions {
        rename_only: args.rename_only,
        tags_only: args.tags_only,
        force: args.force,
        keep_original: args.keep_original,
        installments,
    };
    let (results, warnings) = process_batch(transactions, &config, &options);
    for warning in &warnings {
        tracing::warn!("{warning}");
    }
    let summary = Summary::from_results(&results);

    print_results(&results, &config.categories, args.all);
    print_summary(&summary);

    if let Some(path) = &args.csv {
        let path = path
            .clone()
            .unwrap_or_else(|| export::default_export_path(&ctx.settings.exports_dir(), started_at));
        export::write_results_csv(&path, &results, &config.categories)?;
        println!("Wrote {}", path.display());
    }

    let outcomes = if args.apply {
        apply_changes(&results, |id, changes| {
            client.update_transaction(id, changes).map(|_| ())
        })
    } else {
        vec![WriteOutcome::NotWritten; results.len()]
    };

    let failed = outcomes
        .iter()
        .filter(|o| matches!(o, WriteOutcome::Failed { .. }))
        .count();
    if args.apply {
        let written = outcomes
            .iter()
            .filter(|o| matches!(o, WriteOutcome::Written))
            .count();
        println!("{written} transactions updated, {failed} failed");
    } else if summary.pending_writes() > 0 {
        println!(
            "{}",
            "Dry run: nothing was written. Pass --apply to write these changes.".yellow()
        );
    }

    if !args.no_log {
        let mode = RunMode {
            rename_only: args.rename_only,
            tags_only: args.tags_only,
            force: args.force,
            cross_invoice: matches!(options.installments, InstallmentContext::CrossInvoice { .. }),
        };
        let log = RunLog::new(
            started_at,
            !args.apply,
            mode,
            source,
            &summary,
            &results,
            &outcomes,
        );
        match log.write_to(&ctx.settings.logs_dir()) {
            Ok(path) => println!("Run log: {}", path.display()),
            Err(e) => tracing::warn!("could not write run log: {e}"),
        }
    }

    if failed > 0 {
        return Err(AppError::Other(format!(
            "{failed} of {} updates failed",
            summary.pending_writes()
        )));
    }
    Ok(())
}

/// Transactions of one run and where they came from.
enum Batch {
    Account {
        start: NaiveDate,
        end: NaiveDate,
        transactions: Vec<Transaction>,
    },
    /// A card invoice fetched with its transactions.
    Invoice { card_id: i64, invoice: Invoice },
}

impl Batch {
    fn transactions(&self) -> &[Transaction] {
        match self {
            Self::Account { transactions, .. } => transactions,
            Self::Invoice { invoice, .. } => &invoice.transactions,
        }
    }

    fn source(&self) -> RunSource {
        match self {
            Self::Account { start, end, .. } => RunSource::Account {
                start: *start,
                end: *end,
            },
            Self::Invoice { card_id, invoice } => RunSource::Invoice {
                card_id: *card_id,
                invoice_id: invoice.id,
            },
        }
    }
}

fn fetch(client: &Client, args: &CategorizeArgs, today: NaiveDate) -> Result<Batch> {
    let Some(card_id) = args.card else {
        let (month_start, month_end) = month_bounds(today);
        let start = args.from_date.unwrap_or(month_start);
        let end = args.to_date.unwrap_or(month_end);
        if start > end {
            return Err(AppError::Other(format!("--from {start} is after --to {end}")));
        }
        let transactions = client.list_transactions(start, end)?;
        return Ok(Batch::Account {
            start,
            end,
            transactions,
        });
    };

    let invoice_id = match args.invoice {
        Some(id) => id,
        None => {
            let invoices = client.recent_invoices(card_id).map_err(|e| unknown_card(e, card_id))?;
            pick_current_invoice(&invoices, today).ok_or_else(|| {
                AppError::Other(format!("credit card {card_id} has no invoices"))
            })?
        }
    };
    let invoice = client
        .get_invoice(card_id, invoice_id)
        .map_err(|e| unknown_card(e, card_id))?;
    tracing::info!(card_id, invoice_id, date = %invoice.date, "processing invoice");
    Ok(Batch::Invoice { card_id, invoice })
}

/// A 404 on a card path means the card id is wrong.
pub(crate) fn unknown_card(err: AppError, card_id: i64) -> AppError {
    match err {
        AppError::Api { status: 404, .. } => AppError::UnknownCard(card_id),
        other => other,
    }
}

/// First and last day of the month containing `day`.
pub fn month_bounds(day: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = day.with_day(1).unwrap_or(day);
    let end = start
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(day);
    (start, end)
}

/// The invoice whose billing period covers `today`, else the newest one.
pub fn pick_current_invoice(invoices: &[Invoice], today: NaiveDate) -> Option<i64> {
    invoices
        .iter()
        .find(|inv| inv.covers(today))
        .or_else(|| invoices.iter().max_by_key(|inv| inv.date))
        .map(|inv| inv.id)
}

/// Send each `update`/`rename` result through `write`, in order. A failed
/// write is logged and does not stop the rest.
pub fn apply_changes<F>(results: &[ProcessResult<'_>], mut write: F) -> Vec<WriteOutcome>
where
    F: FnMut(i64, &TransactionChanges) -> Result<()>,
{
    results
        .iter()
        .map(|r| match (r.action, &r.changes) {
            (Action::Update | Action::Rename, Some(changes)) => {
                match write(r.transaction.id, changes) {
                    Ok(()) => WriteOutcome::Written,
                    Err(e) => {
                        tracing::error!(id = r.transaction.id, "update failed: {e}");
                        WriteOutcome::Failed {
                            error: e.to_string(),
                        }
                    }
                }
            }
            _ => WriteOutcome::NotWritten,
        })
        .collect()
}

/// One-line summary of a change set for the results table.
pub fn describe_changes(changes: &TransactionChanges, categories: &CategoryTable) -> String {
    let mut parts = Vec::new();
    if let Some(id) = changes.category_id {
        let name = categories.name_for(id).unwrap_or("?");
        parts.push(format!("\u{2192} {name}"));
    }
    if let Some(desc) = &changes.description {
        parts.push(format!("rename: {desc}"));
    }
    if let Some(tags) = &changes.tags {
        parts.push(format!("tags: {}", tags.join(", ")));
    }
    if changes.notes.is_some() {
        parts.push("notes".to_string());
    }
    parts.join("; ")
}

fn action_label(action: Action) -> ColoredString {
    match action {
        Action::Update => action.as_str().green(),
        Action::Rename => action.as_str().cyan(),
        Action::Skip => action.as_str().dimmed(),
        Action::Conflict => action.as_str().red().bold(),
    }
}

fn print_results(results: &[ProcessResult<'_>], categories: &CategoryTable, show_skipped: bool) {
    let shown: Vec<&ProcessResult<'_>> = results
        .iter()
        .filter(|r| show_skipped || r.action != Action::Skip)
        .collect();
    if shown.is_empty() {
        println!("Nothing to change.");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec![
        "ID", "Date", "Description", "Amount", "Action", "Reason", "Changes",
    ]);
    for r in shown {
        let txn = r.transaction;
        let description = if txn.is_installment() {
            format!("{} ({}/{})", truncate(&txn.description, 40), txn.installment, txn.total_installments)
        } else {
            truncate(&txn.description, 48)
        };
        table.add_row(vec![
            Cell::new(txn.id),
            Cell::new(txn.date),
            Cell::new(description),
            Cell::new(money(txn.amount_cents)),
            Cell::new(action_label(r.action)),
            Cell::new(r.reason.map(|x| x.as_str()).unwrap_or("")),
            Cell::new(
                r.changes
                    .as_ref()
                    .map(|c| describe_changes(c, categories))
                    .unwrap_or_default(),
            ),
        ]);
    }
    println!("Proposed changes\n{table}");
}

fn print_summary(summary: &Summary) {
    let actions: Vec<String> = summary
        .actions
        .iter()
        .map(|(action, n)| format!("{n} {}", action_label(*action)))
        .collect();
    println!("{} transactions: {}", summary.total, actions.join(", "));
    if !summary.reasons.is_empty() {
        let reasons: Vec<String> = summary
            .reasons
            .iter()
            .map(|(reason, n)| format!("{reason}={n}"))
            .collect();
        println!("Reasons: {}", reasons.join(", ").bold());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, SAMPLE_RULES};
    use crate::installments::tests::make_txn;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn invoice(id: i64, d: NaiveDate, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Invoice {
        Invoice {
            id,
            date: d,
            starting_date: start,
            closing_date: end,
            amount_cents: 0,
            balance_cents: 0,
            credit_card_id: Some(1),
            transactions: Vec::new(),
        }
    }

    #[test]
    fn test_month_bounds() {
        assert_eq!(month_bounds(date(2025, 2, 14)), (date(2025, 2, 1), date(2025, 2, 28)));
        assert_eq!(month_bounds(date(2024, 2, 1)), (date(2024, 2, 1), date(2024, 2, 29)));
        assert_eq!(month_bounds(date(2025, 12, 31)), (date(2025, 12, 1), date(2025, 12, 31)));
    }

    #[test]
    fn test_pick_current_invoice_prefers_covering_period() {
        let invoices = vec![
            invoice(1, date(2025, 2, 10), Some(date(2025, 1, 3)), Some(date(2025, 2, 2))),
            invoice(2, date(2025, 3, 10), Some(date(2025, 2, 3)), Some(date(2025, 3, 2))),
            invoice(3, date(2025, 4, 10), Some(date(2025, 3, 3)), Some(date(2025, 4, 2))),
        ];
        assert_eq!(pick_current_invoice(&invoices, date(2025, 2, 20)), Some(2));
    }

    #[test]
    fn test_pick_current_invoice_falls_back_to_newest() {
        let invoices = vec![
            invoice(1, date(2025, 2, 10), None, None),
            invoice(3, date(2025, 4, 10), None, None),
            invoice(2, date(2025, 3, 10), None, None),
        ];
        assert_eq!(pick_current_invoice(&invoices, date(2026, 1, 1)), Some(3));
        assert_eq!(pick_current_invoice(&[], date(2026, 1, 1)), None);
    }

    #[test]
    fn test_apply_changes_writes_only_changes_and_continues_after_failure() {
        let config = Config::from_toml(SAMPLE_RULES).unwrap();
        let txns = vec![
            make_txn(1, "UBER TRIP", 1, 1, 0),
            make_txn(2, "PADARIA", 1, 1, 0),
            make_txn(3, "CARREFOUR 22", 1, 1, 0),
        ];
        let (results, _) = process_batch(&txns, &config, &Default::default());
        let mut calls = Vec::new();
        let outcomes = apply_changes(&results, |id, _| {
            calls.push(id);
            if id == 1 {
                Err(AppError::Api {
                    status: 500,
                    message: "boom".to_string(),
                })
            } else {
                Ok(())
            }
        });
        assert_eq!(calls, vec![1, 3]);
        assert_eq!(
            outcomes,
            vec![
                WriteOutcome::Failed {
                    error: "API returned 500: boom".to_string()
                },
                WriteOutcome::NotWritten,
                WriteOutcome::Written,
            ]
        );
    }

    #[test]
    fn test_describe_changes() {
        let config = Config::from_toml(SAMPLE_RULES).unwrap();
        let changes = TransactionChanges {
            category_id: Some(1001),
            description: Some("Carrefour".to_string()),
            tags: Some(vec!["essential".to_string(), "food".to_string()]),
            notes: None,
        };
        assert_eq!(
            describe_changes(&changes, &config.categories),
            "\u{2192} groceries; rename: Carrefour; tags: essential, food"
        );
        assert_eq!(describe_changes(&TransactionChanges::default(), &config.categories), "");
    }

    #[test]
    fn test_unknown_card_mapping() {
        let err = unknown_card(
            AppError::Api {
                status: 404,
                message: "Not found".to_string(),
            },
            77,
        );
        assert!(matches!(err, AppError::UnknownCard(77)));
        let err = unknown_card(AppError::MissingToken, 77);
        assert!(matches!(err, AppError::MissingToken));
    }
}
