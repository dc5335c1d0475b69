use std::collections::HashMap;

use chrono::NaiveDate;

use crate::error::Result;
use crate::models::{Invoice, Transaction};

/// How many invoices, counting back from the current one, are scanned for
/// earlier installments of the same purchase.
pub const INVOICE_WINDOW: usize = 12;

/// Description with a trailing `N/M` installment marker removed.
///
/// `"Netflix 2/12"` and `"Netflix 1/12"` both become `"Netflix"`.
pub fn base_description(description: &str) -> &str {
    let trimmed = description.trim_end();
    strip_installment_suffix(trimmed).unwrap_or(trimmed).trim()
}

fn strip_installment_suffix(s: &str) -> Option<&str> {
    let is_digit = |c: char| c.is_ascii_digit();
    let without_total = s.trim_end_matches(is_digit);
    if without_total.len() == s.len() {
        return None;
    }
    let before_slash = without_total.strip_suffix('/')?;
    let head = before_slash.trim_end_matches(is_digit);
    if head.len() == before_slash.len() {
        return None;
    }
    Some(head)
}

fn same_purchase(target: &Transaction, other: &Transaction) -> bool {
    other.total_installments == target.total_installments
        && base_description(&other.description) == base_description(&target.description)
}

/// Category of the immediately preceding installment within the same batch.
pub fn resolve_installment(txn: &Transaction, batch: &[Transaction]) -> Option<i64> {
    if txn.installment <= 1 {
        return None;
    }
    batch
        .iter()
        .find(|other| {
            other.id != txn.id
                && other.installment == txn.installment - 1
                && same_purchase(txn, other)
        })
        .and_then(Transaction::category)
}

/// Most frequent value; on a tie the value seen first wins.
pub fn mode<I: IntoIterator<Item = i64>>(values: I) -> Option<i64> {
    let mut counts: Vec<(i64, usize)> = Vec::new();
    for value in values {
        match counts.iter_mut().find(|(v, _)| *v == value) {
            Some((_, n)) => *n += 1,
            None => counts.push((value, 1)),
        }
    }
    let mut best: Option<(i64, usize)> = None;
    for (value, n) in counts {
        if best.map_or(true, |(_, top)| n > top) {
            best = Some((value, n));
        }
    }
    best.map(|(value, _)| value)
}

/// Where card invoices come from. The API client implements this; tests
/// use an in-memory fake.
pub trait InvoiceSource {
    /// Invoices of a card in a range of months around `anchor`.
    fn card_invoices(&self, card_id: i64, anchor: NaiveDate) -> Result<Vec<Invoice>>;
    fn invoice_transactions(&self, card_id: i64, invoice_id: i64) -> Result<Vec<Transaction>>;
}

/// True when some transaction could inherit from an earlier invoice.
pub fn needs_history(transactions: &[Transaction]) -> bool {
    transactions.iter().any(|t| t.installment > 1)
}

/// Transactions from recent invoices of each card touched during one run.
///
/// Build one per batch run and drop it afterwards; nothing here outlives
/// the run.
#[derive(Debug, Default)]
pub struct InstallmentCache {
    cards: HashMap<i64, Vec<Transaction>>,
}

impl InstallmentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_hydrated(&self, card_id: i64) -> bool {
        self.cards.contains_key(&card_id)
    }

    pub fn window(&self, card_id: i64) -> &[Transaction] {
        self.cards.get(&card_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Load the card's window: `current` (already fetched, with its
    /// transactions) plus up to [`INVOICE_WINDOW`]` - 1` invoices dated
    /// before it, newest first.
    ///
    /// Nothing is fetched when the card is already loaded or when `current`
    /// has no installment past the first. Returns the number of invoices
    /// fetched from `source`.
    pub fn hydrate<S: InvoiceSource + ?Sized>(
        &mut self,
        source: &S,
        card_id: i64,
        current: &Invoice,
    ) -> Result<usize> {
        if self.is_hydrated(card_id) || !needs_history(&current.transactions) {
            return Ok(0);
        }

        let mut earlier: Vec<Invoice> = source
            .card_invoices(card_id, current.date)?
            .into_iter()
            .filter(|inv| inv.id != current.id && inv.date < current.date)
            .collect();
        earlier.sort_by(|a, b| b.date.cmp(&a.date));
        earlier.truncate(INVOICE_WINDOW - 1);

        let mut window = current.transactions.clone();
        for invoice in &earlier {
            let txns = source.invoice_transactions(card_id, invoice.id)?;
            tracing::debug!(card_id, invoice_id = invoice.id, count = txns.len(), "cached invoice");
            window.extend(txns);
        }
        self.cards.insert(card_id, window);
        Ok(earlier.len())
    }

    /// Most common category among earlier installments of the same purchase
    /// found in the card's cached invoices.
    pub fn find_installment_category(&self, txn: &Transaction, card_id: i64) -> Option<i64> {
        if txn.installment <= 1 {
            return None;
        }
        mode(
            self.window(card_id)
                .iter()
                .filter(|other| other.installment < txn.installment && same_purchase(txn, other))
                .filter_map(Transaction::category),
        )
    }
}
