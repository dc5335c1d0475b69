use std::fmt;

use serde::Serialize;

use crate::config::{CategoryTable, Config, ConfigWarning, TagTable};
use crate::installments::{resolve_installment, InstallmentCache};
use crate::matcher::{PatternMatcher, RenameMatcher};
use crate::models::Transaction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Update,
    Rename,
    Skip,
    /// Reserved. Nothing produces it yet.
    Conflict,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Update => "update",
            Self::Rename => "rename",
            Self::Skip => "skip",
            Self::Conflict => "conflict",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    NoMatch,
    AlreadyCorrect,
    ManualEdit,
    Installment,
    Pattern,
}

impl Reason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoMatch => "no_match",
            Self::AlreadyCorrect => "already_correct",
            Self::ManualEdit => "manual_edit",
            Self::Installment => "installment",
            Self::Pattern => "pattern",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields to write back. `None` means leave the field alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransactionChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl TransactionChanges {
    pub fn is_empty(&self) -> bool {
        self.category_id.is_none()
            && self.description.is_none()
            && self.notes.is_none()
            && self.tags.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct ProcessResult<'a> {
    pub transaction: &'a Transaction,
    pub action: Action,
    pub changes: Option<TransactionChanges>,
    pub reason: Option<Reason>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkipDecision {
    pub skip: bool,
    pub reason: Option<Reason>,
}

impl SkipDecision {
    fn skip(reason: Reason) -> Self {
        Self {
            skip: true,
            reason: Some(reason),
        }
    }

    fn proceed() -> Self {
        Self {
            skip: false,
            reason: None,
        }
    }
}

/// Checks run in this order: no suggestion, already correct, manual edit.
pub fn should_skip(txn: &Transaction, suggested: Option<i64>, force: bool) -> SkipDecision {
    let Some(suggested) = suggested else {
        return SkipDecision::skip(Reason::NoMatch);
    };
    if txn.category() == Some(suggested) {
        return SkipDecision::skip(Reason::AlreadyCorrect);
    }
    if !force && txn.was_edited() {
        return SkipDecision::skip(Reason::ManualEdit);
    }
    SkipDecision::proceed()
}

pub fn tags_for_category(
    category_id: Option<i64>,
    categories: &CategoryTable,
    tags: &TagTable,
) -> Vec<String> {
    category_id
        .filter(|id| *id != 0)
        .and_then(|id| categories.name_for(id))
        .map(|name| tags.tags_for(name).to_vec())
        .unwrap_or_default()
}

/// Where earlier installments are looked up.
#[derive(Debug, Clone, Copy, Default)]
pub enum InstallmentContext<'c> {
    /// Only the batch being processed.
    #[default]
    SameBatch,
    /// Invoices of `card_id` already loaded into `cache` for this run.
    CrossInvoice {
        cache: &'c InstallmentCache,
        card_id: i64,
    },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessOptions<'c> {
    pub rename_only: bool,
    pub tags_only: bool,
    pub force: bool,
    /// Record the pre-rename description in the transaction notes.
    pub keep_original: bool,
    pub installments: InstallmentContext<'c>,
}

pub struct Categorizer<'cfg> {
    config: &'cfg Config,
    patterns: PatternMatcher,
    renames: RenameMatcher,
    warnings: Vec<ConfigWarning>,
}

impl<'cfg> Categorizer<'cfg> {
    pub fn new(config: &'cfg Config) -> Self {
        let (patterns, mut warnings) = PatternMatcher::new(&config.rules);
        let (renames, rename_warnings) = RenameMatcher::new(&config.renames);
        warnings.extend(rename_warnings);
        warnings.extend(config.validate());
        Self {
            config,
            patterns,
            renames,
            warnings,
        }
    }

    pub fn warnings(&self) -> &[ConfigWarning] {
        &self.warnings
    }

    pub fn tags_for_category(&self, category_id: Option<i64>) -> Vec<String> {
        tags_for_category(category_id, &self.config.categories, &self.config.tags)
    }

    fn inherited_category(
        &self,
        txn: &Transaction,
        batch: &[Transaction],
        context: &InstallmentContext<'_>,
    ) -> Option<i64> {
        let inherited = match context {
            InstallmentContext::SameBatch => resolve_installment(txn, batch),
            InstallmentContext::CrossInvoice { cache, card_id } => {
                cache.find_installment_category(txn, *card_id)
            }
        }?;
        self.config
            .categories
            .contains_id(inherited)
            .then_some(inherited)
    }

    /// Category suggested for `txn` and where the suggestion came from.
    pub fn suggest_category(
        &self,
        txn: &Transaction,
        batch: &[Transaction],
        context: &InstallmentContext<'_>,
    ) -> Option<(i64, Reason)> {
        if let Some(id) = self.inherited_category(txn, batch, context) {
            return Some((id, Reason::Installment));
        }
        self.patterns
            .match_category(&txn.description)
            .and_then(|name| self.config.categories.id_for(name))
            .map(|id| (id, Reason::Pattern))
    }

    pub fn process_batch<'a>(
        &self,
        transactions: &'a [Transaction],
        options: &ProcessOptions<'_>,
    ) -> Vec<ProcessResult<'a>> {
        transactions
            .iter()
            .map(|txn| self.process_one(txn, transactions, options))
            .collect()
    }

    fn process_one<'a>(
        &self,
        txn: &'a Transaction,
        batch: &[Transaction],
        options: &ProcessOptions<'_>,
    ) -> ProcessResult<'a> {
        let mut changes = TransactionChanges::default();
        let mut reason = None;

        if !options.rename_only && !options.tags_only {
            let suggestion = self.suggest_category(txn, batch, &options.installments);
            let decision = should_skip(txn, suggestion.map(|(id, _)| id), options.force);
            if decision.skip {
                return ProcessResult {
                    transaction: txn,
                    action: Action::Skip,
                    changes: None,
                    reason: decision.reason,
                };
            }
            if let Some((id, source)) = suggestion {
                changes.category_id = Some(id);
                reason = Some(source);
            }
        }

        if !options.tags_only {
            if let Some(name) = self.renames.match_rename(&txn.description) {
                changes.description = Some(name.to_string());
                if options.keep_original {
                    changes.notes = Some(note_original(txn.notes.as_deref(), &txn.description));
                }
            }
        }

        let tags = if options.tags_only {
            self.tags_for_category(txn.category())
        } else if changes.category_id.is_some() {
            self.tags_for_category(changes.category_id)
        } else {
            Vec::new()
        };
        if !tags.is_empty() {
            changes.tags = Some(tags);
        }

        let action = if changes.is_empty() {
            Action::Skip
        } else if changes.category_id.is_none() && changes.description.is_some() {
            Action::Rename
        } else {
            Action::Update
        };

        ProcessResult {
            transaction: txn,
            action,
            changes: (!changes.is_empty()).then_some(changes),
            reason,
        }
    }
}

fn note_original(existing: Option<&str>, original: &str) -> String {
    let line = format!("Original description: {original}");
    match existing.map(str::trim).filter(|s| !s.is_empty()) {
        Some(notes) => format!("{notes}\n{line}"),
        None => line,
    }
}

/// Run the categorizer over one batch with a freshly compiled rule set.
/// Warnings about rules that were dropped or point nowhere come back
/// alongside the results.
pub fn process_batch<'a>(
    transactions: &'a [Transaction],
    config: &Config,
    options: &ProcessOptions<'_>,
) -> (Vec<ProcessResult<'a>>, Vec<ConfigWarning>) {
    let categorizer = Categorizer::new(config);
    let results = categorizer.process_batch(transactions, options);
    (results, categorizer.warnings().to_vec())
}

/// Tally of results per action and per reason, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub actions: Vec<(Action, usize)>,
    pub reasons: Vec<(Reason, usize)>,
}

impl Summary {
    pub fn from_results(results: &[ProcessResult<'_>]) -> Self {
        let mut summary = Self {
            total: results.len(),
            ..Self::default()
        };
        for result in results {
            bump(&mut summary.actions, result.action);
            if let Some(reason) = result.reason {
                bump(&mut summary.reasons, reason);
            }
        }
        summary
    }

    pub fn count(&self, action: Action) -> usize {
        self.actions
            .iter()
            .find(|(a, _)| *a == action)
            .map_or(0, |(_, n)| *n)
    }

    pub fn pending_writes(&self) -> usize {
        self.count(Action::Update) + self.count(Action::Rename)
    }
}

fn bump<K: PartialEq>(counts: &mut Vec<(K, usize)>, key: K) {
    match counts.iter_mut().find(|(k, _)| *k == key) {
        Some((_, n)) => *n += 1,
        None => counts.push((key, 1)),
    }
}
