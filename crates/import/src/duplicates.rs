use serde::{Deserialize, Serialize};
use statera_core::{CanonicalTransaction, DateRange};
use tracing::debug;

use crate::types::{DuplicateCandidate, ExistingRecordRef, MatchedField};
use crate::util::token_overlap;

/// The storage layer's view of already-imported records.
pub trait ExistingRecordLookup {
    fn lookup_existing(&self, range: DateRange, account_ref: Option<&str>) -> Vec<ExistingRecordRef>;
}

impl<F> ExistingRecordLookup for F
where
    F: Fn(DateRange, Option<&str>) -> Vec<ExistingRecordRef>,
{
    fn lookup_existing(&self, range: DateRange, account_ref: Option<&str>) -> Vec<ExistingRecordRef> {
        self(range, account_ref)
    }
}

/// In-memory lookup over a fixed record list, optionally bound to one account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticLookup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_ref: Option<String>,
    pub records: Vec<ExistingRecordRef>,
}

impl StaticLookup {
    pub fn new(records: Vec<ExistingRecordRef>) -> Self {
        Self { account_ref: None, records }
    }

    pub fn for_account(mut self, account_ref: impl Into<String>) -> Self {
        self.account_ref = Some(account_ref.into());
        self
    }
}

impl ExistingRecordLookup for StaticLookup {
    fn lookup_existing(&self, range: DateRange, account_ref: Option<&str>) -> Vec<ExistingRecordRef> {
        if let (Some(mine), Some(wanted)) = (self.account_ref.as_deref(), account_ref) {
            if mine != wanted {
                return Vec::new();
            }
        }
        self.records
            .iter()
            .filter(|r| range.contains(r.date))
            .cloned()
            .collect()
    }
}

/// Flags new records that probably repeat something already stored.
#[derive(Debug, Clone, Copy)]
pub struct DuplicateDetector {
    /// Minimum description token overlap, in `[0, 1]`.
    pub threshold: f32,
}

impl Default for DuplicateDetector {
    fn default() -> Self {
        Self { threshold: 0.6 }
    }
}

impl DuplicateDetector {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    /// At most one candidate per new record, in input order.
    pub fn detect(
        &self,
        records: &[CanonicalTransaction],
        lookup: &dyn ExistingRecordLookup,
        account_ref: Option<&str>,
    ) -> Vec<DuplicateCandidate> {
        let Some(range) = DateRange::spanning(records.iter().map(|r| r.date)) else {
            return Vec::new();
        };
        let existing = lookup.lookup_existing(range, account_ref);
        debug!(%range, existing = existing.len(), "looked up existing records");

        records
            .iter()
            .filter_map(|record| self.best_match(record, &existing))
            .collect()
    }

    fn best_match(
        &self,
        record: &CanonicalTransaction,
        existing: &[ExistingRecordRef],
    ) -> Option<DuplicateCandidate> {
        let mut best: Option<(&ExistingRecordRef, f32)> = None;
        for candidate in existing {
            let Some(score) = self.score_pair(record, candidate) else {
                continue;
            };
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((candidate, score));
            }
        }

        best.map(|(existing, score)| DuplicateCandidate {
            new_record: record.clone(),
            existing_record_ref: existing.clone(),
            similarity_score: score,
            matched_fields: vec![MatchedField::Date, MatchedField::Amount, MatchedField::Description],
        })
    }

    /// Description overlap when the pair qualifies, else `None`.
    /// Date and amount must match exactly; they never qualify a pair alone.
    fn score_pair(&self, record: &CanonicalTransaction, existing: &ExistingRecordRef) -> Option<f32> {
        if record.date != existing.date || record.amount != existing.amount {
            return None;
        }
        if existing.direction.is_some_and(|d| d != record.direction) {
            return None;
        }
        let score = token_overlap(&record.description, &existing.description);
        (score >= self.threshold).then_some(score)
    }
}
