use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use statera_core::{Amount, CanonicalTransaction, Direction};

use crate::mapping::ColumnMapping;

/// How the raw bytes of a statement should be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatHint {
    Delimited,
    Tabular,
    PageText,
}

impl std::fmt::Display for FormatHint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormatHint::Delimited => write!(f, "delimited"),
            FormatHint::Tabular => write!(f, "tabular"),
            FormatHint::PageText => write!(f, "page_text"),
        }
    }
}

impl std::str::FromStr for FormatHint {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "delimited" | "csv" | "tsv" => Ok(FormatHint::Delimited),
            "tabular" | "xlsx" | "xls" | "xlsb" | "ods" => Ok(FormatHint::Tabular),
            "page_text" | "page-text" | "text" | "txt" => Ok(FormatHint::PageText),
            other => Err(format!("Unknown format hint: '{other}'")),
        }
    }
}

/// The raw statement as handed over by the caller.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub bytes: Vec<u8>,
    pub format_hint: FormatHint,
}

impl RawDocument {
    pub fn new(bytes: impl Into<Vec<u8>>, format_hint: FormatHint) -> Self {
        Self { bytes: bytes.into(), format_hint }
    }
}

/// One physical row of a tokenized document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRow {
    /// Zero-based position of the row in the tokenized document.
    pub index: usize,
    pub cells: Vec<String>,
}

impl TokenRow {
    pub fn new(index: usize, cells: Vec<String>) -> Self {
        Self { index, cells }
    }

    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|c| c.trim().is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TableLocation {
    pub header_row_index: usize,
    pub data_start_index: usize,
    /// Fraction of header classes matched by the header row (0.0–1.0).
    pub confidence_score: f32,
}

/// Stable identifier for why a data row did not become a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    ColumnCountMismatch,
    UnparseableDate,
    UnparseableAmount,
    AmbiguousDirection,
    UnrecognizedDirection,
    MissingDescription,
}

impl RejectReason {
    pub fn as_str(self) -> &'static str {
        match self {
            RejectReason::ColumnCountMismatch => "column_count_mismatch",
            RejectReason::UnparseableDate => "unparseable_date",
            RejectReason::UnparseableAmount => "unparseable_amount",
            RejectReason::AmbiguousDirection => "ambiguous_direction",
            RejectReason::UnrecognizedDirection => "unrecognized_direction",
            RejectReason::MissingDescription => "missing_description",
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RejectReason {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "column_count_mismatch" => Ok(RejectReason::ColumnCountMismatch),
            "unparseable_date" => Ok(RejectReason::UnparseableDate),
            "unparseable_amount" => Ok(RejectReason::UnparseableAmount),
            "ambiguous_direction" => Ok(RejectReason::AmbiguousDirection),
            "unrecognized_direction" => Ok(RejectReason::UnrecognizedDirection),
            "missing_description" => Ok(RejectReason::MissingDescription),
            other => Err(format!("Unknown reject reason: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedRow {
    pub source_row_index: usize,
    pub reason: RejectReason,
    /// The offending cell text, when a single cell caused the rejection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// A record the storage layer already holds, as seen by duplicate detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingRecordRef {
    pub id: String,
    pub date: NaiveDate,
    pub amount: Amount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchedField {
    Date,
    Amount,
    Description,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateCandidate {
    pub new_record: CanonicalTransaction,
    pub existing_record_ref: ExistingRecordRef,
    pub similarity_score: f32,
    pub matched_fields: Vec<MatchedField>,
}

/// Everything one pipeline run produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportResult {
    /// Lowercase hex SHA-256 of the raw document bytes.
    pub document_id: String,
    pub accepted: Vec<CanonicalTransaction>,
    pub rejected: Vec<RejectedRow>,
    /// Repeated header rows and blank rows inside the table.
    pub skipped_rows: Vec<usize>,
    pub duplicates: Vec<DuplicateCandidate>,
    pub table_location: TableLocation,
    pub mapping_used: ColumnMapping,
    pub header_signature: String,
    /// Set when the header match was weak enough that a human should look.
    pub needs_review: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn format_hint_aliases() {
        assert_eq!(FormatHint::from_str("CSV").unwrap(), FormatHint::Delimited);
        assert_eq!(FormatHint::from_str("page-text").unwrap(), FormatHint::PageText);
        assert_eq!(FormatHint::from_str("xlsx").unwrap(), FormatHint::Tabular);
        assert!(FormatHint::from_str("ofx").is_err());
    }

    #[test]
    fn reject_reason_roundtrip() {
        for reason in [
            RejectReason::ColumnCountMismatch,
            RejectReason::UnparseableDate,
            RejectReason::UnparseableAmount,
            RejectReason::AmbiguousDirection,
            RejectReason::UnrecognizedDirection,
            RejectReason::MissingDescription,
        ] {
            assert_eq!(RejectReason::from_str(&reason.to_string()).unwrap(), reason);
            let json = serde_json::to_string(&reason).unwrap();
            assert_eq!(json, format!("\"{}\"", reason.as_str()));
        }
    }

    #[test]
    fn blank_row_detection() {
        assert!(TokenRow::new(0, vec![" ".into(), String::new()]).is_blank());
        assert!(!TokenRow::new(0, vec!["x".into()]).is_blank());
    }
}
