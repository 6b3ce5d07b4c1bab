use serde::{Deserialize, Serialize};
use statera_core::{Amount, CanonicalTransaction, Direction};
use tracing::{debug, trace};

use crate::config::PipelineConfig;
use crate::locator::{header_classes, LocatedTable};
use crate::mapping::{AmountColumns, ResolvedMapping};
use crate::types::{RejectReason, RejectedRow, TokenRow};
use crate::values::{parse_amount, parse_date, ParsedAmount};
use crate::vocabulary::Vocabulary;

/// Rows of one table after normalization, each in exactly one bucket.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedBatch {
    pub accepted: Vec<CanonicalTransaction>,
    pub rejected: Vec<RejectedRow>,
    pub skipped_rows: Vec<usize>,
}

/// Turn every data row of `table` into a transaction or a rejection. Never aborts.
pub fn normalize_rows(
    table: &LocatedTable,
    mapping: &ResolvedMapping,
    vocab: &Vocabulary,
    config: &PipelineConfig,
) -> NormalizedBatch {
    let mut batch = NormalizedBatch::default();

    for row in &table.rows {
        if row.is_blank() || is_repeated_header(row, table, vocab) {
            batch.skipped_rows.push(row.index);
            continue;
        }
        match normalize_row(row, table.header.len(), mapping, config) {
            Ok(tx) => batch.accepted.push(tx),
            Err((reason, value)) => {
                trace!(row = row.index, %reason, "rejected row");
                batch.rejected.push(RejectedRow { source_row_index: row.index, reason, value });
            }
        }
    }

    debug!(
        accepted = batch.accepted.len(),
        rejected = batch.rejected.len(),
        skipped = batch.skipped_rows.len(),
        "normalized rows"
    );
    batch
}

/// A header row repeated on a later page: same text, or the same header
/// signature from a row that itself reads as a header.
fn is_repeated_header(row: &TokenRow, table: &LocatedTable, vocab: &Vocabulary) -> bool {
    let same_text = row.cells.len() == table.header.len()
        && row
            .cells
            .iter()
            .zip(&table.header)
            .all(|(a, b)| a.trim().eq_ignore_ascii_case(b.trim()));
    if same_text {
        return true;
    }
    let classes = header_classes(&row.cells, vocab);
    classes.len() >= 2 && classes == table.header_classes
}

type RowError = (RejectReason, Option<String>);

fn normalize_row(
    row: &TokenRow,
    header_len: usize,
    mapping: &ResolvedMapping,
    config: &PipelineConfig,
) -> Result<CanonicalTransaction, RowError> {
    if row.cells.len() != header_len {
        return Err((RejectReason::ColumnCountMismatch, None));
    }
    let cell = |i: usize| row.cells.get(i).map(|c| c.trim()).unwrap_or_default();

    let raw_date = cell(mapping.date);
    let date = parse_date(raw_date, &config.date_formats)
        .ok_or_else(|| (RejectReason::UnparseableDate, Some(raw_date.to_string())))?;

    let (amount, side) = match mapping.amount {
        AmountColumns::Signed(i) => {
            let raw = cell(i);
            let parsed = parse_amount(raw)
                .ok_or_else(|| (RejectReason::UnparseableAmount, Some(raw.to_string())))?;
            (parsed.value, parsed.marker.unwrap_or_else(|| sign_direction(&parsed)))
        }
        AmountColumns::Split { debit, credit } => {
            let debit = split_cell(debit.map(cell))?;
            let credit = split_cell(credit.map(cell))?;
            match (debit, credit) {
                (Some(d), None) => (d.value, Direction::Expense),
                (None, Some(c)) => (c.value, Direction::Income),
                _ => return Err((RejectReason::AmbiguousDirection, None)),
            }
        }
    };

    let direction = match &mapping.direction {
        Some(column) if cell(column.index).is_empty() => side,
        Some(column) => {
            let raw = cell(column.index);
            *column
                .transform
                .get(&raw.to_lowercase())
                .ok_or_else(|| (RejectReason::UnrecognizedDirection, Some(raw.to_string())))?
        }
        None => side,
    };

    let description = cell(mapping.description);
    if description.is_empty() {
        return Err((RejectReason::MissingDescription, None));
    }
    let description_truncated = description.chars().count() > config.max_description_len;
    let description = if description_truncated {
        let cut: String = description.chars().take(config.max_description_len).collect();
        cut.trim_end().to_string()
    } else {
        description.to_string()
    };

    Ok(CanonicalTransaction {
        date,
        description,
        description_truncated,
        amount: Amount::magnitude_of(amount),
        direction,
        source_row_index: row.index,
    })
}

fn sign_direction(parsed: &ParsedAmount) -> Direction {
    if parsed.value.is_sign_negative() && !parsed.is_zero() {
        Direction::Expense
    } else {
        Direction::Income
    }
}

/// One side of a debit/credit pair. Blank, `-` and zero all mean "no value".
fn split_cell(raw: Option<&str>) -> Result<Option<ParsedAmount>, RowError> {
    let Some(raw) = raw.filter(|r| !r.is_empty() && *r != "-") else {
        return Ok(None);
    };
    let parsed =
        parse_amount(raw).ok_or_else(|| (RejectReason::UnparseableAmount, Some(raw.to_string())))?;
    Ok((!parsed.is_zero()).then_some(parsed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::locate_table;
    use crate::types::FormatHint;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn table(lines: &[&[&str]]) -> LocatedTable {
        let rows: Vec<TokenRow> = lines
            .iter()
            .enumerate()
            .map(|(i, cells)| TokenRow::new(i, cells.iter().map(|c| c.to_string()).collect()))
            .collect();
        locate_table(&rows, FormatHint::Delimited, &Vocabulary::default(), &PipelineConfig::default())
            .unwrap()
    }

    fn run(table: &LocatedTable, mapping: ResolvedMapping) -> NormalizedBatch {
        normalize_rows(table, &mapping, &Vocabulary::default(), &PipelineConfig::default())
    }

    fn signed() -> ResolvedMapping {
        ResolvedMapping {
            date: 0,
            description: 1,
            amount: AmountColumns::Signed(2),
            direction: None,
        }
    }

    fn split() -> ResolvedMapping {
        ResolvedMapping {
            date: 0,
            description: 1,
            amount: AmountColumns::Split { debit: Some(2), credit: Some(3) },
            direction: None,
        }
    }

    // ── signed amounts ────────────────────────────────────────────────────────

    #[test]
    fn sign_sets_direction() {
        let t = table(&[
            &["Date", "Description", "Amount"],
            &["2024-04-01", "SWIGGY", "-250.00"],
            &["2024-04-02", "SALARY", "50,000.00"],
        ]);
        let batch = run(&t, signed());
        assert_eq!(batch.rejected, vec![]);
        assert_eq!(batch.accepted[0].direction, Direction::Expense);
        assert_eq!(batch.accepted[0].amount.to_string(), "250.00");
        assert_eq!(batch.accepted[0].source_row_index, 1);
        assert_eq!(batch.accepted[1].direction, Direction::Income);
        assert_eq!(batch.accepted[1].amount.to_string(), "50000.00");
        assert_eq!(batch.accepted[1].date, NaiveDate::from_ymd_opt(2024, 4, 2).unwrap());
    }

    #[test]
    fn cr_dr_marker_sets_direction() {
        let t = table(&[
            &["Date", "Description", "Amount"],
            &["2024-04-01", "REFUND", "120.00 Cr"],
            &["2024-04-02", "EMI", "9,000.00 Dr"],
        ]);
        let batch = run(&t, signed());
        assert_eq!(batch.accepted[0].direction, Direction::Income);
        assert_eq!(batch.accepted[1].direction, Direction::Expense);
    }

    #[test]
    fn direction_column_overrides_sign() {
        let t = table(&[
            &["Date", "Description", "Amount", "Type"],
            &["2024-04-01", "RENT", "15000", "DR"],
            &["2024-04-02", "SAVINGS", "5000", "Transfer"],
            &["2024-04-03", "???", "10", "sideways"],
        ]);
        let mapping = ResolvedMapping {
            direction: Some(crate::mapping::DirectionColumn {
                index: 3,
                transform: crate::vocabulary::default_direction_transform(),
            }),
            ..signed()
        };
        let batch = run(&t, mapping);
        assert_eq!(batch.accepted[0].direction, Direction::Expense);
        assert_eq!(batch.accepted[1].direction, Direction::Transfer);
        assert_eq!(
            batch.rejected,
            vec![RejectedRow {
                source_row_index: 3,
                reason: RejectReason::UnrecognizedDirection,
                value: Some("sideways".into()),
            }]
        );
    }

    #[test]
    fn blank_direction_cell_falls_back_to_sign() {
        let t = table(&[
            &["Date", "Description", "Amount", "Dr/Cr"],
            &["01/04/2024", "FEE", "-10.00", ""],
            &["02/04/2024", "REFUND", "10.00 Dr", " "],
            &["03/04/2024", "INTEREST", "4.10", "CR"],
        ]);
        let mapping = ResolvedMapping {
            direction: Some(crate::mapping::DirectionColumn {
                index: 3,
                transform: crate::vocabulary::default_direction_transform(),
            }),
            ..signed()
        };
        let batch = run(&t, mapping);
        assert!(batch.rejected.is_empty(), "{:?}", batch.rejected);
        let directions: Vec<Direction> = batch.accepted.iter().map(|tx| tx.direction).collect();
        assert_eq!(directions, vec![Direction::Expense, Direction::Expense, Direction::Income]);
    }

    // ── debit / credit ────────────────────────────────────────────────────────

    #[test]
    fn debit_credit_columns() {
        let t = table(&[
            &["Date", "Description", "Debit", "Credit"],
            &["2024-04-01", "ATM", "2,000.00", ""],
            &["2024-04-02", "NEFT SALARY", "", "50000.00"],
            &["2024-04-03", "ODD", "10.00", "10.00"],
            &["2024-04-04", "EMPTY", "-", "0.00"],
        ]);
        let batch = run(&t, split());
        assert_eq!(batch.accepted.len(), 2);
        assert_eq!(batch.accepted[0].direction, Direction::Expense);
        assert_eq!(batch.accepted[1].direction, Direction::Income);
        assert_eq!(batch.accepted[1].amount.to_string(), "50000.00");
        let reasons: Vec<RejectReason> = batch.rejected.iter().map(|r| r.reason).collect();
        assert_eq!(
            reasons,
            vec![RejectReason::AmbiguousDirection, RejectReason::AmbiguousDirection]
        );
    }

    // ── row-local failures ────────────────────────────────────────────────────

    #[test]
    fn rejections_carry_reason_and_value() {
        let t = table(&[
            &["Date", "Description", "Amount"],
            &["yesterday", "COFFEE", "3.00"],
            &["2024-04-01", "COFFEE", "three"],
            &["2024-04-01", "", "3.00"],
            &["2024-04-01", "COFFEE"],
        ]);
        let batch = run(&t, signed());
        assert!(batch.accepted.is_empty());
        assert_eq!(
            batch.rejected,
            vec![
                RejectedRow {
                    source_row_index: 1,
                    reason: RejectReason::UnparseableDate,
                    value: Some("yesterday".into()),
                },
                RejectedRow {
                    source_row_index: 2,
                    reason: RejectReason::UnparseableAmount,
                    value: Some("three".into()),
                },
                RejectedRow {
                    source_row_index: 3,
                    reason: RejectReason::MissingDescription,
                    value: None,
                },
                RejectedRow {
                    source_row_index: 4,
                    reason: RejectReason::ColumnCountMismatch,
                    value: None,
                },
            ]
        );
    }

    #[test]
    fn repeated_headers_and_blank_rows_are_skipped() {
        let t = table(&[
            &["Date", "Description", "Amount"],
            &["2024-04-01", "A", "1.00"],
            &["", "", ""],
            &["DATE", "DESCRIPTION", "AMOUNT"],
            &["Txn Date", "Narration", "Amt"],
            &["2024-04-02", "B", "2.00"],
        ]);
        let batch = run(&t, signed());
        assert_eq!(batch.accepted.len(), 2);
        assert_eq!(batch.skipped_rows, vec![2, 3, 4]);
        assert!(batch.rejected.is_empty());
    }

    #[test]
    fn long_descriptions_are_truncated() {
        let long = "X".repeat(300);
        let t = table(&[&["Date", "Description", "Amount"], &["2024-04-01", long.as_str(), "1.00"]]);
        let batch = run(&t, signed());
        let tx = &batch.accepted[0];
        assert!(tx.description_truncated);
        assert_eq!(tx.description.chars().count(), 255);
    }
}
