use std::collections::BTreeSet;

use thiserror::Error;
use tracing::debug;

use crate::config::PipelineConfig;
use crate::layout;
use crate::types::{FormatHint, TableLocation, TokenRow};
use crate::vocabulary::{HeaderClass, Vocabulary};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocateError {
    #[error("No header row found in the first {scanned} rows (best row matched {best_score} column classes)")]
    NoTableFound { scanned: usize, best_score: usize },
}

/// The table inside a document: where it starts, its header and its data rows.
#[derive(Debug, Clone, PartialEq)]
pub struct LocatedTable {
    pub location: TableLocation,
    pub header: Vec<String>,
    pub header_classes: BTreeSet<HeaderClass>,
    /// Rows from `data_start_index` on. Page-text rows are already cut into cells.
    pub rows: Vec<TokenRow>,
}

/// Distinct header classes hit by distinct cells of a row.
pub fn header_classes(cells: &[String], vocab: &Vocabulary) -> BTreeSet<HeaderClass> {
    cells.iter().filter_map(|c| vocab.header_class_of(c)).collect()
}

/// Find the earliest row in the scan window that reads as a header.
pub fn locate_table(
    rows: &[TokenRow],
    format: FormatHint,
    vocab: &Vocabulary,
    config: &PipelineConfig,
) -> Result<LocatedTable, LocateError> {
    let threshold = match format {
        FormatHint::PageText => config.min_header_classes_page_text,
        FormatHint::Delimited | FormatHint::Tabular => config.min_header_classes,
    };
    let scanned = rows.len().min(config.scan_rows);

    let mut best_score = 0;
    for (pos, row) in rows.iter().take(scanned).enumerate() {
        let cells = match format {
            FormatHint::PageText => layout::scoring_cells(line_of(row), threshold),
            FormatHint::Delimited | FormatHint::Tabular => row.cells.clone(),
        };
        let classes = header_classes(&cells, vocab);
        let k = classes.len();
        best_score = best_score.max(k);
        if k < threshold {
            continue;
        }

        let location = TableLocation {
            header_row_index: row.index,
            data_start_index: row.index + 1,
            confidence_score: k as f32 / HeaderClass::COUNT as f32,
        };
        debug!(
            header_row_index = row.index,
            classes = k,
            confidence = location.confidence_score,
            "located table header"
        );

        let following = &rows[pos + 1..];
        let (header, rows) = match format {
            FormatHint::PageText => cut_page_text(line_of(row), following),
            FormatHint::Delimited | FormatHint::Tabular => (row.cells.clone(), following.to_vec()),
        };
        let header_classes = header_classes(&header, vocab);
        return Ok(LocatedTable { location, header, header_classes, rows });
    }

    debug!(scanned, best_score, "no table header found");
    Err(LocateError::NoTableFound { scanned, best_score })
}

fn line_of(row: &TokenRow) -> &str {
    row.cells.first().map(String::as_str).unwrap_or_default()
}

fn cut_page_text(header_line: &str, following: &[TokenRow]) -> (Vec<String>, Vec<TokenRow>) {
    let lines: Vec<&str> = following.iter().map(line_of).collect();
    let spans = layout::infer_spans(header_line, &lines);

    if spans.len() >= 2 {
        debug!(columns = spans.len(), "inferred page-text column spans");
        let rows = following
            .iter()
            .map(|r| TokenRow::new(r.index, layout::cut_by_spans(line_of(r), &spans)))
            .collect();
        (layout::cut_by_spans(header_line, &spans), rows)
    } else {
        let rows = following
            .iter()
            .map(|r| TokenRow::new(r.index, layout::split_line_into_cells(line_of(r))))
            .collect();
        (layout::split_line_into_cells(header_line), rows)
    }
}
