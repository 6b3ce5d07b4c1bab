use std::collections::HashMap;

use csv::{ReaderBuilder, Trim};

use super::TokenizeError;
use crate::types::TokenRow;

/// Candidate delimiters, in tie-break order.
const CANDIDATES: [u8; 4] = [b',', b';', b'\t', b'|'];
const SNIFF_LINES: usize = 50;

pub(crate) fn tokenize(text: &str, delimiter: u8) -> Result<Vec<TokenRow>, TokenizeError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .delimiter(delimiter)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| match e.kind() {
            csv::ErrorKind::Utf8 { .. } => TokenizeError::UnreadableEncoding,
            _ => TokenizeError::UnsupportedContainer(format!("malformed delimited text: {e}")),
        })?;

        let cells: Vec<String> = record.iter().map(str::to_string).collect();
        if cells.iter().all(|c| c.is_empty()) {
            continue;
        }
        rows.push(TokenRow::new(rows.len(), cells));
    }
    Ok(rows)
}

/// Pick the delimiter that splits the most leading lines into the same
/// number (>1) of fields. Falls back to a comma.
pub fn sniff_delimiter(text: &str) -> u8 {
    let lines: Vec<&str> = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(SNIFF_LINES)
        .collect();

    let mut best = (b',', 0usize);
    for candidate in CANDIDATES {
        let mut counts: HashMap<usize, usize> = HashMap::new();
        for line in &lines {
            *counts.entry(field_count(line, candidate)).or_default() += 1;
        }
        let consistent = counts
            .into_iter()
            .filter(|(fields, _)| *fields > 1)
            .map(|(_, lines)| lines)
            .max()
            .unwrap_or(0);
        if consistent > best.1 {
            best = (candidate, consistent);
        }
    }
    best.0
}

/// Fields on one line, ignoring delimiters inside double quotes.
fn field_count(line: &str, delimiter: u8) -> usize {
    let mut in_quotes = false;
    let mut fields = 1;
    for byte in line.bytes() {
        match byte {
            b'"' => in_quotes = !in_quotes,
            b if b == delimiter && !in_quotes => fields += 1,
            _ => {}
        }
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── sniff_delimiter ───────────────────────────────────────────────────────

    #[test]
    fn sniffs_semicolon() {
        let text = "Datum;Buchungstext;Betrag\n01.04.2024;Miete;-850,00\n02.04.2024;Gehalt;3200,00\n";
        assert_eq!(sniff_delimiter(text), b';');
    }

    #[test]
    fn sniffs_tab_past_preamble() {
        let text = "Statement for A/C 0012\nPeriod: April\n\nDate\tNarration\tAmount\n01/04/2024\tUPI\t-10\n";
        assert_eq!(sniff_delimiter(text), b'\t');
    }

    #[test]
    fn sniff_ignores_quoted_commas() {
        let text = "Date|Description|Amount\n2024-04-01|\"Rent, April\"|1,200.00\n2024-04-02|Fee|5.00\n";
        assert_eq!(sniff_delimiter(text), b'|');
    }

    #[test]
    fn sniff_defaults_to_comma() {
        assert_eq!(sniff_delimiter("just one column\nand another\n"), b',');
    }

    // ── tokenize ──────────────────────────────────────────────────────────────

    #[test]
    fn ragged_rows_and_blank_lines() {
        let text = "Bank of Somewhere\n\nDate,Description,Amount\n 2024-04-01 , Coffee ,-3.50\n,,\n";
        let rows = tokenize(text, b',').unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].cells, vec!["Bank of Somewhere"]);
        assert_eq!(rows[1].index, 1);
        assert_eq!(rows[1].cells, vec!["Date", "Description", "Amount"]);
        assert_eq!(rows[2].cells, vec!["2024-04-01", "Coffee", "-3.50"]);
    }

    #[test]
    fn quoted_fields_keep_delimiters() {
        let rows = tokenize("\"Smith, J\",\"12,000.00\"\n", b',').unwrap();
        assert_eq!(rows[0].cells, vec!["Smith, J", "12,000.00"]);
    }

    #[test]
    fn crlf_line_endings() {
        let rows = tokenize("a,b\r\nc,d\r\n", b',').unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].cells, vec!["c", "d"]);
    }
}
