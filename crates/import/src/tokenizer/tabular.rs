use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::NaiveDate;

use super::TokenizeError;
use crate::types::TokenRow;

/// Read the first worksheet of an xlsx/xls/xlsb/ods workbook.
pub(crate) fn tokenize(bytes: &[u8]) -> Result<Vec<TokenRow>, TokenizeError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| TokenizeError::UnsupportedContainer(format!("unreadable workbook: {e}")))?;

    let range = match workbook.worksheet_range_at(0) {
        Some(Ok(range)) => range,
        Some(Err(e)) => {
            return Err(TokenizeError::UnsupportedContainer(format!(
                "unreadable worksheet: {e}"
            )))
        }
        None => return Err(TokenizeError::EmptyDocument),
    };

    Ok(collect_rows(range.rows()))
}

fn collect_rows<'a>(rows: impl Iterator<Item = &'a [Data]>) -> Vec<TokenRow> {
    let mut out = Vec::new();
    for row in rows {
        let cells: Vec<String> = row.iter().map(render_cell).collect();
        if cells.iter().all(|c| c.is_empty()) {
            continue;
        }
        out.push(TokenRow::new(out.len(), cells));
    }
    out
}

/// Render a cell the way it would appear in a CSV export of the sheet.
fn render_cell(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => format!("{f}"),
        Data::Int(i) => i.to_string(),
        Data::DateTime(dt) => match excel_serial_to_date(dt.as_f64()) {
            Some(date) => date.format("%Y-%m-%d").to_string(),
            None => dt.as_f64().to_string(),
        },
        Data::DateTimeIso(s) => s.split('T').next().unwrap_or(s).to_string(),
        other => other.to_string(),
    }
}

/// Convert a 1900-system Excel serial day number to a date.
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 {
        return None;
    }
    // Epoch is 1899-12-30 to absorb the 1900 leap-year bug.
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    base.checked_add_signed(chrono::Duration::days(serial.trunc() as i64))
}
