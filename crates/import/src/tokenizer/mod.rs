//! Raw bytes to [`TokenRow`]s, one reader per [`FormatHint`].

mod decode;
mod delimited;
mod page_text;
mod tabular;

use thiserror::Error;
use tracing::debug;

use crate::types::{FormatHint, RawDocument, TokenRow};

pub use delimited::sniff_delimiter;
pub use tabular::excel_serial_to_date;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenizeError {
    #[error("Document is not valid UTF-8 or BOM-marked UTF-16 text")]
    UnreadableEncoding,
    #[error("Document contains no rows")]
    EmptyDocument,
    #[error("Unsupported container: {0}")]
    UnsupportedContainer(String),
    #[error("Delimiter must be a single ASCII character, got {0:?}")]
    InvalidDelimiter(char),
}

/// Containers that need a different reader (or extraction upstream).
fn sniff_container(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(b"PK\x03\x04") {
        Some("zip archive (xlsx/ods workbook?)")
    } else if bytes.starts_with(&[0xD0, 0xCF, 0x11, 0xE0]) {
        Some("OLE compound file (legacy xls?)")
    } else if bytes.starts_with(b"%PDF-") {
        Some("PDF; extract its text first")
    } else {
        None
    }
}

/// Tokenize a whole document. Failure is all-or-nothing.
pub fn tokenize(
    doc: &RawDocument,
    delimiter_hint: Option<char>,
) -> Result<Vec<TokenRow>, TokenizeError> {
    if doc.bytes.is_empty() {
        return Err(TokenizeError::EmptyDocument);
    }

    let rows = match doc.format_hint {
        FormatHint::Tabular => tabular::tokenize(&doc.bytes)?,
        FormatHint::Delimited | FormatHint::PageText => {
            if let Some(kind) = sniff_container(&doc.bytes) {
                return Err(TokenizeError::UnsupportedContainer(kind.to_string()));
            }
            let text = decode::decode_text(&doc.bytes)?;
            if doc.format_hint == FormatHint::Delimited {
                let delimiter = match delimiter_hint {
                    Some(c) if c.is_ascii() => c as u8,
                    Some(c) => return Err(TokenizeError::InvalidDelimiter(c)),
                    None => sniff_delimiter(&text),
                };
                delimited::tokenize(&text, delimiter)?
            } else {
                page_text::tokenize(&text)
            }
        }
    };

    if rows.is_empty() {
        return Err(TokenizeError::EmptyDocument);
    }
    debug!(format = %doc.format_hint, rows = rows.len(), "tokenized document");
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(bytes: &[u8], hint: FormatHint) -> RawDocument {
        RawDocument::new(bytes, hint)
    }

    #[test]
    fn empty_bytes_are_empty_document() {
        for hint in [FormatHint::Delimited, FormatHint::Tabular, FormatHint::PageText] {
            assert_eq!(tokenize(&doc(b"", hint), None), Err(TokenizeError::EmptyDocument));
        }
    }

    #[test]
    fn whitespace_only_is_empty_document() {
        assert_eq!(
            tokenize(&doc(b"\n\n   \n", FormatHint::PageText), None),
            Err(TokenizeError::EmptyDocument)
        );
        assert_eq!(
            tokenize(&doc(b"\r\n\r\n", FormatHint::Delimited), None),
            Err(TokenizeError::EmptyDocument)
        );
    }

    #[test]
    fn workbook_bytes_as_text_are_unsupported() {
        let err = tokenize(&doc(b"PK\x03\x04rest-of-zip", FormatHint::Delimited), None).unwrap_err();
        assert!(matches!(err, TokenizeError::UnsupportedContainer(_)));
    }

    #[test]
    fn pdf_bytes_are_unsupported() {
        let err = tokenize(&doc(b"%PDF-1.7\n...", FormatHint::PageText), None).unwrap_err();
        assert!(matches!(err, TokenizeError::UnsupportedContainer(_)));
    }

    #[test]
    fn text_as_workbook_is_unsupported() {
        let err = tokenize(&doc(b"Date,Amount\n2024-01-01,5\n", FormatHint::Tabular), None).unwrap_err();
        assert!(matches!(err, TokenizeError::UnsupportedContainer(_)));
    }

    #[test]
    fn non_ascii_delimiter_is_refused() {
        assert_eq!(
            tokenize(&doc(b"a,b", FormatHint::Delimited), Some('§')),
            Err(TokenizeError::InvalidDelimiter('§'))
        );
    }

    #[test]
    fn delimiter_hint_overrides_sniffing() {
        let rows = tokenize(&doc(b"a;b,c\nd;e,f\n", FormatHint::Delimited), Some(';')).unwrap();
        assert_eq!(rows[0].cells, vec!["a", "b,c"]);
    }
}
