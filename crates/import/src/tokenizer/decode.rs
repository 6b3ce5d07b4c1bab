use encoding_rs::Encoding;

use super::TokenizeError;

/// Decode statement text: a BOM picks UTF-8 or UTF-16, otherwise strict UTF-8.
pub(crate) fn decode_text(bytes: &[u8]) -> Result<String, TokenizeError> {
    let text = match Encoding::for_bom(bytes) {
        Some((encoding, bom_len)) => {
            let (text, had_errors) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
            if had_errors {
                return Err(TokenizeError::UnreadableEncoding);
            }
            text.into_owned()
        }
        None => std::str::from_utf8(bytes)
            .map_err(|_| TokenizeError::UnreadableEncoding)?
            .to_string(),
    };

    if looks_binary(&text) {
        return Err(TokenizeError::UnreadableEncoding);
    }
    Ok(text)
}

/// Valid UTF-8 can still be binary garbage; statements are mostly printable.
fn looks_binary(text: &str) -> bool {
    if text.contains('\0') {
        return true;
    }
    let total = text.chars().count();
    if total == 0 {
        return false;
    }
    let control = text
        .chars()
        .filter(|ch| ch.is_control() && !matches!(ch, '\n' | '\r' | '\t' | '\u{000C}'))
        .count();
    control * 5 > total
}
