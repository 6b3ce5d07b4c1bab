use crate::types::TokenRow;

const TAB_STOP: usize = 8;

/// One row per non-blank line, a single cell holding the whole line.
/// Column positions matter for layout inference, so leading spaces are kept
/// and tabs are expanded.
pub(crate) fn tokenize(text: &str) -> Vec<TokenRow> {
    text.split(['\n', '\u{000C}'])
        .map(|line| expand_tabs(line.trim_end_matches('\r')))
        .filter(|line| !line.trim().is_empty())
        .enumerate()
        .map(|(index, line)| TokenRow::new(index, vec![line.trim_end().to_string()]))
        .collect()
}

fn expand_tabs(line: &str) -> String {
    if !line.contains('\t') {
        return line.to_string();
    }
    let mut out = String::with_capacity(line.len() + TAB_STOP);
    let mut column = 0;
    for ch in line.chars() {
        if ch == '\t' {
            let pad = TAB_STOP - column % TAB_STOP;
            out.extend(std::iter::repeat(' ').take(pad));
            column += pad;
        } else {
            out.push(ch);
            column += 1;
        }
    }
    out
}
