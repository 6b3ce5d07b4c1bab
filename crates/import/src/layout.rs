//! Column layout for page-text statements, where a row is one line of
//! extracted text and column boundaries only exist as runs of spaces.

/// Lines sampled after the header when inferring column spans.
const SAMPLE_LINES: usize = 10;
/// Lines longer than this (in words) are prose, never a soft-split header.
const SOFT_SPLIT_MAX_WORDS: usize = 8;

/// Half-open char-column range `[start, end)` of one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    fn overlap(&self, other: &Span) -> usize {
        self.end.min(other.end).saturating_sub(self.start.max(other.start))
    }

    fn distance(&self, other: &Span) -> usize {
        if other.end <= self.start {
            self.start - other.end
        } else {
            other.start.saturating_sub(self.end)
        }
    }
}

/// Split on tabs or runs of two or more spaces.
pub fn split_line_into_cells(line: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut whitespace_run = 0_usize;

    for ch in line.trim().chars() {
        if ch == '\t' || (ch.is_whitespace() && whitespace_run >= 1) {
            if !current.trim().is_empty() {
                cells.push(current.trim().to_string());
            }
            current.clear();
            whitespace_run += 1;
            continue;
        }
        if ch.is_whitespace() {
            whitespace_run += 1;
            current.push(' ');
            continue;
        }
        whitespace_run = 0;
        current.push(ch);
    }
    if !current.trim().is_empty() {
        cells.push(current.trim().to_string());
    }
    cells
}

/// Single-space split for short label-like lines.
///
/// Returns `None` for prose: long lines or lines ending in sentence punctuation.
pub fn soft_split(line: &str) -> Option<Vec<String>> {
    let trimmed = line.trim();
    if trimmed.ends_with(['.', '!', '?']) {
        return None;
    }
    let words: Vec<String> = trimmed.split_whitespace().map(str::to_string).collect();
    (words.len() <= SOFT_SPLIT_MAX_WORDS).then_some(words)
}

/// Cells to score a page-text line with as a header candidate.
///
/// Single words are only scored for a line with no column gap and no digits,
/// so a label and its value never read as column names.
pub fn scoring_cells(line: &str, min_cells: usize) -> Vec<String> {
    let cells = split_line_into_cells(line);
    if cells.len() >= min_cells || cells.len() > 1 || line.chars().any(|c| c.is_ascii_digit()) {
        return cells;
    }
    soft_split(line).filter(|w| w.len() > cells.len()).unwrap_or(cells)
}

/// Infer column spans from the header line and the lines right after it.
///
/// Only row-shaped lines vote: a line must split into at least as many
/// cells as the header minus one (and at least two), so page footers and
/// wrapped narration cannot bridge the gap between two columns. When no
/// following line qualifies, every non-blank line votes.
///
/// A char column is occupied if any voting line has a non-space there; spans
/// are maximal occupied runs, with single-space gaps bridged.
pub fn infer_spans(header: &str, following: &[&str]) -> Vec<Span> {
    let min_cells = split_line_into_cells(header).len().saturating_sub(1).max(2);
    let non_blank = || following.iter().copied().filter(|l| !l.trim().is_empty());
    let mut voters: Vec<&str> = non_blank()
        .filter(|l| split_line_into_cells(l).len() >= min_cells)
        .take(SAMPLE_LINES)
        .collect();
    if voters.is_empty() {
        voters = non_blank().take(SAMPLE_LINES).collect();
    }

    let sample: Vec<Vec<char>> = std::iter::once(header)
        .chain(voters)
        .map(|l| l.chars().collect())
        .collect();

    let width = sample.iter().map(Vec::len).max().unwrap_or(0);
    let occupied: Vec<bool> = (0..width)
        .map(|col| {
            sample
                .iter()
                .any(|line| line.get(col).is_some_and(|c| !c.is_whitespace()))
        })
        .collect();

    let mut spans: Vec<Span> = Vec::new();
    let mut col = 0;
    while col < width {
        if !occupied[col] {
            col += 1;
            continue;
        }
        let start = col;
        while col < width && occupied[col] {
            col += 1;
        }
        match spans.last_mut() {
            Some(prev) if start - prev.end <= 1 => prev.end = col,
            _ => spans.push(Span { start, end: col }),
        }
    }
    spans
}

/// Text of `line` that falls inside each span.
pub fn cut_by_spans(line: &str, spans: &[Span]) -> Vec<String> {
    let mut cells = vec![Vec::<String>::new(); spans.len()];
    for (word_span, word) in words_with_spans(line) {
        let best = spans
            .iter()
            .enumerate()
            .max_by(|(ia, a), (ib, b)| {
                a.overlap(&word_span)
                    .cmp(&b.overlap(&word_span))
                    .then_with(|| b.distance(&word_span).cmp(&a.distance(&word_span)))
                    .then_with(|| ib.cmp(ia))
            })
            .map(|(i, _)| i);
        if let Some(i) = best {
            cells[i].push(word);
        }
    }
    cells.into_iter().map(|words| words.join(" ")).collect()
}

fn words_with_spans(line: &str) -> Vec<(Span, String)> {
    let mut out = Vec::new();
    let mut current: Option<(usize, String)> = None;
    for (col, ch) in line.chars().enumerate() {
        if ch.is_whitespace() {
            if let Some((start, word)) = current.take() {
                out.push((Span { start, end: col }, word));
            }
        } else {
            current.get_or_insert_with(|| (col, String::new())).1.push(ch);
        }
    }
    if let Some((start, word)) = current {
        let end = start + word.chars().count();
        out.push((Span { start, end }, word));
    }
    out
}
