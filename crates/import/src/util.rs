use std::collections::BTreeSet;

/// Levenshtein edit distance over chars, two-row O(min(m,n)) space.
pub fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let a: Vec<char> = s1.chars().collect();
    let b: Vec<char> = s2.chars().collect();
    let (m, n) = (a.len(), b.len());

    if m == 0 {
        return n;
    }
    if n == 0 {
        return m;
    }

    // Keep the shorter string in the inner loop to minimise allocation.
    let (a, b, m, n) = if m <= n { (a, b, m, n) } else { (b, a, n, m) };

    let mut prev: Vec<usize> = (0..=n).collect();
    let mut curr = vec![0usize; n + 1];

    for i in 1..=m {
        curr[0] = i;
        for j in 1..=n {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[n]
}

/// Lowercase alphanumeric words, everything else treated as a separator.
pub fn words(s: &str) -> Vec<String> {
    s.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// Header text folded to single-spaced lowercase words ("Withdrawal Amt." -> "withdrawal amt").
pub fn fold_header(s: &str) -> String {
    words(s).join(" ")
}

/// Share of distinct tokens the two texts have in common, relative to the
/// larger token set. Two empty texts are identical.
pub fn token_overlap(s1: &str, s2: &str) -> f32 {
    let a: BTreeSet<String> = words(s1).into_iter().collect();
    let b: BTreeSet<String> = words(s2).into_iter().collect();

    let larger = a.len().max(b.len());
    if larger == 0 {
        return 1.0;
    }

    a.intersection(&b).count() as f32 / larger as f32
}
