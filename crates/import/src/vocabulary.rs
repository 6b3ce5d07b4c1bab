//! Header-term vocabulary shared by the table locator and the column inferencer.
//!
//! Institution-specific column names live here as plain vocabulary entries so
//! the scoring stays format-agnostic.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use statera_core::Direction;

use crate::config::VocabularyExtras;
use crate::util::{fold_header, levenshtein_distance};

/// Coarse classes the table locator counts when scoring a candidate header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderClass {
    Date,
    Description,
    Amount,
    Balance,
    DebitCredit,
}

impl HeaderClass {
    pub const COUNT: usize = 5;
}

/// Fine-grained classes the column inferencer assigns to header cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldClass {
    Direction,
    Date,
    Debit,
    Credit,
    Amount,
    Balance,
    Description,
}

impl FieldClass {
    /// Tie-break order when a cell scores equally for several classes.
    pub const PRIORITY: [FieldClass; 7] = [
        FieldClass::Direction,
        FieldClass::Date,
        FieldClass::Debit,
        FieldClass::Credit,
        FieldClass::Amount,
        FieldClass::Balance,
        FieldClass::Description,
    ];

    pub fn header_class(self) -> HeaderClass {
        match self {
            FieldClass::Date => HeaderClass::Date,
            FieldClass::Description => HeaderClass::Description,
            FieldClass::Amount => HeaderClass::Amount,
            FieldClass::Balance => HeaderClass::Balance,
            FieldClass::Debit | FieldClass::Credit | FieldClass::Direction => {
                HeaderClass::DebitCredit
            }
        }
    }
}

const DATE_TERMS: &[&str] = &[
    "date",
    "txn date",
    "transaction date",
    "trans date",
    "tran date",
    "value date",
    "posting date",
    "post date",
    "posted date",
    "posted",
    "booking date",
    "settlement date",
    "effective date",
    "dt",
];

const DESCRIPTION_TERMS: &[&str] = &[
    "description",
    "narration",
    "particulars",
    "details",
    "transaction details",
    "transaction description",
    "remarks",
    "memo",
    "payee",
    "merchant",
    "narrative",
    "beneficiary",
];

const AMOUNT_TERMS: &[&str] = &[
    "amount",
    "amt",
    "value",
    "transaction amount",
    "txn amount",
    "net amount",
    "billing amount",
    "sum",
    "amount in rs",
];

const BALANCE_TERMS: &[&str] = &[
    "balance",
    "bal",
    "closing balance",
    "running balance",
    "running bal",
    "available balance",
    "ledger balance",
    "book balance",
    "balance amt",
];

const DEBIT_TERMS: &[&str] = &[
    "debit",
    "debits",
    "debit amount",
    "withdrawal",
    "withdrawals",
    "withdrawal amount",
    "dr",
    "paid out",
    "money out",
];

const CREDIT_TERMS: &[&str] = &[
    "credit",
    "credits",
    "credit amount",
    "deposit",
    "deposits",
    "deposit amount",
    "cr",
    "paid in",
    "money in",
];

const DIRECTION_TERMS: &[&str] = &[
    "type",
    "transaction type",
    "txn type",
    "tran type",
    "direction",
    "dr cr",
    "cr dr",
    "debit credit",
    "credit debit",
    "indicator",
];

/// Known column-name variants per institution, fed into the same tables.
const INSTITUTION_VARIANTS: &[(&str, FieldClass, &str)] = &[
    ("hdfc", FieldClass::Date, "value dt"),
    ("hdfc", FieldClass::Debit, "withdrawal amt"),
    ("hdfc", FieldClass::Credit, "deposit amt"),
    ("icici", FieldClass::Description, "transaction remarks"),
    ("icici", FieldClass::Debit, "withdrawal amount inr"),
    ("icici", FieldClass::Credit, "deposit amount inr"),
    ("sbi", FieldClass::Date, "txn dt"),
    ("axis", FieldClass::Date, "tran dt"),
    ("kotak", FieldClass::Direction, "dr cr indicator"),
    ("amex", FieldClass::Description, "appears on your statement as"),
];

const EXPENSE_VALUES: &[&str] = &["dr", "debit", "d", "withdrawal", "wdl", "expense", "out"];
const INCOME_VALUES: &[&str] = &["cr", "credit", "c", "deposit", "dep", "income", "in"];
const TRANSFER_VALUES: &[&str] = &["transfer", "trf", "tfr", "xfer"];

/// Match strength of a header cell against a term list.
pub const SCORE_EXACT: u8 = 3;
pub const SCORE_PHRASE: u8 = 2;
pub const SCORE_FUZZY: u8 = 1;

const FUZZY_MIN_LEN: usize = 6;

#[derive(Debug, Clone)]
pub struct Vocabulary {
    terms: BTreeMap<FieldClass, Vec<String>>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::with_extras(&VocabularyExtras::default())
    }
}

impl Vocabulary {
    pub fn with_extras(extras: &VocabularyExtras) -> Self {
        let mut terms: BTreeMap<FieldClass, Vec<String>> = BTreeMap::new();
        let builtin: [(FieldClass, &[&str]); 7] = [
            (FieldClass::Date, DATE_TERMS),
            (FieldClass::Description, DESCRIPTION_TERMS),
            (FieldClass::Amount, AMOUNT_TERMS),
            (FieldClass::Balance, BALANCE_TERMS),
            (FieldClass::Debit, DEBIT_TERMS),
            (FieldClass::Credit, CREDIT_TERMS),
            (FieldClass::Direction, DIRECTION_TERMS),
        ];
        for (class, list) in builtin {
            terms
                .entry(class)
                .or_default()
                .extend(list.iter().map(|t| t.to_string()));
        }
        for (_institution, class, term) in INSTITUTION_VARIANTS {
            terms.entry(*class).or_default().push(term.to_string());
        }
        for (class, list) in extras.by_class() {
            terms
                .entry(class)
                .or_default()
                .extend(list.iter().map(|t| fold_header(t)).filter(|t| !t.is_empty()));
        }
        for list in terms.values_mut() {
            list.sort();
            list.dedup();
        }
        Self { terms }
    }

    pub fn terms(&self, class: FieldClass) -> &[String] {
        self.terms.get(&class).map(Vec::as_slice).unwrap_or_default()
    }

    /// Best class for a header cell and its score, or `None` if nothing matches.
    pub fn classify(&self, cell: &str) -> Option<(FieldClass, u8)> {
        let folded = fold_header(cell);
        if folded.is_empty() {
            return None;
        }

        let mut best: Option<(FieldClass, u8)> = None;
        for class in FieldClass::PRIORITY {
            let score = self
                .terms(class)
                .iter()
                .map(|term| term_score(&folded, term))
                .max()
                .unwrap_or(0);
            if score > 0 && best.map_or(true, |(_, s)| score > s) {
                best = Some((class, score));
            }
        }
        best
    }

    /// Class a cell counts for when scoring a candidate header row.
    ///
    /// Cells that look like data (four or more digits, or long prose) never count.
    pub fn header_class_of(&self, cell: &str) -> Option<HeaderClass> {
        let trimmed = cell.trim();
        if trimmed.chars().filter(char::is_ascii_digit).count() >= 4 || trimmed.chars().count() > 40 {
            return None;
        }
        self.classify(trimmed).map(|(class, _)| class.header_class())
    }
}

fn term_score(folded: &str, term: &str) -> u8 {
    if folded == term {
        return SCORE_EXACT;
    }
    if contains_phrase(folded, term) {
        return SCORE_PHRASE;
    }
    if term.len() >= FUZZY_MIN_LEN {
        if levenshtein_distance(folded, term) <= 1 {
            return SCORE_FUZZY;
        }
        if !term.contains(' ')
            && folded
                .split(' ')
                .any(|w| w.len() >= FUZZY_MIN_LEN && levenshtein_distance(w, term) <= 1)
        {
            return SCORE_FUZZY;
        }
    }
    0
}

/// Whether `term`'s words appear contiguously in `folded`'s words.
fn contains_phrase(folded: &str, term: &str) -> bool {
    let hay: Vec<&str> = folded.split(' ').collect();
    let needle: Vec<&str> = term.split(' ').collect();
    needle.len() <= hay.len() && hay.windows(needle.len()).any(|w| w == needle.as_slice())
}

/// Raw direction-cell values (lowercased) mapped to canonical directions.
pub fn default_direction_transform() -> BTreeMap<String, Direction> {
    let mut map = BTreeMap::new();
    for (values, direction) in [
        (EXPENSE_VALUES, Direction::Expense),
        (INCOME_VALUES, Direction::Income),
        (TRANSFER_VALUES, Direction::Transfer),
    ] {
        for v in values {
            map.insert(v.to_string(), direction);
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class_of(cell: &str) -> Option<FieldClass> {
        Vocabulary::default().classify(cell).map(|(c, _)| c)
    }

    #[test]
    fn every_header_class_has_eight_terms() {
        let vocab = Vocabulary::default();
        let mut per_class: BTreeMap<HeaderClass, usize> = BTreeMap::new();
        for class in FieldClass::PRIORITY {
            *per_class.entry(class.header_class()).or_default() += vocab.terms(class).len();
        }
        assert_eq!(per_class.len(), HeaderClass::COUNT);
        for (class, n) in per_class {
            assert!(n >= 8, "{class:?} has only {n} terms");
        }
    }

    #[test]
    fn exact_beats_phrase() {
        // "value date" is an exact date term; "value" alone is an amount term.
        assert_eq!(class_of("Value Date"), Some(FieldClass::Date));
        assert_eq!(class_of("Value"), Some(FieldClass::Amount));
    }

    #[test]
    fn common_bank_headers() {
        assert_eq!(class_of("Narration"), Some(FieldClass::Description));
        assert_eq!(class_of("Withdrawal Amt."), Some(FieldClass::Debit));
        assert_eq!(class_of("Deposit Amt."), Some(FieldClass::Credit));
        assert_eq!(class_of("Closing Balance"), Some(FieldClass::Balance));
        assert_eq!(class_of("Txn Date"), Some(FieldClass::Date));
        assert_eq!(class_of("Amount (INR)"), Some(FieldClass::Amount));
        assert_eq!(class_of("Dr/Cr"), Some(FieldClass::Direction));
        assert_eq!(class_of("Debit"), Some(FieldClass::Debit));
        assert_eq!(class_of("Credit"), Some(FieldClass::Credit));
    }

    #[test]
    fn reference_columns_do_not_match() {
        assert_eq!(class_of("Chq./Ref.No."), None);
        assert_eq!(class_of("Address"), None);
        assert_eq!(class_of(""), None);
    }

    #[test]
    fn fuzzy_catches_typos() {
        let (class, score) = Vocabulary::default().classify("Decription").unwrap();
        assert_eq!(class, FieldClass::Description);
        assert_eq!(score, SCORE_FUZZY);
        assert_eq!(class_of("Txn Naration"), Some(FieldClass::Description));
    }

    #[test]
    fn short_terms_are_not_fuzzy() {
        // "dt" and "cr" are too short to tolerate edits.
        assert_eq!(class_of("at"), None);
        assert_eq!(class_of("or"), None);
    }

    #[test]
    fn header_class_skips_data_cells() {
        let vocab = Vocabulary::default();
        assert_eq!(vocab.header_class_of("01/04/2024"), None);
        assert_eq!(vocab.header_class_of("Statement date 01/04/2024"), None);
        assert_eq!(vocab.header_class_of("Statement Date"), Some(HeaderClass::Date));
        assert_eq!(vocab.header_class_of("Withdrawals"), Some(HeaderClass::DebitCredit));
    }

    #[test]
    fn extras_extend_vocabulary() {
        let extras = VocabularyExtras {
            description: vec!["Beschreibung".to_string()],
            ..VocabularyExtras::default()
        };
        let vocab = Vocabulary::with_extras(&extras);
        assert_eq!(
            vocab.classify("Beschreibung").map(|(c, _)| c),
            Some(FieldClass::Description)
        );
    }

    #[test]
    fn default_transform_covers_markers() {
        let t = default_direction_transform();
        assert_eq!(t.get("dr"), Some(&Direction::Expense));
        assert_eq!(t.get("cr"), Some(&Direction::Income));
        assert_eq!(t.get("trf"), Some(&Direction::Transfer));
    }
}
