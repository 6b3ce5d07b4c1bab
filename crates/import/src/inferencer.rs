use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::mapping::{AmountRole, CanonicalField, ColumnAssignment, ColumnMapping};
use crate::vocabulary::{default_direction_transform, FieldClass, Vocabulary};

/// Outcome of guessing a mapping from header text alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ColumnInference {
    /// Date, description and amount all found.
    Mapped { mapping: ColumnMapping },
    /// Some required fields found; `unmapped` lists the rest.
    PartiallyMapped {
        mapping: ColumnMapping,
        unmapped: Vec<CanonicalField>,
    },
    Unmappable,
}

impl ColumnInference {
    pub fn mapping(&self) -> Option<&ColumnMapping> {
        match self {
            ColumnInference::Mapped { mapping } | ColumnInference::PartiallyMapped { mapping, .. } => {
                Some(mapping)
            }
            ColumnInference::Unmappable => None,
        }
    }

    pub fn is_mapped(&self) -> bool {
        matches!(self, ColumnInference::Mapped { .. })
    }
}

/// Propose a column mapping for a header row. Never fails; inconclusive
/// headers come back partially mapped or unmappable.
pub fn infer_columns(header: &[String], vocab: &Vocabulary) -> ColumnInference {
    let scored: Vec<Option<(FieldClass, u8)>> = header.iter().map(|c| vocab.classify(c)).collect();

    // Highest-scoring cell for a class, earliest on ties.
    let best = |class: FieldClass| -> Option<usize> {
        let mut winner: Option<(usize, u8)> = None;
        for (i, hit) in scored.iter().enumerate() {
            if let Some((c, score)) = hit {
                if *c == class && winner.map_or(true, |(_, s)| *score > s) {
                    winner = Some((i, *score));
                }
            }
        }
        winner.map(|(i, _)| i)
    };

    let date = best(FieldClass::Date);
    let description = best(FieldClass::Description);
    let direction = best(FieldClass::Direction);
    let amount: Vec<(usize, AmountRole)> = match best(FieldClass::Amount) {
        Some(i) => vec![(i, AmountRole::Signed)],
        None => [
            best(FieldClass::Debit).map(|i| (i, AmountRole::Debit)),
            best(FieldClass::Credit).map(|i| (i, AmountRole::Credit)),
        ]
        .into_iter()
        .flatten()
        .collect(),
    };

    let columns = header
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let column = |field| ColumnAssignment::new(i, name.clone(), field);
            if Some(i) == date {
                column(CanonicalField::Date)
            } else if Some(i) == description {
                column(CanonicalField::Description)
            } else if let Some((_, role)) = amount.iter().find(|(a, _)| *a == i) {
                column(CanonicalField::Amount).with_role(*role)
            } else if Some(i) == direction {
                column(CanonicalField::Direction).with_transform(default_direction_transform())
            } else {
                column(CanonicalField::Ignored)
            }
        })
        .collect();
    let mapping = ColumnMapping::new(columns);

    let mut unmapped = Vec::new();
    if date.is_none() {
        unmapped.push(CanonicalField::Date);
    }
    if description.is_none() {
        unmapped.push(CanonicalField::Description);
    }
    if amount.is_empty() {
        unmapped.push(CanonicalField::Amount);
    }

    debug!(columns = header.len(), unmapped = unmapped.len(), "inferred column mapping");
    match unmapped.len() {
        0 => ColumnInference::Mapped { mapping },
        3 => ColumnInference::Unmappable,
        _ => ColumnInference::PartiallyMapped { mapping, unmapped },
    }
}
