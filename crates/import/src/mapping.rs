use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use statera_core::Direction;
use thiserror::Error;

use crate::util::fold_header;
use crate::vocabulary::default_direction_transform;

/// Where a source column's values end up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    Date,
    Description,
    Amount,
    Direction,
    Ignored,
}

impl CanonicalField {
    pub fn as_str(self) -> &'static str {
        match self {
            CanonicalField::Date => "date",
            CanonicalField::Description => "description",
            CanonicalField::Amount => "amount",
            CanonicalField::Direction => "direction",
            CanonicalField::Ignored => "ignored",
        }
    }
}

impl std::fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an `amount` column contributes: one signed column, or one side of a
/// debit/credit pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountRole {
    Signed,
    Debit,
    Credit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnAssignment {
    pub source_column_name: String,
    /// Header position; disambiguates repeated column names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_index: Option<usize>,
    pub canonical_field: CanonicalField,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount_role: Option<AmountRole>,
    /// Raw cell value (lowercased) to direction, for `direction` columns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_transform: Option<BTreeMap<String, Direction>>,
}

impl ColumnAssignment {
    pub fn new(index: usize, name: impl Into<String>, field: CanonicalField) -> Self {
        Self {
            source_column_name: name.into(),
            source_index: Some(index),
            canonical_field: field,
            amount_role: None,
            value_transform: None,
        }
    }

    pub fn with_role(mut self, role: AmountRole) -> Self {
        self.amount_role = Some(role);
        self
    }

    pub fn with_transform(mut self, transform: BTreeMap<String, Direction>) -> Self {
        self.value_transform = Some(transform);
        self
    }
}

/// Ordered list of column assignments; serializes as a plain JSON array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnMapping {
    pub columns: Vec<ColumnAssignment>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MappingError {
    #[error("Column '{0}' is not in the header")]
    UnknownColumn(String),
    #[error("No column is mapped to {0}")]
    MissingField(CanonicalField),
    #[error("More than one column is mapped to {0}")]
    DuplicateField(CanonicalField),
    #[error("Column '{0}' is mapped more than once")]
    ColumnMappedTwice(String),
}

/// Where the amount of a row comes from, by header position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountColumns {
    Signed(usize),
    Split { debit: Option<usize>, credit: Option<usize> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectionColumn {
    pub index: usize,
    pub transform: BTreeMap<String, Direction>,
}

/// A validated mapping pinned to header positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMapping {
    pub date: usize,
    pub description: usize,
    pub amount: AmountColumns,
    pub direction: Option<DirectionColumn>,
}

impl ColumnMapping {
    pub fn new(columns: Vec<ColumnAssignment>) -> Self {
        Self { columns }
    }

    /// Validate the mapping against a header row and pin every column to its position.
    pub fn resolve(&self, header: &[String]) -> Result<ResolvedMapping, MappingError> {
        let mut used: BTreeMap<usize, &str> = BTreeMap::new();
        let mut dates = Vec::new();
        let mut descriptions = Vec::new();
        let mut signed = Vec::new();
        let mut debits = Vec::new();
        let mut credits = Vec::new();
        let mut directions = Vec::new();

        for column in &self.columns {
            if column.canonical_field == CanonicalField::Ignored {
                continue;
            }
            let index = position_of(column, header)
                .ok_or_else(|| MappingError::UnknownColumn(column.source_column_name.clone()))?;
            if used.insert(index, &column.source_column_name).is_some() {
                return Err(MappingError::ColumnMappedTwice(column.source_column_name.clone()));
            }

            match (column.canonical_field, column.amount_role) {
                (CanonicalField::Date, _) => dates.push(index),
                (CanonicalField::Description, _) => descriptions.push(index),
                (CanonicalField::Amount, None | Some(AmountRole::Signed)) => signed.push(index),
                (CanonicalField::Amount, Some(AmountRole::Debit)) => debits.push(index),
                (CanonicalField::Amount, Some(AmountRole::Credit)) => credits.push(index),
                (CanonicalField::Direction, _) => {
                    let transform = match &column.value_transform {
                        Some(map) => map
                            .iter()
                            .map(|(raw, dir)| (raw.trim().to_lowercase(), *dir))
                            .collect(),
                        None => default_direction_transform(),
                    };
                    directions.push(DirectionColumn { index, transform });
                }
                (CanonicalField::Ignored, _) => {}
            }
        }

        let date = exactly_one(&dates, CanonicalField::Date)?;
        let description = exactly_one(&descriptions, CanonicalField::Description)?;
        let amount = match (signed.as_slice(), debits.as_slice(), credits.as_slice()) {
            ([index], [], []) => AmountColumns::Signed(*index),
            ([], [], []) => return Err(MappingError::MissingField(CanonicalField::Amount)),
            ([], debit, credit) if debit.len() <= 1 && credit.len() <= 1 => AmountColumns::Split {
                debit: debit.first().copied(),
                credit: credit.first().copied(),
            },
            _ => return Err(MappingError::DuplicateField(CanonicalField::Amount)),
        };
        if directions.len() > 1 {
            return Err(MappingError::DuplicateField(CanonicalField::Direction));
        }

        Ok(ResolvedMapping { date, description, amount, direction: directions.pop() })
    }
}

fn position_of(column: &ColumnAssignment, header: &[String]) -> Option<usize> {
    let wanted = fold_header(&column.source_column_name);
    let matches = |i: usize| header.get(i).is_some_and(|h| fold_header(h) == wanted);

    match column.source_index {
        Some(i) if matches(i) => Some(i),
        // An explicit position with a blank name is trusted as is.
        Some(i) if wanted.is_empty() && i < header.len() => Some(i),
        _ => (0..header.len()).find(|&i| matches(i)),
    }
}

fn exactly_one(indices: &[usize], field: CanonicalField) -> Result<usize, MappingError> {
    match indices {
        [index] => Ok(*index),
        [] => Err(MappingError::MissingField(field)),
        _ => Err(MappingError::DuplicateField(field)),
    }
}

impl ResolvedMapping {
    /// Highest header position the normalizer reads a cell from.
    pub fn max_index(&self) -> usize {
        let mut max = self.date.max(self.description);
        match self.amount {
            AmountColumns::Signed(i) => max = max.max(i),
            AmountColumns::Split { debit, credit } => {
                max = max.max(debit.unwrap_or(0)).max(credit.unwrap_or(0))
            }
        }
        if let Some(direction) = &self.direction {
            max = max.max(direction.index);
        }
        max
    }

    /// The full mapping this resolves to, one assignment per header cell.
    pub fn to_mapping(&self, header: &[String]) -> ColumnMapping {
        let columns = header
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let column = |field| ColumnAssignment::new(i, name.clone(), field);
                if i == self.date {
                    return column(CanonicalField::Date);
                }
                if i == self.description {
                    return column(CanonicalField::Description);
                }
                match self.amount {
                    AmountColumns::Signed(a) if a == i => {
                        return column(CanonicalField::Amount).with_role(AmountRole::Signed)
                    }
                    AmountColumns::Split { debit: Some(d), .. } if d == i => {
                        return column(CanonicalField::Amount).with_role(AmountRole::Debit)
                    }
                    AmountColumns::Split { credit: Some(c), .. } if c == i => {
                        return column(CanonicalField::Amount).with_role(AmountRole::Credit)
                    }
                    _ => {}
                }
                match &self.direction {
                    Some(direction) if direction.index == i => column(CanonicalField::Direction)
                        .with_transform(direction.transform.clone()),
                    _ => column(CanonicalField::Ignored),
                }
            })
            .collect();
        ColumnMapping { columns }
    }
}
