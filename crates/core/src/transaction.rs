use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::amount::Amount;

/// Whether a transaction moves money into or out of the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Income,
    Expense,
    Transfer,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Income => "income",
            Direction::Expense => "expense",
            Direction::Transfer => "transfer",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Direction {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "income" => Ok(Direction::Income),
            "expense" => Ok(Direction::Expense),
            "transfer" => Ok(Direction::Transfer),
            other => Err(format!("Unknown direction: '{other}'")),
        }
    }
}

/// One statement row after mapping and normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalTransaction {
    pub date: NaiveDate,
    pub description: String,
    /// Set when `description` was cut to the configured maximum length.
    #[serde(default)]
    pub description_truncated: bool,
    pub amount: Amount,
    pub direction: Direction,
    pub source_row_index: usize,
}
