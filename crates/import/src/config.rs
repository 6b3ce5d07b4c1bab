use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::vocabulary::FieldClass;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Extra header terms per class, merged into the built-in vocabulary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VocabularyExtras {
    pub date: Vec<String>,
    pub description: Vec<String>,
    pub amount: Vec<String>,
    pub debit: Vec<String>,
    pub credit: Vec<String>,
    pub direction: Vec<String>,
    pub balance: Vec<String>,
}

impl VocabularyExtras {
    pub fn by_class(&self) -> [(FieldClass, &Vec<String>); 7] {
        [
            (FieldClass::Date, &self.date),
            (FieldClass::Description, &self.description),
            (FieldClass::Amount, &self.amount),
            (FieldClass::Debit, &self.debit),
            (FieldClass::Credit, &self.credit),
            (FieldClass::Direction, &self.direction),
            (FieldClass::Balance, &self.balance),
        ]
    }
}

/// Tunable heuristics for the ingestion pipeline.
///
/// Every field has a default, so a config file only needs the settings it changes:
///
/// ```toml
/// scan_rows = 80
/// duplicate_similarity_threshold = 0.7
///
/// [vocabulary]
/// description = ["verwendungszweck"]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// How many leading rows the table locator inspects.
    pub scan_rows: usize,
    /// Distinct header classes a delimited/tabular header row must hit.
    pub min_header_classes: usize,
    /// Same, for page-text documents.
    pub min_header_classes_page_text: usize,
    /// Header confidence below which the result is flagged for review.
    pub review_confidence: f32,
    pub duplicate_similarity_threshold: f32,
    pub max_description_len: usize,
    /// chrono patterns, tried in order; the first that parses wins.
    pub date_formats: Vec<String>,
    pub vocabulary: VocabularyExtras,
}

pub const DEFAULT_DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%d/%m/%Y",
    "%m/%d/%Y",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%Y/%m/%d",
    "%d-%b-%Y",
    "%d %b %Y",
    "%d-%b-%y",
    "%d/%m/%y",
    "%b %d, %Y",
    "%d %B %Y",
    "%B %d, %Y",
];

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            scan_rows: 50,
            min_header_classes: 2,
            min_header_classes_page_text: 3,
            review_confidence: 0.6,
            duplicate_similarity_threshold: 0.6,
            max_description_len: 255,
            date_formats: DEFAULT_DATE_FORMATS.iter().map(|f| f.to_string()).collect(),
            vocabulary: VocabularyExtras::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_toml(toml_content: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = toml::from_str(toml_content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field: &'static str, reason: &str| ConfigError::Invalid {
            field,
            reason: reason.to_string(),
        };

        if self.scan_rows == 0 {
            return Err(invalid("scan_rows", "must be at least 1"));
        }
        for (field, value) in [
            ("min_header_classes", self.min_header_classes),
            ("min_header_classes_page_text", self.min_header_classes_page_text),
        ] {
            if !(1..=crate::vocabulary::HeaderClass::COUNT).contains(&value) {
                return Err(invalid(field, "must be between 1 and 5"));
            }
        }
        for (field, value) in [
            ("review_confidence", self.review_confidence),
            ("duplicate_similarity_threshold", self.duplicate_similarity_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(field, "must be between 0.0 and 1.0"));
            }
        }
        if self.max_description_len == 0 {
            return Err(invalid("max_description_len", "must be at least 1"));
        }
        if self.date_formats.is_empty() {
            return Err(invalid("date_formats", "must list at least one pattern"));
        }
        Ok(())
    }
}
