//! Statement ingestion: locate the transaction table inside a bank export,
//! infer its column mapping, and normalize rows into canonical transactions.

pub mod config;
pub mod duplicates;
pub mod history;
pub mod inferencer;
pub mod layout;
pub mod locator;
pub mod mapping;
pub mod normalizer;
pub mod pipeline;
pub mod tokenizer;
pub mod types;
pub(crate) mod util;
pub(crate) mod values;
pub mod vocabulary;

pub use config::{ConfigError, PipelineConfig, VocabularyExtras};
pub use duplicates::{DuplicateDetector, ExistingRecordLookup, StaticLookup};
pub use history::{header_signature, InMemoryMappingHistory, MappingHistory};
pub use inferencer::{infer_columns, ColumnInference};
pub use locator::{locate_table, LocateError, LocatedTable};
pub use mapping::{
    AmountRole, CanonicalField, ColumnAssignment, ColumnMapping, MappingError, ResolvedMapping,
};
pub use normalizer::{normalize_rows, NormalizedBatch};
pub use pipeline::{
    ImportError, ImportOutcome, ImportPipeline, ImportRequest, ImportSession, ImportStage,
    Inspection, PendingImport,
};
pub use tokenizer::{tokenize, TokenizeError};
pub use types::{
    DuplicateCandidate, ExistingRecordRef, FormatHint, ImportResult, MatchedField, RawDocument,
    RejectReason, RejectedRow, TableLocation, TokenRow,
};
pub use vocabulary::{FieldClass, HeaderClass, Vocabulary};
