use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, PipelineConfig};
use crate::duplicates::{DuplicateDetector, ExistingRecordLookup};
use crate::history::{header_signature, sha256_hex, InMemoryMappingHistory, MappingHistory};
use crate::inferencer::{infer_columns, ColumnInference};
use crate::locator::{locate_table, LocateError, LocatedTable};
use crate::mapping::{ColumnMapping, MappingError, ResolvedMapping};
use crate::normalizer::normalize_rows;
use crate::tokenizer::{tokenize, TokenizeError};
use crate::types::{FormatHint, ImportResult, RawDocument, TableLocation};
use crate::vocabulary::Vocabulary;

/// Where an import is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStage {
    Tokenizing,
    LocatingTable,
    InferringColumns,
    AwaitingMappingConfirmation,
    Normalizing,
    DetectingDuplicates,
    Complete,
    Failed,
}

impl ImportStage {
    pub fn as_str(self) -> &'static str {
        match self {
            ImportStage::Tokenizing => "tokenizing",
            ImportStage::LocatingTable => "locating_table",
            ImportStage::InferringColumns => "inferring_columns",
            ImportStage::AwaitingMappingConfirmation => "awaiting_mapping_confirmation",
            ImportStage::Normalizing => "normalizing",
            ImportStage::DetectingDuplicates => "detecting_duplicates",
            ImportStage::Complete => "complete",
            ImportStage::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ImportStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Could not read document: {0}")]
    Tokenize(#[from] TokenizeError),
    #[error("Could not locate transaction table: {0}")]
    Locate(#[from] LocateError),
    #[error("Invalid mapping: {0}")]
    Mapping(#[from] MappingError),
    #[error("No pending import with id {0}")]
    UnknownPendingImport(String),
}

impl ImportError {
    /// The stage the import was in when it failed.
    pub fn stage(&self) -> ImportStage {
        match self {
            ImportError::Tokenize(_) => ImportStage::Tokenizing,
            ImportError::Locate(_) => ImportStage::LocatingTable,
            ImportError::Mapping(_) | ImportError::UnknownPendingImport(_) => {
                ImportStage::AwaitingMappingConfirmation
            }
        }
    }
}

/// One statement to import, plus whatever the caller already knows about it.
#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub bytes: Vec<u8>,
    pub format_hint: FormatHint,
    pub delimiter_hint: Option<char>,
    /// Skips inference (and mapping history) when present.
    pub manual_mapping: Option<ColumnMapping>,
    pub account_ref: Option<String>,
}

impl ImportRequest {
    pub fn new(bytes: impl Into<Vec<u8>>, format_hint: FormatHint) -> Self {
        Self {
            bytes: bytes.into(),
            format_hint,
            delimiter_hint: None,
            manual_mapping: None,
            account_ref: None,
        }
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter_hint = Some(delimiter);
        self
    }

    pub fn with_mapping(mut self, mapping: ColumnMapping) -> Self {
        self.manual_mapping = Some(mapping);
        self
    }

    pub fn for_account(mut self, account_ref: impl Into<String>) -> Self {
        self.account_ref = Some(account_ref.into());
        self
    }
}

/// An import parked until someone confirms a column mapping.
#[derive(Debug, Clone, Serialize)]
pub struct PendingImport {
    /// The `pending_id` to resume with. Hashes the document together with the
    /// format, delimiter and account it was imported with.
    pub id: String,
    pub document_id: String,
    pub header: Vec<String>,
    pub header_signature: String,
    pub table_location: TableLocation,
    pub proposal: ColumnInference,
    pub needs_review: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_ref: Option<String>,
    #[serde(skip)]
    table: LocatedTable,
}

#[derive(Debug, Clone)]
pub enum ImportOutcome {
    Complete(ImportResult),
    AwaitingMapping(PendingImport),
}

/// What the pipeline sees in a document, without normalizing anything.
#[derive(Debug, Clone, Serialize)]
pub struct Inspection {
    pub document_id: String,
    pub table_location: TableLocation,
    pub header: Vec<String>,
    pub header_signature: String,
    pub data_rows: usize,
    pub proposal: ColumnInference,
    pub needs_review: bool,
}

/// Tokenized and located, not yet mapped.
struct Located {
    document_id: String,
    table: LocatedTable,
    signature: String,
}

/// Runs documents through tokenize → locate → infer → normalize → dedupe.
///
/// Holds only configuration, so one instance can serve many documents
/// (and threads) at once.
#[derive(Debug, Clone)]
pub struct ImportPipeline {
    config: PipelineConfig,
    vocabulary: Vocabulary,
    detector: DuplicateDetector,
}

impl Default for ImportPipeline {
    fn default() -> Self {
        Self::build(PipelineConfig::default())
    }
}

impl ImportPipeline {
    /// Validates `config` the same way [`PipelineConfig::from_toml`] does.
    pub fn new(config: PipelineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: PipelineConfig) -> Self {
        let vocabulary = Vocabulary::with_extras(&config.vocabulary);
        let detector = DuplicateDetector::new(config.duplicate_similarity_threshold);
        Self { config, vocabulary, detector }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn run(
        &self,
        request: ImportRequest,
        lookup: &dyn ExistingRecordLookup,
    ) -> Result<ImportOutcome, ImportError> {
        self.run_with_history(request, lookup, None)
    }

    /// Like [`run`](Self::run), consulting `history` for a mapping confirmed
    /// earlier for the same header before falling back to inference.
    pub fn run_with_history(
        &self,
        request: ImportRequest,
        lookup: &dyn ExistingRecordLookup,
        history: Option<&dyn MappingHistory>,
    ) -> Result<ImportOutcome, ImportError> {
        let located = self
            .locate(&request.bytes, request.format_hint, request.delimiter_hint)
            .inspect_err(|e| warn!(stage = %e.stage(), error = %e, "import failed"))?;
        let account_ref = request.account_ref.as_deref();

        if let Some(mapping) = &request.manual_mapping {
            let resolved = mapping.resolve(&located.table.header).inspect_err(|e| {
                warn!(stage = %ImportStage::Failed, error = %e, "manual mapping rejected")
            })?;
            debug!("using manual mapping");
            return Ok(ImportOutcome::Complete(self.finish(located, &resolved, lookup, account_ref)));
        }

        if let Some(remembered) = history.and_then(|h| h.recall(&located.signature)) {
            match remembered.resolve(&located.table.header) {
                Ok(resolved) => {
                    debug!(signature = %located.signature, "using remembered mapping");
                    return Ok(ImportOutcome::Complete(
                        self.finish(located, &resolved, lookup, account_ref),
                    ));
                }
                Err(e) => debug!(error = %e, "remembered mapping no longer fits, inferring"),
            }
        }

        debug!(stage = %ImportStage::InferringColumns);
        let proposal = infer_columns(&located.table.header, &self.vocabulary);
        let resolved = match &proposal {
            ColumnInference::Mapped { mapping } => mapping.resolve(&located.table.header).ok(),
            _ => None,
        };
        match resolved {
            Some(resolved) => Ok(ImportOutcome::Complete(
                self.finish(located, &resolved, lookup, account_ref),
            )),
            None => {
                let id = pending_id(&located.document_id, &request);
                debug!(stage = %ImportStage::AwaitingMappingConfirmation, %id);
                Ok(ImportOutcome::AwaitingMapping(PendingImport {
                    id,
                    document_id: located.document_id,
                    header: located.table.header.clone(),
                    header_signature: located.signature,
                    table_location: located.table.location,
                    proposal,
                    needs_review: self.needs_review(&located.table),
                    account_ref: request.account_ref,
                    table: located.table,
                }))
            }
        }
    }

    /// Finish a parked import with a caller-confirmed mapping.
    pub fn resume(
        &self,
        pending: &PendingImport,
        mapping: &ColumnMapping,
        lookup: &dyn ExistingRecordLookup,
    ) -> Result<ImportResult, ImportError> {
        let resolved = mapping.resolve(&pending.header)?;
        debug!(id = %pending.id, "resuming with confirmed mapping");
        let located = Located {
            document_id: pending.document_id.clone(),
            table: pending.table.clone(),
            signature: pending.header_signature.clone(),
        };
        Ok(self.finish(located, &resolved, lookup, pending.account_ref.as_deref()))
    }

    /// Locate the table and propose a mapping, stopping before normalization.
    pub fn inspect(
        &self,
        bytes: &[u8],
        format_hint: FormatHint,
        delimiter_hint: Option<char>,
    ) -> Result<Inspection, ImportError> {
        let located = self.locate(bytes, format_hint, delimiter_hint)?;
        let proposal = infer_columns(&located.table.header, &self.vocabulary);
        Ok(Inspection {
            needs_review: self.needs_review(&located.table),
            document_id: located.document_id,
            table_location: located.table.location,
            data_rows: located.table.rows.len(),
            header: located.table.header,
            header_signature: located.signature,
            proposal,
        })
    }

    fn locate(
        &self,
        bytes: &[u8],
        format_hint: FormatHint,
        delimiter_hint: Option<char>,
    ) -> Result<Located, ImportError> {
        let document_id = sha256_hex(bytes);
        debug!(stage = %ImportStage::Tokenizing, id = %document_id, bytes = bytes.len());
        let doc = RawDocument::new(bytes, format_hint);
        let rows = tokenize(&doc, delimiter_hint)?;

        debug!(stage = %ImportStage::LocatingTable, rows = rows.len());
        let table = locate_table(&rows, format_hint, &self.vocabulary, &self.config)?;
        let signature = header_signature(&table.header);
        Ok(Located { document_id, table, signature })
    }

    fn finish(
        &self,
        located: Located,
        mapping: &ResolvedMapping,
        lookup: &dyn ExistingRecordLookup,
        account_ref: Option<&str>,
    ) -> ImportResult {
        debug!(stage = %ImportStage::Normalizing);
        let batch = normalize_rows(&located.table, mapping, &self.vocabulary, &self.config);

        debug!(stage = %ImportStage::DetectingDuplicates);
        let duplicates = self.detector.detect(&batch.accepted, lookup, account_ref);

        let needs_review = self.needs_review(&located.table);
        info!(
            id = %located.document_id,
            accepted = batch.accepted.len(),
            rejected = batch.rejected.len(),
            duplicates = duplicates.len(),
            needs_review,
            "import complete"
        );
        ImportResult {
            mapping_used: mapping.to_mapping(&located.table.header),
            document_id: located.document_id,
            accepted: batch.accepted,
            rejected: batch.rejected,
            skipped_rows: batch.skipped_rows,
            duplicates,
            table_location: located.table.location,
            header_signature: located.signature,
            needs_review,
        }
    }

    fn needs_review(&self, table: &LocatedTable) -> bool {
        table.location.confidence_score < self.config.review_confidence
    }
}

fn pending_id(document_id: &str, request: &ImportRequest) -> String {
    let key = format!(
        "{document_id}\x1f{}\x1f{}\x1f{}",
        request.format_hint,
        request.delimiter_hint.map(String::from).unwrap_or_default(),
        request.account_ref.as_deref().unwrap_or_default(),
    );
    sha256_hex(key.as_bytes())
}

/// Caller-owned registry of parked imports, with the mapping history that
/// completed imports feed.
#[derive(Debug)]
pub struct ImportSession<H = InMemoryMappingHistory> {
    pipeline: ImportPipeline,
    history: H,
    pending: HashMap<String, PendingImport>,
}

impl<H: MappingHistory> ImportSession<H> {
    pub fn new(pipeline: ImportPipeline, history: H) -> Self {
        Self { pipeline, history, pending: HashMap::new() }
    }

    pub fn history(&self) -> &H {
        &self.history
    }

    /// Run a document; inconclusive mappings are parked here until resumed.
    pub fn import(
        &mut self,
        request: ImportRequest,
        lookup: &dyn ExistingRecordLookup,
    ) -> Result<ImportOutcome, ImportError> {
        let outcome = self.pipeline.run_with_history(request, lookup, Some(&self.history))?;
        match &outcome {
            ImportOutcome::Complete(result) => self.remember(result),
            ImportOutcome::AwaitingMapping(pending) => {
                self.pending.insert(pending.id.clone(), pending.clone());
            }
        }
        Ok(outcome)
    }

    pub fn pending(&self, pending_id: &str) -> Option<&PendingImport> {
        self.pending.get(pending_id)
    }

    pub fn pending_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.pending.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Re-enter a parked import at normalization with a confirmed mapping.
    ///
    /// An invalid mapping leaves the import parked so the caller can retry.
    pub fn resume_with_mapping(
        &mut self,
        pending_id: &str,
        mapping: &ColumnMapping,
        lookup: &dyn ExistingRecordLookup,
    ) -> Result<ImportResult, ImportError> {
        let pending = self
            .pending
            .get(pending_id)
            .ok_or_else(|| ImportError::UnknownPendingImport(pending_id.to_string()))?;
        let result = self.pipeline.resume(pending, mapping, lookup)?;
        self.pending.remove(pending_id);
        self.remember(&result);
        Ok(result)
    }

    fn remember(&mut self, result: &ImportResult) {
        self.history.remember(&result.header_signature, result.mapping_used.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duplicates::StaticLookup;
    use crate::mapping::{AmountRole, CanonicalField, ColumnAssignment};
    use crate::types::RejectReason;
    use statera_core::Direction;

    const SIGNED: &str = "\
Date,Description,Amount
2024-04-01,UPI SWIGGY,-250.00
2024-04-02,NEFT SALARY,50000.00
";

    const UNLABELLED: &str = "\
Date,Memo,Reference,Figure
2024-04-01,SWIGGY,R1,-250.00
2024-04-02,SALARY,R2,50000.00
";

    fn none() -> StaticLookup {
        StaticLookup::default()
    }

    fn complete(outcome: ImportOutcome) -> ImportResult {
        match outcome {
            ImportOutcome::Complete(result) => result,
            ImportOutcome::AwaitingMapping(p) => panic!("unexpectedly awaiting mapping: {p:?}"),
        }
    }

    fn manual() -> ColumnMapping {
        ColumnMapping::new(vec![
            ColumnAssignment {
                source_column_name: "Memo".into(),
                source_index: None,
                canonical_field: CanonicalField::Description,
                amount_role: None,
                value_transform: None,
            },
            ColumnAssignment::new(0, "Date", CanonicalField::Date),
            ColumnAssignment::new(3, "Figure", CanonicalField::Amount).with_role(AmountRole::Signed),
        ])
    }

    // ── run ───────────────────────────────────────────────────────────────────

    #[test]
    fn infers_and_completes() {
        let pipeline = ImportPipeline::default();
        let result = complete(
            pipeline
                .run(ImportRequest::new(SIGNED, FormatHint::Delimited), &none())
                .unwrap(),
        );
        assert_eq!(result.accepted.len(), 2);
        assert_eq!(result.accepted[0].direction, Direction::Expense);
        assert_eq!(result.table_location.header_row_index, 0);
        assert_eq!(result.document_id.len(), 64);
        // date, description, amount out of five classes
        assert!((result.table_location.confidence_score - 0.6).abs() < 1e-6);
        assert!(!result.needs_review);
    }

    #[test]
    fn inconclusive_header_awaits_mapping() {
        let pipeline = ImportPipeline::default();
        let outcome = pipeline
            .run(ImportRequest::new(UNLABELLED, FormatHint::Delimited), &none())
            .unwrap();
        let ImportOutcome::AwaitingMapping(pending) = outcome else {
            panic!("expected to await a mapping");
        };
        assert!(matches!(
            pending.proposal,
            ColumnInference::PartiallyMapped { ref unmapped, .. } if unmapped == &vec![CanonicalField::Amount]
        ));
        // Only date and description classes matched.
        assert!(pending.needs_review);

        let result = pipeline.resume(&pending, &manual(), &none()).unwrap();
        assert_eq!(result.accepted.len(), 2);
        assert_eq!(result.accepted[1].description, "SALARY");
        assert_eq!(result.accepted[1].direction, Direction::Income);
    }

    #[test]
    fn manual_mapping_skips_inference() {
        let pipeline = ImportPipeline::default();
        let request = ImportRequest::new(UNLABELLED, FormatHint::Delimited).with_mapping(manual());
        let result = complete(pipeline.run(request, &none()).unwrap());
        assert_eq!(result.accepted.len(), 2);
        assert_eq!(result.mapping_used.columns.len(), 4);
        assert_eq!(result.mapping_used.columns[2].canonical_field, CanonicalField::Ignored);
    }

    #[test]
    fn invalid_manual_mapping_is_fatal() {
        let pipeline = ImportPipeline::default();
        let bad = ColumnMapping::new(vec![ColumnAssignment::new(0, "Date", CanonicalField::Date)]);
        let request = ImportRequest::new(SIGNED, FormatHint::Delimited).with_mapping(bad);
        let err = pipeline.run(request, &none()).unwrap_err();
        assert!(matches!(err, ImportError::Mapping(MappingError::MissingField(_))));
    }

    #[test]
    fn fatal_errors_carry_their_stage() {
        let pipeline = ImportPipeline::default();
        let err = pipeline
            .run(ImportRequest::new(Vec::<u8>::new(), FormatHint::Delimited), &none())
            .unwrap_err();
        assert_eq!(err.stage(), ImportStage::Tokenizing);

        let err = pipeline
            .run(ImportRequest::new("just,some\nwords,here\n", FormatHint::Delimited), &none())
            .unwrap_err();
        assert_eq!(err.stage(), ImportStage::LocatingTable);
    }

    #[test]
    fn rejected_rows_do_not_abort() {
        let csv = "Date,Description,Amount\n2024-04-01,A,1.00\nsoon,B,2.00\n2024-04-03,C,x\n";
        let result = complete(
            ImportPipeline::default()
                .run(ImportRequest::new(csv, FormatHint::Delimited), &none())
                .unwrap(),
        );
        let reasons: Vec<RejectReason> = result.rejected.iter().map(|r| r.reason).collect();
        assert_eq!(result.accepted.len(), 1);
        assert_eq!(reasons, vec![RejectReason::UnparseableDate, RejectReason::UnparseableAmount]);
    }

    #[test]
    fn inspect_stops_before_normalizing() {
        let inspection = ImportPipeline::default()
            .inspect(SIGNED.as_bytes(), FormatHint::Delimited, None)
            .unwrap();
        assert_eq!(inspection.header, vec!["Date", "Description", "Amount"]);
        assert_eq!(inspection.data_rows, 2);
        assert!(inspection.proposal.is_mapped());
    }

    #[test]
    fn invalid_config_is_refused() {
        let config = PipelineConfig { scan_rows: 0, ..PipelineConfig::default() };
        assert!(matches!(
            ImportPipeline::new(config),
            Err(ConfigError::Invalid { field: "scan_rows", .. })
        ));

        let config = PipelineConfig { review_confidence: 1.5, ..PipelineConfig::default() };
        assert!(ImportPipeline::new(config).is_err());

        let config = PipelineConfig { scan_rows: 80, ..PipelineConfig::default() };
        assert_eq!(ImportPipeline::new(config).unwrap().config().scan_rows, 80);
    }

    #[test]
    fn pipeline_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ImportPipeline>();
    }

    // ── session ───────────────────────────────────────────────────────────────

    #[test]
    fn session_parks_resumes_and_remembers() {
        let mut session = ImportSession::new(ImportPipeline::default(), InMemoryMappingHistory::new());
        let outcome = session
            .import(ImportRequest::new(UNLABELLED, FormatHint::Delimited), &none())
            .unwrap();
        let ImportOutcome::AwaitingMapping(pending) = outcome else {
            panic!("expected to await a mapping");
        };
        assert_eq!(session.pending_ids(), vec![pending.id.as_str()]);

        let result = session.resume_with_mapping(&pending.id, &manual(), &none()).unwrap();
        assert_eq!(result.accepted.len(), 2);
        assert!(session.pending(&pending.id).is_none());

        // Same header again: the confirmed mapping is reused without asking.
        let again = session
            .import(ImportRequest::new(UNLABELLED, FormatHint::Delimited), &none())
            .unwrap();
        assert_eq!(complete(again), result);
    }

    #[test]
    fn invalid_resume_keeps_import_parked() {
        let mut session = ImportSession::new(ImportPipeline::default(), InMemoryMappingHistory::new());
        let ImportOutcome::AwaitingMapping(pending) = session
            .import(ImportRequest::new(UNLABELLED, FormatHint::Delimited), &none())
            .unwrap()
        else {
            panic!("expected to await a mapping");
        };

        let bad = ColumnMapping::new(vec![ColumnAssignment::new(0, "Date", CanonicalField::Date)]);
        assert!(session.resume_with_mapping(&pending.id, &bad, &none()).is_err());
        assert!(session.pending(&pending.id).is_some());
    }

    #[test]
    fn same_document_parks_separately_per_request() {
        let mut session = ImportSession::new(ImportPipeline::default(), InMemoryMappingHistory::new());
        let mut park = |request: ImportRequest| match session.import(request, &none()).unwrap() {
            ImportOutcome::AwaitingMapping(pending) => pending,
            ImportOutcome::Complete(_) => panic!("expected to await a mapping"),
        };
        let savings = park(ImportRequest::new(UNLABELLED, FormatHint::Delimited).for_account("savings"));
        let card = park(ImportRequest::new(UNLABELLED, FormatHint::Delimited).for_account("card"));
        let comma = park(ImportRequest::new(UNLABELLED, FormatHint::Delimited).with_delimiter(','));

        assert_eq!(savings.document_id, card.document_id);
        assert_ne!(savings.id, card.id);
        assert_ne!(savings.id, comma.id);
        assert_eq!(session.pending_ids().len(), 3);

        let result = session.resume_with_mapping(&card.id, &manual(), &none()).unwrap();
        assert_eq!(result.document_id, card.document_id);
        assert_eq!(session.pending(&savings.id).unwrap().account_ref.as_deref(), Some("savings"));
    }

    #[test]
    fn unknown_pending_id() {
        let mut session = ImportSession::new(ImportPipeline::default(), InMemoryMappingHistory::new());
        let err = session.resume_with_mapping("nope", &manual(), &none()).unwrap_err();
        assert!(matches!(err, ImportError::UnknownPendingImport(id) if id == "nope"));
    }
}
