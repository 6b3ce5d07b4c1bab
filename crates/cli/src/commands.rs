use std::fs;
use std::path::Path;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use statera_import::{
    ColumnMapping, ExistingRecordRef, FormatHint, ImportOutcome, ImportPipeline, ImportRequest,
    PipelineConfig, StaticLookup,
};
use tracing::info;

use crate::{ImportArgs, SourceArgs, EXIT_NEEDS_MAPPING};

pub fn import(args: ImportArgs) -> Result<ExitCode> {
    let pipeline = ImportPipeline::new(load_config(args.source.config.as_deref())?)?;
    let format = resolve_format(&args.source.file, args.source.format)?;
    let bytes = read_file(&args.source.file)?;

    let mut request = ImportRequest::new(bytes, format);
    if let Some(delimiter) = args.source.delimiter {
        request = request.with_delimiter(delimiter);
    }
    if let Some(path) = &args.mapping {
        request = request.with_mapping(read_json::<ColumnMapping>(path)?);
    }
    if let Some(account) = args.account {
        request = request.for_account(account);
    }

    let lookup = match &args.existing {
        Some(path) => StaticLookup::new(read_json::<Vec<ExistingRecordRef>>(path)?),
        None => StaticLookup::default(),
    };

    let outcome = pipeline
        .run(request, &lookup)
        .with_context(|| format!("Failed to import {}", args.source.file.display()))?;
    match outcome {
        ImportOutcome::Complete(result) => {
            info!(
                accepted = result.accepted.len(),
                rejected = result.rejected.len(),
                duplicates = result.duplicates.len(),
                "imported {}",
                args.source.file.display()
            );
            print_json(&result, args.source.pretty)?;
            Ok(ExitCode::SUCCESS)
        }
        ImportOutcome::AwaitingMapping(pending) => {
            print_json(&pending, args.source.pretty)?;
            eprintln!(
                "Column mapping is incomplete; complete the proposal and rerun with --mapping."
            );
            Ok(ExitCode::from(EXIT_NEEDS_MAPPING))
        }
    }
}

pub fn inspect(args: SourceArgs) -> Result<ExitCode> {
    let pipeline = ImportPipeline::new(load_config(args.config.as_deref())?)?;
    let format = resolve_format(&args.file, args.format)?;
    let bytes = read_file(&args.file)?;

    let inspection = pipeline
        .inspect(&bytes, format, args.delimiter)
        .with_context(|| format!("Failed to inspect {}", args.file.display()))?;
    print_json(&inspection, args.pretty)?;
    Ok(ExitCode::SUCCESS)
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    let Some(path) = path else {
        return Ok(PipelineConfig::default());
    };
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    PipelineConfig::from_toml(&content).with_context(|| format!("Invalid config {}", path.display()))
}

fn resolve_format(path: &Path, explicit: Option<FormatHint>) -> Result<FormatHint> {
    if let Some(format) = explicit {
        return Ok(format);
    }
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "csv" | "tsv" => Ok(FormatHint::Delimited),
        "xlsx" | "xls" | "xlsb" | "ods" => Ok(FormatHint::Tabular),
        "txt" => Ok(FormatHint::PageText),
        _ => bail!(
            "Cannot tell the format of {} from its extension; pass --format",
            path.display()
        ),
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{json}");
    Ok(())
}
