//! Coverage providers turn a project identity into per-file coverage
//! records. Producing the raw instrumentation output is the toolchain's
//! business; the shipped provider only reads the report it left behind.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::detect::{detect_format, Format};
use crate::error::{GateError, Result};
use crate::identity::ProjectIdentity;
use crate::index::SNAPSHOT_FILE;
use crate::model::CoverageRecord;
use crate::parsers::cobertura::CoberturaParser;
use crate::parsers::json::JsonParser;
use crate::parsers::lcov::LcovParser;
use crate::parsers::{ParsedFile, Parser};

/// Source of per-file coverage for one configured target.
pub trait CoverageProvider {
    fn list_coverage_files(&self, identity: &ProjectIdentity) -> Result<Vec<CoverageRecord>>;
}

/// Reads a coverage report out of the identity's build directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReportFileProvider;

impl CoverageProvider for ReportFileProvider {
    fn list_coverage_files(&self, identity: &ProjectIdentity) -> Result<Vec<CoverageRecord>> {
        let forced = identity.format()?;
        let (path, content) = locate_report(identity, forced)?;

        let format = match forced {
            Some(format) => format,
            None => detect_format(&path, &content).ok_or(GateError::UnknownFormat)?,
        };
        debug!(report = %path.display(), %format, "reading coverage report");

        let files = parse_with_format(format, &content).map_err(|e| {
            GateError::ProviderConfig(format!("{}: {}", path.display(), e))
        })?;

        Ok(files
            .into_iter()
            .filter(|f| keep_target(f, &identity.binary_basename))
            .map(|f| relativize(f.record, identity.source_root.as_deref()))
            .collect())
    }
}

fn parse_with_format(format: Format, content: &[u8]) -> Result<Vec<ParsedFile>> {
    match format {
        Format::Cobertura => CoberturaParser.parse(content),
        Format::Json => JsonParser.parse(content),
        Format::Lcov => LcovParser.parse(content),
    }
}

/// Find the report file and read it.
fn locate_report(identity: &ProjectIdentity, forced: Option<Format>) -> Result<(PathBuf, Vec<u8>)> {
    let build_dir = identity.build_directory.as_deref();

    if let Some(binary_file) = identity.binary_file.as_deref() {
        let path = match build_dir {
            Some(dir) if binary_file.is_relative() => dir.join(binary_file),
            _ => binary_file.to_path_buf(),
        };
        let content = std::fs::read(&path).map_err(|e| {
            GateError::ProviderConfig(format!("cannot read report {}: {}", path.display(), e))
        })?;
        return Ok((path, content));
    }

    let dir = build_dir.ok_or_else(|| {
        GateError::ProviderConfig("a build directory or report file is required".to_string())
    })?;
    if !dir.is_dir() {
        return Err(GateError::ProviderConfig(format!(
            "build directory {} does not exist",
            dir.display()
        )));
    }

    let mut candidates: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        // A snapshot from an earlier run is already filtered; never read it back.
        .filter(|p| p.file_name().map_or(true, |name| name != SNAPSHOT_FILE))
        .collect();
    candidates.sort();

    for path in candidates {
        let content = std::fs::read(&path)?;
        match (detect_format(&path, &content), forced) {
            (Some(found), Some(wanted)) if found == wanted => return Ok((path, content)),
            (Some(_), None) => return Ok((path, content)),
            _ => {}
        }
    }

    Err(GateError::ProviderConfig(format!(
        "no coverage report found in {}",
        dir.display()
    )))
}

fn keep_target(file: &ParsedFile, basenames: &[String]) -> bool {
    if basenames.is_empty() {
        return true;
    }
    match file.target.as_deref() {
        Some(target) => basenames.iter().any(|b| b == target),
        // Formats without targets are not filtered.
        None => true,
    }
}

fn relativize(mut record: CoverageRecord, source_root: Option<&Path>) -> CoverageRecord {
    if let Some(root) = source_root {
        if let Ok(rel) = Path::new(&record.path).strip_prefix(root) {
            record.path = rel.to_string_lossy().into_owned();
        }
    }
    record
}
