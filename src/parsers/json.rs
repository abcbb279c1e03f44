//! JSON report format: files grouped under the target (binary) they were
//! compiled into.
//!
//! ```json
//! {
//!   "targets": [
//!     { "name": "App.app", "files": [
//!       { "path": "Sources/App/A.swift", "lines_tested": 8, "lines_testable": 10 }
//!     ] }
//!   ]
//! }
//! ```
//!
//! The snapshot written to `output_directory` uses the same shape, so a
//! snapshot can be fed back in as a report.

use serde::{Deserialize, Serialize};

use crate::error::{GateError, Result};
use crate::model::CoverageRecord;
use crate::parsers::{ParsedFile, Parser};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JsonReport {
    pub targets: Vec<JsonTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_coverage: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonTarget {
    pub name: String,
    #[serde(default)]
    pub files: Vec<CoverageRecord>,
}

pub struct JsonParser;

impl Parser for JsonParser {
    fn parse(&self, input: &[u8]) -> Result<Vec<ParsedFile>> {
        let report: JsonReport = serde_json::from_slice(input)?;
        for record in report.targets.iter().flat_map(|t| &t.files) {
            if record.lines_tested > record.lines_testable {
                return Err(GateError::Parse(format!(
                    "{}: {} lines tested out of {} testable",
                    record.path, record.lines_tested, record.lines_testable
                )));
            }
        }
        Ok(report
            .targets
            .into_iter()
            .flat_map(|target| {
                let name = target.name;
                target.files.into_iter().map(move |record| ParsedFile {
                    target: Some(name.clone()),
                    record,
                })
            })
            .collect())
    }
}
