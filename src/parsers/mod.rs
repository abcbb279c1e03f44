pub mod cobertura;
pub mod json;
pub mod lcov;

use std::collections::{BTreeMap, HashMap};

use crate::error::Result;
use crate::model::CoverageRecord;

/// One file as read from a report, tagged with the target (binary) it
/// belongs to when the format carries that information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFile {
    pub target: Option<String>,
    pub record: CoverageRecord,
}

/// Every format parser implements this trait.
pub trait Parser {
    /// Parse the input bytes into per-file line counts.
    fn parse(&self, input: &[u8]) -> Result<Vec<ParsedFile>>;
}

/// Accumulates per-line hit counts for line-oriented formats and folds them
/// into tested/testable counts. Files keep the order they were first seen
/// in; a path that shows up again is merged by taking the max hit count
/// per line.
#[derive(Debug, Default)]
pub(crate) struct LineTally {
    order: Vec<String>,
    lines: HashMap<String, BTreeMap<u32, u64>>,
}

impl LineTally {
    pub(crate) fn touch(&mut self, path: &str) {
        if !self.lines.contains_key(path) {
            self.order.push(path.to_string());
            self.lines.insert(path.to_string(), BTreeMap::new());
        }
    }

    pub(crate) fn hit(&mut self, path: &str, line_number: u32, hit_count: u64) {
        self.touch(path);
        if let Some(lines) = self.lines.get_mut(path) {
            let entry = lines.entry(line_number).or_insert(0);
            if hit_count > *entry {
                *entry = hit_count;
            }
        }
    }

    pub(crate) fn into_files(mut self) -> Vec<ParsedFile> {
        self.order
            .into_iter()
            .map(|path| {
                let lines = self.lines.remove(&path).unwrap_or_default();
                let tested = lines.values().filter(|&&hits| hits > 0).count() as u64;
                let testable = lines.len() as u64;
                ParsedFile {
                    target: None,
                    record: CoverageRecord::new(path, tested, testable),
                }
            })
            .collect()
    }
}
