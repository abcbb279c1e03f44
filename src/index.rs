//! The set of coverage records for one configured target, with the
//! project-wide total memoized for the lifetime of the index.

use std::cell::OnceCell;
use std::path::{Path, PathBuf};

use glob::Pattern;
use tracing::{debug, info};

use crate::changes::ChangeSetCache;
use crate::error::{GateError, Result};
use crate::identity::ProjectIdentity;
use crate::model::{percentage, CoverageRecord};
use crate::parsers::json::{JsonReport, JsonTarget};
use crate::provider::CoverageProvider;

pub const SNAPSHOT_FILE: &str = "report.json";

#[derive(Debug, Default)]
pub struct CoverageIndex {
    records: Vec<CoverageRecord>,
    /// `None` inside means the aggregate had zero testable lines.
    total: OnceCell<Option<f64>>,
    pub(crate) changes: ChangeSetCache,
}

impl CoverageIndex {
    /// Ask the provider for records and drop everything the identity's
    /// ignore list matches. The provider is called exactly once.
    pub fn open(provider: &dyn CoverageProvider, identity: &ProjectIdentity) -> Result<Self> {
        identity.validate()?;
        let patterns = compile_ignore_list(&identity.ignore_list)?;

        let records = provider.list_coverage_files(identity)?;
        let fetched = records.len();
        let records: Vec<CoverageRecord> = records
            .into_iter()
            .filter(|r| !is_ignored(r, &patterns))
            .collect();

        if records.len() < fetched {
            debug!(ignored = fetched - records.len(), "applied ignore list");
        }
        info!(scheme = %identity.scheme, files = records.len(), "opened coverage index");
        Ok(Self::from_records(records))
    }

    pub fn from_records(records: Vec<CoverageRecord>) -> Self {
        Self {
            records,
            ..Default::default()
        }
    }

    pub fn records(&self) -> &[CoverageRecord] {
        &self.records
    }

    /// sum(tested) / sum(testable) * 100 over every record. Computed once;
    /// fails with `ZeroTestableLines` when nothing in the project is
    /// testable.
    pub fn total_coverage(&self) -> Result<f64> {
        let total = self.total.get_or_init(|| {
            // Summed as u128 so provider counts near u64::MAX cannot overflow.
            let (tested, testable) = self.records.iter().fold((0u128, 0u128), |(t, n), r| {
                (t + u128::from(r.lines_tested), n + u128::from(r.lines_testable))
            });
            percentage(tested, testable)
        });
        total.ok_or_else(|| GateError::ZeroTestableLines("project".to_string()))
    }

    /// Coverage of a single file; `None` if unknown or nothing testable.
    pub fn percentage_of(&self, path: &str) -> Option<f64> {
        self.records
            .iter()
            .find(|r| r.path == path)
            .and_then(CoverageRecord::percentage)
    }

    /// Write the records (and total, when defined) as a JSON report into
    /// `dir`. Returns the written path.
    pub fn write_snapshot(&self, dir: &Path, target: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let report = JsonReport {
            targets: vec![JsonTarget {
                name: target.to_string(),
                files: self.records.clone(),
            }],
            total_coverage: self.total_coverage().ok(),
        };
        let path = dir.join(SNAPSHOT_FILE);
        std::fs::write(&path, serde_json::to_vec_pretty(&report)?)?;
        Ok(path)
    }
}

fn compile_ignore_list(patterns: &[String]) -> Result<Vec<Pattern>> {
    patterns
        .iter()
        .map(|p| {
            Pattern::new(p).map_err(|e| {
                GateError::ProviderConfig(format!("invalid ignore pattern '{}': {}", p, e))
            })
        })
        .collect()
}

fn is_ignored(record: &CoverageRecord, patterns: &[Pattern]) -> bool {
    patterns
        .iter()
        .any(|p| p.matches(&record.path) || p.matches(record.file_name()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct FixedProvider {
        records: Vec<CoverageRecord>,
        calls: Cell<usize>,
    }

    impl FixedProvider {
        fn new(records: Vec<CoverageRecord>) -> Self {
            Self {
                records,
                calls: Cell::new(0),
            }
        }
    }

    impl CoverageProvider for FixedProvider {
        fn list_coverage_files(&self, _identity: &ProjectIdentity) -> Result<Vec<CoverageRecord>> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.records.clone())
        }
    }

    fn identity() -> ProjectIdentity {
        ProjectIdentity::new("App.xcodeproj", "App")
    }

    #[test]
    fn test_total_coverage() {
        let index = CoverageIndex::from_records(vec![
            CoverageRecord::new("A.swift", 8, 10),
            CoverageRecord::new("B.swift", 5, 10),
        ]);
        assert_eq!(index.total_coverage().unwrap(), 65.0);
    }

    #[test]
    fn test_total_coverage_ignores_order() {
        let forward = CoverageIndex::from_records(vec![
            CoverageRecord::new("A.swift", 1, 3),
            CoverageRecord::new("B.swift", 7, 9),
            CoverageRecord::new("C.swift", 0, 5),
        ]);
        let backward = CoverageIndex::from_records(vec![
            CoverageRecord::new("C.swift", 0, 5),
            CoverageRecord::new("B.swift", 7, 9),
            CoverageRecord::new("A.swift", 1, 3),
        ]);
        assert_eq!(
            forward.total_coverage().unwrap(),
            backward.total_coverage().unwrap()
        );
    }

    #[test]
    fn test_zero_testable_records_do_not_skew_total() {
        let index = CoverageIndex::from_records(vec![
            CoverageRecord::new("A.swift", 8, 10),
            CoverageRecord::new("Empty.swift", 0, 0),
        ]);
        assert_eq!(index.total_coverage().unwrap(), 80.0);
    }

    #[test]
    fn test_zero_testable_project_is_an_error_every_time() {
        let index = CoverageIndex::from_records(vec![CoverageRecord::new("Empty.swift", 0, 0)]);
        assert!(matches!(index.total_coverage(), Err(GateError::ZeroTestableLines(_))));
        assert!(matches!(index.total_coverage(), Err(GateError::ZeroTestableLines(_))));

        let empty = CoverageIndex::default();
        assert!(empty.total_coverage().is_err());
    }

    #[test]
    fn test_open_calls_provider_once() {
        let provider = FixedProvider::new(vec![CoverageRecord::new("A.swift", 1, 2)]);
        let index = CoverageIndex::open(&provider, &identity()).unwrap();
        assert_eq!(index.total_coverage().unwrap(), 50.0);
        assert_eq!(index.total_coverage().unwrap(), 50.0);
        assert_eq!(provider.calls.get(), 1);
    }

    #[test]
    fn test_open_rejects_invalid_identity_without_calling_provider() {
        let provider = FixedProvider::new(vec![]);
        let bad = ProjectIdentity::default();
        assert!(matches!(
            CoverageIndex::open(&provider, &bad),
            Err(GateError::ProviderConfig(_))
        ));
        assert_eq!(provider.calls.get(), 0);
    }

    #[test]
    fn test_open_applies_ignore_list() {
        let provider = FixedProvider::new(vec![
            CoverageRecord::new("Sources/App/A.swift", 1, 2),
            CoverageRecord::new("Sources/Generated/Strings.swift", 0, 40),
            CoverageRecord::new("Tests/AppTests.swift", 0, 10),
        ]);
        let identity = ProjectIdentity {
            ignore_list: vec!["Sources/Generated/*".to_string(), "*Tests.swift".to_string()],
            ..identity()
        };
        let index = CoverageIndex::open(&provider, &identity).unwrap();
        let paths: Vec<&str> = index.records().iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["Sources/App/A.swift"]);
    }

    #[test]
    fn test_open_rejects_bad_ignore_pattern() {
        let provider = FixedProvider::new(vec![]);
        let identity = ProjectIdentity {
            ignore_list: vec!["[unclosed".to_string()],
            ..identity()
        };
        assert!(matches!(
            CoverageIndex::open(&provider, &identity),
            Err(GateError::ProviderConfig(_))
        ));
    }

    #[test]
    fn test_percentage_of() {
        let index = CoverageIndex::from_records(vec![
            CoverageRecord::new("A.swift", 3, 4),
            CoverageRecord::new("Empty.swift", 0, 0),
        ]);
        assert_eq!(index.percentage_of("A.swift"), Some(75.0));
        assert_eq!(index.percentage_of("Empty.swift"), None);
        assert_eq!(index.percentage_of("Missing.swift"), None);
    }

    #[test]
    fn test_total_with_huge_counts() {
        let index = CoverageIndex::from_records(vec![
            CoverageRecord::new("Huge.swift", u64::MAX, u64::MAX),
            CoverageRecord::new("A.swift", 1, 1),
        ]);
        assert_eq!(index.total_coverage().unwrap(), 100.0);

        let index = CoverageIndex::from_records(vec![
            CoverageRecord::new("Huge.swift", 0, u64::MAX),
            CoverageRecord::new("A.swift", 0, u64::MAX),
        ]);
        assert_eq!(index.total_coverage().unwrap(), 0.0);
    }

    #[test]
    fn test_write_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let index = CoverageIndex::from_records(vec![CoverageRecord::new("A.swift", 1, 4)]);
        let path = index.write_snapshot(&dir.path().join("out"), "App").unwrap();

        let report: JsonReport = serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();
        assert_eq!(report.targets[0].name, "App");
        assert_eq!(report.targets[0].files, index.records());
        assert_eq!(report.total_coverage, Some(25.0));
    }
}
