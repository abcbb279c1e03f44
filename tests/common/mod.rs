#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::path::Path;
use std::rc::Rc;

use covgate::changes::ChangeSource;
use covgate::error::Result;
use covgate::identity::ProjectIdentity;
use covgate::model::CoverageRecord;
use covgate::provider::CoverageProvider;

/// Provider stub whose records can be swapped between calls. Clones share
/// the call counter and the data.
#[derive(Clone, Default)]
pub struct StubProvider {
    pub calls: Rc<Cell<usize>>,
    pub records: Rc<RefCell<Vec<CoverageRecord>>>,
}

impl StubProvider {
    pub fn with(records: Vec<CoverageRecord>) -> Self {
        Self {
            calls: Rc::default(),
            records: Rc::new(RefCell::new(records)),
        }
    }

    pub fn replace(&self, records: Vec<CoverageRecord>) {
        *self.records.borrow_mut() = records;
    }
}

impl CoverageProvider for StubProvider {
    fn list_coverage_files(&self, _identity: &ProjectIdentity) -> Result<Vec<CoverageRecord>> {
        self.calls.set(self.calls.get() + 1);
        Ok(self.records.borrow().clone())
    }
}

/// Change source stub counting how often each list is requested.
#[derive(Clone, Default)]
pub struct StubChanges {
    pub modified: Vec<String>,
    pub added: Vec<String>,
    pub modified_calls: Rc<Cell<usize>>,
    pub added_calls: Rc<Cell<usize>>,
}

impl StubChanges {
    pub fn new(modified: &[&str], added: &[&str]) -> Self {
        Self {
            modified: modified.iter().map(|s| s.to_string()).collect(),
            added: added.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }
}

impl ChangeSource for StubChanges {
    fn modified_files(&self) -> anyhow::Result<Option<Vec<String>>> {
        self.modified_calls.set(self.modified_calls.get() + 1);
        Ok(Some(self.modified.clone()))
    }

    fn added_files(&self) -> anyhow::Result<Option<Vec<String>>> {
        self.added_calls.set(self.added_calls.get() + 1);
        Ok(Some(self.added.clone()))
    }
}

pub fn identity() -> ProjectIdentity {
    ProjectIdentity::new("App.xcodeproj", "App")
}

/// Identity reading reports out of `dir`.
pub fn identity_in(dir: &Path) -> ProjectIdentity {
    ProjectIdentity {
        build_directory: Some(dir.to_path_buf()),
        ..identity()
    }
}

pub fn abc() -> Vec<CoverageRecord> {
    vec![
        CoverageRecord::new("A.swift", 8, 10),
        CoverageRecord::new("B.swift", 5, 10),
        CoverageRecord::new("C.swift", 3, 4),
    ]
}
