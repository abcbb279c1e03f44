//! The gate owns one run's configuration: the project identity, the
//! current coverage index (if any), and the collaborators it talks to.
//! Every query on an unconfigured gate is a no-op that yields nothing.

use std::path::PathBuf;

use anyhow::Result;
use tracing::debug;

use crate::changes::{ChangeSetResolver, ChangeSource};
use crate::error::GateError;
use crate::evaluate::{evaluate_files, evaluate_total, route};
use crate::identity::ProjectIdentity;
use crate::index::CoverageIndex;
use crate::model::{CoverageRecord, Escalation, Violation};
use crate::provider::CoverageProvider;
use crate::report::full_report;
use crate::sink::ReportSink;

/// Whether a coverage index is currently available.
#[derive(Debug, Default)]
pub enum IndexState {
    #[default]
    Unconfigured,
    Ready(CoverageIndex),
}

pub struct Gate {
    provider: Box<dyn CoverageProvider>,
    changes: Box<dyn ChangeSource>,
    identity: Option<ProjectIdentity>,
    state: IndexState,
}

impl Gate {
    pub fn new(provider: Box<dyn CoverageProvider>, changes: Box<dyn ChangeSource>) -> Self {
        Self {
            provider,
            changes,
            identity: None,
            state: IndexState::Unconfigured,
        }
    }

    /// Open a fresh index for `identity` and remember the identity for
    /// later [`Gate::reconfigure`] calls. On failure the gate is left
    /// unconfigured and the previous identity is kept.
    pub fn configure(&mut self, identity: ProjectIdentity) -> crate::error::Result<()> {
        self.state = IndexState::Unconfigured;
        let index = CoverageIndex::open(self.provider.as_ref(), &identity)?;
        self.identity = Some(identity);
        self.state = IndexState::Ready(index);
        Ok(())
    }

    /// Drop the index and every cache hanging off it. The identity stays.
    pub fn reset(&mut self) {
        self.state = IndexState::Unconfigured;
    }

    /// Reopen the index from the stored identity, with or without its
    /// ignore list. Does nothing if [`Gate::configure`] never succeeded.
    pub fn reconfigure(&mut self, include_ignore_list: bool) -> crate::error::Result<()> {
        let Some(identity) = self.identity.as_ref() else {
            debug!("reconfigure without a stored identity");
            return Ok(());
        };
        let scoped = if include_ignore_list {
            identity.clone()
        } else {
            identity.without_ignore_list()
        };

        self.state = IndexState::Unconfigured;
        let index = CoverageIndex::open(self.provider.as_ref(), &scoped)?;
        self.state = IndexState::Ready(index);
        Ok(())
    }

    pub fn identity(&self) -> Option<&ProjectIdentity> {
        self.identity.as_ref()
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, IndexState::Ready(_))
    }

    pub fn index(&self) -> Option<&CoverageIndex> {
        match &self.state {
            IndexState::Ready(index) => Some(index),
            IndexState::Unconfigured => None,
        }
    }

    /// `Ok(None)` when unconfigured.
    pub fn total_coverage(&self) -> crate::error::Result<Option<f64>> {
        match &self.state {
            IndexState::Ready(index) => index.total_coverage().map(Some),
            IndexState::Unconfigured => Ok(None),
        }
    }

    pub fn records(&self) -> &[CoverageRecord] {
        match &self.state {
            IndexState::Ready(index) => index.records(),
            IndexState::Unconfigured => &[],
        }
    }

    pub fn added_or_modified_files(&self) -> Result<Vec<&CoverageRecord>> {
        match self.resolver() {
            Some(resolver) => resolver.added_or_modified(),
            None => Ok(Vec::new()),
        }
    }

    pub fn modified_only_files(&self) -> Result<Vec<&CoverageRecord>> {
        match self.resolver() {
            Some(resolver) => resolver.modified_only(),
            None => Ok(Vec::new()),
        }
    }

    pub fn added_only_files(&self) -> Result<Vec<&CoverageRecord>> {
        match self.resolver() {
            Some(resolver) => resolver.added_only(),
            None => Ok(Vec::new()),
        }
    }

    /// Project-wide total against `minimum`; blocks by default. Runs
    /// without the ignore list.
    pub fn check_total_coverage(
        &mut self,
        minimum: f64,
        escalation: Option<Escalation>,
        sink: &mut dyn ReportSink,
    ) -> Result<Vec<Violation>> {
        self.reconfigure(false)?;
        let Some(index) = self.index() else {
            return Ok(Vec::new());
        };
        let violations: Vec<Violation> =
            evaluate_total(index, minimum, escalation.unwrap_or(Escalation::Block))?
                .into_iter()
                .collect();
        route(&violations, sink);
        Ok(violations)
    }

    /// Every added file against `minimum`; blocks by default.
    pub fn check_added_files_coverage(
        &mut self,
        minimum: f64,
        escalation: Option<Escalation>,
        sink: &mut dyn ReportSink,
    ) -> Result<Vec<Violation>> {
        self.reconfigure(true)?;
        let view = self.added_only_files()?;
        let violations = evaluate_files(&view, minimum, escalation.unwrap_or(Escalation::Block));
        route(&violations, sink);
        Ok(violations)
    }

    /// Every modified file against `minimum`; only warns by default.
    pub fn check_modified_files_coverage(
        &mut self,
        minimum: f64,
        escalation: Option<Escalation>,
        sink: &mut dyn ReportSink,
    ) -> Result<Vec<Violation>> {
        self.reconfigure(true)?;
        let view = self.modified_only_files()?;
        let violations = evaluate_files(&view, minimum, escalation.unwrap_or(Escalation::Warn));
        route(&violations, sink);
        Ok(violations)
    }

    /// Post the full markdown report over added and modified files.
    pub fn report(&self, sink: &mut dyn ReportSink) -> Result<()> {
        let (Some(index), Some(identity)) = (self.index(), self.identity.as_ref()) else {
            return Ok(());
        };
        let view = self.added_or_modified_files()?;
        let md = full_report(index, &view, &identity.scheme, identity.decimal_precision)?;
        sink.post_markdown_block(&md);
        Ok(())
    }

    /// Write the JSON snapshot into the identity's output directory, if it
    /// names one.
    pub fn write_snapshot(&self) -> crate::error::Result<Option<PathBuf>> {
        let (Some(index), Some(identity)) = (self.index(), self.identity.as_ref()) else {
            return Ok(None);
        };
        let Some(dir) = identity.output_directory.as_deref() else {
            return Ok(None);
        };
        index.write_snapshot(dir, &identity.scheme).map(Some)
    }

    fn resolver(&self) -> Option<ChangeSetResolver<'_>> {
        self.index()
            .map(|index| ChangeSetResolver::new(index, self.changes.as_ref()))
    }
}

impl std::fmt::Debug for Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gate")
            .field("identity", &self.identity)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// True for errors caused by a project that has nothing testable.
pub fn is_zero_testable(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<GateError>(),
        Some(GateError::ZeroTestableLines(_))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changes::StaticChanges;
    use crate::sink::BufferSink;

    struct Fixed(Vec<CoverageRecord>);

    impl CoverageProvider for Fixed {
        fn list_coverage_files(
            &self,
            _identity: &ProjectIdentity,
        ) -> crate::error::Result<Vec<CoverageRecord>> {
            Ok(self.0.clone())
        }
    }

    fn gate() -> Gate {
        Gate::new(
            Box::new(Fixed(vec![
                CoverageRecord::new("A.swift", 8, 10),
                CoverageRecord::new("B.swift", 5, 10),
                CoverageRecord::new("C.swift", 3, 4),
            ])),
            Box::new(StaticChanges::new(vec!["B.swift".into()], vec!["C.swift".into()])),
        )
    }

    #[test]
    fn test_unconfigured_is_a_no_op() {
        let mut gate = gate();
        let mut sink = BufferSink::default();

        assert!(!gate.is_ready());
        assert_eq!(gate.total_coverage().unwrap(), None);
        assert!(gate.records().is_empty());
        assert!(gate.added_or_modified_files().unwrap().is_empty());
        assert!(gate.check_total_coverage(99.0, None, &mut sink).unwrap().is_empty());
        assert!(gate.check_added_files_coverage(99.0, None, &mut sink).unwrap().is_empty());
        gate.report(&mut sink).unwrap();
        assert_eq!(gate.write_snapshot().unwrap(), None);
        assert!(sink.to_markdown().is_empty());
    }

    #[test]
    fn test_configure_and_reset() {
        let mut gate = gate();
        gate.configure(ProjectIdentity::new("App.xcodeproj", "App")).unwrap();
        assert_eq!(gate.total_coverage().unwrap(), Some(16.0 * 100.0 / 24.0));

        gate.reset();
        assert!(!gate.is_ready());
        assert_eq!(gate.identity().map(|i| i.scheme.as_str()), Some("App"));

        gate.reconfigure(true).unwrap();
        assert!(gate.is_ready());
    }

    #[test]
    fn test_failed_configure_leaves_gate_unconfigured() {
        let mut gate = gate();
        assert!(gate.configure(ProjectIdentity::default()).is_err());
        assert!(!gate.is_ready());
        assert!(gate.identity().is_none());
    }

    #[test]
    fn test_default_escalations() {
        let mut gate = gate();
        gate.configure(ProjectIdentity::new("App.xcodeproj", "App")).unwrap();
        let mut sink = BufferSink::default();

        let total = gate.check_total_coverage(90.0, None, &mut sink).unwrap();
        assert_eq!(total[0].escalation, Escalation::Block);

        let added = gate.check_added_files_coverage(90.0, None, &mut sink).unwrap();
        assert_eq!(added, vec![Violation::new(Escalation::Block, "C.swift has less than 90% code coverage")]);

        let modified = gate.check_modified_files_coverage(90.0, None, &mut sink).unwrap();
        assert_eq!(modified, vec![Violation::new(Escalation::Warn, "B.swift has less than 90% code coverage")]);

        assert_eq!(sink.failures.len(), 2);
        assert_eq!(sink.warnings.len(), 1);
    }

    #[test]
    fn test_explicit_escalation_overrides_default() {
        let mut gate = gate();
        gate.configure(ProjectIdentity::new("App.xcodeproj", "App")).unwrap();
        let mut sink = BufferSink::default();

        gate.check_total_coverage(90.0, Some(Escalation::Warn), &mut sink).unwrap();
        gate.check_modified_files_coverage(90.0, Some(Escalation::Block), &mut sink).unwrap();
        assert_eq!(sink.warnings, vec!["Total coverage less than 90%"]);
        assert_eq!(sink.failures, vec!["B.swift has less than 90% code coverage"]);
    }

    #[test]
    fn test_report() {
        let mut gate = gate();
        gate.configure(ProjectIdentity::new("App.xcodeproj", "App")).unwrap();
        let mut sink = BufferSink::default();
        gate.report(&mut sink).unwrap();

        assert_eq!(sink.markdown.len(), 1);
        let md = &sink.markdown[0];
        assert!(md.contains("### Code coverage for App"));
        assert!(md.contains("**Total coverage: 66.67%**"));
        assert!(md.contains("| `B.swift` | 50.00% |"));
        assert!(md.contains("| `C.swift` | 75.00% |"));
        assert!(!md.contains("A.swift"));
    }

    #[test]
    fn test_zero_testable_error_is_recognized() {
        let mut gate = Gate::new(
            Box::new(Fixed(vec![CoverageRecord::new("Empty.swift", 0, 0)])),
            Box::new(StaticChanges::default()),
        );
        gate.configure(ProjectIdentity::new("App.xcodeproj", "App")).unwrap();
        let err = gate
            .check_total_coverage(50.0, None, &mut BufferSink::default())
            .unwrap_err();
        assert!(is_zero_testable(&err));
    }
}
