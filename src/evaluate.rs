//! Threshold checks. Each check collects every violation first; routing
//! them to a sink is a separate step.

use tracing::{debug, info};

use crate::error::Result;
use crate::index::CoverageIndex;
use crate::model::{CoverageRecord, Escalation, Violation};
use crate::sink::ReportSink;

/// One violation if the project-wide total is below `minimum`.
pub fn evaluate_total(
    index: &CoverageIndex,
    minimum: f64,
    escalation: Escalation,
) -> Result<Option<Violation>> {
    let total = index.total_coverage()?;
    if total < minimum {
        return Ok(Some(Violation::new(
            escalation,
            format!("Total coverage less than {minimum}%"),
        )));
    }
    Ok(None)
}

/// One violation per file in `view` below `minimum`. Files with nothing
/// testable have no percentage and are skipped.
pub fn evaluate_files(
    view: &[&CoverageRecord],
    minimum: f64,
    escalation: Escalation,
) -> Vec<Violation> {
    view.iter()
        .filter_map(|record| match record.percentage() {
            Some(pct) if pct < minimum => Some(Violation::new(
                escalation,
                format!("{} has less than {minimum}% code coverage", record.path),
            )),
            Some(_) => None,
            None => {
                debug!(path = %record.path, "skipping file without testable lines");
                None
            }
        })
        .collect()
}

/// Send each violation to exactly one sink channel.
pub fn route(violations: &[Violation], sink: &mut dyn ReportSink) {
    for violation in violations {
        match violation.escalation {
            Escalation::Block => sink.post_build_failure(&violation.message),
            Escalation::Warn => sink.post_inline_warning(&violation.message),
        }
    }
    if !violations.is_empty() {
        info!(count = violations.len(), "reported coverage violations");
    }
}
