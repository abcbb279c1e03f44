//! Command handler functions for the covgate CLI.
//!
//! Argument groups are plain clap `Args` structs so handlers can be driven
//! from tests without parsing a command line.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use crate::changes::{ChangeSource, DiffChanges, GitChanges, StaticChanges};
use crate::gate::Gate;
use crate::github;
use crate::identity::{CoverageServiceKind, ProjectIdentity, DEFAULT_CONFIG_FILE};
use crate::model::{Escalation, Violation};
use crate::sink::{BufferSink, ReportSink};

/// Project identity overrides. Anything given here wins over the config
/// file.
#[derive(Args, Debug, Default, Clone)]
pub struct IdentityArgs {
    /// Project file path.
    #[arg(long)]
    pub project: Option<PathBuf>,

    /// Workspace path.
    #[arg(long)]
    pub workspace: Option<PathBuf>,

    /// Scheme (target) name.
    #[arg(long)]
    pub scheme: Option<String>,

    /// Directory holding the toolchain's coverage output.
    #[arg(long)]
    pub build_dir: Option<PathBuf>,

    /// Directory to write the JSON snapshot into.
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Force the report format (cobertura, json, lcov).
    #[arg(long)]
    pub format: Option<String>,

    /// Coverage report file, relative to --build-dir unless absolute.
    #[arg(long)]
    pub report_file: Option<PathBuf>,

    /// Only keep these targets (json reports).
    #[arg(long = "binary-basename")]
    pub binary_basename: Vec<String>,

    /// Decimal places in rendered percentages.
    #[arg(long)]
    pub precision: Option<usize>,

    /// Glob pattern of files to leave out of file checks (repeatable).
    #[arg(long = "ignore")]
    pub ignore_list: Vec<String>,

    /// Prefix stripped from absolute report paths.
    #[arg(long)]
    pub source_root: Option<PathBuf>,

    /// CI service name, recorded in the identity.
    #[arg(long)]
    pub ci_service: Option<String>,

    /// Token used for GitHub when GITHUB_TOKEN is unset.
    #[arg(long)]
    pub access_token: Option<String>,

    /// Where reports go.
    #[arg(long, value_enum)]
    pub service: Option<CoverageServiceKind>,
}

/// Where the change under review comes from.
#[derive(Args, Debug, Default, Clone)]
pub struct ChangeArgs {
    /// Arguments for `git diff --name-status`, e.g. "origin/main...HEAD".
    #[arg(long)]
    pub git_diff: Option<String>,

    /// Read a unified diff from stdin.
    #[arg(long)]
    pub diff_stdin: bool,

    /// Fetch the diff of the current GitHub pull request.
    #[arg(long)]
    pub pr_diff: bool,

    /// Modified file (repeatable).
    #[arg(long)]
    pub modified: Vec<String>,

    /// Added file (repeatable).
    #[arg(long)]
    pub added: Vec<String>,
}

/// Thresholds to enforce. Unset thresholds are not checked.
#[derive(Args, Debug, Default, Clone)]
pub struct ThresholdArgs {
    /// Minimum project-wide coverage.
    #[arg(long)]
    pub minimum_total: Option<f64>,

    /// Escalation for the total check (default: block).
    #[arg(long, value_enum)]
    pub total_level: Option<Escalation>,

    /// Minimum coverage of every added file.
    #[arg(long)]
    pub minimum_added: Option<f64>,

    /// Escalation for the added-files check (default: block).
    #[arg(long, value_enum)]
    pub added_level: Option<Escalation>,

    /// Minimum coverage of every modified file.
    #[arg(long)]
    pub minimum_modified: Option<f64>,

    /// Escalation for the modified-files check (default: warn).
    #[arg(long, value_enum)]
    pub modified_level: Option<Escalation>,
}

/// Load the config file (explicit, or `covgate.json` when present) and
/// apply command-line overrides.
pub fn build_identity(config: Option<&Path>, args: &IdentityArgs) -> Result<ProjectIdentity> {
    let mut identity = match config {
        Some(path) => load_config(path)?,
        None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
            load_config(Path::new(DEFAULT_CONFIG_FILE))?
        }
        None => ProjectIdentity::default(),
    };

    let args = args.clone();
    if args.project.is_some() {
        identity.project = args.project;
    }
    if args.workspace.is_some() {
        identity.workspace = args.workspace;
    }
    if let Some(scheme) = args.scheme {
        identity.scheme = scheme;
    }
    if args.build_dir.is_some() {
        identity.build_directory = args.build_dir;
    }
    if args.output_dir.is_some() {
        identity.output_directory = args.output_dir;
    }
    if args.format.is_some() {
        identity.input_format = args.format;
    }
    if args.report_file.is_some() {
        identity.binary_file = args.report_file;
    }
    if !args.binary_basename.is_empty() {
        identity.binary_basename = args.binary_basename;
    }
    if let Some(precision) = args.precision {
        identity.decimal_precision = precision;
    }
    if !args.ignore_list.is_empty() {
        identity.ignore_list = args.ignore_list;
    }
    if args.source_root.is_some() {
        identity.source_root = args.source_root;
    }
    if args.ci_service.is_some() {
        identity.ci_service = args.ci_service;
    }
    if args.access_token.is_some() {
        identity.coverage_access_token = args.access_token;
    }
    if let Some(service) = args.service {
        identity.coverage_service_kind = service;
    }

    Ok(identity)
}

fn load_config(path: &Path) -> Result<ProjectIdentity> {
    ProjectIdentity::from_file(path)
        .with_context(|| format!("Failed to load config {}", path.display()))
}

/// Pick the change source. Without any change flags the change set is
/// empty, which makes file checks pass trivially.
pub fn build_change_source(
    args: &ChangeArgs,
    github: Option<&github::Context>,
) -> Result<Box<dyn ChangeSource>> {
    if let Some(git_args) = &args.git_diff {
        return Ok(Box::new(GitChanges::new(git_args.clone())));
    }
    if args.diff_stdin {
        return Ok(Box::new(DiffChanges::from_stdin()?));
    }
    if args.pr_diff {
        let context = github.context("--pr-diff needs a GitHub pull request context")?;
        return Ok(Box::new(DiffChanges::from_github(context)?));
    }
    Ok(Box::new(StaticChanges::new(
        args.modified.clone(),
        args.added.clone(),
    )))
}

/// Render the full report as markdown.
pub fn cmd_report(gate: &Gate) -> Result<String> {
    let mut sink = BufferSink::default();
    gate.report(&mut sink)?;
    Ok(sink.to_markdown())
}

/// Result of running the configured threshold checks.
#[derive(Debug, Default)]
pub struct CheckOutcome {
    pub violations: Vec<Violation>,
}

impl CheckOutcome {
    #[must_use]
    pub fn blocked(&self) -> bool {
        self.violations.iter().any(Violation::is_blocking)
    }
}

/// Run every threshold that was given, routing violations to `sink`.
pub fn cmd_check(
    gate: &mut Gate,
    thresholds: &ThresholdArgs,
    sink: &mut dyn ReportSink,
) -> Result<CheckOutcome> {
    if thresholds.minimum_total.is_none()
        && thresholds.minimum_added.is_none()
        && thresholds.minimum_modified.is_none()
    {
        anyhow::bail!(
            "nothing to check: pass --minimum-total, --minimum-added or --minimum-modified"
        );
    }

    let mut outcome = CheckOutcome::default();
    if let Some(minimum) = thresholds.minimum_total {
        outcome
            .violations
            .extend(gate.check_total_coverage(minimum, thresholds.total_level, sink)?);
    }
    if let Some(minimum) = thresholds.minimum_added {
        outcome
            .violations
            .extend(gate.check_added_files_coverage(minimum, thresholds.added_level, sink)?);
    }
    if let Some(minimum) = thresholds.minimum_modified {
        outcome.violations.extend(gate.check_modified_files_coverage(
            minimum,
            thresholds.modified_level,
            sink,
        )?);
    }

    info!(
        violations = outcome.violations.len(),
        blocked = outcome.blocked(),
        "coverage checks finished"
    );
    Ok(outcome)
}
