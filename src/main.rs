use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use covgate::cli::{self, ChangeArgs, IdentityArgs, ThresholdArgs};
use covgate::gate::Gate;
use covgate::github;
use covgate::identity::CoverageServiceKind;
use covgate::provider::ReportFileProvider;
use covgate::sink::{GitHubCommentSink, ReportSink, TerminalSink};

/// covgate: coverage thresholds and change-set coverage reports for pull
/// requests.
#[derive(Parser)]
#[command(name = "covgate", version, about)]
struct Cli {
    /// Path to the project config (default: ./covgate.json when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Post a markdown coverage report for the changed files.
    Report {
        #[command(flatten)]
        identity: IdentityArgs,

        #[command(flatten)]
        changes: ChangeArgs,
    },

    /// Enforce coverage thresholds. Exits non-zero on blocking violations.
    Check {
        #[command(flatten)]
        identity: IdentityArgs,

        #[command(flatten)]
        changes: ChangeArgs,

        #[command(flatten)]
        thresholds: ThresholdArgs,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let args = Cli::parse();
    let config = args.config;

    match args.command {
        Commands::Report { identity, changes } => {
            let (gate, mut output) = setup(config.as_deref(), &identity, &changes)?;
            let md = cli::cmd_report(&gate)?;
            output.sink().post_markdown_block(&md);
            output.finish()
        }
        Commands::Check {
            identity,
            changes,
            thresholds,
        } => {
            let (mut gate, mut output) = setup(config.as_deref(), &identity, &changes)?;
            let outcome = cli::cmd_check(&mut gate, &thresholds, output.sink())?;
            output.finish()?;
            if outcome.blocked() {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

/// Logs go to stderr so stdout stays clean for the markdown report.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn setup(
    config: Option<&Path>,
    identity_args: &IdentityArgs,
    change_args: &ChangeArgs,
) -> Result<(Gate, Output)> {
    let identity = cli::build_identity(config, identity_args)?;

    let wants_github = identity.coverage_service_kind == CoverageServiceKind::GitHub;
    let context = if wants_github || change_args.pr_diff {
        Some(github::Context::from_env(
            identity.coverage_access_token.as_deref(),
        )?)
    } else {
        None
    };
    let changes = cli::build_change_source(change_args, context.as_ref())?;

    let mut gate = Gate::new(Box::new(ReportFileProvider), changes);
    gate.configure(identity)
        .context("Failed to load coverage")?;
    if let Some(path) = gate.write_snapshot()? {
        info!(path = %path.display(), "wrote coverage snapshot");
    }

    let output = match context {
        Some(context) if wants_github => Output::GitHub(GitHubCommentSink::new(context)),
        _ => Output::Terminal(TerminalSink::default()),
    };
    Ok((gate, output))
}

enum Output {
    Terminal(TerminalSink),
    GitHub(GitHubCommentSink),
}

impl Output {
    fn sink(&mut self) -> &mut dyn ReportSink {
        match self {
            Output::Terminal(sink) => sink,
            Output::GitHub(sink) => sink,
        }
    }

    fn finish(self) -> Result<()> {
        match self {
            Output::Terminal(_) => Ok(()),
            Output::GitHub(sink) => sink.finish(),
        }
    }
}
