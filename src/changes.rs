/// Change-set resolution: which coverage records belong to files that the
/// current change adds or modifies.
///
/// A [`ChangeSource`] reports the added and modified paths (stdin diff,
/// git, or a GitHub pull request). [`ChangeSetResolver`] intersects those
/// paths with a [`CoverageIndex`]. The VCS snapshot and each of the three
/// views are memoized inside the index, so they live exactly as long as it
/// does.
use std::cell::OnceCell;
use std::collections::HashSet;
use std::process::Command;

use anyhow::{Context, Result};
use tracing::debug;

use crate::github;
use crate::index::CoverageIndex;
use crate::model::CoverageRecord;

// ---------------------------------------------------------------------------
// Change sources
// ---------------------------------------------------------------------------

/// Reports the files touched by the change under review. `None` means the
/// source has nothing to say, which counts as an empty list.
pub trait ChangeSource {
    fn modified_files(&self) -> Result<Option<Vec<String>>>;
    fn added_files(&self) -> Result<Option<Vec<String>>>;
}

/// Explicit lists, e.g. from the command line.
#[derive(Debug, Clone, Default)]
pub struct StaticChanges {
    pub modified: Option<Vec<String>>,
    pub added: Option<Vec<String>>,
}

impl StaticChanges {
    pub fn new(modified: Vec<String>, added: Vec<String>) -> Self {
        Self {
            modified: Some(modified),
            added: Some(added),
        }
    }
}

impl ChangeSource for StaticChanges {
    fn modified_files(&self) -> Result<Option<Vec<String>>> {
        Ok(self.modified.clone())
    }

    fn added_files(&self) -> Result<Option<Vec<String>>> {
        Ok(self.added.clone())
    }
}

/// Added and modified paths, in first-seen order without duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileChanges {
    pub modified: Vec<String>,
    pub added: Vec<String>,
}

impl FileChanges {
    fn push_modified(&mut self, path: &str) {
        if !self.modified.iter().any(|p| p == path) {
            self.modified.push(path.to_string());
        }
    }

    fn push_added(&mut self, path: &str) {
        if !self.added.iter().any(|p| p == path) {
            self.added.push(path.to_string());
        }
    }
}

/// Changes from `git diff --name-status <args>`.
pub struct GitChanges {
    /// Arguments to pass to `git diff`, e.g. "origin/main...HEAD".
    pub args: String,
    output: OnceCell<FileChanges>,
}

impl GitChanges {
    pub fn new(args: impl Into<String>) -> Self {
        Self {
            args: args.into(),
            output: OnceCell::new(),
        }
    }

    fn changes(&self) -> Result<&FileChanges> {
        if let Some(changes) = self.output.get() {
            return Ok(changes);
        }

        let diff_args: Vec<&str> = self.args.split_whitespace().collect();
        let output = Command::new("git")
            .arg("diff")
            .arg("--name-status")
            .args(&diff_args)
            .output()
            .context("Failed to run git diff")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("git diff failed: {stderr}");
        }

        let text = String::from_utf8(output.stdout).context("git diff output not valid UTF-8")?;
        let changes = parse_name_status(&text);
        debug!(
            modified = changes.modified.len(),
            added = changes.added.len(),
            "read git changes"
        );
        Ok(self.output.get_or_init(|| changes))
    }
}

impl ChangeSource for GitChanges {
    fn modified_files(&self) -> Result<Option<Vec<String>>> {
        Ok(Some(self.changes()?.modified.clone()))
    }

    fn added_files(&self) -> Result<Option<Vec<String>>> {
        Ok(Some(self.changes()?.added.clone()))
    }
}

/// Changes read from the file headers of a unified diff.
#[derive(Debug, Clone, Default)]
pub struct DiffChanges {
    pub changes: FileChanges,
}

impl DiffChanges {
    pub fn from_text(diff_text: &str) -> Self {
        Self {
            changes: classify_diff(diff_text),
        }
    }

    pub fn from_stdin() -> Result<Self> {
        let text =
            std::io::read_to_string(std::io::stdin()).context("Failed to read diff from stdin")?;
        Ok(Self::from_text(&text))
    }

    /// Fetch the diff of the pull request described by `context`.
    pub fn from_github(context: &github::Context) -> Result<Self> {
        let text = context.fetch_diff()?;
        Ok(Self::from_text(&text))
    }
}

impl ChangeSource for DiffChanges {
    fn modified_files(&self) -> Result<Option<Vec<String>>> {
        Ok(Some(self.changes.modified.clone()))
    }

    fn added_files(&self) -> Result<Option<Vec<String>>> {
        Ok(Some(self.changes.added.clone()))
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse `git diff --name-status` output.
///
/// `A` is added. `M`, `T`, and the destination of `R`/`C` are modified.
/// Deleted files have no coverage and are dropped.
pub fn parse_name_status(text: &str) -> FileChanges {
    let mut changes = FileChanges::default();
    for line in text.lines() {
        let mut fields = line.split('\t');
        let status = match fields.next() {
            Some(s) if !s.is_empty() => s,
            _ => continue,
        };
        let paths: Vec<&str> = fields.filter(|p| !p.is_empty()).collect();
        let Some(path) = paths.last() else {
            continue;
        };
        match status.as_bytes()[0] {
            b'A' => changes.push_added(path),
            b'M' | b'T' | b'R' | b'C' => changes.push_modified(path),
            _ => {}
        }
    }
    changes
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileChange {
    Added,
    Modified,
    Deleted,
}

/// Classify files in a unified diff by their headers. Hunk bodies are
/// skipped using the line counts from each `@@` header, so removed lines
/// that happen to start with `--` are not mistaken for headers.
pub fn classify_diff(diff_text: &str) -> FileChanges {
    let mut changes = FileChanges::default();
    let mut pending: Option<(String, FileChange)> = None;
    let mut old_header: Option<String> = None;
    let mut old_remaining: u32 = 0;
    let mut new_remaining: u32 = 0;

    let flush = |pending: &mut Option<(String, FileChange)>, changes: &mut FileChanges| {
        match pending.take() {
            Some((path, FileChange::Added)) => changes.push_added(&path),
            Some((path, FileChange::Modified)) => changes.push_modified(&path),
            Some((_, FileChange::Deleted)) | None => {}
        }
    };

    for line in diff_text.lines() {
        if old_remaining > 0 || new_remaining > 0 {
            match line.as_bytes().first() {
                Some(b'+') => new_remaining = new_remaining.saturating_sub(1),
                Some(b'-') => old_remaining = old_remaining.saturating_sub(1),
                // "\ No newline at end of file" is metadata.
                Some(b'\\') => {}
                _ => {
                    old_remaining = old_remaining.saturating_sub(1);
                    new_remaining = new_remaining.saturating_sub(1);
                }
            }
            continue;
        }

        if let Some(rest) = line.strip_prefix("diff --git ") {
            flush(&mut pending, &mut changes);
            // "a/<old> b/<new>": take the new side.
            if let Some(idx) = rest.find(" b/") {
                pending = Some((rest[idx + 3..].to_string(), FileChange::Modified));
            }
        } else if line.starts_with("new file mode") {
            if let Some((_, kind)) = pending.as_mut() {
                *kind = FileChange::Added;
            }
        } else if line.starts_with("deleted file mode") {
            if let Some((_, kind)) = pending.as_mut() {
                *kind = FileChange::Deleted;
            }
        } else if let Some(rest) = line.strip_prefix("--- ") {
            old_header = Some(header_path(rest).to_string());
        } else if let Some(rest) = line.strip_prefix("+++ ") {
            let new_path = header_path(rest);
            let kind = if new_path == "/dev/null" {
                FileChange::Deleted
            } else if old_header.as_deref() == Some("/dev/null") {
                FileChange::Added
            } else {
                FileChange::Modified
            };
            let path = if kind == FileChange::Deleted {
                old_header.clone().unwrap_or_default()
            } else {
                new_path.to_string()
            };
            // A plain `diff -u` has no "diff --git" line between files.
            if pending.as_ref().is_some_and(|(p, _)| *p != path) {
                flush(&mut pending, &mut changes);
            }
            pending = Some((path, kind));
            old_header = None;
        } else if line.starts_with("@@ ") {
            if let Some((old, new)) = parse_hunk_counts(line) {
                old_remaining = old;
                new_remaining = new;
            }
        }
    }
    flush(&mut pending, &mut changes);

    changes
}

/// Strip "a/" or "b/" and any trailing tab-separated timestamp.
fn header_path(rest: &str) -> &str {
    let rest = rest.split('\t').next().unwrap_or(rest);
    rest.strip_prefix("b/")
        .or_else(|| rest.strip_prefix("a/"))
        .unwrap_or(rest)
}

/// Line counts from a hunk header like "@@ -10,5 +20,8 @@". A missing
/// count means 1.
fn parse_hunk_counts(line: &str) -> Option<(u32, u32)> {
    let after_at = line.strip_prefix("@@ ")?;
    let parts: Vec<&str> = after_at.split(' ').collect();
    if parts.len() < 2 {
        return None;
    }
    let count = |range: &str| -> Option<u32> {
        match range.split_once(',') {
            Some((_, n)) => n.parse().ok(),
            None => Some(1),
        }
    };
    let old = count(parts[0].strip_prefix('-')?)?;
    let new = count(parts[1].strip_prefix('+')?)?;
    Some((old, new))
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Memo slots for one index: the VCS snapshot plus one slot per view.
/// Views hold positions into the index's records.
#[derive(Debug, Default)]
pub struct ChangeSetCache {
    modified: OnceCell<HashSet<String>>,
    added: OnceCell<HashSet<String>>,
    added_or_modified: OnceCell<Vec<usize>>,
    modified_only: OnceCell<Vec<usize>>,
    added_only: OnceCell<Vec<usize>>,
}

fn get_or_try_init<T>(cell: &OnceCell<T>, init: impl FnOnce() -> Result<T>) -> Result<&T> {
    if let Some(value) = cell.get() {
        return Ok(value);
    }
    let value = init()?;
    Ok(cell.get_or_init(|| value))
}

/// Intersects a coverage index with the change under review.
pub struct ChangeSetResolver<'a> {
    index: &'a CoverageIndex,
    source: &'a dyn ChangeSource,
}

impl<'a> ChangeSetResolver<'a> {
    pub fn new(index: &'a CoverageIndex, source: &'a dyn ChangeSource) -> Self {
        Self { index, source }
    }

    /// Records whose path is either added or modified. A path reported as
    /// both shows up once.
    pub fn added_or_modified(&self) -> Result<Vec<&'a CoverageRecord>> {
        let cache = &self.index.changes;
        let positions = get_or_try_init(&cache.added_or_modified, || {
            let modified = self.modified_set()?;
            let added = self.added_set()?;
            Ok(self.positions(|path| modified.contains(path) || added.contains(path)))
        })?;
        Ok(self.pick(positions))
    }

    /// Records whose path the source reports as modified. Computed from the
    /// modified list alone, so a path also reported as added still counts.
    pub fn modified_only(&self) -> Result<Vec<&'a CoverageRecord>> {
        let cache = &self.index.changes;
        let positions = get_or_try_init(&cache.modified_only, || {
            let modified = self.modified_set()?;
            Ok(self.positions(|path| modified.contains(path)))
        })?;
        Ok(self.pick(positions))
    }

    /// Records whose path the source reports as added.
    pub fn added_only(&self) -> Result<Vec<&'a CoverageRecord>> {
        let cache = &self.index.changes;
        let positions = get_or_try_init(&cache.added_only, || {
            let added = self.added_set()?;
            Ok(self.positions(|path| added.contains(path)))
        })?;
        Ok(self.pick(positions))
    }

    fn modified_set(&self) -> Result<&'a HashSet<String>> {
        get_or_try_init(&self.index.changes.modified, || {
            let files = self.source.modified_files()?.unwrap_or_default();
            debug!(count = files.len(), "fetched modified files");
            Ok(files.into_iter().collect())
        })
    }

    fn added_set(&self) -> Result<&'a HashSet<String>> {
        get_or_try_init(&self.index.changes.added, || {
            let files = self.source.added_files()?.unwrap_or_default();
            debug!(count = files.len(), "fetched added files");
            Ok(files.into_iter().collect())
        })
    }

    fn positions(&self, keep: impl Fn(&str) -> bool) -> Vec<usize> {
        self.index
            .records()
            .iter()
            .enumerate()
            .filter(|(_, r)| keep(&r.path))
            .map(|(i, _)| i)
            .collect()
    }

    fn pick(&self, positions: &[usize]) -> Vec<&'a CoverageRecord> {
        let records = self.index.records();
        positions.iter().filter_map(|&i| records.get(i)).collect()
    }
}
