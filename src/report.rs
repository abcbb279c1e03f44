//! Markdown rendering of coverage numbers. Pure string construction.

use std::fmt::Write;

use crate::error::Result;
use crate::index::CoverageIndex;
use crate::model::CoverageRecord;

const FOOTER: &str = "<sub>Generated by covgate</sub>\n";

/// Format a percentage with `precision` decimals, or `n/a` when undefined.
#[must_use]
pub fn format_percentage(value: Option<f64>, precision: usize) -> String {
    match value {
        Some(v) => format!("{v:.precision$}%"),
        None => "n/a".to_string(),
    }
}

/// Bold line with the project-wide total.
pub fn total_coverage_heading(index: &CoverageIndex, precision: usize) -> Result<String> {
    let total = index.total_coverage()?;
    Ok(format!(
        "**Total coverage: {}**\n",
        format_percentage(Some(total), precision)
    ))
}

/// `File | Coverage` table, or an empty string for an empty view.
#[must_use]
pub fn modified_files_table(view: &[&CoverageRecord], precision: usize) -> String {
    if view.is_empty() {
        return String::new();
    }

    let mut md = String::new();
    md.push_str("| File | Coverage |\n");
    md.push_str("|:-----|---------:|\n");
    for record in view {
        let path = &record.path;
        let pct = format_percentage(record.percentage(), precision);
        writeln!(md, "| `{path}` | {pct} |").unwrap();
    }
    md
}

/// Scheme header, total heading, changed-files table and footer.
pub fn full_report(
    index: &CoverageIndex,
    view: &[&CoverageRecord],
    scheme: &str,
    precision: usize,
) -> Result<String> {
    let mut md = String::new();
    writeln!(md, "### Code coverage for {scheme}\n").unwrap();
    md.push_str(&total_coverage_heading(index, precision)?);

    let table = modified_files_table(view, precision);
    if !table.is_empty() {
        md.push('\n');
        md.push_str(&table);
    }

    md.push('\n');
    md.push_str(FOOTER);
    Ok(md)
}
