/// Parser for the LCOV `.info` format.
///
/// Reference: https://ltp.sourceforge.net/coverage/lcov/geninfo.1.php
///
/// Records used:
///   SF:<path to source file>
///   DA:<line number>,<execution count>[,<checksum>]
///   LF:<lines found>
///   LH:<lines hit>
///   end_of_record
///
/// Everything else (TN, FN, FNDA, BRDA, ...) is skipped.
use crate::error::{GateError, Result};
use crate::parsers::{LineTally, ParsedFile, Parser};

pub struct LcovParser;

impl Parser for LcovParser {
    fn parse(&self, input: &[u8]) -> Result<Vec<ParsedFile>> {
        parse_lcov(input)
    }
}

/// Summary counts for the current section, used when a section has LF/LH
/// but no DA lines.
#[derive(Default)]
struct Summary {
    found: Option<u64>,
    hit: Option<u64>,
    saw_da: bool,
}

fn parse_lcov(input: &[u8]) -> Result<Vec<ParsedFile>> {
    let text = std::str::from_utf8(input)
        .map_err(|e| GateError::Parse(format!("Invalid UTF-8 in LCOV data: {e}")))?;

    let mut tally = LineTally::default();
    let mut summaries: Vec<(String, u64, u64)> = Vec::new();
    let mut current_file: Option<String> = None;
    let mut summary = Summary::default();

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        if line == "end_of_record" {
            if let Some(path) = current_file.take() {
                finish_section(&path, &summary, &mut summaries);
            }
            summary = Summary::default();
            continue;
        }

        let (tag, value) = match line.split_once(':') {
            Some(pair) => pair,
            None => continue,
        };

        match tag {
            "SF" => {
                tally.touch(value);
                current_file = Some(value.to_string());
                summary = Summary::default();
            }
            "DA" => {
                // Negative counts mark non-instrumentable lines in some tools.
                if let Some(path) = current_file.as_deref() {
                    let parts: Vec<&str> = value.splitn(3, ',').collect();
                    if parts.len() >= 2 {
                        if let Ok(line_number) = parts[0].parse::<u32>() {
                            if let Ok(count) = parts[1].parse::<i64>() {
                                if count >= 0 {
                                    tally.hit(path, line_number, count as u64);
                                    summary.saw_da = true;
                                }
                            }
                        }
                    }
                }
            }
            "LF" => summary.found = value.parse().ok(),
            "LH" => summary.hit = value.parse().ok(),
            _ => {}
        }
    }

    if let Some(path) = current_file.take() {
        finish_section(&path, &summary, &mut summaries);
    }

    let mut files = tally.into_files();
    for (path, hit, found) in summaries {
        if let Some(file) = files.iter_mut().find(|f| f.record.path == path) {
            if file.record.lines_testable == 0 {
                file.record.lines_tested = hit.min(found);
                file.record.lines_testable = found;
            }
        }
    }
    Ok(files)
}

fn finish_section(path: &str, summary: &Summary, summaries: &mut Vec<(String, u64, u64)>) {
    if summary.saw_da {
        return;
    }
    if let Some(found) = summary.found {
        summaries.push((path.to_string(), summary.hit.unwrap_or(0), found));
    }
}
