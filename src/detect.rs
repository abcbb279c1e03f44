/// Auto-detection of coverage report formats.
///
/// Strategy:
///   1. Check file extension for strong hints
///   2. Peek at the first bytes of the file content
///   3. Fall back to the configured `input_format` (handled by caller)
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::GateError;

/// Report formats the file provider understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Cobertura,
    Json,
    Lcov,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Cobertura => "cobertura",
            Format::Json => "json",
            Format::Lcov => "lcov",
        }
    }
}

impl std::str::FromStr for Format {
    type Err = GateError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cobertura" => Ok(Format::Cobertura),
            "json" => Ok(Format::Json),
            "lcov" => Ok(Format::Lcov),
            _ => Err(GateError::Parse(format!(
                "Unknown format: '{}'. Supported: cobertura, json, lcov",
                s
            ))),
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detect the report format from filename and file content.
pub fn detect_format(path: &Path, content: &[u8]) -> Option<Format> {
    if let Some(fmt) = detect_by_extension(path) {
        return Some(fmt);
    }

    detect_by_content(content)
}

fn detect_by_extension(path: &Path) -> Option<Format> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    match ext.as_str() {
        "info" | "lcov" => Some(Format::Lcov),
        "json" => Some(Format::Json),
        // Could be any XML report; look inside.
        "xml" => None,
        _ => None,
    }
}

fn detect_by_content(content: &[u8]) -> Option<Format> {
    let head_len = content.len().min(4096);
    let head = String::from_utf8_lossy(&content[..head_len]);

    // LCOV: require the tags at line starts, not just anywhere in the text.
    let has_sf = head.lines().any(|l| l.starts_with("SF:"));
    let has_da = head.lines().any(|l| l.starts_with("DA:") || l.starts_with("LF:"));
    if has_sf && has_da {
        return Some(Format::Lcov);
    }

    let trimmed = head.trim_start();
    if (head.contains("<?xml") || trimmed.starts_with('<')) && head.contains("<coverage") {
        return Some(Format::Cobertura);
    }

    if trimmed.starts_with('{') && head.contains("\"targets\"") {
        return Some(Format::Json);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_lcov_by_extension() {
        assert_eq!(detect_format(Path::new("coverage.info"), b""), Some(Format::Lcov));
        assert_eq!(detect_format(Path::new("coverage.lcov"), b""), Some(Format::Lcov));
    }

    #[test]
    fn test_detect_lcov_by_content() {
        let content = b"TN:test\nSF:Sources/A.swift\nDA:1,5\nend_of_record\n";
        assert_eq!(detect_format(Path::new("coverage.txt"), content), Some(Format::Lcov));
    }

    #[test]
    fn test_detect_cobertura_by_content() {
        let content = b"<?xml version=\"1.0\"?>\n<coverage version=\"1.0\">";
        assert_eq!(detect_format(Path::new("coverage.xml"), content), Some(Format::Cobertura));
    }

    #[test]
    fn test_detect_json_by_content() {
        let content = br#"{ "targets": [] }"#;
        assert_eq!(detect_format(Path::new("report"), content), Some(Format::Json));
    }

    #[test]
    fn test_detect_unknown() {
        assert_eq!(detect_format(Path::new("random.dat"), b"hello world"), None);
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("LCOV".parse::<Format>().unwrap(), Format::Lcov);
        assert!("gcov".parse::<Format>().is_err());
    }
}
