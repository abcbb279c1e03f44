//! The project identity: everything needed to (re)produce a coverage index
//! for one configured target. Loaded from a JSON file and/or CLI flags.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::detect::Format;
use crate::error::{GateError, Result};

pub const DEFAULT_CONFIG_FILE: &str = "covgate.json";
pub const DEFAULT_DECIMAL_PRECISION: usize = 2;
const MAX_DECIMAL_PRECISION: usize = 10;

/// Where reports end up by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CoverageServiceKind {
    #[default]
    Terminal,
    #[value(name = "github")]
    GitHub,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectIdentity {
    /// Project file path.
    pub project: Option<PathBuf>,
    pub scheme: String,
    pub workspace: Option<PathBuf>,
    /// Where the toolchain left its raw coverage output.
    pub build_directory: Option<PathBuf>,
    /// Where the JSON snapshot is written, if anywhere.
    pub output_directory: Option<PathBuf>,
    /// Forced report format; detected when absent.
    pub input_format: Option<String>,
    /// Explicit report file, relative to `build_directory` unless absolute.
    pub binary_file: Option<PathBuf>,
    /// Targets to keep, for formats that group files by target.
    pub binary_basename: Vec<String>,
    pub decimal_precision: usize,
    /// Glob patterns matched against record paths and file names.
    pub ignore_list: Vec<String>,
    pub ci_service: Option<String>,
    pub coverage_access_token: Option<String>,
    pub coverage_service_kind: CoverageServiceKind,
    /// Prefix stripped from absolute report paths.
    pub source_root: Option<PathBuf>,
}

impl Default for ProjectIdentity {
    fn default() -> Self {
        Self {
            project: None,
            scheme: String::new(),
            workspace: None,
            build_directory: None,
            output_directory: None,
            input_format: None,
            binary_file: None,
            binary_basename: Vec::new(),
            decimal_precision: DEFAULT_DECIMAL_PRECISION,
            ignore_list: Vec::new(),
            ci_service: None,
            coverage_access_token: None,
            coverage_service_kind: CoverageServiceKind::default(),
            source_root: None,
        }
    }
}

impl ProjectIdentity {
    pub fn new(project: impl Into<PathBuf>, scheme: impl Into<String>) -> Self {
        Self {
            project: Some(project.into()),
            scheme: scheme.into(),
            ..Default::default()
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read(path)?;
        serde_json::from_slice(&content).map_err(|e| {
            GateError::ProviderConfig(format!("{}: {}", path.display(), e))
        })
    }

    /// Reject identities no provider could make sense of.
    pub fn validate(&self) -> Result<()> {
        let has_project = self.project.as_ref().is_some_and(|p| !p.as_os_str().is_empty());
        let has_workspace = self.workspace.as_ref().is_some_and(|w| !w.as_os_str().is_empty());
        if !has_project && !has_workspace {
            return Err(GateError::ProviderConfig(
                "either a project or a workspace is required".to_string(),
            ));
        }
        if self.scheme.trim().is_empty() {
            return Err(GateError::ProviderConfig("scheme is required".to_string()));
        }
        if self.decimal_precision > MAX_DECIMAL_PRECISION {
            return Err(GateError::ProviderConfig(format!(
                "decimal precision {} exceeds the maximum of {}",
                self.decimal_precision, MAX_DECIMAL_PRECISION
            )));
        }
        self.format()?;
        Ok(())
    }

    /// The forced input format, if one is configured.
    pub fn format(&self) -> Result<Option<Format>> {
        match self.input_format.as_deref() {
            None | Some("") => Ok(None),
            Some(s) => s
                .parse::<Format>()
                .map(Some)
                .map_err(|e| GateError::ProviderConfig(e.to_string())),
        }
    }

    /// Copy of this identity with the ignore list cleared.
    #[must_use]
    pub fn without_ignore_list(&self) -> Self {
        Self {
            ignore_list: Vec::new(),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_ok() {
        assert!(ProjectIdentity::new("App.xcodeproj", "App").validate().is_ok());

        let workspace_only = ProjectIdentity {
            workspace: Some("App.xcworkspace".into()),
            scheme: "App".to_string(),
            ..Default::default()
        };
        assert!(workspace_only.validate().is_ok());
    }

    #[test]
    fn test_validate_requires_project_or_workspace() {
        let identity = ProjectIdentity {
            scheme: "App".to_string(),
            ..Default::default()
        };
        assert!(matches!(identity.validate(), Err(GateError::ProviderConfig(_))));
    }

    #[test]
    fn test_validate_requires_scheme() {
        let identity = ProjectIdentity::new("App.xcodeproj", "  ");
        assert!(matches!(identity.validate(), Err(GateError::ProviderConfig(_))));
    }

    #[test]
    fn test_validate_rejects_unknown_format() {
        let identity = ProjectIdentity {
            input_format: Some("gcov".to_string()),
            ..ProjectIdentity::new("App.xcodeproj", "App")
        };
        assert!(matches!(identity.validate(), Err(GateError::ProviderConfig(_))));
    }

    #[test]
    fn test_validate_rejects_huge_precision() {
        let identity = ProjectIdentity {
            decimal_precision: 42,
            ..ProjectIdentity::new("App.xcodeproj", "App")
        };
        assert!(identity.validate().is_err());
    }

    #[test]
    fn test_deserialize_defaults() {
        let identity: ProjectIdentity =
            serde_json::from_str(r#"{ "project": "App.xcodeproj", "scheme": "App" }"#).unwrap();
        assert_eq!(identity.decimal_precision, DEFAULT_DECIMAL_PRECISION);
        assert_eq!(identity.coverage_service_kind, CoverageServiceKind::Terminal);
        assert!(identity.ignore_list.is_empty());
    }

    #[test]
    fn test_deserialize_service_kind() {
        let identity: ProjectIdentity = serde_json::from_str(
            r#"{ "scheme": "App", "coverage_service_kind": "github", "ignore_list": ["*Tests.swift"] }"#,
        )
        .unwrap();
        assert_eq!(identity.coverage_service_kind, CoverageServiceKind::GitHub);
        assert_eq!(identity.ignore_list, vec!["*Tests.swift".to_string()]);
    }

    #[test]
    fn test_without_ignore_list() {
        let identity = ProjectIdentity {
            ignore_list: vec!["Generated/*".to_string()],
            ..ProjectIdentity::new("App.xcodeproj", "App")
        };
        let stripped = identity.without_ignore_list();
        assert!(stripped.ignore_list.is_empty());
        assert_eq!(stripped.scheme, "App");
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, r#"{ "workspace": "App.xcworkspace", "scheme": "App" }"#).unwrap();
        let identity = ProjectIdentity::from_file(&path).unwrap();
        assert_eq!(identity.workspace, Some(PathBuf::from("App.xcworkspace")));

        std::fs::write(&path, "[]").unwrap();
        assert!(matches!(
            ProjectIdentity::from_file(&path),
            Err(GateError::ProviderConfig(_))
        ));
    }
}
