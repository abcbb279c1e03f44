use thiserror::Error;

#[derive(Error, Debug)]
pub enum GateError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unknown coverage format")]
    UnknownFormat,

    #[error("Invalid project configuration: {0}")]
    ProviderConfig(String),

    #[error("No testable lines in {0}")]
    ZeroTestableLines(String),
}

pub type Result<T> = std::result::Result<T, GateError>;
