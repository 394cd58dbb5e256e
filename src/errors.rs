use std::{
    fmt::Display,
    num::ParseIntError,
    time::SystemTimeError,
};

use quick_xml::events::attributes::AttrError;

#[derive(Debug)]
pub enum CovError {
    IoError(std::io::Error),
    TimeError(SystemTimeError),
    Json(serde_json::Error),
    Regex(regex::Error),
    Xml(quick_xml::Error),
    XmlAttribute(AttrError),
    Csv(csv::Error),
    ParseInt(ParseIntError),
    ReportNotFound(String),
    ReportStale {
        report_path: String,
        modified_ms: u128,
        test_command_ms: u128,
    },
    UnsupportedCoverageTool(String),
    MissingDiffReportPath,
    UnsupportedReportFormat(String),
    GeneralParsingError(String),
    InvalidArgument(String),
    AgentError(String),
    RuntimeError(String),
}

impl std::error::Error for CovError {}

impl Display for CovError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CovError::IoError(io_error) => write!(f, "{}", io_error),
            CovError::TimeError(system_time_error) => write!(f, "{}", system_time_error),
            CovError::Json(error) => write!(f, "{}", error),
            CovError::Regex(error) => write!(f, "{}", error),
            CovError::Xml(error) => write!(f, "{}", error),
            CovError::XmlAttribute(error) => write!(f, "{}", error),
            CovError::Csv(error) => write!(f, "{}", error),
            CovError::ParseInt(error) => write!(f, "{}", error),
            CovError::ReportNotFound(path) => write!(f, "Coverage report \"{}\" not found", path),
            CovError::ReportStale {
                report_path,
                modified_ms,
                test_command_ms,
            } => write!(
                f,
                "Coverage report \"{}\" is outdated (modified at {} ms, test command started at {} ms)",
                report_path, modified_ms, test_command_ms
            ),
            CovError::UnsupportedCoverageTool(tool) => {
                write!(f, "Invalid coverage type specified: {}", tool)
            }
            CovError::MissingDiffReportPath => write!(
                f,
                "A diff coverage report path is required for the diff_cover_json coverage type"
            ),
            CovError::UnsupportedReportFormat(extension) => write!(
                f,
                "Unsupported JaCoCo code coverage report format: {}",
                extension
            ),
            CovError::GeneralParsingError(error) => write!(f, "{}", error),
            CovError::InvalidArgument(error) => write!(f, "{}", error),
            CovError::AgentError(error) => write!(f, "{}", error),
            CovError::RuntimeError(error) => write!(f, "{}", error),
        }
    }
}

impl From<std::io::Error> for CovError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err)
    }
}

impl From<SystemTimeError> for CovError {
    fn from(value: SystemTimeError) -> Self {
        Self::TimeError(value)
    }
}

impl From<serde_json::Error> for CovError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<regex::Error> for CovError {
    fn from(value: regex::Error) -> Self {
        Self::Regex(value)
    }
}

impl From<quick_xml::Error> for CovError {
    fn from(value: quick_xml::Error) -> Self {
        Self::Xml(value)
    }
}

impl From<AttrError> for CovError {
    fn from(value: AttrError) -> Self {
        Self::XmlAttribute(value)
    }
}

impl From<csv::Error> for CovError {
    fn from(value: csv::Error) -> Self {
        Self::Csv(value)
    }
}

impl From<ParseIntError> for CovError {
    fn from(value: ParseIntError) -> Self {
        Self::ParseInt(value)
    }
}
