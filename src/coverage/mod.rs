use std::{collections::HashMap, fmt::Display, path::Path, str::FromStr};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::CovError;

pub mod cobertura;
pub mod diff_cover;
pub mod freshness;
pub mod jacoco;
pub mod lcov;
pub mod processor;
mod xml;

use processor::create_processor;

pub fn coverage_ratio(covered: usize, missed: usize) -> f64 {
    let total = covered + missed;
    if total == 0 {
        0.0
    } else {
        covered as f64 / total as f64
    }
}

/// `0.66666` -> `66.67`
pub fn as_percent(ratio: f64) -> f64 {
    (ratio * 10000.0).round() / 100.0
}

/// Coverage of a single reporting unit: a file, or a package and class pair,
/// depending on the report format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageData {
    pub is_target_file: bool,
    pub covered_lines: Vec<u32>,
    pub covered: usize,
    pub missed_lines: Vec<u32>,
    pub missed: usize,
    pub coverage: f64,
}

impl CoverageData {
    pub fn from_lines(is_target_file: bool, covered_lines: Vec<u32>, missed_lines: Vec<u32>) -> Self {
        let covered = covered_lines.len();
        let missed = missed_lines.len();
        Self {
            is_target_file,
            covered_lines,
            covered,
            missed_lines,
            missed,
            coverage: coverage_ratio(covered, missed),
        }
    }

    /// For formats that only report line counts.
    pub fn from_counts(is_target_file: bool, covered: usize, missed: usize) -> Self {
        Self {
            is_target_file,
            covered_lines: vec![],
            covered,
            missed_lines: vec![],
            missed,
            coverage: coverage_ratio(covered, missed),
        }
    }

    pub fn empty(is_target_file: bool) -> Self {
        Self::from_counts(is_target_file, 0, 0)
    }

    pub fn merge(&self, other: &CoverageData) -> Self {
        let mut covered_lines = self.covered_lines.clone();
        covered_lines.extend(other.covered_lines.iter().copied());
        let mut missed_lines = self.missed_lines.clone();
        missed_lines.extend(other.missed_lines.iter().copied());
        let covered = self.covered + other.covered;
        let missed = self.missed + other.missed;
        Self {
            is_target_file: self.is_target_file || other.is_target_file,
            covered_lines,
            covered,
            missed_lines,
            missed,
            coverage: coverage_ratio(covered, missed),
        }
    }
}

/// Aggregate result of processing one coverage report.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CoverageReport {
    pub total_coverage: f64,
    pub file_coverage: HashMap<String, CoverageData>,
}

impl CoverageReport {
    pub fn new(file_coverage: HashMap<String, CoverageData>) -> Self {
        let covered: usize = file_coverage.values().map(|data| data.covered).sum();
        let missed: usize = file_coverage.values().map(|data| data.missed).sum();
        Self {
            total_coverage: coverage_ratio(covered, missed),
            file_coverage,
        }
    }

    /// Keeps only the units describing the file under test. The total is
    /// recomputed over the kept units.
    pub fn filter_to_target_coverage(&self) -> Self {
        Self::new(
            self.file_coverage
                .iter()
                .filter(|(_, data)| data.is_target_file)
                .map(|(unit, data)| (unit.clone(), data.clone()))
                .collect(),
        )
    }

    pub fn file_percentages(&self) -> HashMap<String, f64> {
        self.file_coverage
            .iter()
            .map(|(unit, data)| (unit.clone(), coverage_ratio(data.covered, data.missed)))
            .collect()
    }

    pub fn covered(&self) -> usize {
        self.file_coverage.values().map(|data| data.covered).sum()
    }

    pub fn missed(&self) -> usize {
        self.file_coverage.values().map(|data| data.missed).sum()
    }

    pub fn missed_lines(&self) -> Vec<u32> {
        let mut lines: Vec<u32> = self
            .file_coverage
            .values()
            .flat_map(|data| data.missed_lines.iter().copied())
            .collect();
        lines.sort_unstable();
        lines.dedup();
        lines
    }

    pub fn covered_lines(&self) -> Vec<u32> {
        let mut lines: Vec<u32> = self
            .file_coverage
            .values()
            .flat_map(|data| data.covered_lines.iter().copied())
            .collect();
        lines.sort_unstable();
        lines.dedup();
        lines
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageTool {
    Cobertura,
    Lcov,
    Jacoco,
    DiffCoverJson,
}

impl FromStr for CoverageTool {
    type Err = CovError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cobertura" => Ok(CoverageTool::Cobertura),
            "lcov" => Ok(CoverageTool::Lcov),
            "jacoco" => Ok(CoverageTool::Jacoco),
            "diff_cover_json" => Ok(CoverageTool::DiffCoverJson),
            _ => Err(CovError::UnsupportedCoverageTool(s.to_string())),
        }
    }
}

impl Display for CoverageTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CoverageTool::Cobertura => "cobertura",
            CoverageTool::Lcov => "lcov",
            CoverageTool::Jacoco => "jacoco",
            CoverageTool::DiffCoverJson => "diff_cover_json",
        };
        write!(f, "{}", name)
    }
}

/// Parses the report written by the most recent test run.
///
/// Fails if the report is missing or older than `time_of_test_command`. When
/// `is_global` is false only the units matching `src_file_path` are kept.
pub fn process_coverage(
    tool_type: &str,
    time_of_test_command: u128,
    report_path: &Path,
    src_file_path: &str,
    is_global: bool,
    diff_report_path: Option<&Path>,
) -> Result<CoverageReport, CovError> {
    let processor = create_processor(tool_type, report_path, src_file_path, diff_report_path)?;
    let report = processor.process_coverage_report(time_of_test_command)?;
    debug!(
        processor = processor.name(),
        units = report.file_coverage.len(),
        total_coverage = report.total_coverage,
        "processed coverage report"
    );
    if is_global {
        Ok(report)
    } else {
        Ok(report.filter_to_target_coverage())
    }
}
