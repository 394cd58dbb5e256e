use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use tracing::debug;

use crate::{
    errors::CovError,
    utils::path_resolver::{relative_to_current_dir, trailing_components_match},
};

use super::{CoverageData, processor::CoverageProcessor};

#[derive(Debug, Default, Deserialize)]
struct DiffCoverReport {
    #[serde(default)]
    src_stats: HashMap<String, FileStats>,
}

#[derive(Debug, Default, Deserialize)]
struct FileStats {
    #[serde(default)]
    covered_lines: Vec<u32>,
    #[serde(default)]
    violation_lines: Vec<u32>,
    #[serde(default)]
    percent_covered: Option<f64>,
}

/// Reads a `diff-cover --json-report` file. The single resulting unit is keyed
/// by the coverage report path and is always the target.
pub struct DiffCoverProcessor {
    diff_report_path: PathBuf,
    report_path: PathBuf,
    src_file_path: String,
}

impl DiffCoverProcessor {
    pub fn new(diff_report_path: &Path, report_path: &Path, src_file_path: &str) -> Self {
        Self {
            diff_report_path: diff_report_path.to_path_buf(),
            report_path: report_path.to_path_buf(),
            src_file_path: src_file_path.to_string(),
        }
    }

    pub fn parse_content(&self, content: &str) -> Result<HashMap<String, CoverageData>, CovError> {
        let report: DiffCoverReport = serde_json::from_str(content)?;
        let src_relative_path = relative_to_current_dir(Path::new(&self.src_file_path));

        let matched = report
            .src_stats
            .iter()
            .find(|(path, _)| trailing_components_match(path, &src_relative_path));

        let data = match matched {
            Some((path, stats)) => {
                debug!(diff_path = %path, "matched source file in diff coverage report");
                let mut data = CoverageData::from_lines(
                    true,
                    stats.covered_lines.clone(),
                    stats.violation_lines.clone(),
                );
                if let Some(percent) = stats.percent_covered {
                    data.coverage = percent / 100.0;
                }
                data
            }
            // files outside the diff have nothing to cover
            None => CoverageData::empty(true),
        };
        Ok(HashMap::from([(self.report_path.display().to_string(), data)]))
    }
}

impl CoverageProcessor for DiffCoverProcessor {
    fn report_path(&self) -> &Path {
        &self.report_path
    }

    fn parse_coverage_report(&self) -> Result<HashMap<String, CoverageData>, CovError> {
        let content = fs::read_to_string(&self.diff_report_path)?;
        self.parse_content(&content)
    }

    fn name(&self) -> &'static str {
        "diff_cover_json"
    }
}
