use std::{collections::HashMap, path::Path, str::FromStr};

use crate::errors::CovError;

use super::{
    CoverageData, CoverageReport, CoverageTool, cobertura::CoberturaProcessor,
    diff_cover::DiffCoverProcessor, freshness::ensure_report_is_fresh, jacoco::JacocoProcessor,
    lcov::LcovProcessor,
};

/// One implementation per report format.
pub trait CoverageProcessor {
    /// Report whose freshness gates parsing.
    fn report_path(&self) -> &Path;

    fn parse_coverage_report(&self) -> Result<HashMap<String, CoverageData>, CovError>;

    fn name(&self) -> &'static str;

    fn process_coverage_report(&self, time_of_test_command: u128) -> Result<CoverageReport, CovError> {
        ensure_report_is_fresh(self.report_path(), time_of_test_command)?;
        Ok(CoverageReport::new(self.parse_coverage_report()?))
    }
}

pub fn create_processor(
    tool_type: &str,
    report_path: &Path,
    src_file_path: &str,
    diff_report_path: Option<&Path>,
) -> Result<Box<dyn CoverageProcessor>, CovError> {
    let processor: Box<dyn CoverageProcessor> = match CoverageTool::from_str(tool_type)? {
        CoverageTool::Cobertura => Box::new(CoberturaProcessor::new(report_path, src_file_path)),
        CoverageTool::Lcov => Box::new(LcovProcessor::new(report_path, src_file_path)),
        CoverageTool::Jacoco => Box::new(JacocoProcessor::new(report_path, src_file_path)),
        CoverageTool::DiffCoverJson => {
            let diff_report_path = diff_report_path.ok_or(CovError::MissingDiffReportPath)?;
            Box::new(DiffCoverProcessor::new(
                diff_report_path,
                report_path,
                src_file_path,
            ))
        }
    };
    Ok(processor)
}
