use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use crate::errors::CovError;

use super::{CoverageData, processor::CoverageProcessor};

/// LCOV tracefiles: `SF:` opens a record, `DA:<line>,<hits>` adds a line and
/// `end_of_record` closes it.
pub struct LcovProcessor {
    report_path: PathBuf,
    src_file_path: String,
}

struct Record {
    filename: String,
    covered_lines: Vec<u32>,
    missed_lines: Vec<u32>,
}

impl LcovProcessor {
    pub fn new(report_path: &Path, src_file_path: &str) -> Self {
        Self {
            report_path: report_path.to_path_buf(),
            src_file_path: src_file_path.to_string(),
        }
    }

    fn flush(&self, record: Record, coverage: &mut HashMap<String, CoverageData>) {
        let is_target_file = record.filename == self.src_file_path;
        let data = CoverageData::from_lines(is_target_file, record.covered_lines, record.missed_lines);
        let merged = match coverage.get(&record.filename) {
            Some(existing) => existing.merge(&data),
            None => data,
        };
        coverage.insert(record.filename, merged);
    }

    pub fn parse_content(&self, content: &str) -> Result<HashMap<String, CoverageData>, CovError> {
        let mut coverage = HashMap::new();
        let mut current: Option<Record> = None;

        for (index, line) in content.lines().enumerate() {
            let line = line.trim();
            if let Some(filename) = line.strip_prefix("SF:") {
                // a record without end_of_record is closed by the next one
                if let Some(record) = current.take() {
                    self.flush(record, &mut coverage);
                }
                current = Some(Record {
                    filename: filename.to_string(),
                    covered_lines: vec![],
                    missed_lines: vec![],
                });
            } else if let Some(entry) = line.strip_prefix("DA:") {
                let Some(record) = current.as_mut() else {
                    continue;
                };
                let (line_number, hits) = parse_line_entry(entry).ok_or_else(|| {
                    CovError::GeneralParsingError(format!(
                        "Malformed LCOV entry on line {} of {}: {}",
                        index + 1,
                        self.report_path.display(),
                        line
                    ))
                })?;
                if hits > 0 {
                    record.covered_lines.push(line_number);
                } else {
                    record.missed_lines.push(line_number);
                }
            } else if line.starts_with("end_of_record") {
                if let Some(record) = current.take() {
                    self.flush(record, &mut coverage);
                }
            }
        }
        if let Some(record) = current.take() {
            self.flush(record, &mut coverage);
        }
        Ok(coverage)
    }
}

/// `DA:<line>,<hits>[,<checksum>]`
fn parse_line_entry(entry: &str) -> Option<(u32, i64)> {
    let mut parts = entry.split(',');
    let line_number = parts.next()?.trim().parse::<u32>().ok()?;
    let hits = parts.next()?.trim().parse::<i64>().ok()?;
    Some((line_number, hits))
}

impl CoverageProcessor for LcovProcessor {
    fn report_path(&self) -> &Path {
        &self.report_path
    }

    fn parse_coverage_report(&self) -> Result<HashMap<String, CoverageData>, CovError> {
        let content = fs::read_to_string(&self.report_path)?;
        self.parse_content(&content)
    }

    fn name(&self) -> &'static str {
        "lcov"
    }
}
