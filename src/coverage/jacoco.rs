use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use quick_xml::{
    Reader,
    events::{BytesStart, Event},
};
use serde::Deserialize;

use crate::{
    errors::CovError,
    parser::{SourceIdentity, extractor_for, file_extension},
};

use super::{
    CoverageData,
    processor::CoverageProcessor,
    xml::{attribute, required_attribute},
};

/// JaCoCo XML or CSV reports. Neither carries source paths, so the target
/// unit is found by the package and class declared in the source file.
pub struct JacocoProcessor {
    report_path: PathBuf,
    src_file_path: String,
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "PACKAGE")]
    package: String,
    #[serde(rename = "CLASS")]
    class: String,
    #[serde(rename = "LINE_MISSED")]
    line_missed: usize,
    #[serde(rename = "LINE_COVERED")]
    line_covered: usize,
}

struct ClassEntry {
    name: String,
    line_counter: Option<(usize, usize)>,
}

impl JacocoProcessor {
    pub fn new(report_path: &Path, src_file_path: &str) -> Self {
        Self {
            report_path: report_path.to_path_buf(),
            src_file_path: src_file_path.to_string(),
        }
    }

    fn source_identity(&self) -> Result<SourceIdentity, CovError> {
        let source_path = Path::new(&self.src_file_path);
        let source_text = fs::read_to_string(source_path)?;
        extractor_for(source_path).extract_identity(&source_text)
    }

    fn open_class(element: &BytesStart<'_>) -> Result<ClassEntry, CovError> {
        Ok(ClassEntry {
            name: required_attribute(element, b"name")?,
            line_counter: None,
        })
    }

    /// `(missed, covered)` for `type="LINE"` counters, `None` for the rest.
    fn line_counter(element: &BytesStart<'_>) -> Result<Option<(usize, usize)>, CovError> {
        if attribute(element, b"type")?.as_deref() != Some("LINE") {
            return Ok(None);
        }
        let missed = required_attribute(element, b"missed")?.trim().parse::<usize>()?;
        let covered = required_attribute(element, b"covered")?.trim().parse::<usize>()?;
        Ok(Some((missed, covered)))
    }

    fn close_class(
        class: ClassEntry,
        target_path: &str,
        coverage: &mut HashMap<String, CoverageData>,
    ) {
        let (missed, covered) = class.line_counter.unwrap_or((0, 0));
        let is_target_file = !target_path.is_empty() && class.name == target_path;
        let data = CoverageData::from_counts(is_target_file, covered, missed);
        let unit = class.name.replace('/', ".");
        let merged = match coverage.get(&unit) {
            Some(existing) => existing.merge(&data),
            None => data,
        };
        coverage.insert(unit, merged);
    }

    pub fn parse_xml(
        &self,
        content: &str,
        identity: &SourceIdentity,
    ) -> Result<HashMap<String, CoverageData>, CovError> {
        let target_path = identity.as_path();
        let mut reader = Reader::from_str(content);
        reader.config_mut().trim_text(true);

        let mut coverage = HashMap::new();
        let mut class: Option<ClassEntry> = None;
        // method counters are subsets of the class counter
        let mut in_method = false;

        loop {
            match reader.read_event()? {
                Event::Start(element) => match element.name().as_ref() {
                    b"class" => class = Some(Self::open_class(&element)?),
                    b"method" => in_method = true,
                    _ => {}
                },
                Event::Empty(element) => match element.name().as_ref() {
                    b"class" => {
                        Self::close_class(Self::open_class(&element)?, &target_path, &mut coverage)
                    }
                    b"counter" if !in_method => {
                        if let Some(entry) = class.as_mut() {
                            if let Some(counts) = Self::line_counter(&element)? {
                                entry.line_counter = Some(counts);
                            }
                        }
                    }
                    _ => {}
                },
                Event::End(element) => match element.name().as_ref() {
                    b"class" => {
                        if let Some(entry) = class.take() {
                            Self::close_class(entry, &target_path, &mut coverage);
                        }
                    }
                    b"method" => in_method = false,
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
        }
        Ok(coverage)
    }

    pub fn parse_csv(
        &self,
        identity: &SourceIdentity,
    ) -> Result<HashMap<String, CoverageData>, CovError> {
        let target_path = identity.as_path();
        let mut reader = csv::Reader::from_path(&self.report_path)?;
        let mut coverage: HashMap<String, CoverageData> = HashMap::new();
        for row in reader.deserialize() {
            let row: CsvRow = row?;
            let row_identity = SourceIdentity {
                package: row.package,
                class: row.class,
            };
            let is_target_file = !target_path.is_empty() && row_identity.as_path() == target_path;
            let unit = if row_identity.package.is_empty() {
                row_identity.class.clone()
            } else {
                format!("{}.{}", row_identity.package, row_identity.class)
            };
            let data = CoverageData::from_counts(is_target_file, row.line_covered, row.line_missed);
            let merged = match coverage.get(&unit) {
                Some(existing) => existing.merge(&data),
                None => data,
            };
            coverage.insert(unit, merged);
        }
        Ok(coverage)
    }
}

impl CoverageProcessor for JacocoProcessor {
    fn report_path(&self) -> &Path {
        &self.report_path
    }

    fn parse_coverage_report(&self) -> Result<HashMap<String, CoverageData>, CovError> {
        let identity = self.source_identity()?;
        match file_extension(&self.report_path).as_str() {
            "xml" => {
                let content = fs::read_to_string(&self.report_path)?;
                self.parse_xml(&content, &identity)
            }
            "csv" => self.parse_csv(&identity),
            extension => Err(CovError::UnsupportedReportFormat(extension.to_string())),
        }
    }

    fn name(&self) -> &'static str {
        "jacoco"
    }
}
