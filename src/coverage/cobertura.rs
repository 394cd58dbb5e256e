use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use quick_xml::{
    Reader,
    events::{BytesStart, Event},
};

use crate::errors::CovError;

use super::{
    CoverageData,
    processor::CoverageProcessor,
    xml::{attribute, required_attribute},
};

const DEFAULT_PACKAGE: &str = "default";

/// Cobertura XML: `package > class > lines > line`. Units are keyed
/// `{package}.{class}`.
pub struct CoberturaProcessor {
    report_path: PathBuf,
    src_file_path: String,
}

struct ClassEntry {
    identity: String,
    filename: Option<String>,
    covered_lines: Vec<u32>,
    missed_lines: Vec<u32>,
}

impl CoberturaProcessor {
    pub fn new(report_path: &Path, src_file_path: &str) -> Self {
        Self {
            report_path: report_path.to_path_buf(),
            src_file_path: src_file_path.to_string(),
        }
    }

    fn open_class(
        &self,
        element: &BytesStart<'_>,
        package: Option<&str>,
    ) -> Result<Option<ClassEntry>, CovError> {
        let filename = attribute(element, b"filename")?;
        let Some(class_name) = attribute(element, b"name")?.or_else(|| filename.clone()) else {
            return Ok(None);
        };
        let package = package
            .filter(|package| !package.is_empty() && *package != ".")
            .unwrap_or(DEFAULT_PACKAGE);
        Ok(Some(ClassEntry {
            identity: format!("{}.{}", package, class_name),
            filename,
            covered_lines: vec![],
            missed_lines: vec![],
        }))
    }

    fn record_line(element: &BytesStart<'_>, class: Option<&mut ClassEntry>) -> Result<(), CovError> {
        let Some(class) = class else {
            return Ok(());
        };
        let number = required_attribute(element, b"number")?.trim().parse::<u32>()?;
        let hits = required_attribute(element, b"hits")?.trim().parse::<u64>()?;
        if hits > 0 {
            class.covered_lines.push(number);
        } else {
            class.missed_lines.push(number);
        }
        Ok(())
    }

    fn close_class(&self, class: ClassEntry, coverage: &mut HashMap<String, CoverageData>) {
        let is_target_file = class
            .filename
            .as_deref()
            .is_some_and(|filename| !filename.is_empty() && self.src_file_path.ends_with(filename));
        let data = CoverageData::from_lines(is_target_file, class.covered_lines, class.missed_lines);
        let merged = match coverage.get(&class.identity) {
            Some(existing) => existing.merge(&data),
            None => data,
        };
        coverage.insert(class.identity, merged);
    }

    pub fn parse_content(&self, content: &str) -> Result<HashMap<String, CoverageData>, CovError> {
        let mut reader = Reader::from_str(content);
        reader.config_mut().trim_text(true);

        let mut coverage = HashMap::new();
        let mut package: Option<String> = None;
        let mut class: Option<ClassEntry> = None;
        // per-method line listings repeat the class level lines
        let mut in_methods = false;

        loop {
            match reader.read_event()? {
                Event::Start(element) => match element.name().as_ref() {
                    b"package" => package = attribute(&element, b"name")?,
                    b"class" => class = self.open_class(&element, package.as_deref())?,
                    b"methods" => in_methods = true,
                    b"line" if !in_methods => Self::record_line(&element, class.as_mut())?,
                    _ => {}
                },
                Event::Empty(element) => match element.name().as_ref() {
                    b"class" => {
                        if let Some(entry) = self.open_class(&element, package.as_deref())? {
                            self.close_class(entry, &mut coverage);
                        }
                    }
                    b"line" if !in_methods => Self::record_line(&element, class.as_mut())?,
                    _ => {}
                },
                Event::End(element) => match element.name().as_ref() {
                    b"package" => package = None,
                    b"class" => {
                        if let Some(entry) = class.take() {
                            self.close_class(entry, &mut coverage);
                        }
                    }
                    b"methods" => in_methods = false,
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
        }
        Ok(coverage)
    }
}

impl CoverageProcessor for CoberturaProcessor {
    fn report_path(&self) -> &Path {
        &self.report_path
    }

    fn parse_coverage_report(&self) -> Result<HashMap<String, CoverageData>, CovError> {
        let content = fs::read_to_string(&self.report_path)?;
        self.parse_content(&content)
    }

    fn name(&self) -> &'static str {
        "cobertura"
    }
}
