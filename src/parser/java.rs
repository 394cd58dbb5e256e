use regex::Regex;

use crate::errors::CovError;

use super::{IdentityExtractor, Language, SourceIdentity, first_matches};

const PACKAGE_PATTERN: &str = r"^\s*package\s+([\w.]+)\s*;.*$";
const CLASS_PATTERN: &str =
    r"^\s*public\s+(?:(?:abstract|final|static|sealed|strictfp)\s+)*(?:class|record|enum|interface)\s+(\w+)";

#[derive(Debug, Default)]
pub struct JavaIdentityExtractor;

impl IdentityExtractor for JavaIdentityExtractor {
    fn extract_identity(&self, source_text: &str) -> Result<SourceIdentity, CovError> {
        let package_pattern = Regex::new(PACKAGE_PATTERN)?;
        let class_pattern = Regex::new(CLASS_PATTERN)?;
        Ok(first_matches(source_text, &package_pattern, &class_pattern))
    }

    fn language(&self) -> Language {
        Language::Java
    }
}
