use regex::Regex;

use crate::errors::CovError;

use super::{IdentityExtractor, Language, SourceIdentity, first_matches};

// Kotlin allows an optional semicolon and a trailing comment after the package.
const PACKAGE_PATTERN: &str = r"^\s*package\s+([\w.]+)\s*;?\s*(?://.*)?$";
const CLASS_PATTERN: &str = r"^\s*(?:(?:public|internal|abstract|data|sealed|enum|open|final|private|protected|inner|value)\s+)*class\s+(\w+)";

#[derive(Debug, Default)]
pub struct KotlinIdentityExtractor;

impl IdentityExtractor for KotlinIdentityExtractor {
    fn extract_identity(&self, source_text: &str) -> Result<SourceIdentity, CovError> {
        let package_pattern = Regex::new(PACKAGE_PATTERN)?;
        let class_pattern = Regex::new(CLASS_PATTERN)?;
        Ok(first_matches(source_text, &package_pattern, &class_pattern))
    }

    fn language(&self) -> Language {
        Language::Kotlin
    }
}
