use std::{fmt::Display, path::Path};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::CovError;

pub mod java;
pub mod kotlin;

use java::JavaIdentityExtractor;
use kotlin::KotlinIdentityExtractor;

/// Package and primary class declared by a source file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceIdentity {
    pub package: String,
    pub class: String,
}

impl SourceIdentity {
    /// `com.example` + `Foo` -> `com/example/Foo`
    pub fn as_path(&self) -> String {
        if self.package.is_empty() {
            self.class.clone()
        } else {
            format!("{}/{}", self.package.replace('.', "/"), self.class)
        }
    }
}

pub trait IdentityExtractor {
    fn extract_identity(&self, source_text: &str) -> Result<SourceIdentity, CovError>;
    fn language(&self) -> Language;
}

pub fn file_extension(path: &Path) -> String {
    path.extension()
        .map(|extension| extension.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

pub fn extractor_for(source_path: &Path) -> Box<dyn IdentityExtractor> {
    match file_extension(source_path).as_str() {
        "java" => Box::new(JavaIdentityExtractor::default()),
        "kt" | "kts" => Box::new(KotlinIdentityExtractor::default()),
        extension => {
            warn!(
                extension,
                "unsupported bytecode language, falling back to Java package/class extraction"
            );
            Box::new(JavaIdentityExtractor::default())
        }
    }
}

/// Scans line by line and keeps the first package and the first class match.
pub(crate) fn first_matches(
    source_text: &str,
    package_pattern: &regex::Regex,
    class_pattern: &regex::Regex,
) -> SourceIdentity {
    let mut identity = SourceIdentity::default();
    for line in source_text.lines() {
        if identity.package.is_empty() {
            if let Some(captures) = package_pattern.captures(line) {
                identity.package = captures[1].to_string();
            }
        }
        if identity.class.is_empty() {
            if let Some(captures) = class_pattern.captures(line) {
                identity.class = captures[1].to_string();
            }
        }
        if !identity.package.is_empty() && !identity.class.is_empty() {
            break;
        }
    }
    identity
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Java,
    Kotlin,
    JavaScript,
    TypeScript,
    Go,
    Rust,
    Ruby,
    CSharp,
    Cpp,
    C,
    Unknown,
}

impl Language {
    pub fn from_path(path: &Path) -> Self {
        match file_extension(path).as_str() {
            "py" => Language::Python,
            "java" => Language::Java,
            "kt" | "kts" => Language::Kotlin,
            "js" | "jsx" | "mjs" | "cjs" => Language::JavaScript,
            "ts" | "tsx" => Language::TypeScript,
            "go" => Language::Go,
            "rs" => Language::Rust,
            "rb" => Language::Ruby,
            "cs" => Language::CSharp,
            "cpp" | "cc" | "cxx" | "hpp" => Language::Cpp,
            "c" | "h" => Language::C,
            _ => Language::Unknown,
        }
    }
}

impl Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Language::Python => "python",
            Language::Java => "java",
            Language::Kotlin => "kotlin",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Go => "go",
            Language::Rust => "rust",
            Language::Ruby => "ruby",
            Language::CSharp => "csharp",
            Language::Cpp => "cpp",
            Language::C => "c",
            Language::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn identity_path_joins_package_and_class() {
        let identity = SourceIdentity {
            package: String::from("com.example.app"),
            class: String::from("Calculator"),
        };
        assert_eq!(identity.as_path(), "com/example/app/Calculator");

        let default_package = SourceIdentity {
            package: String::new(),
            class: String::from("Calculator"),
        };
        assert_eq!(default_package.as_path(), "Calculator");
    }

    #[test]
    fn extractor_is_chosen_by_extension() {
        assert_eq!(
            extractor_for(Path::new("src/main/java/App.java")).language(),
            Language::Java
        );
        assert_eq!(
            extractor_for(Path::new("src/main/kotlin/App.kt")).language(),
            Language::Kotlin
        );
        assert_eq!(
            extractor_for(Path::new("src/main/scala/App.scala")).language(),
            Language::Java
        );
    }

    #[test]
    fn language_from_path() {
        assert_eq!(Language::from_path(Path::new("app.py")), Language::Python);
        assert_eq!(Language::from_path(Path::new("App.KT")), Language::Kotlin);
        assert_eq!(Language::from_path(Path::new("Makefile")), Language::Unknown);
        assert_eq!(Language::TypeScript.to_string(), "typescript");
    }
}
