use serde::{Deserialize, Serialize};

use crate::errors::CovError;

pub mod command;
#[cfg(test)]
pub(crate) mod scripted;

/// Payload of one collaborator call plus the tokens it consumed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion<T> {
    pub content: T,
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
}

impl<T> Completion<T> {
    pub fn new(content: T) -> Self {
        Self {
            content,
            input_tokens: 0,
            output_tokens: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteRequest {
    pub language: String,
    pub test_file_name: String,
    /// Test file content with 1-based line numbers prepended.
    pub test_file_numbered: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteIndentation {
    pub test_headers_indentation: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertLines {
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub testing_framework: String,
    #[serde(default)]
    pub number_of_tests: usize,
    pub relevant_line_number_to_insert_tests_after: usize,
    pub relevant_line_number_to_insert_imports_after: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRequest {
    pub source_file: String,
    pub processed_test_file: String,
    pub stdout: String,
    pub stderr: String,
    pub test_code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedTestRun {
    pub code: CandidateTest,
    pub error_message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub source_file_name: String,
    pub source_file_numbered: String,
    pub test_file_name: String,
    pub test_file: String,
    pub language: String,
    pub testing_framework: String,
    pub coverage_report: String,
    pub failed_test_runs: Vec<FailedTestRun>,
    pub included_files: String,
    pub additional_instructions: String,
}

/// A generated test with the imports it needs.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CandidateTest {
    #[serde(default)]
    pub test_behavior: String,
    #[serde(default)]
    pub test_name: String,
    pub test_code: String,
    #[serde(default)]
    pub new_imports_code: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GeneratedTests {
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub new_tests: Vec<CandidateTest>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptCommandRequest {
    pub test_file_relative_path: String,
    pub test_command: String,
    pub project_root_dir: String,
}

/// Text-analysis collaborator. Test generation, suite analysis and failure
/// explanation are all delegated through this trait.
pub trait AgentCompletion {
    fn analyze_suite_indentation(
        &self,
        request: &SuiteRequest,
    ) -> Result<Completion<SuiteIndentation>, CovError>;

    fn analyze_insert_lines(&self, request: &SuiteRequest)
    -> Result<Completion<InsertLines>, CovError>;

    fn analyze_test_failure(&self, request: &FailureRequest) -> Result<Completion<String>, CovError>;

    fn generate_tests(
        &self,
        request: &GenerationRequest,
    ) -> Result<Completion<GeneratedTests>, CovError>;

    /// Rewrites the test command so it runs only the given test file.
    fn adapt_test_command(
        &self,
        request: &AdaptCommandRequest,
    ) -> Result<Completion<String>, CovError>;
}

pub fn number_lines(content: &str) -> String {
    content
        .split('\n')
        .enumerate()
        .map(|(index, line)| format!("{} {}", index + 1, line))
        .collect::<Vec<_>>()
        .join("\n")
}
