use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::agent::CandidateTest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Pass,
    Fail,
}

impl Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Pass => write!(f, "PASS"),
            Status::Fail => write!(f, "FAIL"),
        }
    }
}

/// Acceptance record of one candidate test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub status: Status,
    pub reason: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub test_code: String,
    pub imports: String,
    pub language: String,
    pub source_file: String,
    pub original_test_file: String,
    pub processed_test_file: String,
    pub coverage_before: f64,
    pub coverage_after: f64,
    pub test: CandidateTest,
}

impl ValidationResult {
    pub fn passed(&self) -> bool {
        self.status == Status::Pass
    }
}
