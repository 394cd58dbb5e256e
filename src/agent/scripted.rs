use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
};

use crate::errors::CovError;

use super::{
    AdaptCommandRequest, AgentCompletion, Completion, FailureRequest, GeneratedTests,
    GenerationRequest, InsertLines, SuiteIndentation, SuiteRequest,
};

/// In-memory agent with canned answers.
pub struct ScriptedAgent {
    pub indentation: usize,
    /// Number of indentation calls that fail before one succeeds.
    pub indentation_failures: Cell<usize>,
    pub insert_lines: InsertLines,
    /// `None` makes failure analysis return an error.
    pub failure_explanation: Option<String>,
    pub generated: RefCell<VecDeque<GeneratedTests>>,
    pub adapted_command: Option<String>,
    pub generation_requests: RefCell<Vec<GenerationRequest>>,
}

impl ScriptedAgent {
    pub fn new(indentation: usize, test_line: usize, import_line: usize) -> Self {
        Self {
            indentation,
            indentation_failures: Cell::new(0),
            insert_lines: InsertLines {
                language: String::from("python"),
                testing_framework: String::from("pytest"),
                number_of_tests: 1,
                relevant_line_number_to_insert_tests_after: test_line,
                relevant_line_number_to_insert_imports_after: import_line,
            },
            failure_explanation: Some(String::from("assertion failed")),
            generated: RefCell::new(VecDeque::new()),
            adapted_command: None,
            generation_requests: RefCell::new(vec![]),
        }
    }

    fn tokens<T>(content: T) -> Completion<T> {
        Completion {
            content,
            input_tokens: 10,
            output_tokens: 5,
        }
    }
}

impl AgentCompletion for ScriptedAgent {
    fn analyze_suite_indentation(
        &self,
        _request: &SuiteRequest,
    ) -> Result<Completion<SuiteIndentation>, CovError> {
        let failures = self.indentation_failures.get();
        if failures > 0 {
            self.indentation_failures.set(failures - 1);
            return Err(CovError::AgentError(String::from("malformed response")));
        }
        Ok(Self::tokens(SuiteIndentation {
            test_headers_indentation: self.indentation,
        }))
    }

    fn analyze_insert_lines(
        &self,
        _request: &SuiteRequest,
    ) -> Result<Completion<InsertLines>, CovError> {
        Ok(Self::tokens(self.insert_lines.clone()))
    }

    fn analyze_test_failure(&self, _request: &FailureRequest) -> Result<Completion<String>, CovError> {
        self.failure_explanation
            .clone()
            .map(Self::tokens)
            .ok_or_else(|| CovError::AgentError(String::from("agent unavailable")))
    }

    fn generate_tests(
        &self,
        request: &GenerationRequest,
    ) -> Result<Completion<GeneratedTests>, CovError> {
        self.generation_requests.borrow_mut().push(request.clone());
        Ok(Self::tokens(
            self.generated.borrow_mut().pop_front().unwrap_or_default(),
        ))
    }

    fn adapt_test_command(
        &self,
        _request: &AdaptCommandRequest,
    ) -> Result<Completion<String>, CovError> {
        self.adapted_command
            .clone()
            .map(Self::tokens)
            .ok_or_else(|| CovError::AgentError(String::from("cannot adapt command")))
    }
}
