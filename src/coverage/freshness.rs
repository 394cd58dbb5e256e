use std::path::Path;

use tracing::error;

use crate::{errors::CovError, utils::file::get_file_modification_timestamp};

/// Fails unless the report exists and was written after the test command
/// started, so a leftover report from an earlier run is never parsed.
pub fn ensure_report_is_fresh(report_path: &Path, time_of_test_command: u128) -> Result<(), CovError> {
    if !report_path.exists() {
        error!(report = %report_path.display(), "coverage report not found");
        return Err(CovError::ReportNotFound(report_path.display().to_string()));
    }
    let modified_ms = get_file_modification_timestamp(report_path)?;
    if modified_ms < time_of_test_command {
        error!(
            report = %report_path.display(),
            modified_ms = modified_ms as u64,
            test_command_ms = time_of_test_command as u64,
            "coverage report is outdated"
        );
        return Err(CovError::ReportStale {
            report_path: report_path.display().to_string(),
            modified_ms,
            test_command_ms: time_of_test_command,
        });
    }
    Ok(())
}
