use colored::Colorize;
use tabled::{Table, Tabled, settings::Style};

use crate::{
    coverage::as_percent,
    validator::result::{Status, ValidationResult},
};

#[derive(Tabled)]
struct ResultRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Test")]
    test_name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Before")]
    coverage_before: String,
    #[tabled(rename = "After")]
    coverage_after: String,
    #[tabled(rename = "Reason")]
    reason: String,
}

fn first_line(text: &str) -> String {
    text.lines().next().unwrap_or_default().to_string()
}

impl ResultRow {
    fn new(index: usize, result: &ValidationResult) -> Self {
        let test_name = if result.test.test_name.is_empty() {
            first_line(result.test_code.trim())
        } else {
            result.test.test_name.clone()
        };
        Self {
            index,
            test_name,
            status: result.status.to_string(),
            coverage_before: format!("{}%", as_percent(result.coverage_before)),
            coverage_after: format!("{}%", as_percent(result.coverage_after)),
            reason: first_line(&result.reason),
        }
    }
}

fn colorize_table_output(table: &str) -> String {
    table
        .lines()
        .map(|line| {
            if line.contains(" PASS ") {
                line.replace(" PASS ", &format!(" {} ", "PASS".green()))
            } else if line.contains(" FAIL ") {
                line.replace(" FAIL ", &format!(" {} ", "FAIL".red()))
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn results_table(results: &[ValidationResult]) -> String {
    let rows: Vec<ResultRow> = results
        .iter()
        .enumerate()
        .map(|(index, result)| ResultRow::new(index + 1, result))
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    table.to_string()
}

pub fn print_results(results: &[ValidationResult]) {
    if results.is_empty() {
        println!("{}", "No candidate tests were validated.".yellow());
        return;
    }
    let passed = results
        .iter()
        .filter(|result| result.status == Status::Pass)
        .count();
    println!("\n{}", "Validated tests".bold());
    println!("{}", colorize_table_output(&results_table(results)));
    println!(
        "{} passed, {} failed\n",
        passed.to_string().green(),
        (results.len() - passed).to_string().red()
    );
}

pub fn print_coverage(current_coverage: f64, desired_coverage: f64, diff_coverage: bool) {
    let label = if diff_coverage {
        "Current Diff Coverage"
    } else {
        "Current Coverage"
    };
    let current = format!("{}%", as_percent(current_coverage));
    let current = if current_coverage >= desired_coverage / 100.0 {
        current.green()
    } else {
        current.yellow()
    };
    println!("{}: {}", label.bold(), current);
    println!("{}: {}%", "Desired Coverage".bold(), desired_coverage);
}
