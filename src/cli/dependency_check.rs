use colored::Colorize;
use std::process::Command;
use tabled::{Table, Tabled, settings::Style};

use super::settings::settings_exist;

#[derive(Debug, Clone, Copy, PartialEq)]
enum DependencyStatus {
    Installed,
    Missing,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum DependencyType {
    Required,
    Optional,
}

#[derive(Tabled)]
struct DependencyRow {
    #[tabled(rename = "Dependency")]
    name: String,
    #[tabled(rename = "Status")]
    status: String, // Plain text, no ANSI codes
    #[tabled(rename = "Description")]
    description: String,
}

struct Dependency {
    name: String,
    check_command: String,
    check_args: Vec<String>,
    dep_type: DependencyType,
    description: &'static str,
}

impl Dependency {
    fn new(
        name: &str,
        check_command: &str,
        check_args: &[&str],
        dep_type: DependencyType,
        description: &'static str,
    ) -> Self {
        Self {
            name: name.to_string(),
            check_command: check_command.to_string(),
            check_args: check_args.iter().map(|arg| arg.to_string()).collect(),
            dep_type,
            description,
        }
    }

    /// Looks the program up on `PATH` through the shell.
    fn executable(name: &str, dep_type: DependencyType, description: &'static str) -> Self {
        let program = first_word(name);
        Self::new(
            program,
            "sh",
            &["-c", &format!("command -v {}", program)],
            dep_type,
            description,
        )
    }

    fn check_status(&self) -> DependencyStatus {
        check_command(&self.check_command, &self.check_args)
    }

    fn to_row(&self, status: DependencyStatus) -> DependencyRow {
        DependencyRow {
            name: self.name.clone(),
            status: status_text(status, self.dep_type).to_string(),
            description: self.description.to_string(),
        }
    }
}

fn first_word(command: &str) -> &str {
    command.split_whitespace().next().unwrap_or(command)
}

fn status_text(status: DependencyStatus, dep_type: DependencyType) -> &'static str {
    match (status, dep_type) {
        (DependencyStatus::Installed, _) => "✓ OK",
        (DependencyStatus::Missing, DependencyType::Required) => "✗ MISSING",
        (DependencyStatus::Missing, DependencyType::Optional) => "- MISSING",
    }
}

fn check_command(cmd: &str, args: &[String]) -> DependencyStatus {
    Command::new(cmd)
        .args(args)
        .output()
        .map(|output| {
            if output.status.success() {
                DependencyStatus::Installed
            } else {
                DependencyStatus::Missing
            }
        })
        .unwrap_or(DependencyStatus::Missing)
}

// Helper function to colorize table output
fn colorize_table_output(table_str: &str) -> String {
    table_str
        .lines()
        .map(|line| {
            if line.contains("✓ OK") {
                line.replace("✓ OK", &"✓ OK".green().to_string())
            } else if line.contains("✗ MISSING") {
                line.replace("✗ MISSING", &"✗ MISSING".red().to_string())
            } else if line.contains("- MISSING") {
                line.replace("- MISSING", &"- MISSING".yellow().to_string())
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn dependencies(agent_command: Option<&str>, diff_cover_command: &str) -> Vec<Dependency> {
    let mut dependencies = vec![Dependency::new(
        "sh",
        "sh",
        &["-c", "true"],
        DependencyType::Required,
        "Runs test and agent commands",
    )];
    match agent_command {
        Some(agent_command) => dependencies.push(Dependency::executable(
            agent_command,
            DependencyType::Required,
            "Agent command",
        )),
        None => dependencies.push(Dependency::new(
            "agent_command",
            "false",
            &[],
            DependencyType::Required,
            "Not configured, pass --agent-command",
        )),
    }
    dependencies.push(Dependency::executable(
        "git",
        DependencyType::Optional,
        "Needed for --diff-coverage",
    ));
    dependencies.push(Dependency::executable(
        diff_cover_command,
        DependencyType::Optional,
        "Needed for --diff-coverage",
    ));
    dependencies
}

/// Returns whether every required dependency is available.
pub fn check_dependencies(agent_command: Option<&str>, diff_cover_command: &str) -> bool {
    println!("\n{}\n", "covagent Dependency Check".bold());

    let mut all_required_installed = true;
    let mut rows = Vec::new();

    for dep in dependencies(agent_command, diff_cover_command) {
        let status = dep.check_status();
        if status == DependencyStatus::Missing && dep.dep_type == DependencyType::Required {
            all_required_installed = false;
        }
        rows.push(dep.to_row(status));
    }

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{}", colorize_table_output(&table.to_string()));

    // Configuration
    println!("\n{}", "Configuration".bold());
    let config_status = if settings_exist() {
        DependencyStatus::Installed
    } else {
        DependencyStatus::Missing
    };
    let config_rows = vec![DependencyRow {
        name: "~/.covagent/config".to_string(),
        status: status_text(config_status, DependencyType::Optional).to_string(),
        description: "Settings file, create it with `covagent config`".to_string(),
    }];

    let mut table = Table::new(config_rows);
    table.with(Style::rounded());
    println!("{}", colorize_table_output(&table.to_string()));

    // Summary
    println!();
    if all_required_installed {
        println!("{}", "✓ All required dependencies are installed!".green());
    } else {
        println!(
            "{}",
            "✗ Some required dependencies are missing. Please install them.".red()
        );
    }

    println!("\n{}", "Legend:".bold());
    println!("  {} - Installed", "✓ OK".green());
    println!("  {} - Optional, not installed", "- MISSING".yellow());
    println!("  {} - Required, not installed\n", "✗ MISSING".red());

    all_required_installed
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn agent_command_is_checked_by_program_name() {
        let deps = dependencies(Some("python3 agent.py --model local"), "diff-cover");
        let names: Vec<&str> = deps.iter().map(|dep| dep.name.as_str()).collect();
        assert_eq!(names, vec!["sh", "python3", "git", "diff-cover"]);
        assert_eq!(
            deps[1].check_args,
            vec![String::from("-c"), String::from("command -v python3")]
        );
        assert_eq!(deps[1].dep_type, DependencyType::Required);
        assert_eq!(deps[3].dep_type, DependencyType::Optional);
    }

    #[cfg(unix)]
    #[test]
    fn missing_agent_command_is_reported() {
        let deps = dependencies(None, "diff-cover");
        assert_eq!(deps[1].name, "agent_command");
        assert_eq!(deps[1].check_status(), DependencyStatus::Missing);
        assert_eq!(deps[0].check_status(), DependencyStatus::Installed);
    }

    #[test]
    fn status_text_depends_on_type() {
        assert_eq!(
            status_text(DependencyStatus::Installed, DependencyType::Required),
            "✓ OK"
        );
        assert_eq!(
            status_text(DependencyStatus::Missing, DependencyType::Required),
            "✗ MISSING"
        );
        assert_eq!(
            status_text(DependencyStatus::Missing, DependencyType::Optional),
            "- MISSING"
        );
    }
}
