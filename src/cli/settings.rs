use std::collections::HashMap;
use std::env;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::str::FromStr;

use home::home_dir;

use crate::errors::CovError;

const DEFAULT_CONFIG: &str = r#"# ==========================
# The config file consists of simple key-value pairs,
# separated by equals signs.

# Spacing around the equals sign does not matter.
# All of these are identical:
# key=value
# key= value
# key =value
# key = value

# Available settings
# desired_coverage=<percentage, 0-100>
# max_iterations=<number>
# max_run_time_sec=<seconds>
# run_tests_multiple_times=<number>
# coverage_type=cobertura | lcov | jacoco | diff_cover_json
# agent_command=<executable receiving agent requests on stdin>
# diff_cover_command=<diff-cover executable>

# Default settings (uncomment and modify as needed)
# desired_coverage=90
# max_iterations=3
# max_run_time_sec=30
# run_tests_multiple_times=1
# coverage_type=cobertura
# diff_cover_command=diff-cover
"#;

/// Values from `~/.covagent/config`, with defaults for missing keys.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub desired_coverage: f64,
    pub max_iterations: usize,
    pub max_run_time_sec: u64,
    pub run_tests_multiple_times: usize,
    pub coverage_type: String,
    pub agent_command: Option<String>,
    pub diff_cover_command: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            desired_coverage: 90.0,
            max_iterations: 3,
            max_run_time_sec: 30,
            run_tests_multiple_times: 1,
            coverage_type: String::from("cobertura"),
            agent_command: None,
            diff_cover_command: String::from("diff-cover"),
        }
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T, CovError> {
    value.parse::<T>().map_err(|_| {
        CovError::InvalidArgument(format!("Invalid value '{}' for setting '{}'", value, key))
    })
}

impl Settings {
    /// Unknown keys are ignored.
    pub fn from_map(config: &HashMap<String, String>) -> Result<Self, CovError> {
        let mut settings = Settings::default();
        for (key, value) in config {
            match key.as_str() {
                "desired_coverage" => {
                    let desired_coverage: f64 = parse_value(key, value)?;
                    if !(0.0..=100.0).contains(&desired_coverage) {
                        return Err(CovError::InvalidArgument(format!(
                            "desired_coverage must be between 0 and 100, got {}",
                            value
                        )));
                    }
                    settings.desired_coverage = desired_coverage;
                }
                "max_iterations" => settings.max_iterations = parse_value(key, value)?,
                "max_run_time_sec" => settings.max_run_time_sec = parse_value(key, value)?,
                "run_tests_multiple_times" => {
                    settings.run_tests_multiple_times = parse_value(key, value)?
                }
                "coverage_type" => settings.coverage_type = value.clone(),
                "agent_command" if !value.is_empty() => {
                    settings.agent_command = Some(value.clone())
                }
                "diff_cover_command" if !value.is_empty() => {
                    settings.diff_cover_command = value.clone()
                }
                _ => {}
            }
        }
        Ok(settings)
    }

    pub fn load() -> Result<Self, CovError> {
        Self::from_map(&load_config()?)
    }
}

fn settings_location() -> Result<PathBuf, CovError> {
    let mut settings_location = home_dir()
        .ok_or_else(|| CovError::RuntimeError(String::from("Could not find home directory")))?;
    settings_location.push(".covagent");
    settings_location.push("config");
    Ok(settings_location)
}

pub fn settings_exist() -> bool {
    settings_location().is_ok_and(|location| location.exists())
}

pub fn update_settings() -> Result<(), CovError> {
    let settings_location = settings_location()?;
    write_default_config(&settings_location)?;
    open_in_editor(&settings_location)?;
    Ok(())
}

fn write_default_config(settings_location: &Path) -> Result<(), CovError> {
    if settings_location.exists() {
        return Ok(());
    }
    if let Some(parent) = settings_location.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(settings_location)?;
    file.write_all(DEFAULT_CONFIG.as_bytes())?;
    Ok(())
}

/// Open a file in the user's preferred editor
fn open_in_editor(path: &Path) -> Result<(), CovError> {
    let editor = env::var("VISUAL")
        .or_else(|_| env::var("EDITOR"))
        .unwrap_or_else(|_| {
            if cfg!(target_os = "windows") {
                "notepad".to_string()
            } else if cfg!(target_os = "macos") {
                "open".to_string()
            } else {
                "vim".to_string()
            }
        });

    let status = Command::new(&editor).arg(path).status().map_err(|e| {
        CovError::RuntimeError(format!("Failed to open editor '{}': {}", editor, e))
    })?;

    if !status.success() {
        return Err(CovError::RuntimeError(format!(
            "Editor '{}' exited with non-zero status",
            editor
        )));
    }

    Ok(())
}

/// Parse the config file and return a HashMap of key-value pairs
fn parse_config(config_path: &Path) -> Result<HashMap<String, String>, CovError> {
    let file = File::open(config_path)?;
    let reader = BufReader::new(file);
    let mut config = HashMap::new();

    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();

        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        if let Some(equals_pos) = trimmed.find('=') {
            let key = trimmed[..equals_pos].trim().to_string();
            let value = trimmed[equals_pos + 1..].trim().to_string();

            if !key.is_empty() {
                config.insert(key, value);
            }
        }
    }

    Ok(config)
}

/// Load config from the default location
pub fn load_config() -> Result<HashMap<String, String>, CovError> {
    let settings_location = settings_location()?;
    if !settings_location.exists() {
        return Ok(HashMap::new());
    }
    parse_config(&settings_location)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::{NamedTempFile, tempdir};

    #[test]
    fn test_parse_config() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "# This is a comment").unwrap();
        writeln!(temp_file, "desired_coverage=80").unwrap();
        writeln!(temp_file, "coverage_type = lcov").unwrap();
        writeln!(temp_file, "  agent_command = my-agent --model local  ").unwrap();
        writeln!(temp_file).unwrap();
        writeln!(temp_file, "# Another comment").unwrap();
        writeln!(temp_file, "max_iterations=5").unwrap();

        let config = parse_config(temp_file.path()).unwrap();

        assert_eq!(config.get("desired_coverage"), Some(&"80".to_string()));
        assert_eq!(config.get("coverage_type"), Some(&"lcov".to_string()));
        assert_eq!(
            config.get("agent_command"),
            Some(&"my-agent --model local".to_string())
        );
        assert_eq!(config.get("max_iterations"), Some(&"5".to_string()));
        assert_eq!(config.len(), 4);

        let settings = Settings::from_map(&config).unwrap();
        assert_eq!(
            settings,
            Settings {
                desired_coverage: 80.0,
                max_iterations: 5,
                coverage_type: String::from("lcov"),
                agent_command: Some(String::from("my-agent --model local")),
                ..Settings::default()
            }
        );
    }

    #[test]
    fn test_empty_config() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "# Only comments").unwrap();
        writeln!(temp_file).unwrap();

        let config = parse_config(temp_file.path()).unwrap();
        assert!(config.is_empty());
        assert_eq!(Settings::from_map(&config).unwrap(), Settings::default());
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let config = HashMap::from([(String::from("preview"), String::from("file"))]);
        assert_eq!(Settings::from_map(&config).unwrap(), Settings::default());
    }

    #[test]
    fn bad_values_are_invalid_arguments() {
        for (key, value) in [
            ("max_iterations", "many"),
            ("desired_coverage", "150"),
            ("max_run_time_sec", "-1"),
        ] {
            let config = HashMap::from([(key.to_string(), value.to_string())]);
            assert!(matches!(
                Settings::from_map(&config),
                Err(CovError::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn default_config_is_written_once() {
        let dir = tempdir().unwrap();
        let location = dir.path().join(".covagent").join("config");
        write_default_config(&location).unwrap();
        assert_eq!(fs::read_to_string(&location).unwrap(), DEFAULT_CONFIG);
        assert!(parse_config(&location).unwrap().is_empty());

        fs::write(&location, "max_iterations=7\n").unwrap();
        write_default_config(&location).unwrap();
        assert_eq!(fs::read_to_string(&location).unwrap(), "max_iterations=7\n");
    }
}
