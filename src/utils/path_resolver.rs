use crate::errors::CovError;
use std::path::{Component, Path};

pub fn get_relative_path(parent: &Path, full_path: &Path) -> Result<String, CovError> {
    let relative_path = full_path
        .strip_prefix(parent)
        .map(|path| path.to_str())
        .map_err(|e| {
            CovError::GeneralParsingError(format!(
                "Could not strip prefix {} from {}: {}",
                parent.display(),
                full_path.display(),
                e
            ))
        })?
        .ok_or(CovError::GeneralParsingError(format!(
            "File path could not be parsed: {}",
            full_path.display()
        )))?;

    Ok(relative_path.to_string())
}

/// Path relative to the current working directory when `path` lives below it,
/// otherwise `path` unchanged.
pub fn relative_to_current_dir(path: &Path) -> String {
    if path.is_absolute() {
        if let Ok(current_dir) = std::env::current_dir() {
            if let Ok(relative) = get_relative_path(&current_dir, path) {
                return relative;
            }
        }
    }
    path.to_string_lossy().to_string()
}

pub fn path_components(path: &str) -> Vec<String> {
    Path::new(path)
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().to_string()),
            _ => None,
        })
        .collect()
}

/// True when one path is a trailing component suffix of the other, so
/// `src/app/main.py` matches `project/src/app/main.py` and vice versa.
pub fn trailing_components_match(left: &str, right: &str) -> bool {
    let left = path_components(left);
    let right = path_components(right);
    if left.is_empty() || right.is_empty() {
        return false;
    }
    left.ends_with(&right) || right.ends_with(&left)
}
