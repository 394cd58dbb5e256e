/// Result of splicing a candidate into a test file.
#[derive(Debug, Clone, PartialEq)]
pub struct Insertion {
    /// Test code as inserted, re-indented and padded with blank lines.
    pub test_code: String,
    /// Import lines that were not already present in the file.
    pub imports: Vec<String>,
    pub processed_file: String,
}

fn leading_spaces(code: &str) -> usize {
    code.lines()
        .find(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .unwrap_or(0)
}

/// Shifts `test_code` right so its first line sits at `indentation` columns.
/// Code that is already indented deeper is left alone.
pub fn indent_test_code(test_code: &str, indentation: usize) -> String {
    let initial = leading_spaces(test_code);
    let indented = if indentation > initial {
        let prefix = " ".repeat(indentation - initial);
        test_code
            .split('\n')
            .map(|line| {
                if line.trim().is_empty() {
                    line.to_string()
                } else {
                    format!("{}{}", prefix, line)
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    } else {
        test_code.to_string()
    };
    format!("\n{}\n", indented.trim_matches('\n'))
}

fn new_import_lines(original: &str, imports: &str) -> Vec<String> {
    let existing: Vec<&str> = original.lines().map(str::trim).collect();
    imports
        .trim_matches('\n')
        .split('\n')
        .filter(|line| !line.trim().is_empty())
        .filter(|line| !existing.contains(&line.trim()))
        .map(|line| line.to_string())
        .collect()
}

/// Inserts the test after line `test_line` and the imports after line
/// `import_line`. Line numbers are 1-based and clamp to the end of the file.
pub fn splice(
    original: &str,
    test_code: &str,
    imports: &str,
    indentation: usize,
    test_line: usize,
    import_line: usize,
) -> Insertion {
    let test_code = indent_test_code(test_code, indentation);
    let imports = new_import_lines(original, imports);

    let mut lines: Vec<String> = original.split('\n').map(str::to_string).collect();
    let test_at = test_line.min(lines.len());
    lines.splice(test_at..test_at, test_code.split('\n').map(str::to_string));
    let import_at = import_line.min(lines.len());
    lines.splice(import_at..import_at, imports.iter().cloned());

    Insertion {
        test_code,
        imports,
        processed_file: lines.join("\n"),
    }
}
