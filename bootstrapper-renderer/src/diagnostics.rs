//! Error messages with source excerpts.

use std::error::Error as StdError;

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::RenderError;
use crate::input_formatter::TemplateInputFormatter;

/// Output of the zero policy for a field that could not be resolved.
pub const NO_VALUE: &str = "<no value>";

const SOURCE_LINES_BEFORE: usize = 5;
const SOURCE_LINES_AFTER: usize = 5;
/// Width of the `N:` prefix in front of each source line.
const SOURCE_INDENTATION: usize = 6;
const CARET: &str = "\u{02c6}≈≈≈≈≈≈≈";

/// Excerpt of `source` around `error_line` (1-based) with a caret under
/// `error_column` (0-based).
pub fn create_source_snippet(error_line: usize, error_column: usize, source: &[&str]) -> String {
    let error_idx = error_line.saturating_sub(1);
    let first = error_idx.saturating_sub(SOURCE_LINES_BEFORE);
    let last = (error_idx + SOURCE_LINES_AFTER + 1).min(source.len());

    let mut out = String::new();
    for (idx, line) in source.iter().enumerate().take(last).skip(first) {
        let number = (idx + 1).to_string();
        let pad = SOURCE_INDENTATION.saturating_sub(number.len() + 1);
        let prefix = format!("{number}:{}", " ".repeat(pad));
        out.push_str(&prefix);
        out.push_str(line);
        out.push('\n');
        if idx == error_idx {
            out.push_str(&" ".repeat(error_column + prefix.len()));
            out.push_str(CARET);
            out.push('\n');
        }
    }
    out
}

/// Error text followed by the source excerpt and the formatted input.
pub(crate) fn template_error(
    name: &str,
    err: &str,
    location: Option<(usize, usize)>,
    source: &str,
    input: &Map<String, Value>,
    formatter: &TemplateInputFormatter,
) -> RenderError {
    let mut message = err.to_string();
    if let Some((line, column)) = location {
        let lines: Vec<&str> = source.split('\n').collect();
        message.push_str("\ntemplate source:\n");
        message.push_str(&create_source_snippet(line, column, &lines));
    }
    message.push_str("\ntemplate input:\n");
    message.push_str(&formatter.format(input, "\t"));
    RenderError::Template { name: name.to_string(), message }
}

/// Every `<no value>` in `rendered` as `(line, column)`.
pub fn find_no_value(rendered: &str) -> Vec<(usize, usize)> {
    rendered
        .split('\n')
        .enumerate()
        .flat_map(|(idx, line)| line.match_indices(NO_VALUE).map(move |(col, _)| (idx + 1, col)))
        .collect()
}

pub(crate) fn no_value_error(
    name: &str,
    rendered: &str,
    input: Option<&Map<String, Value>>,
    formatter: &TemplateInputFormatter,
) -> Option<RenderError> {
    let occurrences = find_no_value(rendered);
    if occurrences.is_empty() {
        return None;
    }

    let mut message = format!("template {name:?} contains fields with {NO_VALUE:?}:");
    for (line, column) in &occurrences {
        message.push_str(&format!("\n\tline {line}:{column}"));
    }
    if let Some(input) = input {
        message.push_str("\ntemplate input:\n");
        message.push_str(&formatter.format(input, "\t"));
    }
    Some(RenderError::NoValue { name: name.to_string(), occurrences, message })
}

// ---------------------------------------------------------------------------
// Tera error inspection
// ---------------------------------------------------------------------------

/// The error and all of its sources joined with `: `.
pub(crate) fn error_chain(err: &tera::Error) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = err.source();
    while let Some(inner) = source {
        parts.push(inner.to_string());
        source = inner.source();
    }
    parts.join(": ")
}

/// `(line, column)` of a parse error; the parser reports 1-based columns.
pub(crate) fn parse_error_location(chain: &str) -> Option<(usize, usize)> {
    let re = Regex::new(r"-->\s*(\d+):(\d+)").ok()?;
    let caps = re.captures(chain)?;
    let line = caps[1].parse().ok()?;
    let column: usize = caps[2].parse().ok()?;
    Some((line, column.saturating_sub(1)))
}

/// Dotted path of the variable a render failed on.
pub(crate) fn missing_variable(chain: &str) -> Option<String> {
    let re = Regex::new(r"Variable `([^`]+)` not found in context").ok()?;
    re.captures(chain).map(|caps| caps[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_shows_surrounding_lines_and_caret() {
        let lines: Vec<String> = (0..50).map(|i| format!("val{i}: {i}")).collect();
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let snippet = create_source_snippet(refs.len() - 1, 7, &refs);
        let expected = "44:   val43: 43\n45:   val44: 44\n46:   val45: 45\n47:   val46: 46\n\
                        48:   val47: 47\n49:   val48: 48\n             \u{02c6}≈≈≈≈≈≈≈\n50:   val49: 49\n";
        assert_eq!(snippet, expected);
    }

    #[test]
    fn snippet_on_first_line() {
        let snippet = create_source_snippet(1, 3, &["{{ .missingKey }}"]);
        assert_eq!(snippet, "1:    {{ .missingKey }}\n         \u{02c6}≈≈≈≈≈≈≈\n");
    }

    #[test]
    fn no_value_positions() {
        assert_eq!(find_no_value("name: <no value>"), vec![(1, 6)]);
        assert_eq!(find_no_value("prefix <no value> suffix"), vec![(1, 7)]);
        assert_eq!(
            find_no_value("name: <no value>\nnamespace: <no value>"),
            vec![(1, 6), (2, 11)]
        );
        assert!(find_no_value("").is_empty());
    }

    #[test]
    fn no_value_message_lists_each_occurrence() {
        let formatter = TemplateInputFormatter::new(true, Vec::<String>::new());
        let rendered = "line1: value\nline2: <no value>\nline3: another\nline4: <no value>";
        let err = no_value_error("multiline.yaml", rendered, None, &formatter).expect("error");
        let msg = err.to_string();
        assert!(msg.starts_with("template \"multiline.yaml\" contains fields with \"<no value>\""));
        assert!(msg.contains("line 2:7") && msg.contains("line 4:7"), "{msg}");
        assert!(!msg.contains("template input:"));
        assert!(no_value_error("x", "clean", None, &formatter).is_none());
    }

    #[test]
    fn missing_variable_is_extracted() {
        let chain = "Failed to render 'test': Variable `values.missing` not found in context while rendering 'test'";
        assert_eq!(missing_variable(chain).as_deref(), Some("values.missing"));
        assert_eq!(missing_variable("Failed to render 'test': Filter `nope` not found"), None);
    }

    #[test]
    fn parse_location_uses_zero_based_column() {
        let chain = "Failed to parse 'x':  --> 1:4\n  |\n1 | {{ ) }}\n  |    ^---";
        assert_eq!(parse_error_location(chain), Some((1, 3)));
    }
}
