//! First-line delimiter directive.
//!
//! ```text
//! #?bootstrap {"template": {"delims": {"start": "[[", "end": "]]"}}}
//! ```
//!
//! Without the directive the delimiters are `{{` and `}}`.

use serde::Deserialize;

use crate::error::RenderError;

pub const DIRECTIVE_PREFIX: &str = "#?bootstrap";

const DEFAULT_START: &str = "{{";
const DEFAULT_END: &str = "}}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delimiters {
    pub start: String,
    pub end: String,
}

impl Default for Delimiters {
    fn default() -> Self {
        Self { start: DEFAULT_START.to_string(), end: DEFAULT_END.to_string() }
    }
}

impl Delimiters {
    pub fn is_default(&self) -> bool {
        self.start == DEFAULT_START && self.end == DEFAULT_END
    }
}

#[derive(Deserialize, Default)]
struct Directive {
    #[serde(default)]
    template: DirectiveTemplate,
}

#[derive(Deserialize, Default)]
struct DirectiveTemplate {
    #[serde(default)]
    delims: DirectiveDelims,
}

#[derive(Deserialize, Default)]
struct DirectiveDelims {
    #[serde(default)]
    start: String,
    #[serde(default)]
    end: String,
}

/// Split the directive off `template`.
///
/// When the directive is present the template is trimmed and every line
/// starting with the prefix is dropped. Empty delimiters fall back to the defaults.
pub fn parse_directive(template: &str) -> Result<(String, Delimiters), RenderError> {
    if !template.starts_with(DIRECTIVE_PREFIX) {
        return Ok((template.to_string(), Delimiters::default()));
    }

    let trimmed = template.trim();
    let first_line = trimmed.split('\n').next().unwrap_or_default();
    let json = first_line[DIRECTIVE_PREFIX.len()..].trim();
    if json.is_empty() {
        return Err(RenderError::InvalidDelimiter);
    }
    let directive: Directive = serde_json::from_str(json).map_err(RenderError::UnparsableDelimiter)?;

    let cleaned = trimmed
        .split('\n')
        .filter(|line| !line.trim().starts_with(DIRECTIVE_PREFIX))
        .collect::<Vec<_>>()
        .join("\n");

    let DirectiveDelims { start, end } = directive.template.delims;
    let defaults = Delimiters::default();
    let delimiters = Delimiters {
        start: if start.is_empty() { defaults.start } else { start },
        end: if end.is_empty() { defaults.end } else { end },
    };
    tracing::trace!("template delimiters {} {}", delimiters.start, delimiters.end);
    Ok((cleaned, delimiters))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directive_sets_delimiters_and_is_removed() {
        let (text, delims) = parse_directive(
            "#?bootstrap {\"template\": {\"delims\": {\"start\": \"<<\", \"end\": \">>\"}}}\napiVersion: v1",
        )
        .expect("parse");
        assert_eq!(text, "apiVersion: v1");
        assert_eq!(delims, Delimiters { start: "<<".into(), end: ">>".into() });
    }

    #[test]
    fn template_without_directive_is_untouched() {
        let (text, delims) = parse_directive("apiVersion: v1\nkind: Pod").expect("parse");
        assert_eq!(text, "apiVersion: v1\nkind: Pod");
        assert!(delims.is_default());
    }

    #[test]
    fn indented_directive_is_not_detected() {
        let (text, delims) = parse_directive("  #?bootstrap {}\nx").expect("parse");
        assert_eq!(text, "  #?bootstrap {}\nx");
        assert!(delims.is_default());
    }

    #[test]
    fn directive_without_configuration_is_rejected() {
        let err = parse_directive("#?bootstrap").unwrap_err();
        assert_eq!(err.to_string(), "invalid template delimiter configuration");
    }

    #[test]
    fn directive_with_broken_json_is_rejected() {
        let err = parse_directive("#?bootstrap {\"template\": {\"delims\": {\"start\": \"<<\"}").unwrap_err();
        assert_eq!(err.to_string(), "cannot parse detected template delimiter configuration");
    }

    #[test]
    fn later_directive_lines_are_dropped_too() {
        let (text, _) =
            parse_directive("#?bootstrap {}\na: 1\n  #?bootstrap ignored\nb: 2\n").expect("parse");
        assert_eq!(text, "a: 1\nb: 2");
    }
}
