//! Human readable dump of a template input, used in error messages.

use std::collections::HashSet;
use std::io::Write;

use base64::Engine;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::{Map, Value};

/// Serialized values longer than this are gzipped and base64 encoded.
const MAX_INPUT_SIZE: usize = 1024;

const COMPRESSED_PREFIX: &str = ">gzip>base64>";

#[derive(Debug, Clone, Default)]
pub struct TemplateInputFormatter {
    pretty: bool,
    sensitive_keys: HashSet<String>,
    secret_fields: HashSet<String>,
}

impl TemplateInputFormatter {
    /// `sensitive_keys` are top-level keys whose leaf values are redacted.
    pub fn new<I, S>(pretty: bool, sensitive_keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            pretty,
            sensitive_keys: sensitive_keys.into_iter().map(Into::into).collect(),
            secret_fields: HashSet::new(),
        }
    }

    /// Also redact the value of any map entry named like one of `fields`,
    /// at any depth.
    pub fn with_secret_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.secret_fields.extend(fields.into_iter().map(Into::into));
        self
    }

    /// One `{indent}{key}: {json}` line per top-level key, sorted by key.
    pub fn format(&self, input: &Map<String, Value>, indent: &str) -> String {
        let mut keys: Vec<&String> = input.keys().collect();
        keys.sort();

        let mut out = String::new();
        for key in keys {
            let Some(value) = input.get(key) else { continue };
            let value = if self.sensitive_keys.contains(key) || self.secret_fields.contains(key) {
                redact(value)
            } else {
                self.redact_secret_fields(value)
            };
            out.push_str(&format!("{indent}{key}: {}\n", self.format_value(&value, indent)));
        }
        out
    }

    fn redact_secret_fields(&self, value: &Value) -> Value {
        match value {
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| {
                        let v = if self.secret_fields.contains(k) { redact(v) } else { self.redact_secret_fields(v) };
                        (k.clone(), v)
                    })
                    .collect(),
            ),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.redact_secret_fields(v)).collect()),
            leaf => leaf.clone(),
        }
    }

    fn format_value(&self, value: &Value, indent: &str) -> String {
        let compact = value.to_string();
        if compact.len() > MAX_INPUT_SIZE {
            if let Some(encoded) = compress(&compact) {
                return format!("{COMPRESSED_PREFIX} {encoded}");
            }
        }
        if self.pretty {
            match serde_json::to_string_pretty(value) {
                Ok(pretty) => pretty.replace('\n', &format!("\n{indent}")),
                Err(_) => compact,
            }
        } else {
            compact
        }
    }
}

fn compress(text: &str) -> Option<String> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(text.as_bytes()).ok()?;
    let bytes = encoder.finish().ok()?;
    Some(base64::engine::general_purpose::STANDARD.encode(bytes))
}

/// Replace every leaf with `[...] (<type>)`, keeping the shape.
fn redact(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(map.iter().map(|(k, v)| (k.clone(), redact(v))).collect()),
        Value::Array(items) => Value::Array(items.iter().map(redact).collect()),
        leaf => Value::String(format!("[...] ({})", type_name(leaf))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "<nil>",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float64",
        Value::Number(_) => "int",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "map",
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use flate2::read::GzDecoder;
    use serde_json::json;

    use super::*;

    fn input() -> Map<String, Value> {
        match json!({"myobj": {"myvar": "inner"}, "mystring": "val", "myint": 42}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn compact_lines_per_key() {
        let out = TemplateInputFormatter::new(false, Vec::<String>::new()).format(&input(), "\t");
        assert_eq!(out, "\tmyint: 42\n\tmyobj: {\"myvar\":\"inner\"}\n\tmystring: \"val\"\n");
    }

    #[test]
    fn sensitive_keys_are_redacted_by_type() {
        let out = TemplateInputFormatter::new(false, ["myobj", "myint"]).format(&input(), "\t");
        assert!(out.contains("\tmyobj: {\"myvar\":\"[...] (string)\"}\n"), "{out}");
        assert!(out.contains("\tmystring: \"val\"\n"), "{out}");
        assert!(out.contains("\tmyint: \"[...] (int)\"\n"), "{out}");
    }

    #[test]
    fn secret_fields_are_redacted_at_any_depth() {
        let input = match json!({
            "Values": {"user": {"git": {"password": "hunter2", "username": "bot"}}, "list": [{"token": "t0k"}]},
            "privateKey": "pem",
        }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        let out = TemplateInputFormatter::new(false, Vec::<String>::new())
            .with_secret_fields(["password", "token", "privateKey"])
            .format(&input, "");
        assert!(!out.contains("hunter2") && !out.contains("t0k") && !out.contains("pem"), "{out}");
        assert!(out.contains("\"password\":\"[...] (string)\""), "{out}");
        assert!(out.contains("\"username\":\"bot\""), "{out}");
        assert!(out.contains("privateKey: \"[...] (string)\""), "{out}");
    }

    #[test]
    fn redaction_covers_every_leaf_type() {
        let value = json!({"a": [1.5, true, null]});
        assert_eq!(
            redact(&value),
            json!({"a": ["[...] (float64)", "[...] (bool)", "[...] (<nil>)"]})
        );
    }

    #[test]
    fn pretty_output_is_indented() {
        let out = TemplateInputFormatter::new(true, Vec::<String>::new()).format(&input(), "\t");
        assert!(out.contains("\tmyobj: {\n\t  \"myvar\": \"inner\"\n\t}\n"), "{out}");
    }

    #[test]
    fn large_values_are_compressed() {
        let mut map = Map::new();
        map.insert("large".into(), Value::String("a".repeat(1024)));
        let out = TemplateInputFormatter::new(false, Vec::<String>::new()).format(&map, "");

        let payload = out
            .strip_prefix("large: >gzip>base64> ")
            .and_then(|s| s.strip_suffix('\n'))
            .expect("compressed line");
        let bytes = base64::engine::general_purpose::STANDARD.decode(payload).expect("base64");
        let mut decoded = String::new();
        GzDecoder::new(bytes.as_slice()).read_to_string(&mut decoded).expect("gunzip");
        assert_eq!(decoded, format!("\"{}\"", "a".repeat(1024)));
    }
}
