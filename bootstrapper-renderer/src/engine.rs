//! Tera rendering engine.
//!
//! A fresh [`Tera`] instance is built for every render so that the delimiter
//! directive, the helper library and the resolver binding apply to exactly one
//! template. Output is never HTML-escaped.

use std::sync::Arc;

use bootstrapper_ocm::ComponentResolver;
use serde_json::{Map, Value};
use tera::{Context, Tera};

use crate::delimiter::parse_directive;
use crate::diagnostics::{
    error_chain, missing_variable, no_value_error, parse_error_location, template_error, NO_VALUE,
};
use crate::error::RenderError;
use crate::functions;
use crate::input_formatter::TemplateInputFormatter;
use crate::translate::{translate, Translation};

/// What happens when a template references a field the input does not have.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MissingKey {
    /// Abort the render.
    #[default]
    Error,
    /// Render nothing for the field.
    Ignore,
    /// Render `<no value>` and report every occurrence afterwards.
    Zero,
}

#[derive(Debug, Clone)]
pub struct TemplateEngine {
    missing_key: MissingKey,
    formatter: TemplateInputFormatter,
    resolver: Option<Arc<ComponentResolver>>,
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine {
    /// Engine with the error policy, a pretty input dump and no resolver.
    pub fn new() -> Self {
        Self {
            missing_key: MissingKey::Error,
            formatter: TemplateInputFormatter::new(true, Vec::<String>::new()),
            resolver: None,
        }
    }

    pub fn with_missing_key(mut self, missing_key: MissingKey) -> Self {
        self.missing_key = missing_key;
        self
    }

    pub fn with_input_formatter(mut self, formatter: TemplateInputFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    /// Make the component graph helpers available to templates.
    pub fn with_resolver(mut self, resolver: Arc<ComponentResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn missing_key(&self) -> MissingKey {
        self.missing_key
    }

    /// Render `template` against `input`.
    ///
    /// `name` identifies the template in error messages.
    pub fn render(&self, name: &str, template: &str, input: &Map<String, Value>) -> Result<String, RenderError> {
        let (source, delims) = parse_directive(template)?;
        let translation = translate(&source, &delims);

        let mut tera = Tera::default();
        tera.autoescape_on(vec![]);
        functions::register_builtins(&mut tera);
        if let Some(resolver) = &self.resolver {
            functions::register_resolver(&mut tera, resolver);
        }

        if let Err(e) = tera.add_raw_template(name, translation.text()) {
            let chain = error_chain(&e);
            let location = parse_error_location(&chain)
                .map(|(line, column)| translation.source_position(&source, line, column));
            return Err(template_error(name, &chain, location, &source, input, &self.formatter));
        }

        let rendered = self.execute(&tera, name, &source, &translation, input)?;

        if self.missing_key == MissingKey::Zero {
            if let Some(err) = no_value_error(name, &rendered, Some(input), &self.formatter) {
                return Err(err);
            }
        }
        Ok(rendered)
    }

    /// Render, filling in missing fields one at a time unless the policy is
    /// [`MissingKey::Error`]. Stops once a field cannot be filled or is
    /// reported missing a second time.
    fn execute(
        &self,
        tera: &Tera,
        name: &str,
        source: &str,
        translation: &Translation,
        input: &Map<String, Value>,
    ) -> Result<String, RenderError> {
        let placeholder = match self.missing_key {
            MissingKey::Error => None,
            MissingKey::Ignore => Some(""),
            MissingKey::Zero => Some(NO_VALUE),
        };

        let bindings = translation.loop_bindings();
        let mut data = input.clone();
        let mut filled: Vec<String> = Vec::new();
        loop {
            let result = Context::from_serialize(&data).and_then(|context| tera.render(name, &context));
            let err = match result {
                Ok(out) => return Ok(out),
                Err(err) => err,
            };

            let chain = error_chain(&err);
            let missing = missing_variable(&chain);
            if let (Some(placeholder), Some(path)) = (placeholder, missing.as_deref()) {
                let retry = !filled.iter().any(|p| p == path) && fill(&mut data, &bindings, path, placeholder);
                if retry {
                    tracing::trace!("template {name}: filling missing field {path}");
                    filled.push(path.to_string());
                    continue;
                }
            }

            let location = parse_error_location(&chain)
                .map(|(line, column)| translation.source_position(source, line, column))
                .or_else(|| missing.as_deref().and_then(|path| translation.locate_reference(source, path)));
            return Err(template_error(name, &chain, location, source, input, &self.formatter));
        }
    }
}

/// Fill `path` in the input, or in every element of the collection a loop
/// variable iterates over when `path` starts with one.
fn fill(data: &mut Map<String, Value>, bindings: &[(String, String)], path: &str, placeholder: &str) -> bool {
    let (head, rest) = match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    };
    let Some(collection) = binding(bindings, head) else {
        return fill_missing(data, path, placeholder);
    };
    // a bare loop variable is always bound while the loop runs
    let Some(rest) = rest else { return false };

    let mut changed = false;
    for container in resolve_mut(data, bindings, collection, 0) {
        for element in elements_mut(container) {
            if let Value::Object(map) = element {
                changed |= fill_missing(map, rest, placeholder);
            }
        }
    }
    changed
}

/// Innermost loop binding for `variable`.
fn binding<'b>(bindings: &'b [(String, String)], variable: &str) -> Option<&'b str> {
    bindings.iter().rev().find(|(var, _)| var == variable).map(|(_, collection)| collection.as_str())
}

/// Every value the dotted `path` can denote, expanding loop variables into
/// the elements of their collections.
fn resolve_mut<'a>(
    data: &'a mut Map<String, Value>,
    bindings: &[(String, String)],
    path: &str,
    depth: usize,
) -> Vec<&'a mut Value> {
    if depth > bindings.len() {
        return Vec::new();
    }
    let (head, rest) = match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    };
    if let Some(collection) = binding(bindings, head) {
        let mut out = Vec::new();
        for container in resolve_mut(data, bindings, collection, depth + 1) {
            out.extend(elements_mut(container).into_iter().filter_map(|element| descend(element, rest)));
        }
        return out;
    }
    data.get_mut(head).and_then(|value| descend(value, rest)).into_iter().collect()
}

fn descend<'a>(value: &'a mut Value, path: Option<&str>) -> Option<&'a mut Value> {
    let Some(path) = path else { return Some(value) };
    path.split('.').try_fold(value, |current, segment| current.as_object_mut()?.get_mut(segment))
}

/// What a `for` loop iterates: array items or map values.
fn elements_mut(value: &mut Value) -> Vec<&mut Value> {
    match value {
        Value::Array(items) => items.iter_mut().collect(),
        Value::Object(map) => map.values_mut().collect(),
        _ => Vec::new(),
    }
}

/// Insert `placeholder` at the dotted `path`, creating intermediate maps.
///
/// Returns `false` when the path cannot be expressed as nested maps.
fn fill_missing(data: &mut Map<String, Value>, path: &str, placeholder: &str) -> bool {
    if path.contains('[') {
        return false;
    }
    let segments: Vec<&str> = path.split('.').collect();
    let Some((last, parents)) = segments.split_last() else {
        return false;
    };

    let mut current = data;
    for segment in parents {
        let next = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        current = match next {
            Value::Object(map) => map,
            _ => return false,
        };
    }
    if current.contains_key(*last) {
        return false;
    }
    current.insert(last.to_string(), Value::String(placeholder.to_string()));
    true
}
