//! Filters and functions available to every template.
//!
//! | name | kind | result |
//! |---|---|---|
//! | `to_yaml` | filter | YAML text without the trailing newline, empty on error |
//! | `from_yaml` | filter | parsed value |
//! | `parse_image` | filter, function | `{image, tag, digest}`, null on error |
//!
//! With a resolver attached the component graph is queryable too: see
//! [`register_resolver`]. Lookup failures inside those helpers are logged and
//! yield null, so a template can test for them.

use std::collections::HashMap;
use std::sync::Arc;

use bootstrapper_core::{ComponentVersion, ImageRef};
use bootstrapper_ocm::ComponentResolver;
use tera::{Tera, Value};

type Args = HashMap<String, Value>;

pub(crate) fn register_builtins(tera: &mut Tera) {
    tera.register_filter("to_yaml", to_yaml);
    tera.register_filter("from_yaml", from_yaml);
    tera.register_filter("parse_image", |value: &Value, _: &Args| Ok(parse_image(value)));
    tera.register_function("parse_image", |args: &Args| {
        Ok(parse_image(args.get("image").unwrap_or(&Value::Null)))
    });
}

fn to_yaml(value: &Value, _: &Args) -> tera::Result<Value> {
    let text = serde_yaml::to_string(value).unwrap_or_default();
    Ok(Value::String(text.trim_end_matches('\n').to_string()))
}

fn from_yaml(value: &Value, _: &Args) -> tera::Result<Value> {
    let text = value
        .as_str()
        .ok_or_else(|| tera::Error::msg("from_yaml expects a string"))?;
    serde_yaml::from_str(text).map_err(|e| tera::Error::msg(format!("from_yaml: {e}")))
}

fn parse_image(value: &Value) -> Value {
    let Some(reference) = value.as_str() else {
        return Value::Null;
    };
    match ImageRef::parse(reference) {
        Ok(image) => serde_json::json!({
            "image": image.image,
            "tag": image.tag,
            "digest": image.digest,
        }),
        Err(_) => Value::Null,
    }
}

// ---------------------------------------------------------------------------
// Component graph helpers
// ---------------------------------------------------------------------------

/// Register the component graph helpers bound to `resolver`.
///
/// - `get_ocm_repository()`
/// - `get_root_component_version()`
/// - `get_component_version_by_reference(name=.., parent=..)`, `parent` defaults to the root
/// - `get_component_version_for_resource(name=.., parent=..)`, `parent` defaults to the root
/// - `component_version_as_map(cv=..)`
/// - `get_resource_from_component_version(cv=.., name=..)`
/// - `list_component_versions(cv=..)`
pub(crate) fn register_resolver(tera: &mut Tera, resolver: &Arc<ComponentResolver>) {
    let r = Arc::clone(resolver);
    tera.register_function("get_ocm_repository", move |_: &Args| {
        Ok(Value::String(r.repository().to_string()))
    });

    let r = Arc::clone(resolver);
    tera.register_function("get_root_component_version", move |_: &Args| Ok(cv_value(r.root())));

    let r = Arc::clone(resolver);
    tera.register_function("get_component_version_by_reference", move |args: &Args| {
        let name = str_arg(args, "name")?;
        let parent = cv_arg(args, "parent")?.unwrap_or_else(|| r.root().clone());
        tracing::trace!("get_component_version_by_reference parent={parent} name={name}");
        match r.resolve_reference(&parent, &name) {
            Ok(cv) => Ok(cv_value(&cv)),
            Err(e) => {
                tracing::error!("error getting component version by reference {name} from {parent}: {e}");
                Ok(Value::Null)
            }
        }
    });

    let r = Arc::clone(resolver);
    tera.register_function("get_component_version_for_resource", move |args: &Args| {
        let name = str_arg(args, "name")?;
        let parent = cv_arg(args, "parent")?.unwrap_or_else(|| r.root().clone());
        tracing::trace!("get_component_version_for_resource parent={parent} name={name}");
        match r.resolve_resource_owner(&parent, &name) {
            Ok(cv) => Ok(cv_value(&cv)),
            Err(e) => {
                tracing::error!("error getting component version for resource {name} from {parent}: {e}");
                Ok(Value::Null)
            }
        }
    });

    tera.register_function("component_version_as_map", |args: &Args| {
        Ok(cv_arg(args, "cv").ok().flatten().map_or(Value::Null, |cv| cv_value(&cv)))
    });

    tera.register_function("get_resource_from_component_version", |args: &Args| {
        let cv = cv_arg(args, "cv")?.ok_or_else(|| tera::Error::msg("missing argument `cv`"))?;
        let name = str_arg(args, "name")?;
        match cv.resource(&name) {
            Some(resource) => Ok(serde_json::to_value(resource).unwrap_or(Value::Null)),
            None => {
                tracing::error!("resource {name} not found in component version {cv}");
                Ok(Value::Null)
            }
        }
    });

    let r = Arc::clone(resolver);
    tera.register_function("list_component_versions", move |args: &Args| {
        let cv = cv_arg(args, "cv")?.ok_or_else(|| tera::Error::msg("missing argument `cv`"))?;
        match r.list_component_versions(&cv) {
            Ok(versions) => Ok(Value::from(versions)),
            Err(e) => {
                tracing::error!("error listing component versions for component {}: {e}", cv.name());
                Ok(Value::Null)
            }
        }
    });
}

fn cv_value(cv: &ComponentVersion) -> Value {
    serde_json::to_value(cv).unwrap_or(Value::Null)
}

fn str_arg(args: &Args, key: &str) -> tera::Result<String> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| tera::Error::msg(format!("missing string argument `{key}`")))
}

fn cv_arg(args: &Args, key: &str) -> tera::Result<Option<ComponentVersion>> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|e| tera::Error::msg(format!("argument `{key}` is not a component version: {e}"))),
    }
}
