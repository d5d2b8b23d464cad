//! The template input namespace handed to the repository templates.
//!
//! Keys are added in a fixed order: the base keys from the deployment config,
//! then the rendered user patches, then one image entry per sync controller.

use std::fs;
use std::path::Path;

use bootstrapper_core::{BootstrapperConfig, ComponentVersion, ImageRef, OCI_IMAGE_RESOURCE_TYPE, SECRET_FIELDS};
use bootstrapper_renderer::{TemplateEngine, TemplateInputFormatter};
use serde_json::{json, Map, Value};

use crate::error::{io_err, RepoError};
use crate::transformer::{ENVS_DIR, FLUXCD_DIR, OPENMCP_DIR, RESOURCES_DIR};

pub const OPENMCP_OPERATOR_COMPONENT_NAME: &str = "openmcp-operator";

/// Resource owned by the sync-controller component; used to locate it.
pub const FLUXCD_SOURCE_CONTROLLER_RESOURCE: &str = "fluxcd-source-controller";

/// Sync-controller image resources and the `images` key each one fills.
pub const FLUXCD_IMAGES: [(&str, &str); 6] = [
    (FLUXCD_SOURCE_CONTROLLER_RESOURCE, "sourceController"),
    ("fluxcd-kustomize-controller", "kustomizeController"),
    ("fluxcd-helm-controller", "helmController"),
    ("fluxcd-notification-controller", "notificationController"),
    ("fluxcd-image-reflector-controller", "imageReflectorController"),
    ("fluxcd-image-automation-controller", "imageAutomationController"),
];

const USER_PATCHES_KEY: &str = "patches";

/// Dump of the template input shown in render errors. Values under
/// credential keys are redacted wherever they sit in the input.
pub fn input_formatter() -> TemplateInputFormatter {
    TemplateInputFormatter::new(true, Vec::<String>::new()).with_secret_fields(SECRET_FIELDS)
}

/// First `ociImage` resource of `cv` that carries an image reference.
pub fn first_image(cv: &ComponentVersion) -> Result<(String, ImageRef), RepoError> {
    let reference = cv
        .resources_by_type(OCI_IMAGE_RESOURCE_TYPE)
        .find_map(|r| r.access.image_reference.clone())
        .ok_or_else(|| RepoError::MissingImage { component: cv.to_string() })?;
    let image = parse_image(&reference)?;
    Ok((reference, image))
}

fn parse_image(reference: &str) -> Result<ImageRef, RepoError> {
    ImageRef::parse(reference).map_err(|source| RepoError::InvalidImage { reference: reference.to_string(), source })
}

/// The keys every run provides, derived from the config and the operator.
///
/// `openmcpOperator.version` is the operator's component version; the image
/// tag is kept under `tag`.
pub fn base_input(
    config: &BootstrapperConfig,
    operator: &ComponentVersion,
    operator_image: &ImageRef,
) -> Map<String, Value> {
    let mut input = Map::new();
    let env = &config.environment;
    let branch = &config.repository.branch;

    if !config.image_pull_secrets.is_empty() {
        let secrets: Vec<Value> = config.image_pull_secrets.iter().map(|name| json!({ "name": name })).collect();
        input.insert("imagePullSecrets".into(), Value::Array(secrets));
    }

    let mut operator_values = match operator_image.to_template_value() {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    operator_values.insert("version".into(), json!(operator.version()));
    operator_values.insert("imagePullSecrets".into(), json!(config.image_pull_secrets));
    operator_values.insert("environment".into(), json!(env));
    operator_values.insert("config".into(), Value::Object(config.openmcp_operator.config.decoded()));
    input.insert("openmcpOperator".into(), Value::Object(operator_values));

    input.insert("user".into(), Value::Object(config.template_input.clone()));
    input.insert("fluxCDEnvPath".into(), json!(format!("./{ENVS_DIR}/{env}/{FLUXCD_DIR}")));
    input.insert("gitRepoEnvBranch".into(), json!(branch));
    input.insert("fluxCDResourcesPath".into(), json!(format!("../../../{RESOURCES_DIR}/{FLUXCD_DIR}")));
    input.insert("openMCPResourcesPath".into(), json!(format!("../../../{RESOURCES_DIR}/{OPENMCP_DIR}")));
    input.insert("git".into(), json!({ "repoUrl": config.repository.url, "mainBranch": branch }));
    input.insert("images".into(), Value::Object(Map::new()));
    input
}

/// Render the patches file against `input`, then store its `patches` list
/// as `userKustomizationPatches`.
pub fn add_user_patches(engine: &TemplateEngine, path: &Path, input: &mut Map<String, Value>) -> Result<(), RepoError> {
    tracing::debug!("templating user kustomization patches from {}", path.display());
    let raw = fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    let rendered = engine.render("userPatches", &raw, input)?;
    let mut parsed: Map<String, Value> =
        serde_yaml::from_str(&rendered).map_err(|source| RepoError::Yaml { path: path.to_path_buf(), source })?;
    let patches = parsed
        .remove(USER_PATCHES_KEY)
        .ok_or_else(|| RepoError::NoPatches(path.to_path_buf()))?;
    input.insert("userKustomizationPatches".into(), patches);
    Ok(())
}

/// Fill `images` with one entry per sync-controller image of `fluxcd`.
pub fn add_fluxcd_images(fluxcd: &ComponentVersion, input: &mut Map<String, Value>) -> Result<(), RepoError> {
    let mut images = match input.remove("images") {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };
    for (resource_name, key) in FLUXCD_IMAGES {
        let reference = fluxcd
            .resource(resource_name)
            .and_then(|r| r.access.image_reference.as_deref())
            .ok_or_else(|| RepoError::MissingResource {
                resource: resource_name.to_string(),
                component: fluxcd.to_string(),
            })?;
        tracing::trace!("{key} image: {reference}");
        images.insert(key.to_string(), parse_image(reference)?.to_template_value());
    }
    input.insert("images".into(), Value::Object(images));
    Ok(())
}
