//! Provider custom resources, regenerated from scratch on every run.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use bootstrapper_core::config::Providers;
use bootstrapper_core::Provider;
use bootstrapper_ocm::ComponentResolver;
use bootstrapper_renderer::{RenderError, TemplateEngine, TemplateSink};
use serde_json::{json, Map, Value};

use crate::error::{io_err, RepoError};
use crate::template_input::{first_image, input_formatter};
use crate::transformer::{OPENMCP_DIR, RESOURCES_DIR};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    ClusterProvider,
    ServiceProvider,
    PlatformService,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] =
        [ProviderKind::ClusterProvider, ProviderKind::ServiceProvider, ProviderKind::PlatformService];

    /// Reference name of the provider's component below the root component.
    pub fn component_name(self, name: &str) -> String {
        match self {
            ProviderKind::ClusterProvider => format!("cluster-provider-{name}"),
            ProviderKind::ServiceProvider => format!("service-provider-{name}"),
            ProviderKind::PlatformService => format!("platform-service-{name}"),
        }
    }

    /// Directory below `resources/openmcp` holding this kind's manifests.
    pub fn dir_name(self) -> &'static str {
        match self {
            ProviderKind::ClusterProvider => "cluster-providers",
            ProviderKind::ServiceProvider => "service-providers",
            ProviderKind::PlatformService => "platform-services",
        }
    }

    fn template(self) -> &'static str {
        match self {
            ProviderKind::ClusterProvider => include_str!("templates/clusterProvider.yaml"),
            ProviderKind::ServiceProvider => include_str!("templates/serviceProvider.yaml"),
            ProviderKind::PlatformService => include_str!("templates/platformService.yaml"),
        }
    }

    /// Path of a provider manifest relative to `resources/openmcp`.
    pub fn manifest_path(self, name: &str) -> String {
        format!("{}/{name}.yaml", self.dir_name())
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProviderKind::ClusterProvider => "cluster provider",
            ProviderKind::ServiceProvider => "service provider",
            ProviderKind::PlatformService => "platform service",
        })
    }
}

/// The configured providers grouped by kind, in processing order.
pub fn provider_groups(providers: &Providers) -> [(ProviderKind, &[Provider]); 3] {
    [
        (ProviderKind::ClusterProvider, providers.cluster_providers.as_slice()),
        (ProviderKind::ServiceProvider, providers.service_providers.as_slice()),
        (ProviderKind::PlatformService, providers.platform_services.as_slice()),
    ]
}

/// Repository-relative directory of `kind`'s manifests.
pub fn provider_dir(kind: ProviderKind) -> PathBuf {
    Path::new(RESOURCES_DIR).join(OPENMCP_DIR).join(kind.dir_name())
}

/// Render one manifest per provider into `repo_dir`, replacing whatever the
/// three provider directories held before.
pub fn apply_providers(
    resolver: &ComponentResolver,
    providers: &[(ProviderKind, &[Provider])],
    image_pull_secrets: &[String],
    repo_dir: &Path,
    sink: &mut dyn TemplateSink,
) -> Result<(), RepoError> {
    let mut removed = Vec::new();
    for kind in ProviderKind::ALL {
        let dir = repo_dir.join(provider_dir(kind));
        if dir.exists() {
            fs::remove_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
            removed.push(kind);
        }
    }

    let engine = TemplateEngine::new().with_input_formatter(input_formatter());
    for (kind, entries) in providers {
        for provider in entries.iter() {
            let component = resolver.resolve_reference(resolver.root(), &kind.component_name(&provider.name))?;
            let (location, _) = first_image(&component)?;
            let relative = provider_dir(*kind).join(format!("{}.yaml", provider.name));
            tracing::debug!("creating provider {} with image {location} in {}", provider.name, relative.display());

            let input = provider_input(&provider.name, &location, image_pull_secrets);
            let rendered = engine.render(&relative.to_string_lossy(), kind.template(), &input)?;
            sink.write_file(&relative, rendered.as_bytes())
                .map_err(|source| RenderError::Sink { path: relative.clone(), source })?;
        }
    }

    // Staging the whole directory also records files of dropped providers as deleted.
    for kind in ProviderKind::ALL {
        let relative = provider_dir(kind);
        if removed.contains(&kind) || repo_dir.join(&relative).exists() {
            sink.stage(&relative).map_err(|source| RenderError::Sink { path: relative.clone(), source })?;
        }
    }
    Ok(())
}

fn provider_input(name: &str, location: &str, image_pull_secrets: &[String]) -> Map<String, Value> {
    let mut input = Map::new();
    input.insert(
        "values".into(),
        json!({
            "name": name,
            "image": { "location": location, "imagePullSecrets": image_pull_secrets },
        }),
    );
    input
}
