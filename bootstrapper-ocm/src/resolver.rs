//! Component graph traversal.
//!
//! Lookups are depth-first and return the first match: a parent's own
//! references are checked before descending, and children are visited in
//! declaration order. Nothing is cached, so every hop asks the
//! [`ComponentRepository`] again.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use bootstrapper_core::{ComponentLocation, ComponentReference, ComponentVersion};

use crate::error::ResolveError;
use crate::repository::ComponentRepository;

/// Identity of a component version inside one traversal.
type NodeKey = (String, String);

/// What a traversal is looking for.
#[derive(Clone, Copy)]
enum Target<'a> {
    /// A reference with this local alias.
    Reference(&'a str),
    /// A component version owning a resource with this name.
    Resource(&'a str),
}

/// Resolver rooted at one component version.
#[derive(Clone)]
pub struct ComponentResolver {
    repository: Arc<dyn ComponentRepository>,
    repo: String,
    root: ComponentVersion,
    templates: ComponentVersion,
    templates_resource: String,
}

impl std::fmt::Debug for ComponentResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentResolver")
            .field("repo", &self.repo)
            .field("root", &self.root.to_string())
            .field("templates", &self.templates.to_string())
            .field("templates_resource", &self.templates_resource)
            .finish()
    }
}

impl ComponentResolver {
    /// Fetch the root at `root_location` and resolve `template_path`
    /// (`ref1/.../refN/resource`) to the component holding the templates.
    pub fn initialize(
        repository: Arc<dyn ComponentRepository>,
        root_location: &str,
        template_path: &str,
    ) -> Result<Self, ResolveError> {
        let location: ComponentLocation = root_location.parse()?;
        let root = repository.get_component_version(&location)?;
        tracing::info!("resolved root component version {root}");

        let (chain, resource) = split_path(template_path)?;
        let mut resolver = Self {
            repository,
            repo: location.repository,
            templates: root.clone(),
            root,
            templates_resource: resource.to_string(),
        };
        resolver.templates = resolver.resolve_chain(&resolver.root, &chain)?;
        tracing::debug!(
            "templates resource {} resolved to component version {}",
            resolver.templates_resource,
            resolver.templates
        );
        Ok(resolver)
    }

    /// Repository part of the root location.
    pub fn repository(&self) -> &str {
        &self.repo
    }

    pub fn root(&self) -> &ComponentVersion {
        &self.root
    }

    pub fn templates_component_version(&self) -> &ComponentVersion {
        &self.templates
    }

    pub fn templates_resource_name(&self) -> &str {
        &self.templates_resource
    }

    // -----------------------------------------------------------------------
    // 1. Lookups
    // -----------------------------------------------------------------------

    /// The component version reachable from `parent` through a reference aliased `name`.
    pub fn resolve_reference(&self, parent: &ComponentVersion, name: &str) -> Result<ComponentVersion, ResolveError> {
        let mut path = vec![node_key(parent)];
        let mut exhausted = HashSet::new();
        self.search(parent, Target::Reference(name), &mut path, &mut exhausted)?
            .ok_or_else(|| ResolveError::ReferenceNotFound {
                reference: name.to_string(),
                component: parent.name().to_string(),
            })
    }

    /// The first component version, `parent` included, that owns a resource named `resource`.
    pub fn resolve_resource_owner(
        &self,
        parent: &ComponentVersion,
        resource: &str,
    ) -> Result<ComponentVersion, ResolveError> {
        let mut path = vec![node_key(parent)];
        let mut exhausted = HashSet::new();
        self.search(parent, Target::Resource(resource), &mut path, &mut exhausted)?
            .ok_or_else(|| ResolveError::ResourceNotFound {
                resource: resource.to_string(),
                component: parent.name().to_string(),
            })
    }

    /// Every published version of the component behind `cv`.
    pub fn list_component_versions(&self, cv: &ComponentVersion) -> Result<Vec<String>, ResolveError> {
        self.repository.list_component_versions(&self.repo, cv.name())
    }

    // -----------------------------------------------------------------------
    // 2. Downloads
    // -----------------------------------------------------------------------

    pub fn download_resource(&self, cv: &ComponentVersion, resource: &str, dest: &Path) -> Result<(), ResolveError> {
        self.repository.download_resource(&cv.location(&self.repo), resource, dest)
    }

    /// Download the resource named by the template path given to [`ComponentResolver::initialize`].
    pub fn download_templates(&self, dest: &Path) -> Result<(), ResolveError> {
        self.download_resource(&self.templates, &self.templates_resource, dest)
    }

    /// Resolve `path` (`ref1/.../refN/resource`) from `root` and download the final resource.
    pub fn download_by_path(&self, root: &ComponentVersion, path: &str, dest: &Path) -> Result<(), ResolveError> {
        let (chain, resource) = split_path(path)?;
        let owner = self.resolve_chain(root, &chain)?;
        self.download_resource(&owner, resource, dest)
    }

    // -----------------------------------------------------------------------
    // 3. Traversal
    // -----------------------------------------------------------------------

    fn resolve_chain(&self, root: &ComponentVersion, chain: &[&str]) -> Result<ComponentVersion, ResolveError> {
        let mut cv = root.clone();
        for name in chain {
            cv = self.resolve_reference(&cv, name)?;
        }
        Ok(cv)
    }

    fn fetch(&self, reference: &ComponentReference) -> Result<ComponentVersion, ResolveError> {
        let location = ComponentLocation::new(&self.repo, &reference.component_name, &reference.version);
        self.repository.get_component_version(&location)
    }

    /// `path` holds the nodes from the search root down to `parent`. Subtrees
    /// that were fully searched without a match land in `exhausted` and are skipped.
    fn search(
        &self,
        parent: &ComponentVersion,
        target: Target<'_>,
        path: &mut Vec<NodeKey>,
        exhausted: &mut HashSet<NodeKey>,
    ) -> Result<Option<ComponentVersion>, ResolveError> {
        match target {
            Target::Reference(name) => {
                if let Some(reference) = parent.reference(name) {
                    return self.fetch(reference).map(Some);
                }
            }
            Target::Resource(name) => {
                if parent.resource(name).is_some() {
                    return Ok(Some(parent.clone()));
                }
            }
        }

        for reference in parent.references() {
            let key = (reference.component_name.clone(), reference.version.clone());
            if path.contains(&key) {
                return Err(cycle_error(path, &key));
            }
            if exhausted.contains(&key) {
                continue;
            }

            let child = self.fetch(reference)?;
            path.push(key.clone());
            let found = self.search(&child, target, path, exhausted)?;
            path.pop();

            if found.is_some() {
                return Ok(found);
            }
            exhausted.insert(key);
        }
        Ok(None)
    }
}

fn node_key(cv: &ComponentVersion) -> NodeKey {
    (cv.name().to_string(), cv.version().to_string())
}

fn cycle_error(path: &[NodeKey], repeated: &NodeKey) -> ResolveError {
    let mut hops: Vec<String> = path.iter().map(|(n, v)| format!("{n}:{v}")).collect();
    hops.push(format!("{}:{}", repeated.0, repeated.1));
    ResolveError::Cycle { path: hops.join(" -> ") }
}

/// `a/b/c` into (`[a, b]`, `c`).
fn split_path(path: &str) -> Result<(Vec<&str>, &str), ResolveError> {
    let trimmed = path.trim();
    let mut segments: Vec<&str> = trimmed.split('/').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(ResolveError::InvalidPath(path.to_string()));
    }
    match segments.pop() {
        Some(last) => Ok((segments, last)),
        None => Err(ResolveError::InvalidPath(path.to_string())),
    }
}
