//! Resolver traversal against an in-memory component repository.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use bootstrapper_core::types::{Component, ComponentReference, Resource};
use bootstrapper_core::{ComponentLocation, ComponentVersion};
use bootstrapper_ocm::{ComponentRepository, ComponentResolver, ResolveError};

const REPO: &str = "ghcr.io/acme";

// ---------------------------------------------------------------------------
// Fake repository
// ---------------------------------------------------------------------------

#[derive(Default)]
struct FakeRepository {
    versions: HashMap<String, ComponentVersion>,
    fetches: Mutex<Vec<String>>,
    downloads: Mutex<Vec<(String, String, PathBuf)>>,
}

impl FakeRepository {
    fn with(mut self, cv: ComponentVersion) -> Self {
        let key = format!("{}:{}", cv.name(), cv.version());
        self.versions.insert(key, cv);
        self
    }

    fn fetch_count(&self) -> usize {
        self.fetches.lock().expect("lock").len()
    }

    fn fetched(&self) -> Vec<String> {
        self.fetches.lock().expect("lock").clone()
    }
}

impl ComponentRepository for FakeRepository {
    fn get_component_version(&self, location: &ComponentLocation) -> Result<ComponentVersion, ResolveError> {
        assert_eq!(location.repository, REPO);
        let key = format!("{}:{}", location.name, location.version.as_deref().unwrap_or_default());
        self.fetches.lock().expect("lock").push(key.clone());
        self.versions.get(&key).cloned().ok_or_else(|| ResolveError::ReferenceNotFound {
            reference: key,
            component: "fake".into(),
        })
    }

    fn download_resource(&self, location: &ComponentLocation, resource: &str, dest: &Path) -> Result<(), ResolveError> {
        self.downloads
            .lock()
            .expect("lock")
            .push((location.to_string(), resource.to_string(), dest.to_path_buf()));
        Ok(())
    }

    fn list_component_versions(&self, repository: &str, name: &str) -> Result<Vec<String>, ResolveError> {
        assert_eq!(repository, REPO);
        let mut versions: Vec<String> = self
            .versions
            .values()
            .filter(|cv| cv.name() == name)
            .map(|cv| cv.version().to_string())
            .collect();
        versions.sort();
        Ok(versions)
    }
}

fn cv(name: &str, refs: &[(&str, &str)], resources: &[&str]) -> ComponentVersion {
    ComponentVersion {
        component: Component {
            name: name.to_string(),
            version: "v1".to_string(),
            component_references: refs
                .iter()
                .map(|(alias, target)| ComponentReference {
                    name: alias.to_string(),
                    component_name: target.to_string(),
                    version: "v1".to_string(),
                })
                .collect(),
            resources: resources
                .iter()
                .map(|r| Resource {
                    name: r.to_string(),
                    version: "v1".to_string(),
                    resource_type: "directoryTree".to_string(),
                    access: Default::default(),
                })
                .collect(),
        },
    }
}

/// root -a-> A -b-> B (owns c)
fn chain_repo() -> FakeRepository {
    FakeRepository::default()
        .with(cv("root", &[("a", "acme/a")], &[]))
        .with(cv("acme/a", &[("b", "acme/b")], &[]))
        .with(cv("acme/b", &[], &["c"]))
}

fn resolver(repo: Arc<FakeRepository>, template_path: &str) -> ComponentResolver {
    ComponentResolver::initialize(repo, &format!("{REPO}//root:v1"), template_path).expect("initialize")
}

// ---------------------------------------------------------------------------
// 1. Initialize
// ---------------------------------------------------------------------------

#[test]
fn initialize_resolves_template_path_hop_by_hop() {
    let repo = Arc::new(chain_repo());
    let r = resolver(repo.clone(), "a/b/c");
    assert_eq!(r.repository(), REPO);
    assert_eq!(r.root().name(), "root");
    assert_eq!(r.templates_component_version().name(), "acme/b");
    assert_eq!(r.templates_resource_name(), "c");

    let dest = PathBuf::from("/tmp/templates");
    r.download_templates(&dest).expect("download");
    let downloads = repo.downloads.lock().expect("lock").clone();
    assert_eq!(downloads, vec![(format!("{REPO}//acme/b:v1"), "c".to_string(), dest)]);
}

#[test]
fn initialize_rejects_location_without_separator() {
    let repo = Arc::new(chain_repo());
    let err = ComponentResolver::initialize(repo, "ghcr.io/acme/root:v1", "c").unwrap_err();
    assert!(matches!(err, ResolveError::Location(_)), "got: {err}");
}

#[test]
fn initialize_fails_when_a_hop_is_missing() {
    let repo = Arc::new(
        FakeRepository::default()
            .with(cv("root", &[("a", "acme/a")], &[]))
            .with(cv("acme/a", &[], &["c"])),
    );
    let err = ComponentResolver::initialize(repo, &format!("{REPO}//root:v1"), "a/b/c").unwrap_err();
    assert!(matches!(err, ResolveError::ReferenceNotFound { .. }), "got: {err}");
    assert_eq!(
        err.to_string(),
        "component reference b not found in component version acme/a or its references"
    );
}

// ---------------------------------------------------------------------------
// 2. Reference and resource lookups
// ---------------------------------------------------------------------------

#[test]
fn resolve_reference_finds_grandchild() {
    let repo = Arc::new(chain_repo());
    let r = resolver(repo, "c");
    let found = r.resolve_reference(r.root(), "b").expect("resolve");
    assert_eq!(found.name(), "acme/b");
}

#[test]
fn resolve_resource_owner_finds_owner_at_depth() {
    let repo = Arc::new(chain_repo());
    let r = resolver(repo, "c");
    let owner = r.resolve_resource_owner(r.root(), "c").expect("resolve");
    assert_eq!(owner.name(), "acme/b");

    let err = r.resolve_resource_owner(r.root(), "missing").unwrap_err();
    assert_eq!(
        err.to_string(),
        "resource missing not found in component version root or its references"
    );
}

#[test]
fn parent_owning_the_resource_is_returned_itself() {
    let repo = Arc::new(FakeRepository::default().with(cv("root", &[], &["c"])));
    let r = resolver(repo.clone(), "c");
    let before = repo.fetch_count();
    let owner = r.resolve_resource_owner(r.root(), "c").expect("resolve");
    assert_eq!(owner.name(), "root");
    assert_eq!(repo.fetch_count(), before);
}

#[test]
fn first_match_wins_in_declaration_order() {
    // root -> [x -> (dup), y (owns dup)]; x's subtree is searched first.
    let repo = Arc::new(
        FakeRepository::default()
            .with(cv("root", &[("x", "acme/x"), ("y", "acme/y")], &[]))
            .with(cv("acme/x", &[("deep", "acme/deep")], &[]))
            .with(cv("acme/deep", &[], &["dup"]))
            .with(cv("acme/y", &[], &["dup"])),
    );
    let r = resolver(repo.clone(), "dup");
    let owner = r.resolve_resource_owner(r.root(), "dup").expect("resolve");
    assert_eq!(owner.name(), "acme/deep");
}

#[test]
fn direct_reference_is_preferred_over_deeper_alias() {
    // root has alias `b` directly and also through a.
    let repo = Arc::new(
        FakeRepository::default()
            .with(cv("root", &[("a", "acme/a"), ("b", "acme/direct-b")], &[]))
            .with(cv("acme/a", &[("b", "acme/b")], &[]))
            .with(cv("acme/b", &[], &[]))
            .with(cv("acme/direct-b", &[], &[])),
    );
    let r = resolver(repo.clone(), "c");
    let found = r.resolve_reference(r.root(), "b").expect("resolve");
    assert_eq!(found.name(), "acme/direct-b");
}

#[test]
fn lookups_are_not_cached() {
    let repo = Arc::new(chain_repo());
    let r = resolver(repo.clone(), "c");
    let start = repo.fetch_count();

    r.resolve_reference(r.root(), "b").expect("first");
    let once = repo.fetch_count() - start;
    r.resolve_reference(r.root(), "b").expect("second");
    assert_eq!(repo.fetch_count() - start, once * 2);
    assert_eq!(repo.fetched()[start..start + once], ["acme/a:v1", "acme/b:v1"]);
}

// ---------------------------------------------------------------------------
// 3. Cycles and shared subtrees
// ---------------------------------------------------------------------------

#[test]
fn reference_cycle_is_reported() {
    let repo = Arc::new(
        FakeRepository::default()
            .with(cv("root", &[("a", "acme/a")], &[]))
            .with(cv("acme/a", &[("back", "root")], &[])),
    );
    let r = resolver(repo, "c");
    let err = r.resolve_resource_owner(r.root(), "nowhere").unwrap_err();
    assert!(matches!(err, ResolveError::Cycle { .. }), "got: {err}");
    assert!(err.to_string().contains("root:v1 -> acme/a:v1 -> root:v1"), "got: {err}");
}

#[test]
fn shared_subtree_is_searched_once() {
    // root -> [a -> s, b -> s]; s is fetched once through a and skipped through b.
    let repo = Arc::new(
        FakeRepository::default()
            .with(cv("root", &[("a", "acme/a"), ("b", "acme/b")], &[]))
            .with(cv("acme/a", &[("s", "acme/s")], &[]))
            .with(cv("acme/b", &[("s", "acme/s")], &[]))
            .with(cv("acme/s", &[], &[])),
    );
    let r = resolver(repo.clone(), "c");
    let start = repo.fetch_count();
    let err = r.resolve_resource_owner(r.root(), "nowhere").unwrap_err();
    assert!(matches!(err, ResolveError::ResourceNotFound { .. }));
    let fetched = repo.fetched();
    assert_eq!(fetched[start..], ["acme/a:v1", "acme/s:v1", "acme/b:v1"]);
}

// ---------------------------------------------------------------------------
// 4. Downloads and listing
// ---------------------------------------------------------------------------

#[test]
fn download_by_path_targets_resolved_owner() {
    let repo = Arc::new(chain_repo());
    let r = resolver(repo.clone(), "c");
    let dest = PathBuf::from("/tmp/out");
    r.download_by_path(r.root(), "a/b/c", &dest).expect("download");
    let downloads = repo.downloads.lock().expect("lock").clone();
    assert_eq!(downloads.last(), Some(&(format!("{REPO}//acme/b:v1"), "c".to_string(), dest)));
}

#[test]
fn list_component_versions_uses_resolver_repository() {
    let repo = Arc::new(chain_repo());
    let r = resolver(repo, "c");
    let versions = r.list_component_versions(r.root()).expect("list");
    assert_eq!(versions, vec!["v1"]);
}
