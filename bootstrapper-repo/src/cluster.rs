//! Reconciling manifests into the target cluster.
//!
//! Objects are handled as untyped JSON. [`create_or_update`] reads the live
//! object first: absent means create, present means update carrying the live
//! `metadata.resourceVersion`.

use std::fmt;
use std::path::PathBuf;

use bootstrapper_core::ToolCommand;
use serde::Deserialize;
use serde_json::Value;

use crate::error::RepoError;
use crate::kustomization::KUSTOMIZATION_KIND;

const FLUX_KUSTOMIZE_GROUP: &str = "kustomize.toolkit.fluxcd.io";

// ---------------------------------------------------------------------------
// Object identity
// ---------------------------------------------------------------------------

/// Group-version-kind plus namespace/name of a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectKey {
    pub api_version: String,
    pub kind: String,
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectKey {
    pub fn of(manifest: &Value) -> Result<Self, RepoError> {
        let field = |value: Option<&Value>, what: &str| {
            value
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .ok_or_else(|| RepoError::InvalidManifest(format!("missing {what}")))
        };
        let metadata = manifest.get("metadata");
        Ok(Self {
            api_version: field(manifest.get("apiVersion"), "apiVersion")?,
            kind: field(manifest.get("kind"), "kind")?,
            namespace: metadata.and_then(|m| m.get("namespace")).and_then(Value::as_str).map(str::to_string),
            name: field(metadata.and_then(|m| m.get("name")), "metadata.name")?,
        })
    }

    /// `Kind.version.group`, or just `Kind` for the core group.
    pub fn resource(&self) -> String {
        match self.api_version.split_once('/') {
            Some((group, version)) => format!("{}.{version}.{group}", self.kind),
            None => self.kind.clone(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{} {ns}/{}", self.kind, self.name),
            None => write!(f, "{} {}", self.kind, self.name),
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub trait ClusterClient {
    /// The live object, or `None` when it does not exist.
    fn get(&self, key: &ObjectKey) -> Result<Option<Value>, RepoError>;
    fn create(&self, key: &ObjectKey, object: &Value) -> Result<(), RepoError>;
    fn update(&self, key: &ObjectKey, object: &Value) -> Result<(), RepoError>;
}

/// [`ClusterClient`] backed by the `kubectl` executable.
#[derive(Debug, Clone)]
pub struct KubectlClient {
    program: String,
    kubeconfig: Option<PathBuf>,
}

impl KubectlClient {
    pub fn new(kubeconfig: Option<PathBuf>) -> Self {
        Self { program: "kubectl".to_string(), kubeconfig }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn command(&self) -> ToolCommand {
        let cmd = ToolCommand::new(&self.program);
        match &self.kubeconfig {
            Some(path) => cmd.arg("--kubeconfig").arg(path),
            None => cmd,
        }
    }

    fn submit(&self, action: &'static str, key: &ObjectKey, object: &Value) -> Result<(), RepoError> {
        let body = serde_json::to_vec(object).map_err(|e| RepoError::InvalidManifest(e.to_string()))?;
        self.command()
            .args([action, "-f", "-"])
            .stdin(body)
            .run_checked()
            .map_err(|source| RepoError::Cluster { action, object: key.to_string(), source })?;
        Ok(())
    }
}

impl ClusterClient for KubectlClient {
    fn get(&self, key: &ObjectKey) -> Result<Option<Value>, RepoError> {
        let mut cmd = self.command().arg("get").arg(key.resource()).arg(&key.name);
        if let Some(ns) = &key.namespace {
            cmd = cmd.arg("--namespace").arg(ns);
        }
        let output = cmd
            .args(["--output", "json", "--ignore-not-found"])
            .run_checked()
            .map_err(|source| RepoError::Cluster { action: "get", object: key.to_string(), source })?;
        if output.stdout.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&output.stdout)
            .map(Some)
            .map_err(|e| RepoError::InvalidManifest(format!("unreadable {key}: {e}")))
    }

    fn create(&self, key: &ObjectKey, object: &Value) -> Result<(), RepoError> {
        self.submit("create", key, object)
    }

    fn update(&self, key: &ObjectKey, object: &Value) -> Result<(), RepoError> {
        self.submit("replace", key, object)
    }
}

// ---------------------------------------------------------------------------
// Manifests
// ---------------------------------------------------------------------------

/// Split a multi-document YAML stream into objects, skipping empty documents.
pub fn parse_manifests(stream: &str) -> Result<Vec<Value>, RepoError> {
    let mut manifests = Vec::new();
    for document in serde_yaml::Deserializer::from_str(stream) {
        let value = Value::deserialize(document).map_err(|e| RepoError::InvalidManifest(e.to_string()))?;
        match value {
            Value::Null => continue,
            Value::Object(_) => manifests.push(value),
            other => return Err(RepoError::InvalidManifest(format!("expected an object, got {other}"))),
        }
    }
    Ok(manifests)
}

/// Render objects back into a `---` separated YAML stream.
pub fn to_yaml_stream(manifests: &[Value]) -> Result<String, RepoError> {
    let mut out = String::new();
    for manifest in manifests {
        let doc = serde_yaml::to_string(manifest)
            .map_err(|source| RepoError::Serialize { what: "manifest".to_string(), source })?;
        out.push_str("---\n");
        out.push_str(&doc);
    }
    Ok(out)
}

/// Whether `manifest` is a Flux `Kustomization`, the piece that bootstraps
/// the sync controller.
pub fn is_sync_controller_kustomization(manifest: &Value) -> bool {
    let kind = manifest.get("kind").and_then(Value::as_str);
    let api_version = manifest.get("apiVersion").and_then(Value::as_str).unwrap_or_default();
    kind == Some(KUSTOMIZATION_KIND) && api_version.contains(FLUX_KUSTOMIZE_GROUP)
}

/// Create `manifest`, or update it with the live resource version.
pub fn create_or_update(client: &dyn ClusterClient, manifest: &Value) -> Result<(), RepoError> {
    let key = ObjectKey::of(manifest)?;
    match client.get(&key)? {
        None => {
            tracing::debug!("creating {key}");
            client.create(&key, manifest)
        }
        Some(live) => {
            tracing::debug!("updating {key}");
            let mut desired = manifest.clone();
            if let Some(version) = live.pointer("/metadata/resourceVersion").cloned() {
                if let Some(Value::Object(metadata)) = desired.get_mut("metadata") {
                    metadata.insert("resourceVersion".to_string(), version);
                }
            }
            client.update(&key, &desired)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::BTreeMap;

    use serde_json::json;

    use super::*;

    /// In-memory cluster that bumps `resourceVersion` on every write and
    /// rejects updates carrying a stale one.
    #[derive(Default)]
    struct FakeCluster {
        objects: RefCell<BTreeMap<String, Value>>,
        updates: RefCell<Vec<Value>>,
    }

    impl FakeCluster {
        fn store(&self, key: &ObjectKey, object: &Value, version: u64) {
            let mut stored = object.clone();
            stored["metadata"]["resourceVersion"] = json!(version.to_string());
            self.objects.borrow_mut().insert(key.to_string(), stored);
        }
    }

    impl ClusterClient for FakeCluster {
        fn get(&self, key: &ObjectKey) -> Result<Option<Value>, RepoError> {
            Ok(self.objects.borrow().get(&key.to_string()).cloned())
        }

        fn create(&self, key: &ObjectKey, object: &Value) -> Result<(), RepoError> {
            assert!(self.get(key)?.is_none(), "create of existing {key}");
            self.store(key, object, 1);
            Ok(())
        }

        fn update(&self, key: &ObjectKey, object: &Value) -> Result<(), RepoError> {
            let live = self.get(key)?.expect("update of missing object");
            assert_eq!(live["metadata"]["resourceVersion"], object["metadata"]["resourceVersion"]);
            self.updates.borrow_mut().push(object.clone());
            let next = live["metadata"]["resourceVersion"].as_str().unwrap_or("0").parse::<u64>().unwrap_or(0) + 1;
            self.store(key, object, next);
            Ok(())
        }
    }

    fn kustomization() -> Value {
        json!({
            "apiVersion": "kustomize.toolkit.fluxcd.io/v1",
            "kind": "Kustomization",
            "metadata": {"name": "bootstrap", "namespace": "default"},
            "spec": {"path": "./envs/dev"},
        })
    }

    #[test]
    fn applying_twice_keeps_one_object_and_carries_version() {
        let cluster = FakeCluster::default();
        create_or_update(&cluster, &kustomization()).expect("create");
        create_or_update(&cluster, &kustomization()).expect("update");

        assert_eq!(cluster.objects.borrow().len(), 1);
        let updates = cluster.updates.borrow();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0]["metadata"]["resourceVersion"], json!("1"));
        let live = cluster.objects.borrow();
        let stored = live.values().next().expect("object");
        assert_eq!(stored["metadata"]["resourceVersion"], json!("2"));
    }

    #[test]
    fn object_key_resource_names() {
        let key = ObjectKey::of(&kustomization()).expect("key");
        assert_eq!(key.resource(), "Kustomization.v1.kustomize.toolkit.fluxcd.io");
        assert_eq!(key.to_string(), "Kustomization default/bootstrap");

        let core = ObjectKey::of(&json!({"apiVersion": "v1", "kind": "Namespace", "metadata": {"name": "flux-system"}}))
            .expect("key");
        assert_eq!(core.resource(), "Namespace");
        assert_eq!(core.namespace, None);
    }

    #[test]
    fn object_without_name_is_invalid() {
        let err = ObjectKey::of(&json!({"apiVersion": "v1", "kind": "ConfigMap", "metadata": {}})).unwrap_err();
        assert_eq!(err.to_string(), "invalid manifest: missing metadata.name");
    }

    #[test]
    fn manifest_stream_skips_empty_documents() {
        let stream = "---\napiVersion: v1\nkind: Namespace\nmetadata:\n  name: a\n---\n---\napiVersion: v1\nkind: Namespace\nmetadata:\n  name: b\n";
        let manifests = parse_manifests(stream).expect("parse");
        assert_eq!(manifests.len(), 2);
        assert_eq!(manifests[1]["metadata"]["name"], json!("b"));

        let out = to_yaml_stream(&manifests).expect("yaml");
        assert!(out.starts_with("---\napiVersion: v1\n"), "{out}");
        assert_eq!(out.matches("---\n").count(), 2);
    }

    #[test]
    fn only_flux_kustomizations_bootstrap_the_sync_controller() {
        assert!(is_sync_controller_kustomization(&kustomization()));
        assert!(!is_sync_controller_kustomization(&json!({
            "apiVersion": "kustomize.config.k8s.io/v1beta1",
            "kind": "Kustomization",
        })));
        assert!(!is_sync_controller_kustomization(&json!({
            "apiVersion": "kustomize.toolkit.fluxcd.io/v1",
            "kind": "Other",
        })));
    }
}
