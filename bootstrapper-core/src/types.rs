//! Component model types.
//!
//! A [`ComponentVersion`] is one node of the component graph; its
//! [`ComponentReference`]s are the edges. Field names follow the YAML emitted by
//! `ocm get componentversion --output yaml`, so the same types deserialize tool
//! output and serialize into template input.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LocationError;

/// Resource type of container images.
pub const OCI_IMAGE_RESOURCE_TYPE: &str = "ociImage";

// ---------------------------------------------------------------------------
// Component location
// ---------------------------------------------------------------------------

/// `<repository>//<componentName>[:<version>]`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComponentLocation {
    pub repository: String,
    pub name: String,
    pub version: Option<String>,
}

impl ComponentLocation {
    pub fn new(repository: impl Into<String>, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            name: name.into(),
            version: Some(version.into()),
        }
    }

    /// The location of the same component without a version.
    pub fn unversioned(&self) -> Self {
        Self {
            repository: self.repository.clone(),
            name: self.name.clone(),
            version: None,
        }
    }
}

/// `<repo>//<name>:<version>`
pub fn build_location(repo: &str, name: &str, version: &str) -> String {
    format!("{repo}//{name}:{version}")
}

impl fmt::Display for ComponentLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(v) => write!(f, "{}//{}:{}", self.repository, self.name, v),
            None => write!(f, "{}//{}", self.repository, self.name),
        }
    }
}

impl FromStr for ComponentLocation {
    type Err = LocationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || LocationError::InvalidFormat(s.to_string());

        // A scheme such as `oci://` belongs to the repository part.
        let search_from = s.find("://").map_or(0, |i| i + 3);
        let sep = s[search_from..].find("//").ok_or_else(invalid)? + search_from;

        let repository = &s[..sep];
        let component = &s[sep + 2..];
        if repository.is_empty() || component.is_empty() {
            return Err(invalid());
        }

        let (name, version) = match component.rsplit_once(':') {
            Some((name, version)) if !version.is_empty() => (name, Some(version.to_string())),
            Some(_) => return Err(invalid()),
            None => (component, None),
        };
        if name.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            repository: repository.to_string(),
            name: name.to_string(),
            version,
        })
    }
}

// ---------------------------------------------------------------------------
// Component graph
// ---------------------------------------------------------------------------

/// Root document of a component version descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentVersion {
    pub component: Component,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub component_references: Vec<ComponentReference>,
    #[serde(default)]
    pub resources: Vec<Resource>,
}

/// An edge to another component version. `name` is the local alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentReference {
    pub name: String,
    pub version: String,
    pub component_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(rename = "type", default)]
    pub resource_type: String,
    #[serde(default)]
    pub access: Access,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Access {
    #[serde(rename = "type", default)]
    pub access_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
}

impl ComponentVersion {
    pub fn name(&self) -> &str {
        &self.component.name
    }

    pub fn version(&self) -> &str {
        &self.component.version
    }

    /// The resource named `name` owned directly by this version.
    pub fn resource(&self, name: &str) -> Option<&Resource> {
        self.component.resources.iter().find(|r| r.name == name)
    }

    /// The reference aliased `name` declared directly by this version.
    pub fn reference(&self, name: &str) -> Option<&ComponentReference> {
        self.component.component_references.iter().find(|r| r.name == name)
    }

    pub fn references(&self) -> &[ComponentReference] {
        &self.component.component_references
    }

    /// All resources of the given type, in declaration order.
    pub fn resources_by_type<'a>(&'a self, resource_type: &'a str) -> impl Iterator<Item = &'a Resource> + 'a {
        self.component
            .resources
            .iter()
            .filter(move |r| r.resource_type == resource_type)
    }

    /// Location of this version inside `repository`.
    pub fn location(&self, repository: &str) -> ComponentLocation {
        ComponentLocation::new(repository, &self.component.name, &self.component.version)
    }
}

impl fmt::Display for ComponentVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.component.name, self.component.version)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
