//! The document rendered for a resource.
//!
//! Configuration is decoded into a [`ManifestConfig`], whose spec is the CRD model itself. The
//! [`Manifest`] wraps it with the `apiVersion` and `kind` of the custom resource. Absent optional
//! fields are never emitted.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::yaml::{self, SerializeOptions, ToYaml};

/// Standard object metadata as accepted from configuration.
#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
pub struct Metadata {
    /// Name must be unique within a namespace. Must be a lowercase RFC 1123 subdomain.
    pub name: String,

    /// Namespace defines the space within which the name must be unique. Must be a lowercase
    /// RFC 1123 label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Map of string keys and values that can be used to organize and categorize objects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,

    /// Unstructured key value map stored with a resource that may be set by external tools.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,
}

impl From<Metadata> for ObjectMeta {
    fn from(metadata: Metadata) -> Self {
        Self {
            name: Some(metadata.name),
            namespace: metadata.namespace,
            labels: metadata.labels,
            annotations: metadata.annotations,
            ..Self::default()
        }
    }
}

/// The user supplied part of a manifest.
#[derive(Clone, Debug, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(bound(deserialize = "S: Deserialize<'de>"))]
pub struct ManifestConfig<S> {
    pub metadata: Metadata,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<S>,
}

/// A complete custom resource document.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest<S> {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec: Option<S>,
}

impl<S: Serialize> Manifest<S> {
    /// Builds the manifest of the custom resource `K`. Its `apiVersion` and `kind` always come
    /// from `K`, never from configuration.
    pub fn for_resource<K>(config: ManifestConfig<S>) -> Self
    where
        K: kube::Resource<DynamicType = ()>,
    {
        Self {
            api_version: K::api_version(&()).into_owned(),
            kind: K::kind(&()).into_owned(),
            metadata: config.metadata.into(),
            spec: config.spec,
        }
    }

    /// Renders the manifest as a single YAML document.
    pub fn render(&self) -> Result<String, yaml::Error> {
        self.to_yaml(SerializeOptions::manifest())
    }
}
