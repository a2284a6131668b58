//! The registry of resource types.

use std::{collections::BTreeMap, sync::Arc};

use snafu::{ResultExt, Snafu, ensure};

use crate::{
    crd::mattermost,
    resource::{self, ManifestResource, Resource},
};

type Result<T, E = Error> = std::result::Result<T, E>;

/// The prefix of all type names of [`Provider::kubernetes`].
pub const DEFAULT_PREFIX: &str = "k8s";

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to build resource type {kind}"))]
    BuildResource {
        source: resource::Error,
        kind: &'static str,
    },

    #[snafu(display("resource type {type_name} is registered twice"))]
    DuplicateResource { type_name: String },
}

/// Offers resource types under prefixed type names.
#[derive(Debug, Default)]
pub struct Provider {
    prefix: String,
    resources: BTreeMap<String, Arc<dyn Resource>>,
}

impl Provider {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            resources: BTreeMap::new(),
        }
    }

    /// The provider with every built-in resource type, using the `k8s` prefix.
    pub fn kubernetes() -> Result<Self> {
        Self::kubernetes_with_prefix(DEFAULT_PREFIX)
    }

    pub fn kubernetes_with_prefix(prefix: impl Into<String>) -> Result<Self> {
        let mut provider = Self::new(prefix);

        let mattermost =
            ManifestResource::<mattermost::v1beta1::Mattermost>::try_new().context(
                BuildResourceSnafu {
                    kind: "installation.mattermost.com/v1beta1 Mattermost",
                },
            )?;
        provider.register(mattermost)?;

        Ok(provider)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Registers `resource` under its type name and returns that name.
    pub fn register(&mut self, resource: impl Resource + 'static) -> Result<String> {
        let type_name = resource.type_name(&self.prefix);
        ensure!(
            !self.resources.contains_key(&type_name),
            DuplicateResourceSnafu { type_name }
        );

        tracing::debug!(%type_name, "registered resource type");
        self.resources.insert(type_name.clone(), Arc::new(resource));
        Ok(type_name)
    }

    pub fn resource(&self, type_name: &str) -> Option<Arc<dyn Resource>> {
        self.resources.get(type_name).cloned()
    }

    /// All registered type names in lexicographic order.
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }

    pub fn resources(&self) -> impl Iterator<Item = (&str, &Arc<dyn Resource>)> {
        self.resources.iter().map(|(name, resource)| (name.as_str(), resource))
    }
}
