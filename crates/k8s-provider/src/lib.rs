//! Exposes Kubernetes custom resources as declarative provider resources.
//!
//! Every resource type owns an attribute [`Schema`](schema::Schema) derived from the Rust model
//! of one CRD version. Configuration is validated against that schema, decoded into the model
//! and rendered as a YAML manifest, which is kept in the resource [`State`](state::State) as the
//! computed `yaml` attribute. No cluster is ever contacted.
//!
//! ```
//! use k8s_provider::{provider::Provider, resource::CreateRequest, config::Config};
//!
//! let provider = Provider::kubernetes().unwrap();
//! let resource = provider
//!     .resource("k8s_installation_mattermost_com_mattermost_v1beta1")
//!     .unwrap();
//!
//! let config = Config::try_from(serde_json::json!({
//!     "metadata": { "name": "mm1" },
//!     "spec": { "replicas": 2 },
//! }))
//! .unwrap();
//!
//! let response = resource.create(CreateRequest { config: &config });
//! assert!(!response.diagnostics.has_error());
//! ```

pub mod clock;
pub mod config;
pub mod crd;
pub mod diag;
pub mod intstr;
pub mod manifest;
pub mod provider;
pub mod resource;
pub mod schema;
pub mod state;
pub mod validation;
pub mod validators;
pub mod yaml;

// External re-exports
pub use k8s_openapi;
pub use kube;
pub use schemars;
