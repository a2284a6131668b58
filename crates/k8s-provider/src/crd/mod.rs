//! Rust models of the custom resources this provider can render.
//!
//! Each CRD version lives in its own module and derives [`kube::CustomResource`], which fixes the
//! group, version and kind that get stamped onto rendered manifests.

pub mod mattermost;
