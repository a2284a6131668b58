//! Utility functions for emitting data in the YAML file format.
use std::io::Write;

use snafu::{ResultExt, Snafu};

type Result<T, E = Error> = std::result::Result<T, E>;

/// Represents every error which can be encountered during YAML serialization.
#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to serialize YAML"))]
    SerializeYaml { source: serde_yaml::Error },

    #[snafu(display("failed to write YAML document separator"))]
    WriteDocumentSeparator { source: std::io::Error },

    #[snafu(display("failed to parse bytes as valid UTF-8 string"))]
    ParseUtf8Bytes { source: std::string::FromUtf8Error },
}

/// Provides configurable options during YAML serialization.
///
/// The default enables explicit document and singleton map serialization, which is what
/// multi-document output (like the CRD listing) needs. Manifests stored in state use
/// [`SerializeOptions::manifest`].
#[derive(Clone, Copy, Debug)]
pub struct SerializeOptions {
    /// Adds leading triple dashes (`---`) to the output string.
    pub explicit_document: bool,

    /// Serialize enum variants as YAML maps using the variant name as the key.
    pub singleton_map: bool,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self {
            explicit_document: true,
            singleton_map: true,
        }
    }
}

impl SerializeOptions {
    /// A bare single document, as stored in the `yaml` attribute.
    pub fn manifest() -> Self {
        Self {
            explicit_document: false,
            singleton_map: true,
        }
    }
}

/// Serializes any type `T` which is [serializable](serde::Serialize) as a YAML string.
pub trait ToYaml: serde::Serialize {
    fn to_yaml(&self, options: SerializeOptions) -> Result<String> {
        let mut buffer = Vec::new();
        serialize(self, &mut buffer, options)?;
        String::from_utf8(buffer).context(ParseUtf8BytesSnafu)
    }
}

impl<T> ToYaml for T where T: serde::Serialize + ?Sized {}

/// Provides the `CustomResourceDefinition` of a Kubernetes custom resource as YAML.
pub trait CustomResourceExt: kube::CustomResourceExt {
    /// Returns the `CustomResourceDefinition` as an explicit document with leading dashes
    /// (`---`).
    fn crd_yaml() -> Result<String> {
        Self::crd().to_yaml(SerializeOptions::default())
    }
}

impl<T> CustomResourceExt for T where T: kube::CustomResourceExt {}

/// Serializes the given data structure and writes it to a [`Writer`](Write).
pub fn serialize<T, W>(value: &T, mut writer: W, options: SerializeOptions) -> Result<()>
where
    T: serde::Serialize + ?Sized,
    W: Write,
{
    if options.explicit_document {
        writer
            .write_all(b"---\n")
            .context(WriteDocumentSeparatorSnafu)?;
    }

    let mut serializer = serde_yaml::Serializer::new(writer);

    if options.singleton_map {
        serde_yaml::with::singleton_map_recursive::serialize(&value, &mut serializer)
            .context(SerializeYamlSnafu)?;
    } else {
        value
            .serialize(&mut serializer)
            .context(SerializeYamlSnafu)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use serde::Serialize;

    use super::*;
    use crate::crd::mattermost::v1beta1::Mattermost;

    #[derive(Serialize)]
    enum Policy {
        Retain { days: u32 },
    }

    #[derive(Serialize)]
    struct Backup {
        policy: Policy,
    }

    #[test]
    fn manifest_options_omit_document_marker() {
        let yaml = Backup {
            policy: Policy::Retain { days: 7 },
        }
        .to_yaml(SerializeOptions::manifest())
        .unwrap();

        assert_eq!(
            yaml,
            indoc! {"
                policy:
                  Retain:
                    days: 7
            "}
        );
    }

    #[test]
    fn default_options_emit_document_marker() {
        let yaml = Backup {
            policy: Policy::Retain { days: 7 },
        }
        .to_yaml(SerializeOptions::default())
        .unwrap();

        assert!(yaml.starts_with("---\npolicy:\n"));
    }

    #[test]
    fn crd_yaml() {
        let yaml = Mattermost::crd_yaml().unwrap();
        assert!(yaml.starts_with("---\n"));
        assert!(yaml.contains("name: mattermosts.installation.mattermost.com"));
    }
}
