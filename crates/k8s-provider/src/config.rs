//! Resource configuration as supplied by the host.
//!
//! Configuration uses the snake_case attribute names of the [`Schema`]. Before it is decoded into
//! a model it is translated into the document shape: keys are renamed to their wire names, `null`
//! values are dropped and int-or-string values are normalized.

use std::{fs, path::Path};

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use snafu::{OptionExt, ResultExt, Snafu};

use crate::{
    diag::Diagnostics,
    intstr,
    schema::{Attribute, AttributeKind, AttributePath, Schema},
};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("configuration must be an object, got {found}"))]
    NotAnObject { found: &'static str },

    #[snafu(display("failed to read configuration file {path:?}"))]
    ReadFile {
        source: std::io::Error,
        path: std::path::PathBuf,
    },

    #[snafu(display("failed to parse configuration file {path:?}"))]
    ParseFile {
        source: serde_yaml::Error,
        path: std::path::PathBuf,
    },

    #[snafu(display("unsupported attribute {path}"))]
    UnknownAttribute { path: String },

    #[snafu(display("invalid value for {path}"))]
    InvalidIntOrString { source: intstr::Error, path: String },

    #[snafu(display("failed to decode configuration into {type_name}"))]
    DecodeModel {
        source: serde_json::Error,
        type_name: &'static str,
    },
}

/// The configuration of one resource: a JSON object keyed by attribute name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Config(Map<String, Value>);

impl TryFrom<Value> for Config {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Object(object) => Ok(Self(object)),
            other => NotAnObjectSnafu {
                found: intstr::type_name(&other),
            }
            .fail(),
        }
    }
}

impl From<Config> for Value {
    fn from(config: Config) -> Self {
        Self::Object(config.0)
    }
}

impl Config {
    /// Loads configuration from a YAML or JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).context(ReadFileSnafu { path })?;
        let value: Value = serde_yaml::from_str(&contents).context(ParseFileSnafu { path })?;
        Self::try_from(value)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name).filter(|value| !value.is_null())
    }

    /// Checks the configuration against `schema` and reports every problem found.
    ///
    /// `null` counts as absent. Validators only run on values that passed the type check.
    pub fn validate(&self, schema: &Schema) -> Diagnostics {
        let mut diagnostics = Diagnostics::new();
        validate_object(
            &schema.attributes,
            &self.0,
            &AttributePath::root(),
            &mut diagnostics,
        );
        diagnostics
    }

    /// Translates the configuration into the document shape described by `attributes`.
    ///
    /// Computed attributes are left out, they are never part of the document.
    pub fn to_document(&self, attributes: &[Attribute]) -> Result<Value> {
        translate_object(attributes, &self.0, &AttributePath::root()).map(Value::Object)
    }

    /// Translates the configuration and deserializes it into `T`.
    pub fn decode<T: DeserializeOwned>(&self, schema: &Schema) -> Result<T> {
        let document = self.to_document(&schema.attributes)?;
        serde_json::from_value(document).context(DecodeModelSnafu {
            type_name: std::any::type_name::<T>(),
        })
    }
}

fn validate_object(
    attributes: &[Attribute],
    object: &Map<String, Value>,
    path: &AttributePath,
    diagnostics: &mut Diagnostics,
) {
    for (name, value) in object {
        if !value.is_null() && !attributes.iter().any(|a| &a.name == name) {
            diagnostics.add_attribute_error(
                &path.attribute(name),
                "Unsupported Argument",
                format!("An argument named {name:?} is not expected here."),
            );
        }
    }

    for attribute in attributes {
        let path = path.attribute(&attribute.name);

        match object.get(&attribute.name).filter(|v| !v.is_null()) {
            None if attribute.required => diagnostics.add_attribute_error(
                &path,
                "Missing required argument",
                format!(
                    "The argument {:?} is required, but no definition was found.",
                    attribute.name
                ),
            ),
            None => {}
            Some(_) if attribute.is_computed_only() => diagnostics.add_attribute_error(
                &path,
                "Invalid Configuration for Read-Only Attribute",
                "Cannot set value for this attribute as the provider has marked it as read-only.",
            ),
            Some(value) => {
                if validate_value(&attribute.kind, value, &path, diagnostics) {
                    for validator in &attribute.validators {
                        validator.validate(value, &path, diagnostics);
                    }
                }
            }
        }
    }
}

/// Type checks `value` against `kind`, descending into collections. Returns whether the value
/// itself has the expected type.
fn validate_value(
    kind: &AttributeKind,
    value: &Value,
    path: &AttributePath,
    diagnostics: &mut Diagnostics,
) -> bool {
    let mismatch = |diagnostics: &mut Diagnostics, expected: &str| {
        diagnostics.add_attribute_error(
            path,
            "Incorrect attribute value type",
            format!("expected {expected}, got {}", intstr::type_name(value)),
        );
        false
    };

    match (kind, value) {
        (AttributeKind::Dynamic, _)
        | (AttributeKind::String, Value::String(_))
        | (AttributeKind::Bool, Value::Bool(_))
        | (AttributeKind::Float64, Value::Number(_)) => true,
        (AttributeKind::Int32, Value::Number(number)) if number.is_i64() || number.is_u64() => {
            number.as_i64().and_then(|n| i32::try_from(n).ok()).is_some()
                || mismatch(diagnostics, "a 32-bit integer")
        }
        (AttributeKind::Int64, Value::Number(number)) if number.is_i64() || number.is_u64() => {
            number.as_i64().is_some() || mismatch(diagnostics, "a 64-bit integer")
        }
        (AttributeKind::IntOrString, value) => match intstr::decode(value) {
            Ok(_) => true,
            Err(error) => {
                diagnostics.add_attribute_error(
                    path,
                    "Incorrect attribute value type",
                    error.to_string(),
                );
                false
            }
        },
        (AttributeKind::List { element }, Value::Array(items)) => {
            for (index, item) in items.iter().enumerate() {
                validate_element(element, item, &path.index(index), diagnostics);
            }
            true
        }
        (AttributeKind::Map { element }, Value::Object(entries)) => {
            for (key, entry) in entries.iter().filter(|(_, v)| !v.is_null()) {
                validate_element(element, entry, &path.key(key), diagnostics);
            }
            true
        }
        (AttributeKind::Object { attributes }, Value::Object(object)) => {
            validate_object(attributes, object, path, diagnostics);
            true
        }
        (AttributeKind::String, _) => mismatch(diagnostics, "a string"),
        (AttributeKind::Int32 | AttributeKind::Int64, _) => {
            mismatch(diagnostics, "a whole number")
        }
        (AttributeKind::Float64, _) => mismatch(diagnostics, "a number"),
        (AttributeKind::Bool, _) => mismatch(diagnostics, "a bool"),
        (AttributeKind::List { .. }, _) => mismatch(diagnostics, "a list"),
        (AttributeKind::Map { .. } | AttributeKind::Object { .. }, _) => {
            mismatch(diagnostics, "an object")
        }
    }
}

fn validate_element(
    kind: &AttributeKind,
    value: &Value,
    path: &AttributePath,
    diagnostics: &mut Diagnostics,
) {
    if value.is_null() && !matches!(kind, AttributeKind::Dynamic) {
        diagnostics.add_attribute_error(
            path,
            "Null value found in collection",
            "collection elements must not be null",
        );
        return;
    }
    validate_value(kind, value, path, diagnostics);
}

fn translate_object(
    attributes: &[Attribute],
    object: &Map<String, Value>,
    path: &AttributePath,
) -> Result<Map<String, Value>> {
    let mut document = Map::new();

    for (name, value) in object.iter().filter(|(_, v)| !v.is_null()) {
        let path = path.attribute(name);
        let attribute = attributes
            .iter()
            .find(|a| &a.name == name)
            .context(UnknownAttributeSnafu {
                path: path.to_string(),
            })?;

        if attribute.is_computed_only() {
            continue;
        }

        document.insert(
            attribute.wire_name.clone(),
            translate_value(&attribute.kind, value, &path)?,
        );
    }

    Ok(document)
}

fn translate_value(kind: &AttributeKind, value: &Value, path: &AttributePath) -> Result<Value> {
    let translated = match (kind, value) {
        (AttributeKind::IntOrString, value) => {
            intstr::normalize(value).context(InvalidIntOrStringSnafu {
                path: path.to_string(),
            })?
        }
        (AttributeKind::List { element }, Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(index, item)| translate_value(element, item, &path.index(index)))
            .collect::<Result<Vec<_>>>()?
            .into(),
        (AttributeKind::Map { element }, Value::Object(entries)) => entries
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(key, entry)| Ok((key.clone(), translate_value(element, entry, &path.key(key))?)))
            .collect::<Result<Map<_, _>>>()?
            .into(),
        (AttributeKind::Object { attributes }, Value::Object(object)) => {
            translate_object(attributes, object, path)?.into()
        }
        (_, value) => value.clone(),
    };

    Ok(translated)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use indoc::indoc;
    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::validators::NameValidator;

    fn schema() -> Schema {
        Schema::new(vec![
            Attribute::new("id", AttributeKind::Int64).computed(),
            Attribute::new(
                "metadata",
                AttributeKind::Object {
                    attributes: vec![
                        Attribute::new("name", AttributeKind::String)
                            .required()
                            .with_validator(NameValidator),
                        Attribute::new("labels", AttributeKind::map(AttributeKind::String)),
                    ],
                },
            )
            .required(),
            Attribute::new(
                "spec",
                AttributeKind::Object {
                    attributes: vec![
                        Attribute::new("replicas", AttributeKind::Int32),
                        Attribute::new("use_ingress_tls", AttributeKind::Bool)
                            .with_wire_name("useIngressTLS"),
                        Attribute::new(
                            "ports",
                            AttributeKind::list(AttributeKind::IntOrString),
                        ),
                    ],
                },
            ),
        ])
    }

    fn errors(config: Value) -> Vec<String> {
        Config::try_from(config)
            .unwrap()
            .validate(&schema())
            .errors()
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn valid_configuration() {
        assert!(
            errors(json!({
                "metadata": { "name": "mm1", "labels": { "app": "mattermost" } },
                "spec": { "replicas": 2, "ports": ["http", 8080] },
            }))
            .is_empty()
        );
    }

    #[test]
    fn null_counts_as_absent() {
        assert_eq!(
            errors(json!({ "metadata": null, "spec": null })),
            ["error: Missing required argument (at metadata): The argument \"metadata\" is required, but no definition was found."]
        );
    }

    #[test]
    fn unknown_and_read_only_attributes() {
        let errors = errors(json!({
            "id": 1,
            "metadata": { "name": "mm1", "nmae": "typo" },
        }));

        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("Read-Only"));
        assert!(errors[1].contains("(at metadata.nmae)"));
    }

    #[test]
    fn type_mismatches_are_reported_with_paths() {
        let errors = errors(json!({
            "metadata": { "name": "mm1", "labels": { "app": 1 } },
            "spec": { "replicas": "two", "ports": [1.5] },
        }));

        assert_eq!(errors.len(), 3);
        assert!(errors[0].contains(r#"(at metadata.labels["app"])"#));
        assert!(errors[1].contains("(at spec.replicas)"));
        assert!(errors[2].contains("(at spec.ports[0])"));
    }

    #[rstest]
    #[case(json!(2), true)]
    #[case(json!(i32::MAX), true)]
    #[case(json!(i32::MIN), true)]
    #[case(json!(3_000_000_000_u64), false)]
    #[case(json!(-3_000_000_000_i64), false)]
    #[case(json!(u64::MAX), false)]
    fn replicas_must_fit_32_bits(#[case] replicas: Value, #[case] valid: bool) {
        let errors = errors(json!({
            "metadata": { "name": "mm1" },
            "spec": { "replicas": replicas },
        }));

        if valid {
            assert!(errors.is_empty(), "{errors:?}");
        } else {
            assert_eq!(errors.len(), 1);
            assert!(
                errors[0].contains("Incorrect attribute value type (at spec.replicas)"),
                "{errors:?}"
            );
        }
    }

    #[test]
    fn validators_run_after_type_check() {
        let errors = errors(json!({ "metadata": { "name": "My_Name" } }));
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Invalid Attribute Value (at metadata.name)"));
    }

    #[test]
    fn document_uses_wire_names_and_drops_nulls() {
        let config = Config::try_from(json!({
            "metadata": { "name": "mm1", "labels": { "app.kubernetes.io/name": "mm", "tier": null } },
            "spec": { "use_ingress_tls": true, "replicas": null, "ports": ["8080", 8080] },
        }))
        .unwrap();

        assert_eq!(
            config.to_document(&schema().attributes).unwrap(),
            json!({
                "metadata": { "name": "mm1", "labels": { "app.kubernetes.io/name": "mm" } },
                "spec": { "useIngressTLS": true, "ports": ["8080", 8080] },
            })
        );
    }

    #[test]
    fn from_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            indoc! {"
                metadata:
                  name: mm1
                spec:
                  replicas: 2
            "}
            .as_bytes(),
        )
        .unwrap();

        let config = Config::from_path(file.path()).unwrap();
        assert_eq!(config.get("spec"), Some(&json!({ "replicas": 2 })));
    }

    #[test]
    fn rejects_non_objects() {
        assert!(matches!(
            Config::try_from(json!([1, 2])),
            Err(Error::NotAnObject { found: "a list" })
        ));
    }
}
