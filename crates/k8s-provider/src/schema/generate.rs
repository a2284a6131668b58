//! Derives attribute trees from JSON schemas.
//!
//! The Rust model of a CRD is the single source of truth. Its [`JsonSchema`] implementation
//! yields a JSON schema, which is walked here to produce the [`Attribute`]s the configuration is
//! validated against. The same model is later serialized into the manifest, so both views share
//! one shape.
//!
//! Property names are converted to snake_case for configuration, the original camelCase name is
//! kept as [`Attribute::wire_name`].

use convert_case::{Case, Casing};
use schemars::JsonSchema;
use serde_json::{Map, Value};
use snafu::{ResultExt, Snafu};

use crate::{
    schema::{Attribute, AttributeKind},
    validators::PatternValidator,
};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to serialize the JSON schema of {type_name}"))]
    SerializeSchema {
        source: serde_json::Error,
        type_name: String,
    },

    #[snafu(display("the JSON schema of {type_name} does not describe an object"))]
    NotAnObject { type_name: String },

    #[snafu(display("schema reference {reference:?} cannot be resolved"))]
    UnresolvableReference { reference: String },

    #[snafu(display("property {property:?} declares an invalid pattern {pattern:?}"))]
    InvalidPattern {
        source: regex::Error,
        property: String,
        pattern: String,
    },
}

/// Returns the attributes of the object described by `T`'s JSON schema.
pub fn attributes_for<T: JsonSchema>() -> Result<Vec<Attribute>> {
    let type_name = T::schema_name().to_string();
    let root = serde_json::to_value(schemars::schema_for!(T))
        .context(SerializeSchemaSnafu { type_name: &type_name })?;

    let walker = SchemaWalker { root: &root };
    match walker.convert(&root, &[])?.kind {
        AttributeKind::Object { attributes } => Ok(attributes),
        _ => NotAnObjectSnafu { type_name }.fail(),
    }
}

/// The result of converting one (sub)schema.
struct Converted {
    kind: AttributeKind,
    description: Option<String>,
    pattern: Option<String>,
}

impl Converted {
    fn dynamic() -> Self {
        Self::from(AttributeKind::Dynamic)
    }
}

impl From<AttributeKind> for Converted {
    fn from(kind: AttributeKind) -> Self {
        Self {
            kind,
            description: None,
            pattern: None,
        }
    }
}

struct SchemaWalker<'a> {
    root: &'a Value,
}

impl<'a> SchemaWalker<'a> {
    /// Converts `schema` into an attribute kind. `seen` holds the references that are currently
    /// being expanded, a reference that is already in there is recursive and becomes
    /// [`AttributeKind::Dynamic`].
    fn convert(&self, schema: &'a Value, seen: &[&'a str]) -> Result<Converted> {
        let Value::Object(object) = schema else {
            // `true` (or anything else that is not an object) accepts any value
            return Ok(Converted::dynamic());
        };

        let description = object
            .get("description")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned);

        let mut converted = self.convert_object(object, seen)?;
        if description.is_some() {
            converted.description = description;
        }
        Ok(converted)
    }

    fn convert_object(&self, object: &'a Map<String, Value>, seen: &[&'a str]) -> Result<Converted> {
        if let Some(reference) = object.get("$ref").and_then(Value::as_str) {
            if seen.contains(&reference) {
                return Ok(Converted::dynamic());
            }

            let target = reference
                .strip_prefix('#')
                .and_then(|pointer| self.root.pointer(pointer))
                .ok_or_else(|| Error::UnresolvableReference {
                    reference: reference.to_owned(),
                })?;

            let mut seen = seen.to_vec();
            seen.push(reference);
            return self.convert(target, &seen);
        }

        if let Some(variants) = object
            .get("anyOf")
            .or_else(|| object.get("oneOf"))
            .and_then(Value::as_array)
        {
            let non_null = variants.iter().filter(|v| !is_null_schema(v)).collect::<Vec<_>>();
            return match non_null.as_slice() {
                [single] => self.convert(*single, seen),
                _ => Ok(Converted::dynamic()),
            };
        }

        if let Some([single]) = object.get("allOf").and_then(Value::as_array).map(Vec::as_slice) {
            return self.convert(single, seen);
        }

        if object
            .get("x-kubernetes-int-or-string")
            .and_then(Value::as_bool)
            .unwrap_or_default()
        {
            return Ok(AttributeKind::IntOrString.into());
        }

        let kind = match object.get("type") {
            Some(Value::String(ty)) => Some(ty.as_str()),
            Some(Value::Array(types)) => {
                let types = types
                    .iter()
                    .filter_map(Value::as_str)
                    .filter(|ty| *ty != "null")
                    .collect::<Vec<_>>();
                match types.as_slice() {
                    [single] => Some(*single),
                    _ => return Ok(Converted::dynamic()),
                }
            }
            _ if object.contains_key("properties") => Some("object"),
            _ if object.get("enum").and_then(Value::as_array).is_some_and(|values| {
                values.iter().all(Value::is_string)
            }) =>
            {
                Some("string")
            }
            _ => None,
        };

        let converted = match kind {
            Some("string") => Converted {
                kind: AttributeKind::String,
                description: None,
                pattern: object
                    .get("pattern")
                    .and_then(Value::as_str)
                    .map(ToOwned::to_owned),
            },
            Some("integer") => match object.get("format").and_then(Value::as_str) {
                Some("int32") => AttributeKind::Int32.into(),
                _ => AttributeKind::Int64.into(),
            },
            Some("number") => AttributeKind::Float64.into(),
            Some("boolean") => AttributeKind::Bool.into(),
            Some("array") => {
                let element = match object.get("items") {
                    Some(items) => self.convert(items, seen)?.kind,
                    None => AttributeKind::Dynamic,
                };
                AttributeKind::list(element).into()
            }
            Some("object") => self.convert_properties(object, seen)?,
            _ => Converted::dynamic(),
        };

        Ok(converted)
    }

    fn convert_properties(
        &self,
        object: &'a Map<String, Value>,
        seen: &[&'a str],
    ) -> Result<Converted> {
        if let Some(Value::Object(properties)) = object.get("properties") {
            let required = object
                .get("required")
                .and_then(Value::as_array)
                .map(|required| required.iter().filter_map(Value::as_str).collect::<Vec<_>>())
                .unwrap_or_default();

            let attributes = properties
                .iter()
                .map(|(wire_name, property)| {
                    self.attribute(wire_name, property, required.contains(&wire_name.as_str()), seen)
                })
                .collect::<Result<Vec<_>>>()?;

            return Ok(AttributeKind::Object { attributes }.into());
        }

        match object.get("additionalProperties") {
            Some(element @ Value::Object(_)) => {
                Ok(AttributeKind::map(self.convert(element, seen)?.kind).into())
            }
            _ => Ok(Converted::dynamic()),
        }
    }

    fn attribute(
        &self,
        wire_name: &str,
        property: &'a Value,
        required: bool,
        seen: &[&'a str],
    ) -> Result<Attribute> {
        let converted = self.convert(property, seen)?;

        let mut attribute = Attribute::new(wire_name.to_case(Case::Snake), converted.kind)
            .with_wire_name(wire_name)
            .with_description(converted.description.unwrap_or_default());

        if required {
            attribute = attribute.required();
        }

        if let Some(pattern) = converted.pattern {
            let validator = PatternValidator::new(&pattern).context(InvalidPatternSnafu {
                property: wire_name,
                pattern: &pattern,
            })?;
            attribute = attribute.with_validator(validator);
        }

        Ok(attribute)
    }
}

fn is_null_schema(schema: &Value) -> bool {
    schema.get("type").and_then(Value::as_str) == Some("null")
}
