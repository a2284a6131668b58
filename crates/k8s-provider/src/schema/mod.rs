//! Declarative attribute schemas.
//!
//! A [`Schema`] describes every attribute a resource accepts or computes: its type, whether it
//! is required, optional or computed, its documentation and the validators that run on it.
//! Schemas of Kubernetes models are not written by hand but derived from their JSON schema, see
//! [`generate`].

use std::{collections::BTreeSet, fmt::Debug, sync::Arc};

use serde::{Serialize, Serializer, ser::SerializeSeq};
use snafu::{Snafu, ensure};

use crate::validators::Validate;

pub mod generate;
mod path;

pub use path::*;

type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors for schemas whose attribute flags the host would reject.
#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum Error {
    #[snafu(display("attribute {path} cannot be both required and optional"))]
    RequiredAndOptional { path: String },

    #[snafu(display("attribute {path} cannot be both required and computed"))]
    RequiredAndComputed { path: String },

    #[snafu(display("attribute {path} must be required, optional or computed"))]
    MissingPresence { path: String },

    #[snafu(display("attribute {path} is declared more than once"))]
    DuplicateAttribute { path: String },
}

/// The type of an attribute value.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AttributeKind {
    String,

    /// A whole number in the `i32` range, declared with the `int32` format.
    Int32,
    Int64,
    Float64,
    Bool,

    /// Either a whole number or a string, see [`crate::intstr`].
    IntOrString,

    List {
        element: Box<AttributeKind>,
    },

    /// String keyed map. Keys are passed through untouched.
    Map {
        element: Box<AttributeKind>,
    },

    Object {
        attributes: Vec<Attribute>,
    },

    /// Any value, passed through unchanged.
    Dynamic,
}

impl AttributeKind {
    pub fn list(element: Self) -> Self {
        Self::List {
            element: Box::new(element),
        }
    }

    pub fn map(element: Self) -> Self {
        Self::Map {
            element: Box::new(element),
        }
    }

    /// Returns the nested attributes if this is an object, or a list or map of objects.
    pub fn nested_attributes(&self) -> Option<&[Attribute]> {
        match self {
            Self::Object { attributes } => Some(attributes),
            Self::List { element } | Self::Map { element } => element.nested_attributes(),
            _ => None,
        }
    }

    fn nested_attributes_mut(&mut self) -> Option<&mut Vec<Attribute>> {
        match self {
            Self::Object { attributes } => Some(attributes),
            Self::List { element } | Self::Map { element } => element.nested_attributes_mut(),
            _ => None,
        }
    }
}

/// A single attribute of a resource or nested object.
#[derive(Clone, Debug, Serialize)]
pub struct Attribute {
    /// The name used in configuration and state, e.g. `storage_size`.
    pub name: String,

    /// The key used in the rendered manifest, e.g. `storageSize`.
    pub wire_name: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,

    pub kind: AttributeKind,

    pub required: bool,
    pub optional: bool,

    /// Set by the provider, never by the user.
    pub computed: bool,

    #[serde(
        serialize_with = "serialize_validators",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub validators: Vec<Arc<dyn Validate>>,
}

impl Attribute {
    /// Creates an optional attribute whose manifest key equals its name.
    pub fn new(name: impl Into<String>, kind: AttributeKind) -> Self {
        let name = name.into();
        Self {
            wire_name: name.clone(),
            name,
            description: String::new(),
            kind,
            required: false,
            optional: true,
            computed: false,
            validators: Vec::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self.optional = false;
        self
    }

    /// Marks the attribute as computed only: never accepted from configuration.
    pub fn computed(mut self) -> Self {
        self.computed = true;
        self.optional = false;
        self.required = false;
        self
    }

    pub fn with_wire_name(mut self, wire_name: impl Into<String>) -> Self {
        self.wire_name = wire_name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_validator(mut self, validator: impl Validate + 'static) -> Self {
        self.validators.push(Arc::new(validator));
        self
    }

    /// Returns `true` for attributes the user must not set.
    pub fn is_computed_only(&self) -> bool {
        self.computed && !self.optional && !self.required
    }
}

fn serialize_validators<S: Serializer>(
    validators: &[Arc<dyn Validate>],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut seq = serializer.serialize_seq(Some(validators.len()))?;
    for validator in validators {
        seq.serialize_element(&validator.description())?;
    }
    seq.end()
}

/// The top level schema of a resource type.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Schema {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,

    pub attributes: Vec<Attribute>,
}

impl Schema {
    pub fn new(attributes: Vec<Attribute>) -> Self {
        Self {
            description: String::new(),
            attributes,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Looks up an attribute by its dotted path of attribute names, descending into nested
    /// objects as well as lists and maps of objects.
    pub fn attribute(&self, path: &AttributePath) -> Option<&Attribute> {
        let mut attributes = self.attributes.as_slice();
        let mut found = None;

        for step in path.steps() {
            let PathStep::Attribute(name) = step else {
                continue;
            };
            let attribute = attributes.iter().find(|a| &a.name == name)?;
            attributes = attribute.kind.nested_attributes().unwrap_or_default();
            found = Some(attribute);
        }

        found
    }

    /// Mutable counterpart of [`Schema::attribute`], used to attach validators after a schema
    /// has been generated.
    pub fn attribute_mut(&mut self, path: &AttributePath) -> Option<&mut Attribute> {
        let (last, parents) = path.steps().split_last()?;
        let mut attributes = &mut self.attributes;

        for step in parents {
            let PathStep::Attribute(name) = step else {
                continue;
            };
            let attribute = attributes.iter_mut().find(|a| &a.name == name)?;
            attributes = attribute.kind.nested_attributes_mut()?;
        }

        let PathStep::Attribute(name) = last else {
            return None;
        };
        attributes.iter_mut().find(|a| &a.name == name)
    }

    /// Checks the flag invariants of every attribute.
    ///
    /// - exactly one of required, optional or computed-only is set
    /// - required attributes are never computed
    /// - attribute names are unique per object
    pub fn check(&self) -> Result<()> {
        check_attributes(&self.attributes, &AttributePath::root())
    }
}

fn check_attributes(attributes: &[Attribute], parent: &AttributePath) -> Result<()> {
    let mut names = BTreeSet::new();

    for attribute in attributes {
        let path = parent.attribute(&attribute.name);

        ensure!(
            names.insert(attribute.name.as_str()),
            DuplicateAttributeSnafu {
                path: path.to_string()
            }
        );
        ensure!(
            !(attribute.required && attribute.optional),
            RequiredAndOptionalSnafu {
                path: path.to_string()
            }
        );
        ensure!(
            !(attribute.required && attribute.computed),
            RequiredAndComputedSnafu {
                path: path.to_string()
            }
        );
        ensure!(
            attribute.required || attribute.optional || attribute.computed,
            MissingPresenceSnafu {
                path: path.to_string()
            }
        );

        if let Some(nested) = attribute.kind.nested_attributes() {
            check_attributes(nested, &path)?;
        }
    }

    Ok(())
}
