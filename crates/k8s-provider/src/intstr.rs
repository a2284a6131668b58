//! Codec for values that Kubernetes accepts either as an integer or as a string, such as probe
//! ports (`8080` or `"http"`).
//!
//! The form supplied in configuration is kept all the way into the rendered document. Strings
//! that look like numbers stay strings.

use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use serde_json::Value;
use snafu::{OptionExt, Snafu};

#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum Error {
    #[snafu(display("integer {value} does not fit into a 32-bit integer"))]
    OutOfRange { value: String },

    #[snafu(display("expected a whole number or a string, got {found}"))]
    InvalidType { found: &'static str },
}

/// Decodes a configuration value into an [`IntOrString`].
pub fn decode(value: &Value) -> Result<IntOrString, Error> {
    match value {
        Value::String(string) => Ok(IntOrString::String(string.clone())),
        Value::Number(number) if number.is_f64() => InvalidTypeSnafu {
            found: "a fractional number",
        }
        .fail(),
        Value::Number(number) => number
            .as_i64()
            .and_then(|int| i32::try_from(int).ok())
            .map(IntOrString::Int)
            .context(OutOfRangeSnafu {
                value: number.to_string(),
            }),
        other => InvalidTypeSnafu {
            found: type_name(other),
        }
        .fail(),
    }
}

/// Encodes an [`IntOrString`] back into the form it was decoded from.
pub fn encode(value: &IntOrString) -> Value {
    match value {
        IntOrString::Int(int) => Value::from(*int),
        IntOrString::String(string) => Value::from(string.as_str()),
    }
}

/// Runs `value` through [`decode`] and [`encode`], which normalizes it for the document.
pub fn normalize(value: &Value) -> Result<Value, Error> {
    decode(value).map(|decoded| encode(&decoded))
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a bool",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
