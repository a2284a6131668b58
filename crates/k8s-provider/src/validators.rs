//! Field validators that run during the validation pass, before any lifecycle operation.
//!
//! Validators only look at values of the type they understand. A label validator handed a
//! string does nothing, the type check reports that mismatch.

use std::fmt::Debug;

use regex::Regex;
use serde_json::Value;

use crate::{diag::Diagnostics, schema::AttributePath, validation};

const INVALID_VALUE_SUMMARY: &str = "Invalid Attribute Value";

/// Checks a single configuration value and reports violations into `diagnostics`.
pub trait Validate: Debug + Send + Sync {
    /// Human readable description, shown in the schema.
    fn description(&self) -> String;

    fn validate(&self, value: &Value, path: &AttributePath, diagnostics: &mut Diagnostics);
}

/// Validates Kubernetes object names (lowercase RFC 1123 subdomains).
#[derive(Clone, Copy, Debug, Default)]
pub struct NameValidator;

impl Validate for NameValidator {
    fn description(&self) -> String {
        "must be a valid Kubernetes object name (lowercase RFC 1123 subdomain)".to_owned()
    }

    fn validate(&self, value: &Value, path: &AttributePath, diagnostics: &mut Diagnostics) {
        let Value::String(name) = value else {
            return;
        };

        if let Err(errors) = validation::is_rfc_1123_subdomain(name) {
            diagnostics.add_attribute_error(
                path,
                INVALID_VALUE_SUMMARY,
                format!("{name:?} is not a valid object name: {errors}"),
            );
        }
    }
}

/// Validates namespace names (lowercase RFC 1123 labels).
#[derive(Clone, Copy, Debug, Default)]
pub struct NamespaceValidator;

impl Validate for NamespaceValidator {
    fn description(&self) -> String {
        "must be a valid Kubernetes namespace name (lowercase RFC 1123 label)".to_owned()
    }

    fn validate(&self, value: &Value, path: &AttributePath, diagnostics: &mut Diagnostics) {
        let Value::String(namespace) = value else {
            return;
        };

        if let Err(errors) = validation::is_rfc_1123_label(namespace) {
            diagnostics.add_attribute_error(
                path,
                INVALID_VALUE_SUMMARY,
                format!("{namespace:?} is not a valid namespace name: {errors}"),
            );
        }
    }
}

/// Validates label maps: qualified keys and label values.
#[derive(Clone, Copy, Debug, Default)]
pub struct LabelValidator;

impl Validate for LabelValidator {
    fn description(&self) -> String {
        "keys must be qualified names and values must be valid label values".to_owned()
    }

    fn validate(&self, value: &Value, path: &AttributePath, diagnostics: &mut Diagnostics) {
        let Value::Object(labels) = value else {
            return;
        };

        for (key, value) in labels {
            let path = path.key(key);

            if let Err(errors) = validation::is_qualified_name(key) {
                diagnostics.add_attribute_error(
                    &path,
                    INVALID_VALUE_SUMMARY,
                    format!("{key:?} is not a valid label key: {errors}"),
                );
            }

            if let Value::String(value) = value {
                if let Err(errors) = validation::is_label_value(value) {
                    diagnostics.add_attribute_error(
                        &path,
                        INVALID_VALUE_SUMMARY,
                        format!("{value:?} is not a valid label value: {errors}"),
                    );
                }
            }
        }
    }
}

/// Validates annotation maps: qualified keys and the total size limit.
#[derive(Clone, Copy, Debug, Default)]
pub struct AnnotationValidator;

impl Validate for AnnotationValidator {
    fn description(&self) -> String {
        "keys must be qualified names and the total size must not exceed 256 KiB".to_owned()
    }

    fn validate(&self, value: &Value, path: &AttributePath, diagnostics: &mut Diagnostics) {
        let Value::Object(annotations) = value else {
            return;
        };

        for key in annotations.keys() {
            if let Err(errors) = validation::is_qualified_name(key) {
                diagnostics.add_attribute_error(
                    &path.key(key),
                    INVALID_VALUE_SUMMARY,
                    format!("{key:?} is not a valid annotation key: {errors}"),
                );
            }
        }

        let pairs = annotations
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str().unwrap_or_default()));
        if let Err(errors) = validation::is_annotations_size(pairs) {
            diagnostics.add_attribute_error(
                path,
                INVALID_VALUE_SUMMARY,
                format!("annotations are too large: {errors}"),
            );
        }
    }
}

/// Validates strings against a regular expression declared by the schema.
#[derive(Clone, Debug)]
pub struct PatternValidator {
    regex: Regex,
}

impl PatternValidator {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
        })
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }
}

impl Validate for PatternValidator {
    fn description(&self) -> String {
        format!("must match the regular expression {:?}", self.pattern())
    }

    fn validate(&self, value: &Value, path: &AttributePath, diagnostics: &mut Diagnostics) {
        let Value::String(string) = value else {
            return;
        };

        if !self.regex.is_match(string) {
            diagnostics.add_attribute_error(
                path,
                INVALID_VALUE_SUMMARY,
                format!(
                    "{string:?} does not match the regular expression {:?}",
                    self.pattern()
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::validation::QUANTITY_FMT;

    fn run(validator: &dyn Validate, value: Value) -> Diagnostics {
        let mut diagnostics = Diagnostics::new();
        validator.validate(
            &value,
            &AttributePath::from_dotted("metadata.name"),
            &mut diagnostics,
        );
        diagnostics
    }

    #[rstest]
    #[case("My_Name", true)]
    #[case("my_name", true)]
    #[case("MyName", true)]
    #[case("my-name", false)]
    #[case("mm1", false)]
    fn name_validator(#[case] name: &str, #[case] rejected: bool) {
        assert_eq!(run(&NameValidator, json!(name)).has_error(), rejected);
    }

    #[test]
    fn name_validator_ignores_other_types() {
        assert!(run(&NameValidator, json!(42)).is_empty());
    }

    #[test]
    fn label_validator_reports_each_violation() {
        let diagnostics = run(
            &LabelValidator,
            json!({
                "app.kubernetes.io/name": "mattermost",
                "bad key": "ok",
                "tier": "-frontend",
            }),
        );

        let paths = diagnostics
            .iter()
            .filter_map(|d| d.path.as_ref().map(ToString::to_string))
            .collect::<Vec<_>>();
        assert_eq!(
            paths,
            [r#"metadata.name["bad key"]"#, r#"metadata.name["tier"]"#]
        );
    }

    #[test]
    fn annotation_validator_allows_free_form_values() {
        let diagnostics = run(
            &AnnotationValidator,
            json!({ "example.com/note": "Anything goes: even spaces!" }),
        );
        assert!(diagnostics.is_empty());
    }

    #[rstest]
    #[case("10Gi", false)]
    #[case("500m", false)]
    #[case("ten gigs", true)]
    fn pattern_validator(#[case] size: &str, #[case] rejected: bool) {
        let validator = PatternValidator::new(QUANTITY_FMT).unwrap();
        assert_eq!(run(&validator, json!(size)).has_error(), rejected);
    }
}
