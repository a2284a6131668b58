// This is adapted from Kubernetes.
// See apimachinery/pkg/util/validation/validation.go, apimachinery/pkg/api/validation/objectmeta.go
// and apimachinery/pkg/api/resource/quantity.go in the Kubernetes source

use std::{fmt::Display, sync::LazyLock};

use const_format::concatcp;
use regex::Regex;
use snafu::Snafu;

/// Minimal length required by RFC 1123 is 63. Up to 255 allowed, unsupported by k8s.
const RFC_1123_LABEL_MAX_LENGTH: usize = 63;
const RFC_1123_LABEL_FMT: &str = "[a-z0-9]([-a-z0-9]*[a-z0-9])?";
const RFC_1123_LABEL_ERROR_MSG: &str = "a lowercase RFC 1123 label must consist of lower case alphanumeric characters or '-', and must start and end with an alphanumeric character";

/// This is a subdomain's max length in DNS (RFC 1123)
const RFC_1123_SUBDOMAIN_MAX_LENGTH: usize = 253;
const RFC_1123_SUBDOMAIN_FMT: &str =
    concatcp!(RFC_1123_LABEL_FMT, "(\\.", RFC_1123_LABEL_FMT, ")*");
const RFC_1123_SUBDOMAIN_ERROR_MSG: &str = "a lowercase RFC 1123 subdomain must consist of lower case alphanumeric characters, '-' or '.', and must start and end with an alphanumeric character";

const QUALIFIED_NAME_MAX_LENGTH: usize = 63;
const QUALIFIED_NAME_CHAR_FMT: &str = "[A-Za-z0-9]";
const QUALIFIED_NAME_EXT_CHAR_FMT: &str = "[-A-Za-z0-9_.]";
const QUALIFIED_NAME_FMT: &str = concatcp!(
    "(",
    QUALIFIED_NAME_CHAR_FMT,
    QUALIFIED_NAME_EXT_CHAR_FMT,
    "*)?",
    QUALIFIED_NAME_CHAR_FMT
);
const QUALIFIED_NAME_ERROR_MSG: &str = "name part must consist of alphanumeric characters, '-', '_' or '.', and must start and end with an alphanumeric character";

const LABEL_VALUE_MAX_LENGTH: usize = 63;
const LABEL_VALUE_ERROR_MSG: &str = "a valid label must be an empty string or consist of alphanumeric characters, '-', '_' or '.', and must start and end with an alphanumeric character";

/// The sum of all annotation keys and values must not exceed 256 KiB.
pub const TOTAL_ANNOTATION_SIZE_LIMIT: usize = 256 * 1024;

pub const QUANTITY_FMT: &str = r"^([+-]?[0-9.]+)([eEinumkKMGTP]*[-+]?[0-9]*)$";
const QUANTITY_ERROR_MSG: &str = "quantities must match the regular expression '^([+-]?[0-9.]+)([eEinumkKMGTP]*[-+]?[0-9]*)$'";

// Lazily initialized regular expressions
static RFC_1123_LABEL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^{RFC_1123_LABEL_FMT}$")).expect("failed to compile RFC 1123 label regex")
});

static RFC_1123_SUBDOMAIN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^{RFC_1123_SUBDOMAIN_FMT}$"))
        .expect("failed to compile RFC 1123 subdomain regex")
});

static QUALIFIED_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^{QUALIFIED_NAME_FMT}$")).expect("failed to compile qualified name regex")
});

static QUANTITY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(QUANTITY_FMT).expect("failed to compile quantity regex"));

type Result<T = (), E = Errors> = std::result::Result<T, E>;

/// A collection of errors discovered during validation.
#[derive(Debug)]
pub struct Errors(Vec<Error>);

impl Errors {
    pub fn iter(&self) -> impl Iterator<Item = &Error> {
        self.0.iter()
    }
}

impl<'a> IntoIterator for &'a Errors {
    type IntoIter = std::slice::Iter<'a, Error>;
    type Item = &'a Error;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Display for Errors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            let prefix = match i {
                0 => "",
                _ => ", ",
            };
            write!(f, "{prefix}{error}")?;
        }
        Ok(())
    }
}
impl std::error::Error for Errors {}

/// A single validation error.
#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(transparent)]
    Regex { source: RegexError },

    #[snafu(display("input is {length} bytes long but must be no more than {max_length}"))]
    TooLong { length: usize, max_length: usize },

    #[snafu(display("input must not be empty"))]
    Empty,

    #[snafu(display("prefix part {source}"))]
    Prefix { source: Box<Error> },
}

#[derive(Debug)]
pub struct RegexError {
    /// The primary error message.
    msg: &'static str,

    /// The regex that the input must match.
    regex: &'static str,

    /// Examples of valid inputs (if non-empty).
    examples: &'static [&'static str],
}

impl Display for RegexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Self {
            msg,
            regex,
            examples,
        } = self;
        write!(f, "{msg} (")?;
        if !examples.is_empty() {
            for (i, example) in examples.iter().enumerate() {
                let prefix = match i {
                    0 => "e.g.",
                    _ => "or",
                };
                write!(f, "{prefix} {example:?}, ")?;
            }
        }
        write!(f, "regex used for validation is {regex:?})")
    }
}

impl std::error::Error for RegexError {}

/// Returns [`Ok`] if `value`'s length fits within `max_length`.
fn validate_str_length(value: &str, max_length: usize) -> Result<(), Error> {
    if value.len() > max_length {
        TooLongSnafu {
            length: value.len(),
            max_length,
        }
        .fail()
    } else {
        Ok(())
    }
}

/// Returns [`Ok`] if `value` matches `regex`.
fn validate_str_regex(
    value: &str,
    regex: &'static Regex,
    error_msg: &'static str,
    examples: &'static [&'static str],
) -> Result<(), Error> {
    if regex.is_match(value) {
        Ok(())
    } else {
        Err(RegexError {
            msg: error_msg,
            regex: regex
                .as_str()
                // Clean up start/end-of-line markers
                .trim_start_matches('^')
                .trim_end_matches('$'),
            examples,
        }
        .into())
    }
}

/// Returns [`Ok`] if *all* validations are [`Ok`], otherwise returns all errors.
fn validate_all(validations: impl IntoIterator<Item = Result<(), Error>>) -> Result {
    let errors = validations
        .into_iter()
        .filter_map(|res| res.err())
        .collect::<Vec<_>>();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(Errors(errors))
    }
}

/// Tests for a string that conforms to the definition of a subdomain in DNS (RFC 1123), using
/// lower case characters only. This is the rule most Kubernetes object names follow.
pub fn is_rfc_1123_subdomain(value: &str) -> Result {
    validate_all([
        validate_str_length(value, RFC_1123_SUBDOMAIN_MAX_LENGTH),
        validate_str_regex(
            value,
            &RFC_1123_SUBDOMAIN_REGEX,
            RFC_1123_SUBDOMAIN_ERROR_MSG,
            &["example.com", "my-name"],
        ),
    ])
}

/// Tests for a string that conforms to the definition of a label in DNS (RFC 1123), using
/// lower case characters only. Namespaces are validated this way.
pub fn is_rfc_1123_label(value: &str) -> Result {
    validate_all([
        validate_str_length(value, RFC_1123_LABEL_MAX_LENGTH),
        validate_str_regex(
            value,
            &RFC_1123_LABEL_REGEX,
            RFC_1123_LABEL_ERROR_MSG,
            &["my-name", "123-abc"],
        ),
    ])
}

/// Tests whether `value` is a qualified name as used for label and annotation keys: a name part
/// with an optional DNS subdomain prefix, separated by a slash.
pub fn is_qualified_name(value: &str) -> Result {
    let (prefix, name) = match value.split_once('/') {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, value),
    };

    let prefix_result = match prefix {
        Some("") => Err(Error::Prefix {
            source: Box::new(Error::Empty),
        }),
        Some(prefix) => is_rfc_1123_subdomain(prefix).map_err(|errors| Error::Prefix {
            source: Box::new(errors.0.into_iter().next().unwrap_or(Error::Empty)),
        }),
        None => Ok(()),
    };

    if name.is_empty() {
        return validate_all([prefix_result, Err(Error::Empty)]);
    }

    validate_all([
        prefix_result,
        validate_str_length(name, QUALIFIED_NAME_MAX_LENGTH),
        validate_str_regex(
            name,
            &QUALIFIED_NAME_REGEX,
            QUALIFIED_NAME_ERROR_MSG,
            &["MyName", "my.name", "123-abc"],
        ),
    ])
}

/// Tests whether `value` is a valid label value. Empty values are allowed.
pub fn is_label_value(value: &str) -> Result {
    if value.is_empty() {
        return Ok(());
    }

    validate_all([
        validate_str_length(value, LABEL_VALUE_MAX_LENGTH),
        validate_str_regex(
            value,
            &QUALIFIED_NAME_REGEX,
            LABEL_VALUE_ERROR_MSG,
            &["MyValue", "my_value", "12345"],
        ),
    ])
}

/// Tests whether `value` looks like a Kubernetes quantity, e.g. `5Gi` or `500m`.
pub fn is_quantity(value: &str) -> Result {
    validate_all([validate_str_regex(
        value,
        &QUANTITY_REGEX,
        QUANTITY_ERROR_MSG,
        &["5Gi", "500m", "1e3"],
    )])
}

/// Tests whether the sum of all annotation keys and values fits within
/// [`TOTAL_ANNOTATION_SIZE_LIMIT`].
pub fn is_annotations_size<'a>(annotations: impl IntoIterator<Item = (&'a str, &'a str)>) -> Result {
    let total = annotations
        .into_iter()
        .map(|(key, value)| key.len() + value.len())
        .sum();

    validate_all([validate_str_length_total(total)])
}

fn validate_str_length_total(length: usize) -> Result<(), Error> {
    if length > TOTAL_ANNOTATION_SIZE_LIMIT {
        TooLongSnafu {
            length,
            max_length: TOTAL_ANNOTATION_SIZE_LIMIT,
        }
        .fail()
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("")]
    #[case("-")]
    #[case("a-")]
    #[case("-a")]
    #[case("My_Name")]
    #[case("MyName")]
    #[case("my_name")]
    #[case("a..b")]
    #[case(".a")]
    #[case("a b")]
    #[case("a@b")]
    #[case(&"a".repeat(254))]
    fn is_rfc_1123_subdomain_fail(#[case] value: &str) {
        assert!(is_rfc_1123_subdomain(value).is_err());
    }

    #[rstest]
    #[case("a")]
    #[case("0")]
    #[case("my-name")]
    #[case("mm1")]
    #[case("a--1--2--b")]
    #[case("a.b.c.d.e")]
    #[case("example.com")]
    #[case(&"a".repeat(253))]
    fn is_rfc_1123_subdomain_pass(#[case] value: &str) {
        assert!(is_rfc_1123_subdomain(value).is_ok());
    }

    #[rstest]
    #[case("team-a")]
    #[case("default")]
    #[case("1-a")]
    #[case(&"a".repeat(63))]
    fn is_rfc_1123_label_pass(#[case] value: &str) {
        assert!(is_rfc_1123_label(value).is_ok());
    }

    #[rstest]
    #[case("team.a")]
    #[case("Team-A")]
    #[case("team-")]
    #[case(&"a".repeat(64))]
    fn is_rfc_1123_label_fail(#[case] value: &str) {
        assert!(is_rfc_1123_label(value).is_err());
    }

    #[rstest]
    #[case("app")]
    #[case("App_Name")]
    #[case("app.kubernetes.io/name")]
    #[case("example.com/My.Key-1")]
    fn is_qualified_name_pass(#[case] value: &str) {
        assert!(is_qualified_name(value).is_ok());
    }

    #[rstest]
    #[case("")]
    #[case("/name")]
    #[case("prefix/")]
    #[case("Example.com/name")]
    #[case("-name")]
    #[case("a/b/c")]
    #[case(&"a".repeat(64))]
    fn is_qualified_name_fail(#[case] value: &str) {
        assert!(is_qualified_name(value).is_err());
    }

    #[rstest]
    #[case("")]
    #[case("v1")]
    #[case("My_Value.1")]
    fn is_label_value_pass(#[case] value: &str) {
        assert!(is_label_value(value).is_ok());
    }

    #[rstest]
    #[case("-v1")]
    #[case("v 1")]
    #[case(&"a".repeat(64))]
    fn is_label_value_fail(#[case] value: &str) {
        assert!(is_label_value(value).is_err());
    }

    #[rstest]
    #[case("5Gi")]
    #[case("500m")]
    #[case("1e3")]
    #[case("10")]
    #[case("+1.5G")]
    fn is_quantity_pass(#[case] value: &str) {
        assert!(is_quantity(value).is_ok());
    }

    #[rstest]
    #[case("")]
    #[case("Gi")]
    #[case("five")]
    #[case("5 Gi")]
    fn is_quantity_fail(#[case] value: &str) {
        assert!(is_quantity(value).is_err());
    }

    #[test]
    fn annotations_size_limit() {
        let big = "a".repeat(TOTAL_ANNOTATION_SIZE_LIMIT);
        assert!(is_annotations_size([("key", big.as_str())]).is_err());
        assert!(is_annotations_size([("key", "value")]).is_ok());
    }

    #[test]
    fn errors_display_all_violations() {
        let errors = is_rfc_1123_subdomain(&"A".repeat(254)).unwrap_err();
        assert_eq!(errors.iter().count(), 2);
        assert!(errors.to_string().starts_with("input is 254 bytes long"));
    }
}
