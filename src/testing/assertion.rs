use std::collections::HashMap;
use std::fmt::{self, Display};

use serde::Serialize;
use serde_json::Value;

use crate::environment::{interpolate, interpolate_value};

/// JSON value kinds a field can be required to have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonKind {
    Null,
    Boolean,
    Number,
    String,
    Array,
    Object,
}

impl JsonKind {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => JsonKind::Null,
            Value::Bool(_) => JsonKind::Boolean,
            Value::Number(_) => JsonKind::Number,
            Value::String(_) => JsonKind::String,
            Value::Array(_) => JsonKind::Array,
            Value::Object(_) => JsonKind::Object,
        }
    }
}

impl Display for JsonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            JsonKind::Null => "null",
            JsonKind::Boolean => "boolean",
            JsonKind::Number => "number",
            JsonKind::String => "string",
            JsonKind::Array => "array",
            JsonKind::Object => "object",
        };
        write!(f, "{label}")
    }
}

/// Where in the decoded body an assertion looks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssertionTarget {
    /// The whole document.
    Body,
    /// A dotted path such as `user.email`; numeric segments index arrays.
    Field(String),
}

impl Display for AssertionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssertionTarget::Body => write!(f, "body"),
            AssertionTarget::Field(path) => write!(f, "`{path}`"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AssertionOperator {
    Exists,
    Equals(Value),
    Contains(String),
    IsKind(JsonKind),
    NotEmpty,
}

/// A single check evaluated against a decoded JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct Assertion {
    pub target: AssertionTarget,
    pub operator: AssertionOperator,
}

/// A failed expectation with what was expected and what came back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    pub check: String,
    pub expected: String,
    pub actual: String,
}

impl Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: expected {}, got {}", self.check, self.expected, self.actual)
    }
}

impl Assertion {
    pub fn field_present(path: &str) -> Self {
        Self::field(path, AssertionOperator::Exists)
    }

    pub fn field_equals(path: &str, expected: impl Into<Value>) -> Self {
        Self::field(path, AssertionOperator::Equals(expected.into()))
    }

    pub fn field_contains(path: &str, needle: &str) -> Self {
        Self::field(path, AssertionOperator::Contains(needle.to_string()))
    }

    pub fn field_is(path: &str, kind: JsonKind) -> Self {
        Self::field(path, AssertionOperator::IsKind(kind))
    }

    pub fn field_not_empty(path: &str) -> Self {
        Self::field(path, AssertionOperator::NotEmpty)
    }

    pub fn body_is(kind: JsonKind) -> Self {
        Self {
            target: AssertionTarget::Body,
            operator: AssertionOperator::IsKind(kind),
        }
    }

    fn field(path: &str, operator: AssertionOperator) -> Self {
        Self {
            target: AssertionTarget::Field(path.to_string()),
            operator,
        }
    }

    /// Substitute `{{var}}` placeholders in the expected values.
    pub fn resolve(&self, variables: &HashMap<String, String>) -> Self {
        let operator = match &self.operator {
            AssertionOperator::Equals(expected) => {
                AssertionOperator::Equals(interpolate_value(expected, variables))
            }
            AssertionOperator::Contains(needle) => {
                AssertionOperator::Contains(interpolate(needle, variables))
            }
            other => other.clone(),
        };
        Self {
            target: self.target.clone(),
            operator,
        }
    }

    pub fn evaluate(&self, body: &Value) -> Result<(), Violation> {
        let check = self.target.to_string();
        let actual = match &self.target {
            AssertionTarget::Body => Some(body),
            AssertionTarget::Field(path) => lookup(body, path),
        };

        let Some(actual) = actual else {
            return Err(Violation {
                check,
                expected: self.expectation(),
                actual: "missing".to_string(),
            });
        };

        let passed = match &self.operator {
            AssertionOperator::Exists => true,
            AssertionOperator::Equals(expected) => actual == expected,
            AssertionOperator::Contains(needle) => actual
                .as_str()
                .is_some_and(|text| text.contains(needle.as_str())),
            AssertionOperator::IsKind(kind) => JsonKind::of(actual) == *kind,
            AssertionOperator::NotEmpty => !is_empty(actual),
        };

        if passed {
            Ok(())
        } else {
            Err(Violation {
                check,
                expected: self.expectation(),
                actual: describe_actual(&self.operator, actual),
            })
        }
    }

    fn expectation(&self) -> String {
        match &self.operator {
            AssertionOperator::Exists => "present".to_string(),
            AssertionOperator::Equals(expected) => expected.to_string(),
            AssertionOperator::Contains(needle) => format!("a string containing {needle:?}"),
            AssertionOperator::IsKind(kind) => format!("a {kind}"),
            AssertionOperator::NotEmpty => "a non-empty value".to_string(),
        }
    }
}

fn describe_actual(operator: &AssertionOperator, actual: &Value) -> String {
    match operator {
        AssertionOperator::IsKind(_) => format!("a {}", JsonKind::of(actual)),
        _ => actual.to_string(),
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

fn lookup<'a>(body: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(body, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|index| items.get(index)),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn login_body() -> Value {
        json!({
            "token": "tok-123",
            "user": {"email": "admin@example.com", "role": "admin"},
            "connected_at": null,
            "items": [{"id": "p1"}]
        })
    }

    #[test]
    fn nested_fields_and_array_indices_resolve() {
        let body = login_body();
        assert!(Assertion::field_equals("user.email", "admin@example.com").evaluate(&body).is_ok());
        assert!(Assertion::field_equals("items.0.id", "p1").evaluate(&body).is_ok());
    }

    #[test]
    fn null_field_counts_as_present() {
        assert!(Assertion::field_present("connected_at").evaluate(&login_body()).is_ok());
    }

    #[test]
    fn missing_field_reports_missing() {
        let violation = Assertion::field_present("user.name")
            .evaluate(&login_body())
            .expect_err("missing field");

        assert_eq!(violation.check, "`user.name`");
        assert_eq!(violation.expected, "present");
        assert_eq!(violation.actual, "missing");
    }

    #[test]
    fn equality_mismatch_carries_both_values() {
        let violation = Assertion::field_equals("user.role", "viewer")
            .evaluate(&login_body())
            .expect_err("role differs");

        assert_eq!(violation.expected, "\"viewer\"");
        assert_eq!(violation.actual, "\"admin\"");
    }

    #[test]
    fn kind_checks_report_actual_kind() {
        let body = json!({"connected": "yes"});
        let violation = Assertion::field_is("connected", JsonKind::Boolean)
            .evaluate(&body)
            .expect_err("not a bool");

        assert_eq!(violation.expected, "a boolean");
        assert_eq!(violation.actual, "a string");
        assert!(Assertion::body_is(JsonKind::Array).evaluate(&json!([])).is_ok());
    }

    #[test]
    fn contains_requires_a_string() {
        let body = json!({
            "authorize_url": "https://www.dropbox.com/oauth2/authorize?client_id=abc",
            "n": 5
        });
        assert!(
            Assertion::field_contains("authorize_url", "dropbox.com/oauth2/authorize")
                .evaluate(&body)
                .is_ok()
        );
        assert!(Assertion::field_contains("n", "5").evaluate(&body).is_err());
    }

    #[test]
    fn not_empty_rejects_empty_strings_and_null() {
        assert!(Assertion::field_not_empty("token").evaluate(&json!({"token": ""})).is_err());
        assert!(Assertion::field_not_empty("token").evaluate(&json!({"token": null})).is_err());
        assert!(Assertion::field_not_empty("token").evaluate(&login_body()).is_ok());
    }

    #[test]
    fn resolve_interpolates_expected_values() {
        let mut vars = HashMap::new();
        vars.insert("email".to_string(), "admin@example.com".to_string());

        let resolved = Assertion::field_equals("user.email", "{{email}}").resolve(&vars);
        assert_eq!(resolved.operator, AssertionOperator::Equals(json!("admin@example.com")));
    }
}
