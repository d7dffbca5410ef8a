use crate::api::{Api, TransportError};
use metaloom_schema::PropertyKind;
use serde_json::Value as JsonValue;
use std::fmt;
use time::{
    Date, OffsetDateTime, PrimitiveDateTime,
    format_description::well_known::{Iso8601, Rfc3339},
};

///
/// ValidationRule
///
/// Per-property constraint set derived from the schema. One rule exists
/// for every property a definition exposes; the rule and descriptor maps
/// always share a key set.
///

#[derive(Clone, Debug, PartialEq)]
pub struct ValidationRule {
    pub persisted: bool,
    pub kind: PropertyKind,
    pub item_kind: Option<PropertyKind>,
    pub required: bool,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub owner: bool,
    pub unique: bool,
    pub writable: bool,
    pub ordered: bool,
    pub embedded_object: bool,
    /// Singular type name of the referenced entity, for `REFERENCE`
    /// properties and collections of references.
    pub reference_type: Option<String>,
}

impl ValidationRule {
    /// Returns `true` if this property holds a collection of references.
    #[must_use]
    pub fn is_reference_collection(&self) -> bool {
        self.kind.is_collection()
            && (self.reference_type.is_some()
                || self.item_kind.is_some_and(PropertyKind::is_reference))
    }
}

///
/// Violation
/// One validation failure, optionally tied to a property.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Violation {
    pub message: String,
    pub property: Option<String>,
}

impl Violation {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            property: None,
        }
    }

    #[must_use]
    pub fn on(property: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            property: Some(property.into()),
        }
    }
}

///
/// ValidationOutcome
/// Result of validating a single value against one rule.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ValidationOutcome {
    pub status: bool,
    pub messages: Vec<Violation>,
}

impl ValidationOutcome {
    #[must_use]
    pub const fn ok() -> Self {
        Self {
            status: true,
            messages: Vec::new(),
        }
    }

    /// Fold collected messages into an outcome; empty messages pass.
    #[must_use]
    pub fn from_messages(messages: Vec<Violation>) -> Self {
        Self {
            status: messages.is_empty(),
            messages,
        }
    }
}

///
/// ValidationState
///
/// Aggregate validation result for one entity: overall status, the
/// violating property names in first-seen order (de-duplicated), and
/// every collected message.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ValidationState {
    pub status: bool,
    pub fields: Vec<String>,
    pub messages: Vec<Violation>,
}

impl ValidationState {
    /// Fold violation messages into an aggregate state.
    #[must_use]
    pub fn from_messages(status: bool, messages: Vec<Violation>) -> Self {
        let mut fields = Vec::new();
        for violation in &messages {
            if let Some(property) = &violation.property
                && !fields.contains(property)
            {
                fields.push(property.clone());
            }
        }

        Self {
            status,
            fields,
            messages,
        }
    }
}

impl fmt::Display for ValidationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} violation(s) on [{}]",
            self.messages.len(),
            self.fields.join(", ")
        )
    }
}

/// Validate one value against its rule.
///
/// Checks run in order: required-ness, kind conformance, then bounds
/// (numeric min/max for numbers, length bounds for strings and
/// collections, membership for constant sets). Uniqueness is deferred to
/// remote validation. A missing value on a non-required property passes
/// without further checks.
#[must_use]
pub fn validate_value(
    rule: &ValidationRule,
    constants: Option<&[String]>,
    value: Option<&JsonValue>,
) -> ValidationOutcome {
    let mut messages = Vec::new();

    let value = match value {
        None | Some(JsonValue::Null) => {
            if rule.required {
                messages.push(Violation::new("a value is required"));
            }
            return ValidationOutcome::from_messages(messages);
        }
        Some(value) => value,
    };

    check_kind(rule, value, &mut messages);
    check_bounds(rule, value, &mut messages);
    check_constants(rule, constants, value, &mut messages);

    ValidationOutcome::from_messages(messages)
}

fn check_kind(rule: &ValidationRule, value: &JsonValue, messages: &mut Vec<Violation>) {
    let conforms = match rule.kind {
        PropertyKind::Boolean => value.is_boolean(),
        PropertyKind::Integer => value.as_i64().is_some() || value.as_u64().is_some(),
        PropertyKind::Number => value.is_number(),
        PropertyKind::Date => value.as_str().is_some_and(is_date_like),
        PropertyKind::Collection => value.is_array(),
        PropertyKind::Reference => value.is_object(),
        // Complex and geolocation payloads have no local shape contract.
        PropertyKind::Complex | PropertyKind::Geolocation => true,
        kind if kind.is_textual() => value.is_string(),
        _ => true,
    };

    if !conforms {
        messages.push(Violation::new(format!(
            "value does not conform to type {}",
            rule.kind
        )));
    }
}

fn check_bounds(rule: &ValidationRule, value: &JsonValue, messages: &mut Vec<Violation>) {
    if let Some(number) = value.as_f64() {
        if rule.min.is_some_and(|min| number < min) {
            messages.push(Violation::new(format!(
                "value is less than the minimum of {}",
                rule.min.unwrap_or_default()
            )));
        }
        if rule.max.is_some_and(|max| number > max) {
            messages.push(Violation::new(format!(
                "value exceeds the maximum of {}",
                rule.max.unwrap_or_default()
            )));
        }
        return;
    }

    let length = match value {
        JsonValue::String(text) => Some(text.chars().count() as f64),
        JsonValue::Array(items) => Some(items.len() as f64),
        _ => None,
    };

    if let Some(length) = length {
        if rule.min.is_some_and(|min| length < min) {
            messages.push(Violation::new(format!(
                "length is less than the minimum of {}",
                rule.min.unwrap_or_default()
            )));
        }
        if rule.max.is_some_and(|max| length > max) {
            messages.push(Violation::new(format!(
                "length exceeds the maximum of {}",
                rule.max.unwrap_or_default()
            )));
        }
    }
}

fn check_constants(
    rule: &ValidationRule,
    constants: Option<&[String]>,
    value: &JsonValue,
    messages: &mut Vec<Violation>,
) {
    if rule.kind != PropertyKind::Constant {
        return;
    }

    let Some(constants) = constants else {
        return;
    };

    let member = value
        .as_str()
        .is_some_and(|text| constants.iter().any(|constant| constant == text));

    if !member {
        messages.push(Violation::new(format!(
            "value is not one of [{}]",
            constants.join(", ")
        )));
    }
}

fn is_date_like(text: &str) -> bool {
    OffsetDateTime::parse(text, &Rfc3339).is_ok()
        || PrimitiveDateTime::parse(text, &Iso8601::DEFAULT).is_ok()
        || Date::parse(text, &Iso8601::DEFAULT).is_ok()
}

/// Remote validation pass: submits the entity's persistable payload to the
/// server's schema validation endpoint and maps the returned reports to
/// violations. A transport failure is surfaced, never treated as "valid".
pub async fn validate_remote(
    api: &dyn Api,
    singular: &str,
    payload: JsonValue,
) -> Result<Vec<Violation>, TransportError> {
    let response = api.post(&format!("schemas/{singular}"), payload).await?;

    Ok(reports_from(&response))
}

fn reports_from(response: &JsonValue) -> Vec<Violation> {
    let reports = response
        .get("errorReports")
        .or_else(|| response.get("response").and_then(|r| r.get("errorReports")))
        .and_then(JsonValue::as_array);

    let Some(reports) = reports else {
        return Vec::new();
    };

    reports
        .iter()
        .filter_map(|report| {
            let message = report.get("message").and_then(JsonValue::as_str)?;
            let property = report
                .get("errorProperty")
                .and_then(JsonValue::as_str)
                .map(ToString::to_string);

            Some(Violation {
                message: message.to_string(),
                property,
            })
        })
        .collect()
}
