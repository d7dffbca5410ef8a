use convert_case::{Case, Casing};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

///
/// SchemaList
/// Envelope of the `schemas` endpoint response.
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct SchemaList {
    #[serde(default)]
    pub schemas: Vec<SchemaPayload>,
}

///
/// SchemaPayload
///
/// One entity type's shape and constraints as the server describes it.
/// Everything here is descriptive input; nothing is validated until a
/// definition is built from it.
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchemaPayload {
    pub klass: Option<String>,
    pub singular: String,
    pub plural: String,
    pub display_name: Option<String>,
    pub api_endpoint: Option<String>,
    pub shareable: bool,
    pub metadata: bool,
    pub identifiable_object: bool,
    pub translatable: bool,
    pub authorities: Vec<JsonValue>,
    pub properties: Vec<PropertySchema>,
}

impl SchemaPayload {
    /// Human-readable name: the server's display name when present, else a
    /// title-cased rendering of the singular type name.
    #[must_use]
    pub fn resolved_display_name(&self) -> String {
        self.display_name
            .clone()
            .unwrap_or_else(|| self.singular.to_case(Case::Title))
    }

    /// Endpoint segment relative to the configured API root.
    /// Schemas publish absolute hrefs; only the trailing segment routes.
    #[must_use]
    pub fn relative_api_endpoint(&self) -> &str {
        self.api_endpoint
            .as_deref()
            .and_then(|endpoint| endpoint.rsplit('/').next())
            .filter(|segment| !segment.is_empty())
            .unwrap_or(&self.plural)
    }
}

///
/// PropertySchema
///
/// One property descriptor inside a schema payload.
///
/// The externally visible name of a collection property is its
/// `collection_name`; `name` holds the singular form the server uses
/// internally. A property resolving to neither name is skipped by
/// definition construction.
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PropertySchema {
    pub name: Option<String>,
    pub collection_name: Option<String>,
    pub collection: bool,
    pub writable: bool,
    pub persisted: bool,
    pub required: bool,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub owner: bool,
    pub unique: bool,
    pub property_type: Option<String>,
    pub item_property_type: Option<String>,
    pub href: Option<String>,
    pub ordered: bool,
    pub embedded_object: bool,
    pub constants: Option<Vec<String>>,
    pub translation_key: Option<String>,
}

impl PropertySchema {
    /// Resolve the externally visible property name.
    #[must_use]
    pub fn resolved_name(&self) -> Option<&str> {
        if self.collection {
            self.collection_name.as_deref()
        } else {
            self.name.as_deref()
        }
    }

    /// Last path segment of the property's `href`, which for reference
    /// properties names the referenced entity type.
    #[must_use]
    pub fn href_type(&self) -> Option<&str> {
        self.href
            .as_deref()
            .and_then(|href| href.rsplit('/').next())
            .filter(|segment| !segment.is_empty())
    }
}

///
/// AttributeList
/// Envelope of the `attributes` endpoint response.
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct AttributeList {
    #[serde(default)]
    pub attributes: Vec<AttributePayload>,
}

///
/// AttributePayload
///
/// Custom attribute metadata. Applicability is published as one boolean
/// flag per entity type (`dataElementAttribute`, `userAttribute`, ...),
/// captured here as flattened extra fields.
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributePayload {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub value_type: Option<String>,
    #[serde(default)]
    pub mandatory: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(flatten)]
    pub flags: BTreeMap<String, JsonValue>,
}

impl AttributePayload {
    /// Returns `true` if this attribute applies to the given entity type.
    #[must_use]
    pub fn applies_to(&self, entity_type: &str) -> bool {
        self.flags
            .get(&format!("{entity_type}Attribute"))
            .and_then(JsonValue::as_bool)
            .unwrap_or(false)
    }
}
