use crate::{
    api::Api,
    error::Error,
    model::{
        collection::CollectionProperty, definition::EntityDefinition,
        registry::DefinitionRegistry,
    },
    validate::{self, ValidationState, Violation, validate_value},
};
use metaloom_schema::uid;
use serde_json::{Value as JsonValue, json};
use std::collections::BTreeMap;
use thiserror::Error as ThisError;

///
/// EntityError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum EntityError {
    #[error("unknown property '{0}'")]
    UnknownProperty(String),

    #[error("property '{0}' is not writable")]
    NotWritable(String),

    #[error("attribute '{0}' does not apply to this entity type")]
    UnknownAttribute(String),
}

///
/// PropertyValue
///
/// One stored property value: raw JSON for scalars and embedded payloads,
/// or a live collection property for collections of references.
///

#[derive(Clone, Debug)]
pub enum PropertyValue {
    Json(JsonValue),
    Collection(CollectionProperty),
}

impl PropertyValue {
    #[must_use]
    pub const fn as_json(&self) -> Option<&JsonValue> {
        match self {
            Self::Json(value) => Some(value),
            Self::Collection(_) => None,
        }
    }

    #[must_use]
    pub const fn as_collection(&self) -> Option<&CollectionProperty> {
        match self {
            Self::Collection(collection) => Some(collection),
            Self::Json(_) => None,
        }
    }

    /// JSON snapshot of the value. Collections render as their member-id
    /// array, which is also the shape bounds-validation measures.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Json(value) => value.clone(),
            Self::Collection(collection) => JsonValue::Array(
                collection
                    .iter()
                    .filter_map(Entity::id)
                    .map(|id| json!({ "id": id }))
                    .collect(),
            ),
        }
    }
}

///
/// Entity
///
/// One materialized record. Holds the raw data values (the only mutable
/// storage), the dirty flag with its per-property name list, and a
/// back-reference to the definition that built it.
///

#[derive(Clone, Debug)]
pub struct Entity {
    definition: EntityDefinition,
    values: BTreeMap<String, PropertyValue>,
    dirty: bool,
    dirty_properties: Vec<String>,
}

impl Entity {
    pub(crate) fn new(definition: EntityDefinition) -> Self {
        Self {
            definition,
            values: BTreeMap::new(),
            dirty: false,
            dirty_properties: Vec::new(),
        }
    }

    #[must_use]
    pub const fn definition(&self) -> &EntityDefinition {
        &self.definition
    }

    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Property names mutated since the last save, in first-mutation order.
    #[must_use]
    pub fn dirty_property_names(&self) -> &[String] {
        &self.dirty_properties
    }

    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.value("id").and_then(JsonValue::as_str)
    }

    #[must_use]
    pub fn href(&self) -> Option<&str> {
        self.value("href").and_then(JsonValue::as_str)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.values.get(name)
    }

    /// Raw JSON value of a scalar property.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&JsonValue> {
        self.values.get(name).and_then(PropertyValue::as_json)
    }

    #[must_use]
    pub fn collection(&self, name: &str) -> Option<&CollectionProperty> {
        self.values.get(name).and_then(PropertyValue::as_collection)
    }

    #[must_use]
    pub fn collection_mut(&mut self, name: &str) -> Option<&mut CollectionProperty> {
        match self.values.get_mut(name) {
            Some(PropertyValue::Collection(collection)) => Some(collection),
            _ => None,
        }
    }

    /// Iterate stored property values.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Set a writable property.
    ///
    /// A non-composite value equal to the stored one is a no-op. Any
    /// object- or array-typed value always counts as changed — downstream
    /// persistence relies on this conservative invalidation, so it is not
    /// a candidate for deep-equality "fixing".
    pub fn set(&mut self, name: &str, value: JsonValue) -> Result<(), EntityError> {
        let descriptor = self
            .definition
            .properties()
            .get(name)
            .ok_or_else(|| EntityError::UnknownProperty(name.to_string()))?;
        if !descriptor.writable {
            return Err(EntityError::NotWritable(name.to_string()));
        }

        if !(value.is_object() || value.is_array())
            && self
                .values
                .get(name)
                .and_then(PropertyValue::as_json)
                .is_some_and(|current| *current == value)
        {
            return Ok(());
        }

        self.values.insert(name.to_string(), PropertyValue::Json(value));
        self.mark_dirty(name);

        Ok(())
    }

    /// Read a custom attribute value through the `attributeValues` view.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&JsonValue> {
        self.value("attributeValues")?
            .as_array()?
            .iter()
            .find(|entry| {
                entry
                    .pointer("/attribute/name")
                    .and_then(JsonValue::as_str)
                    .is_some_and(|candidate| candidate == name)
            })
            .and_then(|entry| entry.get("value"))
    }

    /// Write a custom attribute value, updating the matching
    /// `attributeValues` entry in place (or appending one). Marks the
    /// entity dirty on `attributeValues`.
    pub fn set_attribute(&mut self, name: &str, value: JsonValue) -> Result<(), EntityError> {
        let descriptor = self
            .definition
            .attribute_properties()
            .get(name)
            .cloned()
            .ok_or_else(|| EntityError::UnknownAttribute(name.to_string()))?;

        let entry = json!({
            "value": value,
            "attribute": { "id": descriptor.id, "name": descriptor.name },
        });

        let slot = self
            .values
            .entry("attributeValues".to_string())
            .or_insert_with(|| PropertyValue::Json(JsonValue::Array(Vec::new())));

        match slot {
            PropertyValue::Json(JsonValue::Array(entries)) => {
                let existing = entries.iter_mut().find(|candidate| {
                    candidate
                        .pointer("/attribute/name")
                        .and_then(JsonValue::as_str)
                        .is_some_and(|candidate| candidate == name)
                });

                match existing {
                    Some(existing) => {
                        existing["value"] = entry["value"].clone();
                    }
                    None => entries.push(entry),
                }
            }
            other => *other = PropertyValue::Json(JsonValue::Array(vec![entry])),
        }

        self.mark_dirty("attributeValues");
        Ok(())
    }

    /// Returns `true` if any collection property carries an unsaved delta.
    #[must_use]
    pub fn has_dirty_collections(&self) -> bool {
        self.values.values().any(|value| {
            value
                .as_collection()
                .is_some_and(CollectionProperty::is_dirty)
        })
    }

    /// Validate every declared property locally, then run the remote
    /// validation pass. Local and remote violations are concatenated;
    /// the aggregate status holds only when both lists are empty. Local
    /// failure skips the remote round-trip.
    pub async fn validate(&self, api: &dyn Api) -> Result<ValidationState, Error> {
        let mut messages = Vec::new();

        for (name, rule) in self.definition.validations().iter() {
            let constants = self
                .definition
                .properties()
                .get(name)
                .and_then(|descriptor| descriptor.constants.as_deref());
            let snapshot = self.get(name).map(PropertyValue::to_json);

            for violation in validate_value(rule, constants, snapshot.as_ref()).messages {
                messages.push(Violation {
                    message: violation.message,
                    property: Some(violation.property.unwrap_or_else(|| name.clone())),
                });
            }
        }

        if !messages.is_empty() {
            return Ok(ValidationState::from_messages(false, messages));
        }

        let remote = validate::validate_remote(
            api,
            self.definition.name(),
            self.definition.owned_payload(self),
        )
        .await?;

        let status = remote.is_empty();
        messages.extend(remote);

        Ok(ValidationState::from_messages(status, messages))
    }

    /// Persist local mutations.
    ///
    /// Clean entities reject immediately without a transport call.
    /// Invalid entities reject with the validation state without a
    /// persistence call. On success the dirty state clears; on transport
    /// failure it survives and the rejection propagates untouched.
    pub async fn save(&mut self, api: &dyn Api) -> Result<JsonValue, Error> {
        if !self.dirty {
            return Err(Error::NothingToSave);
        }

        let state = self.validate(api).await?;
        if !state.status {
            return Err(Error::Invalid(state));
        }

        let definition = self.definition.clone();
        let was_new = self.id().is_none();

        let response = definition.save(api, self).await?;

        self.dirty = false;
        self.dirty_properties.clear();
        if was_new {
            self.adopt_created_id(&response);
        }

        Ok(response)
    }

    /// Delete this entity on the server. Local state is left untouched.
    pub async fn delete(&self, api: &dyn Api) -> Result<JsonValue, Error> {
        self.definition.delete(api, self).await
    }

    /// Materialize a fresh copy of this entity from the server.
    pub async fn refresh(
        &self,
        api: &dyn Api,
        registry: &DefinitionRegistry,
    ) -> Result<Self, Error> {
        let id = self
            .id()
            .ok_or(crate::model::definition::DefinitionError::MissingIdentifier)?
            .to_string();

        self.definition.get(api, registry, &id, None).await
    }

    // Creation and materialization write values directly: they must not
    // mark the entity dirty.
    pub(crate) fn insert_raw(&mut self, name: impl Into<String>, value: PropertyValue) {
        self.values.insert(name.into(), value);
    }

    pub(crate) fn set_href_raw(&mut self, href: String) {
        self.values
            .insert("href".to_string(), PropertyValue::Json(json!(href)));
    }

    fn mark_dirty(&mut self, name: &str) {
        self.dirty = true;
        if !self.dirty_properties.iter().any(|existing| existing == name) {
            self.dirty_properties.push(name.to_string());
        }
    }

    fn adopt_created_id(&mut self, response: &JsonValue) {
        let created = response
            .pointer("/response/uid")
            .or_else(|| response.get("uid"))
            .and_then(JsonValue::as_str);

        if let Some(id) = created
            && uid::is_valid_uid(id)
        {
            self.insert_raw("id", PropertyValue::Json(json!(id)));
        }
    }
}
