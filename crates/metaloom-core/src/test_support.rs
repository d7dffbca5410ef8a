//! Transport doubles and schema fixtures.
//!
//! `RecordingApi` satisfies the transport contract without any network:
//! it records every issued request and replays queued responses. It is
//! public so embedders can exercise model flows in their own tests.

use crate::{
    api::{Api, ApiConfig, QueryParams, TransportError},
    model::{definition::EntityDefinition, entity::{Entity, PropertyValue}, registry::DefinitionRegistry},
};
use async_trait::async_trait;
use metaloom_schema::{AttributePayload, SchemaPayload};
use serde_json::{Value as JsonValue, json};
use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

///
/// Method
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

///
/// RecordedRequest
///

#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub query: QueryParams,
    pub body: Option<JsonValue>,
    pub replace_merge: Option<bool>,
}

///
/// RecordingApi
///
/// Replays queued responses in order; when the queue is empty every
/// request succeeds with an empty JSON object.
///

pub struct RecordingApi {
    config: ApiConfig,
    requests: Mutex<Vec<RecordedRequest>>,
    responses: Mutex<VecDeque<Result<JsonValue, TransportError>>>,
}

impl RecordingApi {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ApiConfig::new("https://play.example.com/api"))
    }

    #[must_use]
    pub const fn with_config(config: ApiConfig) -> Self {
        Self {
            config,
            requests: Mutex::new(Vec::new()),
            responses: Mutex::new(VecDeque::new()),
        }
    }

    /// Queue the response for the next request.
    pub fn enqueue(&self, response: Result<JsonValue, TransportError>) {
        self.responses
            .lock()
            .expect("response queue lock should not be poisoned")
            .push_back(response);
    }

    /// Every request issued so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .expect("request log lock should not be poisoned")
            .clone()
    }

    #[must_use]
    pub fn request_count(&self) -> usize {
        self.requests
            .lock()
            .expect("request log lock should not be poisoned")
            .len()
    }

    fn record(&self, request: RecordedRequest) -> Result<JsonValue, TransportError> {
        self.requests
            .lock()
            .expect("request log lock should not be poisoned")
            .push(request);

        self.responses
            .lock()
            .expect("response queue lock should not be poisoned")
            .pop_front()
            .unwrap_or_else(|| Ok(json!({})))
    }
}

impl Default for RecordingApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Api for RecordingApi {
    async fn get(&self, path: &str, query: &QueryParams) -> Result<JsonValue, TransportError> {
        self.record(RecordedRequest {
            method: Method::Get,
            path: path.to_string(),
            query: query.clone(),
            body: None,
            replace_merge: None,
        })
    }

    async fn post(&self, path: &str, body: JsonValue) -> Result<JsonValue, TransportError> {
        self.record(RecordedRequest {
            method: Method::Post,
            path: path.to_string(),
            query: QueryParams::new(),
            body: Some(body),
            replace_merge: None,
        })
    }

    async fn put(
        &self,
        path: &str,
        body: JsonValue,
        replace_merge: bool,
    ) -> Result<JsonValue, TransportError> {
        self.record(RecordedRequest {
            method: Method::Put,
            path: path.to_string(),
            query: QueryParams::new(),
            body: Some(body),
            replace_merge: Some(replace_merge),
        })
    }

    async fn delete(&self, path: &str) -> Result<JsonValue, TransportError> {
        self.record(RecordedRequest {
            method: Method::Delete,
            path: path.to_string(),
            query: QueryParams::new(),
            body: None,
            replace_merge: None,
        })
    }

    fn config(&self) -> &ApiConfig {
        &self.config
    }
}

//
// schema fixtures
//

/// A representative aggregate data element schema: scalar, constant,
/// reference, and reference-collection properties plus the embedded
/// passthrough arrays.
#[must_use]
pub fn data_element_schema() -> SchemaPayload {
    serde_json::from_value(json!({
        "klass": "org.metaloom.server.dataelement.DataElement",
        "singular": "dataElement",
        "plural": "dataElements",
        "shareable": true,
        "metadata": true,
        "identifiableObject": true,
        "translatable": true,
        "apiEndpoint": "https://play.example.com/api/dataElements",
        "properties": [
            {
                "name": "id",
                "propertyType": "IDENTIFIER",
                "persisted": true,
                "owner": true,
                "unique": true,
            },
            {
                "name": "name",
                "propertyType": "TEXT",
                "persisted": true,
                "writable": true,
                "required": true,
                "owner": true,
                "unique": true,
                "min": 1.0,
                "max": 230.0,
            },
            {
                "name": "shortName",
                "propertyType": "TEXT",
                "persisted": true,
                "writable": true,
                "owner": true,
                "max": 50.0,
            },
            {
                "name": "href",
                "propertyType": "URL",
            },
            {
                "name": "created",
                "propertyType": "DATE",
                "persisted": true,
            },
            {
                "name": "aggregationType",
                "propertyType": "CONSTANT",
                "persisted": true,
                "writable": true,
                "owner": true,
                "constants": ["SUM", "AVERAGE", "COUNT", "NONE"],
            },
            {
                "name": "domainType",
                "propertyType": "CONSTANT",
                "persisted": true,
                "writable": true,
                "owner": true,
                "constants": ["AGGREGATE", "TRACKER"],
            },
            {
                "name": "valueType",
                "propertyType": "CONSTANT",
                "persisted": true,
                "writable": true,
                "owner": true,
                "constants": ["TEXT", "INTEGER", "NUMBER", "BOOLEAN"],
            },
            {
                "name": "categoryCombo",
                "propertyType": "REFERENCE",
                "persisted": true,
                "writable": true,
                "owner": true,
                "href": "https://play.example.com/api/schemas/categoryCombo",
            },
            {
                "name": "dataElementGroup",
                "collectionName": "dataElementGroups",
                "collection": true,
                "propertyType": "COLLECTION",
                "itemPropertyType": "REFERENCE",
                "persisted": true,
                "writable": true,
                "href": "https://play.example.com/api/schemas/dataElementGroup",
            },
            {
                "name": "translation",
                "collectionName": "translations",
                "collection": true,
                "propertyType": "COLLECTION",
                "itemPropertyType": "COMPLEX",
                "persisted": true,
                "writable": true,
                "owner": true,
            },
            {
                "name": "attributeValue",
                "collectionName": "attributeValues",
                "collection": true,
                "propertyType": "COLLECTION",
                "itemPropertyType": "COMPLEX",
                "persisted": true,
                "writable": true,
                "owner": true,
            },
        ],
    }))
    .expect("data element schema fixture should deserialize")
}

#[must_use]
pub fn data_element_group_schema() -> SchemaPayload {
    serde_json::from_value(json!({
        "singular": "dataElementGroup",
        "plural": "dataElementGroups",
        "metadata": true,
        "identifiableObject": true,
        "apiEndpoint": "https://play.example.com/api/dataElementGroups",
        "properties": [
            { "name": "id", "propertyType": "IDENTIFIER", "persisted": true, "owner": true },
            { "name": "name", "propertyType": "TEXT", "persisted": true, "writable": true, "owner": true },
            {
                "name": "dataElement",
                "collectionName": "dataElements",
                "collection": true,
                "propertyType": "COLLECTION",
                "itemPropertyType": "REFERENCE",
                "persisted": true,
                "writable": true,
                "href": "https://play.example.com/api/schemas/dataElement",
            },
        ],
    }))
    .expect("data element group schema fixture should deserialize")
}

#[must_use]
pub fn data_element_operand_schema() -> SchemaPayload {
    serde_json::from_value(json!({
        "singular": "dataElementOperand",
        "plural": "dataElementOperands",
        "apiEndpoint": "https://play.example.com/api/dataElementOperands",
        "properties": [
            { "name": "id", "propertyType": "IDENTIFIER", "persisted": true, "owner": true },
        ],
    }))
    .expect("data element operand schema fixture should deserialize")
}

#[must_use]
pub fn data_set_schema() -> SchemaPayload {
    serde_json::from_value(json!({
        "singular": "dataSet",
        "plural": "dataSets",
        "metadata": true,
        "identifiableObject": true,
        "apiEndpoint": "https://play.example.com/api/dataSets",
        "properties": [
            { "name": "id", "propertyType": "IDENTIFIER", "persisted": true, "owner": true },
            { "name": "name", "propertyType": "TEXT", "persisted": true, "writable": true, "owner": true },
            { "name": "periodType", "propertyType": "TEXT", "persisted": true, "writable": true, "owner": true },
            { "name": "href", "propertyType": "URL" },
            {
                "name": "compulsoryDataElementOperand",
                "collectionName": "compulsoryDataElementOperands",
                "collection": true,
                "propertyType": "COLLECTION",
                "itemPropertyType": "REFERENCE",
                "persisted": true,
                "writable": true,
                "owner": true,
                "href": "https://play.example.com/api/schemas/dataElementOperand",
            },
            {
                "name": "dataElement",
                "collectionName": "dataElements",
                "collection": true,
                "propertyType": "COLLECTION",
                "itemPropertyType": "REFERENCE",
                "persisted": true,
                "writable": true,
                "href": "https://play.example.com/api/schemas/dataElement",
            },
        ],
    }))
    .expect("data set schema fixture should deserialize")
}

#[must_use]
pub fn organisation_unit_schema() -> SchemaPayload {
    serde_json::from_value(json!({
        "singular": "organisationUnit",
        "plural": "organisationUnits",
        "metadata": true,
        "identifiableObject": true,
        "apiEndpoint": "https://play.example.com/api/organisationUnits",
        "properties": [
            { "name": "id", "propertyType": "IDENTIFIER", "persisted": true, "owner": true },
            { "name": "name", "propertyType": "TEXT", "persisted": true, "writable": true, "owner": true },
            {
                "name": "child",
                "collectionName": "children",
                "collection": true,
                "propertyType": "COLLECTION",
                "itemPropertyType": "REFERENCE",
                "persisted": true,
                "href": "https://play.example.com/api/schemas/organisationUnit",
            },
        ],
    }))
    .expect("organisation unit schema fixture should deserialize")
}

#[must_use]
pub fn user_schema() -> SchemaPayload {
    serde_json::from_value(json!({
        "singular": "user",
        "plural": "users",
        "metadata": false,
        "identifiableObject": true,
        "apiEndpoint": "https://play.example.com/api/users",
        "properties": [
            { "name": "id", "propertyType": "IDENTIFIER", "persisted": true, "owner": true },
            { "name": "name", "propertyType": "TEXT", "persisted": true, "writable": true, "owner": true },
            { "name": "userCredentials", "propertyType": "COMPLEX", "persisted": true, "owner": true, "writable": true },
        ],
    }))
    .expect("user schema fixture should deserialize")
}

/// A custom attribute applicable to data elements only.
#[must_use]
pub fn marker_attribute() -> AttributePayload {
    serde_json::from_value(json!({
        "id": "S8a2OBRnqEc",
        "name": "marker",
        "valueType": "TEXT",
        "dataElementAttribute": true,
    }))
    .expect("attribute fixture should deserialize")
}

/// Registry over every fixture schema.
#[must_use]
pub fn test_registry() -> DefinitionRegistry {
    DefinitionRegistry::from_schemas(
        &[
            data_element_schema(),
            data_element_group_schema(),
            data_element_operand_schema(),
            data_set_schema(),
            organisation_unit_schema(),
            user_schema(),
        ],
        &[marker_attribute()],
    )
    .expect("fixture schemas should build a registry")
}

/// A standalone data element definition.
#[must_use]
pub fn data_element_definition() -> Arc<EntityDefinition> {
    Arc::new(
        EntityDefinition::from_schema(&data_element_schema(), &[marker_attribute()])
            .expect("data element schema fixture should build"),
    )
}

/// An otherwise-empty entity carrying only an identifier.
#[must_use]
pub fn entity_with_id(definition: &Arc<EntityDefinition>, id: &str) -> Entity {
    let mut entity = definition.create_empty();
    entity.insert_raw("id", PropertyValue::Json(json!(id)));
    entity
}
