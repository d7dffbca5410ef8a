use crate::{
    api::{Api, QueryParams},
    error::Error,
    model::{
        attribute::AttributeDescriptor,
        collection::{Collection, CollectionProperty, Pager},
        defaults,
        entity::{Entity, PropertyValue},
        registry::DefinitionRegistry,
    },
    validate::ValidationRule,
};
use metaloom_schema::{AttributePayload, PropertyKind, PropertyKindError, SchemaPayload};
use serde_json::{Map as JsonMap, Value as JsonValue, json};
use std::{collections::BTreeMap, sync::Arc};
use thiserror::Error as ThisError;
use tracing::debug;

/// Field selection used when reading a single entity.
const DEFAULT_READ_FIELDS: &str = ":all,attributeValues[:all,attribute[id,name,displayName]]";

/// Users are read with their credentials expanded.
const USER_READ_FIELDS: &str = ":all,userCredentials[:owner]";

/// Field selection used when listing.
const DEFAULT_LIST_FIELDS: &str = ":all";

/// Raw array properties that bypass reference-collection wrapping: their
/// elements are embedded payloads, not links to other entities.
const PASSTHROUGH_PROPERTIES: [&str; 2] = ["translations", "greyedFields"];

///
/// DefinitionError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum DefinitionError {
    #[error("schema singular name must be a non-empty string")]
    MissingSingularName,

    #[error("schema plural name must be a non-empty string")]
    MissingPluralName,

    #[error("property '{property}': {source}")]
    Property {
        property: String,
        source: PropertyKindError,
    },

    #[error("entity data must be a JSON object")]
    DataNotAnObject,

    #[error("entity has no identifier")]
    MissingIdentifier,

    #[error("batch read requires at least one identifier")]
    EmptyIdentifierBatch,
}

///
/// DefinitionKind
///
/// Closed set of specialized definition behaviors. The variant is chosen
/// from the schema's singular name; everything not special-cased uses the
/// generic read/list/create paths.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum DefinitionKind {
    #[default]
    Generic,
    User,
    DataSet,
    OrganisationUnit,
}

impl DefinitionKind {
    #[must_use]
    fn for_name(singular: &str) -> Self {
        match singular {
            "user" => Self::User,
            "dataSet" => Self::DataSet,
            "organisationUnit" => Self::OrganisationUnit,
            _ => Self::Generic,
        }
    }

    #[must_use]
    pub const fn default_read_fields(self) -> &'static str {
        match self {
            Self::User => USER_READ_FIELDS,
            _ => DEFAULT_READ_FIELDS,
        }
    }
}

///
/// PropertyDescriptor
///
/// Per-property access metadata. Read access always exists; write access
/// only when the schema marks the property writable. Constant-kind
/// properties carry their permitted value set.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PropertyDescriptor {
    pub writable: bool,
    pub constants: Option<Vec<String>>,
}

///
/// EntityDefinition
///
/// The schema-derived factory and metadata object for one entity type.
/// Immutable once built: the descriptor and rule tables are shared behind
/// `Arc`s and never mutated, so clones (which carry an independent filter
/// chain) stay cheap and safe.
///

#[derive(Clone, Debug)]
pub struct EntityDefinition {
    kind: DefinitionKind,
    name: String,
    display_name: String,
    plural: String,
    shareable: bool,
    metadata: bool,
    identifiable_object: bool,
    translatable: bool,
    java_class: Option<String>,
    api_endpoint: String,
    authorities: Vec<JsonValue>,
    properties: Arc<BTreeMap<String, PropertyDescriptor>>,
    validations: Arc<BTreeMap<String, ValidationRule>>,
    attribute_properties: Arc<BTreeMap<String, AttributeDescriptor>>,
    filters: Vec<String>,
}

impl EntityDefinition {
    /// Build a definition from one schema payload plus the fetched
    /// attribute list. Properties without a resolvable name are skipped;
    /// an unknown declared type fails construction.
    pub fn from_schema(
        schema: &SchemaPayload,
        attributes: &[AttributePayload],
    ) -> Result<Self, DefinitionError> {
        if schema.singular.is_empty() {
            return Err(DefinitionError::MissingSingularName);
        }
        if schema.plural.is_empty() {
            return Err(DefinitionError::MissingPluralName);
        }

        let mut properties = BTreeMap::new();
        let mut validations = BTreeMap::new();

        for property in &schema.properties {
            let Some(name) = property.resolved_name() else {
                continue;
            };

            let kind = parse_kind(name, property.property_type.as_deref())?;
            let item_kind = match &property.item_property_type {
                Some(item) => Some(parse_kind(name, Some(item))?),
                None => None,
            };

            let reference_type = if kind.is_reference()
                || (kind.is_collection() && item_kind.is_some_and(PropertyKind::is_reference))
            {
                property.href_type().map(ToString::to_string)
            } else {
                None
            };

            properties.insert(
                name.to_string(),
                PropertyDescriptor {
                    writable: property.writable,
                    constants: property.constants.clone(),
                },
            );
            validations.insert(
                name.to_string(),
                ValidationRule {
                    persisted: property.persisted,
                    kind,
                    item_kind,
                    required: property.required,
                    min: property.min,
                    max: property.max,
                    owner: property.owner,
                    unique: property.unique,
                    writable: property.writable,
                    ordered: property.ordered,
                    embedded_object: property.embedded_object,
                    reference_type,
                },
            );
        }

        let attribute_properties = attributes
            .iter()
            .filter(|attribute| attribute.applies_to(&schema.singular))
            .map(|attribute| (attribute.name.clone(), AttributeDescriptor::from(attribute)))
            .collect();

        Ok(Self {
            kind: DefinitionKind::for_name(&schema.singular),
            name: schema.singular.clone(),
            display_name: schema.resolved_display_name(),
            plural: schema.plural.clone(),
            shareable: schema.shareable,
            metadata: schema.metadata,
            identifiable_object: schema.identifiable_object,
            translatable: schema.translatable,
            java_class: schema.klass.clone(),
            api_endpoint: schema.relative_api_endpoint().to_string(),
            authorities: schema.authorities.clone(),
            properties: Arc::new(properties),
            validations: Arc::new(validations),
            attribute_properties: Arc::new(attribute_properties),
            filters: Vec::new(),
        })
    }

    //
    // accessors
    //

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    #[must_use]
    pub fn plural(&self) -> &str {
        &self.plural
    }

    #[must_use]
    pub fn api_endpoint(&self) -> &str {
        &self.api_endpoint
    }

    #[must_use]
    pub const fn kind(&self) -> DefinitionKind {
        self.kind
    }

    #[must_use]
    pub const fn is_shareable(&self) -> bool {
        self.shareable
    }

    #[must_use]
    pub const fn is_metadata(&self) -> bool {
        self.metadata
    }

    #[must_use]
    pub const fn is_identifiable_object(&self) -> bool {
        self.identifiable_object
    }

    #[must_use]
    pub const fn is_translatable(&self) -> bool {
        self.translatable
    }

    #[must_use]
    pub fn java_class(&self) -> Option<&str> {
        self.java_class.as_deref()
    }

    #[must_use]
    pub fn authorities(&self) -> &[JsonValue] {
        &self.authorities
    }

    #[must_use]
    pub fn properties(&self) -> &BTreeMap<String, PropertyDescriptor> {
        &self.properties
    }

    #[must_use]
    pub fn validations(&self) -> &BTreeMap<String, ValidationRule> {
        &self.validations
    }

    #[must_use]
    pub fn attribute_properties(&self) -> &BTreeMap<String, AttributeDescriptor> {
        &self.attribute_properties
    }

    #[must_use]
    pub fn filters(&self) -> &[String] {
        &self.filters
    }

    /// Independent clone with one more accumulated filter expression.
    /// Descriptor and rule tables stay shared.
    #[must_use]
    pub fn filtered(&self, expression: impl Into<String>) -> Self {
        let mut definition = self.clone();
        definition.filters.push(expression.into());
        definition
    }

    //
    // entity creation
    //

    /// Create an entity with synthesized scalar defaults and no
    /// collection wiring. Creation never marks the entity dirty.
    #[must_use]
    pub fn create_empty(&self) -> Entity {
        let mut entity = Entity::new(self.clone());

        for (name, value) in defaults::for_type(&self.name) {
            if self.validations.contains_key(name) {
                entity.insert_raw(name, PropertyValue::Json(value));
            }
        }

        entity
    }

    /// Create an empty entity: scalar defaults plus an empty collection
    /// property for every collection-of-reference property.
    #[must_use]
    pub fn create(&self, registry: &DefinitionRegistry) -> Entity {
        let mut entity = self.create_empty();

        for (name, rule) in self.validations.iter() {
            if rule.kind.is_collection()
                && self.reference_definition(registry, name, rule).is_some()
            {
                entity.insert_raw(
                    name,
                    PropertyValue::Collection(CollectionProperty::empty(name.clone(), None)),
                );
            }
        }

        entity
    }

    /// Materialize an entity from raw JSON. Declared reference-collection
    /// arrays become collection properties wrapping sub-entities built via
    /// the target definition; everything else is stored as-is. Values are
    /// written directly, so materialization never marks the entity dirty.
    pub fn create_from(
        &self,
        registry: &DefinitionRegistry,
        data: &JsonValue,
    ) -> Result<Entity, Error> {
        let object = data
            .as_object()
            .ok_or(DefinitionError::DataNotAnObject)?;
        let parent_href = object
            .get("href")
            .and_then(JsonValue::as_str)
            .map(ToString::to_string);

        let mut entity = self.create(registry);

        for (name, rule) in self.validations.iter() {
            let Some(value) = object.get(name) else {
                continue;
            };

            // Embedded payload arrays keep their raw shape.
            if PASSTHROUGH_PROPERTIES.contains(&name.as_str())
                || (self.kind == DefinitionKind::DataSet
                    && name == "compulsoryDataElementOperands")
            {
                entity.insert_raw(name, PropertyValue::Json(value.clone()));
                continue;
            }

            if let (Some(items), Some(target)) = (
                value.as_array(),
                self.reference_definition(registry, name, rule),
            ) {
                let mut members = Collection::new();
                for item in items {
                    members.add(target.create_from(registry, item)?)?;
                }

                entity.insert_raw(
                    name,
                    PropertyValue::Collection(CollectionProperty::with_members(
                        name.clone(),
                        parent_href.clone(),
                        members,
                    )),
                );
                continue;
            }

            entity.insert_raw(name, PropertyValue::Json(value.clone()));
        }

        Ok(entity)
    }

    /// Resolve the definition a reference(-collection) property points at.
    ///
    /// The explicit `reference_type` derived from the schema href is
    /// authoritative. Schemas that omit the href fall back to matching the
    /// property name against a registered plural.
    fn reference_definition<'a>(
        &self,
        registry: &'a DefinitionRegistry,
        property: &str,
        rule: &ValidationRule,
    ) -> Option<&'a Arc<Self>> {
        if let Some(reference_type) = rule.reference_type.as_deref() {
            return registry.get(reference_type);
        }

        if !rule.kind.is_collection() {
            return None;
        }

        registry
            .iter()
            .map(|(_, definition)| definition)
            .find(|definition| definition.plural() == property)
    }

    //
    // transport operations
    //

    /// Read one entity by identifier.
    pub async fn get(
        &self,
        api: &dyn Api,
        registry: &DefinitionRegistry,
        id: &str,
        params: Option<QueryParams>,
    ) -> Result<Entity, Error> {
        let mut query = params.unwrap_or_default();
        if !query.contains("fields") {
            query.set("fields", self.kind.default_read_fields());
        }

        debug!(entity_type = %self.name, id, "reading entity");

        match api
            .get(&format!("{}/{id}", self.api_endpoint), &query)
            .await
        {
            Ok(payload) => self.create_from(registry, &payload),
            Err(err) => Err(Error::Transport(err.prefer_body_message())),
        }
    }

    /// Batch read: delegates to `list` with an `id:in:[...]` filter.
    pub async fn get_many(
        &self,
        api: &dyn Api,
        registry: &DefinitionRegistry,
        ids: &[&str],
        params: Option<QueryParams>,
    ) -> Result<Collection, Error> {
        if ids.is_empty() {
            return Err(DefinitionError::EmptyIdentifierBatch.into());
        }

        let mut query = params.unwrap_or_default();
        query.add_filter(format!("id:in:[{}]", ids.join(",")));

        self.list(api, registry, Some(query)).await
    }

    /// List entities of this type. Accumulated definition filters apply
    /// unless the caller supplies an explicit `filter`.
    pub async fn list(
        &self,
        api: &dyn Api,
        registry: &DefinitionRegistry,
        params: Option<QueryParams>,
    ) -> Result<Collection, Error> {
        let mut query = params.unwrap_or_default();
        if !query.contains("fields") {
            query.set("fields", DEFAULT_LIST_FIELDS);
        }
        if !query.contains("filter") {
            for filter in &self.filters {
                query.add_filter(filter.clone());
            }
        }

        let root = if self.kind == DefinitionKind::OrganisationUnit {
            query.take("root")
        } else {
            None
        };
        let path = match root {
            Some(root) => format!("{}/{root}", self.api_endpoint),
            None => self.api_endpoint.clone(),
        };

        debug!(entity_type = %self.name, %path, "listing entities");

        let payload = api.get(&path, &query).await?;

        let mut collection = Collection::new();
        if let Some(items) = payload.get(&self.plural).and_then(JsonValue::as_array) {
            for item in items {
                collection.add(self.create_from(registry, item)?)?;
            }
        }
        if let Some(pager) = payload.get("pager").cloned() {
            if let Ok(pager) = serde_json::from_value::<Pager>(pager) {
                collection.set_pager(pager);
            }
        }
        collection.set_query(query);

        Ok(collection)
    }

    /// Persist an entity: update when it carries an identifier, else
    /// create. The update rewrites the stored href to the configured
    /// server and uses replace-merge semantics.
    pub async fn save(
        &self,
        api: &dyn Api,
        entity: &mut Entity,
    ) -> Result<JsonValue, Error> {
        match entity.id().map(ToString::to_string) {
            Some(id) => self.save_existing(api, entity, &id).await,
            None => self.save_new(api, entity).await,
        }
    }

    async fn save_existing(
        &self,
        api: &dyn Api,
        entity: &mut Entity,
        id: &str,
    ) -> Result<JsonValue, Error> {
        let href = api.config().model_href(&self.api_endpoint, id);
        entity.set_href_raw(href.clone());

        let payload = self.owned_payload(entity);

        debug!(entity_type = %self.name, id, "updating entity");

        let response = api.put(&href, payload, true).await?;
        Ok(response)
    }

    async fn save_new(
        &self,
        api: &dyn Api,
        entity: &Entity,
    ) -> Result<JsonValue, Error> {
        let payload = self.owned_payload(entity);

        debug!(entity_type = %self.name, "creating entity");

        let response = api.post(&self.api_endpoint, payload).await?;
        Ok(response)
    }

    /// Delete an entity by its stored href, else by endpoint and id.
    pub async fn delete(
        &self,
        api: &dyn Api,
        entity: &Entity,
    ) -> Result<JsonValue, Error> {
        let path = match entity.href() {
            Some(href) => href.to_string(),
            None => {
                let id = entity.id().ok_or(DefinitionError::MissingIdentifier)?;
                api.config().model_href(&self.api_endpoint, id)
            }
        };

        debug!(entity_type = %self.name, %path, "deleting entity");

        let response = api.delete(&path).await?;
        Ok(response)
    }

    /// The persistable JSON for an entity: owner-flagged properties only,
    /// keeping falsy/empty values but dropping nulls, with reference
    /// collections reduced to `[{id}]` arrays (members lacking an id are
    /// excluded).
    #[must_use]
    pub fn owned_payload(&self, entity: &Entity) -> JsonValue {
        let mut payload = JsonMap::new();

        for (name, rule) in self.validations.iter() {
            if !rule.owner {
                continue;
            }
            let Some(value) = entity.get(name) else {
                continue;
            };

            let json = match value {
                PropertyValue::Collection(collection) => JsonValue::Array(
                    collection
                        .iter()
                        .filter_map(Entity::id)
                        .map(|id| json!({ "id": id }))
                        .collect(),
                ),
                PropertyValue::Json(JsonValue::Null) => continue,
                PropertyValue::Json(raw) if rule.is_reference_collection() && raw.is_array() => {
                    id_objects(raw)
                }
                PropertyValue::Json(raw) => raw.clone(),
            };

            payload.insert(name.clone(), json);
        }

        JsonValue::Object(payload)
    }
}

fn parse_kind(property: &str, declared: Option<&str>) -> Result<PropertyKind, DefinitionError> {
    let declared = declared.ok_or_else(|| DefinitionError::Property {
        property: property.to_string(),
        source: PropertyKindError::Missing,
    })?;

    PropertyKind::parse(declared).map_err(|source| DefinitionError::Property {
        property: property.to_string(),
        source,
    })
}

fn id_objects(raw: &JsonValue) -> JsonValue {
    let ids = raw
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("id").and_then(JsonValue::as_str))
                .map(|id| json!({ "id": id }))
                .collect()
        })
        .unwrap_or_default();

    JsonValue::Array(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        RecordingApi, data_element_schema, data_set_schema, marker_attribute,
        organisation_unit_schema, test_registry, user_schema,
    };
    use crate::api::TransportError;
    use crate::test_support::Method;

    fn minimal_schema() -> SchemaPayload {
        serde_json::from_value(json!({
            "singular": "dataElement",
            "plural": "dataElements",
            "properties": [
                { "name": "id", "propertyType": "IDENTIFIER" },
                { "name": "name", "propertyType": "TEXT", "writable": true },
            ],
        }))
        .expect("minimal schema should deserialize")
    }

    #[test]
    fn missing_names_fail_construction() {
        let mut schema = data_element_schema();
        schema.singular = String::new();
        assert_eq!(
            EntityDefinition::from_schema(&schema, &[]).unwrap_err(),
            DefinitionError::MissingSingularName
        );

        let mut schema = data_element_schema();
        schema.plural = String::new();
        assert_eq!(
            EntityDefinition::from_schema(&schema, &[]).unwrap_err(),
            DefinitionError::MissingPluralName
        );
    }

    #[test]
    fn unknown_property_type_fails_naming_the_type() {
        let schema: SchemaPayload = serde_json::from_value(json!({
            "singular": "dataElement",
            "plural": "dataElements",
            "properties": [
                { "name": "style", "propertyType": "uio.some.unknown.type" },
            ],
        }))
        .expect("schema should deserialize");

        let err = EntityDefinition::from_schema(&schema, &[])
            .expect_err("unknown declared type must fail construction");
        assert!(err.to_string().contains("uio.some.unknown.type"));
        assert!(err.to_string().contains("style"));
    }

    #[test]
    fn descriptor_and_rule_key_sets_are_identical() {
        let definition =
            EntityDefinition::from_schema(&data_element_schema(), &[]).expect("fixture builds");

        let property_keys: Vec<&String> = definition.properties().keys().collect();
        let validation_keys: Vec<&String> = definition.validations().keys().collect();
        assert_eq!(property_keys, validation_keys);

        assert!(
            definition.properties().contains_key("dataElementGroups"),
            "collection properties are exposed under their collection name"
        );
        assert!(!definition.properties().contains_key("dataElementGroup"));
    }

    #[test]
    fn unresolvable_properties_are_skipped_entirely() {
        let schema: SchemaPayload = serde_json::from_value(json!({
            "singular": "dataElement",
            "plural": "dataElements",
            "properties": [
                { "name": "name", "propertyType": "TEXT" },
                { "name": "orphan", "collection": true, "propertyType": "COLLECTION" },
                { "propertyType": "TEXT" },
            ],
        }))
        .expect("schema should deserialize");

        let definition = EntityDefinition::from_schema(&schema, &[]).expect("fixture builds");
        assert_eq!(definition.properties().len(), 1);
        assert_eq!(definition.validations().len(), 1);
    }

    #[test]
    fn constants_are_copied_onto_the_descriptor() {
        let definition =
            EntityDefinition::from_schema(&data_element_schema(), &[]).expect("fixture builds");

        let descriptor = &definition.properties()["aggregationType"];
        assert_eq!(
            descriptor.constants.as_deref(),
            Some(["SUM", "AVERAGE", "COUNT", "NONE"].map(String::from).as_slice())
        );
    }

    #[test]
    fn reference_types_derive_from_the_property_href() {
        let definition =
            EntityDefinition::from_schema(&data_element_schema(), &[]).expect("fixture builds");

        assert_eq!(
            definition.validations()["categoryCombo"].reference_type.as_deref(),
            Some("categoryCombo")
        );
        assert_eq!(
            definition.validations()["dataElementGroups"].reference_type.as_deref(),
            Some("dataElementGroup")
        );
        assert_eq!(
            definition.validations()["translations"].reference_type,
            None,
            "embedded collections carry no reference type"
        );
    }

    #[test]
    fn specialized_kinds_are_selected_by_singular_name() {
        let cases = [
            (data_element_schema(), DefinitionKind::Generic),
            (user_schema(), DefinitionKind::User),
            (data_set_schema(), DefinitionKind::DataSet),
            (organisation_unit_schema(), DefinitionKind::OrganisationUnit),
        ];

        for (schema, expected) in cases {
            let definition =
                EntityDefinition::from_schema(&schema, &[]).expect("fixture builds");
            assert_eq!(definition.kind(), expected, "{}", definition.name());
        }
    }

    #[test]
    fn filtered_clones_share_tables_but_not_filters() {
        let definition =
            EntityDefinition::from_schema(&data_element_schema(), &[]).expect("fixture builds");
        let filtered = definition.filtered("domainType:eq:AGGREGATE");

        assert!(definition.filters().is_empty());
        assert_eq!(filtered.filters(), ["domainType:eq:AGGREGATE"]);
        assert!(Arc::ptr_eq(&definition.properties, &filtered.properties));
        assert!(Arc::ptr_eq(&definition.validations, &filtered.validations));
    }

    #[test]
    fn attribute_properties_are_filtered_by_applicability() {
        let definition =
            EntityDefinition::from_schema(&data_element_schema(), &[marker_attribute()])
                .expect("fixture builds");

        assert!(definition.attribute_properties().contains_key("marker"));

        let definition = EntityDefinition::from_schema(&user_schema(), &[marker_attribute()])
            .expect("fixture builds");
        assert!(definition.attribute_properties().is_empty());
    }

    #[test]
    fn create_synthesizes_defaults_and_empty_collections() {
        let registry = test_registry();
        let definition = registry.try_get("dataElement").unwrap();

        let entity = definition.create(&registry);

        assert!(!entity.is_dirty(), "creation must not mark the entity dirty");
        assert_eq!(entity.value("domainType"), Some(&json!("AGGREGATE")));

        let groups = entity
            .collection("dataElementGroups")
            .expect("reference collections become collection properties");
        assert!(groups.is_empty());
        assert!(!groups.is_dirty());

        assert!(
            entity.collection("translations").is_none(),
            "embedded arrays never become collection properties"
        );
    }

    #[test]
    fn create_from_scenario_minimal_schema() {
        let registry = DefinitionRegistry::from_schemas(&[minimal_schema()], &[])
            .expect("minimal schema builds");
        let definition = registry.try_get("dataElement").unwrap();

        let entity = definition
            .create_from(&registry, &json!({ "id": "abc", "name": "ANC" }))
            .expect("materialization should succeed");

        assert_eq!(entity.value("name"), Some(&json!("ANC")));
        assert_eq!(entity.id(), Some("abc"));
        assert!(!entity.is_dirty());
        assert!(entity.dirty_property_names().is_empty());
    }

    #[test]
    fn create_from_wraps_reference_collections() {
        let registry = test_registry();
        let definition = registry.try_get("dataElement").unwrap();

        let entity = definition
            .create_from(
                &registry,
                &json!({
                    "id": "P3jJH5Tu5VC",
                    "name": "ANC 1st visit",
                    "href": "https://play.example.com/api/dataElements/P3jJH5Tu5VC",
                    "dataElementGroups": [
                        { "id": "oDkJh5Ddh7d", "name": "ANC" },
                        { "id": "KrKa2fDVFF5" },
                    ],
                    "translations": [
                        { "locale": "fr", "property": "NAME", "value": "Visite" },
                    ],
                }),
            )
            .expect("materialization should succeed");

        let groups = entity
            .collection("dataElementGroups")
            .expect("reference array should be wrapped");
        let ids: Vec<&str> = groups.ids().collect();
        assert_eq!(ids, ["oDkJh5Ddh7d", "KrKa2fDVFF5"]);
        assert_eq!(
            groups.parent_href(),
            Some("https://play.example.com/api/dataElements/P3jJH5Tu5VC")
        );
        assert!(!groups.is_dirty(), "materialized members are not pending additions");

        let member = groups.get("oDkJh5Ddh7d").expect("member should resolve");
        assert_eq!(member.definition().name(), "dataElementGroup");
        assert_eq!(member.value("name"), Some(&json!("ANC")));

        assert_eq!(
            entity.value("translations"),
            Some(&json!([{ "locale": "fr", "property": "NAME", "value": "Visite" }])),
            "passthrough arrays keep their raw shape"
        );
    }

    #[test]
    fn data_set_reattaches_compulsory_operands_raw() {
        let registry = test_registry();
        let definition = registry.try_get("dataSet").unwrap();

        let entity = definition
            .create_from(
                &registry,
                &json!({
                    "id": "pBOMPrpg1QX",
                    "compulsoryDataElementOperands": [
                        { "id": "abcdefghij1", "dimensionItem": "a.b" },
                    ],
                    "dataElements": [{ "id": "P3jJH5Tu5VC" }],
                }),
            )
            .expect("materialization should succeed");

        assert!(
            entity.collection("compulsoryDataElementOperands").is_none(),
            "operands bypass the generic collection path"
        );
        assert_eq!(
            entity.value("compulsoryDataElementOperands"),
            Some(&json!([{ "id": "abcdefghij1", "dimensionItem": "a.b" }]))
        );
        assert!(
            entity.collection("dataElements").is_some(),
            "other reference collections still wrap"
        );
    }

    #[tokio::test]
    async fn get_reads_with_default_fields() {
        let registry = test_registry();
        let definition = registry.try_get("dataElement").unwrap();
        let api = RecordingApi::new();
        api.enqueue(Ok(json!({ "id": "P3jJH5Tu5VC", "name": "ANC 1st visit" })));

        let entity = definition
            .get(&api, &registry, "P3jJH5Tu5VC", None)
            .await
            .expect("read should succeed");

        assert_eq!(entity.value("name"), Some(&json!("ANC 1st visit")));

        let requests = api.requests();
        assert_eq!(requests[0].method, Method::Get);
        assert_eq!(
            requests[0].path,
            "https://play.example.com/api/dataElements/P3jJH5Tu5VC"
        );
        assert_eq!(
            requests[0].query.get("fields"),
            Some(":all,attributeValues[:all,attribute[id,name,displayName]]")
        );
    }

    #[tokio::test]
    async fn user_reads_expand_credentials() {
        let registry = test_registry();
        let definition = registry.try_get("user").unwrap();
        let api = RecordingApi::new();
        api.enqueue(Ok(json!({ "id": "xE7jOejl9FI" })));

        definition
            .get(&api, &registry, "xE7jOejl9FI", None)
            .await
            .expect("read should succeed");

        assert_eq!(
            api.requests()[0].query.get("fields"),
            Some(":all,userCredentials[:owner]")
        );
    }

    #[tokio::test]
    async fn get_failure_prefers_the_body_message() {
        let registry = test_registry();
        let definition = registry.try_get("dataElement").unwrap();
        let api = RecordingApi::new();
        api.enqueue(Err(TransportError::new("404 Not Found")
            .with_status(404)
            .with_body(json!({ "message": "DataElement not found" }))));

        let err = definition
            .get(&api, &registry, "missing00001", None)
            .await
            .expect_err("read should fail");

        assert!(err.to_string().contains("DataElement not found"));
    }

    #[tokio::test]
    async fn get_many_builds_an_id_in_filter() {
        let registry = test_registry();
        let definition = registry.try_get("dataElement").unwrap();
        let api = RecordingApi::new();
        api.enqueue(Ok(json!({ "dataElements": [] })));

        definition
            .get_many(&api, &registry, &["P3jJH5Tu5VC", "FTRrcoaog83"], None)
            .await
            .expect("batch read should succeed");

        assert_eq!(
            api.requests()[0].query.get("filter"),
            Some("id:in:[P3jJH5Tu5VC,FTRrcoaog83]")
        );

        let err = definition
            .get_many(&api, &registry, &[], None)
            .await
            .expect_err("empty batch is rejected locally");
        assert!(matches!(
            err,
            Error::Definition(DefinitionError::EmptyIdentifierBatch)
        ));
        assert_eq!(api.request_count(), 1, "the empty batch issued no request");
    }

    #[tokio::test]
    async fn list_applies_accumulated_filters_unless_overridden() {
        let registry = test_registry();
        let definition = registry
            .try_get("dataElement")
            .unwrap()
            .filtered("domainType:eq:AGGREGATE");
        let api = RecordingApi::new();
        api.enqueue(Ok(json!({
            "dataElements": [{ "id": "P3jJH5Tu5VC", "name": "ANC 1st visit" }],
            "pager": { "page": 1, "pageCount": 4, "total": 186, "pageSize": 50 },
        })));

        let collection = definition
            .list(&api, &registry, None)
            .await
            .expect("list should succeed");

        assert_eq!(collection.len(), 1);
        assert_eq!(collection.pager().map(|p| p.total), Some(186));
        assert_eq!(collection.query().get("filter"), Some("domainType:eq:AGGREGATE"));
        assert_eq!(api.requests()[0].query.get("fields"), Some(":all"));

        // An explicit filter suppresses the accumulated chain.
        api.enqueue(Ok(json!({ "dataElements": [] })));
        let mut params = QueryParams::new();
        params.add_filter("name:like:ANC");
        definition
            .list(&api, &registry, Some(params))
            .await
            .expect("list should succeed");

        let requests = api.requests();
        let filters: Vec<&str> = requests[1].query.all("filter").collect();
        assert_eq!(filters, ["name:like:ANC"]);
    }

    #[tokio::test]
    async fn organisation_unit_lists_redirect_to_the_root() {
        let registry = test_registry();
        let definition = registry.try_get("organisationUnit").unwrap();
        let api = RecordingApi::new();
        api.enqueue(Ok(json!({ "organisationUnits": [] })));

        let mut params = QueryParams::new();
        params.set("root", "ImspTQPwCqd");

        definition
            .list(&api, &registry, Some(params))
            .await
            .expect("list should succeed");

        let request = &api.requests()[0];
        assert_eq!(
            request.path,
            "https://play.example.com/api/organisationUnits/ImspTQPwCqd"
        );
        assert!(!request.query.contains("root"), "root is not forwarded as a parameter");
    }

    #[tokio::test]
    async fn save_existing_puts_the_owned_payload_with_replace_merge() {
        let registry = test_registry();
        let definition = registry.try_get("dataElement").unwrap();
        let api = RecordingApi::new();
        api.enqueue(Ok(json!({ "status": "OK" })));

        let mut entity = definition
            .create_from(
                &registry,
                &json!({
                    "id": "P3jJH5Tu5VC",
                    "name": "ANC 1st visit",
                    "shortName": "ANC 1",
                    "href": "https://old.example.com/api/26/dataElements/P3jJH5Tu5VC",
                    "created": "2014-04-02",
                    "dataElementGroups": [{ "id": "oDkJh5Ddh7d" }, { "name": "no id" }],
                }),
            )
            .expect("materialization should succeed");

        definition
            .save(&api, &mut entity)
            .await
            .expect("update should succeed");

        assert_eq!(
            entity.href(),
            Some("https://play.example.com/api/dataElements/P3jJH5Tu5VC"),
            "stored href is rewritten to the configured server"
        );

        let request = &api.requests()[0];
        assert_eq!(request.method, Method::Put);
        assert_eq!(
            request.path,
            "https://play.example.com/api/dataElements/P3jJH5Tu5VC"
        );
        assert_eq!(request.replace_merge, Some(true));

        let body = request.body.as_ref().expect("update carries a body");
        assert_eq!(body["name"], json!("ANC 1st visit"));
        assert!(
            body.get("href").is_none(),
            "non-owner properties are excluded from the payload"
        );
        assert!(
            body.get("created").is_none(),
            "non-owner properties are excluded from the payload"
        );
        assert!(
            body.get("dataElementGroups").is_none(),
            "the groups collection is not owned by the data element"
        );
    }

    #[tokio::test]
    async fn save_new_posts_to_the_endpoint() {
        let registry = test_registry();
        let definition = registry.try_get("dataElement").unwrap();
        let api = RecordingApi::new();
        api.enqueue(Ok(json!({ "response": { "uid": "xE7jOejl9FI" } })));

        let mut entity = definition.create(&registry);
        entity.set("name", json!("Newborn checkup")).unwrap();

        definition
            .save(&api, &mut entity)
            .await
            .expect("create should succeed");

        let request = &api.requests()[0];
        assert_eq!(request.method, Method::Post);
        assert_eq!(request.path, "https://play.example.com/api/dataElements");
        assert_eq!(
            request.body.as_ref().and_then(|body| body.get("name")),
            Some(&json!("Newborn checkup"))
        );
    }

    #[tokio::test]
    async fn delete_uses_the_stored_href_when_present() {
        let registry = test_registry();
        let definition = registry.try_get("dataElement").unwrap();
        let api = RecordingApi::new();

        let entity = definition
            .create_from(
                &registry,
                &json!({
                    "id": "P3jJH5Tu5VC",
                    "href": "https://play.example.com/api/dataElements/P3jJH5Tu5VC",
                }),
            )
            .expect("materialization should succeed");
        definition
            .delete(&api, &entity)
            .await
            .expect("delete should succeed");

        let without_href = definition
            .create_from(&registry, &json!({ "id": "FTRrcoaog83" }))
            .expect("materialization should succeed");
        definition
            .delete(&api, &without_href)
            .await
            .expect("delete should succeed");

        let requests = api.requests();
        assert_eq!(requests[0].method, Method::Delete);
        assert_eq!(
            requests[0].path,
            "https://play.example.com/api/dataElements/P3jJH5Tu5VC"
        );
        assert_eq!(
            requests[1].path,
            "https://play.example.com/api/dataElements/FTRrcoaog83",
            "without a stored href the path is built from endpoint and id"
        );
    }

    #[test]
    fn owned_payload_keeps_empty_values_but_drops_nulls() {
        let registry = test_registry();
        let definition = registry.try_get("dataElement").unwrap();

        let mut entity = definition.create(&registry);
        entity.set("name", json!("")).unwrap();
        entity.set("shortName", JsonValue::Null).unwrap();

        let payload = definition.owned_payload(&entity);
        assert_eq!(payload.get("name"), Some(&json!("")));
        assert!(payload.get("shortName").is_none());
    }

    #[test]
    fn owned_payload_reduces_reference_collections_to_ids() {
        let registry = test_registry();
        let definition = registry.try_get("dataSet").unwrap();

        let entity = definition
            .create_from(
                &registry,
                &json!({
                    "id": "pBOMPrpg1QX",
                    "compulsoryDataElementOperands": [
                        { "id": "abcdefghij1", "dimensionItem": "a.b" },
                        { "dimensionItem": "orphaned" },
                    ],
                }),
            )
            .expect("materialization should succeed");

        let payload = definition.owned_payload(&entity);
        assert_eq!(
            payload.get("compulsoryDataElementOperands"),
            Some(&json!([{ "id": "abcdefghij1" }])),
            "raw reference arrays reduce to ids, dropping id-less members"
        );
    }
}
