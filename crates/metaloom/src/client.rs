use metaloom_core::{
    api::{Api, QueryParams},
    error::Error,
    model::{
        AttributeRegistry, Collection, DefinitionRegistry, Entity, EntityDefinition,
    },
};
use metaloom_schema::{AttributeList, AttributePayload, SchemaList, SchemaPayload};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::debug;

///
/// Client
///
/// The context object binding one transport to the definition and
/// attribute registries built from a server's schema list. Constructed
/// once at startup and passed by reference wherever schema lookup or
/// transport access is needed; it holds no global state.
///

pub struct Client {
    api: Arc<dyn Api>,
    definitions: DefinitionRegistry,
    attributes: AttributeRegistry,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("definitions", &self.definitions)
            .field("attributes", &self.attributes)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Fetch the schema and attribute lists over the transport and build
    /// the registries from them.
    pub async fn bootstrap(api: Arc<dyn Api>) -> Result<Self, Error> {
        debug!("bootstrapping model context");

        let schema_payload = api
            .get("schemas", &QueryParams::with_fields(":all"))
            .await?;
        let schema_list: SchemaList = serde_json::from_value(schema_payload)?;

        let mut attribute_query = QueryParams::with_fields(":all");
        attribute_query.set("paging", "false");
        let attribute_payload = api.get("attributes", &attribute_query).await?;
        let attribute_list: AttributeList = serde_json::from_value(attribute_payload)?;

        Self::from_parts(api, schema_list.schemas, attribute_list.attributes)
    }

    /// Build the context from already-fetched payloads.
    pub fn from_parts(
        api: Arc<dyn Api>,
        schemas: Vec<SchemaPayload>,
        attributes: Vec<AttributePayload>,
    ) -> Result<Self, Error> {
        let definitions = DefinitionRegistry::from_schemas(&schemas, &attributes)?;

        debug!(definitions = definitions.len(), "model context ready");

        Ok(Self {
            api,
            definitions,
            attributes: AttributeRegistry::new(attributes),
        })
    }

    #[must_use]
    pub fn api(&self) -> &dyn Api {
        self.api.as_ref()
    }

    #[must_use]
    pub const fn definitions(&self) -> &DefinitionRegistry {
        &self.definitions
    }

    #[must_use]
    pub const fn attributes(&self) -> &AttributeRegistry {
        &self.attributes
    }

    /// Definition for one entity type.
    pub fn definition(&self, entity_type: &str) -> Result<&Arc<EntityDefinition>, Error> {
        Ok(self.definitions.try_get(entity_type)?)
    }

    /// New empty entity of the given type.
    pub fn create(&self, entity_type: &str) -> Result<Entity, Error> {
        Ok(self.definition(entity_type)?.create(&self.definitions))
    }

    /// Materialize an entity of the given type from raw JSON.
    pub fn create_from(&self, entity_type: &str, data: &JsonValue) -> Result<Entity, Error> {
        self.definition(entity_type)?
            .create_from(&self.definitions, data)
    }

    /// Read one entity by identifier.
    pub async fn get(&self, entity_type: &str, id: &str) -> Result<Entity, Error> {
        self.definition(entity_type)?
            .get(self.api.as_ref(), &self.definitions, id, None)
            .await
    }

    /// Batch read by identifiers.
    pub async fn get_many(&self, entity_type: &str, ids: &[&str]) -> Result<Collection, Error> {
        self.definition(entity_type)?
            .get_many(self.api.as_ref(), &self.definitions, ids, None)
            .await
    }

    /// List entities of one type.
    pub async fn list(
        &self,
        entity_type: &str,
        params: Option<QueryParams>,
    ) -> Result<Collection, Error> {
        self.definition(entity_type)?
            .list(self.api.as_ref(), &self.definitions, params)
            .await
    }

    /// Persist an entity's local mutations.
    pub async fn save(&self, entity: &mut Entity) -> Result<JsonValue, Error> {
        entity.save(self.api.as_ref()).await
    }

    /// Delete an entity on the server.
    pub async fn delete(&self, entity: &Entity) -> Result<JsonValue, Error> {
        entity.delete(self.api.as_ref()).await
    }
}
