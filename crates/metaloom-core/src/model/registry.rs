use crate::{
    error::Error,
    model::definition::EntityDefinition,
};
use metaloom_schema::{AttributePayload, SchemaPayload};
use std::{collections::BTreeMap, sync::Arc};
use thiserror::Error as ThisError;

///
/// RegistryError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum RegistryError {
    #[error("entity type '{0}' is not registered")]
    UnknownType(String),

    #[error("entity type '{0}' already registered")]
    AlreadyRegistered(String),
}

///
/// DefinitionRegistry
///
/// One definition per entity type name, built once at startup from the
/// schema list. Registration of an existing name fails fast; after
/// population the registry is read-only.
///

#[derive(Clone, Debug, Default)]
pub struct DefinitionRegistry {
    definitions: BTreeMap<String, Arc<EntityDefinition>>,
}

impl DefinitionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the full registry from fetched schema and attribute lists.
    pub fn from_schemas(
        schemas: &[SchemaPayload],
        attributes: &[AttributePayload],
    ) -> Result<Self, Error> {
        let mut registry = Self::new();
        for schema in schemas {
            let definition = EntityDefinition::from_schema(schema, attributes)?;
            registry.register(definition)?;
        }

        Ok(registry)
    }

    /// Register a definition under its singular type name.
    pub fn register(&mut self, definition: EntityDefinition) -> Result<(), RegistryError> {
        let name = definition.name().to_string();

        if self.definitions.contains_key(&name) {
            return Err(RegistryError::AlreadyRegistered(name));
        }

        self.definitions.insert(name, Arc::new(definition));
        Ok(())
    }

    /// Look up a definition by type name.
    pub fn try_get(&self, name: &str) -> Result<&Arc<EntityDefinition>, RegistryError> {
        self.definitions
            .get(name)
            .ok_or_else(|| RegistryError::UnknownType(name.to_string()))
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<EntityDefinition>> {
        self.definitions.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Iterate registered definitions by type name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<EntityDefinition>)> {
        self.definitions
            .iter()
            .map(|(name, definition)| (name.as_str(), definition))
    }
}
