use metaloom_schema::AttributePayload;
use std::collections::BTreeMap;

///
/// AttributeDescriptor
/// One custom attribute as exposed on entities of an applicable type.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AttributeDescriptor {
    pub id: String,
    pub name: String,
    pub value_type: Option<String>,
    pub mandatory: bool,
    pub unique: bool,
}

impl From<&AttributePayload> for AttributeDescriptor {
    fn from(payload: &AttributePayload) -> Self {
        Self {
            id: payload.id.clone(),
            name: payload.name.clone(),
            value_type: payload.value_type.clone(),
            mandatory: payload.mandatory,
            unique: payload.unique,
        }
    }
}

///
/// AttributeRegistry
///
/// Holds the fetched custom-attribute metadata and answers which
/// attributes apply to a given entity type.
///

#[derive(Clone, Debug, Default)]
pub struct AttributeRegistry {
    attributes: Vec<AttributePayload>,
}

impl AttributeRegistry {
    #[must_use]
    pub const fn new(attributes: Vec<AttributePayload>) -> Self {
        Self { attributes }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    #[must_use]
    pub fn all(&self) -> &[AttributePayload] {
        &self.attributes
    }

    /// Descriptors for every attribute applicable to `entity_type`,
    /// keyed by attribute name.
    #[must_use]
    pub fn descriptors_for(&self, entity_type: &str) -> BTreeMap<String, AttributeDescriptor> {
        self.attributes
            .iter()
            .filter(|attribute| attribute.applies_to(entity_type))
            .map(|attribute| (attribute.name.clone(), AttributeDescriptor::from(attribute)))
            .collect()
    }
}
