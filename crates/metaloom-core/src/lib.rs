//! Core runtime for Metaloom: the transport boundary, schema-built entity
//! definitions, dirty-tracked entities, keyed collections with delta
//! persistence, and the validation engine.

pub mod api;
pub mod error;
pub mod model;
pub mod test_support;
pub mod validate;

pub use error::Error;

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// No errors, transports, or helpers are re-exported here.
///

pub mod prelude {
    pub use crate::{
        api::{Api, ApiConfig, QueryParams},
        model::{
            Collection, CollectionProperty, DefinitionRegistry, Entity, EntityDefinition,
            PropertyValue,
        },
        validate::{ValidationState, Violation},
    };
    pub use metaloom_schema::PropertyKind;
}
