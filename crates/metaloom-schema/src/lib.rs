//! Wire-format types for the remote schema and attribute lists, plus the
//! closed property-kind enumeration shared by every definition built from
//! them. Runtime behavior (definitions, entities, persistence) lives in
//! `metaloom-core`; this crate only describes what the server sends.

pub mod payload;
pub mod types;
pub mod uid;

pub use payload::{
    AttributeList, AttributePayload, PropertySchema, SchemaList, SchemaPayload,
};
pub use types::{PropertyKind, PropertyKindError};
