//! ## Crate layout
//! - `core`: the model runtime — transport boundary, entity definitions,
//!   dirty-tracked entities, collections with delta persistence, and the
//!   validation engine.
//! - `schema`: wire-format payloads for the remote schema and attribute
//!   lists, plus the property-kind enumeration.
//!
//! This crate adds the [`Client`] context object binding a transport to
//! the registries built from a server's schema list, and re-exports the
//! runtime surface through `prelude`.

pub use metaloom_core as core;
pub use metaloom_schema as schema;

mod client;

pub use client::Client;
pub use metaloom_core::Error;

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

///
/// Prelude
/// using _ brings traits into scope and avoids name conflicts
///

pub mod prelude {
    pub use crate::{
        Client,
        core::{
            api::{Api, ApiConfig, QueryParams, TransportError},
            error::{Error, ErrorClass},
            model::{
                AttributeRegistry, Collection, CollectionProperty, DefinitionRegistry, Entity,
                EntityDefinition, Pager, PropertyValue,
            },
            validate::{ValidationState, Violation},
        },
        schema::{
            AttributeList, AttributePayload, PropertyKind, SchemaList, SchemaPayload,
        },
    };
}
