use crate::{
    api::TransportError,
    model::{
        collection::CollectionError, definition::DefinitionError, entity::EntityError,
        registry::RegistryError,
    },
    validate::ValidationState,
};
use metaloom_schema::PropertyKindError;
use std::fmt;
use thiserror::Error as ThisError;

///
/// Error
///
/// Central error surface of the model core. Construction failures are
/// programming or schema mistakes and callers should treat them as fatal;
/// validation and transport failures occur mid-workflow and are expected
/// to be branched on.
///

#[derive(Debug, ThisError)]
pub enum Error {
    #[error(transparent)]
    Collection(#[from] CollectionError),

    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error(transparent)]
    Entity(#[from] EntityError),

    #[error("validation failed: {0}")]
    Invalid(ValidationState),

    #[error("no unsaved changes")]
    NothingToSave,

    #[error("payload deserialization failed: {0}")]
    Payload(#[from] serde_json::Error),

    #[error(transparent)]
    PropertyKind(#[from] PropertyKindError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl Error {
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::Definition(_) | Self::PropertyKind(_) | Self::Registry(_) => {
                ErrorClass::Construction
            }
            Self::Collection(_) | Self::Entity(_) => ErrorClass::InvariantViolation,
            Self::Invalid(_) | Self::NothingToSave => ErrorClass::Validation,
            Self::Payload(_) | Self::Transport(_) => ErrorClass::Transport,
        }
    }

    /// Returns the validation state when the error carries one.
    #[must_use]
    pub const fn validation_state(&self) -> Option<&ValidationState> {
        match self {
            Self::Invalid(state) => Some(state),
            _ => None,
        }
    }
}

///
/// ErrorClass
/// Coarse classification used by callers deciding how to react.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    Construction,
    InvariantViolation,
    Transport,
    Validation,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Construction => "construction",
            Self::InvariantViolation => "invariant_violation",
            Self::Transport => "transport",
            Self::Validation => "validation",
        };
        write!(f, "{label}")
    }
}
