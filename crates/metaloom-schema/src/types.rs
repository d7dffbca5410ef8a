use std::{fmt, str::FromStr};
use thiserror::Error as ThisError;

///
/// PropertyKindError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum PropertyKindError {
    #[error("unknown property type: '{0}'")]
    Unknown(String),

    #[error("property type is missing")]
    Missing,
}

///
/// PropertyKind
///
/// Closed enumeration of the property types a schema may declare.
/// Wire names are UPPERCASE tokens; `parse` is the only way in, so an
/// unrecognized declaration fails before any definition is built from it.
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[remain::sorted]
pub enum PropertyKind {
    Boolean,
    Collection,
    Color,
    Complex,
    Constant,
    Date,
    Email,
    Geolocation,
    Identifier,
    Integer,
    Number,
    Password,
    PhoneNumber,
    Reference,
    Text,
    Url,
}

impl PropertyKind {
    /// Validate and normalize a declared wire type name.
    pub fn parse(name: &str) -> Result<Self, PropertyKindError> {
        let kind = match name {
            "BOOLEAN" => Self::Boolean,
            "COLLECTION" => Self::Collection,
            "COLOR" => Self::Color,
            "COMPLEX" => Self::Complex,
            "CONSTANT" => Self::Constant,
            "DATE" => Self::Date,
            "EMAIL" => Self::Email,
            "GEOLOCATION" => Self::Geolocation,
            "IDENTIFIER" => Self::Identifier,
            "INTEGER" => Self::Integer,
            "NUMBER" => Self::Number,
            "PASSWORD" => Self::Password,
            "PHONENUMBER" => Self::PhoneNumber,
            "REFERENCE" => Self::Reference,
            "TEXT" => Self::Text,
            "URL" => Self::Url,
            _ => return Err(PropertyKindError::Unknown(name.to_string())),
        };

        Ok(kind)
    }

    /// The UPPERCASE token used on the wire.
    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::Boolean => "BOOLEAN",
            Self::Collection => "COLLECTION",
            Self::Color => "COLOR",
            Self::Complex => "COMPLEX",
            Self::Constant => "CONSTANT",
            Self::Date => "DATE",
            Self::Email => "EMAIL",
            Self::Geolocation => "GEOLOCATION",
            Self::Identifier => "IDENTIFIER",
            Self::Integer => "INTEGER",
            Self::Number => "NUMBER",
            Self::Password => "PASSWORD",
            Self::PhoneNumber => "PHONENUMBER",
            Self::Reference => "REFERENCE",
            Self::Text => "TEXT",
            Self::Url => "URL",
        }
    }

    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Integer | Self::Number)
    }

    /// Kinds whose values are plain strings on the wire.
    #[must_use]
    pub const fn is_textual(self) -> bool {
        matches!(
            self,
            Self::Color
                | Self::Constant
                | Self::Email
                | Self::Identifier
                | Self::Password
                | Self::PhoneNumber
                | Self::Text
                | Self::Url
        )
    }

    /// Kinds carried as composite JSON (objects or arrays).
    #[must_use]
    pub const fn is_composite(self) -> bool {
        matches!(
            self,
            Self::Collection | Self::Complex | Self::Geolocation | Self::Reference
        )
    }

    #[must_use]
    pub const fn is_collection(self) -> bool {
        matches!(self, Self::Collection)
    }

    #[must_use]
    pub const fn is_reference(self) -> bool {
        matches!(self, Self::Reference)
    }
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.wire_name())
    }
}

impl FromStr for PropertyKind {
    type Err = PropertyKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_every_wire_name() {
        let names = [
            "BOOLEAN",
            "COLLECTION",
            "COLOR",
            "COMPLEX",
            "CONSTANT",
            "DATE",
            "EMAIL",
            "GEOLOCATION",
            "IDENTIFIER",
            "INTEGER",
            "NUMBER",
            "PASSWORD",
            "PHONENUMBER",
            "REFERENCE",
            "TEXT",
            "URL",
        ];

        for name in names {
            let kind = PropertyKind::parse(name)
                .expect("declared wire name should parse");
            assert_eq!(kind.wire_name(), name, "parse should round-trip wire names");
        }
    }

    #[test]
    fn parse_names_the_offending_type() {
        let err = PropertyKind::parse("uio.some.unknown.type")
            .expect_err("unknown type should be rejected");

        assert_eq!(
            err,
            PropertyKindError::Unknown("uio.some.unknown.type".to_string())
        );
        assert!(
            err.to_string().contains("uio.some.unknown.type"),
            "error message should name the offending type"
        );
    }

    #[test]
    fn parse_is_case_sensitive() {
        PropertyKind::parse("text").expect_err("lowercase token is not a wire name");
    }

    #[test]
    fn kind_groups_do_not_overlap() {
        let all = [
            PropertyKind::Boolean,
            PropertyKind::Collection,
            PropertyKind::Color,
            PropertyKind::Complex,
            PropertyKind::Constant,
            PropertyKind::Date,
            PropertyKind::Email,
            PropertyKind::Geolocation,
            PropertyKind::Identifier,
            PropertyKind::Integer,
            PropertyKind::Number,
            PropertyKind::Password,
            PropertyKind::PhoneNumber,
            PropertyKind::Reference,
            PropertyKind::Text,
            PropertyKind::Url,
        ];

        for kind in all {
            assert!(
                !(kind.is_numeric() && kind.is_textual()),
                "{kind} cannot be both numeric and textual"
            );
            assert!(
                !(kind.is_numeric() && kind.is_composite()),
                "{kind} cannot be both numeric and composite"
            );
            assert!(
                !(kind.is_textual() && kind.is_composite()),
                "{kind} cannot be both textual and composite"
            );
        }
    }
}
