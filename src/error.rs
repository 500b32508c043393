//! Error types for command resolution, payload conversion and metadata loading.

use thiserror::Error;

/// Coarse classification shared by every error in this crate.
///
/// Lets a caller tell "the schema has no such thing" apart from "the name
/// matched more than one thing" and "the input itself is malformed".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Ambiguous,
    Malformed,
}

/// Errors while resolving a command against the schema.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("entity collection [{name}] not found")]
    CollectionNotFound { name: String },

    #[error("entity type [{name}] not found")]
    TypeNotFound { name: String },

    #[error("derived entity type [{name}] not found for collection [{collection}]")]
    DerivedTypeNotFound { collection: String, name: String },

    #[error("navigation property [{link}] not found on [{collection}]")]
    NavigationNotFound { collection: String, link: String },

    #[error("function [{name}] not found")]
    FunctionNotFound { name: String },

    #[error("name [{name}] is ambiguous, matches: {}", candidates.join(", "))]
    AmbiguousName {
        name: String,
        candidates: Vec<String>,
    },

    #[error("command names neither an entity collection nor a link")]
    MissingCollection,

    #[error("expression cannot be evaluated as a name: {expression}")]
    InvalidNameExpression { expression: String },

    #[error("property {container} must be a string-keyed map, got {actual}")]
    DynamicContainerNotMap { container: String, actual: String },

    #[error(transparent)]
    Convert(#[from] ConvertError),
}

impl ResolveError {
    /// Returns the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CollectionNotFound { .. }
            | Self::TypeNotFound { .. }
            | Self::DerivedTypeNotFound { .. }
            | Self::NavigationNotFound { .. }
            | Self::FunctionNotFound { .. } => ErrorKind::NotFound,
            Self::AmbiguousName { .. } => ErrorKind::Ambiguous,
            Self::MissingCollection
            | Self::InvalidNameExpression { .. }
            | Self::DynamicContainerNotMap { .. } => ErrorKind::Malformed,
            Self::Convert(e) => e.kind(),
        }
    }
}

/// Errors while converting between payloads and native instances.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error(
        "no constructor of {type_name} matches payload keys [{}] (value types: {})",
        keys.join(", "),
        value_types.join(", ")
    )]
    ConstructorNotFound {
        type_name: String,
        keys: Vec<String>,
        value_types: Vec<String>,
    },

    #[error("type {type_name} does not have member {member}")]
    ContainerMissing { type_name: String, member: String },

    #[error("member {member} of {type_name} must be a string-keyed map")]
    ContainerNotMap { type_name: String, member: String },

    #[error("type {name} is not registered")]
    UnknownType { name: String },

    #[error("\"{value}\" is not a member of enum {enum_name}")]
    UnknownEnumMember { enum_name: String, value: String },

    #[error("unable to convert structural data to {target}")]
    StructuralToScalar { target: String },

    #[error("expected a {type_name} record, got {actual}")]
    NotAnObject { type_name: String, actual: String },

    #[error("serde conversion for {type_name} failed: {source}")]
    Serde {
        type_name: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ConvertError {
    /// Returns the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownType { .. } | Self::ContainerMissing { .. } => ErrorKind::NotFound,
            _ => ErrorKind::Malformed,
        }
    }
}

/// Errors while loading a schema model document.
#[derive(Debug, Error)]
pub enum ModelError {
    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid model schema: {message}")]
    InvalidSchema { message: String },

    #[error("model document failed validation with {} error(s)", errors.len())]
    Invalid { errors: Vec<SchemaError> },
}

impl ModelError {
    /// Returns the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            #[cfg(feature = "remote")]
            Self::NetworkError { source, .. }
                if source.status() == Some(reqwest::StatusCode::NOT_FOUND) =>
            {
                ErrorKind::NotFound
            }
            _ => ErrorKind::Malformed,
        }
    }
}

/// Single model validation error with path context.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SchemaError {
    /// JSON Pointer (RFC 6901) to the invalid field.
    pub path: String,
    /// Human-readable error message.
    pub message: String,
}

impl std::fmt::Display for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Errors while building metadata cache entries.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("metadata cache key must not be blank")]
    EmptyKey,

    #[error("metadata document for {key} must not be blank")]
    EmptyDocument { key: String },

    #[error(transparent)]
    Model(#[from] ModelError),
}

impl CacheError {
    /// Returns the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Model(e) => e.kind(),
            _ => ErrorKind::Malformed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_error_kinds() {
        let err = ResolveError::CollectionNotFound {
            name: "Productz".into(),
        };
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = ResolveError::AmbiguousName {
            name: "Ship".into(),
            candidates: vec!["Ships".into(), "SHIPS".into()],
        };
        assert_eq!(err.kind(), ErrorKind::Ambiguous);

        let err = ResolveError::DynamicContainerNotMap {
            container: "Extra".into(),
            actual: "string".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Malformed);
    }

    #[test]
    fn convert_error_kind_passes_through_resolve_error() {
        let err: ResolveError = ConvertError::UnknownType {
            name: "Widget".into(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn constructor_not_found_lists_keys() {
        let err = ConvertError::ConstructorNotFound {
            type_name: "OrderKey".into(),
            keys: vec!["OrderID".into(), "Line".into()],
            value_types: vec!["number".into(), "string".into()],
        };
        assert_eq!(
            err.to_string(),
            "no constructor of OrderKey matches payload keys [OrderID, Line] (value types: number, string)"
        );
    }

    #[test]
    fn ambiguous_name_display() {
        let err = ResolveError::AmbiguousName {
            name: "ship".into(),
            candidates: vec!["Ship".into(), "SHIP".into()],
        };
        assert_eq!(err.to_string(), "name [ship] is ambiguous, matches: Ship, SHIP");
    }

    #[test]
    fn schema_error_display() {
        let err = SchemaError {
            path: "/entityTypes/0/key".into(),
            message: "expected array, got string".into(),
        };
        assert_eq!(
            err.to_string(),
            "/entityTypes/0/key: expected array, got string"
        );
    }
}
