//! Error types for graft mapping and execution.

use thiserror::Error;

/// Unified error type for all graft operations.
///
/// Mapping failures ([`MissingEndpoint`](GraftError::MissingEndpoint),
/// [`InvalidMetadata`](GraftError::InvalidMetadata),
/// [`UnknownType`](GraftError::UnknownType)) are raised while statements are
/// still being computed in memory, so nothing has been sent to the database
/// when they surface. Driver failures are wrapped unchanged in
/// [`Neo4j`](GraftError::Neo4j).
///
/// Row decoding errors are wrapped with [`Context`](GraftError::Context)
/// via [`with_context`](GraftError::with_context), producing chained messages like:
///
/// ```text
/// CreatedRow::id: type mismatch: expected Integer, got String (i64)
/// ```
#[derive(Error, Debug)]
pub enum GraftError {
    /// A general mapping error with a freeform message.
    #[error("mapping error: {0}")]
    Mapping(String),

    /// A relationship entity was saved without its start or end node.
    #[error("relationship entity {relationship_type} cannot have a missing {endpoint} node")]
    MissingEndpoint {
        relationship_type: String,
        endpoint: &'static str,
    },

    /// The schema handed to [`MetaData::builder`](crate::metadata::MetaData::builder)
    /// is inconsistent (duplicate types, dangling targets, ambiguous types).
    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    /// An entity type that was never registered with the metadata.
    #[error("unknown entity type '{0}'")]
    UnknownType(String),

    /// An operation needed a native id the entity does not have yet.
    #[error("{type_name} has no native id")]
    NotPersisted { type_name: String },

    /// A statement or save result referenced a node or relationship created
    /// in the same save whose id was never reported back.
    #[error("unresolved reference {0}")]
    UnresolvedReference(String),

    /// A required field was not found in a `neo4rs::Row`.
    #[error("missing field '{field}' on {struct_name}")]
    MissingField { field: String, struct_name: String },

    /// A `BoltType` variant did not match the expected Rust type.
    #[error("type mismatch: expected {expected}, got {got} ({context})")]
    TypeMismatch {
        expected: String,
        got: String,
        context: String,
    },

    /// Wraps an inner error with additional context (struct name, field).
    #[error("{context}: {source}")]
    Context {
        context: String,
        source: Box<GraftError>,
    },

    /// A `neo4rs::Error` from the underlying driver.
    #[error("neo4j error: {0}")]
    Neo4j(#[from] neo4rs::Error),
}

impl GraftError {
    /// Create a [`TypeMismatch`](GraftError::TypeMismatch) error.
    pub fn type_mismatch(expected: &str, got: &str, context: &str) -> Self {
        GraftError::TypeMismatch {
            expected: expected.to_owned(),
            got: got.to_owned(),
            context: context.to_owned(),
        }
    }

    /// Create a [`MissingField`](GraftError::MissingField) error.
    pub fn missing_field(field: &str, struct_name: &str) -> Self {
        GraftError::MissingField {
            field: field.to_owned(),
            struct_name: struct_name.to_owned(),
        }
    }

    /// Create a [`MissingEndpoint`](GraftError::MissingEndpoint) error.
    pub fn missing_endpoint(relationship_type: &str, endpoint: &'static str) -> Self {
        GraftError::MissingEndpoint {
            relationship_type: relationship_type.to_owned(),
            endpoint,
        }
    }

    /// Create an [`InvalidMetadata`](GraftError::InvalidMetadata) error.
    pub fn invalid_metadata(message: impl Into<String>) -> Self {
        GraftError::InvalidMetadata(message.into())
    }

    /// Whether this error was raised by the mapping layer rather than the driver.
    ///
    /// Mapping errors are deterministic and never worth retrying.
    pub fn is_mapping_error(&self) -> bool {
        !matches!(self, GraftError::Neo4j(_))
    }

    /// Wrap this error with additional context, producing a [`Context`](GraftError::Context) variant.
    ///
    /// ```rust
    /// # use graft_core::GraftError;
    /// let err = GraftError::type_mismatch("Integer", "String", "i64");
    /// let wrapped = err.with_context("CreatedRow::id");
    /// assert!(wrapped.to_string().contains("CreatedRow::id"));
    /// ```
    pub fn with_context(self, ctx: impl Into<String>) -> Self {
        GraftError::Context {
            context: ctx.into(),
            source: Box::new(self),
        }
    }
}
