//! Error types for predicate compilation and type registration.

use crate::meta::MetaRole;
use thiserror::Error;

/// Result type for query operations.
pub type QueryResult<T> = Result<T, QueryError>;

/// Errors raised while describing types or compiling filters.
///
/// All of these are raised locally, before any request reaches the network.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    /// The predicate contains a node the filter dialect cannot express.
    #[error("unsupported predicate shape: {subtree}")]
    UnsupportedShape {
        /// Rendering of the offending subtree.
        subtree: String,
    },

    /// A comparison uses an operator outside the supported set.
    #[error("unsupported operator `{operator}` in {subtree}")]
    UnsupportedOperator {
        /// The operator symbol.
        operator: String,
        /// Rendering of the offending comparison.
        subtree: String,
    },

    /// A comparison references a field the type does not declare.
    #[error("type `{type_name}` has no declared field `{field}`")]
    UnknownField {
        /// Name of the document type.
        type_name: &'static str,
        /// The unknown field name.
        field: String,
    },

    /// Two fields of the same type claim the same meta role.
    #[error("type `{type_name}` declares {role:?} on both `{first}` and `{second}`")]
    DuplicateRole {
        /// Name of the document type.
        type_name: &'static str,
        /// The duplicated role.
        role: MetaRole,
        /// Field that claimed the role first.
        first: &'static str,
        /// Field that claimed it again.
        second: &'static str,
    },

    /// A field name is declared more than once.
    #[error("type `{type_name}` declares field `{field}` more than once")]
    DuplicateField {
        /// Name of the document type.
        type_name: &'static str,
        /// The repeated field name.
        field: &'static str,
    },
}
