//! Error types for the client.

use evelink_query::QueryError;
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur during client operations.
///
/// Protocol outcomes such as not-found, not-modified or an etag conflict are
/// not errors; they come back as [`crate::Outcome`] values or raw responses.
#[derive(Error, Debug)]
pub enum ClientError {
    /// No base address is configured.
    #[error("base address is not configured")]
    MissingBaseAddress,

    /// No resource name was given and no default is configured.
    #[error("resource name is not configured")]
    MissingResource,

    /// The resource name is empty.
    #[error("resource name cannot be empty")]
    EmptyResource,

    /// The document carries no id, so its endpoint cannot be addressed.
    #[error("document has no {field} value")]
    MissingDocumentId {
        /// Name of the id field, or the role name if the type declares none.
        field: String,
    },

    /// The document carries no etag, so a write cannot be made conditional.
    #[error("document has no {field} value; writes require an ETag")]
    MissingETag {
        /// Name of the etag field, or the role name if the type declares none.
        field: String,
    },

    /// Filter compilation or type registration failed.
    #[error("query error: {0}")]
    Query(#[from] QueryError),

    /// JSON encoding or decoding failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The response body does not have the expected shape.
    #[error("codec error: {0}")]
    Codec(String),

    /// The request could not be built into a valid URL.
    #[error("invalid url `{url}`: {message}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
        /// Parser message.
        message: String,
    },

    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
    },
}

impl ClientError {
    /// Creates a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Returns true if the error was raised before any request was sent.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            ClientError::MissingBaseAddress
                | ClientError::MissingResource
                | ClientError::EmptyResource
                | ClientError::MissingDocumentId { .. }
                | ClientError::MissingETag { .. }
                | ClientError::Query(_)
        )
    }
}
