//! Schemaless documents.

use chrono::{DateTime, Utc};
use evelink_query::{rfc1123, Descriptor, Document, MetaRole};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A document of unknown shape, using the service's default meta field names.
///
/// Every field that is not a meta field ends up in [`RawDocument::fields`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDocument {
    /// `_id`.
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// `_etag`.
    #[serde(rename = "_etag", default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// `_updated`.
    #[serde(
        rename = "_updated",
        default,
        skip_serializing_if = "Option::is_none",
        with = "rfc1123::serde::option"
    )]
    pub updated: Option<DateTime<Utc>>,
    /// `_created`.
    #[serde(
        rename = "_created",
        default,
        skip_serializing_if = "Option::is_none",
        with = "rfc1123::serde::option"
    )]
    pub created: Option<DateTime<Utc>>,
    /// `_deleted`.
    #[serde(rename = "_deleted", default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<bool>,
    /// Remaining fields.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl RawDocument {
    /// Creates a document from plain fields.
    pub fn new(fields: Map<String, Value>) -> Self {
        Self {
            fields,
            ..Self::default()
        }
    }

    /// Returns true if the service flagged the document as deleted.
    pub fn is_deleted(&self) -> bool {
        self.deleted.unwrap_or(false)
    }
}

impl Document for RawDocument {
    fn describe() -> Descriptor<Self> {
        Descriptor::new()
            .meta("_id", MetaRole::DocumentId, |d: &Self| d.id.clone())
            .meta("_etag", MetaRole::ETag, |d: &Self| d.etag.clone())
            .meta("_updated", MetaRole::LastUpdated, |d: &Self| {
                d.updated.as_ref().map(rfc1123::format)
            })
            .meta("_created", MetaRole::DateCreated, |d: &Self| {
                d.created.as_ref().map(rfc1123::format)
            })
            .meta("_deleted", MetaRole::Deleted, |d: &Self| {
                d.deleted.map(|b| b.to_string())
            })
    }
}
