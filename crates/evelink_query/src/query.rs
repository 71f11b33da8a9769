//! Composite collection queries.
//!
//! A [`Query`] gathers up to three filter fragments (modified-since clause,
//! raw caller fragment, compiled predicate) plus the soft-delete flag, and
//! compiles them into a [`CompiledQuery`]:
//!
//! - no fragment: no `where` parameter at all
//! - one fragment: that fragment's own object
//! - several: `{"$and": [f1, f2, ...]}`
//!
//! `show_deleted` is a separate key-only parameter that follows `where`.

use crate::compiler::PredicateCompiler;
use crate::error::QueryResult;
use crate::meta::{Document, MetaFieldRegistry, MetaRole};
use crate::naming::NameResolver;
use crate::predicate::Predicate;
use crate::rfc1123;
use chrono::{DateTime, Utc};
use std::fmt;
use std::marker::PhantomData;

/// Query parameter carrying the filter object.
pub const WHERE_PARAM: &str = "where";

/// Key-only query parameter requesting soft-deleted documents.
pub const SHOW_DELETED_PARAM: &str = "show_deleted";

/// Everything a [`Query`] needs to resolve wire names.
#[derive(Debug, Clone, Copy)]
pub struct QueryContext<'a> {
    /// Registry holding the document type's field table.
    pub registry: &'a MetaFieldRegistry,
    /// Resolver shared with the codec.
    pub resolver: &'a NameResolver,
    /// Wire name of the last-updated field for types that declare none.
    pub last_updated_field: &'a str,
}

/// Fluent builder for a collection query over documents of type `T`.
pub struct Query<T> {
    predicate: Option<Predicate>,
    raw: Option<String>,
    modified_since: Option<DateTime<Utc>>,
    include_deleted: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Document> Query<T> {
    /// Creates a query that matches every live document.
    pub fn new() -> Self {
        Self {
            predicate: None,
            raw: None,
            modified_since: None,
            include_deleted: false,
            _marker: PhantomData,
        }
    }

    /// Restricts the query with a predicate. Repeated calls are and-ed.
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(match self.predicate.take() {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
        self
    }

    /// Adds a raw filter object, used verbatim (e.g. `{"name": "Acme"}`).
    pub fn raw(mut self, fragment: impl Into<String>) -> Self {
        self.raw = Some(fragment.into());
        self
    }

    /// Only returns documents modified after `timestamp`.
    pub fn modified_since(mut self, timestamp: DateTime<Utc>) -> Self {
        self.modified_since = Some(timestamp);
        self
    }

    /// Includes soft-deleted documents.
    pub fn include_deleted(mut self) -> Self {
        self.include_deleted = true;
        self
    }

    /// Compiles the query.
    pub fn compile(&self, ctx: &QueryContext<'_>) -> QueryResult<CompiledQuery> {
        let map = ctx.registry.map::<T>()?;
        let mut fragments = Vec::with_capacity(3);

        if let Some(since) = &self.modified_since {
            let field = match map.resolve_role(MetaRole::LastUpdated) {
                Some(spec) => ctx.resolver.resolve(spec.name(), spec.rename()).into_owned(),
                None => ctx.last_updated_field.to_string(),
            };
            fragments.push(modified_since_clause(&field, since));
        }

        if let Some(raw) = self.raw.as_deref() {
            fragments.push(raw.to_string());
        }

        if let Some(predicate) = &self.predicate {
            let compiled = PredicateCompiler::new(&map, ctx.resolver).compile(predicate)?;
            fragments.push(format!("{{{compiled}}}"));
        }

        Ok(CompiledQuery::new(fragments, self.include_deleted))
    }
}

impl<T: Document> Default for Query<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Query<T> {
    fn clone(&self) -> Self {
        Self {
            predicate: self.predicate.clone(),
            raw: self.raw.clone(),
            modified_since: self.modified_since,
            include_deleted: self.include_deleted,
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Query<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("predicate", &self.predicate)
            .field("raw", &self.raw)
            .field("modified_since", &self.modified_since)
            .field("include_deleted", &self.include_deleted)
            .finish()
    }
}

/// Builds `{"<field>": {"$gt": "<RFC 1123 timestamp>"}}`.
pub fn modified_since_clause(field: &str, since: &DateTime<Utc>) -> String {
    format!(
        "{{\"{field}\": {{\"$gt\": \"{}\"}}}}",
        rfc1123::format(since)
    )
}

/// A compiled collection query: optional filter object plus soft-delete flag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledQuery {
    filter: Option<String>,
    show_deleted: bool,
}

impl CompiledQuery {
    /// Assembles filter fragments into one filter object.
    ///
    /// Each fragment must be an object; blank and `{}` fragments are ignored.
    pub fn new(fragments: Vec<String>, show_deleted: bool) -> Self {
        let mut fragments: Vec<String> = fragments
            .into_iter()
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty() && f != "{}")
            .collect();

        let filter = match fragments.len() {
            0 => None,
            1 => fragments.pop(),
            _ => Some(format!("{{\"$and\": [{}]}}", fragments.join(", "))),
        };

        Self {
            filter,
            show_deleted,
        }
    }

    /// A query with no filter that excludes soft-deleted documents.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The filter object, if any.
    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    /// Whether soft-deleted documents are requested.
    pub fn show_deleted(&self) -> bool {
        self.show_deleted
    }

    /// Returns true if the query adds nothing to the request.
    pub fn is_empty(&self) -> bool {
        self.filter.is_none() && !self.show_deleted
    }

    /// The query as structured parameters, in wire order.
    ///
    /// `show_deleted` is key-only and carries no value.
    pub fn params(&self) -> Vec<(String, Option<String>)> {
        let mut params = Vec::with_capacity(2);
        if let Some(filter) = &self.filter {
            params.push((WHERE_PARAM.to_string(), Some(filter.clone())));
        }
        if self.show_deleted {
            params.push((SHOW_DELETED_PARAM.to_string(), None));
        }
        params
    }

    /// Renders the unencoded query string, including the leading `?`.
    ///
    /// Returns an empty string for an empty query.
    pub fn to_query_string(&self) -> String {
        let mut out = String::new();
        for (key, value) in self.params() {
            out.push(if out.is_empty() { '?' } else { '&' });
            out.push_str(&key);
            if let Some(value) = value {
                out.push('=');
                out.push_str(&value);
            }
        }
        out
    }
}

impl fmt::Display for CompiledQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_query_string())
    }
}
