//! # evelink query
//!
//! Filter compilation and meta-field resolution for Eve-style REST APIs.
//!
//! This crate provides:
//! - `MetaFieldRegistry`: per-type descriptor tables of protocol meta fields
//! - `NameResolver`: the field-name policy shared by codec and compiler
//! - `Predicate` / `PredicateCompiler`: typed filters in the MongoDB-style dialect
//! - `Query` / `CompiledQuery`: composite `where` / `show_deleted` parameters
//! - RFC 1123 timestamp helpers
//!
//! This is a pure crate with no I/O operations.
//!
//! ## Example
//!
//! ```
//! use evelink_query::{Predicate, Query, QueryContext, MetaFieldRegistry, NameResolver};
//! # use evelink_query::{Descriptor, Document};
//! # #[derive(serde::Serialize, serde::Deserialize)]
//! # struct Company { name: String, password: String }
//! # impl Document for Company {
//! #     fn describe() -> Descriptor<Self> {
//! #         Descriptor::new().field("name").field("password")
//! #     }
//! # }
//!
//! let resolver = NameResolver::default();
//! let ctx = QueryContext {
//!     registry: MetaFieldRegistry::global(),
//!     resolver: &resolver,
//!     last_updated_field: "_updated",
//! };
//! let query = Query::<Company>::new()
//!     .filter(Predicate::eq("name", "nik").and(Predicate::eq("password", "pw")))
//!     .include_deleted();
//!
//! assert_eq!(
//!     query.compile(&ctx).unwrap().to_query_string(),
//!     r#"?where={"name": "nik", "password": "pw"}&show_deleted"#
//! );
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod compiler;
mod error;
mod meta;
mod naming;
mod predicate;
mod query;
pub mod rfc1123;

pub use compiler::{compile, PredicateCompiler};
pub use error::{QueryError, QueryResult};
pub use meta::{Accessor, Descriptor, Document, FieldSpec, MetaFieldMap, MetaFieldRegistry, MetaRole};
pub use naming::{snake_case, NameResolver, NamingPolicy};
pub use predicate::{Literal, Operand, Operator, Predicate};
pub use query::{
    modified_since_clause, CompiledQuery, Query, QueryContext, SHOW_DELETED_PARAM, WHERE_PARAM,
};
