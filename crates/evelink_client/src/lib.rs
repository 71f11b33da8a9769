//! # evelink client
//!
//! Conditional-request client for Eve-style REST document stores.
//!
//! This crate provides:
//! - `EveClient`: GET/POST/PUT/DELETE driven by etags and meta fields
//! - `Transport` abstraction with a reqwest `HttpTransport`
//! - `MemoryTransport`, an in-process Eve-compatible store for tests
//! - `DocumentCodec`: meta-field exclusion and wire-name policy for bodies
//! - `Authenticator` capability for the `Authorization` header
//!
//! ## Conditional requests
//!
//! - GET with a known etag sends `If-None-Match`; 304 means the caller's
//!   copy is current
//! - PUT and DELETE always send `If-Match`; without an etag nothing is sent
//! - a stale etag on a write comes back as a 412 response, not an error
//!
//! ## Example
//!
//! ```no_run
//! use evelink_client::{ClientConfig, EveClient, Outcome, RawDocument};
//!
//! # async fn run() -> Result<(), evelink_client::ClientError> {
//! let client = EveClient::http(ClientConfig::new("https://api.example.com"))?;
//!
//! match client.get::<RawDocument>("companies", "5f1d", None).await? {
//!     Outcome::Success(doc) => println!("{:?}", doc.fields),
//!     Outcome::NotFound => println!("gone"),
//!     other => println!("{other:?}"),
//! }
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod auth;
mod client;
mod codec;
mod config;
mod error;
mod http;
mod memory;
mod raw;
mod transport;

pub use auth::{Authenticator, StaticAuthorization};
pub use client::{EveClient, Outcome};
pub use codec::{DocumentCodec, ITEMS_KEY};
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use http::HttpTransport;
pub use memory::MemoryTransport;
pub use raw::RawDocument;
pub use transport::{
    decode_segment, encode_segment, Method, Request, Response, StatusCode, Transport, ACCEPT,
    APPLICATION_JSON, AUTHORIZATION, CONTENT_TYPE, IF_MATCH, IF_NONE_MATCH,
};
