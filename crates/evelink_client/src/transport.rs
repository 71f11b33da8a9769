//! Transport layer abstraction.
//!
//! The client builds [`Request`]s and interprets [`Response`]s; moving bytes
//! is left to a [`Transport`] implementation (reqwest, in-memory, ...).

use crate::error::ClientResult;
use async_trait::async_trait;
use evelink_query::CompiledQuery;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// `If-None-Match`: conditional GET precondition.
pub const IF_NONE_MATCH: &str = "If-None-Match";
/// `If-Match`: conditional PUT/DELETE precondition.
pub const IF_MATCH: &str = "If-Match";
/// `Authorization`.
pub const AUTHORIZATION: &str = "Authorization";
/// `Accept`.
pub const ACCEPT: &str = "Accept";
/// `Content-Type`.
pub const CONTENT_TYPE: &str = "Content-Type";
/// Media type of every request and response body.
pub const APPLICATION_JSON: &str = "application/json";

/// Bytes escaped inside one path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Percent-encodes a value so it forms exactly one path segment.
pub fn encode_segment(segment: &str) -> Cow<'_, str> {
    utf8_percent_encode(segment, PATH_SEGMENT).into()
}

/// Reverses [`encode_segment`].
pub fn decode_segment(segment: &str) -> Cow<'_, str> {
    percent_decode_str(segment).decode_utf8_lossy()
}

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET.
    Get,
    /// POST.
    Post,
    /// PUT.
    Put,
    /// DELETE.
    Delete,
}

impl Method {
    /// The method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StatusCode(u16);

impl StatusCode {
    /// 200 OK.
    pub const OK: StatusCode = StatusCode(200);
    /// 201 Created.
    pub const CREATED: StatusCode = StatusCode(201);
    /// 204 No Content.
    pub const NO_CONTENT: StatusCode = StatusCode(204);
    /// 304 Not Modified.
    pub const NOT_MODIFIED: StatusCode = StatusCode(304);
    /// 400 Bad Request.
    pub const BAD_REQUEST: StatusCode = StatusCode(400);
    /// 404 Not Found.
    pub const NOT_FOUND: StatusCode = StatusCode(404);
    /// 405 Method Not Allowed.
    pub const METHOD_NOT_ALLOWED: StatusCode = StatusCode(405);
    /// 412 Precondition Failed.
    pub const PRECONDITION_FAILED: StatusCode = StatusCode(412);
    /// 422 Unprocessable Entity.
    pub const UNPROCESSABLE_ENTITY: StatusCode = StatusCode(422);
    /// 428 Precondition Required.
    pub const PRECONDITION_REQUIRED: StatusCode = StatusCode(428);

    /// Wraps a raw status code.
    pub fn from_u16(code: u16) -> Self {
        StatusCode(code)
    }

    /// The numeric code.
    pub fn as_u16(&self) -> u16 {
        self.0
    }

    /// Returns true for 2xx codes.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.0)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A request ready to be sent.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// HTTP method.
    pub method: Method,
    /// Service base address.
    pub base_url: String,
    /// Path relative to the base address (`companies` or `companies/<id>`).
    pub path: String,
    /// Query parameters, in order. `None` values are key-only parameters.
    pub query: Vec<(String, Option<String>)>,
    /// Request headers.
    pub headers: Vec<(String, String)>,
    /// JSON body.
    pub body: Option<String>,
}

impl Request {
    /// Creates a request without query, headers or body.
    pub fn new(method: Method, base_url: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method,
            base_url: base_url.into(),
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Adds a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Appends the parameters of a compiled query.
    pub fn with_query(mut self, query: &CompiledQuery) -> Self {
        self.query.extend(query.params());
        self
    }

    /// Sets a JSON body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self.headers
            .push((CONTENT_TYPE.to_string(), APPLICATION_JSON.to_string()));
        self
    }

    /// Returns the first value of a header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Returns the value of a query parameter. Key-only parameters yield `Some(None)`.
    pub fn query_param(&self, key: &str) -> Option<Option<&str>> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_deref())
    }

    /// Path plus unencoded query string, for logging.
    pub fn target(&self) -> String {
        let mut out = self.path.clone();
        for (i, (key, value)) in self.query.iter().enumerate() {
            out.push(if i == 0 { '?' } else { '&' });
            out.push_str(key);
            if let Some(value) = value {
                out.push('=');
                out.push_str(value);
            }
        }
        out
    }

    /// Base address joined with the path, without the query string.
    pub fn endpoint(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.path.trim_start_matches('/')
        )
    }
}

/// A response as returned by the service.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: Vec<(String, String)>,
    /// Response body; empty when the service sent none.
    pub body: String,
}

impl Response {
    /// Creates a response with an empty body.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    /// Sets the body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Adds a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Returns the first value of a header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Returns true for 2xx responses.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// A transport sends one request and returns the service's response.
///
/// Implementations must not retry, and must return non-2xx responses as
/// `Ok` values; only failures to obtain a response at all are errors.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends a request.
    async fn send(&self, request: Request) -> ClientResult<Response>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, request: Request) -> ClientResult<Response> {
        (**self).send(request).await
    }
}
